//! # Kernel Bundler Release
//!
//! Build-and-release orchestration for a single Android kernel target.
//!
//! One invocation provisions the host, configures and compiles the kernel,
//! packages the boot image into a flashable zip built from a packaging
//! template, reports the result, and uploads the archive.
//!
//! ## Usage
//!
//! ```bash
//! kernel_bundler_release              # build, package, upload
//! kernel_bundler_release --clean      # start from an empty output directory
//! kernel_bundler_release --regen      # rewrite the minimal defconfig and exit
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod upload;
pub mod utils;
pub mod workflow;

pub use cli::Args;
pub use config::{BuildConfig, ConfigOverrides, DeviceProfile};
pub use error::{ReleaseError, Result};
pub use exec::{CommandExecutor, CommandOutput, CommandSpec, OutputMode, SystemExecutor};
pub use upload::{ArtifactUploader, Destination, HttpUploader, Prompt, UploadReceipt};
pub use workflow::{ReleaseSummary, RunMode, RunOutcome, Workflow, WorkflowOptions};
