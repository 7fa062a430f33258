//! Command line argument parsing.
//!
//! Run from the kernel source tree with no arguments for a normal build.

use crate::config::ConfigOverrides;
use crate::workflow::{RunMode, WorkflowOptions};
use clap::Parser;
use std::path::PathBuf;

/// Kernel build and release tool
#[derive(Parser, Debug)]
#[command(
    name = "kernel_bundler_release",
    version,
    about = "Build a kernel, package it as a flashable zip, and upload it",
    long_about = "Build a kernel, package it as a flashable zip, and upload it.

Usage:
  kernel_bundler_release              # normal build
  kernel_bundler_release --clean      # remove build output first
  kernel_bundler_release --regen      # rewrite the minimal defconfig and exit"
)]
pub struct Args {
    /// Regenerate the minimal defconfig into the source tree and exit
    #[arg(short = 'r', long = "regen", conflicts_with = "clean")]
    pub regen: bool,

    /// Remove previous build output before building
    #[arg(short = 'c', long = "clean")]
    pub clean: bool,

    /// Device profile (TOML); defaults to kernel-release.toml in the source tree
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Kernel source tree
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// Skip package and toolchain provisioning
    #[arg(long)]
    pub skip_deps: bool,

    /// Skip the upload prompt
    #[arg(long)]
    pub no_upload: bool,

    /// Parallel make jobs (defaults to the host CPU count)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Build user recorded in the kernel
    #[arg(long, env = "KBUILD_BUILD_USER", value_name = "USER")]
    pub build_user: Option<String>,

    /// Build host recorded in the kernel
    #[arg(long, env = "KBUILD_BUILD_HOST", value_name = "HOST")]
    pub build_host: Option<String>,

    /// Toolchain root; its bin/ is prepended to PATH
    #[arg(long, env = "KERNEL_TOOLCHAIN_DIR", value_name = "DIR")]
    pub toolchain_dir: Option<PathBuf>,

    /// Timezone for the build timestamp
    #[arg(long, env = "TZ", value_name = "ZONE")]
    pub timezone: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.jobs == Some(0) {
            return Err("--jobs must be at least 1".to_string());
        }
        if self.source.as_os_str().is_empty() {
            return Err("--source must not be empty".to_string());
        }
        Ok(())
    }

    /// The run mode selected by the flags
    pub fn run_mode(&self) -> RunMode {
        if self.regen {
            RunMode::RegenerateConfig
        } else if self.clean {
            RunMode::CleanBuild
        } else {
            RunMode::Normal
        }
    }

    /// Stage toggles selected by the flags
    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            provision: !self.skip_deps,
            upload: !self.no_upload,
        }
    }

    /// Overrides applied on top of the device profile
    pub fn overrides(&self, work_dir: PathBuf) -> ConfigOverrides {
        ConfigOverrides {
            source_dir: self.source.clone(),
            work_dir,
            build_user: self.build_user.clone(),
            build_host: self.build_host.clone(),
            toolchain_dir: self.toolchain_dir.clone(),
            timezone: self.timezone.clone(),
            jobs: self.jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("kernel_bundler_release").chain(args.iter().copied()))
    }

    #[test]
    fn test_no_flags_is_normal_build() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.run_mode(), RunMode::Normal);
        assert_eq!(args.workflow_options(), WorkflowOptions::default());
        assert_eq!(args.source, PathBuf::from("."));
    }

    #[test]
    fn test_short_flags_select_modes() {
        assert_eq!(parse(&["-r"]).unwrap().run_mode(), RunMode::RegenerateConfig);
        assert_eq!(parse(&["-c"]).unwrap().run_mode(), RunMode::CleanBuild);
        assert_eq!(parse(&["--clean"]).unwrap().run_mode(), RunMode::CleanBuild);
    }

    #[test]
    fn test_regen_and_clean_conflict() {
        let err = parse(&["-r", "-c"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_stage_toggles() {
        let options = parse(&["--skip-deps", "--no-upload"]).unwrap().workflow_options();
        assert!(!options.provision);
        assert!(!options.upload);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(parse(&["-j", "0"]).unwrap().validate().is_err());
        assert!(parse(&["-j", "4"]).unwrap().validate().is_ok());
    }
}
