//! Build-and-release workflow.
//!
//! A run is a straight line of stages with two early exits (regenerate mode
//! and a failed build) and one late branch (upload destination):
//!
//! 1. prepare environment (already captured in [`BuildConfig`])
//! 2. ensure dependencies
//! 3. compute the archive name
//! 4. dispatch on [`RunMode`]: regenerate and exit, or clean, or nothing
//! 5. build
//! 6. package
//! 7. report
//! 8. upload
//!
//! Every stage failure ends the run. Nothing is retried.

mod build;
mod context;
pub mod naming;
mod package;
pub mod provision;
pub mod report;

pub use context::StageContext;

use crate::cli::OutputManager;
use crate::config::BuildConfig;
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::upload::{self, ArtifactUploader, Prompt, UploadReceipt};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How this invocation behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Build, package, upload
    #[default]
    Normal,
    /// Minimize the defconfig, write it back to the source tree, stop
    RegenerateConfig,
    /// Remove the output directory, then run a normal build
    CleanBuild,
}

/// Stage toggles that are not run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Run package manager and toolchain installer
    pub provision: bool,
    /// Ask for an upload destination after packaging
    pub upload: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            provision: true,
            upload: true,
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct ReleaseSummary {
    /// Archive written to the working directory
    pub archive: PathBuf,
    /// Archive size on disk
    pub size_bytes: u64,
    /// Wall-clock time from start to archive
    pub elapsed: Duration,
    /// Upload result, `None` when uploads are disabled
    pub upload: Option<UploadReceipt>,
}

/// What a run ended with
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Regenerate mode wrote the minimized defconfig
    ConfigRegenerated {
        /// Defconfig path inside the source tree
        defconfig: PathBuf,
    },
    /// Full build finished
    Released(ReleaseSummary),
}

/// The orchestrator
pub struct Workflow<'a, E, U, P> {
    config: &'a BuildConfig,
    executor: &'a E,
    uploader: &'a U,
    prompt: &'a P,
    output: &'a OutputManager,
    options: WorkflowOptions,
}

impl<'a, E, U, P> Workflow<'a, E, U, P>
where
    E: CommandExecutor,
    U: ArtifactUploader,
    P: Prompt,
{
    /// Wire the workflow to its collaborators
    pub fn new(
        config: &'a BuildConfig,
        executor: &'a E,
        uploader: &'a U,
        prompt: &'a P,
        output: &'a OutputManager,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            config,
            executor,
            uploader,
            prompt,
            output,
            options,
        }
    }

    fn stage(&self) -> StageContext<'a, E> {
        StageContext {
            config: self.config,
            executor: self.executor,
            output: self.output,
        }
    }

    /// Run the whole workflow in `mode`
    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome> {
        let started = Instant::now();
        let ctx = self.stage();
        let device = self.config.device();

        self.output.section(&format!(
            "{} ({}) kernel",
            device.codename, device.arch
        ));
        for (key, value) in self.config.env() {
            log::debug!("{key}={value}");
        }

        if self.options.provision {
            self.output.section("Dependencies");
            provision::ensure_dependencies(&ctx).await?;
        } else {
            log::info!("Skipping dependency provisioning");
        }

        let revision = naming::source_revision(&self.config.source_dir);
        let archive_name = naming::artifact_name(
            &device.zip_prefix,
            naming::release_timestamp(&self.config.profile.identity.timezone),
            revision.as_deref(),
        );
        log::info!("Archive name: {archive_name}");

        match mode {
            RunMode::RegenerateConfig => {
                self.output.section("Regenerate defconfig");
                let defconfig = build::regenerate_defconfig(&ctx).await?;
                return Ok(RunOutcome::ConfigRegenerated { defconfig });
            }
            RunMode::CleanBuild => {
                if build::clean_output(&self.config.out_dir).await? {
                    self.output
                        .info(&format!("Removed {}", self.config.out_dir.display()));
                }
            }
            RunMode::Normal => {}
        }

        self.output.section("Build");
        let image = build::build_kernel(&ctx).await?;

        self.output.section("Package");
        let archive = package::package_release(&ctx, &image, &archive_name).await?;

        let size_bytes = tokio::fs::metadata(&archive).await?.len();
        let elapsed = started.elapsed();
        self.output.section("Summary");
        self.output.result(&format!(
            "Build completed in {}",
            report::format_elapsed(elapsed)
        ));
        self.output.result(&format!(
            "{} ({})",
            archive_name,
            report::format_size_mb(size_bytes)
        ));

        let upload = if self.options.upload {
            self.output.section("Upload");
            let receipt = upload::choose_and_upload(self.uploader, self.prompt, &archive).await?;
            self.output.result(&format!(
                "Uploaded to {}: {}",
                receipt.destination, receipt.response
            ));
            Some(receipt)
        } else {
            None
        };

        Ok(RunOutcome::Released(ReleaseSummary {
            archive,
            size_bytes,
            elapsed,
            upload,
        }))
    }
}
