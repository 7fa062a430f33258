//! Command execution: build the configuration and drive the workflow.

use crate::cli::{Args, OutputManager};
use crate::config::{BuildConfig, DeviceProfile};
use crate::error::{CliError, Result};
use crate::exec::SystemExecutor;
use crate::upload::{HttpUploader, StdinPrompt};
use crate::workflow::{RunOutcome, Workflow};

/// Execute the run selected by the parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(reason) = args.validate() {
        return Err(CliError::InvalidArguments { reason }.into());
    }

    let output = OutputManager::new(args.quiet);
    let mode = args.run_mode();
    log::debug!("Run mode: {mode:?}");

    let profile = DeviceProfile::resolve(args.profile.as_deref(), &args.source)?;
    let work_dir = std::env::current_dir()?;
    let config = BuildConfig::new(
        profile,
        args.overrides(work_dir),
        std::env::var_os("PATH"),
    )?;

    let executor = SystemExecutor;
    let uploader = HttpUploader::new(config.profile.upload.clone());
    let prompt = StdinPrompt;
    let workflow = Workflow::new(
        &config,
        &executor,
        &uploader,
        &prompt,
        &output,
        args.workflow_options(),
    );

    match workflow.run(mode).await? {
        RunOutcome::ConfigRegenerated { defconfig } => {
            output.result(&format!("Defconfig written to {}", defconfig.display()));
        }
        RunOutcome::Released(summary) => {
            output.result(&format!("Archive: {}", summary.archive.display()));
            if summary.upload.is_none() {
                output.info("Upload skipped");
            }
        }
    }

    Ok(0)
}
