//! Kernel configuration and compilation.

use crate::error::{BuildError, Result};
use crate::exec::{CommandExecutor, CommandSpec, OutputMode, read_log_tail};
use std::path::{Path, PathBuf};

use super::context::StageContext;

/// Lines of the build log shown when a build step fails
const LOG_TAIL_LINES: usize = 30;

/// Minimize the configured defconfig and copy it back into the source tree.
pub(crate) async fn regenerate_defconfig<E: CommandExecutor>(
    ctx: &StageContext<'_, E>,
) -> Result<PathBuf> {
    let config = ctx.config;
    let defconfig = &config.device().defconfig;

    ctx.output.progress(&format!("Regenerating {defconfig}..."));
    let spec = make(ctx).args(config.savedefconfig_args());
    let out = ctx.executor.run(&spec).await?;
    if !out.success() {
        return Err(BuildError::SavedefconfigFailed {
            defconfig: defconfig.clone(),
            status: out.status_text(),
        }
        .into());
    }

    let saved = config.saved_defconfig_path();
    if !saved.is_file() {
        return Err(BuildError::MissingSavedConfig { path: saved }.into());
    }

    let target = config.defconfig_path();
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(&saved, &target).await?;
    ctx.output
        .success(&format!("Regenerated {}", target.display()));
    Ok(target)
}

/// Remove the build output directory. Returns whether anything was removed.
pub(crate) async fn clean_output(out_dir: &Path) -> Result<bool> {
    match tokio::fs::remove_dir_all(out_dir).await {
        Ok(()) => {
            log::info!("Removed {}", out_dir.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} already clean", out_dir.display());
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Materialize the defconfig, compile, and return the boot image path.
pub(crate) async fn build_kernel<E: CommandExecutor>(ctx: &StageContext<'_, E>) -> Result<PathBuf> {
    let config = ctx.config;
    let log_file = &config.log_file;

    // Each run gets a fresh log.
    tokio::fs::write(log_file, b"").await?;

    ctx.output.progress(&format!(
        "Configuring {} for {}...",
        config.device().defconfig,
        config.device().codename
    ));
    let spec = make(ctx)
        .args(config.defconfig_args())
        .output(OutputMode::Tee(log_file.clone()));
    let out = ctx.executor.run(&spec).await?;
    if !out.success() {
        return Err(BuildError::DefconfigFailed {
            defconfig: config.device().defconfig.clone(),
            status: out.status_text(),
            log_tail: read_log_tail(log_file, LOG_TAIL_LINES).await,
        }
        .into());
    }

    ctx.output
        .progress(&format!("Compiling with {} jobs...", config.jobs));
    let spec = make(ctx)
        .args(config.compile_args())
        .output(OutputMode::Tee(log_file.clone()));
    let out = ctx.executor.run(&spec).await?;

    let image = config.image_path();
    if !image.is_file() {
        return Err(BuildError::MissingImage {
            path: image,
            log_tail: read_log_tail(log_file, LOG_TAIL_LINES).await,
        }
        .into());
    }
    if !out.success() {
        log::warn!(
            "make exited with {} but {} exists, continuing",
            out.status_text(),
            image.display()
        );
        ctx.output
            .warn(&format!("make exited with {}, using existing image", out.status_text()));
    }

    ctx.output.success(&format!("Built {}", image.display()));
    Ok(image)
}

fn make<E>(ctx: &StageContext<'_, E>) -> CommandSpec {
    CommandSpec::new("make")
        .current_dir(&ctx.config.source_dir)
        .envs(ctx.config.env())
}
