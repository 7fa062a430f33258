//! Host provisioning: build packages and the compiler toolchain.

use crate::error::{ProvisionError, Result};
use crate::exec::{CommandExecutor, CommandSpec, OutputMode};
use regex::Regex;
use std::sync::LazyLock;

use super::context::StageContext;

/// First run of digits in a version banner, e.g. `14` in `Ubuntu clang version 14.0.0-1`
pub fn leading_major(version: &str) -> Option<u32> {
    static DIGITS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\d+").expect("digit regex is valid"));

    DIGITS_RE
        .find(version)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Whether the compiler must be (re)installed.
///
/// `None` means no compiler was found. A banner without any number is treated
/// like a missing compiler.
pub fn needs_toolchain_install(version: Option<&str>, required_major: u32) -> bool {
    match version.and_then(leading_major) {
        Some(major) => major < required_major,
        None => true,
    }
}

/// Install build packages, then install the compiler if it is missing or too old.
pub(crate) async fn ensure_dependencies<E: CommandExecutor>(ctx: &StageContext<'_, E>) -> Result<()> {
    let provision = &ctx.config.profile.provision;
    let toolchain = &ctx.config.profile.toolchain;

    if let Some((program, base_args)) = provision.package_manager.split_first() {
        let spec = CommandSpec::new(program.as_str())
            .args(base_args.iter().cloned())
            .args(provision.packages.iter().cloned())
            .envs(ctx.config.env())
            .output(OutputMode::Inherit);

        ctx.output
            .progress(&format!("Installing {} build packages...", provision.packages.len()));
        let out = ctx.executor.run(&spec).await?;
        if !out.success() {
            return Err(ProvisionError::PackagesFailed {
                command: spec.to_string(),
                status: out.status_text(),
            }
            .into());
        }
        ctx.output.success("Build packages installed");
    } else {
        log::warn!("No package manager configured, skipping package installation");
    }

    let banner = compiler_banner(ctx, &toolchain.cc).await;
    match &banner {
        Some(line) => log::info!("Found compiler: {line}"),
        None => log::info!("Compiler {} not found", toolchain.cc),
    }

    if needs_toolchain_install(banner.as_deref(), toolchain.required_major) {
        ctx.output.progress(&format!(
            "Installing {} {}...",
            toolchain.cc, toolchain.required_major
        ));
        let script = provision
            .toolchain_installer
            .replace("{major}", &toolchain.required_major.to_string());
        let spec = CommandSpec::new("bash")
            .args(["-c".to_string(), script])
            .envs(ctx.config.env())
            .output(OutputMode::Inherit);

        let out = ctx.executor.run(&spec).await?;
        if !out.success() {
            return Err(ProvisionError::ToolchainFailed {
                compiler: toolchain.cc.clone(),
                major: toolchain.required_major,
                status: out.status_text(),
            }
            .into());
        }
        ctx.output.success(&format!(
            "{} {} installed",
            toolchain.cc, toolchain.required_major
        ));
    } else {
        ctx.output.success(&format!(
            "{} is recent enough (>= {})",
            toolchain.cc, toolchain.required_major
        ));
    }

    Ok(())
}

/// First line of `<cc> --version`, or `None` if the compiler is not usable.
async fn compiler_banner<E: CommandExecutor>(ctx: &StageContext<'_, E>, cc: &str) -> Option<String> {
    let path = ctx.executor.locate(cc, ctx.config.search_path())?;

    let spec = CommandSpec::new(path.to_string_lossy())
        .args(["--version"])
        .envs(ctx.config.env())
        .output(OutputMode::Capture);
    match ctx.executor.run(&spec).await {
        Ok(out) if out.success() => out.stdout.lines().next().map(str::to_string),
        Ok(out) => {
            log::warn!("{spec} exited with {}", out.status_text());
            None
        }
        Err(e) => {
            log::warn!("{e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_major_from_distro_banner() {
        assert_eq!(leading_major("Ubuntu clang version 14.0.0-1ubuntu1.1"), Some(14));
        assert_eq!(leading_major("clang version 18.1.8"), Some(18));
        assert_eq!(leading_major("no digits here"), None);
    }

    #[test]
    fn test_missing_compiler_needs_install() {
        assert!(needs_toolchain_install(None, 18));
    }

    #[test]
    fn test_older_compiler_needs_install() {
        assert!(needs_toolchain_install(Some("clang version 17.0.6"), 18));
    }

    #[test]
    fn test_equal_or_newer_compiler_is_kept() {
        assert!(!needs_toolchain_install(Some("clang version 18.1.8"), 18));
        assert!(!needs_toolchain_install(Some("clang version 19.0.0"), 18));
    }

    #[test]
    fn test_unparsable_banner_needs_install() {
        assert!(needs_toolchain_install(Some("clang (unknown build)"), 18));
    }
}
