//! Error types for kernel release operations.
//!
//! Every failure in the workflow is fatal. Each variant carries enough context
//! for a one-line diagnostic, and build failures also carry the tail of the
//! captured build log.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kernel release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all kernel release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Host provisioning errors
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Kernel build errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Flashable zip packaging errors
    #[error("Packaging error: {0}")]
    Package(#[from] PackageError),

    /// Upload errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// External command errors
    #[error("Command error: {0}")]
    Exec(#[from] ExecError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors from anyhow
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// Errors raised while installing host packages and the compiler toolchain
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Package manager exited non-zero
    #[error("Package installation failed ({command}), exit status {status}")]
    PackagesFailed {
        /// Command line that was run
        command: String,
        /// Exit status reported by the package manager
        status: String,
    },

    /// Toolchain installer exited non-zero
    #[error("Installing {compiler} {major} failed, exit status {status}")]
    ToolchainFailed {
        /// Compiler being installed
        compiler: String,
        /// Required major version
        major: u32,
        /// Exit status reported by the installer
        status: String,
    },
}

/// Errors raised while configuring or compiling the kernel
#[derive(Error, Debug)]
pub enum BuildError {
    /// `make <defconfig>` exited non-zero
    #[error("Configuring {defconfig} failed, exit status {status}")]
    DefconfigFailed {
        /// Defconfig target name
        defconfig: String,
        /// Exit status reported by make
        status: String,
        /// Last lines of the build log
        log_tail: Vec<String>,
    },

    /// Compile finished but the boot image is not where it should be
    #[error("Kernel image not found at {}", path.display())]
    MissingImage {
        /// Expected image location
        path: PathBuf,
        /// Last lines of the build log
        log_tail: Vec<String>,
    },

    /// `make savedefconfig` exited non-zero
    #[error("Regenerating {defconfig} failed, exit status {status}")]
    SavedefconfigFailed {
        /// Defconfig target name
        defconfig: String,
        /// Exit status reported by make
        status: String,
    },

    /// `make savedefconfig` succeeded without writing a minimized config
    #[error("Minimized config not found at {}", path.display())]
    MissingSavedConfig {
        /// Expected location of the minimized config
        path: PathBuf,
    },
}

impl BuildError {
    /// Tail of the build log captured with this error, if any
    pub fn log_tail(&self) -> &[String] {
        match self {
            BuildError::DefconfigFailed { log_tail, .. }
            | BuildError::MissingImage { log_tail, .. } => log_tail,
            _ => &[],
        }
    }
}

/// Errors raised while assembling the flashable zip
#[derive(Error, Debug)]
pub enum PackageError {
    /// Neither the cached template nor the remote clone was usable
    #[error("Packaging template unavailable: no cache at {} and cloning {url} failed ({reason})", cache.display())]
    TemplateUnavailable {
        /// Cached template location that was checked
        cache: PathBuf,
        /// Remote that was cloned
        url: String,
        /// Why the clone failed
        reason: String,
    },

    /// Writing the zip archive failed
    #[error("Creating archive {} failed: {reason}", path.display())]
    ArchiveFailed {
        /// Archive being written
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Copying a file into the staging tree failed
    #[error("Staging {} failed: {source}", path.display())]
    Staging {
        /// File or directory being staged
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while uploading the archive
#[derive(Error, Debug)]
pub enum UploadError {
    /// The HTTP request never produced a response
    #[error("Upload to {endpoint} failed: {reason}")]
    Transport {
        /// Endpoint that was contacted (token redacted)
        endpoint: String,
        /// Transport failure
        reason: String,
    },

    /// The service answered but refused the file
    #[error("{service} rejected the upload (HTTP {status}): {body}")]
    Rejected {
        /// Service name
        service: String,
        /// HTTP status code
        status: u16,
        /// Response body or API description
        body: String,
    },

    /// Operator entered an empty bot token
    #[error("No bot token entered")]
    EmptyToken,

    /// Endpoint URL could not be built
    #[error("Invalid upload endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Endpoint as configured
        endpoint: String,
        /// Parse failure
        reason: String,
    },
}

/// External command execution errors
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started
    #[error("Failed to start {command}: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the program or streaming its output failed
    #[error("Failed while running {command}: {source}")]
    Wait {
        /// Command line
        command: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Reading the operator's answer from the terminal failed
    #[error("Prompt failed: {reason}")]
    PromptFailed {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Provision(ProvisionError::PackagesFailed { .. }) => vec![
                "Check that sudo works without a password in this shell".to_string(),
                "Refresh package indexes: sudo apt-get update".to_string(),
                "Re-run with --skip-deps if the host is already provisioned".to_string(),
            ],
            ReleaseError::Provision(ProvisionError::ToolchainFailed { major, .. }) => vec![
                format!("Install clang {major} manually and make sure it is on PATH"),
                "Point KERNEL_TOOLCHAIN_DIR at a prebuilt toolchain".to_string(),
            ],
            ReleaseError::Build(BuildError::DefconfigFailed { defconfig, .. }) => vec![format!(
                "Check that arch/<arch>/configs/{defconfig} exists in the source tree"
            )],
            ReleaseError::Build(BuildError::MissingImage { .. }) => vec![
                "Read the build log for the first compiler error".to_string(),
                "Re-run with --clean to rule out stale objects".to_string(),
            ],
            ReleaseError::Package(PackageError::TemplateUnavailable { cache, .. }) => vec![
                format!("Clone the packaging template to {}", cache.display()),
                "Check network access to the template remote".to_string(),
            ],
            ReleaseError::Upload(UploadError::Rejected { .. })
            | ReleaseError::Upload(UploadError::EmptyToken) => vec![
                "Verify the bot token and that the bot can post to the channel".to_string(),
            ],
            ReleaseError::Upload(UploadError::Transport { .. }) => vec![
                "The archive was built; upload it manually or re-run the release".to_string(),
            ],
            ReleaseError::Exec(ExecError::Spawn { .. }) => vec![
                "Make sure the program is installed and on PATH".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Build log lines worth showing alongside this error
    pub fn log_tail(&self) -> &[String] {
        match self {
            ReleaseError::Build(e) => e.log_tail(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_carries_log_tail() {
        let err = ReleaseError::from(BuildError::MissingImage {
            path: PathBuf::from("out/arch/arm64/boot/Image.gz-dtb"),
            log_tail: vec!["error: implicit declaration".to_string()],
        });
        assert_eq!(err.log_tail(), ["error: implicit declaration".to_string()]);
        assert!(err.to_string().contains("Image.gz-dtb"));
    }

    #[test]
    fn test_upload_error_has_no_log_tail() {
        let err = ReleaseError::from(UploadError::EmptyToken);
        assert!(err.log_tail().is_empty());
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_anyhow_context_is_rendered() {
        let inner = anyhow::anyhow!("missing field `arch`").context("parsing profile.toml");
        let err = ReleaseError::from(inner);
        assert_eq!(err.to_string(), "parsing profile.toml: missing field `arch`");
    }
}
