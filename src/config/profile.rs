//! Device profile loaded from TOML.
//!
//! Every section is optional; missing keys fall back to the reference device
//! (Xiaomi `lavender`, arm64, clang, AnyKernel3).

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the kernel source tree when `--profile` is not given
pub const DEFAULT_PROFILE_NAME: &str = "kernel-release.toml";

/// Top-level profile document
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceProfile {
    /// Target device
    pub device: DeviceSettings,
    /// Compiler and cross-compile settings
    pub toolchain: ToolchainSettings,
    /// Build identity baked into the kernel
    pub identity: IdentitySettings,
    /// Host package provisioning
    pub provision: ProvisionSettings,
    /// Flashable zip template
    pub packaging: PackagingSettings,
    /// Upload endpoints
    pub upload: UploadSettings,
}

impl DeviceProfile {
    /// Load a profile from disk
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading device profile {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing device profile {}", path.display()))
    }

    /// Parse a profile from TOML text
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path` if given, else the default profile inside `source_dir` if present,
    /// else the built-in defaults.
    pub fn resolve(path: Option<&Path>, source_dir: &Path) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let candidate = source_dir.join(DEFAULT_PROFILE_NAME);
                if candidate.is_file() {
                    log::info!("Using device profile {}", candidate.display());
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Target device and build output layout
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSettings {
    /// Device codename
    pub codename: String,
    /// Kernel `ARCH`
    pub arch: String,
    /// Kernel `SUBARCH`
    pub subarch: String,
    /// Defconfig file name under `arch/<arch>/configs/`
    pub defconfig: String,
    /// Boot image name under `<out>/arch/<arch>/boot/`
    pub image: String,
    /// Archive name prefix
    pub zip_prefix: String,
    /// Build output directory, relative to the source tree
    pub out_dir: PathBuf,
    /// Build log file, relative to the working directory
    pub log_file: PathBuf,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            codename: "lavender".to_string(),
            arch: "arm64".to_string(),
            subarch: "arm64".to_string(),
            defconfig: "lavender-perf_defconfig".to_string(),
            image: "Image.gz-dtb".to_string(),
            zip_prefix: "Kernel-lavender".to_string(),
            out_dir: PathBuf::from("out"),
            log_file: PathBuf::from("build.log"),
        }
    }
}

/// Compiler and cross-compile settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSettings {
    /// Toolchain root; its `bin/` is prepended to `PATH`
    pub dir: Option<PathBuf>,
    /// Compiler passed as `CC=`
    pub cc: String,
    /// Minimum compiler major version
    pub required_major: u32,
    /// `CROSS_COMPILE` prefix
    pub cross_compile: String,
    /// `CROSS_COMPILE_ARM32` prefix
    pub cross_compile_arm32: String,
    /// Extra `KEY=VALUE` variables for the compile step
    pub make_vars: Vec<String>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            dir: None,
            cc: "clang".to_string(),
            required_major: 18,
            cross_compile: "aarch64-linux-gnu-".to_string(),
            cross_compile_arm32: "arm-linux-gnueabi-".to_string(),
            make_vars: vec![
                "LLVM=1".to_string(),
                "LLVM_IAS=1".to_string(),
                "CLANG_TRIPLE=aarch64-linux-gnu-".to_string(),
            ],
        }
    }
}

/// Identity strings baked into the kernel
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySettings {
    /// `KBUILD_BUILD_USER`
    pub user: String,
    /// `KBUILD_BUILD_HOST`
    pub host: String,
    /// `TZ` exported to the build
    pub timezone: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            user: "builder".to_string(),
            host: "buildbot".to_string(),
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

/// Host package and compiler provisioning
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionSettings {
    /// Package manager command line; packages are appended
    pub package_manager: Vec<String>,
    /// Packages required by the kernel build
    pub packages: Vec<String>,
    /// Shell script run with `bash -c` to install the compiler; `{major}` is substituted
    pub toolchain_installer: String,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            package_manager: ["sudo", "apt-get", "install", "-y"]
                .into_iter()
                .map(String::from)
                .collect(),
            packages: [
                "bc",
                "bison",
                "build-essential",
                "ccache",
                "cpio",
                "curl",
                "flex",
                "git",
                "lld",
                "libelf-dev",
                "libssl-dev",
                "lsb-release",
                "software-properties-common",
                "wget",
                "zip",
                "gcc-aarch64-linux-gnu",
                "gcc-arm-linux-gnueabi",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            toolchain_installer:
                "wget -qO /tmp/llvm.sh https://apt.llvm.org/llvm.sh && sudo bash /tmp/llvm.sh {major}"
                    .to_string(),
        }
    }
}

/// Flashable zip template
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackagingSettings {
    /// Template remote
    pub template_url: String,
    /// Template branch
    pub template_branch: String,
    /// Cached template; `~` expands to the home directory
    pub template_cache: PathBuf,
    /// Name of the staged template tree; it lives in a fresh scratch directory under the working directory
    pub staging_dir: PathBuf,
    /// Installer script in the source tree copied over the template's, if present
    pub installer_script: Option<PathBuf>,
}

impl Default for PackagingSettings {
    fn default() -> Self {
        Self {
            template_url: "https://github.com/osm0sis/AnyKernel3".to_string(),
            template_branch: "master".to_string(),
            template_cache: PathBuf::from("~/AnyKernel3"),
            staging_dir: PathBuf::from("AnyKernel3"),
            installer_script: Some(PathBuf::from("anykernel.sh")),
        }
    }
}

/// Upload endpoints
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSettings {
    /// Messaging bot API base URL
    pub telegram_api: String,
    /// Channel receiving the archive
    pub chat_id: String,
    /// Anonymous file host accepting `PUT /<name>`
    pub file_host: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            telegram_api: "https://api.telegram.org".to_string(),
            chat_id: "-1001231303646".to_string(),
            file_host: "https://transfer.sh".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_profile_is_default() {
        assert_eq!(DeviceProfile::parse("").unwrap(), DeviceProfile::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let profile = DeviceProfile::parse(
            r#"
            [device]
            codename = "whyred"
            defconfig = "whyred_defconfig"
            "#,
        )
        .unwrap();

        assert_eq!(profile.device.codename, "whyred");
        assert_eq!(profile.device.defconfig, "whyred_defconfig");
        assert_eq!(profile.device.arch, "arm64");
        assert_eq!(profile.toolchain.required_major, 18);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = DeviceProfile::parse("[device]\ncodenme = \"typo\"\n").unwrap_err();
        assert!(err.to_string().contains("codenme"));
    }

    #[test]
    fn test_resolve_prefers_profile_in_source_tree() {
        let src = TempDir::new().unwrap();
        std::fs::write(
            src.path().join(DEFAULT_PROFILE_NAME),
            "[upload]\nchat_id = \"42\"\n",
        )
        .unwrap();

        let profile = DeviceProfile::resolve(None, src.path()).unwrap();
        assert_eq!(profile.upload.chat_id, "42");
    }

    #[test]
    fn test_resolve_without_profile_uses_defaults() {
        let src = TempDir::new().unwrap();
        let profile = DeviceProfile::resolve(None, src.path()).unwrap();
        assert_eq!(profile, DeviceProfile::default());
    }

    #[test]
    fn test_load_missing_explicit_profile_names_the_file() {
        let err = DeviceProfile::load(Path::new("/nonexistent/kernel-release.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/kernel-release.toml"));
    }
}
