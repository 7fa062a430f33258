//! Immutable build configuration.
//!
//! A [`BuildConfig`] is assembled once from the device profile and the CLI
//! overrides, then borrowed by every workflow stage. The environment handed to
//! child processes is computed here; the orchestrator never mutates its own
//! process environment.

mod profile;

pub use profile::{
    DEFAULT_PROFILE_NAME, DeviceProfile, DeviceSettings, IdentitySettings, PackagingSettings,
    ProvisionSettings, ToolchainSettings, UploadSettings,
};

use crate::error::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Values taken from flags and the environment that win over the profile
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Kernel source tree
    pub source_dir: PathBuf,
    /// Directory receiving the archive and build log
    pub work_dir: PathBuf,
    /// `KBUILD_BUILD_USER`
    pub build_user: Option<String>,
    /// `KBUILD_BUILD_HOST`
    pub build_host: Option<String>,
    /// Toolchain root
    pub toolchain_dir: Option<PathBuf>,
    /// `TZ`
    pub timezone: Option<String>,
    /// Parallel make jobs; host CPU count when unset
    pub jobs: Option<usize>,
}

/// Configuration for one release run
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Absolute kernel source tree
    pub source_dir: PathBuf,
    /// Absolute working directory
    pub work_dir: PathBuf,
    /// Absolute build output directory
    pub out_dir: PathBuf,
    /// Absolute build log path
    pub log_file: PathBuf,
    /// Cached packaging template, `~` expanded
    pub template_cache: PathBuf,
    /// Parallel make jobs
    pub jobs: usize,
    /// Device profile with overrides applied
    pub profile: DeviceProfile,
    env: Vec<(String, String)>,
}

impl BuildConfig {
    /// Build the configuration and the child-process environment.
    ///
    /// `inherited_path` is the `PATH` the toolchain directory gets prepended to.
    pub fn new(
        mut profile: DeviceProfile,
        overrides: ConfigOverrides,
        inherited_path: Option<OsString>,
    ) -> Result<Self> {
        if let Some(user) = overrides.build_user {
            profile.identity.user = user;
        }
        if let Some(host) = overrides.build_host {
            profile.identity.host = host;
        }
        if let Some(tz) = overrides.timezone {
            profile.identity.timezone = tz;
        }
        if overrides.toolchain_dir.is_some() {
            profile.toolchain.dir = overrides.toolchain_dir;
        }

        let source_dir = std::path::absolute(&overrides.source_dir)?;
        let work_dir = std::path::absolute(&overrides.work_dir)?;
        let out_dir = source_dir.join(&profile.device.out_dir);
        let log_file = work_dir.join(&profile.device.log_file);
        let template_cache = expand_home(&profile.packaging.template_cache);
        let jobs = overrides.jobs.unwrap_or_else(num_cpus::get).max(1);

        let env = prepare_environment(&profile, inherited_path)?;

        Ok(Self {
            source_dir,
            work_dir,
            out_dir,
            log_file,
            template_cache,
            jobs,
            profile,
            env,
        })
    }

    /// Environment passed to every child process
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// `PATH` handed to child processes
    pub fn search_path(&self) -> Option<&str> {
        self.env
            .iter()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| value.as_str())
    }

    /// Target device settings
    pub fn device(&self) -> &DeviceSettings {
        &self.profile.device
    }

    /// `O=<out> ARCH=<arch>`
    pub fn make_base_args(&self) -> Vec<String> {
        vec![
            format!("O={}", self.out_dir.display()),
            format!("ARCH={}", self.profile.device.arch),
        ]
    }

    /// Arguments materializing the defconfig into `<out>/.config`
    pub fn defconfig_args(&self) -> Vec<String> {
        let mut args = self.make_base_args();
        args.push(self.profile.device.defconfig.clone());
        args
    }

    /// Arguments minimizing the config into `<out>/defconfig`
    pub fn savedefconfig_args(&self) -> Vec<String> {
        let mut args = self.defconfig_args();
        args.push("savedefconfig".to_string());
        args
    }

    /// Arguments for the compile step
    pub fn compile_args(&self) -> Vec<String> {
        let mut args = vec![format!("-j{}", self.jobs)];
        args.extend(self.make_base_args());
        args.push(format!("CC={}", self.profile.toolchain.cc));
        args.extend(self.profile.toolchain.make_vars.iter().cloned());
        args
    }

    /// Where the compile step leaves the boot image
    pub fn image_path(&self) -> PathBuf {
        self.out_dir
            .join("arch")
            .join(&self.profile.device.arch)
            .join("boot")
            .join(&self.profile.device.image)
    }

    /// Defconfig inside the source tree
    pub fn defconfig_path(&self) -> PathBuf {
        self.source_dir
            .join("arch")
            .join(&self.profile.device.arch)
            .join("configs")
            .join(&self.profile.device.defconfig)
    }

    /// Minimized config written by `make savedefconfig`
    pub fn saved_defconfig_path(&self) -> PathBuf {
        self.out_dir.join("defconfig")
    }

    /// Directory name the template is staged under
    pub fn staging_name(&self) -> &Path {
        &self.profile.packaging.staging_dir
    }

    /// Device installer script override inside the source tree
    pub fn installer_script_path(&self) -> Option<PathBuf> {
        self.profile
            .packaging
            .installer_script
            .as_ref()
            .map(|script| self.source_dir.join(script))
    }
}

/// Compute the child environment: identity, timezone, search path, cross prefixes.
fn prepare_environment(
    profile: &DeviceProfile,
    inherited_path: Option<OsString>,
) -> Result<Vec<(String, String)>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &profile.toolchain.dir {
        paths.push(expand_home(dir).join("bin"));
    }
    if let Some(inherited) = &inherited_path {
        paths.extend(std::env::split_paths(inherited));
    }
    let path = std::env::join_paths(paths).map_err(|e| {
        crate::error::CliError::InvalidArguments {
            reason: format!("toolchain directory cannot be placed on PATH: {e}"),
        }
    })?;

    let toolchain = &profile.toolchain;
    let mut env = vec![
        ("TZ".to_string(), profile.identity.timezone.clone()),
        ("KBUILD_BUILD_USER".to_string(), profile.identity.user.clone()),
        ("KBUILD_BUILD_HOST".to_string(), profile.identity.host.clone()),
        ("ARCH".to_string(), profile.device.arch.clone()),
        ("SUBARCH".to_string(), profile.device.subarch.clone()),
        ("CROSS_COMPILE".to_string(), toolchain.cross_compile.clone()),
        (
            "CROSS_COMPILE_ARM32".to_string(),
            toolchain.cross_compile_arm32.clone(),
        ),
    ];
    // An empty PATH would hide every program from the children.
    if !path.is_empty() {
        env.push(("PATH".to_string(), path.to_string_lossy().into_owned()));
    }
    Ok(env)
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
