//! Flashable zip assembly.
//!
//! The packaging template is staged in a fresh scratch directory next to the
//! archive, the boot image and its checksum are dropped in, and the tree is
//! compressed. The scratch directory is unique per run, so it can never be the
//! template cache, and it never outlives this stage.

use crate::error::{PackageError, ReleaseError, Result};
use crate::exec::{CommandExecutor, CommandSpec, OutputMode};
use crate::utils::fs;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use super::context::StageContext;

/// Stage the template, add the image, and write `<work_dir>/<archive_name>`.
pub(crate) async fn package_release<E: CommandExecutor>(
    ctx: &StageContext<'_, E>,
    image: &Path,
    archive_name: &str,
) -> Result<PathBuf> {
    let work_dir = &ctx.config.work_dir;
    let scratch = tempfile::Builder::new()
        .prefix(".kernel-release-")
        .tempdir_in(work_dir)
        .map_err(|source| PackageError::Staging {
            path: work_dir.clone(),
            source,
        })?;
    let staging = scratch.path().join(ctx.config.staging_name());
    log::debug!("Staging in {}", staging.display());

    let result = assemble(ctx, image, archive_name, &staging).await;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log::warn!("Leaving {} behind: {e}", scratch_path.display());
    }
    result
}

async fn assemble<E: CommandExecutor>(
    ctx: &StageContext<'_, E>,
    image: &Path,
    archive_name: &str,
    staging: &Path,
) -> Result<PathBuf> {
    obtain_template(ctx, staging).await?;

    let image_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ctx.config.device().image.clone());
    fs::copy_file(image, &staging.join(&image_name)).await?;
    write_checksum(image, &image_name, staging).await?;

    if let Some(script) = ctx.config.installer_script_path() {
        if script.is_file() {
            let name = script.file_name().unwrap_or_default();
            fs::copy_file(&script, &staging.join(name)).await?;
            log::info!("Using installer script {}", script.display());
        } else {
            log::debug!("No installer override at {}", script.display());
        }
    }

    let archive = ctx.config.work_dir.join(archive_name);
    ctx.output.progress(&format!("Creating {archive_name}..."));

    let src = staging.to_path_buf();
    let dst = archive.clone();
    let entries = tokio::task::spawn_blocking(move || create_archive(&src, &dst))
        .await
        .map_err(|e| PackageError::ArchiveFailed {
            path: archive.clone(),
            reason: e.to_string(),
        })??;
    log::info!("Wrote {} entries to {}", entries, archive.display());

    ctx.output.success(&format!("Created {}", archive.display()));
    Ok(archive)
}

/// Copy the cached template if present, otherwise clone the remote.
async fn obtain_template<E: CommandExecutor>(ctx: &StageContext<'_, E>, staging: &Path) -> Result<()> {
    let cache = &ctx.config.template_cache;
    let packaging = &ctx.config.profile.packaging;

    if cache.is_dir() {
        ctx.output
            .progress(&format!("Using cached template {}", cache.display()));
        return fs::copy_dir(cache, staging).await;
    }

    ctx.output
        .progress(&format!("Cloning {}...", packaging.template_url));
    let spec = CommandSpec::new("git")
        .args([
            "clone",
            "-q",
            "--depth=1",
            "-b",
            packaging.template_branch.as_str(),
            packaging.template_url.as_str(),
        ])
        .args([staging.to_string_lossy()])
        .envs(ctx.config.env())
        .output(OutputMode::Capture);

    let unavailable = |reason: String| PackageError::TemplateUnavailable {
        cache: cache.clone(),
        url: packaging.template_url.clone(),
        reason,
    };

    match ctx.executor.run(&spec).await {
        Ok(out) if out.success() && staging.is_dir() => Ok(()),
        Ok(out) if out.success() => Err(unavailable("clone left no directory".to_string()).into()),
        Ok(out) => Err(unavailable(format!(
            "git exited with {}: {}",
            out.status_text(),
            out.stderr.trim()
        ))
        .into()),
        Err(ReleaseError::Exec(e)) => Err(unavailable(e.to_string()).into()),
        Err(e) => Err(e),
    }
}

/// Write `<image>.sha256` in `sha256sum` format.
async fn write_checksum(image: &Path, image_name: &str, staging: &Path) -> Result<()> {
    let data = tokio::fs::read(image).await?;
    let digest = tokio::task::spawn_blocking(move || {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        hex::encode(hasher.finalize())
    })
    .await
    .map_err(|e| anyhow::anyhow!("checksum task failed: {e}"))?;

    let path = staging.join(format!("{image_name}.sha256"));
    tokio::fs::write(&path, format!("{digest}  {image_name}\n"))
        .await
        .map_err(|source| PackageError::Staging { path, source })?;
    Ok(())
}

/// Entries never shipped in the archive: VCS metadata and placeholder files.
fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name == ".git" || (!entry.file_type().is_dir() && name.contains("placeholder"))
}

/// Compress `src_dir` into `archive` (Deflate level 9). Returns the entry count.
fn create_archive(src_dir: &Path, archive: &Path) -> std::result::Result<usize, PackageError> {
    let fail = |reason: String| PackageError::ArchiveFailed {
        path: archive.to_path_buf(),
        reason,
    };

    let file = std::fs::File::create(archive).map_err(|e| fail(e.to_string()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut count = 0;
    let walker = WalkDir::new(src_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e));

    for entry in walker {
        let entry = entry.map_err(|e| fail(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| fail(e.to_string()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.path().is_dir() {
            zip.add_directory(name, options)
                .map_err(|e| fail(e.to_string()))?;
        } else {
            let mut source = std::fs::File::open(entry.path()).map_err(|e| fail(e.to_string()))?;
            zip.start_file(name, options.unix_permissions(file_mode(&source)))
                .map_err(|e| fail(e.to_string()))?;
            std::io::copy(&mut source, &mut zip).map_err(|e| fail(e.to_string()))?;
        }
        count += 1;
    }

    zip.finish().map_err(|e| fail(e.to_string()))?;
    Ok(count)
}

#[cfg(unix)]
fn file_mode(file: &std::fs::File) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    file.metadata().map(|m| m.permissions().mode()).unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_file: &std::fs::File) -> u32 {
    0o644
}
