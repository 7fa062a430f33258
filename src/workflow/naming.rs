//! Archive naming: `<prefix>-<YYYYMMDD-HHMM>[-<revision>].zip`.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::path::Path;

/// Hex digits kept from the commit id
pub const REVISION_LEN: usize = 7;

/// Build the archive file name.
pub fn artifact_name(prefix: &str, timestamp: NaiveDateTime, revision: Option<&str>) -> String {
    let mut name = format!("{}-{}", prefix, timestamp.format("%Y%m%d-%H%M"));
    if let Some(rev) = revision {
        name.push('-');
        name.push_str(rev);
    }
    name.push_str(".zip");
    name
}

/// Wall-clock time of `instant` in `timezone`, `None` if the zone is unknown.
///
/// Accepts IANA names (`Asia/Kolkata`) with an optional leading `:` as in `TZ`.
pub fn time_in_zone(timezone: &str, instant: DateTime<Utc>) -> Option<NaiveDateTime> {
    let tz: Tz = timezone.trim().trim_start_matches(':').parse().ok()?;
    Some(instant.with_timezone(&tz).naive_local())
}

/// Current time in the build's timezone, falling back to the host zone.
pub fn release_timestamp(timezone: &str) -> NaiveDateTime {
    time_in_zone(timezone, Utc::now()).unwrap_or_else(|| {
        log::warn!("Unknown timezone '{timezone}', using the host timezone for the archive name");
        chrono::Local::now().naive_local()
    })
}

/// Short commit id of `HEAD` when `dir` is inside a git checkout.
///
/// Returns `None` outside a repository and for a repository without commits.
pub fn source_revision(dir: &Path) -> Option<String> {
    let repo = match gix::discover(dir) {
        Ok(repo) => repo,
        Err(e) => {
            log::debug!("{} is not a git checkout: {}", dir.display(), e);
            return None;
        }
    };
    match repo.head_id() {
        Ok(id) => Some(id.to_hex_with_len(REVISION_LEN).to_string()),
        Err(e) => {
            log::debug!("HEAD of {} does not resolve: {}", dir.display(), e);
            None
        }
    }
}
