//! Context structure shared by every workflow stage.

use crate::cli::OutputManager;
use crate::config::BuildConfig;

/// Context for executing workflow stages with all required dependencies
pub struct StageContext<'a, E> {
    /// Immutable configuration for this run
    pub config: &'a BuildConfig,
    /// Runs external programs
    pub executor: &'a E,
    /// Terminal output
    pub output: &'a OutputManager,
}
