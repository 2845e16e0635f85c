//! Error types for the change-analysis engine.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that prevent an analysis run from producing a report.
///
/// A clean repository surfaces as [`AnalysisError::NothingToAnalyze`], never
/// as an empty report, so callers can tell "found nothing" apart from
/// "could not run".
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The path is not inside a git working tree.
    #[error("Not a git repository (or not a working tree): {}", path.display())]
    NotARepository {
        /// Path the engine was pointed at.
        path: PathBuf,
    },

    /// The working tree has no changes against HEAD.
    #[error("No changes to analyze")]
    NothingToAnalyze,

    /// libgit2 failed while reading repository state.
    #[error("Failed to read repository state: {0}")]
    Git(#[from] git2::Error),
}

impl AnalysisError {
    /// Whether this error means "clean working tree" rather than a failure.
    pub fn is_nothing_to_analyze(&self) -> bool {
        matches!(self, Self::NothingToAnalyze)
    }
}
