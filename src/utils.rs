//! Utility functions and helpers.

pub mod general;
pub mod preflight;
pub mod settings;

pub use general::*;
pub use preflight::{check_commit_identity, check_git_repository, check_ship_prerequisites};
pub use settings::Settings;
