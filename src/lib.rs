//! # git-deploy
//!
//! Change analysis and secret screening for the "commit and ship" step of a
//! deployment workflow.
//!
//! ## Features
//!
//! - Classifies pending working-tree changes into a structured summary
//! - Flags files that look like secrets, by name or by added content
//! - Writes numbered deployment logs and a README changelog
//! - Creates the deployment commit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use git_deploy::analysis::ChangeAnalyzer;
//!
//! let analysis = ChangeAnalyzer::default()
//!     .analyze_repository(std::path::Path::new("."))
//!     .expect("analysis failed");
//! println!("{}", analysis.report.title);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod git;
pub mod utils;

pub use crate::analysis::{AnalysisReport, ChangeAnalyzer};
pub use crate::cli::Cli;
pub use crate::error::AnalysisError;

/// The current version of git-deploy.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
