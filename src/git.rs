//! Git operations and repository management.

pub mod changes;
pub mod commit;
pub mod diff_split;
pub mod ignore;
pub mod repository;

pub use changes::{ChangeSet, ChangeStatus, ChangedFile};
pub use commit::DeploymentCommit;
pub use ignore::{IgnoreRule, IgnoreRules};
pub use repository::GitRepository;
