//! Preflight checks run before a command touches the repository.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::git::GitRepository;

/// Opens the repository containing `path`.
///
/// This is a lightweight check that reads no change data.
pub fn check_git_repository(path: &Path) -> Result<GitRepository> {
    GitRepository::open_at(path).with_context(|| {
        format!(
            "Not in a git repository: {}. Run this command from within a git working tree.",
            path.display()
        )
    })
}

/// Validates that git can sign a commit.
///
/// Both `user.name` and `user.email` must be configured.
pub fn check_commit_identity(repo: &GitRepository) -> Result<()> {
    if let Err(e) = repo.repository().signature() {
        bail!(
            "Cannot create commits without an identity ({}). Configure it with:\n  \
             git config user.name \"Your Name\"\n  git config user.email \"you@example.com\"",
            e.message()
        );
    }
    Ok(())
}

/// Combined preflight check for `ship`.
///
/// The identity check is skipped when no commit will be created.
pub fn check_ship_prerequisites(path: &Path, will_commit: bool) -> Result<GitRepository> {
    let repo = check_git_repository(path)?;
    if will_commit {
        check_commit_identity(&repo)?;
    }
    Ok(repo)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_accepted_when_configured() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(temp_dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        let repo = check_ship_prerequisites(temp_dir.path(), true).unwrap();
        assert!(check_commit_identity(&repo).is_ok());
    }

    #[test]
    fn non_repository_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("plain");
        std::fs::create_dir_all(&nested).unwrap();

        if let Err(e) = check_git_repository(&nested) {
            assert!(e.to_string().contains("Not in a git repository"));
        }
    }
}
