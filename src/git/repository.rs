//! Git repository operations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::Repository;

use crate::error::AnalysisError;
use crate::git::changes::{self, ChangeSet};
use crate::git::ignore::IgnoreRules;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository containing `path`, searching parent directories
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|_| AnalysisError::NotARepository {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(AnalysisError::NotARepository {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { repo })
    }

    /// Get workdir path
    pub fn workdir(&self) -> Result<PathBuf, AnalysisError> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| AnalysisError::NotARepository {
                path: self.repo.path().to_path_buf(),
            })
    }

    /// Get access to the underlying git2::Repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Collect the pending changes against HEAD
    pub fn collect_changes(&self) -> Result<ChangeSet, AnalysisError> {
        changes::collect_changes(&self.repo)
    }

    /// Compile every ignore file in the working tree
    pub fn compile_ignore_rules(&self) -> Result<IgnoreRules, AnalysisError> {
        Ok(IgnoreRules::compile(&self.workdir()?))
    }

    /// Get current branch name
    ///
    /// Works on an unborn branch by reading the symbolic target of HEAD.
    pub fn get_current_branch(&self) -> Result<String> {
        match self.repo.head() {
            Ok(head) => {
                if let Some(name) = head.shorthand() {
                    if name != "HEAD" {
                        return Ok(name.to_string());
                    }
                }
                anyhow::bail!("Repository is in detached HEAD state")
            }
            Err(_) => {
                let head = self
                    .repo
                    .find_reference("HEAD")
                    .context("Failed to get HEAD reference")?;
                head.symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string)
                    .context("Failed to resolve branch of unborn HEAD")
            }
        }
    }

    /// Name of the configured git user, if any
    pub fn user_name(&self) -> Option<String> {
        self.repo
            .config()
            .ok()
            .and_then(|config| config.get_string("user.name").ok())
            .filter(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn open_at_non_repository_is_distinguished() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("not-a-repo");
        std::fs::create_dir_all(&nested).unwrap();

        match GitRepository::open_at(&nested) {
            Err(AnalysisError::NotARepository { path }) => assert_eq!(path, nested),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => {
                // the temp directory lives inside some other checkout; nothing to assert
            }
        }
    }

    #[test]
    fn unborn_branch_name_is_resolved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        repo.set_head("refs/heads/trunk").unwrap();

        let git_repo = GitRepository::open_at(temp_dir.path()).unwrap();
        assert_eq!(git_repo.get_current_branch().unwrap(), "trunk");
    }

    #[test]
    fn empty_repository_has_no_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        Repository::init(temp_dir.path()).unwrap();

        let git_repo = GitRepository::open_at(temp_dir.path()).unwrap();
        assert!(git_repo.collect_changes().unwrap().is_empty());
    }
}
