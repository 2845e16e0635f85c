//! Staging and deployment commit creation.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Oid, Repository};
use tracing::{debug, info};

use crate::git::changes::{ChangeSet, ChangeStatus};
use crate::utils::clip;

/// Name recorded in the commit trailer.
const AUTOMATED_BY: &str = "git-deploy";

/// Maximum length of the commit subject line.
pub const SUBJECT_MAX_LEN: usize = 72;

/// Content of a deployment commit message.
#[derive(Debug, Clone)]
pub struct DeploymentCommit {
    /// Deployment number, e.g. `0007`.
    pub deployment_number: String,
    /// Deployment title.
    pub title: String,
    /// One-paragraph summary.
    pub description: String,
    /// Branch the commit lands on.
    pub branch: String,
    /// Commit timestamp.
    pub timestamp: DateTime<FixedOffset>,
}

impl DeploymentCommit {
    /// Renders the full commit message.
    pub fn message(&self) -> String {
        let subject = clip(
            &format!("Deployment {}: {}", self.deployment_number, self.title),
            SUBJECT_MAX_LEN,
        );

        let mut message = format!("{subject}\n\n");
        message.push_str(&format!("Branch: {}\n", self.branch));
        message.push_str(&format!("Automated by: {AUTOMATED_BY}\n"));
        message.push_str(&format!("Timestamp: {}\n", self.timestamp.to_rfc3339()));
        message.push_str(&format!("Deployment Log: {}\n", self.deployment_number));
        message.push_str(&format!("\nSummary: {}\n", self.description));
        message
    }
}

/// Stages every path of `changes` plus `extra_paths` into the index.
///
/// Deleted paths, and paths that no longer exist on disk, are removed from
/// the index; renamed files also drop their previous path. Returns the
/// number of index updates.
pub fn stage_changes(repo: &Repository, changes: &ChangeSet, extra_paths: &[String]) -> Result<usize> {
    let workdir = repo
        .workdir()
        .context("Cannot stage changes in a bare repository")?;
    let mut index = repo.index().context("Failed to open repository index")?;
    let mut updates = 0;

    for file in changes.files() {
        if let Some(previous) = &file.previous_path {
            remove_from_index(&mut index, previous)?;
            updates += 1;
        }

        if file.status == ChangeStatus::Deleted || !workdir.join(&file.path).exists() {
            remove_from_index(&mut index, &file.path)?;
        } else {
            index
                .add_path(Path::new(&file.path))
                .with_context(|| format!("Failed to stage {}", file.path))?;
        }
        updates += 1;
    }

    for path in extra_paths {
        if workdir.join(path).exists() {
            index
                .add_path(Path::new(path))
                .with_context(|| format!("Failed to stage {path}"))?;
            updates += 1;
        }
    }

    index.write().context("Failed to write repository index")?;
    debug!(updates, "Staged deployment changes");
    Ok(updates)
}

fn remove_from_index(index: &mut git2::Index, path: &str) -> Result<()> {
    if index.get_path(Path::new(path), 0).is_some() {
        index
            .remove_path(Path::new(path))
            .with_context(|| format!("Failed to unstage {path}"))?;
    }
    Ok(())
}

/// Resets the index entries of `paths` to HEAD.
///
/// Paths absent from HEAD, or every path on an unborn branch, leave the
/// index. The working tree is untouched.
pub fn unstage_paths(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let head = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().context("Failed to peel HEAD to commit")?),
        Err(_) => None,
    };
    match &head {
        Some(commit) => repo
            .reset_default(Some(commit.as_object()), paths.iter().map(String::as_str))
            .context("Failed to reset excluded paths to HEAD")?,
        None => {
            let mut index = repo.index().context("Failed to open repository index")?;
            for path in paths {
                remove_from_index(&mut index, path)?;
            }
            index.write().context("Failed to write repository index")?;
        }
    }

    debug!(paths = paths.len(), "Unstaged excluded paths");
    Ok(())
}

/// Creates a commit of the current index on HEAD.
pub fn create_commit(repo: &Repository, message: &str) -> Result<Oid> {
    let mut index = repo.index().context("Failed to open repository index")?;
    let tree_id = index.write_tree().context("Failed to write index tree")?;
    let tree = repo.find_tree(tree_id).context("Failed to find index tree")?;

    let signature = repo
        .signature()
        .context("Failed to determine commit author; set user.name and user.email")?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().context("Failed to peel HEAD to commit")?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .context("Failed to create deployment commit")?;

    info!(commit = %oid, "Created deployment commit");
    Ok(oid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::git::changes::ChangedFile;
    use std::fs;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        (temp_dir, repo)
    }

    fn sample_commit() -> DeploymentCommit {
        DeploymentCommit {
            deployment_number: "0003".to_string(),
            title: "Mobile App, Website".to_string(),
            description: "Updates 1 modified file and adds 1 new file.".to_string(),
            branch: "main".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-10-19T10:00:00+02:00").unwrap(),
        }
    }

    #[test]
    fn message_contains_subject_and_trailers() {
        let message = sample_commit().message();
        assert!(message.starts_with("Deployment 0003: Mobile App, Website\n\n"));
        assert!(message.contains("Branch: main\n"));
        assert!(message.contains("Automated by: git-deploy\n"));
        assert!(message.contains("Timestamp: 2026-10-19T10:00:00+02:00\n"));
        assert!(message.contains("Deployment Log: 0003\n"));
        assert!(message.ends_with("Summary: Updates 1 modified file and adds 1 new file.\n"));
    }

    #[test]
    fn long_subject_is_clipped() {
        let mut commit = sample_commit();
        commit.title = "x".repeat(200);
        let subject = commit.message().lines().next().unwrap().to_string();
        assert_eq!(subject.chars().count(), SUBJECT_MAX_LEN);
        assert!(subject.ends_with("..."));
    }

    #[test]
    fn stage_and_commit_on_unborn_branch() {
        let (temp_dir, repo) = init_repo();
        fs::write(temp_dir.path().join("app.txt"), "hello\n").unwrap();
        fs::write(temp_dir.path().join("README.md"), "# demo\n").unwrap();

        let changes = ChangeSet::new(vec![ChangedFile::new("app.txt", ChangeStatus::Untracked)]);
        let updates = stage_changes(&repo, &changes, &["README.md".to_string()]).unwrap();
        assert_eq!(updates, 2);

        let oid = create_commit(&repo, &sample_commit().message()).unwrap();
        let commit = repo.find_commit(oid).unwrap();
        assert_eq!(commit.parent_count(), 0);
        let tree = commit.tree().unwrap();
        assert!(tree.get_name("app.txt").is_some());
        assert!(tree.get_name("README.md").is_some());
    }

    #[test]
    fn unstaged_path_on_unborn_branch_leaves_commit() {
        let (temp_dir, repo) = init_repo();
        fs::write(temp_dir.path().join("app.txt"), "hello\n").unwrap();
        fs::write(temp_dir.path().join(".env"), "API_KEY=abc123\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(".env")).unwrap();
        index.write().unwrap();

        let changes = ChangeSet::new(vec![ChangedFile::new("app.txt", ChangeStatus::Untracked)]);
        stage_changes(&repo, &changes, &[]).unwrap();
        unstage_paths(&repo, &[".env".to_string()]).unwrap();
        let oid = create_commit(&repo, "deploy").unwrap();

        let tree = repo.find_commit(oid).unwrap().tree().unwrap();
        assert!(tree.get_name("app.txt").is_some());
        assert!(tree.get_name(".env").is_none());
        assert!(temp_dir.path().join(".env").exists());
    }

    #[test]
    fn unstaged_path_returns_to_head_content() {
        let (temp_dir, repo) = init_repo();
        let file = temp_dir.path().join("config.yml");
        fs::write(&file, "debug: false\n").unwrap();
        let added = ChangeSet::new(vec![ChangedFile::new("config.yml", ChangeStatus::Untracked)]);
        stage_changes(&repo, &added, &[]).unwrap();
        let first = create_commit(&repo, "initial").unwrap();

        fs::write(&file, "password: \"hunter2\"\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("config.yml")).unwrap();
        index.write().unwrap();
        unstage_paths(&repo, &["config.yml".to_string()]).unwrap();
        let second = create_commit(&repo, "deploy").unwrap();

        let first_tree = repo.find_commit(first).unwrap().tree().unwrap();
        let second_tree = repo.find_commit(second).unwrap().tree().unwrap();
        assert_eq!(
            first_tree.get_name("config.yml").unwrap().id(),
            second_tree.get_name("config.yml").unwrap().id()
        );
    }

    #[test]
    fn deleted_file_is_removed_from_index() {
        let (temp_dir, repo) = init_repo();
        let file = temp_dir.path().join("old.txt");
        fs::write(&file, "bye\n").unwrap();
        let added = ChangeSet::new(vec![ChangedFile::new("old.txt", ChangeStatus::Untracked)]);
        stage_changes(&repo, &added, &[]).unwrap();
        create_commit(&repo, "initial").unwrap();

        fs::remove_file(&file).unwrap();
        let deleted = ChangeSet::new(vec![ChangedFile::new("old.txt", ChangeStatus::Deleted)]);
        stage_changes(&repo, &deleted, &[]).unwrap();
        let oid = create_commit(&repo, "remove").unwrap();

        let tree = repo.find_commit(oid).unwrap().tree().unwrap();
        assert!(tree.get_name("old.txt").is_none());
    }
}
