//! Change-set collection from the working tree, index and untracked files.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use git2::{
    DiffFindOptions, DiffFormat, DiffOptions, ErrorCode, Repository, Status, StatusEntry,
    StatusOptions, Tree,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::git::diff_split;

/// Change status of a path relative to the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Tracked file with modified content.
    Modified,
    /// New file staged in the index.
    Added,
    /// Tracked file removed from the index or working tree.
    Deleted,
    /// New file not yet known to git.
    Untracked,
    /// Tracked file moved to a new path.
    Renamed,
}

impl ChangeStatus {
    /// Single-letter code in the style of `git status --short`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Modified => "M",
            Self::Added => "A",
            Self::Deleted => "D",
            Self::Untracked => "??",
            Self::Renamed => "R",
        }
    }

    /// Whether the path is new to the repository.
    pub fn is_new(self) -> bool {
        matches!(self, Self::Added | Self::Untracked)
    }

    /// Maps libgit2 status flags to a change status.
    ///
    /// Returns `None` for entries that carry no change (current or ignored).
    pub fn from_flags(flags: Status) -> Option<Self> {
        if flags.is_empty() || flags.contains(Status::IGNORED) {
            return None;
        }

        let index_flags = Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE;

        if flags.contains(Status::WT_NEW) && !flags.intersects(index_flags) {
            Some(Self::Untracked)
        } else if flags.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
            Some(Self::Renamed)
        } else if flags.contains(Status::INDEX_NEW) {
            Some(Self::Added)
        } else if flags.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
            Some(Self::Deleted)
        } else {
            Some(Self::Modified)
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Untracked => "untracked",
            Self::Renamed => "renamed",
        };
        f.write_str(label)
    }
}

/// One changed path with its status and patch text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Change status against HEAD.
    pub status: ChangeStatus,
    /// Path before a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    /// Unified patch text; absent for deleted and binary files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_text: Option<String>,
}

impl ChangedFile {
    /// Creates a changed file without diff text.
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
            previous_path: None,
            diff_text: None,
        }
    }

    /// Records the path a renamed file was moved from.
    pub fn renamed_from(mut self, previous_path: impl Into<String>) -> Self {
        self.previous_path = Some(previous_path.into());
        self
    }

    /// Attaches patch text.
    pub fn with_diff(mut self, diff_text: impl Into<String>) -> Self {
        self.diff_text = Some(diff_text.into());
        self
    }
}

/// The set of changed files in one snapshot, unique by path and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    files: Vec<ChangedFile>,
}

impl ChangeSet {
    /// Builds a change set; a later entry for an already-seen path replaces it.
    pub fn new(files: impl IntoIterator<Item = ChangedFile>) -> Self {
        let by_path: BTreeMap<String, ChangedFile> = files
            .into_iter()
            .map(|file| (file.path.clone(), file))
            .collect();
        Self {
            files: by_path.into_values().collect(),
        }
    }

    /// Changed files ordered by path.
    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    /// Number of changed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up a changed file by path.
    pub fn get(&self, path: &str) -> Option<&ChangedFile> {
        self.files
            .binary_search_by(|file| file.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    /// Whether `path` is part of the change set.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Number of files with the given status.
    pub fn count(&self, status: ChangeStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    /// Number of files new to the repository (added or untracked).
    pub fn new_file_count(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_new()).count()
    }

    /// Returns a copy without the given paths.
    pub fn without(&self, excluded: &BTreeSet<String>) -> Self {
        Self {
            files: self
                .files
                .iter()
                .filter(|f| !excluded.contains(&f.path))
                .cloned()
                .collect(),
        }
    }
}

/// Collects the working-tree, staged and untracked delta against HEAD.
///
/// Ignored files are not requested. The repository is only read.
pub fn collect_changes(repo: &Repository) -> Result<ChangeSet, AnalysisError> {
    let mut status_opts = StatusOptions::new();
    status_opts
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .renames_head_to_index(true)
        .renames_index_to_workdir(true);

    let statuses = repo.statuses(Some(&mut status_opts))?;

    let mut entries: Vec<(String, ChangeStatus, Option<String>)> = Vec::new();
    for entry in statuses.iter() {
        let Some(status) = ChangeStatus::from_flags(entry.status()) else {
            continue;
        };
        if let Some(path) = entry_path(&entry) {
            let previous_path = if status == ChangeStatus::Renamed {
                previous_entry_path(&entry).filter(|previous| *previous != path)
            } else {
                None
            };
            entries.push((path, status, previous_path));
        }
    }

    if entries.is_empty() {
        debug!("Working tree is clean");
        return Ok(ChangeSet::default());
    }

    let patches = collect_patches(repo)?;

    let files = entries.into_iter().map(|(path, status, previous_path)| {
        let diff_text = if status == ChangeStatus::Deleted {
            None
        } else {
            patches.get(&path).cloned().flatten()
        };
        ChangedFile {
            path,
            status,
            previous_path,
            diff_text,
        }
    });

    let change_set = ChangeSet::new(files);
    debug!(file_count = change_set.len(), "Collected change set");
    Ok(change_set)
}

/// Prefers the post-change path so renamed entries report their new location.
fn entry_path(entry: &StatusEntry<'_>) -> Option<String> {
    entry
        .index_to_workdir()
        .and_then(|delta| delta.new_file().path().map(|p| p.to_path_buf()))
        .or_else(|| {
            entry
                .head_to_index()
                .and_then(|delta| delta.new_file().path().map(|p| p.to_path_buf()))
        })
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .or_else(|| entry.path().map(str::to_string))
}

/// Pre-change path of a renamed entry, taken from the earliest side of the rename.
fn previous_entry_path(entry: &StatusEntry<'_>) -> Option<String> {
    entry
        .head_to_index()
        .and_then(|delta| delta.old_file().path().map(|p| p.to_path_buf()))
        .or_else(|| {
            entry
                .index_to_workdir()
                .and_then(|delta| delta.old_file().path().map(|p| p.to_path_buf()))
        })
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, AnalysisError> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            debug!("HEAD is unborn, diffing against the empty tree");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Renders the HEAD → workdir patch and splits it per file.
///
/// Binary files map to `None`.
fn collect_patches(repo: &Repository) -> Result<BTreeMap<String, Option<String>>, AnalysisError> {
    let tree = head_tree(repo)?;

    let mut diff_opts = DiffOptions::new();
    diff_opts
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);

    let mut diff = repo.diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut diff_opts))?;
    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))?;

    let mut patch = String::new();
    let mut binary_paths = BTreeSet::new();

    diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        if delta.flags().is_binary() {
            if let Some(path) = delta.new_file().path() {
                binary_paths.insert(path.to_string_lossy().replace('\\', "/"));
            }
        }

        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                patch.push(origin);
                patch.push_str(&content);
            }
            _ => patch.push_str(&content),
        }
        true
    })?;

    let mut patches = BTreeMap::new();
    for file_diff in diff_split::split_by_file(&patch) {
        let text = if binary_paths.contains(&file_diff.path) || file_diff.is_binary() {
            None
        } else {
            Some(file_diff.content)
        };
        patches.insert(file_diff.path, text);
    }

    Ok(patches)
}
