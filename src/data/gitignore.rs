//! Appending excluded sensitive files to `.gitignore`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::data::write_atomic;

/// Comment placed above appended entries.
pub const MARKER: &str = "# Automatically added sensitive files";

/// Appends anchored entries for `files` to the ignore file at `path`.
///
/// Files already listed, anchored or not, are skipped. Returns the entries
/// that were added; nothing is written when that list is empty.
pub fn append_sensitive(path: &Path, files: &[String]) -> Result<Vec<String>> {
    let current = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        String::new()
    };

    let (updated, added) = append_entries(&current, files);
    if added.is_empty() {
        return Ok(added);
    }

    write_atomic(path, &updated)?;
    info!(path = %path.display(), count = added.len(), "Added sensitive files to ignore file");
    Ok(added)
}

/// Pure form of [`append_sensitive`]: returns the new content and the added entries.
pub fn append_entries(current: &str, files: &[String]) -> (String, Vec<String>) {
    let mut existing: HashSet<String> = current
        .lines()
        .map(|line| line.trim().trim_start_matches('/').to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let mut added = Vec::new();
    for file in files {
        let bare = file.trim().trim_start_matches('/');
        if bare.is_empty() {
            continue;
        }
        let escaped = escape_pattern(bare);
        if !existing.insert(escaped.clone()) {
            continue;
        }
        added.push(format!("/{escaped}"));
    }

    if added.is_empty() {
        return (current.to_string(), added);
    }

    let mut updated = current.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    if !updated.is_empty() {
        updated.push('\n');
    }
    updated.push_str(MARKER);
    updated.push('\n');
    for entry in &added {
        updated.push_str(entry);
        updated.push('\n');
    }
    (updated, added)
}

/// Escapes glob metacharacters so the entry matches `path` literally.
fn escape_pattern(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    if path.starts_with(['!', '#']) {
        escaped.push('\\');
    }
    for c in path.chars() {
        if matches!(c, '\\' | '*' | '?' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
