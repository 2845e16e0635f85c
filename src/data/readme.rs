//! Changelog maintenance in the project README.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::data::deployment_log::DeploymentLog;
use crate::data::write_atomic;

/// Heading of the changelog section.
pub const RECENT_UPDATES_HEADING: &str = "## Recent Updates";

/// Renders the changelog entry for a deployment.
pub fn changelog_entry(log: &DeploymentLog) -> String {
    let date = log.date.split_whitespace().next().unwrap_or_default();
    let mut entry = format!(
        "### Deployment {} - {}: {}\n\n{}\n",
        log.number_label(),
        date,
        log.title,
        log.description
    );
    if !log.key_features.is_empty() {
        entry.push('\n');
        for feature in &log.key_features {
            entry.push_str(&format!("- {feature}\n"));
        }
    }
    entry
}

/// Inserts `entry` at the top of the `## Recent Updates` section.
///
/// The section is appended when missing. Everything else in the README is
/// left untouched.
pub fn update_changelog(readme: &str, entry: &str) -> String {
    let entry = entry.trim_end();
    let lines: Vec<&str> = readme.lines().collect();

    match lines
        .iter()
        .position(|line| line.trim_end() == RECENT_UPDATES_HEADING)
    {
        Some(idx) => {
            let rest_start = lines[idx + 1..]
                .iter()
                .position(|line| !line.trim().is_empty())
                .map_or(lines.len(), |offset| idx + 1 + offset);

            let mut out: Vec<&str> = lines[..=idx].to_vec();
            out.push("");
            out.push(entry);
            if rest_start < lines.len() {
                out.push("");
                out.extend_from_slice(&lines[rest_start..]);
            }
            let mut result = out.join("\n");
            result.push('\n');
            result
        }
        None => {
            let mut result = readme.trim_end().to_string();
            if !result.is_empty() {
                result.push_str("\n\n");
            }
            result.push_str(RECENT_UPDATES_HEADING);
            result.push_str("\n\n");
            result.push_str(entry);
            result.push('\n');
            result
        }
    }
}

/// Adds `entry` to the README at `path`, creating the file if needed.
pub fn update_readme(path: &Path, project_name: &str, entry: &str) -> Result<()> {
    let current = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read README: {}", path.display()))?
    } else {
        format!("# {project_name}\n\n")
    };

    write_atomic(path, &update_changelog(&current, entry))?;
    info!(path = %path.display(), "Updated README changelog");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn section_is_appended_when_missing() {
        let updated = update_changelog("# Demo\n\nSome intro.\n", "### Deployment 0001 - 2026-10-19: First\n");
        assert_eq!(
            updated,
            "# Demo\n\nSome intro.\n\n## Recent Updates\n\n### Deployment 0001 - 2026-10-19: First\n"
        );
    }

    #[test]
    fn new_entry_goes_on_top() {
        let readme = "# Demo\n\n## Recent Updates\n\n### Deployment 0001 - 2026-10-18: First\n\n## License\n\nMIT\n";
        let updated = update_changelog(readme, "### Deployment 0002 - 2026-10-19: Second\n");
        assert_eq!(
            updated,
            "# Demo\n\n## Recent Updates\n\n### Deployment 0002 - 2026-10-19: Second\n\n### Deployment 0001 - 2026-10-18: First\n\n## License\n\nMIT\n"
        );
    }

    #[test]
    fn empty_section_at_end() {
        let updated = update_changelog("# Demo\n\n## Recent Updates\n", "entry");
        assert_eq!(updated, "# Demo\n\n## Recent Updates\n\nentry\n");
    }

    #[test]
    fn entry_lists_key_features() {
        let log = DeploymentLog {
            number: 4,
            date: "2026-10-19 10:00:00 +02:00".to_string(),
            title: "Website".to_string(),
            description: "Updates 0 modified files and adds 1 new file.".to_string(),
            key_features: vec!["Analytics integration updates".to_string()],
            ..DeploymentLog::default()
        };
        assert_eq!(
            changelog_entry(&log),
            "### Deployment 0004 - 2026-10-19: Website\n\nUpdates 0 modified files and adds 1 new file.\n\n- Analytics integration updates\n"
        );
    }

    #[test]
    fn missing_readme_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README.md");
        update_readme(&path, "demo", "### Deployment 0001 - 2026-10-19: First\n").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# demo\n\n## Recent Updates\n\n### Deployment 0001 - 2026-10-19: First\n"
        );
    }
}
