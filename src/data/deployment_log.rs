//! Numbered deployment log files.
//!
//! Logs live in a `DeploymentLogs` directory as `Deployment_NNNN.txt`. Each
//! starts with `Key: value` header lines followed by bulleted sections.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::analysis::AnalysisReport;
use crate::data::write_atomic;
use crate::git::ChangeSet;

/// Default directory name, relative to the repository root.
pub const LOG_DIR_NAME: &str = "DeploymentLogs";

const EMPTY_SECTION: &str = "- None";

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static LOG_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Deployment_(\d+)\.txt$").unwrap());

/// Bulleted sections in render order.
const SECTIONS: [&str; 6] = [
    "Categories Affected",
    "Key Features",
    "Technical Changes",
    "Breaking Changes",
    "Security Notes",
    "Files Changed",
];

/// Contents of one deployment log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentLog {
    /// Sequential deployment number.
    pub number: u32,
    /// Human-readable deployment date.
    pub date: String,
    /// Who ran the deployment.
    pub deployed_by: String,
    /// Branch deployed from.
    pub branch: String,
    /// Deployment title.
    pub title: String,
    /// One-paragraph description.
    pub description: String,
    /// Bucket labels touched.
    pub categories: Vec<String>,
    /// User-facing features.
    pub key_features: Vec<String>,
    /// Internal changes.
    pub technical_changes: Vec<String>,
    /// Breaking changes.
    pub breaking_changes: Vec<String>,
    /// Security warnings and exclusions.
    pub security_notes: Vec<String>,
    /// `CODE path` lines of the shipped files.
    pub files: Vec<String>,
}

impl DeploymentLog {
    /// Builds a log entry from an analysis report.
    ///
    /// `excluded` names sensitive files held back from the deployment.
    pub fn from_report(
        number: u32,
        date: impl Into<String>,
        deployed_by: impl Into<String>,
        branch: impl Into<String>,
        report: &AnalysisReport,
        changes: &ChangeSet,
        excluded: &[String],
    ) -> Self {
        let mut security_notes: Vec<String> = report
            .security_warnings
            .iter()
            .map(|warning| format!("{}: {}", warning.message, warning.files.join(", ")))
            .collect();
        if !excluded.is_empty() {
            security_notes.push(format!("Excluded from deployment: {}", excluded.join(", ")));
        }

        let files = changes
            .files()
            .iter()
            .filter(|file| !excluded.contains(&file.path))
            .map(|file| format!("{} {}", file.status.code(), file.path))
            .collect();

        Self {
            number,
            date: date.into(),
            deployed_by: deployed_by.into(),
            branch: branch.into(),
            title: report.title.clone(),
            description: report.description.clone(),
            categories: report.details.categories_affected.clone(),
            key_features: report.details.key_features.clone(),
            technical_changes: report.details.technical_changes.clone(),
            breaking_changes: report.details.breaking_changes.clone(),
            security_notes,
            files,
        }
    }

    /// Zero-padded deployment number, e.g. `0007`.
    pub fn number_label(&self) -> String {
        format_number(self.number)
    }

    /// File name of this log.
    pub fn file_name(&self) -> String {
        log_file_name(self.number)
    }

    /// Renders the log file content.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Deployment Number: {}\n", self.number_label()));
        out.push_str(&format!("Deployment Date: {}\n", single_line(&self.date)));
        out.push_str(&format!("Deployed By: {}\n", single_line(&self.deployed_by)));
        out.push_str(&format!("Branch: {}\n", single_line(&self.branch)));
        out.push_str(&format!("Title: {}\n", single_line(&self.title)));
        out.push_str(&format!("Description: {}\n", single_line(&self.description)));

        for (heading, items) in SECTIONS.iter().zip(self.section_items()) {
            out.push('\n');
            if *heading == "Files Changed" {
                out.push_str(&format!("{heading} ({}):\n", items.len()));
            } else {
                out.push_str(&format!("{heading}:\n"));
            }
            if items.is_empty() {
                out.push_str(EMPTY_SECTION);
                out.push('\n');
            }
            for item in items {
                out.push_str(&format!("- {}\n", single_line(item)));
            }
        }
        out
    }

    fn section_items(&self) -> [&Vec<String>; 6] {
        [
            &self.categories,
            &self.key_features,
            &self.technical_changes,
            &self.breaking_changes,
            &self.security_notes,
            &self.files,
        ]
    }

    /// Parses rendered log content.
    ///
    /// Unknown header lines and sections are ignored. A missing or invalid
    /// `Deployment Number` is an error.
    pub fn parse(content: &str) -> Result<Self> {
        let mut log = Self::default();
        let mut number = None;
        let mut section: Option<usize> = None;

        for line in content.lines() {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                section = None;
                continue;
            }

            if let Some(idx) = section {
                if let Some(item) = trimmed.strip_prefix("- ") {
                    if trimmed != EMPTY_SECTION {
                        log.section_mut(idx).push(item.to_string());
                    }
                }
                continue;
            }

            if let Some(idx) = SECTIONS.iter().position(|heading| {
                trimmed
                    .strip_prefix(heading)
                    .is_some_and(|rest| rest.ends_with(':') && !rest.contains(": "))
            }) {
                section = Some(idx);
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key {
                "Deployment Number" => {
                    number = Some(
                        value
                            .parse::<u32>()
                            .with_context(|| format!("Invalid deployment number: {value}"))?,
                    );
                }
                "Deployment Date" => log.date = value,
                "Deployed By" => log.deployed_by = value,
                "Branch" => log.branch = value,
                "Title" => log.title = value,
                "Description" => log.description = value,
                _ => {}
            }
        }

        match number {
            Some(number) => {
                log.number = number;
                Ok(log)
            }
            None => bail!("Deployment log has no Deployment Number"),
        }
    }

    fn section_mut(&mut self, idx: usize) -> &mut Vec<String> {
        match idx {
            0 => &mut self.categories,
            1 => &mut self.key_features,
            2 => &mut self.technical_changes,
            3 => &mut self.breaking_changes,
            4 => &mut self.security_notes,
            _ => &mut self.files,
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Zero-padded deployment number.
pub fn format_number(number: u32) -> String {
    format!("{number:04}")
}

/// File name for deployment `number`.
pub fn log_file_name(number: u32) -> String {
    format!("Deployment_{}.txt", format_number(number))
}

/// Deployment number encoded in a log file name.
pub fn parse_log_number(file_name: &str) -> Option<u32> {
    LOG_FILE_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// All logs in `dir` as `(number, path)`, ordered by number.
pub fn list(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut logs = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let name = entry.file_name();
        if let Some(number) = name.to_str().and_then(parse_log_number) {
            logs.push((number, entry.path()));
        }
    }
    logs.sort();
    Ok(logs)
}

/// Number the next deployment log gets.
pub fn next_number(dir: &Path) -> Result<u32> {
    Ok(list(dir)?.last().map_or(1, |(number, _)| number + 1))
}

/// Path of the highest-numbered log, if any.
pub fn latest(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(list(dir)?.pop().map(|(_, path)| path))
}

/// Reads and parses a log file.
pub fn read(path: &Path) -> Result<DeploymentLog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read deployment log: {}", path.display()))?;
    DeploymentLog::parse(&content)
        .with_context(|| format!("Failed to parse deployment log: {}", path.display()))
}

/// Writes `log` into `dir` and returns its path.
pub fn write(dir: &Path, log: &DeploymentLog) -> Result<PathBuf> {
    let path = dir.join(log.file_name());
    if path.exists() {
        bail!("Deployment log already exists: {}", path.display());
    }
    write_atomic(&path, &log.render())?;
    info!(path = %path.display(), "Wrote deployment log");
    debug!(number = log.number, files = log.files.len(), "Deployment log details");
    Ok(path)
}
