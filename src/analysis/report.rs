//! The analysis report handed to the deployment workflow.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::classifier::Summary;
use crate::analysis::scanner::{FindingGroup, ReasonKind};
use crate::utils::count_noun;

/// Title used when nothing better is known.
pub const GENERIC_TITLE: &str = "Project Update";

/// Description used when nothing better is known.
pub const GENERIC_DESCRIPTION: &str = "No description of the changes is available.";

/// Grouped detail lists of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDetails {
    /// User-facing features.
    #[serde(default)]
    pub key_features: Vec<String>,
    /// Internal changes.
    #[serde(default)]
    pub technical_changes: Vec<String>,
    /// Changes reviewers should escalate.
    #[serde(default)]
    pub breaking_changes: Vec<String>,
    /// Bucket labels touched by the change set.
    #[serde(default)]
    pub categories_affected: Vec<String>,
}

/// Kind of a security warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Files whose names look like secrets.
    SensitiveFiles,
    /// Files whose added lines assign secret literals.
    SecretContent,
}

impl WarningKind {
    fn for_reason(reason: ReasonKind) -> Self {
        match reason {
            ReasonKind::FilenamePattern => Self::SensitiveFiles,
            ReasonKind::ContentPattern => Self::SecretContent,
        }
    }

    fn message(self, count: usize) -> String {
        match self {
            Self::SensitiveFiles => format!(
                "Found {}",
                count_noun(
                    count,
                    "potentially sensitive file",
                    "potentially sensitive files"
                )
            ),
            Self::SecretContent => format!(
                "Found {} that appear to add hardcoded secrets",
                count_noun(count, "file", "files")
            ),
        }
    }
}

/// The pattern that flagged one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningMatch {
    /// Repository-relative path.
    pub file: String,
    /// Matched catalog entry or key name.
    pub matched_pattern: String,
}

/// One group of security findings of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityWarning {
    /// Warning kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: WarningKind,
    /// Human-readable summary.
    pub message: String,
    /// Flagged paths, sorted.
    pub files: Vec<String>,
    /// Per-file matched pattern, in `files` order.
    #[serde(default)]
    pub findings: Vec<WarningMatch>,
}

/// Structured result of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Short title.
    pub title: String,
    /// One-paragraph description.
    pub description: String,
    /// Detail lists.
    #[serde(default)]
    pub details: ReportDetails,
    /// Security warnings, filename warnings first.
    #[serde(default)]
    pub security_warnings: Vec<SecurityWarning>,
}

impl AnalysisReport {
    /// Merges a summary and the scanner's findings into a report.
    pub fn assemble(summary: Summary, findings: &[FindingGroup]) -> Self {
        let title = if summary.title.trim().is_empty() {
            GENERIC_TITLE.to_string()
        } else {
            summary.title
        };
        let description = if summary.description.trim().is_empty() {
            GENERIC_DESCRIPTION.to_string()
        } else {
            summary.description
        };

        Self {
            title,
            description,
            details: ReportDetails {
                key_features: summary.key_features,
                technical_changes: summary.technical_changes,
                breaking_changes: summary.breaking_changes,
                categories_affected: summary.categories_affected,
            },
            security_warnings: security_warnings(findings),
        }
    }

    /// The fixed generic report used when analysis could not run.
    pub fn fallback() -> Self {
        Self {
            title: GENERIC_TITLE.to_string(),
            description: GENERIC_DESCRIPTION.to_string(),
            details: ReportDetails::default(),
            security_warnings: Vec::new(),
        }
    }

    /// Whether any security warning was raised.
    pub fn has_security_warnings(&self) -> bool {
        !self.security_warnings.is_empty()
    }

    /// Whether the report lists breaking changes.
    pub fn has_breaking_changes(&self) -> bool {
        !self.details.breaking_changes.is_empty()
    }

    /// Every path named by a security warning.
    pub fn flagged_files(&self) -> BTreeSet<String> {
        self.security_warnings
            .iter()
            .flat_map(|warning| warning.files.iter().cloned())
            .collect()
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize analysis report to JSON")
    }

    /// Serializes the report as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        crate::data::to_yaml(self)
    }
}

fn security_warnings(findings: &[FindingGroup]) -> Vec<SecurityWarning> {
    [WarningKind::SensitiveFiles, WarningKind::SecretContent]
        .into_iter()
        .filter_map(|kind| {
            let mut matches: Vec<WarningMatch> = findings
                .iter()
                .flat_map(|group| group.findings.iter())
                .filter(|finding| WarningKind::for_reason(finding.reason_kind) == kind)
                .map(|finding| WarningMatch {
                    file: finding.file.clone(),
                    matched_pattern: finding.matched_pattern.clone(),
                })
                .collect();
            if matches.is_empty() {
                return None;
            }
            matches.sort_by(|a, b| a.file.cmp(&b.file));
            matches.dedup_by(|a, b| a.file == b.file);

            Some(SecurityWarning {
                kind,
                message: kind.message(matches.len()),
                files: matches.iter().map(|m| m.file.clone()).collect(),
                findings: matches,
            })
        })
        .collect()
}
