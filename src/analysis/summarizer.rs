//! Summarizers turning a change set into a [`Summary`].
//!
//! [`HeuristicSummarizer`] is deterministic and always succeeds. The
//! [`CommandSummarizer`] hands a prompt to an external tool, typically a
//! language-model CLI, and falls back to the heuristic on any failure.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::analysis::classifier::{Classifier, Summary, DETAIL_LIST_CAP, TITLE_MAX_LEN};
use crate::analysis::scanner::FindingGroup;
use crate::git::changes::ChangeSet;
use crate::utils::clip;

/// Files listed per category in the prompt.
const PROMPT_FILES_PER_CATEGORY: usize = 5;

/// Sensitive files listed in the prompt.
const PROMPT_SENSITIVE_FILES: usize = 10;

/// Sample diffs included in the prompt.
const PROMPT_SAMPLE_DIFFS: usize = 3;

/// Characters kept of each sample diff.
const PROMPT_SAMPLE_DIFF_LEN: usize = 500;

/// Extensions and names that make a diff worth sampling.
const SAMPLE_MARKERS: &[&str] = &[
    ".rs", ".swift", ".kt", ".ts", ".tsx", ".py", ".go", "gradle", "package.json",
];

/// Produces a summary for a change set.
pub trait ChangeSummarizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Summarizes `changes`; `findings` are the scanner's results for them.
    fn summarize(&self, changes: &ChangeSet, findings: &[FindingGroup]) -> Result<Summary>;
}

/// Summarizer backed by the table-driven classifier.
#[derive(Debug, Clone)]
pub struct HeuristicSummarizer {
    classifier: Arc<Classifier>,
}

impl HeuristicSummarizer {
    /// Creates a summarizer around `classifier`.
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }
}

impl ChangeSummarizer for HeuristicSummarizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn summarize(&self, changes: &ChangeSet, _findings: &[FindingGroup]) -> Result<Summary> {
        Ok(self.classifier.summarize(changes))
    }
}

/// Summary fields an external tool answers with.
#[derive(Debug, Deserialize)]
struct ExternalSummary {
    title: String,
    description: String,
    #[serde(default)]
    key_features: Vec<String>,
    #[serde(default)]
    technical_changes: Vec<String>,
}

/// Summarizer that runs a shell command with the prompt on stdin.
///
/// The command must print a JSON object with `title`, `description` and
/// optionally `key_features` and `technical_changes`. Breaking changes and
/// categories always come from the heuristic.
pub struct CommandSummarizer {
    command: String,
    classifier: Arc<Classifier>,
}

impl CommandSummarizer {
    /// Creates a summarizer running `command` through `sh -c`.
    pub fn new(command: impl Into<String>, classifier: Arc<Classifier>) -> Self {
        Self {
            command: command.into(),
            classifier,
        }
    }

    /// The configured command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    fn run(&self, prompt: &str) -> Result<ExternalSummary> {
        debug!(command = %self.command, "Running external summarizer");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start summarizer command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("Failed to write prompt to summarizer")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for summarizer command")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Summarizer command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        parse_response(&String::from_utf8_lossy(&output.stdout))
    }
}

impl std::fmt::Debug for CommandSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSummarizer")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl ChangeSummarizer for CommandSummarizer {
    fn name(&self) -> &str {
        "command"
    }

    fn summarize(&self, changes: &ChangeSet, findings: &[FindingGroup]) -> Result<Summary> {
        let heuristic = self.classifier.summarize(changes);
        if changes.is_empty() {
            return Ok(heuristic);
        }

        let prompt = build_prompt(&self.classifier, changes, findings);
        match self.run(&prompt) {
            Ok(external) => Ok(merge(external, heuristic)),
            Err(e) => {
                warn!("External summarizer failed, using heuristic summary: {e:#}");
                Ok(heuristic)
            }
        }
    }
}

fn merge(external: ExternalSummary, heuristic: Summary) -> Summary {
    let non_empty = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .take(DETAIL_LIST_CAP)
            .collect()
    };

    let title = external.title.trim();
    let description = external.description.trim();
    let key_features = non_empty(external.key_features);
    let technical_changes = non_empty(external.technical_changes);

    Summary {
        title: if title.is_empty() {
            heuristic.title
        } else {
            clip(title, TITLE_MAX_LEN)
        },
        description: if description.is_empty() {
            heuristic.description
        } else {
            description.to_string()
        },
        key_features: if key_features.is_empty() {
            heuristic.key_features
        } else {
            key_features
        },
        technical_changes: if technical_changes.is_empty() {
            heuristic.technical_changes
        } else {
            technical_changes
        },
        breaking_changes: heuristic.breaking_changes,
        categories_affected: heuristic.categories_affected,
    }
}

/// Extracts a JSON object from tool output, tolerating code fences and chatter.
fn parse_response(content: &str) -> Result<ExternalSummary> {
    let fenced = if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if content.contains("```") {
        content.split("```").nth(1)
    } else {
        None
    };
    let body = fenced.unwrap_or(content);

    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => bail!("Summarizer output contains no JSON object"),
    };

    serde_json::from_str(json).context("Failed to parse summarizer output as JSON")
}

/// Builds the prompt handed to an external summarizer.
pub fn build_prompt(classifier: &Classifier, changes: &ChangeSet, findings: &[FindingGroup]) -> String {
    let mut prompt = String::from(
        "Analyze the following git changes and respond with a single JSON object with the keys \
         \"title\" (max 80 characters), \"description\" (2-3 sentences explaining what changed \
         and why it matters), \"key_features\" (list of strings) and \"technical_changes\" \
         (list of strings).\n\n",
    );

    if !findings.is_empty() {
        prompt.push_str(&format!(
            "WARNING: {} potentially sensitive files detected. Do not repeat their contents:\n",
            findings.len()
        ));
        for group in findings.iter().take(PROMPT_SENSITIVE_FILES) {
            prompt.push_str(&format!("  - {}\n", group.file));
        }
        if findings.len() > PROMPT_SENSITIVE_FILES {
            prompt.push_str(&format!(
                "  ... and {} more files\n",
                findings.len() - PROMPT_SENSITIVE_FILES
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str("Changed files by category:\n");
    let categories = classifier.categorize(changes);
    let other = crate::analysis::rules::OTHER_LABEL;
    let sections = categories
        .buckets
        .iter()
        .map(|bucket| (bucket.label.as_str(), &bucket.paths))
        .chain((!categories.unmatched.is_empty()).then_some((other, &categories.unmatched)));

    for (label, paths) in sections {
        prompt.push_str(&format!("\n{label}:\n"));
        for path in paths.iter().take(PROMPT_FILES_PER_CATEGORY) {
            let status = changes.get(path).map_or("?", |f| f.status.code());
            prompt.push_str(&format!("  {status} {path}\n"));
        }
        if paths.len() > PROMPT_FILES_PER_CATEGORY {
            prompt.push_str(&format!(
                "  ... and {} more files\n",
                paths.len() - PROMPT_FILES_PER_CATEGORY
            ));
        }
    }

    let flagged: Vec<&str> = findings.iter().map(|g| g.file.as_str()).collect();
    let samples = changes
        .files()
        .iter()
        .filter(|file| !flagged.contains(&file.path.as_str()))
        .filter(|file| SAMPLE_MARKERS.iter().any(|m| file.path.contains(m)))
        .filter_map(|file| file.diff_text.as_deref().map(|diff| (&file.path, diff)))
        .take(PROMPT_SAMPLE_DIFFS)
        .collect::<Vec<_>>();

    if !samples.is_empty() {
        prompt.push_str("\nSample diffs from key files:\n");
        for (path, diff) in samples {
            prompt.push_str(&format!("\n--- {path} ---\n"));
            if diff.chars().count() > PROMPT_SAMPLE_DIFF_LEN {
                let head: String = diff.chars().take(PROMPT_SAMPLE_DIFF_LEN).collect();
                prompt.push_str(&head);
                prompt.push_str("...\n");
            } else {
                prompt.push_str(diff);
                if !diff.ends_with('\n') {
                    prompt.push('\n');
                }
            }
        }
    }

    prompt
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analysis::scanner::{ReasonKind, SensitiveFinding};
    use crate::git::changes::{ChangeStatus, ChangedFile};

    fn sample_changes() -> ChangeSet {
        ChangeSet::new(vec![
            ChangedFile::new("mobile/app/Main.kt", ChangeStatus::Modified)
                .with_diff("@@ -1 +1 @@\n-val a = 1\n+val a = 2\n"),
            ChangedFile::new("src/api/client.rs", ChangeStatus::Deleted),
            ChangedFile::new("notes.txt", ChangeStatus::Untracked),
        ])
    }

    fn classifier() -> Arc<Classifier> {
        Arc::new(Classifier::new())
    }

    #[test]
    fn heuristic_matches_classifier() {
        let changes = sample_changes();
        let summary = HeuristicSummarizer::new(classifier())
            .summarize(&changes, &[])
            .unwrap();
        assert_eq!(summary, Classifier::new().summarize(&changes));
    }

    #[test]
    fn parse_response_accepts_fenced_json() {
        let response = "Here you go:\n```json\n{\"title\": \"Mobile fixes\", \"description\": \"Fixes things.\"}\n```\n";
        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.title, "Mobile fixes");
        assert!(parsed.key_features.is_empty());
    }

    #[test]
    fn parse_response_rejects_non_json() {
        assert!(parse_response("no idea").is_err());
    }

    #[test]
    fn merge_keeps_heuristic_breaking_changes() {
        let changes = sample_changes();
        let heuristic = Classifier::new().summarize(&changes);
        let merged = merge(
            ExternalSummary {
                title: "  ".to_string(),
                description: "Model description.".to_string(),
                key_features: vec!["Faster sync".to_string(), String::new()],
                technical_changes: Vec::new(),
            },
            heuristic.clone(),
        );
        assert_eq!(merged.title, heuristic.title);
        assert_eq!(merged.description, "Model description.");
        assert_eq!(merged.key_features, vec!["Faster sync"]);
        assert_eq!(merged.technical_changes, heuristic.technical_changes);
        assert_eq!(merged.breaking_changes, heuristic.breaking_changes);
        assert!(!merged.breaking_changes.is_empty());
    }

    #[test]
    fn prompt_lists_categories_samples_and_warnings() {
        let changes = sample_changes();
        let findings = vec![FindingGroup {
            file: "notes.txt".to_string(),
            findings: vec![SensitiveFinding {
                file: "notes.txt".to_string(),
                reason_kind: ReasonKind::ContentPattern,
                matched_pattern: "token".to_string(),
            }],
        }];

        let prompt = build_prompt(&Classifier::new(), &changes, &findings);
        assert!(prompt.contains("WARNING: 1 potentially sensitive files detected"));
        assert!(prompt.contains("\nMobile App:\n  M mobile/app/Main.kt\n"));
        assert!(prompt.contains("\nOther:\n"));
        assert!(prompt.contains("--- mobile/app/Main.kt ---"));
        assert!(prompt.contains("+val a = 2"));
    }

    #[test]
    #[cfg(unix)]
    fn command_summarizer_uses_tool_output() {
        let summarizer = CommandSummarizer::new(
            r#"cat > /dev/null; echo '{"title": "Tool title", "description": "Tool description."}'"#,
            classifier(),
        );
        let summary = summarizer.summarize(&sample_changes(), &[]).unwrap();
        assert_eq!(summary.title, "Tool title");
        assert_eq!(summary.description, "Tool description.");
        assert!(!summary.breaking_changes.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn command_summarizer_falls_back_on_failure() {
        let changes = sample_changes();
        let summarizer = CommandSummarizer::new("cat > /dev/null; exit 3", classifier());
        let summary = summarizer.summarize(&changes, &[]).unwrap();
        assert_eq!(summary, Classifier::new().summarize(&changes));
    }
}
