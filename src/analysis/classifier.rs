//! Heuristic change classification.

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::report::{GENERIC_DESCRIPTION, GENERIC_TITLE};
use crate::analysis::rules::{
    self, matches_any, render, BreakingRule, BucketRule, SignalRule, BUCKETS, OTHER_LABEL,
    SIGNALS,
};
use crate::config::{AnalysisConfig, ConfigWarning};
use crate::git::changes::{ChangeSet, ChangeStatus};
use crate::utils::{clip, count_noun, plural};

/// Maximum length of a generated title.
pub const TITLE_MAX_LEN: usize = 80;

/// Maximum number of key features and of technical changes.
pub const DETAIL_LIST_CAP: usize = 6;

/// Paths grouped under one domain label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBucket {
    /// Bucket label.
    pub label: String,
    /// Paths in change-set order.
    pub paths: Vec<String>,
}

/// Result of bucketing a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categories {
    /// Non-empty buckets in table order.
    pub buckets: Vec<CategoryBucket>,
    /// Paths no bucket claimed.
    pub unmatched: Vec<String>,
}

impl Categories {
    /// Labels of the non-empty buckets, plus `Other` for unmatched paths.
    pub fn affected(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.buckets.iter().map(|b| b.label.clone()).collect();
        if !self.unmatched.is_empty() {
            labels.push(OTHER_LABEL.to_string());
        }
        labels
    }
}

/// Semantic summary of a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Short title.
    pub title: String,
    /// One-paragraph description.
    pub description: String,
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

/// Table-driven classifier.
pub struct Classifier {
    buckets: &'static [BucketRule],
    signals: &'static [SignalRule],
    breaking_rules: Vec<BreakingRule>,
    warnings: Vec<ConfigWarning>,
}

impl Classifier {
    /// Classifier with the built-in tables and breaking rules.
    pub fn new() -> Self {
        Self {
            buckets: BUCKETS,
            signals: SIGNALS,
            breaking_rules: rules::builtin_breaking_rules(),
            warnings: Vec::new(),
        }
    }

    /// Classifier extended with the configured `breaking_paths`.
    ///
    /// Globs that fail to compile are skipped and reported through
    /// [`Classifier::warnings`].
    pub fn with_config(config: &AnalysisConfig) -> Self {
        let mut classifier = Self::new();
        if config.breaking_paths.is_empty() {
            return classifier;
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.breaking_paths {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    let warning = ConfigWarning {
                        pattern: pattern.clone(),
                        message: e.kind().to_string(),
                    };
                    warn!("{warning}");
                    classifier.warnings.push(warning);
                }
            }
        }

        match builder.build() {
            Ok(set) if !set.is_empty() => {
                classifier = classifier.with_breaking_rule(protected_paths_rule(set));
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to build breaking path patterns: {e}"),
        }
        classifier
    }

    /// Appends a breaking-change rule, evaluated after the existing ones.
    #[must_use]
    pub fn with_breaking_rule(mut self, rule: BreakingRule) -> Self {
        self.breaking_rules.push(rule);
        self
    }

    /// Configured patterns that were skipped.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Buckets every path by the first matching rule.
    pub fn categorize(&self, changes: &ChangeSet) -> Categories {
        let mut buckets: Vec<CategoryBucket> = self
            .buckets
            .iter()
            .map(|rule| CategoryBucket {
                label: rule.label.to_string(),
                paths: Vec::new(),
            })
            .collect();
        let mut unmatched = Vec::new();

        for file in changes.files() {
            match self
                .buckets
                .iter()
                .position(|rule| matches_any(rule.matchers, &file.path))
            {
                Some(idx) => buckets[idx].paths.push(file.path.clone()),
                None => unmatched.push(file.path.clone()),
            }
        }

        buckets.retain(|bucket| !bucket.paths.is_empty());
        Categories { buckets, unmatched }
    }

    /// Breaking-change sentences, one per rule that fires.
    pub fn breaking_changes(&self, changes: &ChangeSet) -> Vec<String> {
        let mut sentences = Vec::new();
        for rule in &self.breaking_rules {
            let paths: Vec<&str> = changes
                .files()
                .iter()
                .filter(|file| rule.matches(file))
                .map(|file| file.path.as_str())
                .collect();
            if paths.is_empty() {
                continue;
            }
            debug!(rule = rule.name(), count = paths.len(), "Breaking rule fired");
            push_unique(&mut sentences, rule.describe(&paths), usize::MAX);
        }
        sentences
    }

    /// Derives title, description and detail lists from a change set.
    pub fn summarize(&self, changes: &ChangeSet) -> Summary {
        if changes.is_empty() {
            return Summary {
                title: GENERIC_TITLE.to_string(),
                description: GENERIC_DESCRIPTION.to_string(),
                ..Summary::default()
            };
        }

        let categories = self.categorize(changes);

        let labels: Vec<&str> = categories.buckets.iter().map(|b| b.label.as_str()).collect();
        let title = if labels.is_empty() {
            format!(
                "Project Update: {} {} Changed",
                changes.len(),
                plural(changes.len(), "File", "Files")
            )
        } else {
            clip(&labels.join(", "), TITLE_MAX_LEN)
        };

        let mut description = count_sentence(changes);
        let mut key_features = Vec::new();
        let mut technical_changes = Vec::new();

        for signal in self.signals {
            let paths: Vec<&str> = changes
                .files()
                .iter()
                .map(|file| file.path.as_str())
                .filter(|path| matches_any(signal.matchers, path))
                .collect();
            if paths.is_empty() {
                continue;
            }
            debug!(signal = signal.name, count = paths.len(), "Signal matched");

            if let Some(template) = signal.description {
                description.push(' ');
                description.push_str(&render(template, &paths));
            }
            if let Some(template) = signal.key_feature {
                push_unique(&mut key_features, render(template, &paths), DETAIL_LIST_CAP);
            }
            if let Some(template) = signal.technical_change {
                push_unique(
                    &mut technical_changes,
                    render(template, &paths),
                    DETAIL_LIST_CAP,
                );
            }
        }

        Summary {
            title,
            description,
            key_features,
            technical_changes,
            breaking_changes: self.breaking_changes(changes),
            categories_affected: categories.affected(),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("buckets", &self.buckets.len())
            .field("signals", &self.signals.len())
            .field("breaking_rules", &self.breaking_rules)
            .finish()
    }
}

fn protected_paths_rule(set: GlobSet) -> BreakingRule {
    BreakingRule::new(
        "protected-paths",
        "Changes protected paths: {paths}",
        move |file| {
            set.is_match(&file.path)
                || file
                    .previous_path
                    .as_deref()
                    .is_some_and(|previous| set.is_match(previous))
        },
    )
}

fn push_unique(list: &mut Vec<String>, entry: String, cap: usize) {
    if list.len() < cap && !list.contains(&entry) {
        list.push(entry);
    }
}

/// `Updates N modified files and adds M new files.` plus removals and renames.
fn count_sentence(changes: &ChangeSet) -> String {
    let mut sentence = format!(
        "Updates {} and adds {}.",
        count_noun(
            changes.count(ChangeStatus::Modified),
            "modified file",
            "modified files"
        ),
        count_noun(changes.new_file_count(), "new file", "new files"),
    );

    let deleted = changes.count(ChangeStatus::Deleted);
    if deleted > 0 {
        sentence.push_str(&format!(" Removes {}.", count_noun(deleted, "file", "files")));
    }
    let renamed = changes.count(ChangeStatus::Renamed);
    if renamed > 0 {
        sentence.push_str(&format!(" Renames {}.", count_noun(renamed, "file", "files")));
    }
    sentence
}
