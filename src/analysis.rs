//! Change analysis and security screening.
//!
//! [`ChangeAnalyzer`] wires the pieces together: the scanner screens the
//! change set, a [`ChangeSummarizer`] describes it, and the report assembler
//! merges both into an [`AnalysisReport`].

pub mod classifier;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod summarizer;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use classifier::{CategoryBucket, Classifier, Summary};
pub use report::{AnalysisReport, SecurityWarning, WarningKind};
pub use rules::BreakingRule;
pub use scanner::{FindingGroup, ReasonKind, SensitiveCatalog, SensitiveFinding};
pub use summarizer::{ChangeSummarizer, CommandSummarizer, HeuristicSummarizer};

use crate::config::{AnalysisConfig, ConfigWarning};
use crate::error::AnalysisError;
use crate::git::{ChangeSet, GitRepository, IgnoreRules};

/// Everything one analysis run produced.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The analyzed change set.
    pub changes: ChangeSet,
    /// Scanner findings, grouped by file.
    pub findings: Vec<FindingGroup>,
    /// The assembled report.
    pub report: AnalysisReport,
}

/// Runs the scanner and summarizer over change sets.
pub struct ChangeAnalyzer {
    catalog: SensitiveCatalog,
    classifier: Arc<Classifier>,
    summarizer: Box<dyn ChangeSummarizer>,
}

impl ChangeAnalyzer {
    /// Creates an analyzer from project configuration.
    ///
    /// A configured `summarizer_command` selects the [`CommandSummarizer`];
    /// otherwise the heuristic summarizer is used.
    pub fn new(config: &AnalysisConfig) -> Self {
        let catalog = SensitiveCatalog::with_config(config);
        let classifier = Arc::new(Classifier::with_config(config));
        let summarizer: Box<dyn ChangeSummarizer> = match config
            .summarizer_command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
        {
            Some(command) => Box::new(CommandSummarizer::new(command, Arc::clone(&classifier))),
            None => Box::new(HeuristicSummarizer::new(Arc::clone(&classifier))),
        };

        Self {
            catalog,
            classifier,
            summarizer,
        }
    }

    /// Replaces the summarizer.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Box<dyn ChangeSummarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// The sensitive-file catalog.
    pub fn catalog(&self) -> &SensitiveCatalog {
        &self.catalog
    }

    /// The classifier shared with the summarizers.
    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.classifier)
    }

    /// Configured patterns that were skipped while building the analyzer.
    pub fn config_warnings(&self) -> Vec<ConfigWarning> {
        self.catalog
            .warnings()
            .iter()
            .chain(self.classifier.warnings())
            .cloned()
            .collect()
    }

    /// Analyzes the pending changes of the repository containing `path`.
    ///
    /// Fails with [`AnalysisError::NothingToAnalyze`] on a clean tree so a
    /// clean tree is never mistaken for a clean scan.
    pub fn analyze_repository(&self, path: &Path) -> Result<Analysis, AnalysisError> {
        let repo = GitRepository::open_at(path)?;
        let changes = repo.collect_changes()?;
        if changes.is_empty() {
            return Err(AnalysisError::NothingToAnalyze);
        }
        let ignore = repo.compile_ignore_rules()?;
        Ok(self.analyze(changes, &ignore))
    }

    /// Analyzes an already collected change set.
    pub fn analyze(&self, changes: ChangeSet, ignore: &IgnoreRules) -> Analysis {
        let findings = scanner::scan(&changes, ignore, &self.catalog);

        let summary = match self.summarizer.summarize(&changes, &findings) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    summarizer = self.summarizer.name(),
                    "Summarizer failed, using heuristic summary: {e:#}"
                );
                self.classifier.summarize(&changes)
            }
        };
        debug!(summarizer = self.summarizer.name(), title = %summary.title, "Summarized changes");

        let report = AnalysisReport::assemble(summary, &findings);
        info!(
            files = changes.len(),
            flagged = findings.len(),
            breaking = report.details.breaking_changes.len(),
            "Analysis complete"
        );

        Analysis {
            changes,
            findings,
            report,
        }
    }
}

impl Default for ChangeAnalyzer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl std::fmt::Debug for ChangeAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeAnalyzer")
            .field("classifier", &self.classifier)
            .field("summarizer", &self.summarizer.name())
            .finish_non_exhaustive()
    }
}
