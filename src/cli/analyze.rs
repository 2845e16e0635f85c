//! Analyze command: prints the analysis report for the working tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};

use crate::analysis::{AnalysisReport, ChangeAnalyzer};
use crate::cli::output;
use crate::config::{resolve_context_dir, AnalysisConfig};
use crate::error::AnalysisError;
use crate::git::GitRepository;
use crate::utils::settings::SUMMARIZER_ENV;
use crate::utils::Settings;

/// Exit code for a clean report.
pub const EXIT_CLEAN: u8 = 0;
/// Exit code for any failure other than a clean tree.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when the working tree has no changes.
pub const EXIT_NOTHING_TO_ANALYZE: u8 = 2;
/// Exit code for a report carrying security warnings.
pub const EXIT_SECURITY_WARNINGS: u8 = 3;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl ReportFormat {
    /// Serializes a report in this format.
    pub fn render(self, report: &AnalysisReport) -> Result<String> {
        match self {
            Self::Json => report.to_json().map(|json| json + "\n"),
            Self::Yaml => report.to_yaml(),
        }
    }
}

/// Analyze command options.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Path inside the repository to analyze.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Path to custom context directory (defaults to .git-deploy/).
    #[arg(long)]
    pub context_dir: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// Writes the report to a file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    ///
    /// Only a missing repository is returned as an error; every other
    /// outcome maps to an exit code.
    pub fn execute(self) -> Result<ExitCode> {
        let repo = GitRepository::open_at(&self.repo).with_context(|| {
            format!("Failed to open git repository at {}", self.repo.display())
        })?;
        let root = repo.workdir()?;
        let analyzer = build_analyzer(&root, self.context_dir.as_deref())?;

        let analysis = match analyzer.analyze_repository(&root) {
            Ok(analysis) => analysis,
            Err(AnalysisError::NothingToAnalyze) => {
                eprintln!("Nothing to analyze: the working tree has no changes");
                return Ok(ExitCode::from(EXIT_NOTHING_TO_ANALYZE));
            }
            Err(e) => {
                eprintln!("Error: analysis failed: {e}");
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        };

        let rendered = self.format.render(&analysis.report)?;
        match &self.output {
            Some(path) => {
                fs::write(path, &rendered)
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
                debug!(path = %path.display(), "Wrote analysis report");
            }
            None => print!("{rendered}"),
        }

        if analysis.report.has_security_warnings() {
            output::print_security_warnings(&analysis.report)?;
            return Ok(ExitCode::from(EXIT_SECURITY_WARNINGS));
        }
        Ok(ExitCode::from(EXIT_CLEAN))
    }
}

/// Loads the project configuration for `root` and builds an analyzer.
///
/// The summarizer command falls back to `GIT_DEPLOY_SUMMARIZER` when the
/// configuration names none. Skipped patterns are printed to stderr.
pub fn build_analyzer(root: &Path, context_dir: Option<&Path>) -> Result<ChangeAnalyzer> {
    let config = load_config(root, context_dir);
    let analyzer = ChangeAnalyzer::new(&config);
    output::print_config_warnings(&analyzer.config_warnings())?;
    Ok(analyzer)
}

/// Resolves and loads the configuration, applying settings fallbacks.
pub fn load_config(root: &Path, context_dir: Option<&Path>) -> AnalysisConfig {
    let dir = resolve_context_dir(context_dir, root);
    let mut config = AnalysisConfig::load(&dir);

    if config.summarizer_command.is_none() {
        let settings = Settings::load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings: {e:#}");
            Settings::default()
        });
        config.summarizer_command = settings.get_env_var(SUMMARIZER_ENV);
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn json_output_ends_with_newline() {
        let rendered = ReportFormat::Json
            .render(&AnalysisReport::fallback())
            .unwrap();
        assert!(rendered.starts_with("{\n  \"title\": \"Project Update\""));
        assert!(rendered.ends_with("}\n"));
    }

    #[test]
    fn yaml_output_uses_stable_field_names() {
        let rendered = ReportFormat::Yaml
            .render(&AnalysisReport::fallback())
            .unwrap();
        assert!(rendered.contains("title: Project Update\n"));
        assert!(rendered.contains("security_warnings: []"));
    }

    #[test]
    fn project_config_is_loaded_from_context_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = temp_dir.path().join("ctx");
        fs::create_dir_all(&context).unwrap();
        fs::write(
            context.join("analysis.yaml"),
            "sensitive_patterns:\n  - \"*.vault\"\nsummarizer_command: \"cat\"\n",
        )
        .unwrap();

        let config = load_config(temp_dir.path(), Some(Path::new("ctx")));
        assert_eq!(config.sensitive_patterns, vec!["*.vault"]);
        assert_eq!(config.summarizer_command.as_deref(), Some("cat"));
    }
}
