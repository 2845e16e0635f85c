//! Ship command: analyze, gate sensitive files, log, and commit.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use git2::Oid;
use termcolor::Color;
use tracing::{debug, info, warn};

use crate::analysis::{Analysis, AnalysisReport, ChangeAnalyzer};
use crate::cli::analyze::load_config;
use crate::cli::output;
use crate::config::AnalysisConfig;
use crate::data::deployment_log::{self, DeploymentLog, LOG_DIR_NAME};
use crate::data::{gitignore, readme};
use crate::error::AnalysisError;
use crate::git::commit::{create_commit, stage_changes, unstage_paths};
use crate::git::ignore::IGNORE_FILE_NAME;
use crate::git::{DeploymentCommit, GitRepository};
use crate::utils::settings::DEPLOYED_BY_ENV;
use crate::utils::{check_ship_prerequisites, count_noun, Settings};

const DEFAULT_README: &str = "README.md";
const UNKNOWN_DEPLOYER: &str = "unknown";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Ship command options.
#[derive(Parser)]
pub struct ShipCommand {
    /// Path inside the repository to deploy.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Path to custom context directory (defaults to .git-deploy/).
    #[arg(long)]
    pub context_dir: Option<PathBuf>,

    /// Never prompts; sensitive files are excluded from the deployment.
    #[arg(long)]
    pub non_interactive: bool,

    /// Prints the deployment plan without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Writes the deployment log and changelog but does not commit.
    #[arg(long)]
    pub no_commit: bool,

    /// Commits with the latest existing deployment log instead of writing a new one.
    #[arg(long)]
    pub use_latest_log: bool,

    /// Directory holding deployment logs (defaults to DeploymentLogs/).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// README receiving the changelog entry (defaults to README.md).
    #[arg(long)]
    pub readme: Option<PathBuf>,
}

/// Answer of the sensitive-file gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Add the files to `.gitignore` and leave them out of the deployment.
    IgnoreAndExclude,
    /// Leave the files out of the deployment only.
    Exclude,
    /// Deploy the files anyway.
    Keep,
}

impl GateDecision {
    fn excludes(self) -> bool {
        !matches!(self, Self::Keep)
    }
}

/// What a ship run will do, or did.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// The deployment log being shipped.
    pub log: DeploymentLog,
    /// Where the log lives.
    pub log_path: PathBuf,
    /// README receiving the changelog entry, when one is written.
    pub readme_path: Option<PathBuf>,
    /// Sensitive files left out of the deployment.
    pub excluded: Vec<String>,
    /// Entries appended to `.gitignore`.
    pub ignored: Vec<String>,
    /// Paths that will be committed.
    pub files: Vec<String>,
}

/// Result of a ship run.
#[derive(Debug)]
pub enum ShipOutcome {
    /// The working tree had nothing left to deploy.
    NothingToDeploy,
    /// `--dry-run`: nothing was written.
    Planned(DeploymentPlan),
    /// `--no-commit`: files were written but not committed.
    Written(DeploymentPlan),
    /// The deployment commit was created.
    Committed {
        /// The shipped plan.
        plan: DeploymentPlan,
        /// Id of the new commit.
        commit: Oid,
    },
}

impl ShipCommand {
    /// Executes the ship command.
    pub fn execute(self) -> Result<ExitCode> {
        let is_terminal = !self.non_interactive && io::stdin().is_terminal();
        let outcome = self.run(is_terminal, &mut io::BufReader::new(io::stdin()))?;
        print_outcome(&outcome);
        Ok(ExitCode::SUCCESS)
    }

    /// Runs the deployment workflow, reading gate answers from `reader`.
    pub fn run(&self, is_terminal: bool, reader: &mut (dyn BufRead + Send)) -> Result<ShipOutcome> {
        let will_commit = !self.dry_run && !self.no_commit;
        let repo = check_ship_prerequisites(&self.repo, will_commit)?;
        let root = repo.workdir()?;

        let config = load_config(&root, self.context_dir.as_deref());
        let analyzer = ChangeAnalyzer::new(&config);
        output::print_config_warnings(&analyzer.config_warnings())?;

        println!("Analyzing changes in {}", root.display());
        let Some(mut analysis) = analyze_or_fallback(&analyzer, &repo, &root)? else {
            return Ok(ShipOutcome::NothingToDeploy);
        };
        println!(
            "Found {}",
            count_noun(analysis.changes.len(), "changed file", "changed files")
        );

        let flagged = analysis.report.flagged_files();
        let mut excluded = Vec::new();
        let mut ignored = Vec::new();
        let mut unstaged = Vec::new();
        if !flagged.is_empty() {
            output::print_security_warnings(&analysis.report)?;
            let files: Vec<String> = flagged.iter().cloned().collect();
            let decision = if self.non_interactive {
                GateDecision::Exclude
            } else {
                confirm_exclusion(&files, is_terminal, reader)?
            };
            debug!(?decision, files = files.len(), "Sensitive file gate answered");

            if decision == GateDecision::IgnoreAndExclude && !self.dry_run {
                ignored = gitignore::append_sensitive(&root.join(IGNORE_FILE_NAME), &files)?;
            }
            if decision.excludes() {
                unstaged = excluded_index_paths(&analysis, &flagged);
                excluded = files;
                match reanalyze_without(&analyzer, &repo, &analysis, &flagged)? {
                    Some(remaining) => analysis = remaining,
                    None => {
                        println!("Nothing to deploy after excluding sensitive files");
                        return Ok(ShipOutcome::NothingToDeploy);
                    }
                }
            }
        }

        let plan = self.plan(&repo, &root, &config, &analysis, excluded, ignored)?;
        if self.dry_run {
            return Ok(ShipOutcome::Planned(plan));
        }

        if !self.use_latest_log {
            let log_dir = plan
                .log_path
                .parent()
                .context("Deployment log path has no parent directory")?;
            fs::create_dir_all(log_dir).with_context(|| {
                format!("Failed to create log directory: {}", log_dir.display())
            })?;
            deployment_log::write(log_dir, &plan.log)?;
        }
        if let Some(readme_path) = &plan.readme_path {
            let project_name = root
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("Project");
            readme::update_readme(readme_path, project_name, &readme::changelog_entry(&plan.log))?;
        }

        if !will_commit {
            return Ok(ShipOutcome::Written(plan));
        }

        let mut extra_paths = vec![relative_to(&root, &plan.log_path)];
        if let Some(readme_path) = &plan.readme_path {
            extra_paths.push(relative_to(&root, readme_path));
        }
        if !plan.ignored.is_empty() {
            extra_paths.push(IGNORE_FILE_NAME.to_string());
        }
        stage_changes(repo.repository(), &analysis.changes, &extra_paths)?;
        unstage_paths(repo.repository(), &unstaged)?;

        let message = DeploymentCommit {
            deployment_number: plan.log.number_label(),
            title: plan.log.title.clone(),
            description: plan.log.description.clone(),
            branch: current_branch(&repo),
            timestamp: Local::now().fixed_offset(),
        }
        .message();
        let commit = create_commit(repo.repository(), &message)?;
        info!(%commit, number = plan.log.number, "Shipped deployment");

        Ok(ShipOutcome::Committed { plan, commit })
    }

    fn plan(
        &self,
        repo: &GitRepository,
        root: &Path,
        config: &AnalysisConfig,
        analysis: &Analysis,
        excluded: Vec<String>,
        ignored: Vec<String>,
    ) -> Result<DeploymentPlan> {
        let log_dir = resolve_path(
            root,
            self.log_dir.as_deref().or(config.log_dir.as_deref()),
            LOG_DIR_NAME,
        );

        let (log, log_path, readme_path) = if self.use_latest_log {
            let Some(path) = deployment_log::latest(&log_dir)? else {
                bail!("No deployment log found in {}", log_dir.display());
            };
            (deployment_log::read(&path)?, path, None)
        } else {
            let number = deployment_log::next_number(&log_dir)?;
            let log = DeploymentLog::from_report(
                number,
                Local::now().format(DATE_FORMAT).to_string(),
                deployed_by(repo),
                current_branch(repo),
                &analysis.report,
                &analysis.changes,
                &excluded,
            );
            let path = log_dir.join(log.file_name());
            let readme_path = resolve_path(
                root,
                self.readme.as_deref().or(config.readme.as_deref()),
                DEFAULT_README,
            );
            (log, path, Some(readme_path))
        };

        let files = analysis
            .changes
            .files()
            .iter()
            .map(|file| file.path.clone())
            .collect();

        Ok(DeploymentPlan {
            log,
            log_path,
            readme_path,
            excluded,
            ignored,
            files,
        })
    }
}

/// Asks whether flagged files should be kept out of the deployment.
///
/// `y` adds them to `.gitignore` and excludes them; `n` or an empty answer
/// keeps them. Without a terminal, or when input ends, the files are
/// excluded without touching `.gitignore`.
pub fn confirm_exclusion(
    files: &[String],
    is_terminal: bool,
    reader: &mut (dyn BufRead + Send),
) -> Result<GateDecision> {
    println!("\nPotentially sensitive files:");
    for file in files {
        println!("  - {file}");
    }

    if !is_terminal {
        eprintln!("warning: stdin is not interactive, excluding sensitive files from deployment");
        return Ok(GateDecision::Exclude);
    }

    loop {
        print!("Add these files to .gitignore and exclude them from the deployment? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes = reader.read_line(&mut input)?;
        if bytes == 0 {
            eprintln!("warning: stdin closed, excluding sensitive files from deployment");
            return Ok(GateDecision::Exclude);
        }

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(GateDecision::IgnoreAndExclude),
            "n" | "no" | "" => return Ok(GateDecision::Keep),
            _ => println!("Invalid choice. Please enter 'y' or 'n'."),
        }
    }
}

/// Runs the engine; a failed run degrades to the generic report.
///
/// Returns `None` when the working tree is clean.
fn analyze_or_fallback(
    analyzer: &ChangeAnalyzer,
    repo: &GitRepository,
    root: &Path,
) -> Result<Option<Analysis>> {
    match analyzer.analyze_repository(root) {
        Ok(analysis) => Ok(Some(analysis)),
        Err(AnalysisError::NothingToAnalyze) => {
            println!("Nothing to deploy");
            Ok(None)
        }
        Err(e) => {
            output::print_notice(
                "warning:",
                Color::Yellow,
                &format!("change analysis failed ({e}), using a generic summary"),
            )?;
            let changes = repo
                .collect_changes()
                .context("Failed to collect changes for deployment")?;
            if changes.is_empty() {
                println!("Nothing to deploy");
                return Ok(None);
            }
            Ok(Some(Analysis {
                changes,
                findings: Vec::new(),
                report: AnalysisReport::fallback(),
            }))
        }
    }
}

/// Index paths of the excluded files, including the source of a rename.
fn excluded_index_paths(analysis: &Analysis, excluded: &BTreeSet<String>) -> Vec<String> {
    analysis
        .changes
        .files()
        .iter()
        .filter(|file| excluded.contains(&file.path))
        .flat_map(|file| std::iter::once(&file.path).chain(file.previous_path.as_ref()))
        .cloned()
        .collect()
}

/// Analyzes the change set again with `excluded` removed.
fn reanalyze_without(
    analyzer: &ChangeAnalyzer,
    repo: &GitRepository,
    analysis: &Analysis,
    excluded: &BTreeSet<String>,
) -> Result<Option<Analysis>> {
    let remaining = analysis.changes.without(excluded);
    if remaining.is_empty() {
        return Ok(None);
    }
    let ignore = repo.compile_ignore_rules()?;
    Ok(Some(analyzer.analyze(remaining, &ignore)))
}

fn resolve_path(root: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    let path = configured.unwrap_or_else(|| Path::new(default));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn current_branch(repo: &GitRepository) -> String {
    repo.get_current_branch().unwrap_or_else(|e| {
        warn!("Cannot determine current branch: {e:#}");
        "HEAD".to_string()
    })
}

fn deployed_by(repo: &GitRepository) -> String {
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {e:#}");
        Settings::default()
    });
    settings
        .get_env_var(DEPLOYED_BY_ENV)
        .or_else(|| repo.user_name())
        .unwrap_or_else(|| UNKNOWN_DEPLOYER.to_string())
}

fn print_plan(plan: &DeploymentPlan) {
    println!("Deployment {}: {}", plan.log.number_label(), plan.log.title);
    println!("  Log: {}", plan.log_path.display());
    if let Some(readme_path) = &plan.readme_path {
        println!("  Changelog: {}", readme_path.display());
    }
    println!(
        "  Shipping {}",
        count_noun(plan.files.len(), "file", "files")
    );
    if !plan.excluded.is_empty() {
        println!("  Excluded: {}", plan.excluded.join(", "));
    }
    if !plan.ignored.is_empty() {
        println!("  Added to .gitignore: {}", plan.ignored.join(", "));
    }
}

fn print_outcome(outcome: &ShipOutcome) {
    match outcome {
        ShipOutcome::NothingToDeploy => {}
        ShipOutcome::Planned(plan) => {
            println!("\nDry run, nothing written:");
            print_plan(plan);
        }
        ShipOutcome::Written(plan) => {
            print_plan(plan);
            println!("\nDeployment files written; commit skipped");
        }
        ShipOutcome::Committed { plan, commit } => {
            print_plan(plan);
            println!("\nCommitted deployment {} as {commit}", plan.log.number_label());
        }
    }
}
