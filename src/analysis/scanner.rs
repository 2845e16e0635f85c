//! Sensitive-file screening of a change set.
//!
//! Every changed path is checked against two independent pattern families:
//! filename globs (plus basename keywords) and assignments of literal values
//! to secret-looking keys in the lines a diff adds.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AnalysisConfig, ConfigWarning};
use crate::git::changes::{ChangeSet, ChangeStatus, ChangedFile};
use crate::git::diff_split::added_lines;
use crate::git::ignore::IgnoreRules;

/// Filename globs that mark a file as likely to hold secrets.
///
/// Globs without a `/` are matched against the basename, the rest against
/// the full repository-relative path. Matching is case-insensitive.
pub const BUILTIN_FILENAME_PATTERNS: &[&str] = &[
    // secret-bearing names
    "*_api_key*",
    "*_apikey*",
    "*_secret*",
    "*_token*",
    "*_password*",
    "*credentials*.json",
    "*secrets*.json",
    "credentials",
    // environment files
    ".env*",
    "*.env",
    // keys and certificates
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "*.jks",
    "*.ppk",
    "id_rsa*",
    "id_dsa*",
    "id_ed25519*",
    "id_ecdsa*",
    // cloud credentials
    "**/.aws/*",
    "*.tfvars",
    "GoogleService-Info.plist",
    "google-services.json",
    // database files
    "*.db",
    "*.sqlite",
    "*.sqlite3",
    // logs and dumps
    "*.log",
    "*.dump",
    "npm-debug.log*",
    "yarn-debug.log*",
];

/// Basename fragments that mark a file as likely to hold secrets.
pub const BUILTIN_NAME_KEYWORDS: &[&str] = &[
    "_secret",
    "_password",
    "_token",
    "_key",
    "credential",
    "private_",
    "api_key",
    "apikey",
];

/// Words that make an assigned key look like a secret.
pub const BUILTIN_SECRET_WORDS: &[&str] = &[
    "key",
    "secret",
    "token",
    "password",
    "passwd",
    "pwd",
    "credential",
];

/// `key = "value"`, `"key": 'value'`, `key := "value"`, `'key' => "value"`.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static QUOTED_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<key>[A-Za-z0-9_.\-]+)["']?\s*(?::=|=>|=|:)\s*["'`](?P<value>[^"'`]+)["'`]"#,
    )
    .unwrap()
});

/// Unquoted dotenv-style `KEY=value`, optionally prefixed with `export`.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static DOTENV_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:export\s+)?(?P<key>[A-Za-z_][A-Za-z0-9_.\-]*)=(?P<value>[^\s"'`$\{][^\s]*)\s*$"#,
    )
    .unwrap()
});

/// Why a file was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonKind {
    /// The path matched a filename pattern or keyword.
    FilenamePattern,
    /// An added diff line assigns a literal to a secret-looking key.
    ContentPattern,
}

/// One reason a file looks like it carries a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveFinding {
    /// Repository-relative path.
    pub file: String,
    /// Which pattern family matched.
    pub reason_kind: ReasonKind,
    /// The catalog entry that matched; for content findings, the key name.
    pub matched_pattern: String,
}

/// All findings for one file, ordered filename first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingGroup {
    /// Repository-relative path.
    pub file: String,
    /// At most one finding per reason kind.
    pub findings: Vec<SensitiveFinding>,
}

impl FindingGroup {
    /// Returns the finding of the given kind, if any.
    pub fn finding(&self, kind: ReasonKind) -> Option<&SensitiveFinding> {
        self.findings.iter().find(|f| f.reason_kind == kind)
    }
}

/// Compiled catalog of filename and content patterns.
#[derive(Debug, Clone)]
pub struct SensitiveCatalog {
    patterns: Vec<String>,
    globs: GlobSet,
    keywords: Vec<String>,
    secret_words: Vec<String>,
    warnings: Vec<ConfigWarning>,
}

impl SensitiveCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::with_config(&AnalysisConfig::default())
    }

    /// The built-in catalog extended with configured patterns and keywords.
    ///
    /// Configured globs that fail to compile are skipped and reported
    /// through [`SensitiveCatalog::warnings`].
    pub fn with_config(config: &AnalysisConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut patterns = Vec::new();
        let mut warnings = Vec::new();

        let candidates = BUILTIN_FILENAME_PATTERNS
            .iter()
            .copied()
            .chain(config.sensitive_patterns.iter().map(String::as_str));

        for pattern in candidates {
            let compiled = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build();
            match compiled {
                Ok(glob) => {
                    builder.add(glob);
                    patterns.push(pattern.to_string());
                }
                Err(e) => {
                    let warning = ConfigWarning {
                        pattern: pattern.to_string(),
                        message: e.kind().to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }

        let globs = match builder.build() {
            Ok(globs) => globs,
            Err(e) => {
                warn!("Failed to build sensitive filename patterns: {e}");
                patterns.clear();
                GlobSet::empty()
            }
        };

        let keywords = BUILTIN_NAME_KEYWORDS.iter().map(|k| (*k).to_string()).collect();

        let mut secret_words: Vec<String> = BUILTIN_SECRET_WORDS
            .iter()
            .map(|w| (*w).to_string())
            .collect();
        for word in &config.secret_keywords {
            let word = word.trim().to_lowercase();
            if word.is_empty() {
                warnings.push(ConfigWarning {
                    pattern: String::new(),
                    message: "empty secret keyword".to_string(),
                });
            } else if !secret_words.contains(&word) {
                secret_words.push(word);
            }
        }

        Self {
            patterns,
            globs,
            keywords,
            secret_words,
            warnings,
        }
    }

    /// Configured patterns that were skipped.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Returns the first catalog entry matching `path`.
    pub fn match_filename(&self, path: &str) -> Option<&str> {
        let basename = path.rsplit('/').next().unwrap_or(path);

        let mut hits = self.globs.matches(basename);
        hits.extend(self.globs.matches(path));
        if let Some(first) = hits.into_iter().min() {
            return self.patterns.get(first).map(String::as_str);
        }

        let lowered = basename.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| lowered.contains(keyword.as_str()))
            .map(String::as_str)
    }

    /// Returns the key name of the first secret assignment among `lines`.
    pub fn match_content<'a, I>(&self, lines: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines.into_iter().find_map(|line| self.match_line(line))
    }

    fn match_line(&self, line: &str) -> Option<String> {
        let quoted = QUOTED_ASSIGNMENT.captures_iter(line).find_map(|caps| {
            let key = caps.name("key")?.as_str();
            let value = caps.name("value")?.as_str();
            (self.is_secret_key(key) && is_literal(value)).then(|| key.to_string())
        });
        if quoted.is_some() {
            return quoted;
        }

        let caps = DOTENV_ASSIGNMENT.captures(line)?;
        let key = caps.name("key")?.as_str();
        let value = caps.name("value")?.as_str();
        (self.is_secret_key(key) && is_literal(value)).then(|| key.to_string())
    }

    fn is_secret_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.secret_words.iter().any(|word| key.contains(word.as_str()))
    }
}

impl Default for SensitiveCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_literal(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains("${")
}

/// Screens `changes` for files that look like they carry secrets.
///
/// Untracked files matching an ignore rule are skipped. Deleted files are
/// skipped before the filename check too, so unlike a sweep over every
/// `git status` line a deleted `.env` is not reported. Everything else,
/// including tracked files that an ignore rule would exclude, is scanned.
/// Groups are ordered by path.
pub fn scan(
    changes: &ChangeSet,
    ignore: &IgnoreRules,
    catalog: &SensitiveCatalog,
) -> Vec<FindingGroup> {
    let mut groups: BTreeMap<String, Vec<SensitiveFinding>> = BTreeMap::new();

    for file in changes.files() {
        if file.status == ChangeStatus::Deleted {
            continue;
        }
        if file.status == ChangeStatus::Untracked && ignore.is_ignored(&file.path) {
            debug!(path = %file.path, "Skipping ignored untracked file");
            continue;
        }

        let findings = scan_file(file, catalog);
        if !findings.is_empty() {
            groups.insert(file.path.clone(), findings);
        }
    }

    debug!(flagged = groups.len(), "Sensitive-file scan finished");
    groups
        .into_iter()
        .map(|(file, findings)| FindingGroup { file, findings })
        .collect()
}

fn scan_file(file: &ChangedFile, catalog: &SensitiveCatalog) -> Vec<SensitiveFinding> {
    let mut findings = Vec::new();

    if let Some(pattern) = catalog.match_filename(&file.path) {
        findings.push(SensitiveFinding {
            file: file.path.clone(),
            reason_kind: ReasonKind::FilenamePattern,
            matched_pattern: pattern.to_string(),
        });
    }

    if let Some(diff) = &file.diff_text {
        if let Some(key) = catalog.match_content(added_lines(diff)) {
            findings.push(SensitiveFinding {
                file: file.path.clone(),
                reason_kind: ReasonKind::ContentPattern,
                matched_pattern: key,
            });
        }
    }

    findings
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::Path;

    fn diff_adding(path: &str, line: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,1 +1,2 @@\n context\n+{line}\n"
        )
    }

    fn diff_removing(path: &str, line: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,2 +1,1 @@\n context\n-{line}\n"
        )
    }

    #[test]
    fn filename_patterns_match_basename() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(
            catalog.match_filename("config/service_api_key.json"),
            Some("*_api_key*")
        );
        assert_eq!(catalog.match_filename(".env.production"), Some(".env*"));
        assert_eq!(catalog.match_filename("deploy/prod.env"), Some("*.env"));
        assert_eq!(catalog.match_filename("certs/Server.PEM"), Some("*.pem"));
        assert_eq!(catalog.match_filename("home/.ssh/id_rsa.pub"), Some("id_rsa*"));
        assert_eq!(
            catalog.match_filename("ios/GoogleService-Info.plist"),
            Some("GoogleService-Info.plist")
        );
        assert_eq!(catalog.match_filename("data/app.sqlite3"), Some("*.sqlite3"));
        assert_eq!(catalog.match_filename("npm-debug.log.1"), Some("npm-debug.log*"));
    }

    #[test]
    fn aws_directory_matches_at_any_depth() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(catalog.match_filename(".aws/credentials"), Some("credentials"));
        assert_eq!(catalog.match_filename("ops/.aws/config"), Some("**/.aws/*"));
    }

    #[test]
    fn keywords_match_basename_fragments() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(catalog.match_filename("src/private_notes.txt"), Some("private_"));
        assert_eq!(catalog.match_filename("src/my_credential_store.rs"), Some("credential"));
    }

    #[test]
    fn ordinary_files_do_not_match() {
        let catalog = SensitiveCatalog::builtin();
        for path in ["src/main.rs", "web/index.html", "README.md", "src/env.rs", "Cargo.toml"] {
            assert_eq!(catalog.match_filename(path), None, "{path}");
        }
    }

    #[test]
    fn directory_names_do_not_trigger_basename_globs() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(catalog.match_filename("my_secret_dir/notes.txt"), None);
    }

    #[test]
    fn content_patterns_require_secret_key_and_literal() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(
            catalog.match_content([r#"password = "admin123""#]),
            Some("password".to_string())
        );
        assert_eq!(
            catalog.match_content([r#"  "apiToken": "abc123","#]),
            Some("apiToken".to_string())
        );
        assert_eq!(
            catalog.match_content([r#"$config['db_password'] => 'hunter2';"#]),
            Some("db_password".to_string())
        );
        assert_eq!(
            catalog.match_content([r#"secret := "s3cr3t""#]),
            Some("secret".to_string())
        );
        assert_eq!(
            catalog.match_content(["export STRIPE_SECRET_KEY=sk_live_123"]),
            Some("STRIPE_SECRET_KEY".to_string())
        );
    }

    #[test]
    fn content_patterns_skip_references_and_empty_values() {
        let catalog = SensitiveCatalog::builtin();
        assert_eq!(catalog.match_content(["API_KEY=$API_KEY"]), None);
        assert_eq!(catalog.match_content(["API_KEY=${API_KEY}"]), None);
        assert_eq!(catalog.match_content([r#"token = "${TOKEN}""#]), None);
        assert_eq!(catalog.match_content([r#"password = """#]), None);
        assert_eq!(catalog.match_content([r#"password = "   ""#]), None);
        assert_eq!(catalog.match_content([r#"if password == "x" {"#]), None);
        assert_eq!(catalog.match_content([r#"name = "demo""#]), None);
    }

    #[test]
    fn configured_keywords_extend_vocabulary() {
        let config = AnalysisConfig {
            secret_keywords: vec!["DSN".to_string()],
            ..AnalysisConfig::default()
        };
        let catalog = SensitiveCatalog::with_config(&config);
        assert_eq!(
            catalog.match_content([r#"sentry_dsn = "https://abc@sentry.io/1""#]),
            Some("sentry_dsn".to_string())
        );
    }

    #[test]
    fn malformed_configured_pattern_is_reported_and_skipped() {
        let config = AnalysisConfig {
            sensitive_patterns: vec!["[unclosed".to_string(), "*.vault".to_string()],
            ..AnalysisConfig::default()
        };
        let catalog = SensitiveCatalog::with_config(&config);
        assert_eq!(catalog.warnings().len(), 1);
        assert_eq!(catalog.warnings()[0].pattern, "[unclosed");
        assert_eq!(catalog.match_filename("prod.vault"), Some("*.vault"));
    }

    #[test]
    fn added_password_line_yields_one_content_finding() {
        let changes = ChangeSet::new(vec![ChangedFile::new("src/settings.py", ChangeStatus::Modified)
            .with_diff(diff_adding("src/settings.py", r#"password = "admin123""#))]);

        let groups = scan(&changes, &IgnoreRules::new(), &SensitiveCatalog::builtin());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].findings.len(), 1);
        let finding = groups[0].finding(ReasonKind::ContentPattern).unwrap();
        assert_eq!(finding.file, "src/settings.py");
        assert_eq!(finding.matched_pattern, "password");
    }

    #[test]
    fn added_line_beginning_with_increment_is_scanned() {
        let changes = ChangeSet::new(vec![ChangedFile::new("src/main.c", ChangeStatus::Modified)
            .with_diff(diff_adding("src/main.c", r#"++i; char* password = "hunter2";"#))]);

        let groups = scan(&changes, &IgnoreRules::new(), &SensitiveCatalog::builtin());
        assert_eq!(groups.len(), 1);
        let finding = groups[0].finding(ReasonKind::ContentPattern).unwrap();
        assert_eq!(finding.matched_pattern, "password");
    }

    #[test]
    fn removed_password_line_yields_nothing() {
        let changes = ChangeSet::new(vec![ChangedFile::new("src/settings.py", ChangeStatus::Modified)
            .with_diff(diff_removing("src/settings.py", r#"password = "admin123""#))]);

        assert!(scan(&changes, &IgnoreRules::new(), &SensitiveCatalog::builtin()).is_empty());
    }

    #[test]
    fn ignored_untracked_file_is_skipped() {
        let mut ignore = IgnoreRules::new();
        ignore.add_source("*.json\n", "", Path::new(".gitignore"));

        let changes = ChangeSet::new(vec![ChangedFile::new(
            "service_api_key.json",
            ChangeStatus::Untracked,
        )]);
        assert!(scan(&changes, &ignore, &SensitiveCatalog::builtin()).is_empty());
    }

    #[test]
    fn ignored_tracked_file_is_still_flagged() {
        let mut ignore = IgnoreRules::new();
        ignore.add_source(".env\n", "", Path::new(".gitignore"));

        let changes = ChangeSet::new(vec![ChangedFile::new(".env", ChangeStatus::Modified)]);
        let groups = scan(&changes, &ignore, &SensitiveCatalog::builtin());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].file, ".env");
    }

    #[test]
    fn filename_and_content_findings_are_grouped_in_order() {
        let changes = ChangeSet::new(vec![
            ChangedFile::new("src/main.rs", ChangeStatus::Modified),
            ChangedFile::new(".env", ChangeStatus::Untracked)
                .with_diff(diff_adding(".env", "DB_PASSWORD=hunter2")),
        ]);

        let groups = scan(&changes, &IgnoreRules::new(), &SensitiveCatalog::builtin());
        assert_eq!(groups.len(), 1);
        let kinds: Vec<ReasonKind> = groups[0].findings.iter().map(|f| f.reason_kind).collect();
        assert_eq!(
            kinds,
            vec![ReasonKind::FilenamePattern, ReasonKind::ContentPattern]
        );
    }

    #[test]
    fn deleted_files_are_not_flagged() {
        let changes = ChangeSet::new(vec![ChangedFile::new("old.pem", ChangeStatus::Deleted)]);
        assert!(scan(&changes, &IgnoreRules::new(), &SensitiveCatalog::builtin()).is_empty());
    }
}
