//! Ignore-file discovery and compilation.
//!
//! Every `.gitignore` under the repository root is compiled into an ordered
//! list of [`IgnoreRule`]s, each scoped to the directory that owns the file.
//! Evaluation follows ignore-file semantics: the last matching rule decides,
//! so a later `!pattern` re-includes a path that an earlier rule ignored.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

/// Name of the per-directory ignore file.
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// The pattern as written in the ignore file (without the `!` prefix).
    pub pattern: String,
    /// Whether the rule re-includes matching paths.
    pub negated: bool,
    /// Whether the rule only applies to directories (trailing `/`).
    pub dir_only: bool,
    /// Whether the pattern is anchored to the owning directory.
    pub anchored: bool,
    /// Repository-relative directory that owns the rule, `""` for the root.
    pub base: String,
    /// Ignore file the rule was read from.
    pub source: PathBuf,
    matcher: GlobMatcher,
}

impl IgnoreRule {
    /// Parses one ignore-file line.
    ///
    /// Returns `Ok(None)` for blank lines and comments, and an error when the
    /// pattern cannot be compiled.
    pub fn parse(line: &str, base: &str, source: &Path) -> Result<Option<Self>, globset::Error> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = if let Some(rest) = line.strip_prefix('!') {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix('\\') {
            // `\#` and `\!` escape the leading character
            (false, rest)
        } else {
            (false, line)
        };

        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        let anchored = body.starts_with('/') || body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let glob = if anchored || body.starts_with("**/") {
            body.to_string()
        } else {
            format!("**/{body}")
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(true)
            .build()?
            .compile_matcher();

        Ok(Some(Self {
            pattern: body.to_string(),
            negated,
            dir_only,
            anchored,
            base: normalize_base(base),
            source: source.to_path_buf(),
            matcher,
        }))
    }

    /// Returns whether this rule matches the repository-relative `path`.
    pub fn matches(&self, path: &str) -> bool {
        let Some(relative) = strip_base(path, &self.base) else {
            return false;
        };

        let candidates = path_candidates(relative);
        let candidates = if self.dir_only {
            // the final component is the file itself, only ancestors can be directories
            &candidates[..candidates.len().saturating_sub(1)]
        } else {
            &candidates[..]
        };

        candidates
            .iter()
            .any(|candidate| self.matcher.is_match(candidate))
    }
}

/// Ordered set of ignore rules for one repository snapshot.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovers and compiles every ignore file under `repo_root`.
    ///
    /// `.git/info/exclude` is read first and scoped to the root, followed by
    /// the `.gitignore` files in directory-walk order (root first, entries
    /// sorted by name). Unreadable files contribute no rules.
    pub fn compile(repo_root: &Path) -> Self {
        let mut rules = Self::new();

        let exclude = repo_root.join(".git").join("info").join("exclude");
        if exclude.is_file() {
            rules.load_file(&exclude, "");
        }

        let mut ignore_files = Vec::new();
        collect_ignore_files(repo_root, repo_root, &mut ignore_files);
        for (path, base) in ignore_files {
            rules.load_file(&path, &base);
        }

        debug!(
            rule_count = rules.len(),
            root = %repo_root.display(),
            "Compiled ignore rules"
        );
        rules
    }

    /// Parses ignore-file `content` owned by directory `base` and appends its rules.
    pub fn add_source(&mut self, content: &str, base: &str, source: &Path) {
        for (line_no, line) in content.lines().enumerate() {
            match IgnoreRule::parse(line, base, source) {
                Ok(Some(rule)) => self.rules.push(rule),
                Ok(None) => {}
                Err(e) => warn!(
                    "Skipping invalid ignore pattern {}:{}: {e}",
                    source.display(),
                    line_no + 1
                ),
            }
        }
    }

    fn load_file(&mut self, path: &Path, base: &str) {
        match fs::read_to_string(path) {
            Ok(content) => self.add_source(&content, base, path),
            Err(e) => warn!("Cannot read ignore file {}: {e}", path.display()),
        }
    }

    /// Returns whether `path` (repository-relative, `/`-separated) is ignored.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.deciding_rule(path).is_some_and(|rule| !rule.negated)
    }

    /// Returns the last rule matching `path`, which decides its ignore status.
    pub fn deciding_rule(&self, path: &str) -> Option<&IgnoreRule> {
        self.rules.iter().rev().find(|rule| rule.matches(path))
    }

    /// Returns the compiled rules in evaluation order.
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules were compiled.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Walks `dir` collecting `(ignore file, owning directory)` pairs.
fn collect_ignore_files(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) {
    let candidate = dir.join(IGNORE_FILE_NAME);
    if candidate.is_file() {
        let base = dir
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        out.push((candidate, base));
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list directory {}: {e}", dir.display());
            return;
        }
    };

    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .filter(|entry| entry.file_name() != ".git")
        .map(|entry| entry.path())
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        collect_ignore_files(root, &subdir, out);
    }
}

fn normalize_base(base: &str) -> String {
    base.trim_matches('/').to_string()
}

/// Strips the owning directory from `path`, or `None` if `path` is outside it.
fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(path);
    }
    path.strip_prefix(base)?.strip_prefix('/')
}

/// Returns every ancestor directory of `path` followed by `path` itself.
///
/// `a/b/c.txt` yields `["a", "a/b", "a/b/c.txt"]`.
fn path_candidates(path: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = path
        .match_indices('/')
        .map(|(idx, _)| &path[..idx])
        .filter(|prefix| !prefix.is_empty())
        .collect();
    candidates.push(path);
    candidates
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn rules_from(sources: &[(&str, &str)]) -> IgnoreRules {
        let mut rules = IgnoreRules::new();
        for (base, content) in sources {
            let source = PathBuf::from(format!("{base}/.gitignore"));
            rules.add_source(content, base, &source);
        }
        rules
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let rules = rules_from(&[("", "\n   \n# a comment\n*.log\n")]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].pattern, "*.log");
    }

    #[test]
    fn unanchored_pattern_matches_basename_at_any_depth() {
        let rules = rules_from(&[("", "*.log\n")]);
        assert!(rules.is_ignored("debug.log"));
        assert!(rules.is_ignored("logs/2024/server.log"));
        assert!(!rules.is_ignored("src/log.rs"));
    }

    #[test]
    fn anchored_pattern_matches_only_from_owning_directory() {
        let rules = rules_from(&[("", "/build\n")]);
        assert!(rules.is_ignored("build/output.bin"));
        assert!(!rules.is_ignored("web/build/output.bin"));
    }

    #[test]
    fn pattern_with_inner_slash_is_anchored() {
        let rules = rules_from(&[("", "docs/*.pdf\n")]);
        assert!(rules.is_ignored("docs/manual.pdf"));
        assert!(!rules.is_ignored("other/docs/manual.pdf"));
        assert!(!rules.is_ignored("docs/nested/manual.pdf"));
    }

    #[test]
    fn directory_pattern_ignores_contents_but_not_same_named_file() {
        let rules = rules_from(&[("", "cache/\n")]);
        assert!(rules.is_ignored("cache/data.bin"));
        assert!(rules.is_ignored("app/cache/data.bin"));
        assert!(!rules.is_ignored("cache"));
    }

    #[test]
    fn negation_re_includes_path() {
        let rules = rules_from(&[("", "*.env\n!example.env\n")]);
        assert!(rules.is_ignored("prod.env"));
        assert!(!rules.is_ignored("example.env"));
    }

    #[test]
    fn negation_in_more_specific_file_re_includes_path() {
        let rules = rules_from(&[("", "secrets/\n"), ("secrets", "!public.txt\n")]);
        assert!(rules.is_ignored("secrets/private.txt"));
        assert!(!rules.is_ignored("secrets/public.txt"));
    }

    #[test]
    fn later_plain_rule_overrides_negation() {
        let rules = rules_from(&[("", "*.txt\n!keep.txt\nkeep.txt\n")]);
        assert!(rules.is_ignored("keep.txt"));
    }

    #[test]
    fn nested_rules_are_scoped_to_their_directory() {
        let rules = rules_from(&[("web", "dist\n")]);
        assert!(rules.is_ignored("web/dist/app.js"));
        assert!(!rules.is_ignored("dist/app.js"));
        assert!(!rules.is_ignored("website/dist/app.js"));
    }

    #[test]
    fn nested_anchored_rule_is_relative_to_owning_directory() {
        let rules = rules_from(&[("web", "/node_modules\n")]);
        assert!(rules.is_ignored("web/node_modules/pkg/index.js"));
        assert!(!rules.is_ignored("web/app/node_modules/pkg/index.js"));
    }

    #[test]
    fn escaped_hash_is_a_literal_pattern() {
        let rules = rules_from(&[("", "\\#notes\n")]);
        assert_eq!(rules.len(), 1);
        assert!(rules.is_ignored("#notes"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let rules = rules_from(&[("", "[unclosed\n*.tmp\n")]);
        assert_eq!(rules.len(), 1);
        assert!(rules.is_ignored("scratch.tmp"));
    }

    #[test]
    fn deciding_rule_reports_provenance() {
        let rules = rules_from(&[("", "*.log\n"), ("api", "!audit.log\n")]);
        let rule = rules.deciding_rule("api/audit.log").unwrap();
        assert!(rule.negated);
        assert_eq!(rule.base, "api");
        assert_eq!(rule.source, PathBuf::from("api/.gitignore"));
    }

    #[test]
    fn compile_walks_nested_ignore_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "*.log\n").unwrap();
        fs::create_dir_all(root.join("web/assets")).unwrap();
        fs::write(root.join("web/.gitignore"), "!keep.log\n").unwrap();
        fs::write(root.join("web/assets/.gitignore"), "*.map\n").unwrap();

        let rules = IgnoreRules::compile(root);

        assert_eq!(rules.len(), 3);
        assert!(rules.is_ignored("server.log"));
        assert!(!rules.is_ignored("web/keep.log"));
        assert!(rules.is_ignored("web/assets/app.js.map"));
        assert!(!rules.is_ignored("app.js.map"));
    }

    #[test]
    fn compile_without_ignore_files_yields_no_rules() {
        let temp_dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::compile(temp_dir.path());
        assert!(rules.is_empty());
        assert!(!rules.is_ignored("anything.txt"));
    }

    #[test]
    fn path_candidates_lists_ancestors_then_path() {
        assert_eq!(path_candidates("a/b/c.txt"), vec!["a", "a/b", "a/b/c.txt"]);
        assert_eq!(path_candidates("file"), vec!["file"]);
    }
}
