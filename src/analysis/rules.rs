//! Declarative classification tables.
//!
//! The classifier walks these tables in order. Buckets assign each path to
//! the first matching label; signals contribute at most one sentence each to
//! the description and detail lists; breaking rules are evaluated last.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::git::changes::{ChangeStatus, ChangedFile};
use crate::git::diff_split::{added_lines, removed_lines};
use crate::utils::plural;

/// A path predicate over a lowercased, `/`-separated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatcher {
    /// A directory component equals the value.
    Segment(&'static str),
    /// The path starts with the value.
    Prefix(&'static str),
    /// The value occurs anywhere in the path.
    Contains(&'static str),
    /// The basename ends with `.` plus the value.
    Extension(&'static str),
    /// The basename equals the value.
    FileName(&'static str),
}

impl PathMatcher {
    /// Whether `path` (already lowercased) satisfies this predicate.
    pub fn matches(self, path: &str) -> bool {
        let (dirs, basename) = match path.rsplit_once('/') {
            Some((dirs, basename)) => (dirs, basename),
            None => ("", path),
        };
        match self {
            Self::Segment(segment) => dirs.split('/').any(|part| part == segment),
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::Contains(needle) => path.contains(needle),
            Self::Extension(ext) => basename
                .rsplit_once('.')
                .is_some_and(|(stem, found)| !stem.is_empty() && found == ext),
            Self::FileName(name) => basename == name,
        }
    }
}

/// Whether any matcher accepts `path`. Comparison is case-insensitive.
pub fn matches_any(matchers: &[PathMatcher], path: &str) -> bool {
    let lowered = path.to_lowercase();
    matchers.iter().any(|m| m.matches(&lowered))
}

/// A labelled bucket of paths.
#[derive(Debug, Clone, Copy)]
pub struct BucketRule {
    /// Human-readable label used in titles.
    pub label: &'static str,
    /// Paths satisfying any matcher belong to the bucket.
    pub matchers: &'static [PathMatcher],
}

/// A content signal contributing sentences to the summary.
///
/// Templates may use `{count}`, `{files}` (`file` or `files`) and `{paths}`.
#[derive(Debug, Clone, Copy)]
pub struct SignalRule {
    /// Short name of the signal.
    pub name: &'static str,
    /// Paths satisfying any matcher trigger the signal.
    pub matchers: &'static [PathMatcher],
    /// Sentence appended to the description.
    pub description: Option<&'static str>,
    /// Entry for the key-features list.
    pub key_feature: Option<&'static str>,
    /// Entry for the technical-changes list.
    pub technical_change: Option<&'static str>,
}

use self::PathMatcher::{Contains, Extension, FileName, Prefix, Segment};

const CI_MATCHERS: &[PathMatcher] = &[
    Prefix(".github/"),
    Prefix(".gitlab-ci"),
    Prefix(".circleci/"),
    FileName(".travis.yml"),
    FileName("jenkinsfile"),
    Contains("azure-pipelines"),
    Contains("workflow"),
];

const DEPLOYMENT_MATCHERS: &[PathMatcher] = &[
    Contains("deploy"),
    FileName("dockerfile"),
    Contains("docker-compose"),
    FileName("procfile"),
    Segment("k8s"),
    Segment("helm"),
];

const MOBILE_MATCHERS: &[PathMatcher] = &[
    Segment("mobile"),
    Segment("ios"),
    Contains("android"),
    Extension("kt"),
    Extension("kts"),
    Extension("swift"),
    Extension("gradle"),
    Contains(".xcodeproj/"),
];

const BACKEND_MATCHERS: &[PathMatcher] = &[
    Segment("backend"),
    Segment("server"),
    Segment("api"),
    Segment("functions"),
    Segment("services"),
    Contains("firebase"),
];

const WEBSITE_MATCHERS: &[PathMatcher] = &[
    Segment("web"),
    Segment("website"),
    Segment("frontend"),
    Segment("public"),
    Extension("html"),
    Extension("css"),
    Extension("scss"),
    Extension("jsx"),
    Extension("tsx"),
    Extension("vue"),
    Extension("svelte"),
];

const TEST_MATCHERS: &[PathMatcher] = &[
    Segment("test"),
    Segment("tests"),
    Segment("__tests__"),
    Segment("spec"),
    Prefix("test_"),
    Contains("/test_"),
    Contains("_test."),
    Contains(".test."),
    Contains(".spec."),
];

const DEPENDENCY_MATCHERS: &[PathMatcher] = &[
    FileName("cargo.toml"),
    FileName("cargo.lock"),
    FileName("package.json"),
    FileName("package-lock.json"),
    FileName("yarn.lock"),
    FileName("pnpm-lock.yaml"),
    FileName("requirements.txt"),
    FileName("pipfile"),
    FileName("pipfile.lock"),
    FileName("pyproject.toml"),
    FileName("poetry.lock"),
    FileName("go.mod"),
    FileName("go.sum"),
    FileName("gemfile"),
    FileName("gemfile.lock"),
    FileName("podfile"),
    FileName("podfile.lock"),
    FileName("pom.xml"),
    FileName("composer.json"),
    FileName("libs.versions.toml"),
];

const DOCUMENTATION_MATCHERS: &[PathMatcher] = &[
    Extension("md"),
    Extension("rst"),
    Extension("adoc"),
    Segment("docs"),
    Segment("doc"),
    Contains("readme"),
    Contains("changelog"),
    FileName("license"),
];

const ANALYTICS_MATCHERS: &[PathMatcher] =
    &[Contains("analytics"), Contains("telemetry"), Contains("tracking")];

const AUTH_MATCHERS: &[PathMatcher] = &[
    Contains("auth"),
    Contains("login"),
    Contains("superadmin"),
    Contains("permission"),
];

const DATABASE_MATCHERS: &[PathMatcher] = &[
    Contains("database"),
    Segment("db"),
    Segment("migrations"),
    Segment("schema"),
    Extension("sql"),
    Contains("prisma"),
];

/// Buckets in title order. A path lands in the first bucket that matches.
pub const BUCKETS: &[BucketRule] = &[
    BucketRule {
        label: "CI/CD",
        matchers: CI_MATCHERS,
    },
    BucketRule {
        label: "Deployment",
        matchers: DEPLOYMENT_MATCHERS,
    },
    BucketRule {
        label: "Mobile App",
        matchers: MOBILE_MATCHERS,
    },
    BucketRule {
        label: "Backend",
        matchers: BACKEND_MATCHERS,
    },
    BucketRule {
        label: "Website",
        matchers: WEBSITE_MATCHERS,
    },
    BucketRule {
        label: "Tests",
        matchers: TEST_MATCHERS,
    },
    BucketRule {
        label: "Dependencies",
        matchers: DEPENDENCY_MATCHERS,
    },
    BucketRule {
        label: "Documentation",
        matchers: DOCUMENTATION_MATCHERS,
    },
];

/// Label for paths no bucket claims.
pub const OTHER_LABEL: &str = "Other";

/// Signals in description order.
pub const SIGNALS: &[SignalRule] = &[
    SignalRule {
        name: "analytics",
        matchers: ANALYTICS_MATCHERS,
        description: Some("Touches analytics and tracking in {count} {files}."),
        key_feature: Some("Analytics integration updates"),
        technical_change: None,
    },
    SignalRule {
        name: "authentication",
        matchers: AUTH_MATCHERS,
        description: Some("Changes authentication and access control in {count} {files}."),
        key_feature: Some("Authentication and access control changes"),
        technical_change: None,
    },
    SignalRule {
        name: "database",
        matchers: DATABASE_MATCHERS,
        description: Some("Updates the database layer in {count} {files}."),
        key_feature: None,
        technical_change: Some("Database schema and persistence updates ({count} {files})"),
    },
    SignalRule {
        name: "tests",
        matchers: TEST_MATCHERS,
        description: Some("Adjusts tests in {count} {files}."),
        key_feature: None,
        technical_change: Some("Test coverage changes ({count} test {files})"),
    },
    SignalRule {
        name: "dependencies",
        matchers: DEPENDENCY_MATCHERS,
        description: Some("Updates dependency manifests ({paths})."),
        key_feature: None,
        technical_change: Some("Dependency updates in {paths}"),
    },
    SignalRule {
        name: "deployment workflows",
        matchers: &[
            Prefix(".github/"),
            Prefix(".gitlab-ci"),
            Prefix(".circleci/"),
            Contains("workflow"),
            Contains("deploy"),
        ],
        description: Some("Adjusts deployment workflows in {count} {files}."),
        key_feature: Some("CI/CD and deployment workflow changes"),
        technical_change: None,
    },
    SignalRule {
        name: "documentation",
        matchers: DOCUMENTATION_MATCHERS,
        description: Some("Refreshes documentation in {count} {files}."),
        key_feature: None,
        technical_change: Some("Documentation updates ({count} {files})"),
    },
];

/// Fills `{count}`, `{files}` and `{paths}` in a template.
pub fn render(template: &str, paths: &[&str]) -> String {
    template
        .replace("{count}", &paths.len().to_string())
        .replace("{files}", plural(paths.len(), "file", "files"))
        .replace("{paths}", &paths.join(", "))
}

/// Predicate deciding whether a changed file is breaking.
pub type BreakingPredicate = Box<dyn Fn(&ChangedFile) -> bool + Send + Sync>;

/// A named breaking-change rule.
///
/// The sentence is a template rendered with the matching paths.
pub struct BreakingRule {
    name: String,
    sentence: String,
    predicate: BreakingPredicate,
}

impl BreakingRule {
    /// Creates a rule from a name, a sentence template and a predicate.
    pub fn new<F>(name: impl Into<String>, sentence: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ChangedFile) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            sentence: sentence.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `file` triggers the rule.
    pub fn matches(&self, file: &ChangedFile) -> bool {
        (self.predicate)(file)
    }

    /// Renders the rule's sentence for the matching paths.
    pub fn describe(&self, paths: &[&str]) -> String {
        render(&self.sentence, paths)
    }
}

impl fmt::Debug for BreakingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakingRule")
            .field("name", &self.name)
            .field("sentence", &self.sentence)
            .finish_non_exhaustive()
    }
}

/// Checks if a file is part of a public interface.
pub fn is_public_interface(path: &str) -> bool {
    const MATCHERS: &[PathMatcher] = &[
        FileName("lib.rs"),
        FileName("mod.rs"),
        FileName("index.ts"),
        FileName("index.js"),
        FileName("__init__.py"),
        Segment("api"),
        Segment("interface"),
        Segment("interfaces"),
        Segment("proto"),
        Extension("proto"),
        Extension("graphql"),
        Extension("gql"),
        Contains("openapi"),
        Contains("swagger"),
    ];
    matches_any(MATCHERS, path) || path.to_lowercase().ends_with(".d.ts")
}

/// Public declaration across the languages the classifier knows about.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static PUBLIC_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:",
        r"pub(?:\([^)]*\))?\s+(?:(?:async|unsafe|const|extern)\s+)*(?:fn|struct|enum|trait|type|const|static|mod|union)\s",
        r"|export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|interface|type|enum)\b",
        r"|public\s+",
        r"|func\s+(?:\([^)]*\)\s*)?[A-Z]",
        r")",
    ))
    .unwrap()
});

/// Whether the patch removes a public declaration without re-adding it.
pub fn removes_public_declaration(patch: &str) -> bool {
    let readded: BTreeSet<&str> = added_lines(patch).map(str::trim).collect();
    removed_lines(patch)
        .filter(|line| PUBLIC_DECLARATION.is_match(line))
        .any(|line| !readded.contains(line.trim()))
}

/// The built-in breaking-change rules, in evaluation order.
pub fn builtin_breaking_rules() -> Vec<BreakingRule> {
    vec![
        BreakingRule::new(
            "public-interface-deleted",
            "Removes public interface {files}: {paths}",
            |file| file.status == ChangeStatus::Deleted && is_public_interface(&file.path),
        ),
        BreakingRule::new(
            "public-interface-renamed",
            "Moves public interface {files} to {paths}",
            |file| {
                file.status == ChangeStatus::Renamed
                    && file
                        .previous_path
                        .as_deref()
                        .is_some_and(is_public_interface)
            },
        ),
        BreakingRule::new(
            "public-declaration-removed",
            "Removes public declarations in {paths}",
            |file| {
                matches!(file.status, ChangeStatus::Modified | ChangeStatus::Renamed)
                    && file
                        .diff_text
                        .as_deref()
                        .is_some_and(removes_public_declaration)
            },
        ),
        BreakingRule::new(
            "security-rules",
            "Security rules updated, may affect API access ({paths})",
            |file| {
                matches_any(
                    &[Contains("security"), Extension("rules"), Contains(".rules.")],
                    &file.path,
                )
            },
        ),
        BreakingRule::new(
            "migrations",
            "Database migrations required ({paths})",
            |file| matches_any(&[Contains("migration")], &file.path),
        ),
    ]
}
