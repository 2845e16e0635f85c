//! Per-file splitting of unified patch text and line-level accessors.

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git a/";

/// Marker that begins a hunk within a file diff.
const HUNK_MARKER: &str = "@@ ";

/// Prefix of the line git emits in place of hunks for binary content.
const BINARY_MARKER: &str = "Binary files ";

/// A per-file slice of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path of the file (extracted from the `b/` side of `diff --git a/... b/...`).
    pub path: String,
    /// Raw text of this file's diff (header + all hunks).
    pub content: String,
}

impl FileDiff {
    /// Whether the section carries at least one hunk.
    pub fn has_hunks(&self) -> bool {
        self.content.starts_with(HUNK_MARKER) || self.content.contains(&format!("\n{HUNK_MARKER}"))
    }

    /// Whether git reported the file as binary instead of emitting hunks.
    pub fn is_binary(&self) -> bool {
        !self.has_hunks()
            && self
                .content
                .lines()
                .any(|line| line.starts_with(BINARY_MARKER))
    }
}

/// Splits a flat unified diff at `diff --git a/` boundaries.
///
/// Returns one [`FileDiff`] for each file section found in the input.
/// An empty or whitespace-only input returns an empty `Vec`.
pub fn split_by_file(diff: &str) -> Vec<FileDiff> {
    let mut positions = Vec::new();

    if diff.starts_with(FILE_DIFF_MARKER) {
        positions.push(0);
    }
    let search = format!("\n{FILE_DIFF_MARKER}");
    let mut start = 0;
    while let Some(pos) = diff[start..].find(&search) {
        // +1 to skip the newline; the section starts at `diff`.
        positions.push(start + pos + 1);
        start = start + pos + 1;
    }

    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            let content = &diff[pos..end];
            let first_line = content.lines().next().unwrap_or("");
            FileDiff {
                path: extract_path_from_diff_header(first_line),
                content: content.to_string(),
            }
        })
        .collect()
}

/// Returns the lines a patch adds, without their leading `+`.
///
/// Only hunk bodies are read, so the `+++ b/...` file header is skipped
/// while an added line starting with `++` is kept.
pub fn added_lines(patch: &str) -> impl Iterator<Item = &str> {
    hunk_body_lines(patch).filter_map(|line| line.strip_prefix('+'))
}

/// Returns the lines a patch removes, without their leading `-`.
///
/// Only hunk bodies are read, so the `--- a/...` file header is skipped.
pub fn removed_lines(patch: &str) -> impl Iterator<Item = &str> {
    hunk_body_lines(patch).filter_map(|line| line.strip_prefix('-'))
}

/// Lines inside hunks. Text without any `@@` line is all body.
fn hunk_body_lines(patch: &str) -> impl Iterator<Item = &str> {
    let mut in_hunk = !patch.lines().any(|line| line.starts_with(HUNK_MARKER));
    patch.lines().filter(move |line| {
        if line.starts_with(FILE_DIFF_MARKER) {
            in_hunk = false;
            false
        } else if line.starts_with(HUNK_MARKER) {
            in_hunk = true;
            false
        } else {
            in_hunk
        }
    })
}

/// Extracts the file path from the `b/` side of a `diff --git` header line.
fn extract_path_from_diff_header(header_line: &str) -> String {
    // Find the last " b/" to handle paths that may contain spaces.
    if let Some(b_pos) = header_line.rfind(" b/") {
        header_line[b_pos + 3..].to_string()
    } else {
        header_line
            .strip_prefix(FILE_DIFF_MARKER)
            .unwrap_or(header_line)
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn make_file_header(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n\
             index abc1234..def5678 100644\n\
             --- a/{path}\n\
             +++ b/{path}\n"
        )
    }

    fn make_single_file_diff(path: &str, hunk_body: &str) -> String {
        format!("{}@@ -1,3 +1,4 @@\n{hunk_body}", make_file_header(path))
    }

    #[test]
    fn split_by_file_empty_input() {
        assert!(split_by_file("").is_empty());
        assert!(split_by_file("   \n\n  \t  ").is_empty());
    }

    #[test]
    fn split_by_file_no_diff_markers() {
        assert!(split_by_file("some random text\nwithout diff markers\n").is_empty());
    }

    #[test]
    fn split_by_file_multiple_files() {
        let file1 = make_single_file_diff("a.rs", "+line\n");
        let file2 = make_single_file_diff("web/b.html", "+other\n");
        let diff = format!("{file1}{file2}");

        let result = split_by_file(&diff);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].path, "a.rs");
        assert_eq!(result[0].content, file1);
        assert_eq!(result[1].path, "web/b.html");
        assert!(result.iter().all(FileDiff::has_hunks));
    }

    #[test]
    fn binary_section_has_no_hunks() {
        let diff = "diff --git a/image.png b/image.png\n\
                     new file mode 100644\n\
                     index 0000000..abc1234\n\
                     Binary files /dev/null and b/image.png differ\n";

        let result = split_by_file(diff);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "image.png");
        assert!(!result[0].has_hunks());
        assert!(result[0].is_binary());
    }

    #[test]
    fn mode_change_is_neither_binary_nor_hunked() {
        let diff = "diff --git a/script.sh b/script.sh\n\
                     old mode 100644\n\
                     new mode 100755\n";
        let result = split_by_file(diff);
        assert!(!result[0].has_hunks());
        assert!(!result[0].is_binary());
    }

    #[test]
    fn rename_uses_new_path() {
        let diff = "diff --git a/old_name.rs b/new_name.rs\n\
                     similarity index 95%\n\
                     rename from old_name.rs\n\
                     rename to new_name.rs\n";
        assert_eq!(split_by_file(diff)[0].path, "new_name.rs");
    }

    #[test]
    fn path_extraction_with_spaces() {
        assert_eq!(
            extract_path_from_diff_header("diff --git a/my file.rs b/my file.rs"),
            "my file.rs"
        );
    }

    #[test]
    fn added_lines_skip_file_header() {
        let diff = make_single_file_diff("config.py", " keep\n+password = \"x\"\n-old = 1\n");
        let added: Vec<&str> = added_lines(&diff).collect();
        assert_eq!(added, vec!["password = \"x\""]);
    }

    #[test]
    fn removed_lines_skip_file_header() {
        let diff = make_single_file_diff("lib.rs", "-pub fn gone() {}\n+fn kept() {}\n");
        let removed: Vec<&str> = removed_lines(&diff).collect();
        assert_eq!(removed, vec!["pub fn gone() {}"]);
    }

    #[test]
    fn added_line_starting_with_plus_plus_is_kept() {
        let diff = make_single_file_diff("main.c", "+++i; char* password = \"hunter2\";\n");
        let added: Vec<&str> = added_lines(&diff).collect();
        assert_eq!(added, vec!["++i; char* password = \"hunter2\";"]);
    }

    #[test]
    fn removed_line_starting_with_dashes_is_kept() {
        let diff = make_single_file_diff("query.sql", "--- comment\n+select 1;\n");
        let removed: Vec<&str> = removed_lines(&diff).collect();
        assert_eq!(removed, vec!["-- comment"]);
    }

    #[test]
    fn headers_of_every_file_are_skipped() {
        let diff = format!(
            "{}{}",
            make_single_file_diff("a.py", "+a = 1\n"),
            make_single_file_diff("b.py", "+b = 2\n")
        );
        let added: Vec<&str> = added_lines(&diff).collect();
        assert_eq!(added, vec!["a = 1", "b = 2"]);
    }
}
