//! Line-number annotation for unified diffs.
//!
//! GitHub anchors review comments to destination (head-side) line numbers, so
//! the model is shown those exact numbers next to every added and context
//! line.

use once_cell::sync::Lazy;
use regex::Regex;

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@").expect("hunk header pattern is valid")
});

pub const TRUNCATION_MARKER: &str = "... diff truncated ...";

/// Annotate a single file's patch with head-side line numbers.
///
/// Output is capped at `max_lines` annotated lines, after which a single
/// [`TRUNCATION_MARKER`] line is emitted.
pub fn annotate_patch(patch: &str, max_lines: usize) -> String {
    if patch.is_empty() {
        return String::new();
    }

    let mut annotated: Vec<String> = Vec::new();
    let mut new_line: Option<u64> = None;
    let mut old_line: Option<u64> = None;

    for raw in patch.lines() {
        if annotated.len() >= max_lines {
            annotated.push(TRUNCATION_MARKER.to_string());
            break;
        }

        if raw.starts_with("@@") {
            if let Some(caps) = HUNK_HEADER.captures(raw) {
                old_line = caps[1].parse().ok();
                new_line = caps[2].parse().ok();
            }
            annotated.push(raw.to_string());
            continue;
        }

        let Some(current) = new_line else {
            annotated.push(raw.to_string());
            continue;
        };

        if let Some(added) = raw.strip_prefix('+') {
            annotated.push(format!("{current:>5} | + {added}"));
            new_line = Some(current + 1);
        } else if let Some(removed) = raw.strip_prefix('-') {
            annotated.push(format!("      | - {removed}"));
            old_line = old_line.map(|n| n + 1);
        } else {
            let context = raw.strip_prefix(' ').unwrap_or(raw);
            annotated.push(format!("{current:>5} |   {context}"));
            new_line = Some(current + 1);
        }
    }

    annotated.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hunk_line_numbers() {
        let patch = "@@ -1,3 +1,5 @@\n line1\n+new line\n+another line\n-gone";
        let out = annotate_patch(patch, 200);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "@@ -1,3 +1,5 @@");
        assert_eq!(lines[1], "    1 |   line1");
        assert_eq!(lines[2], "    2 | + new line");
        assert_eq!(lines[3], "    3 | + another line");
        assert_eq!(lines[4], "      | - gone");
    }

    #[test]
    fn test_removed_lines_do_not_advance_destination() {
        let patch = "@@ -10,4 +20,3 @@\n-old a\n-old b\n keep\n+fresh";
        let out = annotate_patch(patch, 200);
        assert!(out.contains("   20 |   keep"));
        assert!(out.contains("   21 | + fresh"));
    }

    #[test]
    fn test_multiple_hunks_reseed_counter() {
        let patch = "@@ -1 +1 @@\n+a\n@@ -50,2 +60,2 @@\n ctx\n+b";
        let out = annotate_patch(patch, 200);
        assert!(out.contains("    1 | + a"));
        assert!(out.contains("   60 |   ctx"));
        assert!(out.contains("   61 | + b"));
    }

    #[test]
    fn test_lines_before_hunk_pass_through() {
        let patch = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n+y";
        let out = annotate_patch(patch, 200);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "diff --git a/x b/x");
        assert_eq!(lines[1], "--- a/x");
        assert_eq!(lines[2], "+++ b/x");
        assert_eq!(lines[4], "    1 | + y");
    }

    #[test]
    fn test_truncation() {
        let mut patch = String::from("@@ -1,0 +1,10 @@");
        for i in 0..10 {
            patch.push_str(&format!("\n+line {i}"));
        }
        let out = annotate_patch(&patch, 4);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], TRUNCATION_MARKER);
    }

    #[test]
    fn test_empty_patch() {
        assert_eq!(annotate_patch("", 10), "");
    }
}
