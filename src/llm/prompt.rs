use crate::docs::{html_to_text, DocContext};
use crate::platform::types::{ChangedFile, PrDetails};
use crate::review::annotate::annotate_patch;
use crate::tracker::TicketContext;

const DOC_EXCERPT_CHARS: usize = 1_500;

/// Size limits applied while building the review prompt.
#[derive(Debug, Clone, Copy)]
pub struct ReviewPromptLimits {
    pub max_listed_files: usize,
    pub max_annotated_files: usize,
    pub max_annotated_lines: usize,
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn analysis_prompt(
    pr: &PrDetails,
    ticket: Option<&TicketContext>,
    doc: Option<&DocContext>,
    max_diff_chars: usize,
) -> String {
    let criteria_section = match ticket {
        Some(ticket) if !ticket.acceptance_criteria.is_empty() => {
            let bullets = ticket
                .acceptance_criteria
                .iter()
                .map(|ac| format!("- {ac}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\n## Jira Acceptance Criteria\n{bullets}\n")
        }
        _ => String::new(),
    };

    let doc_section = match doc {
        Some(doc) => {
            let text = html_to_text(doc.storage_html());
            let excerpt = truncate_chars(&text, DOC_EXCERPT_CHARS);
            format!(
                "\n## Domain Context (Confluence): {title}\nUse this context to understand domain-specific guidelines and patterns.\n{excerpt}\n",
                title = doc.title
            )
        }
        None => String::new(),
    };

    format!(
        r#"You are an expert code reviewer focused on design, scalability, security, reliability, and efficiency. Provide high-signal findings only.
Ignore comment-only or docstring-only changes unless they introduce security or logic defects.

PR Title: {title}
PR Description: {description}

Files Changed: {file_count}
{criteria_section}{doc_section}
## Code Changes (Diff)
{diff}

Focus on human-reviewer concerns:
- Logic errors and edge cases
- Design, architecture, and scalability
- Code maintainability
- Security vulnerabilities and data handling
- Performance issues and regressions
- Reliability and error handling

Do NOT focus on:
- Syntax errors (caught by linters)
- Formatting (caught by formatters)
- Type errors (caught by type checkers)

Provide a comprehensive analysis of the code changes."#,
        title = pr.title,
        description = pr.description,
        file_count = pr.files.len(),
        diff = truncate_chars(&pr.diff, max_diff_chars),
    )
}

pub fn review_prompt(analysis: &str, files: &[ChangedFile], limits: ReviewPromptLimits) -> String {
    let file_list = files
        .iter()
        .take(limits.max_listed_files)
        .map(|f| format!("- {} (+{}/-{})", f.path, f.additions, f.deletions))
        .collect::<Vec<_>>()
        .join("\n");

    let annotated = files
        .iter()
        .filter(|f| !f.patch.is_empty())
        .take(limits.max_annotated_files)
        .map(|f| {
            format!(
                "File: {}\n{}",
                f.path,
                annotate_patch(&f.patch, limits.max_annotated_lines)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let annotated = if annotated.is_empty() {
        "No patch data available.".to_string()
    } else {
        annotated
    };

    format!(
        r#"Based on the following code analysis, generate structured review output for the GitHub PR.

Analysis:
{analysis}

Files Changed:
{file_list}

Diff (HEAD line numbers annotated on new/context lines; use these exact line numbers for inline comments):
{annotated}

Output MUST be valid JSON (no markdown) in this format:
{{
  "review_decision": "APPROVE" | "REQUEST_CHANGES" | "COMMENT",
  "main_review_comment": "Single, high-value PR comment that includes a concise summary and ALL feedback grouped by severity: CRITICAL, MAJOR, MINOR. Include actionable suggestions for each item. This is the only top-level PR comment.",
  "critical_comments": [
    {{
      "path": "file/path.rs",
      "line": 42,
      "body": "CRITICAL issue description WITH suggested fix or code change"
    }}
  ]
}}

Severity guidance:
- CRITICAL (must fix before merging): security issues, correctness bugs, data loss, missing required acceptance criteria
- MAJOR (performance degradation or regression risk): significant performance or stability concerns
- MINOR (safe for production): code quality, maintainability, small potential issues

Important rules:
- Only include CRITICAL items in critical_comments. Each must have path, line, and a suggested fix.
- All MAJOR and MINOR feedback must live inside main_review_comment (not file comments).
- main_review_comment must summarize the review and clearly list CRITICAL/MAJOR/MINOR items with actionable suggestions.
- Keep the output as compact, direct, and high-signal as possible.
- Ignore comment-only or docstring-only changes unless they introduce security or logic defects.
- For any CRITICAL comment, the line number must map to the exact changed line in the diff.

Return ONLY valid JSON, no markdown code fences."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_with_diff(diff: &str) -> PrDetails {
        PrDetails {
            title: "Add login".into(),
            description: "Implements PROJ-123".into(),
            diff: diff.into(),
            files: vec![ChangedFile {
                path: "src/auth.rs".into(),
                additions: 3,
                deletions: 1,
                patch: "@@ -1 +1,2 @@\n+fn login() {}".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_analysis_prompt_sections() {
        let pr = pr_with_diff("+fn login() {}");
        let ticket = TicketContext {
            acceptance_criteria: vec!["Users can log in".into()],
            ..Default::default()
        };
        let doc = DocContext {
            title: "Auth Guide".into(),
            ..Default::default()
        };

        let prompt = analysis_prompt(&pr, Some(&ticket), Some(&doc), 50_000);
        assert!(prompt.contains("PR Title: Add login"));
        assert!(prompt.contains("Files Changed: 1"));
        assert!(prompt.contains("- Users can log in"));
        assert!(prompt.contains("Domain Context (Confluence): Auth Guide"));
        assert!(prompt.contains("+fn login() {}"));
    }

    #[test]
    fn test_analysis_prompt_omits_empty_context() {
        let pr = pr_with_diff("");
        let ticket = TicketContext::default();
        let prompt = analysis_prompt(&pr, Some(&ticket), None, 50_000);
        assert!(!prompt.contains("Acceptance Criteria"));
        assert!(!prompt.contains("Domain Context"));
    }

    #[test]
    fn test_analysis_prompt_truncates_diff() {
        let pr = pr_with_diff(&"x".repeat(100));
        let prompt = analysis_prompt(&pr, None, None, 10);
        assert!(prompt.contains(&format!("{}\n", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[test]
    fn test_review_prompt_lists_and_annotates() {
        let pr = pr_with_diff("");
        let limits = ReviewPromptLimits {
            max_listed_files: 20,
            max_annotated_files: 5,
            max_annotated_lines: 180,
        };
        let prompt = review_prompt("looks risky", &pr.files, limits);
        assert!(prompt.contains("- src/auth.rs (+3/-1)"));
        assert!(prompt.contains("File: src/auth.rs"));
        assert!(prompt.contains("    1 | + fn login() {}"));
        assert!(prompt.contains("\"review_decision\""));
    }

    #[test]
    fn test_review_prompt_without_patches() {
        let files = vec![ChangedFile {
            path: "logo.png".into(),
            ..Default::default()
        }];
        let limits = ReviewPromptLimits {
            max_listed_files: 20,
            max_annotated_files: 5,
            max_annotated_lines: 180,
        };
        let prompt = review_prompt("ok", &files, limits);
        assert!(prompt.contains("No patch data available."));
    }
}
