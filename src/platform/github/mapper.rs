use serde_json::Value;

use crate::platform::types::{
    ChangedFile, CommitSummary, PrAuthor, PrDetails, RequestedReviewer, SubmittedReview,
};

fn str_field(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Map a pull request plus its files and commits to [`PrDetails`].
///
/// The diff is rebuilt from the per-file patches since the JSON API does not
/// return one.
pub fn map_pr_details(
    pr: &Value,
    files: &[Value],
    commits: &[Value],
    author: PrAuthor,
) -> PrDetails {
    let files: Vec<ChangedFile> = files.iter().map(map_file).collect();
    let diff = build_unified_diff(&files);

    PrDetails {
        url: str_field(pr, "/html_url"),
        number: pr["number"].as_u64().unwrap_or_default(),
        title: str_field(pr, "/title"),
        description: str_field(pr, "/body"),
        author,
        state: str_field(pr, "/state"),
        base_branch: str_field(pr, "/base/ref"),
        head_branch: str_field(pr, "/head/ref"),
        head_sha: str_field(pr, "/head/sha"),
        diff,
        files,
        commits: commits.iter().map(map_commit).collect(),
        labels: pr["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        reviewers: pr["requested_reviewers"]
            .as_array()
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| u["login"].as_str())
                    .map(|login| RequestedReviewer {
                        login: login.to_string(),
                        state: "requested".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        created_at: str_field(pr, "/created_at"),
        updated_at: str_field(pr, "/updated_at"),
    }
}

/// Author from the PR's `user` object, enriched with the profile when it
/// could be fetched.
pub fn map_author(pr: &Value, profile: Option<&Value>) -> PrAuthor {
    let login = str_field(pr, "/user/login");
    let name = profile
        .and_then(|p| p["name"].as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(&login)
        .to_string();
    let email = profile
        .and_then(|p| p["email"].as_str())
        .unwrap_or_default()
        .to_string();

    PrAuthor { login, name, email }
}

fn map_file(file: &Value) -> ChangedFile {
    ChangedFile {
        path: str_field(file, "/filename"),
        additions: file["additions"].as_u64().unwrap_or_default(),
        deletions: file["deletions"].as_u64().unwrap_or_default(),
        patch: str_field(file, "/patch"),
    }
}

fn map_commit(commit: &Value) -> CommitSummary {
    let message = str_field(commit, "/commit/message");
    CommitSummary {
        sha: str_field(commit, "/sha"),
        message: message.lines().next().unwrap_or_default().to_string(),
        author: str_field(commit, "/commit/author/name"),
    }
}

pub fn build_unified_diff(files: &[ChangedFile]) -> String {
    files
        .iter()
        .filter(|f| !f.patch.is_empty())
        .map(|f| {
            format!(
                "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n{patch}",
                path = f.path,
                patch = f.patch
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn map_submitted_review(review: &Value) -> SubmittedReview {
    SubmittedReview {
        id: review["id"].as_u64().unwrap_or_default(),
        state: str_field(review, "/state"),
        body: str_field(review, "/body"),
        submitted_at: str_field(review, "/submitted_at"),
        url: str_field(review, "/html_url"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_pr() -> Value {
        json!({
            "html_url": "https://github.com/acme/widgets/pull/5",
            "number": 5,
            "title": "Add cache",
            "body": null,
            "state": "open",
            "user": {"login": "octo"},
            "base": {"ref": "main"},
            "head": {"ref": "feature/cache", "sha": "abc123"},
            "labels": [{"name": "PROJ-9"}, {"name": "backend"}],
            "requested_reviewers": [{"login": "reviewer1"}],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        })
    }

    #[test]
    fn test_map_pr_details() {
        let files = vec![
            json!({"filename": "src/cache.rs", "additions": 10, "deletions": 2, "patch": "@@ -1 +1 @@\n+x"}),
            json!({"filename": "logo.png", "additions": 0, "deletions": 0}),
        ];
        let commits = vec![json!({
            "sha": "c1",
            "commit": {"message": "Add cache\n\nLonger body", "author": {"name": "Octo Cat"}}
        })];
        let pr = sample_pr();
        let author = map_author(&pr, None);
        let details = map_pr_details(&pr, &files, &commits, author);

        assert_eq!(details.number, 5);
        assert_eq!(details.description, "");
        assert_eq!(details.head_sha, "abc123");
        assert_eq!(details.author.name, "octo");
        assert_eq!(details.labels, vec!["PROJ-9", "backend"]);
        assert_eq!(details.reviewers[0].login, "reviewer1");
        assert_eq!(details.reviewers[0].state, "requested");
        assert_eq!(details.commits[0].message, "Add cache");
        assert_eq!(details.files.len(), 2);
        assert_eq!(details.files[1].patch, "");
        assert_eq!(
            details.diff,
            "diff --git a/src/cache.rs b/src/cache.rs\n--- a/src/cache.rs\n+++ b/src/cache.rs\n@@ -1 +1 @@\n+x"
        );
    }

    #[test]
    fn test_map_author_with_profile() {
        let profile = json!({"name": "Octo Cat", "email": "octo@example.com"});
        let author = map_author(&sample_pr(), Some(&profile));
        assert_eq!(author.login, "octo");
        assert_eq!(author.name, "Octo Cat");
        assert_eq!(author.email, "octo@example.com");
    }
}
