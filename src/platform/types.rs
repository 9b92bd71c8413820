use serde::{Deserialize, Serialize};

/// Everything the review needs to know about a pull request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrDetails {
    pub url: String,
    pub number: u64,
    pub title: String,
    pub description: String,
    pub author: PrAuthor,
    pub state: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: String,
    /// Unified diff rebuilt from the per-file patches.
    pub diff: String,
    pub files: Vec<ChangedFile>,
    pub commits: Vec<CommitSummary>,
    pub labels: Vec<String>,
    pub reviewers: Vec<RequestedReviewer>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrAuthor {
    pub login: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    /// Empty for binary or oversized files.
    pub patch: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    pub author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestedReviewer {
    pub login: String,
    pub state: String,
}

/// An outgoing review comment.
///
/// With both `path` and `line` it is anchored to a diff line; otherwise it
/// is posted as a general conversation comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub path: Option<String>,
    pub line: Option<u64>,
    pub body: String,
}

impl Comment {
    pub fn general(body: impl Into<String>) -> Self {
        Self {
            path: None,
            line: None,
            body: body.into(),
        }
    }

    pub fn line(path: impl Into<String>, line: u64, body: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            line: Some(line),
            body: body.into(),
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.is_empty()) && self.line.is_some_and(|l| l > 0)
    }
}

/// Result of posting a batch of comments. Per-item failures are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    pub posted: usize,
    pub failed: usize,
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SubmittedReview {
    pub id: u64,
    pub state: String,
    pub body: String,
    pub submitted_at: String,
    pub url: String,
}

/// Counts of previously posted comments removed before a new review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedComments {
    pub issue: usize,
    pub review: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_anchoring() {
        assert!(Comment::line("src/lib.rs", 3, "x").is_anchored());
        assert!(!Comment::general("x").is_anchored());

        let path_only = Comment {
            path: Some("src/lib.rs".into()),
            line: None,
            body: "x".into(),
        };
        assert!(!path_only.is_anchored());

        let zero_line = Comment {
            path: Some("src/lib.rs".into()),
            line: Some(0),
            body: "x".into(),
        };
        assert!(!zero_line.is_anchored());
    }
}
