use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;
use crate::review::ReviewDecision;

use super::mapper;
use super::retry::{map_github_error, with_rate_limit_retry};
use super::url::PrRef;

const PER_PAGE: u8 = 100;
/// GitHub stops listing PR files after 3000 entries.
const MAX_PAGES: u32 = 30;
const APPROVAL_NOTE: &str = "✅ Code looks good! (Note: GitHub Actions cannot approve PRs)";

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

pub struct GitHubPlatform {
    client: Octocrab,
    /// Formal approvals are rejected for workflow tokens; submit them as
    /// comments instead. The review workflow never submits in restricted
    /// mode, so this only applies to direct callers of [`Platform`].
    restricted: bool,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Config("GITHUB_TOKEN environment variable is required".to_string())
            })?;

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self {
            client,
            restricted: config.restricted_reviews,
        })
    }

    async fn get_json(&self, route: &str, operation: &str) -> Result<Value> {
        with_rate_limit_retry(&self.client, operation, || {
            self.client.get(route, None::<&()>)
        })
        .await
    }

    async fn post_json(&self, route: &str, body: &Value, operation: &str) -> Result<Value> {
        with_rate_limit_retry(&self.client, operation, || {
            self.client.post(route, Some(body))
        })
        .await
    }

    /// Fetch every page of a list endpoint.
    async fn get_all(&self, route: &str, operation: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<Value> = with_rate_limit_retry(&self.client, operation, || {
                self.client.get(route, Some(&params))
            })
            .await?;

            let last = batch.len() < usize::from(PER_PAGE);
            items.extend(batch);
            if last {
                break;
            }
        }
        Ok(items)
    }

    async fn delete(&self, route: &str) -> Result<()> {
        let response = self
            .client
            ._delete(route, None::<&()>)
            .await
            .map_err(|e| map_github_error(e, "deleting comment"))?;

        if !response.status().is_success() {
            return Err(AppError::GitHubApi(format!(
                "Failed to delete {route}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn post_one(&self, pr: &PrRef, head_sha: &str, comment: &Comment) -> Result<u64> {
        let created = match (comment.path.as_deref(), comment.line) {
            (Some(path), Some(line)) if comment.is_anchored() => {
                let body = json!({
                    "body": comment.body,
                    "commit_id": head_sha,
                    "path": path,
                    "line": line,
                    "side": "RIGHT",
                });
                let route = format!("{}/comments", pr.pulls_path());
                self.post_json(&route, &body, "posting line comment").await?
            }
            (Some(path), _) if !path.is_empty() => {
                let body = json!({ "body": format!("**File: {path}**\n\n{}", comment.body) });
                self.post_json(&pr.issue_comments_path(), &body, "posting file comment")
                    .await?
            }
            _ => {
                let body = json!({ "body": comment.body });
                self.post_json(&pr.issue_comments_path(), &body, "posting comment")
                    .await?
            }
        };
        Ok(created["id"].as_u64().unwrap_or_default())
    }

    /// Delete the comments in `comments` that carry `marker` and were written
    /// by `login`. `kind` selects the issue or review-comment endpoint.
    async fn delete_matching(
        &self,
        pr: &PrRef,
        comments: &[Value],
        marker: &str,
        login: &str,
        kind: &str,
    ) -> usize {
        let mut deleted = 0;
        for comment in comments {
            let body = comment["body"].as_str().unwrap_or_default();
            let author = comment["user"]["login"].as_str().unwrap_or_default();
            if !body.contains(marker) || author != login {
                continue;
            }

            let Some(id) = comment["id"].as_u64() else {
                continue;
            };
            let route = format!("{}/{kind}/comments/{id}", pr.repo_path());
            match self.delete(&route).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(comment_id = id, kind, error = %e, "Failed to delete comment"),
            }
        }
        deleted
    }
}

/// Event and body actually sent for `decision`. Restricted tokens cannot
/// approve, so APPROVE is downgraded to COMMENT with a note.
fn review_event(decision: &ReviewDecision, body: &str, restricted: bool) -> (ReviewDecision, String) {
    if !restricted || *decision != ReviewDecision::Approve {
        return (decision.clone(), body.to_string());
    }

    tracing::warn!("Workflow tokens cannot approve PRs, submitting APPROVE as COMMENT");
    let body = if body.is_empty() {
        APPROVAL_NOTE.to_string()
    } else {
        format!("{APPROVAL_NOTE}\n\n{body}")
    };
    (ReviewDecision::Comment, body)
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn fetch_pr_details(&self, pr_url: &str) -> Result<PrDetails> {
        let pr = PrRef::parse(pr_url)?;
        tracing::debug!(repo = %pr.full_name(), number = pr.number, "Fetching pull request");

        let route = pr.pulls_path();
        let raw = self.get_json(&route, "fetching PR details").await?;
        let files = self
            .get_all(&format!("{route}/files"), "listing PR files")
            .await?;
        let commits = self
            .get_all(&format!("{route}/commits"), "listing PR commits")
            .await?;

        // Name and email live on the user profile, not on the PR payload.
        let profile = match raw["user"]["login"].as_str() {
            Some(login) => self
                .get_json(&format!("/users/{login}"), "fetching author profile")
                .await
                .map_err(|e| tracing::debug!(error = %e, "Author profile unavailable"))
                .ok(),
            None => None,
        };
        let author = mapper::map_author(&raw, profile.as_ref());

        Ok(mapper::map_pr_details(&raw, &files, &commits, author))
    }

    async fn post_comments(&self, pr_url: &str, comments: &[Comment]) -> Result<PostOutcome> {
        let pr = PrRef::parse(pr_url)?;
        let raw = self
            .get_json(&pr.pulls_path(), "posting comments")
            .await?;
        let head_sha = raw["head"]["sha"].as_str().unwrap_or_default().to_string();

        let mut outcome = PostOutcome::default();
        for comment in comments {
            match self.post_one(&pr, &head_sha, comment).await {
                Ok(id) => {
                    outcome.posted += 1;
                    outcome.ids.push(id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        path = comment.path.as_deref().unwrap_or("-"),
                        line = comment.line.unwrap_or_default(),
                        error = %e,
                        "Failed to post comment"
                    );
                }
            }
        }

        tracing::info!(
            posted = outcome.posted,
            failed = outcome.failed,
            "Posted review comments"
        );
        Ok(outcome)
    }

    async fn submit_review(
        &self,
        pr_url: &str,
        decision: &ReviewDecision,
        body: &str,
        comments: Option<&[Comment]>,
    ) -> Result<SubmittedReview> {
        if !decision.is_valid() {
            return Err(AppError::InvalidDecision(decision.to_string()));
        }

        let (event, body) = review_event(decision, body, self.restricted);
        let pr = PrRef::parse(pr_url)?;
        let mut payload = json!({ "body": body, "event": event.as_str() });
        let anchored: Vec<Value> = comments
            .unwrap_or_default()
            .iter()
            .filter(|c| c.is_anchored())
            .map(|c| json!({ "path": c.path, "line": c.line, "body": c.body, "side": "RIGHT" }))
            .collect();
        if !anchored.is_empty() {
            payload["comments"] = Value::Array(anchored);
        }

        let route = format!("{}/reviews", pr.pulls_path());
        let review = self
            .post_json(&route, &payload, "submitting review")
            .await?;

        tracing::info!(event = %event, pr = pr.number, "Submitted review");
        Ok(mapper::map_submitted_review(&review))
    }

    async fn delete_marked_comments(&self, pr_url: &str, marker: &str) -> DeletedComments {
        let pr = match PrRef::parse(pr_url) {
            Ok(pr) => pr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping comment cleanup");
                return DeletedComments::default();
            }
        };

        // Without knowing who we are, nothing is safe to delete.
        let login = match self.client.current().user().await {
            Ok(user) => user.login,
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine current user, skipping comment cleanup");
                return DeletedComments::default();
            }
        };

        let mut deleted = DeletedComments::default();

        match self
            .get_all(&pr.issue_comments_path(), "listing issue comments")
            .await
        {
            Ok(comments) => {
                deleted.issue = self
                    .delete_matching(&pr, &comments, marker, &login, "issues")
                    .await;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list issue comments"),
        }

        let review_route = format!("{}/comments", pr.pulls_path());
        match self.get_all(&review_route, "listing review comments").await {
            Ok(comments) => {
                deleted.review = self
                    .delete_matching(&pr, &comments, marker, &login, "pulls")
                    .await;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list review comments"),
        }

        tracing::info!(
            issue = deleted.issue,
            review = deleted.review,
            "Deleted previous review comments"
        );
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_approval_becomes_comment() {
        let (event, body) = review_event(&ReviewDecision::Approve, "LGTM", true);
        assert_eq!(event, ReviewDecision::Comment);
        assert_eq!(body, format!("{APPROVAL_NOTE}\n\nLGTM"));

        let (event, body) = review_event(&ReviewDecision::Approve, "", true);
        assert_eq!(event, ReviewDecision::Comment);
        assert_eq!(body, APPROVAL_NOTE);
    }

    #[test]
    fn test_unrestricted_or_non_approval_passes_through() {
        let (event, body) = review_event(&ReviewDecision::Approve, "LGTM", false);
        assert_eq!(event, ReviewDecision::Approve);
        assert_eq!(body, "LGTM");

        let (event, body) = review_event(&ReviewDecision::RequestChanges, "Fix it", true);
        assert_eq!(event, ReviewDecision::RequestChanges);
        assert_eq!(body, "Fix it");
    }
}
