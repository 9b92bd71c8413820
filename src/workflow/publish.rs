//! Posting the review back to the pull request.

use crate::error::Result;
use crate::platform::types::Comment;
use crate::review::{reconcile, ReviewDecision};

use super::types::{WorkflowState, WorkflowStatus};
use super::ReviewWorkflow;

const RESTRICTED_NOTE: &str =
    "*Note: GitHub Actions cannot submit official reviews, so this is posted as a comment.*";
const FALLBACK_SUMMARY: &str = "Code review summary";

impl ReviewWorkflow {
    pub(super) async fn post_review(&self, mut state: WorkflowState) -> WorkflowState {
        let platform = &self.collaborators.platform;
        let tagger = &self.settings.tagger;
        let pr_url = state.pr_url.clone();

        let deleted = platform
            .delete_marked_comments(&pr_url, tagger.marker())
            .await;
        tracing::debug!(
            issue = deleted.issue,
            review = deleted.review,
            "Previous review comments removed"
        );

        let comments: Vec<Comment> = state
            .review_comments
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|mut c| {
                c.body = tagger.tag(&c.body);
                c
            })
            .collect();
        let body = state.review_body.clone().unwrap_or_default();

        let outcome = match state.review_decision.clone() {
            None => self.post_comments_only(&pr_url, &comments).await,
            Some(decision) => {
                let reconciled = reconcile(&decision, &body, comments.len());
                state.review_decision = Some(reconciled.decision.clone());
                state.review_body = Some(reconciled.body.clone());

                if self.settings.restricted_reviews {
                    self.post_as_comments(&pr_url, &reconciled.decision, &reconciled.body, &comments)
                        .await
                } else {
                    self.submit_formal_review(&pr_url, &reconciled.decision, &reconciled.body, &comments)
                        .await
                }
            }
        };

        match outcome {
            Ok(()) => state.advance(WorkflowStatus::Complete),
            Err(e) => {
                tracing::warn!(error = %e, "Publishing the review failed, falling back to plain comments");
                let summary = state
                    .review_body
                    .as_deref()
                    .filter(|b| !b.is_empty())
                    .unwrap_or(FALLBACK_SUMMARY);
                let mut fallback = vec![Comment::general(tagger.tag(summary))];
                fallback.extend(comments);

                match platform.post_comments(&pr_url, &fallback).await {
                    Ok(posted) => {
                        tracing::info!(posted = posted.posted, failed = posted.failed, "Fallback comments posted");
                        state.advance(WorkflowStatus::Complete)
                    }
                    Err(fallback_err) => {
                        tracing::error!(error = %fallback_err, "Fallback comment posting failed");
                        state.fail(format!("Failed to submit review: {e}"))
                    }
                }
            }
        }
    }

    async fn post_comments_only(&self, pr_url: &str, comments: &[Comment]) -> Result<()> {
        if comments.is_empty() {
            tracing::info!("No review decision and no comments to post");
            return Ok(());
        }
        self.collaborators
            .platform
            .post_comments(pr_url, comments)
            .await?;
        Ok(())
    }

    /// Workflow tokens cannot submit reviews, so the decision goes out as a
    /// summary comment followed by every review comment.
    async fn post_as_comments(
        &self,
        pr_url: &str,
        decision: &ReviewDecision,
        body: &str,
        comments: &[Comment],
    ) -> Result<()> {
        let platform = &self.collaborators.platform;
        tracing::info!(decision = %decision, "Restricted environment, posting decision as a comment");

        let text = if body.is_empty() {
            format!("Code review completed with {} comment(s).", comments.len())
        } else {
            body.to_string()
        };
        let summary = self.settings.tagger.tag(&format!(
            "{}\n\n{text}\n\n---\n{RESTRICTED_NOTE}",
            decision.summary_heading()
        ));

        if let Err(e) = platform
            .post_comments(pr_url, &[Comment::general(summary)])
            .await
        {
            tracing::warn!(error = %e, "Failed to post review summary comment");
        }

        if !comments.is_empty() {
            tracing::info!(count = comments.len(), "Posting review comments");
            platform.post_comments(pr_url, comments).await?;
        }
        Ok(())
    }

    async fn submit_formal_review(
        &self,
        pr_url: &str,
        decision: &ReviewDecision,
        body: &str,
        comments: &[Comment],
    ) -> Result<()> {
        let platform = &self.collaborators.platform;
        let tagger = &self.settings.tagger;

        let (anchored, general): (Vec<Comment>, Vec<Comment>) =
            comments.iter().cloned().partition(Comment::is_anchored);
        let text = if body.is_empty() {
            format!("Code review completed. {} comment(s).", comments.len())
        } else {
            body.to_string()
        };

        tracing::info!(decision = %decision, anchored = anchored.len(), "Submitting review");
        let review = platform
            .submit_review(
                pr_url,
                decision,
                &tagger.tag(&text),
                (!anchored.is_empty()).then_some(anchored.as_slice()),
            )
            .await?;
        tracing::info!(review_id = review.id, state = %review.state, "Review submitted");

        if !general.is_empty() {
            tracing::info!(count = general.len(), "Posting general comments separately");
            if let Err(e) = platform.post_comments(pr_url, &general).await {
                tracing::warn!(error = %e, "Failed to post some general comments");
            }
        }
        Ok(())
    }
}
