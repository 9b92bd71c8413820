pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::review::ReviewDecision;
use types::*;

/// Code-hosting operations the review workflow depends on.
///
/// Every method addresses the pull request by its web URL.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch metadata, files, commits and the rebuilt diff of a PR.
    async fn fetch_pr_details(&self, pr_url: &str) -> Result<PrDetails>;

    /// Post comments one by one. Individual failures are counted in the
    /// outcome; an `Err` means the PR itself could not be reached.
    async fn post_comments(&self, pr_url: &str, comments: &[Comment]) -> Result<PostOutcome>;

    /// Submit a formal review. Only anchored comments are attached.
    async fn submit_review(
        &self,
        pr_url: &str,
        decision: &ReviewDecision,
        body: &str,
        comments: Option<&[Comment]>,
    ) -> Result<SubmittedReview>;

    /// Remove earlier comments carrying `marker` that were written by the
    /// authenticated user. Never fails; problems are logged.
    async fn delete_marked_comments(&self, pr_url: &str, marker: &str) -> DeletedComments;
}
