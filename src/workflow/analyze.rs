use crate::llm::prompt::{analysis_prompt, review_prompt};
use crate::review::generate::{fallback_review, parse_review_response};

use super::types::{WorkflowState, WorkflowStatus};
use super::ReviewWorkflow;

impl ReviewWorkflow {
    pub(super) async fn analyze(&self, mut state: WorkflowState) -> WorkflowState {
        let prompt = match state.pr_details.as_ref() {
            Some(pr) => analysis_prompt(
                pr,
                state.ticket_context.as_ref(),
                state.doc_context.as_ref(),
                self.settings.max_diff_chars,
            ),
            None => return state.fail("No PR details available"),
        };

        tracing::info!(prompt_chars = prompt.len(), "Requesting code analysis");
        match self.collaborators.model.invoke(&prompt).await {
            Ok(analysis) => {
                tracing::debug!(analysis_chars = analysis.len(), "Analysis received");
                state.analysis_text = Some(analysis);
                state.advance(WorkflowStatus::CodeAnalyzed)
            }
            Err(e) => state.fail(format!("Failed to analyze code: {e}")),
        }
    }

    pub(super) async fn generate_review(&self, mut state: WorkflowState) -> WorkflowState {
        let Some(analysis) = state
            .analysis_text
            .clone()
            .filter(|a| !a.trim().is_empty())
        else {
            return state.fail("No analysis available");
        };
        let prompt = match state.pr_details.as_ref() {
            Some(pr) => review_prompt(&analysis, &pr.files, self.settings.prompt_limits),
            None => return state.fail("No PR details available"),
        };

        tracing::info!("Generating structured review");
        let response = match self.collaborators.model.invoke(&prompt).await {
            Ok(response) => response,
            Err(e) => return state.fail(format!("Failed to generate review: {e}")),
        };

        let tagger = &self.settings.tagger;
        let review = match parse_review_response(&response, tagger) {
            Ok(review) => review,
            Err(e) => {
                tracing::warn!(error = %e, "Review response was not valid JSON, posting the analysis as a summary");
                fallback_review(&analysis, tagger)
            }
        };

        tracing::info!(
            decision = %review.decision,
            comments = review.comments.len(),
            "Review generated"
        );
        state.review_decision = Some(review.decision);
        state.review_body = Some(review.body);
        state.review_comments = Some(review.comments);
        state.advance(WorkflowStatus::ReviewGenerated)
    }
}
