use std::fmt;

use serde::Serialize;

use crate::docs::DocContext;
use crate::platform::types::{Comment, PrDetails};
use crate::review::ReviewDecision;
use crate::tracker::TicketContext;

/// Audit tag recorded at each step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initializing,
    Initialized,
    PrDetailsFetched,
    ContextIdsExtracted,
    TicketContextFetched,
    DocContextFetched,
    CodeAnalyzed,
    ReviewGenerated,
    Complete,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Initializing => "initializing",
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::PrDetailsFetched => "pr_details_fetched",
            WorkflowStatus::ContextIdsExtracted => "context_ids_extracted",
            WorkflowStatus::TicketContextFetched => "ticket_context_fetched",
            WorkflowStatus::DocContextFetched => "doc_context_fetched",
            WorkflowStatus::CodeAnalyzed => "code_analyzed",
            WorkflowStatus::ReviewGenerated => "review_generated",
            WorkflowStatus::Complete => "complete",
            WorkflowStatus::Error => "error",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one review run knows, threaded by value through the steps.
///
/// Context fields left `None` mean "attempted, nothing usable"; only `error`
/// marks the run as failed.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub pr_url: String,
    pub pr_details: Option<PrDetails>,
    pub ticket_id: Option<String>,
    pub doc_page_id: Option<String>,
    pub ticket_context: Option<TicketContext>,
    pub doc_context: Option<DocContext>,
    pub analysis_text: Option<String>,
    pub review_comments: Option<Vec<Comment>>,
    pub review_decision: Option<ReviewDecision>,
    pub review_body: Option<String>,
    pub error: Option<String>,
    pub status: WorkflowStatus,
}

impl WorkflowState {
    pub fn new(pr_url: impl Into<String>) -> Self {
        Self {
            pr_url: pr_url.into(),
            pr_details: None,
            ticket_id: None,
            doc_page_id: None,
            ticket_context: None,
            doc_context: None,
            analysis_text: None,
            review_comments: None,
            review_decision: None,
            review_body: None,
            error: None,
            status: WorkflowStatus::Initializing,
        }
    }

    /// Record a fatal error.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(status = %self.status, error = %message, "Review step failed");
        self.error = Some(message);
        self.status = WorkflowStatus::Error;
        self
    }

    pub fn advance(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(WorkflowStatus::PrDetailsFetched.as_str(), "pr_details_fetched");
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::TicketContextFetched).unwrap(),
            "\"ticket_context_fetched\""
        );
        assert_eq!(WorkflowStatus::Complete.to_string(), "complete");
    }

    #[test]
    fn test_fail_sets_error_and_status() {
        let state = WorkflowState::new("u").fail("boom");
        assert!(state.is_failed());
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.status, WorkflowStatus::Error);
    }
}
