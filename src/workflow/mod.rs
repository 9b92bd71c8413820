//! The review run: a fixed sequence of steps over a [`WorkflowState`].
//!
//! Each step consumes the state and returns it; [`route`] picks the next
//! step from the outcome. Only the PR fetch, the two model calls and the
//! publisher can fail a run. Context lookups degrade to `None`.

pub mod analyze;
pub mod context;
pub mod publish;
pub mod types;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::docs::{DocSource, SemanticIndex};
use crate::error::{AppError, Result};
use crate::llm::prompt::ReviewPromptLimits;
use crate::llm::LanguageModel;
use crate::platform::github::PrRef;
use crate::platform::Platform;
use crate::review::extract::{extract_doc_page_id, extract_ticket_id};
use crate::review::CommentTagger;
use crate::tracker::TicketSource;

pub use types::{WorkflowState, WorkflowStatus};

/// External services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub platform: Arc<dyn Platform>,
    pub tickets: Arc<dyn TicketSource>,
    pub docs: Arc<dyn DocSource>,
    pub semantic: Arc<dyn SemanticIndex>,
    pub model: Arc<dyn LanguageModel>,
}

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub tagger: CommentTagger,
    /// Post the decision as a comment instead of submitting a review.
    pub restricted_reviews: bool,
    pub max_diff_chars: usize,
    pub prompt_limits: ReviewPromptLimits,
    pub query_file_names: usize,
    pub semantic_limit: usize,
    pub keyword_limit: usize,
    pub min_similarity: f64,
}

impl ReviewSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let review = &config.review;
        Self {
            tagger: CommentTagger::new(review.marker.clone(), review.signature.clone()),
            restricted_reviews: config.github.restricted_reviews,
            max_diff_chars: review.max_diff_chars,
            prompt_limits: ReviewPromptLimits {
                max_listed_files: review.max_listed_files,
                max_annotated_files: review.max_annotated_files,
                max_annotated_lines: review.max_annotated_lines,
            },
            query_file_names: review.query_file_names,
            semantic_limit: review.semantic_limit,
            keyword_limit: review.keyword_limit,
            min_similarity: review.min_similarity,
        }
    }
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Initialize,
    FetchPrDetails,
    ExtractContextIds,
    FetchTicketContext,
    FetchDocContext,
    Analyze,
    GenerateReview,
    PostReview,
    Error,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Initialize => "initialize",
            Node::FetchPrDetails => "fetch_pr_details",
            Node::ExtractContextIds => "extract_context_ids",
            Node::FetchTicketContext => "fetch_ticket_context",
            Node::FetchDocContext => "fetch_doc_context",
            Node::Analyze => "analyze",
            Node::GenerateReview => "generate_review",
            Node::PostReview => "post_review",
            Node::Error => "error",
        }
    }
}

/// Next step after `node` has run, or `None` when the run is over.
pub fn route(node: Node, state: &WorkflowState) -> Option<Node> {
    if node == Node::Error {
        return None;
    }
    if state.is_failed() {
        return Some(Node::Error);
    }
    let next = match node {
        Node::Initialize => Node::FetchPrDetails,
        Node::FetchPrDetails if state.pr_details.is_none() => Node::Error,
        Node::FetchPrDetails => Node::ExtractContextIds,
        Node::ExtractContextIds if state.ticket_id.is_some() => Node::FetchTicketContext,
        Node::ExtractContextIds | Node::FetchTicketContext => Node::FetchDocContext,
        Node::FetchDocContext => Node::Analyze,
        Node::Analyze => Node::GenerateReview,
        Node::GenerateReview => Node::PostReview,
        Node::PostReview | Node::Error => return None,
    };
    Some(next)
}

pub struct ReviewWorkflow {
    collaborators: Collaborators,
    settings: ReviewSettings,
}

impl ReviewWorkflow {
    pub fn new(collaborators: Collaborators, settings: ReviewSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// Review one pull request, failing with [`AppError::ReviewFailed`]
    /// when the run ends in the error state.
    pub async fn run(&self, pr_url: &str) -> Result<WorkflowState> {
        let state = self.execute(pr_url).await;
        match state.error.clone() {
            Some(message) => Err(AppError::ReviewFailed(message)),
            None => Ok(state),
        }
    }

    /// Drive every step to a terminal state and return it, failed or not.
    pub async fn execute(&self, pr_url: &str) -> WorkflowState {
        tracing::info!(pr_url, "Starting code review");
        let mut state = WorkflowState::new(pr_url);
        let mut node = Node::Initialize;

        loop {
            tracing::debug!(node = node.as_str(), status = %state.status, "Running step");
            state = self.step(node, state).await;
            match route(node, &state) {
                Some(next) => node = next,
                None => break,
            }
        }

        if state.status == WorkflowStatus::Complete {
            tracing::info!(pr_url, "Code review complete");
        }
        state
    }

    async fn step(&self, node: Node, state: WorkflowState) -> WorkflowState {
        match node {
            Node::Initialize => initialize(state),
            Node::FetchPrDetails => self.fetch_pr_details(state).await,
            Node::ExtractContextIds => extract_context_ids(state),
            Node::FetchTicketContext => self.fetch_ticket_context(state).await,
            Node::FetchDocContext => self.fetch_doc_context(state).await,
            Node::Analyze => self.analyze(state).await,
            Node::GenerateReview => self.generate_review(state).await,
            Node::PostReview => self.post_review(state).await,
            Node::Error => handle_error(state),
        }
    }

    async fn fetch_pr_details(&self, mut state: WorkflowState) -> WorkflowState {
        match self.collaborators.platform.fetch_pr_details(&state.pr_url).await {
            Ok(details) => {
                tracing::info!(
                    title = %details.title,
                    files = details.files.len(),
                    commits = details.commits.len(),
                    "Fetched PR details"
                );
                state.pr_details = Some(details);
                state.advance(WorkflowStatus::PrDetailsFetched)
            }
            Err(e) => state.fail(format!("Failed to fetch PR details: {e}")),
        }
    }
}

fn initialize(state: WorkflowState) -> WorkflowState {
    if state.pr_url.trim().is_empty() {
        return state.fail("PR URL is required");
    }
    if PrRef::parse(&state.pr_url).is_err() {
        let message = format!("Invalid PR URL format: {}", state.pr_url);
        return state.fail(message);
    }
    state.advance(WorkflowStatus::Initialized)
}

fn extract_context_ids(mut state: WorkflowState) -> WorkflowState {
    if let Some(pr) = &state.pr_details {
        state.ticket_id = extract_ticket_id(&pr.description, &pr.labels);
        state.doc_page_id = extract_doc_page_id(&pr.description);
    }
    tracing::info!(
        ticket = state.ticket_id.as_deref().unwrap_or("-"),
        doc_page = state.doc_page_id.as_deref().unwrap_or("-"),
        "Extracted context ids"
    );
    state.advance(WorkflowStatus::ContextIdsExtracted)
}

fn handle_error(mut state: WorkflowState) -> WorkflowState {
    let message = state
        .error
        .get_or_insert_with(|| "No PR details available".to_string());
    tracing::error!(pr_url = %state.pr_url, error = %message, "Code review failed");
    state.advance(WorkflowStatus::Error)
}
