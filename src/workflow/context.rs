//! Ticket and documentation context steps. Neither step ever fails the run.

use crate::docs::{DocContext, Provenance, SemanticMatch};
use crate::platform::types::PrDetails;

use super::types::{WorkflowState, WorkflowStatus};
use super::ReviewWorkflow;

const GENERIC_DOC_QUERY: &str = "code review documentation guidelines";

/// Ways of locating the documentation page for a PR, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocStrategy {
    DirectLookup(String),
    Semantic,
    Keyword,
}

/// An explicit page id is authoritative: when it cannot be fetched, no
/// search is attempted.
pub fn doc_strategies(page_id: Option<&str>) -> Vec<DocStrategy> {
    match page_id {
        Some(id) => vec![DocStrategy::DirectLookup(id.to_string())],
        None => vec![DocStrategy::Semantic, DocStrategy::Keyword],
    }
}

/// Title and description plus the basenames of the first few changed files.
pub fn build_search_query(pr: Option<&PrDetails>, max_file_names: usize) -> String {
    let Some(pr) = pr else {
        return GENERIC_DOC_QUERY.to_string();
    };

    let mut query = format!("{} {}", pr.title, pr.description);
    if !pr.files.is_empty() {
        let names = pr
            .files
            .iter()
            .take(max_file_names)
            .map(|f| f.path.rsplit('/').next().unwrap_or(&f.path))
            .collect::<Vec<_>>()
            .join(" ");
        query.push(' ');
        query.push_str(&names);
    }
    query
}

impl ReviewWorkflow {
    pub(super) async fn fetch_ticket_context(&self, mut state: WorkflowState) -> WorkflowState {
        let Some(ticket_id) = state.ticket_id.clone() else {
            tracing::info!("No ticket id, skipping ticket context");
            return state.advance(WorkflowStatus::TicketContextFetched);
        };

        tracing::info!(ticket = %ticket_id, "Fetching ticket context");
        state.ticket_context = match self.collaborators.tickets.fetch_ticket(&ticket_id).await {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                tracing::warn!(ticket = %ticket_id, error = %e, "Failed to fetch ticket context, continuing without it");
                None
            }
        };
        state.advance(WorkflowStatus::TicketContextFetched)
    }

    pub(super) async fn fetch_doc_context(&self, mut state: WorkflowState) -> WorkflowState {
        let strategies = doc_strategies(state.doc_page_id.as_deref());
        let query = match state.doc_page_id {
            Some(_) => String::new(),
            None => build_search_query(state.pr_details.as_ref(), self.settings.query_file_names),
        };

        let mut found = None;
        for strategy in &strategies {
            if let Some(doc) = self.try_doc_strategy(strategy, &query).await {
                tracing::info!(page_id = %doc.id, title = %doc.title, strategy = ?strategy, "Documentation context found");
                found = Some(doc);
                break;
            }
        }
        if found.is_none() {
            tracing::info!("No documentation context found, continuing without it");
        }

        state.doc_context = found;
        state.advance(WorkflowStatus::DocContextFetched)
    }

    async fn try_doc_strategy(&self, strategy: &DocStrategy, query: &str) -> Option<DocContext> {
        let docs = &self.collaborators.docs;
        let settings = &self.settings;

        match strategy {
            DocStrategy::DirectLookup(id) => match docs.fetch_page(id).await {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(page_id = %id, error = %e, "Failed to fetch documentation page, continuing without it");
                    None
                }
            },
            DocStrategy::Semantic => {
                let hits = self
                    .collaborators
                    .semantic
                    .search(query, settings.semantic_limit, settings.min_similarity)
                    .await;
                let best = hits.first().filter(|hit| !hit.id.is_empty())?;
                let similarity_score = best.similarity_score.unwrap_or_default();
                tracing::debug!(page_id = %best.id, similarity_score, "Semantic search match");

                match docs.fetch_page(&best.id).await {
                    Ok(mut doc) => {
                        doc.provenance = Some(Provenance::Semantic(SemanticMatch {
                            query: query.to_string(),
                            similarity_score,
                            all_results: hits.clone(),
                        }));
                        Some(doc)
                    }
                    Err(e) => {
                        tracing::warn!(page_id = %best.id, error = %e, "Failed to fetch semantic match");
                        None
                    }
                }
            }
            DocStrategy::Keyword => {
                let hits = docs.search_keyword(query, settings.keyword_limit).await;
                let best = hits.first().filter(|hit| !hit.id.is_empty())?;
                match docs.fetch_page(&best.id).await {
                    Ok(mut doc) => {
                        doc.provenance = Some(Provenance::Keyword(true));
                        Some(doc)
                    }
                    Err(e) => {
                        tracing::debug!(page_id = %best.id, error = %e, "Failed to fetch keyword match");
                        None
                    }
                }
            }
        }
    }
}
