use std::sync::Arc;

use crate::config::AppConfig;
use crate::docs::{build_doc_source, ChromaSemanticIndex, DisabledSemanticIndex, SemanticIndex};
use crate::error::Result;
use crate::llm::build_language_model;
use crate::platform::github::GitHubPlatform;
use crate::tracker::build_ticket_source;
use crate::workflow::{Collaborators, ReviewSettings, ReviewWorkflow};

/// Wire the configured collaborators into a ready-to-run workflow.
pub fn build_workflow(config: &AppConfig) -> Result<ReviewWorkflow> {
    config.github_token()?;
    config.llm_api_key()?;

    let collaborators = Collaborators {
        platform: Arc::new(GitHubPlatform::new(&config.github)?),
        tickets: build_ticket_source(&config.jira)?,
        docs: build_doc_source(&config.confluence)?,
        semantic: build_semantic_index(config),
        model: build_language_model(&config.llm)?,
    };

    Ok(ReviewWorkflow::new(
        collaborators,
        ReviewSettings::from_config(config),
    ))
}

/// Semantic search is optional: without a reachable configuration the
/// documentation lookup falls back to keyword search.
fn build_semantic_index(config: &AppConfig) -> Arc<dyn SemanticIndex> {
    if config.semantic.host.is_none() {
        tracing::info!("Semantic search not configured");
        return Arc::new(DisabledSemanticIndex);
    }

    match ChromaSemanticIndex::new(&config.semantic) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            tracing::warn!(error = %e, "Semantic search unavailable, using keyword search only");
            Arc::new(DisabledSemanticIndex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemanticConfig;

    #[test]
    fn test_missing_credentials_fail_fast() {
        let err = build_workflow(&AppConfig::default()).err().unwrap();
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let mut config = AppConfig::default();
        config.github.token = Some("ghp_test".into());
        let err = build_workflow(&config).err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn test_semantic_index_without_embedding_key_is_disabled() {
        let config = AppConfig {
            semantic: SemanticConfig {
                host: Some("localhost".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let index = build_semantic_index(&config);
        assert!(index.search("anything", 3, 0.7).await.is_empty());
    }
}
