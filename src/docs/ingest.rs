//! Loading documentation pages into the semantic index.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::{AtlassianConfig, SemanticConfig};
use crate::error::{AppError, Result};

use super::semantic::{IndexDocument, PageMetadata};
use super::{
    html_to_text, page_url, ChromaSemanticIndex, ConfluenceClient, DocContext, DocSource,
    StubDocSource, HTTP_TIMEOUT, STUB_BASE_URL,
};

/// Where pages to ingest come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    /// Every page of the configured stub dataset.
    Stubs,
    /// Specific pages from live Confluence.
    Pages(Vec<String>),
    /// Every page of a live Confluence space.
    Space(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Documents to store after skipping known pages.
#[derive(Debug, Default)]
pub struct IngestPlan {
    pub documents: Vec<IndexDocument>,
    pub skipped: usize,
    pub failed: usize,
}

/// Text and metadata stored for a page. Pages without an id cannot be
/// addressed and yield `None`; an empty body falls back to the title.
pub fn index_document(page: &DocContext, base_url: &str) -> Option<IndexDocument> {
    if page.id.is_empty() {
        return None;
    }

    let text = match html_to_text(page.storage_html()) {
        body if body.is_empty() => page.title.clone(),
        body => body,
    };

    Some(IndexDocument {
        id: page.id.clone(),
        text,
        metadata: PageMetadata {
            page_id: page.id.clone(),
            title: page.title.clone(),
            space_key: page.space.key.clone(),
            space_name: page.space.name.clone(),
            url: page_url(base_url, &page.id),
        },
    })
}

/// Split `pages` into documents to store, pages already present in
/// `existing` (ignored when `force` is set) and pages without an id.
pub fn plan_ingest(
    pages: &[DocContext],
    existing: &HashSet<String>,
    force: bool,
    base_url: &str,
) -> IngestPlan {
    let mut plan = IngestPlan::default();
    for page in pages {
        let Some(document) = index_document(page, base_url) else {
            tracing::warn!(title = %page.title, "Page has no id, cannot ingest");
            plan.failed += 1;
            continue;
        };
        if !force && existing.contains(&document.id) {
            plan.skipped += 1;
            continue;
        }
        plan.documents.push(document);
    }
    plan
}

/// Embed and store `pages`. Pages already in the collection are skipped
/// unless `force` is set.
pub async fn ingest_pages(
    index: &ChromaSemanticIndex,
    pages: &[DocContext],
    base_url: &str,
    force: bool,
) -> Result<IngestStats> {
    let collection_id = index.collection_id(true).await?;
    let existing = if force {
        HashSet::new()
    } else {
        let ids: Vec<String> = pages
            .iter()
            .filter(|p| !p.id.is_empty())
            .map(|p| p.id.clone())
            .collect();
        index.existing_ids(&collection_id, &ids).await?
    };

    let plan = plan_ingest(pages, &existing, force, base_url);
    let mut stats = IngestStats {
        ingested: 0,
        skipped: plan.skipped,
        failed: plan.failed,
    };

    let mut embedded = Vec::with_capacity(plan.documents.len());
    for document in plan.documents {
        match index.embed(&document.text).await {
            Ok(vector) => embedded.push((document, vector)),
            Err(e) => {
                tracing::warn!(page_id = %document.id, error = %e, "Failed to embed page");
                stats.failed += 1;
            }
        }
    }
    if embedded.is_empty() {
        return Ok(stats);
    }

    match index.upsert(&collection_id, &embedded).await {
        Ok(()) => stats.ingested = embedded.len(),
        Err(e) => {
            tracing::warn!(error = %e, "Batch upsert failed, storing pages one by one");
            for item in &embedded {
                match index.upsert(&collection_id, std::slice::from_ref(item)).await {
                    Ok(()) => stats.ingested += 1,
                    Err(e) => {
                        tracing::warn!(page_id = %item.0.id, error = %e, "Failed to store page");
                        stats.failed += 1;
                    }
                }
            }
        }
    }

    tracing::info!(
        ingested = stats.ingested,
        skipped = stats.skipped,
        failed = stats.failed,
        "Ingestion finished"
    );
    Ok(stats)
}

/// Read pages from `source` and ingest them into the configured collection.
pub async fn run_ingest(
    confluence: &AtlassianConfig,
    semantic: &SemanticConfig,
    source: &IngestSource,
    force: bool,
) -> Result<IngestStats> {
    let index = ChromaSemanticIndex::new(semantic)?;
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let (pages, base_url, fetch_failures) = match source {
        IngestSource::Stubs => {
            let stubs = StubDocSource::new(
                http,
                confluence.stub_data_path.clone(),
                confluence.stub_data_url.clone(),
            );
            (stubs.all_pages().await, STUB_BASE_URL.to_string(), 0)
        }
        IngestSource::Pages(ids) => {
            let client = live_client(http, confluence)?;
            let mut pages = Vec::with_capacity(ids.len());
            let mut failures = 0;
            for id in ids {
                match client.fetch_page(id).await {
                    Ok(page) => {
                        tracing::info!(page_id = %id, title = %page.title, "Fetched page");
                        pages.push(page);
                    }
                    Err(e) => {
                        tracing::warn!(page_id = %id, error = %e, "Failed to fetch page");
                        failures += 1;
                    }
                }
            }
            (pages, client.base_url().to_string(), failures)
        }
        IngestSource::Space(key) => {
            let client = live_client(http, confluence)?;
            tracing::info!(space = %key, "Listing space pages");
            let pages = client.space_pages(key).await?;
            (pages, client.base_url().to_string(), 0)
        }
    };

    if pages.is_empty() && fetch_failures == 0 {
        return Err(AppError::Docs("No pages found to ingest".to_string()));
    }

    let mut stats = ingest_pages(&index, &pages, &base_url, force).await?;
    stats.failed += fetch_failures;
    Ok(stats)
}

fn live_client(http: reqwest::Client, config: &AtlassianConfig) -> Result<ConfluenceClient> {
    if !config.use_live_api() {
        return Err(AppError::Config(
            "Live Confluence credentials are required: set CONFLUENCE_URL, CONFLUENCE_EMAIL and CONFLUENCE_API_TOKEN".to_string(),
        ));
    }
    ConfluenceClient::new(http, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::{PageBody, Space, StorageValue};

    fn page(id: &str, title: &str, html: &str) -> DocContext {
        DocContext {
            id: id.into(),
            title: title.into(),
            space: Space {
                key: "ENG".into(),
                name: "Engineering".into(),
            },
            body: PageBody {
                storage: StorageValue { value: html.into() },
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_index_document_strips_html_and_maps_metadata() {
        let doc = index_document(
            &page("42", "Error Handling", "<h1>Rules</h1><p>Propagate with <code>?</code></p>"),
            "https://wiki.example.com",
        )
        .unwrap();

        assert_eq!(doc.id, "42");
        assert_eq!(doc.text, "Rules Propagate with ?");
        assert_eq!(
            doc.metadata,
            PageMetadata {
                page_id: "42".into(),
                title: "Error Handling".into(),
                space_key: "ENG".into(),
                space_name: "Engineering".into(),
                url: "https://wiki.example.com/pages/viewpage.action?pageId=42".into(),
            }
        );
    }

    #[test]
    fn test_empty_body_falls_back_to_title() {
        let doc = index_document(&page("7", "Release Checklist", "<p> </p>"), STUB_BASE_URL).unwrap();
        assert_eq!(doc.text, "Release Checklist");
    }

    #[test]
    fn test_page_without_id_is_not_indexable() {
        assert!(index_document(&page("", "Orphan", "<p>x</p>"), STUB_BASE_URL).is_none());
    }

    #[test]
    fn test_plan_skips_existing_pages() {
        let pages = vec![
            page("1", "One", "a"),
            page("2", "Two", "b"),
            page("", "Broken", "c"),
        ];
        let existing = HashSet::from(["1".to_string()]);

        let plan = plan_ingest(&pages, &existing, false, STUB_BASE_URL);
        let ids: Vec<&str> = plan.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.failed, 1);
    }

    #[test]
    fn test_plan_force_reingests_existing_pages() {
        let pages = vec![page("1", "One", "a"), page("2", "Two", "b")];
        let existing = HashSet::from(["1".to_string(), "2".to_string()]);

        let plan = plan_ingest(&pages, &existing, true, STUB_BASE_URL);
        assert_eq!(plan.documents.len(), 2);
        assert_eq!(plan.skipped, 0);
    }

    #[tokio::test]
    async fn test_page_ids_require_live_confluence() {
        let semantic = SemanticConfig {
            host: Some("localhost".into()),
            embedding_api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let err = run_ingest(
            &AtlassianConfig::default(),
            &semantic,
            &IngestSource::Pages(vec!["1".into()]),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
