use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::atlassian::load_dataset;
use crate::error::Result;

use super::{excerpt, page_url, DocContext, DocHit, DocSource, Space};

/// Base used for links to stub pages.
pub const STUB_BASE_URL: &str = "https://confluence.example.com";

#[derive(Debug, Default, Deserialize)]
struct PageDataset {
    /// Ordered by id so search results are stable.
    #[serde(default)]
    pages: BTreeMap<String, DocContext>,
}

/// Documentation source backed by a JSON dataset (`{"pages": {"123": {...}}}`).
pub struct StubDocSource {
    http: Client,
    path: Option<PathBuf>,
    url: Option<String>,
    data: OnceCell<PageDataset>,
}

impl StubDocSource {
    pub fn new(http: Client, path: Option<PathBuf>, url: Option<String>) -> Self {
        Self {
            http,
            path,
            url,
            data: OnceCell::new(),
        }
    }

    /// Every page in the dataset, in id order. Records without an `id` take
    /// their dataset key.
    pub async fn all_pages(&self) -> Vec<DocContext> {
        self.dataset()
            .await
            .pages
            .iter()
            .map(|(id, page)| {
                let mut page = page.clone();
                if page.id.is_empty() {
                    page.id = id.clone();
                }
                page
            })
            .collect()
    }

    async fn dataset(&self) -> &PageDataset {
        self.data
            .get_or_init(|| load_dataset(&self.http, self.path.as_deref(), self.url.as_deref()))
            .await
    }
}

fn placeholder(id: &str) -> DocContext {
    DocContext {
        id: id.to_string(),
        title: format!("Page {id} (not found in stub data)"),
        space: Space {
            key: "UNKNOWN".to_string(),
            name: "Unknown".to_string(),
        },
        ..Default::default()
    }
}

#[async_trait]
impl DocSource for StubDocSource {
    async fn fetch_page(&self, id: &str) -> Result<DocContext> {
        match self.dataset().await.pages.get(id) {
            Some(page) => Ok(page.clone()),
            None => {
                tracing::debug!(page_id = id, "Page not in stub data");
                Ok(placeholder(id))
            }
        }
    }

    /// Case-insensitive substring match on title or body.
    async fn search_keyword(&self, query: &str, limit: usize) -> Vec<DocHit> {
        let needle = query.to_lowercase();
        self.dataset()
            .await
            .pages
            .iter()
            .filter(|(_, page)| {
                page.title.to_lowercase().contains(&needle)
                    || page.storage_html().to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|(id, page)| DocHit {
                id: id.clone(),
                title: page.title.clone(),
                space: page.space.clone(),
                excerpt: excerpt(page.storage_html()),
                url: page_url(STUB_BASE_URL, id),
                similarity_score: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_with(json: &str) -> (StubDocSource, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        let source = StubDocSource::new(Client::new(), Some(file.path().to_path_buf()), None);
        (source, file)
    }

    const PAGES: &str = r#"{"pages": {
        "100": {"id": "100", "title": "Error Handling Guide", "space": {"key": "ENG", "name": "Engineering"},
                "body": {"storage": {"value": "<p>Always propagate errors</p>"}}},
        "200": {"id": "200", "title": "Deploy", "body": {"storage": {"value": "<p>Error budgets</p>"}}},
        "300": {"id": "300", "title": "Unrelated", "body": {"storage": {"value": "nothing"}}}
    }}"#;

    #[tokio::test]
    async fn test_fetch_known_and_unknown_page() {
        let (source, _file) = source_with(PAGES);
        let page = source.fetch_page("100").await.unwrap();
        assert_eq!(page.title, "Error Handling Guide");

        let missing = source.fetch_page("999").await.unwrap();
        assert_eq!(missing.title, "Page 999 (not found in stub data)");
        assert_eq!(missing.space.key, "UNKNOWN");
    }

    #[tokio::test]
    async fn test_keyword_search_matches_title_and_body() {
        let (source, _file) = source_with(PAGES);
        let hits = source.search_keyword("ERROR", 10).await;
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200"]);
        assert!(hits[0].url.ends_with("pageId=100"));

        let limited = source.search_keyword("error", 1).await;
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_all_pages_fill_missing_ids() {
        let (source, _file) = source_with(
            r#"{"pages": {"9": {"title": "No id"}, "10": {"id": "10", "title": "Has id"}}}"#,
        );
        let pages = source.all_pages().await;
        let ids: Vec<&str> = pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "9"]);
    }
}
