//! Documentation access (Confluence) and semantic search over it.

pub mod confluence;
pub mod ingest;
pub mod semantic;
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AtlassianConfig;
use crate::error::Result;

pub use confluence::ConfluenceClient;
pub use semantic::{ChromaSemanticIndex, DisabledSemanticIndex, SemanticIndex};
pub use stub::{StubDocSource, STUB_BASE_URL};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const EXCERPT_CHARS: usize = 200;

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("html tag pattern is valid"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Space {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageBody {
    pub storage: StorageValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageValue {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageVersion {
    pub number: u64,
}

impl Default for PageVersion {
    fn default() -> Self {
        Self { number: 1 }
    }
}

/// How a page was located when no explicit page id was given. Serialized
/// under the reserved `_semantic_search` / `_keyword_search` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "_semantic_search")]
    Semantic(SemanticMatch),
    #[serde(rename = "_keyword_search")]
    Keyword(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub query: String,
    pub similarity_score: f64,
    pub all_results: Vec<DocHit>,
}

/// A documentation page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocContext {
    pub id: String,
    pub title: String,
    pub space: Space,
    pub body: PageBody,
    pub version: PageVersion,
    pub created: String,
    pub updated: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl DocContext {
    /// Storage-format (XHTML) body.
    pub fn storage_html(&self) -> &str {
        &self.body.storage.value
    }
}

/// A search result pointing at a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocHit {
    pub id: String,
    pub title: String,
    pub space: Space,
    pub excerpt: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

#[async_trait]
pub trait DocSource: Send + Sync {
    async fn fetch_page(&self, id: &str) -> Result<DocContext>;

    /// Keyword search. Failures are logged and produce no hits.
    async fn search_keyword(&self, query: &str, limit: usize) -> Vec<DocHit>;
}

/// Live Confluence when credentials are configured, otherwise the stub
/// dataset.
pub fn build_doc_source(config: &AtlassianConfig) -> Result<Arc<dyn DocSource>> {
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    if config.use_live_api() {
        tracing::info!("Using live Confluence API");
        Ok(Arc::new(ConfluenceClient::new(http, config)?))
    } else {
        tracing::info!("Using Confluence stub data");
        Ok(Arc::new(StubDocSource::new(
            http,
            config.stub_data_path.clone(),
            config.stub_data_url.clone(),
        )))
    }
}

/// First 200 characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Storage-format HTML reduced to whitespace-normalized text.
pub fn html_to_text(html: &str) -> String {
    let stripped = HTML_TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Browser link to a page under a Confluence base URL.
pub fn page_url(base_url: &str, id: &str) -> String {
    format!("{base_url}/pages/viewpage.action?pageId={id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<h1>Rules</h1>\n<p>Use <b>Result</b></p>"),
            "Rules Use Result"
        );
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short"), "short");
        let long = "é".repeat(250);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt(&"a".repeat(200)), "a".repeat(200));
    }

    #[test]
    fn test_doc_context_defaults_and_body() {
        let page: DocContext = serde_json::from_value(json!({
            "id": "123456",
            "title": "Coding standards",
            "body": {"storage": {"value": "<p>Use Result</p>"}}
        }))
        .unwrap();
        assert_eq!(page.storage_html(), "<p>Use Result</p>");
        assert_eq!(page.version.number, 1);
        assert!(page.provenance.is_none());
    }

    #[test]
    fn test_provenance_reserved_keys() {
        let mut page = DocContext {
            id: "1".into(),
            ..Default::default()
        };
        page.provenance = Some(Provenance::Keyword(true));
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["_keyword_search"], json!(true));

        page.provenance = Some(Provenance::Semantic(SemanticMatch {
            query: "auth".into(),
            similarity_score: 0.91,
            all_results: vec![],
        }));
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["_semantic_search"]["query"], json!("auth"));
        assert_eq!(value["_semantic_search"]["similarity_score"], json!(0.91));
        assert!(value.get("_keyword_search").is_none());

        page.provenance = None;
        let value = serde_json::to_value(&page).unwrap();
        assert!(value.get("_semantic_search").is_none());
    }
}
