use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::atlassian::{live_endpoint, AtlassianAuth};
use crate::config::AtlassianConfig;
use crate::error::{AppError, Result};

use super::{
    excerpt, page_url, DocContext, DocHit, DocSource, PageBody, PageVersion, Space, StorageValue,
};

const PAGE_EXPAND: &str = "body.storage,version,space,history";
const SPACE_PAGE_BATCH: usize = 50;
/// Upper bound on pages read from one space.
const MAX_SPACE_PAGES: usize = 5_000;

/// Confluence REST client.
pub struct ConfluenceClient {
    http: Client,
    base_url: String,
    auth: AtlassianAuth,
}

impl ConfluenceClient {
    pub fn new(http: Client, config: &AtlassianConfig) -> Result<Self> {
        let (base_url, auth) = live_endpoint(config, "Confluence")?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .auth
            .apply(self.http.get(url).query(query))
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Confluence resource {url}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Docs(format!("API returned {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every page of a space, with bodies, read in batches.
    pub async fn space_pages(&self, space_key: &str) -> Result<Vec<DocContext>> {
        let url = format!("{}/rest/api/content", self.base_url);
        let limit = SPACE_PAGE_BATCH.to_string();
        let mut pages = Vec::new();

        while pages.len() < MAX_SPACE_PAGES {
            let start = pages.len().to_string();
            let batch = self
                .get(
                    &url,
                    &[
                        ("spaceKey", space_key),
                        ("type", "page"),
                        ("expand", PAGE_EXPAND),
                        ("limit", limit.as_str()),
                        ("start", start.as_str()),
                    ],
                )
                .await?;

            let results = batch["results"].as_array().cloned().unwrap_or_default();
            let count = results.len();
            pages.extend(results.iter().map(|page| map_page(page, "")));
            tracing::debug!(space = space_key, fetched = pages.len(), "Listed space pages");
            if count < SPACE_PAGE_BATCH {
                break;
            }
        }
        Ok(pages)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DocHit>> {
        let cql = cql_for(query);
        let limit = limit.to_string();
        let url = format!("{}/rest/api/search", self.base_url);
        let results = self
            .get(
                &url,
                &[
                    ("cql", cql.as_str()),
                    ("limit", limit.as_str()),
                    ("expand", "content.space"),
                ],
            )
            .await?;

        Ok(results["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| map_search_result(item, &self.base_url))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Text or title match. Quotes in the query are escaped.
fn cql_for(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"text ~ "{escaped}" OR title ~ "{escaped}""#)
}

fn text(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn map_page(page: &Value, requested_id: &str) -> DocContext {
    let id = match text(page, "/id") {
        id if id.is_empty() => requested_id.to_string(),
        id => id,
    };

    DocContext {
        id,
        title: text(page, "/title"),
        space: Space {
            key: text(page, "/space/key"),
            name: text(page, "/space/name"),
        },
        body: PageBody {
            storage: StorageValue {
                value: text(page, "/body/storage/value"),
            },
        },
        version: PageVersion {
            number: page
                .pointer("/version/number")
                .and_then(Value::as_u64)
                .unwrap_or(1),
        },
        created: text(page, "/history/createdDate"),
        updated: text(page, "/version/when"),
        provenance: None,
    }
}

fn map_search_result(item: &Value, base_url: &str) -> DocHit {
    let id = text(item, "/content/id");
    DocHit {
        url: page_url(base_url, &id),
        title: text(item, "/content/title"),
        space: Space {
            key: text(item, "/content/space/key"),
            name: text(item, "/content/space/name"),
        },
        excerpt: excerpt(&text(item, "/excerpt")),
        similarity_score: None,
        id,
    }
}

#[async_trait]
impl DocSource for ConfluenceClient {
    async fn fetch_page(&self, id: &str) -> Result<DocContext> {
        let url = format!(
            "{}/rest/api/content/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let page = self.get(&url, &[("expand", PAGE_EXPAND)]).await?;
        tracing::debug!(page_id = id, "Fetched Confluence page");
        Ok(map_page(&page, id))
    }

    async fn search_keyword(&self, query: &str, limit: usize) -> Vec<DocHit> {
        match self.search(query, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Confluence search failed");
                Vec::new()
            }
        }
    }
}
