//! Semantic search over ingested documentation pages.
//!
//! Pages are stored in a Chroma collection (v2 HTTP API) as plain text with
//! `page_id`, `title`, `space_key`, `space_name` and `url` metadata. Documents
//! and queries are embedded with the OpenAI embeddings API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SemanticConfig;
use crate::error::{AppError, Result};

use super::{excerpt, page_url, DocHit, Space, STUB_BASE_URL};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Up to `limit` pages scoring at least `min_similarity`. Never fails;
    /// an unavailable index yields no hits.
    async fn search(&self, query: &str, limit: usize, min_similarity: f64) -> Vec<DocHit>;
}

/// Index used when no vector store is configured.
pub struct DisabledSemanticIndex;

#[async_trait]
impl SemanticIndex for DisabledSemanticIndex {
    async fn search(&self, _query: &str, _limit: usize, _min_similarity: f64) -> Vec<DocHit> {
        Vec::new()
    }
}

/// Map a vector distance to a similarity in `(0, 1]`, rounded to three
/// decimals.
pub fn similarity_from_distance(distance: f64) -> f64 {
    let similarity = if distance > 0.0 {
        1.0 / (1.0 + distance)
    } else {
        1.0
    };
    (similarity * 1000.0).round() / 1000.0
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Collection {
    id: String,
}

/// Chroma's query response holds one inner list per query embedding.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    documents: Vec<Vec<Option<String>>>,
    metadatas: Vec<Vec<Option<Value>>>,
    distances: Vec<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetResponse {
    ids: Vec<String>,
}

/// Metadata stored next to every ingested page; search hits are rebuilt from
/// these keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetadata {
    pub page_id: String,
    pub title: String,
    pub space_key: String,
    pub space_name: String,
    pub url: String,
}

/// A page ready to be embedded and stored under `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub metadata: PageMetadata,
}

pub struct ChromaSemanticIndex {
    http: Client,
    /// `.../api/v2/tenants/{tenant}/databases/{database}/collections`
    collections_url: String,
    collection: String,
    embedding_model: String,
    embedding_api_key: String,
}

impl ChromaSemanticIndex {
    pub fn new(config: &SemanticConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::Config("CHROMADB_HOST is not set".to_string()))?;
        let embedding_api_key = config
            .embedding_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Config("OPENAI_API_KEY is required for semantic search".to_string())
            })?;

        Ok(Self {
            http: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            collections_url: collections_url(host, config),
            collection: config.collection.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_api_key,
        })
    }

    pub(super) async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.embedding_api_key)
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Docs(format!("Embeddings API returned {status}: {body}")));
        }

        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Docs("Embeddings API returned no vectors".to_string()))
    }

    /// Id of the configured collection. With `create`, the collection is
    /// created when missing.
    pub(super) async fn collection_id(&self, create: bool) -> Result<String> {
        let request = if create {
            self.http.post(&self.collections_url).json(&json!({
                "name": self.collection,
                "get_or_create": true,
            }))
        } else {
            self.http
                .get(format!("{}/{}", self.collections_url, self.collection))
        };

        let collection: Collection = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(collection.id)
    }

    /// Which of `ids` are already stored.
    pub(super) async fn existing_ids(
        &self,
        collection_id: &str,
        ids: &[String],
    ) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let response: GetResponse = self
            .http
            .post(format!("{}/{collection_id}/get", self.collections_url))
            .json(&json!({ "ids": ids, "include": ["metadatas"] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.ids.into_iter().collect())
    }

    /// Insert or replace documents together with their embeddings.
    pub(super) async fn upsert(
        &self,
        collection_id: &str,
        documents: &[(IndexDocument, Vec<f32>)],
    ) -> Result<()> {
        let (ids, texts, metadatas, embeddings) = documents.iter().fold(
            (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
            |(mut ids, mut texts, mut metas, mut vectors), (doc, vector)| {
                ids.push(doc.id.as_str());
                texts.push(doc.text.as_str());
                metas.push(&doc.metadata);
                vectors.push(vector);
                (ids, texts, metas, vectors)
            },
        );

        self.http
            .post(format!("{}/{collection_id}/upsert", self.collections_url))
            .json(&json!({
                "ids": ids,
                "documents": texts,
                "metadatas": metadatas,
                "embeddings": embeddings,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn query(&self, query: &str, limit: usize) -> Result<QueryResponse> {
        let embedding = self.embed(query).await?;
        let collection_id = self.collection_id(false).await?;

        let response = self
            .http
            .post(format!("{}/{collection_id}/query", self.collections_url))
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": limit,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response)
    }
}

/// Chroma v2 collections endpoint. Hosts without a scheme are reached over
/// plain HTTP.
fn collections_url(host: &str, config: &SemanticConfig) -> String {
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), config.port)
    } else {
        format!("http://{host}:{}", config.port)
    };
    format!(
        "{base}/api/v2/tenants/{}/databases/{}/collections",
        config.tenant, config.database
    )
}

fn hits_from_response(response: QueryResponse, min_similarity: f64) -> Vec<DocHit> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response.documents.into_iter().next().unwrap_or_default();
    let metadatas = response.metadatas.into_iter().next().unwrap_or_default();
    let distances = response.distances.into_iter().next().unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .filter_map(|(i, chroma_id)| {
            let similarity = similarity_from_distance(*distances.get(i)?);
            if similarity < min_similarity {
                return None;
            }

            let content = documents.get(i).cloned().flatten().unwrap_or_default();
            let meta = metadatas.get(i).cloned().flatten().unwrap_or(Value::Null);
            let field = |key: &str| meta[key].as_str().filter(|v| !v.is_empty());

            let id = field("page_id").unwrap_or(&chroma_id).to_string();
            let space_key = field("space_key").unwrap_or_default().to_string();
            let title = field("title")
                .map(str::to_string)
                .unwrap_or_else(|| content.chars().take(100).collect());

            Some(DocHit {
                title,
                space: Space {
                    name: field("space_name").unwrap_or(&space_key).to_string(),
                    key: space_key,
                },
                excerpt: excerpt(&content),
                url: field("url")
                    .map(str::to_string)
                    .unwrap_or_else(|| page_url(STUB_BASE_URL, &id)),
                similarity_score: Some(similarity),
                id,
            })
        })
        .collect()
}

#[async_trait]
impl SemanticIndex for ChromaSemanticIndex {
    async fn search(&self, query: &str, limit: usize, min_similarity: f64) -> Vec<DocHit> {
        match self.query(query, limit).await {
            Ok(response) => {
                let hits = hits_from_response(response, min_similarity);
                tracing::debug!(hits = hits.len(), "Semantic search completed");
                hits
            }
            Err(e) => {
                tracing::warn!(error = %e, "Semantic search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_similarity_from_distance() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(-0.5), 1.0);
        assert_eq!(similarity_from_distance(1.0), 0.5);
        assert_eq!(similarity_from_distance(0.3), 0.769);
    }

    #[test]
    fn test_hits_filtered_by_threshold() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["Use typed errors everywhere", "Old notes"]],
            "metadatas": [[
                {"page_id": "123", "title": "Errors", "space_key": "ENG", "space_name": "Engineering", "url": ""},
                {"page_id": "456", "title": "Notes"}
            ]],
            "distances": [[0.2, 2.0]]
        }))
        .unwrap();

        let hits = hits_from_response(response, 0.7);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "123");
        assert_eq!(hits[0].title, "Errors");
        assert_eq!(hits[0].space.name, "Engineering");
        assert_eq!(hits[0].similarity_score, Some(0.833));
        assert!(hits[0].url.ends_with("pageId=123"));
    }

    #[test]
    fn test_missing_metadata_uses_document() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["chroma-1"]],
            "documents": [["Body text"]],
            "metadatas": [[null]],
            "distances": [[0.0]]
        }))
        .unwrap();

        let hits = hits_from_response(response, 0.7);
        assert_eq!(hits[0].id, "chroma-1");
        assert_eq!(hits[0].title, "Body text");
        assert_eq!(hits[0].space.key, "");
    }

    #[tokio::test]
    async fn test_disabled_index_is_empty() {
        assert!(DisabledSemanticIndex.search("q", 3, 0.7).await.is_empty());
    }

    #[test]
    fn test_collections_url_uses_v2_routes() {
        let config = SemanticConfig {
            tenant: "acme".into(),
            ..Default::default()
        };
        assert_eq!(
            collections_url("chroma.internal", &config),
            "http://chroma.internal:8000/api/v2/tenants/acme/databases/default_database/collections"
        );
        assert_eq!(
            collections_url("https://chroma.example.com/", &config),
            "https://chroma.example.com:8000/api/v2/tenants/acme/databases/default_database/collections"
        );
    }

    #[test]
    fn test_metadata_serializes_query_keys() {
        let meta = PageMetadata {
            page_id: "42".into(),
            title: "Errors".into(),
            space_key: "ENG".into(),
            space_name: "Engineering".into(),
            url: "https://wiki/x".into(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        for key in ["page_id", "title", "space_key", "space_name", "url"] {
            assert!(value[key].is_string(), "missing {key}");
        }
    }

    #[test]
    fn test_new_requires_host() {
        let config = SemanticConfig::default();
        assert!(ChromaSemanticIndex::new(&config).is_err());
    }
}
