//! Plumbing shared by the Jira and Confluence clients: credentials and the
//! offline datasets used when no live credentials are configured.

use std::path::Path;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::AtlassianConfig;
use crate::error::{AppError, Result};

/// Atlassian Cloud API tokens pair with the account email; a token on its
/// own is treated as a personal access token.
#[derive(Clone)]
pub enum AtlassianAuth {
    Basic { email: String, token: String },
    Bearer(String),
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for AtlassianAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtlassianAuth::Basic { email, .. } => f
                .debug_struct("Basic")
                .field("email", email)
                .field("token", &"[REDACTED]")
                .finish(),
            AtlassianAuth::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

impl AtlassianAuth {
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AtlassianAuth::Basic { email, token } => request.basic_auth(email, Some(token)),
            AtlassianAuth::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// Base URL (without trailing slash) and credentials for a live API.
pub fn live_endpoint(config: &AtlassianConfig, service: &str) -> Result<(String, AtlassianAuth)> {
    let base_url = config
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Config(format!("{service} URL is required for live API mode")))?;
    let token = config
        .api_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Config(format!("{service} API token is required for live API mode")))?;

    let auth = match config.email.clone().filter(|e| !e.is_empty()) {
        Some(email) => AtlassianAuth::Basic { email, token },
        None => AtlassianAuth::Bearer(token),
    };
    Ok((base_url.trim_end_matches('/').to_string(), auth))
}

/// Load a JSON dataset from `path`, else from `url`, else `T::default()`.
///
/// Read or parse failures are logged and fall through to the next source.
pub async fn load_dataset<T>(client: &Client, path: Option<&Path>, url: Option<&str>) -> T
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = path {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => {
                    tracing::info!(path = %path.display(), "Loaded stub data from file");
                    return data;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid stub data file")
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read stub data file")
            }
        }
    }

    if let Some(url) = url {
        match fetch_remote(client, url).await {
            Ok(data) => {
                tracing::info!(url, "Loaded stub data from URL");
                return data;
            }
            Err(e) => tracing::warn!(url, error = %e, "Failed to load stub data from URL"),
        }
    }

    T::default()
}

async fn fetch_remote<T: DeserializeOwned>(client: &Client, url: &str) -> reqwest::Result<T> {
    client.get(url).send().await?.error_for_status()?.json().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[derive(Debug, Default, serde::Deserialize)]
    struct Dataset {
        #[serde(default)]
        items: HashMap<String, String>,
    }

    #[test]
    fn test_live_endpoint_auth_selection() {
        let config = AtlassianConfig {
            url: Some("https://acme.atlassian.net/".into()),
            email: Some("bot@example.com".into()),
            api_token: Some("t".into()),
            ..Default::default()
        };
        let (url, auth) = live_endpoint(&config, "Jira").unwrap();
        assert_eq!(url, "https://acme.atlassian.net");
        assert!(matches!(auth, AtlassianAuth::Basic { .. }));

        let config = AtlassianConfig {
            email: None,
            ..config
        };
        let (_, auth) = live_endpoint(&config, "Jira").unwrap();
        assert!(matches!(auth, AtlassianAuth::Bearer(_)));
    }

    #[test]
    fn test_live_endpoint_requires_url_and_token() {
        assert!(matches!(
            live_endpoint(&AtlassianConfig::default(), "Confluence"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_auth_debug_redacts_token() {
        let basic = AtlassianAuth::Basic {
            email: "bot@example.com".into(),
            token: "atl-secret".into(),
        };
        let rendered = format!("{basic:?}");
        assert!(rendered.contains("bot@example.com"));
        assert!(!rendered.contains("atl-secret"));

        let bearer = format!("{:?}", AtlassianAuth::Bearer("pat-secret".into()));
        assert!(!bearer.contains("pat-secret"));
        assert!(bearer.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items": {{"a": "b"}}}}"#).unwrap();

        let data: Dataset = load_dataset(&Client::new(), Some(file.path()), None).await;
        assert_eq!(data.items.get("a").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_invalid_file_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let data: Dataset = load_dataset(&Client::new(), Some(file.path()), None).await;
        assert!(data.items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sources_yield_default() {
        let data: Dataset =
            load_dataset(&Client::new(), Some(Path::new("/nonexistent/stub.json")), None).await;
        assert!(data.items.is_empty());
    }
}
