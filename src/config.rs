use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::review::tag::{DEFAULT_MARKER, DEFAULT_SIGNATURE};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub jira: AtlassianConfig,
    #[serde(default)]
    pub confluence: AtlassianConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Deserialize, Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    /// Set when the token cannot submit formal reviews (GitHub Actions).
    #[serde(default)]
    pub restricted_reviews: bool,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("restricted_reviews", &self.restricted_reviews)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    #[default]
    Anthropic,
    Google,
}

impl LlmProvider {
    /// Conventional environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Google => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::Google => "gemini-1.5-flash",
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model_name())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Shared shape of the Jira and Confluence sections.
///
/// Live API mode needs both `url` and `api_token`; otherwise the source runs
/// against a stub dataset loaded from `stub_data_path` or `stub_data_url`.
#[derive(Deserialize, Clone, Default)]
pub struct AtlassianConfig {
    pub url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub stub_data_path: Option<PathBuf>,
    pub stub_data_url: Option<String>,
}

impl AtlassianConfig {
    pub fn use_live_api(&self) -> bool {
        matches!((&self.url, &self.api_token), (Some(url), Some(token)) if !url.is_empty() && !token.is_empty())
    }
}

impl std::fmt::Debug for AtlassianConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlassianConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("stub_data_path", &self.stub_data_path)
            .field("stub_data_url", &self.stub_data_url)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct SemanticConfig {
    pub host: Option<String>,
    #[serde(default = "default_chroma_port")]
    pub port: u16,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_chroma_port(),
            collection: default_collection(),
            tenant: default_tenant(),
            database: default_database(),
            embedding_model: default_embedding_model(),
            embedding_api_key: None,
        }
    }
}

impl std::fmt::Debug for SemanticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("collection", &self.collection)
            .field("tenant", &self.tenant)
            .field("database", &self.database)
            .field("embedding_model", &self.embedding_model)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
    #[serde(default = "default_max_listed_files")]
    pub max_listed_files: usize,
    #[serde(default = "default_max_annotated_files")]
    pub max_annotated_files: usize,
    #[serde(default = "default_max_annotated_lines")]
    pub max_annotated_lines: usize,
    #[serde(default = "default_query_file_names")]
    pub query_file_names: usize,
    #[serde(default = "default_search_limit")]
    pub semantic_limit: usize,
    #[serde(default = "default_search_limit")]
    pub keyword_limit: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            signature: default_signature(),
            max_diff_chars: default_max_diff_chars(),
            max_listed_files: default_max_listed_files(),
            max_annotated_files: default_max_annotated_files(),
            max_annotated_lines: default_max_annotated_lines(),
            query_file_names: default_query_file_names(),
            semantic_limit: default_search_limit(),
            keyword_limit: default_search_limit(),
            min_similarity: default_min_similarity(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_chroma_port() -> u16 {
    8000
}

fn default_collection() -> String {
    "confluence_docs".to_string()
}

fn default_tenant() -> String {
    "default_tenant".to_string()
}

fn default_database() -> String {
    "default_database".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_signature() -> String {
    DEFAULT_SIGNATURE.to_string()
}

fn default_max_diff_chars() -> usize {
    50_000
}

fn default_max_listed_files() -> usize {
    20
}

fn default_max_annotated_files() -> usize {
    5
}

fn default_max_annotated_lines() -> usize {
    180
}

fn default_query_file_names() -> usize {
    5
}

fn default_search_limit() -> usize {
    3
}

fn default_min_similarity() -> f64 {
    0.7
}

/// Conventional environment variables layered on top of the config file and
/// the `PR_SENTINEL__` prefixed variables.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("GITHUB_TOKEN", "github.token"),
    ("LLM_PROVIDER", "llm.provider"),
    ("LLM_MODEL", "llm.model"),
    ("LLM_TEMPERATURE", "llm.temperature"),
    ("JIRA_URL", "jira.url"),
    ("JIRA_EMAIL", "jira.email"),
    ("JIRA_API_TOKEN", "jira.api_token"),
    ("JIRA_STUB_DATA_PATH", "jira.stub_data_path"),
    ("JIRA_STUB_DATA_URL", "jira.stub_data_url"),
    ("CONFLUENCE_URL", "confluence.url"),
    ("CONFLUENCE_EMAIL", "confluence.email"),
    ("CONFLUENCE_API_TOKEN", "confluence.api_token"),
    ("CONFLUENCE_STUB_DATA_PATH", "confluence.stub_data_path"),
    ("CONFLUENCE_STUB_DATA_URL", "confluence.stub_data_url"),
    ("CHROMADB_HOST", "semantic.host"),
    ("CHROMADB_PORT", "semantic.port"),
    ("CHROMADB_COLLECTION", "semantic.collection"),
    ("CHROMADB_TENANT", "semantic.tenant"),
    ("CHROMADB_DATABASE", "semantic.database"),
];

/// Enum-valued keys whose conventional variables are matched in any case.
const CASE_INSENSITIVE_KEYS: &[&str] = &["llm.provider"];

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration, resolving conventional variables through `env`.
    pub fn load_with_env<F>(config_path: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("pr-sentinel").required(false));
        }

        // Environment variable overrides with PR_SENTINEL_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("PR_SENTINEL")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in ENV_OVERRIDES {
            let value = env(var).filter(|v| !v.is_empty()).map(|v| {
                if CASE_INSENSITIVE_KEYS.contains(key) {
                    v.to_lowercase()
                } else {
                    v
                }
            });
            builder = builder
                .set_override_option(*key, value)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        let bearer = env("JIRA_BEARER_TOKEN").filter(|v| !v.is_empty());
        if env("JIRA_API_TOKEN").filter(|v| !v.is_empty()).is_none() {
            builder = builder
                .set_override_option("jira.api_token", bearer)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        let in_actions = env("GITHUB_ACTIONS").map(|v| v == "true");
        if in_actions == Some(true) {
            builder = builder
                .set_override("github.restricted_reviews", true)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        let mut config: AppConfig = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = env(config.llm.provider.api_key_env()).filter(|v| !v.is_empty());
        }
        if config.semantic.embedding_api_key.is_none() {
            config.semantic.embedding_api_key = env("OPENAI_API_KEY").filter(|v| !v.is_empty());
        }

        Ok(config)
    }

    pub fn github_token(&self) -> Result<&str> {
        self.github
            .token
            .as_deref()
            .ok_or_else(|| AppError::Config("GITHUB_TOKEN environment variable is required".to_string()))
    }

    pub fn llm_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "{} environment variable is required",
                self.llm.provider.api_key_env()
            ))
        })
    }
}
