use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid PR URL format: {0}")]
    InvalidPrUrl(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("GitHub API rate limit exceeded: {0}")]
    GitHubRateLimited(String),

    #[error("GitHub authentication failed: {0}")]
    GitHubAuth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Jira error: {0}")]
    Tracker(String),

    #[error("Confluence error: {0}")]
    Docs(String),

    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("LLM API rate limited: {0}")]
    LlmRateLimited(String),

    #[error("Invalid review decision: {0}. Must be APPROVE, REQUEST_CHANGES, or COMMENT")]
    InvalidDecision(String),

    #[error("Code review failed: {0}")]
    ReviewFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::GitHubApi(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
