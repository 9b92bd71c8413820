//! Ticket tracker access (Jira).

pub mod jira;
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AtlassianConfig;
use crate::error::Result;

pub use jira::JiraClient;
pub use stub::StubTicketSource;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Ticket fields used to steer the review. Missing keys deserialize to
/// defaults so partial stub records are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketContext {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub assignee: Option<Assignee>,
    pub acceptance_criteria: Vec<String>,
    pub labels: Vec<String>,
    pub issue_type: String,
    pub priority: String,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assignee {
    pub display_name: String,
    pub email_address: String,
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch_ticket(&self, key: &str) -> Result<TicketContext>;
}

/// Live Jira when credentials are configured, otherwise the stub dataset.
pub fn build_ticket_source(config: &AtlassianConfig) -> Result<Arc<dyn TicketSource>> {
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    if config.use_live_api() {
        tracing::info!("Using live Jira API");
        Ok(Arc::new(JiraClient::new(http, config)?))
    } else {
        tracing::info!("Using Jira stub data");
        Ok(Arc::new(StubTicketSource::new(
            http,
            config.stub_data_path.clone(),
            config.stub_data_url.clone(),
        )))
    }
}
