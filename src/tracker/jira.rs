use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::atlassian::{live_endpoint, AtlassianAuth};
use crate::config::AtlassianConfig;
use crate::error::{AppError, Result};

use super::{Assignee, TicketContext, TicketSource};

/// Jira REST v2 client.
pub struct JiraClient {
    http: Client,
    base_url: String,
    auth: AtlassianAuth,
}

impl JiraClient {
    pub fn new(http: Client, config: &AtlassianConfig) -> Result<Self> {
        let (base_url, auth) = live_endpoint(config, "Jira")?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }
}

#[async_trait]
impl TicketSource for JiraClient {
    async fn fetch_ticket(&self, key: &str) -> Result<TicketContext> {
        let url = format!(
            "{}/rest/api/2/issue/{}",
            self.base_url,
            urlencoding::encode(key)
        );

        let response = self
            .auth
            .apply(self.http.get(&url).header("accept", "application/json"))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Jira issue {key}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Tracker(format!("API returned {status}: {body}")));
        }

        let issue: Value = response.json().await?;
        tracing::debug!(key, "Fetched Jira issue");
        Ok(map_issue(&issue))
    }
}

fn text(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

fn map_issue(issue: &Value) -> TicketContext {
    let fields = &issue["fields"];
    let description = text(fields, "/description").unwrap_or_default();

    let assignee = fields["assignee"].is_object().then(|| Assignee {
        display_name: text(fields, "/assignee/displayName").unwrap_or_default(),
        email_address: text(fields, "/assignee/emailAddress").unwrap_or_default(),
    });

    TicketContext {
        id: text(issue, "/id").unwrap_or_default(),
        key: text(issue, "/key").unwrap_or_default(),
        summary: text(fields, "/summary").unwrap_or_default(),
        acceptance_criteria: parse_acceptance_criteria(&description),
        description,
        status: text(fields, "/status/name").unwrap_or_default(),
        assignee,
        labels: fields["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        issue_type: text(fields, "/issuetype/name").unwrap_or_default(),
        priority: text(fields, "/priority/name").unwrap_or_else(|| "Unknown".to_string()),
        created: text(fields, "/created").unwrap_or_default(),
        updated: text(fields, "/updated").unwrap_or_default(),
    }
}

/// Collect the lines following an `Acceptance Criteria` or `AC:` heading.
///
/// Bullet markers are stripped, blank lines and `#` headings skipped.
pub fn parse_acceptance_criteria(description: &str) -> Vec<String> {
    let is_heading = |line: &str| line.contains("Acceptance Criteria") || line.contains("AC:");

    let mut criteria = Vec::new();
    let mut in_section = false;
    for line in description.lines() {
        if is_heading(line) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.starts_with('-') || trimmed.starts_with('*') {
            criteria.push(trimmed.trim_start_matches(['-', '*', ' ']).to_string());
        } else {
            criteria.push(trimmed.to_string());
        }
    }
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_acceptance_criteria_bullets() {
        let description = "Some intro\n\nAcceptance Criteria:\n- Users can log in\n* Tokens expire\n\n# Notes\nplain line";
        assert_eq!(
            parse_acceptance_criteria(description),
            vec!["Users can log in", "Tokens expire", "plain line"]
        );
    }

    #[test]
    fn test_parse_acceptance_criteria_short_heading() {
        let description = "AC:\n  - one\n  - two";
        assert_eq!(parse_acceptance_criteria(description), vec!["one", "two"]);
    }

    #[test]
    fn test_parse_acceptance_criteria_absent() {
        assert!(parse_acceptance_criteria("Just a description").is_empty());
        assert!(parse_acceptance_criteria("").is_empty());
    }

    #[test]
    fn test_map_issue() {
        let issue = json!({
            "id": "10001",
            "key": "PROJ-123",
            "fields": {
                "summary": "Add login",
                "description": "Acceptance Criteria:\n- login works",
                "status": {"name": "In Progress"},
                "assignee": {"displayName": "Ada", "emailAddress": "ada@example.com"},
                "labels": ["auth"],
                "issuetype": {"name": "Story"},
                "priority": null,
                "created": "2024-01-01",
                "updated": "2024-01-02"
            }
        });

        let ticket = map_issue(&issue);
        assert_eq!(ticket.key, "PROJ-123");
        assert_eq!(ticket.status, "In Progress");
        assert_eq!(ticket.assignee.unwrap().display_name, "Ada");
        assert_eq!(ticket.acceptance_criteria, vec!["login works"]);
        assert_eq!(ticket.issue_type, "Story");
        assert_eq!(ticket.priority, "Unknown");
    }
}
