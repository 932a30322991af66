//! Jira REST client.
//!
//! Implements [`TicketClient`] over the Jira REST API v2:
//! `GET /rest/api/2/issue/{key}` and `GET /rest/api/2/issue/{key}/comment`.
//! Credentials are read from environment variables (`JIRA_USERNAME`,
//! `JIRA_API_TOKEN`) and sent as basic auth.
//!
//! Response parsing is tolerant of missing optional fields, with the same
//! fallbacks the mined records are expected to carry: priority `"None"`,
//! assignee `"Unassigned"`, reporter `"Unknown"`. A 404 maps to
//! [`MinerError::NotFound`]; a 429 maps to [`MinerError::RateLimited`] so
//! the rate governor can retry it.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::MinerError;
use crate::models::{LinkedIssue, RawComment, RawTicket};
use crate::traits::TicketClient;

/// HTTP timeout for Jira API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl JiraClient {
    /// Build a client for the given Jira base URL with credentials from
    /// `JIRA_USERNAME` / `JIRA_API_TOKEN`.
    pub fn from_env(base_url: &str) -> Result<Self, MinerError> {
        let username = std::env::var("JIRA_USERNAME")
            .map_err(|_| MinerError::Config("JIRA_USERNAME environment variable not set".into()))?;
        let api_token = std::env::var("JIRA_API_TOKEN").map_err(|_| {
            MinerError::Config("JIRA_API_TOKEN environment variable not set".into())
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_token,
        })
    }

    async fn get_json(&self, url: &str, id: &str) -> Result<Value, MinerError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(MinerError::NotFound { id: id.to_string() });
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok());
            let message = response.text().await.unwrap_or_default();
            return Err(MinerError::RateLimited {
                status: 429,
                retry_after,
                message,
            });
        }

        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TicketClient for JiraClient {
    async fn fetch_ticket(&self, id: &str) -> Result<RawTicket, MinerError> {
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, id);
        let value = self.get_json(&url, id).await?;
        parse_issue(&value)
    }

    async fn fetch_comments(&self, id: &str) -> Result<Vec<RawComment>, MinerError> {
        let url = format!("{}/rest/api/2/issue/{}/comment", self.base_url, id);
        let value = self.get_json(&url, id).await?;
        Ok(parse_comments(&value))
    }
}

/// Extract [`RawTicket`] fields from a Jira issue response.
pub(crate) fn parse_issue(value: &Value) -> Result<RawTicket, MinerError> {
    let key = value
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| MinerError::Malformed("issue response missing 'key'".into()))?;
    let fields = value
        .get("fields")
        .ok_or_else(|| MinerError::Malformed("issue response missing 'fields'".into()))?;

    let text = |name: &str| -> String {
        fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let named = |name: &str, fallback: &str| -> String {
        fields
            .get(name)
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    let person = |name: &str, fallback: &str| -> String {
        fields
            .get(name)
            .and_then(|v| v.get("displayName"))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };

    let labels = fields
        .get("labels")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut links = Vec::new();
    if let Some(issue_links) = fields.get("issuelinks").and_then(Value::as_array) {
        for link in issue_links {
            let link_type = link
                .get("type")
                .and_then(|t| t.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            for side in ["outwardIssue", "inwardIssue"] {
                if let Some(linked_key) = link
                    .get(side)
                    .and_then(|i| i.get("key"))
                    .and_then(Value::as_str)
                {
                    links.push(LinkedIssue {
                        key: linked_key.to_string(),
                        link_type: link_type.clone(),
                    });
                }
            }
        }
    }

    Ok(RawTicket {
        key: key.to_string(),
        summary: text("summary"),
        description: text("description"),
        status: named("status", "Unknown"),
        priority: named("priority", "None"),
        assignee: person("assignee", "Unassigned"),
        reporter: person("reporter", "Unknown"),
        labels,
        created: text("created"),
        updated: text("updated"),
        links,
    })
}

/// Extract comments from a Jira comment-list response, in source order.
/// Authors come back as objects with a `displayName`; bare strings are
/// accepted too.
pub(crate) fn parse_comments(value: &Value) -> Vec<RawComment> {
    let Some(comments) = value.get("comments").and_then(Value::as_array) else {
        return Vec::new();
    };

    comments
        .iter()
        .map(|c| {
            let author = match c.get("author") {
                Some(Value::String(s)) => s.clone(),
                Some(obj) => obj
                    .get("displayName")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                None => "Unknown".to_string(),
            };
            RawComment {
                author,
                body: c.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
                created: c
                    .get("created")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect()
}
