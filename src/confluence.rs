//! Confluence page extractor.
//!
//! Implements [`DocumentExtractor`] over the Confluence REST API. Resolves
//! a page from either URL shape — `/wiki/spaces/{space}/pages/{id}[/title]`
//! or `/display/{space}/{title}` — fetches its storage body with version,
//! history, and label expansions, converts the storage HTML to plain text,
//! and lists attachments in memory-governed chunks.
//!
//! All local failures (unrecognized URL, missing page, unexpected response
//! shape) return `Ok(None)`: the reference is kept without enrichment and
//! the resolution continues. A 429 escalates as
//! [`MinerError::RateLimited`] for the rate governor to retry.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::classifier::UrlMatch;
use crate::error::MinerError;
use crate::extract::html_to_text;
use crate::memory::MemoryGovernor;
use crate::models::DocumentContent;
use crate::traits::DocumentExtractor;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const PAGE_EXPAND: &str = "body.storage,version,history,space,metadata.labels";
const ATTACHMENT_LIMIT: usize = 200;

/// How a page is addressed by a URL.
#[derive(Debug, PartialEq, Eq)]
enum PageLocator {
    Id(String),
    SpaceTitle { space: String, title: String },
}

pub struct ConfluenceExtractor {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
    memory: Arc<MemoryGovernor>,
}

impl ConfluenceExtractor {
    /// Build an extractor for the given Confluence base URL with
    /// credentials from `CONFLUENCE_USERNAME` / `CONFLUENCE_API_TOKEN`.
    pub fn from_env(base_url: &str, memory: Arc<MemoryGovernor>) -> Result<Self, MinerError> {
        let username = std::env::var("CONFLUENCE_USERNAME").map_err(|_| {
            MinerError::Config("CONFLUENCE_USERNAME environment variable not set".into())
        })?;
        let api_token = std::env::var("CONFLUENCE_API_TOKEN").map_err(|_| {
            MinerError::Config("CONFLUENCE_API_TOKEN environment variable not set".into())
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_token,
            memory,
        })
    }

    /// GET a JSON resource. 404 and transport failures are local (`None`);
    /// 429 escalates for the governor.
    async fn get_json(&self, url: &str) -> Result<Option<Value>, MinerError> {
        let response = match self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Warning: confluence request failed: {e}");
                return Ok(None);
            }
        };

        let status = response.status();
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
        if !status.is_success() {
            return Ok(None);
        }

        match response.json().await {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                eprintln!("Warning: confluence response was not JSON: {e}");
                Ok(None)
            }
        }
    }

    async fn fetch_page(&self, locator: &PageLocator) -> Result<Option<Value>, MinerError> {
        match locator {
            PageLocator::Id(id) => {
                let url = format!(
                    "{}/rest/api/content/{}?expand={}",
                    self.base_url, id, PAGE_EXPAND
                );
                self.get_json(&url).await
            }
            PageLocator::SpaceTitle { space, title } => {
                let url = format!(
                    "{}/rest/api/content?spaceKey={}&title={}&expand={}",
                    self.base_url,
                    space,
                    urlencode(title),
                    PAGE_EXPAND
                );
                let Some(listing) = self.get_json(&url).await? else {
                    return Ok(None);
                };
                Ok(listing
                    .get("results")
                    .and_then(Value::as_array)
                    .and_then(|r| r.first())
                    .cloned())
            }
        }
    }

    /// List a page's attachments, processed `chunk_size` at a time with a
    /// memory check before each chunk.
    async fn fetch_attachments(&self, page_id: &str) -> Result<Vec<Value>, MinerError> {
        let url = format!(
            "{}/rest/api/content/{}/child/attachment?limit={}",
            self.base_url, page_id, ATTACHMENT_LIMIT
        );
        let Some(listing) = self.get_json(&url).await? else {
            return Ok(Vec::new());
        };
        let results = listing
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut attachments = Vec::with_capacity(results.len());
        for chunk in results.chunks(self.memory.chunk_size().max(1)) {
            self.memory.check_memory()?;
            for raw in chunk {
                attachments.push(attachment_summary(raw));
            }
        }
        Ok(attachments)
    }
}

#[async_trait]
impl DocumentExtractor for ConfluenceExtractor {
    async fn fetch_document(
        &self,
        reference: &UrlMatch,
    ) -> Result<Option<DocumentContent>, MinerError> {
        let Some(locator) = locate(&reference.url) else {
            eprintln!(
                "Warning: not a recognizable confluence page URL: {}",
                reference.url
            );
            return Ok(None);
        };

        let Some(page) = self.fetch_page(&locator).await? else {
            return Ok(None);
        };

        let Some(page_id) = page.get("id").and_then(Value::as_str) else {
            return Ok(None);
        };

        let attachments = match self.fetch_attachments(page_id).await {
            Ok(a) => a,
            // Governor signals escalate; anything else is a local failure.
            Err(e @ MinerError::MemoryLimitExceeded { .. })
            | Err(e @ MinerError::RateLimited { .. }) => return Err(e),
            Err(e) => {
                eprintln!("Warning: attachment listing failed for {page_id}: {e}");
                Vec::new()
            }
        };

        Ok(Some(page_to_document(&page, &reference.url, attachments)))
    }
}

/// Parse a page locator out of a URL. Returns `None` for URLs that do not
/// address a page.
fn locate(url_str: &str) -> Option<PageLocator> {
    let parsed = Url::parse(url_str).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.iter().position(|s| *s == "pages") {
        if let Some(id) = segments.get(pos + 1) {
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
                return Some(PageLocator::Id(id.to_string()));
            }
        }
    }

    if let Some(pos) = segments.iter().position(|s| *s == "display") {
        if let (Some(space), Some(title)) = (segments.get(pos + 1), segments.get(pos + 2)) {
            return Some(PageLocator::SpaceTitle {
                space: space.to_string(),
                title: title.replace('+', " "),
            });
        }
    }

    None
}

/// Assemble the enriched document from a content response.
fn page_to_document(page: &Value, url: &str, attachments: Vec<Value>) -> DocumentContent {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();

    let id = text(page.get("id"));
    let title = text(page.get("title"));
    let storage = page
        .pointer("/body/storage/value")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let labels: Vec<String> = page
        .pointer("/metadata/labels/results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|l| l.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let metadata = json!({
        "url": url,
        "space_key": page.pointer("/space/key").and_then(Value::as_str),
        "creator": page.pointer("/history/createdBy/displayName").and_then(Value::as_str),
        "created_date": page.pointer("/history/createdDate").and_then(Value::as_str),
        "last_modifier": page.pointer("/version/by/displayName").and_then(Value::as_str),
        "version": page.pointer("/version/number").and_then(Value::as_i64),
        "labels": labels,
        "attachments": attachments,
    });

    DocumentContent {
        id,
        title,
        content: html_to_text(storage),
        metadata,
    }
}

/// Reduce a raw attachment listing entry to the fields the record keeps.
fn attachment_summary(raw: &Value) -> Value {
    json!({
        "id": raw.get("id").and_then(Value::as_str),
        "filename": raw.get("title").and_then(Value::as_str),
        "media_type": raw.pointer("/metadata/mediaType").and_then(Value::as_str),
        "file_size": raw.pointer("/extensions/fileSize").and_then(Value::as_i64),
        "download": raw.pointer("/_links/download").and_then(Value::as_str),
    })
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            ' ' => out.push_str("%20"),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}
