//! Generic webpage extractor.
//!
//! Implements [`DocumentExtractor`] for scrapable documentation URLs that
//! belong to no dedicated platform client: fetch the page, pull out the
//! `<title>` and visible text, and return them as enrichment. Any local
//! failure — an unparseable URL, a non-success status, an unreachable host
//! — returns `Ok(None)` so the reference survives unenriched. A 429
//! escalates as [`MinerError::RateLimited`] for the rate governor.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::classifier::UrlMatch;
use crate::error::MinerError;
use crate::extract::{html_meta, html_title, html_to_text};
use crate::models::DocumentContent;
use crate::traits::DocumentExtractor;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct WebPageExtractor {
    http: reqwest::Client,
}

impl WebPageExtractor {
    pub fn new() -> Result<Self, MinerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl DocumentExtractor for WebPageExtractor {
    async fn fetch_document(
        &self,
        reference: &UrlMatch,
    ) -> Result<Option<DocumentContent>, MinerError> {
        let parsed = match Url::parse(&reference.url) {
            Ok(u) if u.host_str().is_some() => u,
            _ => return Ok(None),
        };

        let response = match self.http.get(parsed.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Warning: page fetch failed for {}: {e}", reference.url);
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

        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Warning: page body unreadable for {}: {e}", reference.url);
                return Ok(None);
            }
        };

        Ok(Some(page_from_html(&reference.url, &html)))
    }
}

/// Build the enriched document from fetched HTML. Empty content is valid;
/// the page existed, it just had nothing visible to say.
fn page_from_html(url: &str, html: &str) -> DocumentContent {
    let title = html_title(html).unwrap_or_else(|| url.to_string());
    let metadata = json!({
        "url": url,
        "description": html_meta(html, "description"),
    });

    DocumentContent {
        id: url.to_string(),
        title,
        content: html_to_text(html),
        metadata,
    }
}
