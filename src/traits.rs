//! Collaborator seams for the reference resolver.
//!
//! The resolver never constructs its collaborators internally: the ticket
//! client and the document extractors are injected as trait objects, so
//! production wiring (REST clients) and test wiring (in-memory doubles)
//! flow through the same code path.

use async_trait::async_trait;

use crate::classifier::UrlMatch;
use crate::error::MinerError;
use crate::models::{DocumentContent, RawComment, RawTicket};

/// Source of raw tickets and their comments.
///
/// Implementations fail with [`MinerError::NotFound`] for unknown ids and
/// [`MinerError::RateLimited`] when the platform signals throttling; the
/// rate governor handles the retries.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Fetch the raw fields of one ticket.
    async fn fetch_ticket(&self, id: &str) -> Result<RawTicket, MinerError>;

    /// Fetch the ticket's comments, in the platform's chronological order.
    async fn fetch_comments(&self, id: &str) -> Result<Vec<RawComment>, MinerError>;
}

/// Enriches a classified URL with fetched document content.
///
/// Local failures (bad URL, missing page, unparseable body) return
/// `Ok(None)` — they must not abort a resolution; the reference entry is
/// kept without enrichment. The one condition allowed to escalate through
/// this boundary is [`MinerError::RateLimited`], so the rate governor can
/// retry and, on exhaustion, abort.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn fetch_document(
        &self,
        reference: &UrlMatch,
    ) -> Result<Option<DocumentContent>, MinerError>;
}
