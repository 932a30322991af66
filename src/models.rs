//! Core data models used throughout Ticket Miner.
//!
//! These types represent the resolved ticket records, their comments, and the
//! partitioned reference collections that flow out of the resolver, plus the
//! raw platform-side shapes returned by ticket clients.

use serde::{Deserialize, Serialize};

/// Context string carried by placeholder entries standing in for a ticket
/// already on the active resolution path.
pub const PLACEHOLDER_CONTEXT: &str = "Previously processed ticket";

/// A fully resolved ticket, assembled once per resolved ticket id and
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: String,
    pub summary: String,
    pub description: String,
    /// Creation timestamp, verbatim as returned by the source platform.
    pub created: String,
    /// Last-update timestamp, verbatim as returned by the source platform.
    pub updated: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    pub labels: Vec<String>,
    /// Chronological comments with bot authors filtered out.
    pub comments: Vec<CommentRecord>,
    pub references: ReferenceBundle,
}

/// A single retained comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author: String,
    pub body: String,
    pub created: String,
}

/// The four-way reference partition of a single ticket. Each collection is
/// deduplicated by identity key, in first-occurrence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceBundle {
    pub jira_tickets: Vec<ReferenceEntry>,
    pub confluence_pages: Vec<ReferenceEntry>,
    pub scrapable_documentation: Vec<ReferenceEntry>,
    pub other_urls: Vec<ReferenceEntry>,
}

impl ReferenceBundle {
    /// Total entry count across all four collections.
    pub fn len(&self) -> usize {
        self.jira_tickets.len()
            + self.confluence_pages.len()
            + self.scrapable_documentation.len()
            + self.other_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One discovered reference. `record` holds the nested [`TicketRecord`] when
/// a ticket reference was followed; `document` holds enriched content when a
/// page was scraped. Both are omitted from JSON when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Identity key: ticket id, page id, or the URL itself.
    pub id: String,
    pub url: String,
    /// Bounded text window around the match in the source text.
    pub context: String,
    pub metadata: ResourceMetadata,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub record: Option<Box<TicketRecord>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub document: Option<DocumentContent>,
}

impl ReferenceEntry {
    /// A placeholder entry for a ticket already on the active resolution
    /// path. Carries no fetched content and must never trigger a fetch.
    pub fn placeholder(id: &str, url: &str, platform: &str) -> Self {
        ReferenceEntry {
            id: id.to_string(),
            url: url.to_string(),
            context: PLACEHOLDER_CONTEXT.to_string(),
            metadata: ResourceMetadata {
                platform: platform.to_string(),
                resource_type: "jira_ticket".to_string(),
                resource_id: id.to_string(),
                parent_id: None,
                is_parent_reference: true,
                is_processed_reference: true,
            },
            record: None,
            document: None,
        }
    }

    /// Whether this entry is a cycle-avoidance placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.metadata.is_processed_reference
    }
}

/// Structured classification of a matched URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub platform: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_parent_reference: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_processed_reference: bool,
}

impl ResourceMetadata {
    pub fn new(platform: &str, resource_type: &str, resource_id: &str) -> Self {
        ResourceMetadata {
            platform: platform.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            parent_id: None,
            is_parent_reference: false,
            is_processed_reference: false,
        }
    }
}

/// Enriched content returned by a document extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub id: String,
    pub title: String,
    /// Plain text extracted from the page body.
    pub content: String,
    /// Platform-specific extras: space key, creator, labels, attachments...
    pub metadata: serde_json::Value,
}

/// Raw ticket fields as returned by a [`crate::traits::TicketClient`],
/// already extracted from the platform's response shape.
#[derive(Debug, Clone)]
pub struct RawTicket {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    pub labels: Vec<String>,
    pub created: String,
    pub updated: String,
    /// Structured issue links (inward and outward), by linked ticket key.
    pub links: Vec<LinkedIssue>,
}

/// One structured issue link on a ticket.
#[derive(Debug, Clone)]
pub struct LinkedIssue {
    pub key: String,
    /// Link-type name as reported by the platform (e.g. `"Relates"`).
    pub link_type: String,
}

/// A raw comment as returned by a ticket client. `author` is the display
/// name; bot filtering happens in the resolver.
#[derive(Debug, Clone)]
pub struct RawComment {
    pub author: String,
    pub body: String,
    pub created: String,
}
