//! Recursive reference resolver.
//!
//! Composes the classifier and both governors into the full mining flow:
//! fetch a ticket, classify its combined text, partition the matches into
//! the four reference collections, follow ticket references depth-first,
//! and enrich scrapable pages through the document extractors.
//!
//! The walk is an explicit frame stack rather than native recursion: each
//! frame holds a partially assembled [`TicketRecord`] and its pending child
//! ticket references, and the active path (the visited set) grows on push
//! and shrinks on pop. A ticket id already on the active path yields a
//! placeholder entry and no fetch; a ticket reachable via two independent
//! paths is fetched once per path. Depth exhaustion records plain leaf
//! entries.
//!
//! A resolution either fully succeeds or fails: governor errors and a
//! missing root unwind the whole call without returning a partial record.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::classifier::{UrlClassifier, UrlMatch, UrlType};
use crate::config::SiteConfig;
use crate::error::MinerError;
use crate::memory::MemoryGovernor;
use crate::models::{
    CommentRecord, RawTicket, ReferenceBundle, ReferenceEntry, ResourceMetadata, TicketRecord,
};
use crate::rate_limit::RateLimiter;
use crate::traits::{DocumentExtractor, TicketClient};

/// Display-name suffix marking bot authors, matched case-insensitively.
const BOT_SUFFIX: &str = "bot";

/// Resource type that makes a jira match a followable ticket reference.
const JIRA_TICKET_TYPE: &str = "jira_ticket";

/// Where an enrichment result lands in the bundle under assembly.
enum SlotRef {
    Confluence(usize),
    Documentation(usize),
}

/// One level of the walk: a record under assembly plus the child ticket
/// references still to follow.
struct Frame {
    record: TicketRecord,
    /// `(index into references.jira_tickets, ticket id)` pairs.
    pending: VecDeque<(usize, String)>,
    depth_left: u32,
    /// Index in the parent's `jira_tickets` where this record attaches.
    parent_slot: Option<usize>,
}

/// The reference resolver. Collaborators and governors are injected; the
/// resolver owns none of them and is safe to share across resolutions.
pub struct Resolver {
    client: Arc<dyn TicketClient>,
    classifier: Arc<UrlClassifier>,
    limiter: Arc<RateLimiter>,
    memory: Arc<MemoryGovernor>,
    site: SiteConfig,
    confluence_extractor: Option<Arc<dyn DocumentExtractor>>,
    web_extractor: Option<Arc<dyn DocumentExtractor>>,
}

impl Resolver {
    pub fn new(
        client: Arc<dyn TicketClient>,
        classifier: Arc<UrlClassifier>,
        limiter: Arc<RateLimiter>,
        memory: Arc<MemoryGovernor>,
        site: SiteConfig,
    ) -> Self {
        Self {
            client,
            classifier,
            limiter,
            memory,
            site,
            confluence_extractor: None,
            web_extractor: None,
        }
    }

    /// Attach the extractor used for confluence page references.
    pub fn with_confluence_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.confluence_extractor = Some(extractor);
        self
    }

    /// Attach the extractor used for scrapable documentation references.
    pub fn with_web_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.web_extractor = Some(extractor);
        self
    }

    /// Resolve a root ticket into its record tree, following ticket
    /// references up to `max_depth` levels deep.
    pub async fn resolve(
        &self,
        root_id: &str,
        max_depth: u32,
    ) -> Result<TicketRecord, MinerError> {
        let mut on_path: HashSet<String> = HashSet::new();

        let root = self.load_frame(root_id, max_depth, &mut on_path).await?;
        let mut stack: Vec<Frame> = vec![root];

        while let Some(top) = stack.last_mut() {
            match top.pending.pop_front() {
                Some((slot, child_id)) => {
                    // depth_left > 0 is guaranteed at enqueue time.
                    let child_depth = top.depth_left - 1;
                    match self.load_frame(&child_id, child_depth, &mut on_path).await {
                        Ok(mut frame) => {
                            frame.parent_slot = Some(slot);
                            stack.push(frame);
                        }
                        Err(MinerError::NotFound { id }) => {
                            // Only referenced in text; the reference entry
                            // stays as an unresolved leaf.
                            eprintln!("Warning: referenced ticket {id} not found");
                        }
                        Err(e) => return Err(e),
                    }
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    on_path.remove(&done.record.id);

                    match (done.parent_slot, stack.last_mut()) {
                        (Some(slot), Some(parent)) => {
                            if let Some(entry) =
                                parent.record.references.jira_tickets.get_mut(slot)
                            {
                                entry.record = Some(Box::new(done.record));
                            }
                        }
                        _ => return Ok(done.record),
                    }
                }
            }
        }

        Err(MinerError::Malformed(
            "resolution stack drained without producing a root record".to_string(),
        ))
    }

    /// Fetch, classify, and assemble one ticket into a stack frame. Pushes
    /// the ticket onto the active path.
    async fn load_frame(
        &self,
        id: &str,
        depth_left: u32,
        on_path: &mut HashSet<String>,
    ) -> Result<Frame, MinerError> {
        self.memory.check_memory()?;

        let raw = self.fetch_ticket_governed(id).await?;
        let raw_comments = self.fetch_comments_governed(id).await?;

        let comments: Vec<CommentRecord> = raw_comments
            .into_iter()
            .filter(|c| !is_bot(&c.author))
            .map(|c| CommentRecord {
                author: c.author,
                body: c.body,
                created: c.created,
            })
            .collect();

        // On the path before classification so self references become
        // placeholders.
        on_path.insert(raw.key.clone());

        let combined = combined_text(&raw, &comments);
        let matches = self.classifier.classify(&combined, &raw.key);

        let (mut references, pending, jobs) =
            self.build_bundle(&raw, matches, depth_left, on_path);
        self.enrich(&mut references, jobs).await?;

        let record = TicketRecord {
            id: raw.key,
            summary: raw.summary,
            description: raw.description,
            created: raw.created,
            updated: raw.updated,
            status: raw.status,
            priority: raw.priority,
            assignee: raw.assignee,
            reporter: raw.reporter,
            labels: raw.labels,
            comments,
            references,
        };

        Ok(Frame {
            record,
            pending,
            depth_left,
            parent_slot: None,
        })
    }

    /// Partition classified matches into the four collections, deduplicated
    /// by identity key in first-occurrence order. Structured issue links
    /// join as implicit jira references after the text matches. Returns the
    /// bundle, the child tickets to follow, and the enrichment jobs.
    #[allow(clippy::type_complexity)]
    fn build_bundle(
        &self,
        raw: &RawTicket,
        matches: Vec<UrlMatch>,
        depth_left: u32,
        on_path: &HashSet<String>,
    ) -> (
        ReferenceBundle,
        VecDeque<(usize, String)>,
        Vec<(SlotRef, UrlMatch)>,
    ) {
        let mut bundle = ReferenceBundle::default();
        let mut pending = VecDeque::new();
        let mut jobs = Vec::new();

        let mut seen_tickets: HashSet<String> = HashSet::new();
        let mut seen_pages: HashSet<String> = HashSet::new();
        let mut seen_docs: HashSet<String> = HashSet::new();
        let mut seen_other: HashSet<String> = HashSet::new();

        for m in matches {
            match m.url_type {
                UrlType::Jira if m.resource_metadata.resource_type == JIRA_TICKET_TYPE => {
                    let ticket_id = m.resource_metadata.resource_id.clone();
                    if !seen_tickets.insert(ticket_id.clone()) {
                        continue;
                    }
                    if on_path.contains(&ticket_id) {
                        bundle.jira_tickets.push(ReferenceEntry::placeholder(
                            &ticket_id,
                            &m.url,
                            &m.resource_metadata.platform,
                        ));
                    } else {
                        let slot = bundle.jira_tickets.len();
                        bundle.jira_tickets.push(entry_from_match(&ticket_id, &m));
                        if depth_left > 0 {
                            pending.push_back((slot, ticket_id));
                        }
                    }
                }
                UrlType::Confluence => {
                    let page_id = m.resource_metadata.resource_id.clone();
                    if !seen_pages.insert(page_id.clone()) {
                        continue;
                    }
                    let slot = bundle.confluence_pages.len();
                    bundle.confluence_pages.push(entry_from_match(&page_id, &m));
                    if m.should_scrape && self.confluence_extractor.is_some() {
                        jobs.push((SlotRef::Confluence(slot), m));
                    }
                }
                // A jira-host URL that is not a ticket (dashboards, filters)
                // is recorded but never followed or scraped.
                UrlType::Jira => {
                    if seen_other.insert(m.url.clone()) {
                        bundle.other_urls.push(entry_from_match(&m.url, &m));
                    }
                }
                _ if m.should_scrape => {
                    if !seen_docs.insert(m.url.clone()) {
                        continue;
                    }
                    let slot = bundle.scrapable_documentation.len();
                    bundle
                        .scrapable_documentation
                        .push(entry_from_match(&m.url, &m));
                    if self.web_extractor.is_some() {
                        jobs.push((SlotRef::Documentation(slot), m));
                    }
                }
                _ => {
                    if seen_other.insert(m.url.clone()) {
                        bundle.other_urls.push(entry_from_match(&m.url, &m));
                    }
                }
            }
        }

        for link in &raw.links {
            if !seen_tickets.insert(link.key.clone()) {
                continue;
            }
            let url = format!(
                "{}/browse/{}",
                self.site.jira_url.trim_end_matches('/'),
                link.key
            );
            if on_path.contains(&link.key) {
                bundle
                    .jira_tickets
                    .push(ReferenceEntry::placeholder(&link.key, &url, "jira"));
            } else {
                let slot = bundle.jira_tickets.len();
                bundle.jira_tickets.push(ReferenceEntry {
                    id: link.key.clone(),
                    url,
                    context: format!("Linked issue ({})", link.link_type),
                    metadata: ResourceMetadata::new("jira", JIRA_TICKET_TYPE, &link.key),
                    record: None,
                    document: None,
                });
                if depth_left > 0 {
                    pending.push_back((slot, link.key.clone()));
                }
            }
        }

        (bundle, pending, jobs)
    }

    /// Run enrichment jobs through both governors, `chunk_size` at a time.
    async fn enrich(
        &self,
        bundle: &mut ReferenceBundle,
        jobs: Vec<(SlotRef, UrlMatch)>,
    ) -> Result<(), MinerError> {
        if jobs.is_empty() {
            return Ok(());
        }
        let chunk_size = self.memory.chunk_size().max(1);

        for chunk in jobs.chunks(chunk_size) {
            // The check must pass before the chunk's work begins.
            self.memory.check_memory()?;

            for (slot, m) in chunk {
                let extractor = match slot {
                    SlotRef::Confluence(_) => self.confluence_extractor.as_ref(),
                    SlotRef::Documentation(_) => self.web_extractor.as_ref(),
                };
                let Some(extractor) = extractor else { continue };

                match self.fetch_document_governed(extractor, m).await? {
                    Some(document) => {
                        let entry = match slot {
                            SlotRef::Confluence(i) => bundle.confluence_pages.get_mut(*i),
                            SlotRef::Documentation(i) => {
                                bundle.scrapable_documentation.get_mut(*i)
                            }
                        };
                        if let Some(entry) = entry {
                            entry.document = Some(document);
                        }
                    }
                    None => {
                        eprintln!("Warning: could not enrich {}; keeping bare reference", m.url);
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_ticket_governed(&self, id: &str) -> Result<RawTicket, MinerError> {
        let client = Arc::clone(&self.client);
        let id = id.to_string();
        self.limiter
            .admit(move || {
                let client = Arc::clone(&client);
                let id = id.clone();
                async move { client.fetch_ticket(&id).await }
            })
            .await
    }

    async fn fetch_comments_governed(
        &self,
        id: &str,
    ) -> Result<Vec<crate::models::RawComment>, MinerError> {
        let client = Arc::clone(&self.client);
        let id = id.to_string();
        self.limiter
            .admit(move || {
                let client = Arc::clone(&client);
                let id = id.clone();
                async move { client.fetch_comments(&id).await }
            })
            .await
    }

    async fn fetch_document_governed(
        &self,
        extractor: &Arc<dyn DocumentExtractor>,
        reference: &UrlMatch,
    ) -> Result<Option<crate::models::DocumentContent>, MinerError> {
        let extractor = Arc::clone(extractor);
        let reference = reference.clone();
        self.limiter
            .admit(move || {
                let extractor = Arc::clone(&extractor);
                let reference = reference.clone();
                async move { extractor.fetch_document(&reference).await }
            })
            .await
    }
}

/// Whether a comment author's display name follows the bot naming
/// convention.
fn is_bot(author: &str) -> bool {
    author.trim().to_lowercase().ends_with(BOT_SUFFIX)
}

/// Combined text the classifier scans: summary, description, and every
/// retained comment body.
fn combined_text(raw: &RawTicket, comments: &[CommentRecord]) -> String {
    let mut text = String::with_capacity(
        raw.summary.len()
            + raw.description.len()
            + comments.iter().map(|c| c.body.len() + 2).sum::<usize>()
            + 2,
    );
    text.push_str(&raw.summary);
    text.push_str("\n\n");
    text.push_str(&raw.description);
    for comment in comments {
        text.push_str("\n\n");
        text.push_str(&comment.body);
    }
    text
}

fn entry_from_match(id: &str, m: &UrlMatch) -> ReferenceEntry {
    ReferenceEntry {
        id: id.to_string(),
        url: m.url.clone(),
        context: m.context.clone(),
        metadata: m.resource_metadata.clone(),
        record: None,
        document: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_suffix_case_insensitive() {
        assert!(is_bot("Deploy Bot"));
        assert!(is_bot("automationBOT"));
        assert!(is_bot("  JenkinsBot "));
        assert!(!is_bot("Alice Smith"));
        assert!(!is_bot("Botticelli Fan"));
    }

    #[test]
    fn test_combined_text_order() {
        let raw = RawTicket {
            key: "T-1".to_string(),
            summary: "Summary here".to_string(),
            description: "Description here".to_string(),
            status: "Open".to_string(),
            priority: "None".to_string(),
            assignee: "Unassigned".to_string(),
            reporter: "Unknown".to_string(),
            labels: vec![],
            created: String::new(),
            updated: String::new(),
            links: vec![],
        };
        let comments = vec![CommentRecord {
            author: "Alice".to_string(),
            body: "A comment".to_string(),
            created: String::new(),
        }];
        let text = combined_text(&raw, &comments);
        let summary_at = text.find("Summary here").unwrap();
        let description_at = text.find("Description here").unwrap();
        let comment_at = text.find("A comment").unwrap();
        assert!(summary_at < description_at && description_at < comment_at);
    }

    #[test]
    fn test_placeholder_shape() {
        let entry = ReferenceEntry::placeholder("T-1", "https://jira.example.com/browse/T-1", "jira");
        assert_eq!(entry.context, crate::models::PLACEHOLDER_CONTEXT);
        assert!(entry.metadata.is_parent_reference);
        assert!(entry.metadata.is_processed_reference);
        assert!(entry.record.is_none());
        assert!(entry.is_placeholder());
    }
}
