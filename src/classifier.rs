//! URL classification engine.
//!
//! Scans free text for URL-shaped substrings and classifies each against the
//! platform pattern table: host resolution, resource-id extraction, and
//! scrape eligibility. The classifier is pure — text in, matches out — and
//! deterministic: matches come back in scan order, duplicates included
//! (deduplication is the resolver's responsibility).
//!
//! Malformed or scheme-only URLs (no host) are silently skipped. URLs on
//! hosts outside the pattern table classify as [`UrlType::External`] with
//! `should_scrape = false`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use url::Url;

use crate::models::ResourceMetadata;
use crate::patterns::PlatformPatterns;

/// Characters of surrounding text kept on each side of a match.
const CONTEXT_WINDOW: usize = 100;

/// Trailing punctuation stripped from URL candidates; prose around a link
/// is not part of it.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"', '>'];

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("URL regex is valid")
    })
}

/// Classified kind of a matched URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlType {
    Jira,
    Confluence,
    HelpCenter,
    Documentation,
    External,
}

impl UrlType {
    /// Map a platform name from the pattern table to a URL type. Platforms
    /// outside the built-in vocabulary classify as `External`; their own
    /// name survives in [`ResourceMetadata::platform`].
    fn from_platform(name: &str) -> Self {
        match name {
            "jira" => UrlType::Jira,
            "confluence" => UrlType::Confluence,
            "help_center" => UrlType::HelpCenter,
            "documentation" => UrlType::Documentation,
            _ => UrlType::External,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::Jira => "jira",
            UrlType::Confluence => "confluence",
            UrlType::HelpCenter => "help_center",
            UrlType::Documentation => "documentation",
            UrlType::External => "external",
        }
    }
}

impl std::fmt::Display for UrlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified URL occurrence, consumed by the resolver to decide
/// recursion or extractor delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlMatch {
    pub url: String,
    pub url_type: UrlType,
    pub should_scrape: bool,
    /// Bounded window of surrounding text, for human-auditable provenance.
    pub context: String,
    pub resource_metadata: ResourceMetadata,
}

/// The classification engine. Holds the compiled pattern table; safe to
/// share across concurrent resolutions.
pub struct UrlClassifier {
    patterns: Arc<PlatformPatterns>,
}

impl UrlClassifier {
    pub fn new(patterns: Arc<PlatformPatterns>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PlatformPatterns {
        &self.patterns
    }

    /// Scan `text` and classify every URL occurrence, in scan order.
    ///
    /// `root_id` marks jira matches that point back at the ticket under
    /// resolution (`is_parent_reference`); path-scoped placeholder decisions
    /// stay with the resolver.
    pub fn classify(&self, text: &str, root_id: &str) -> Vec<UrlMatch> {
        let mut matches = Vec::new();

        for found in url_regex().find_iter(text) {
            let candidate = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            if candidate.is_empty() {
                continue;
            }
            let parsed = match Url::parse(candidate) {
                Ok(u) => u,
                Err(_) => continue,
            };
            let host = match parsed.host_str() {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };
            let path = parsed.path();

            let (platform, url_type, should_scrape, resource) =
                match self.patterns.match_host(host) {
                    Some(p) => (
                        p.name.clone(),
                        UrlType::from_platform(&p.name),
                        p.should_scrape(path),
                        p.extract_resource(path),
                    ),
                    None => ("external".to_string(), UrlType::External, false, None),
                };

            let mut metadata = match resource {
                Some(r) => {
                    let mut md = ResourceMetadata::new(&platform, &r.resource_type, &r.resource_id);
                    md.parent_id = r.parent_id;
                    md
                }
                None => {
                    let resource_type = if url_type == UrlType::External {
                        "external_url"
                    } else {
                        "web_page"
                    };
                    ResourceMetadata::new(&platform, resource_type, candidate)
                }
            };
            if url_type == UrlType::Jira && metadata.resource_id == root_id {
                metadata.is_parent_reference = true;
            }

            matches.push(UrlMatch {
                url: candidate.to_string(),
                url_type,
                should_scrape,
                context: context_window(text, found.start(), found.start() + candidate.len()),
                resource_metadata: metadata,
            });
        }

        matches
    }
}

/// Extract a whitespace-normalized window of up to [`CONTEXT_WINDOW`]
/// characters on each side of the `[start, end)` byte range.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(CONTEXT_WINDOW);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = end.saturating_add(CONTEXT_WINDOW).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    text[lo..hi].split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn builtin_classifier() -> UrlClassifier {
        UrlClassifier::new(Arc::new(PlatformPatterns::builtin(&SiteConfig::default())))
    }

    fn campaign_classifier() -> UrlClassifier {
        let patterns = PlatformPatterns::from_json(
            r#"{ "url_patterns": {
                "help_center": {
                    "domains": ["help.example.com"],
                    "scrape": true,
                    "exclude_patterns": ["^/search(/.*)?$", "^/user(/.*)?$"]
                },
                "platform": {
                    "domains": ["app.example.com"],
                    "scrape": false,
                    "resource_patterns": [
                        {"pattern": "/campaign/([0-9]+)",
                         "type": "campaign", "extract_id": "$1"},
                        {"pattern": "/campaign/([0-9]+)/ideas/([0-9]+)",
                         "type": "campaign_idea", "extract_id": "$2", "parent_id": "$1"}
                    ]
                }
            } }"#,
        )
        .unwrap();
        UrlClassifier::new(Arc::new(patterns))
    }

    #[test]
    fn test_jira_urls() {
        let classifier = builtin_classifier();
        let content = "\
            Here are some Jira tickets:\n\
            - https://jira.example.com/browse/PROJ-123\n\
            - https://jira.example.com/browse/TEST-456\n\
            - https://jira.example.com/browse/PROJ-789\n";

        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 3);
        for m in &matches {
            assert_eq!(m.url_type, UrlType::Jira);
            assert_eq!(m.resource_metadata.resource_type, "jira_ticket");
            assert!(m.should_scrape);
        }
        assert_eq!(matches[0].resource_metadata.resource_id, "PROJ-123");
    }

    #[test]
    fn test_confluence_urls() {
        let classifier = builtin_classifier();
        let content = "\
            Check these pages:\n\
            - https://confluence.example.com/wiki/spaces/TEST/pages/12345\n\
            - https://confluence.example.com/display/TEST/Page+Title\n";

        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!(m.url_type, UrlType::Confluence);
            assert_eq!(m.resource_metadata.resource_type, "confluence_page");
            assert!(m.should_scrape);
        }
        assert_eq!(matches[0].resource_metadata.resource_id, "12345");
        assert_eq!(matches[1].resource_metadata.resource_id, "TEST/Page+Title");
    }

    #[test]
    fn test_help_center_and_documentation() {
        let classifier = builtin_classifier();
        let content = "\
            See documentation:\n\
            - https://help.example.com/article/123\n\
            - https://developers.example.com/docs/example\n";

        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().any(|m| m.url_type == UrlType::HelpCenter));
        assert!(matches.iter().any(|m| m.url_type == UrlType::Documentation));
    }

    #[test]
    fn test_mixed_content() {
        let classifier = builtin_classifier();
        let content = "\
            Please check:\n\
            1. Ticket: https://jira.example.com/browse/PROJ-123\n\
            2. Doc: https://help.example.com/article/123\n\
            3. Random: https://other.example.com/page\n\
            4. Confluence: https://confluence.example.com/wiki/spaces/TEST/pages/12345\n";

        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 4);
        let types: Vec<UrlType> = matches.iter().map(|m| m.url_type).collect();
        assert!(types.contains(&UrlType::Jira));
        assert!(types.contains(&UrlType::HelpCenter));
        assert!(types.contains(&UrlType::External));
        assert!(types.contains(&UrlType::Confluence));
    }

    #[test]
    fn test_external_unscraped() {
        let classifier = builtin_classifier();
        let matches = classifier.classify("See https://other.example.com/page here", "T-1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url_type, UrlType::External);
        assert!(!matches[0].should_scrape);
        assert_eq!(matches[0].resource_metadata.resource_type, "external_url");
    }

    #[test]
    fn test_invalid_urls_skipped() {
        let classifier = builtin_classifier();
        let content = "Invalid URLs:\n- not-a-url\n- http://\n- https://\n";
        let matches = classifier.classify(content, "TEST-789");
        assert!(matches.is_empty());
    }

    #[test]
    fn test_context_window() {
        let classifier = builtin_classifier();
        let content = "Important ticket: https://jira.example.com/browse/PROJ-123 needs review";
        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].context.contains("Important ticket:"));
        assert!(matches[0].context.contains("needs review"));
    }

    #[test]
    fn test_parent_reference_tagged() {
        let classifier = builtin_classifier();
        let content = "Back-reference: https://jira.example.com/browse/TEST-789";
        let matches = classifier.classify(content, "TEST-789");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].resource_metadata.is_parent_reference);
    }

    #[test]
    fn test_duplicates_preserved() {
        // Dedup is the resolver's job; the classifier reports every occurrence.
        let classifier = builtin_classifier();
        let content = "https://jira.example.com/browse/A-1 and again https://jira.example.com/browse/A-1";
        let matches = classifier.classify(content, "T-1");
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_exclude_pattern_scrape_override() {
        let classifier = campaign_classifier();
        let matches =
            classifier.classify("Search results: https://help.example.com/search?q=test", "T-1");
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].should_scrape);

        let matches =
            classifier.classify("Article: https://help.example.com/article/123", "T-1");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].should_scrape);
    }

    #[test]
    fn test_custom_platform_resources() {
        let classifier = campaign_classifier();
        let content = "\
            1. Campaign: https://app.example.com/campaign/456\n\
            2. Idea: https://app.example.com/campaign/456/ideas/789\n";
        let matches = classifier.classify(content, "T-1");
        assert_eq!(matches.len(), 2);

        assert_eq!(matches[0].resource_metadata.resource_type, "campaign");
        assert_eq!(matches[0].resource_metadata.resource_id, "456");
        assert_eq!(matches[0].resource_metadata.parent_id, None);
        assert!(!matches[0].should_scrape);

        assert_eq!(matches[1].resource_metadata.resource_type, "campaign_idea");
        assert_eq!(matches[1].resource_metadata.resource_id, "789");
        assert_eq!(
            matches[1].resource_metadata.parent_id,
            Some("456".to_string())
        );
        assert_eq!(matches[1].resource_metadata.platform, "platform");
    }

    #[test]
    fn test_trailing_punctuation_stripped() {
        let classifier = builtin_classifier();
        let matches = classifier.classify("(see https://jira.example.com/browse/PROJ-9).", "T-1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "https://jira.example.com/browse/PROJ-9");
    }
}
