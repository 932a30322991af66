//! Platform URL pattern table.
//!
//! Classification rules are data, not code: each platform names its domains,
//! a scrape default, exclude patterns, and resource patterns with
//! capture-group references for id extraction. The table is loaded once
//! (built-in defaults derived from the configured site, or a JSON override
//! file) and compiled into [`regex::Regex`] matchers at construction; it is
//! immutable afterwards and safe to share across concurrent resolutions.
//!
//! # Pattern file format
//!
//! ```json
//! { "url_patterns": {
//!     "platform": {
//!       "domains": ["app.example.com"],
//!       "scrape": false,
//!       "exclude_patterns": ["^/search(/.*)?$"],
//!       "resource_patterns": [
//!         {"pattern": "/campaign/([0-9]+)/ideas/([0-9]+)",
//!          "type": "campaign_idea", "extract_id": "$2", "parent_id": "$1"}
//!       ]
//!     } } }
//! ```
//!
//! Resource patterns apply in declaration order and must match the entire
//! URL path; the first full-path match wins. Exclude patterns are searched
//! against the path and force `should_scrape = false` when any matches.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::SiteConfig;
use crate::error::MinerError;

// ─── JSON schema ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PatternFile {
    url_patterns: HashMap<String, PlatformRules>,
}

#[derive(Debug, Deserialize)]
struct PlatformRules {
    domains: Vec<String>,
    #[serde(default)]
    scrape: bool,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    #[serde(default)]
    resource_patterns: Vec<ResourceRule>,
}

#[derive(Debug, Deserialize)]
struct ResourceRule {
    pattern: String,
    #[serde(rename = "type")]
    resource_type: String,
    extract_id: String,
    #[serde(default)]
    parent_id: Option<String>,
}

// ─── Compiled table ─────────────────────────────────────────────────

/// One platform's compiled matching rules.
#[derive(Debug)]
pub struct CompiledPlatform {
    pub name: String,
    pub domains: Vec<String>,
    /// Scrape default; exclude patterns can force it off per URL.
    pub scrape: bool,
    exclude: Vec<Regex>,
    resources: Vec<CompiledResource>,
}

#[derive(Debug)]
struct CompiledResource {
    /// Anchored to the full path: a pattern matching only a prefix must not
    /// shadow a more specific pattern declared after it.
    regex: Regex,
    resource_type: String,
    id_group: usize,
    parent_group: Option<usize>,
}

/// A resource extracted from a URL path by a platform's pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedResource {
    pub resource_type: String,
    pub resource_id: String,
    pub parent_id: Option<String>,
}

impl CompiledPlatform {
    /// Apply resource patterns in declaration order; first full-path match
    /// wins.
    pub fn extract_resource(&self, path: &str) -> Option<ExtractedResource> {
        for rule in &self.resources {
            if let Some(caps) = rule.regex.captures(path) {
                let id = caps.get(rule.id_group)?.as_str().to_string();
                let parent = rule
                    .parent_group
                    .and_then(|g| caps.get(g))
                    .map(|m| m.as_str().to_string());
                return Some(ExtractedResource {
                    resource_type: rule.resource_type.clone(),
                    resource_id: id,
                    parent_id: parent,
                });
            }
        }
        None
    }

    /// Scrape eligibility for a path: any exclude match forces `false`,
    /// otherwise the platform default applies.
    pub fn should_scrape(&self, path: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.scrape
    }
}

/// The full domain → platform table, compiled once at construction.
#[derive(Debug)]
pub struct PlatformPatterns {
    platforms: Vec<CompiledPlatform>,
}

impl PlatformPatterns {
    /// Compile a pattern table from parsed JSON rules.
    fn compile(file: PatternFile) -> Result<Self, MinerError> {
        // Sort platforms by name for deterministic iteration; matching is
        // domain-keyed so order carries no semantics.
        let mut entries: Vec<(String, PlatformRules)> = file.url_patterns.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut platforms = Vec::with_capacity(entries.len());
        for (name, rules) in entries {
            let exclude = rules
                .exclude_patterns
                .iter()
                .map(|p| compile_regex(p))
                .collect::<Result<Vec<_>, _>>()?;

            let mut resources = Vec::with_capacity(rules.resource_patterns.len());
            for rule in &rules.resource_patterns {
                let regex = compile_regex(&format!("^(?:{})$", rule.pattern))?;
                let id_group = parse_group_ref(&rule.pattern, &rule.extract_id)?;
                let parent_group = rule
                    .parent_id
                    .as_deref()
                    .map(|g| parse_group_ref(&rule.pattern, g))
                    .transpose()?;
                resources.push(CompiledResource {
                    regex,
                    resource_type: rule.resource_type.clone(),
                    id_group,
                    parent_group,
                });
            }

            platforms.push(CompiledPlatform {
                name,
                domains: rules.domains,
                scrape: rules.scrape,
                exclude,
                resources,
            });
        }

        Ok(PlatformPatterns { platforms })
    }

    /// Parse and compile a pattern table from JSON text.
    pub fn from_json(json: &str) -> Result<Self, MinerError> {
        let file: PatternFile = serde_json::from_str(json)?;
        Self::compile(file)
    }

    /// Load a pattern override file.
    pub fn from_file(path: &Path) -> Result<Self, MinerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MinerError::Config(format!(
                "failed to read pattern file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// The built-in table for a configured site: jira, confluence, help
    /// center, and developer documentation hosts.
    pub fn builtin(site: &SiteConfig) -> Self {
        let base = &site.base_domain;
        let json = serde_json::json!({
            "url_patterns": {
                "jira": {
                    "domains": [host_of(&site.jira_url), format!("jira.{base}")],
                    "scrape": true,
                    "resource_patterns": [
                        {"pattern": "/browse/([A-Z][A-Z0-9]*-[0-9]+)",
                         "type": "jira_ticket", "extract_id": "$1"}
                    ]
                },
                "confluence": {
                    "domains": [host_of(&site.confluence_url), format!("confluence.{base}")],
                    "scrape": true,
                    "resource_patterns": [
                        {"pattern": "/wiki/spaces/([^/]+)/pages/([0-9]+)(?:/[^/]*)?",
                         "type": "confluence_page", "extract_id": "$2", "parent_id": "$1"},
                        {"pattern": "/display/(([^/]+)/([^/]+))",
                         "type": "confluence_page", "extract_id": "$1"}
                    ]
                },
                "help_center": {
                    "domains": [format!("help.{base}")],
                    "scrape": true,
                    "exclude_patterns": ["^/search(/.*)?$", "^/user(/.*)?$"],
                    "resource_patterns": [
                        {"pattern": "/article/([0-9]+)(?:/[^/]*)?",
                         "type": "help_article", "extract_id": "$1"}
                    ]
                },
                "documentation": {
                    "domains": [format!("developers.{base}"), format!("docs.{base}")],
                    "scrape": true
                }
            }
        });
        // Static JSON with known-good patterns.
        Self::from_json(&json.to_string()).expect("built-in pattern table is valid")
    }

    /// Resolve a host to its platform. Exact domain match wins; otherwise
    /// the longest configured domain that is a dot-suffix of the host.
    pub fn match_host(&self, host: &str) -> Option<&CompiledPlatform> {
        let mut best: Option<(&CompiledPlatform, usize, bool)> = None;
        for platform in &self.platforms {
            for domain in &platform.domains {
                let exact = host == domain.as_str();
                let suffix = !exact && host.ends_with(&format!(".{domain}"));
                if !exact && !suffix {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some((_, best_len, best_exact)) => {
                        (exact && !best_exact) || (exact == *best_exact && domain.len() > *best_len)
                    }
                };
                if better {
                    best = Some((platform, domain.len(), exact));
                }
            }
        }
        best.map(|(p, _, _)| p)
    }

    /// All configured platforms, in stable (name) order.
    pub fn platforms(&self) -> &[CompiledPlatform] {
        &self.platforms
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, MinerError> {
    Regex::new(pattern).map_err(|e| MinerError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a `$n` capture-group reference.
fn parse_group_ref(pattern: &str, group_ref: &str) -> Result<usize, MinerError> {
    group_ref
        .strip_prefix('$')
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| MinerError::Pattern {
            pattern: pattern.to_string(),
            reason: format!("invalid capture-group reference '{group_ref}'"),
        })
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}
