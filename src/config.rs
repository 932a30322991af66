use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::MinerError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Hosts of the platforms this installation mines. The built-in URL pattern
/// table is derived from these.
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
    #[serde(default = "default_jira_url")]
    pub jira_url: String,
    #[serde(default = "default_confluence_url")]
    pub confluence_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_domain: default_base_domain(),
            jira_url: default_jira_url(),
            confluence_url: default_confluence_url(),
        }
    }
}

fn default_base_domain() -> String {
    "example.com".to_string()
}
fn default_jira_url() -> String {
    "https://jira.example.com".to_string()
}
fn default_confluence_url() -> String {
    "https://confluence.example.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// How many levels of ticket-to-ticket references to follow.
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: u32,
    /// Optional JSON file replacing the built-in URL pattern table.
    #[serde(default)]
    pub url_patterns_file: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_reference_depth: default_max_reference_depth(),
            url_patterns_file: None,
        }
    }
}

fn default_max_reference_depth() -> u32 {
    2
}

/// Throttling policy for outbound platform calls.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RateLimitConfig {
    #[serde(default = "default_calls_per_second")]
    pub calls_per_second: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds before the first retry; doubled on each subsequent one.
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay: f64,
    /// Ceiling on the backoff delay, in seconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_second: default_calls_per_second(),
            max_retries: default_max_retries(),
            initial_retry_delay: default_initial_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
        }
    }
}

fn default_calls_per_second() -> f64 {
    2.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_retry_delay() -> f64 {
    1.0
}
fn default_max_retry_delay() -> f64 {
    60.0
}

/// Memory ceiling policy for the in-process governor.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MemoryConfig {
    /// Hard ceiling: resident usage above this percentage fails the
    /// in-flight operation.
    #[serde(default = "default_max_memory_percent")]
    pub max_memory_percent: f64,
    /// Soft threshold: usage above this triggers a best-effort cleanup pass.
    #[serde(default = "default_cleanup_threshold_percent")]
    pub cleanup_threshold_percent: f64,
    /// Batch operations are processed this many items at a time, with a
    /// memory check between chunks.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_percent: default_max_memory_percent(),
            cleanup_threshold_percent: default_cleanup_threshold_percent(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_max_memory_percent() -> f64 {
    80.0
}
fn default_cleanup_threshold_percent() -> f64 {
    70.0
}
fn default_chunk_size() -> usize {
    50
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric invariants the governors rely on.
    pub fn validate(&self) -> std::result::Result<(), MinerError> {
        let rl = &self.rate_limit;
        if rl.calls_per_second <= 0.0 {
            return Err(MinerError::Config(format!(
                "rate_limit.calls_per_second must be positive, got {}",
                rl.calls_per_second
            )));
        }
        if rl.initial_retry_delay <= 0.0 || rl.max_retry_delay <= 0.0 {
            return Err(MinerError::Config(
                "rate_limit retry delays must be positive".to_string(),
            ));
        }
        if rl.max_retry_delay < rl.initial_retry_delay {
            return Err(MinerError::Config(format!(
                "rate_limit.max_retry_delay ({}) is below initial_retry_delay ({})",
                rl.max_retry_delay, rl.initial_retry_delay
            )));
        }

        let mem = &self.memory;
        if mem.max_memory_percent <= 0.0 || mem.cleanup_threshold_percent <= 0.0 {
            return Err(MinerError::Config(
                "memory thresholds must be positive".to_string(),
            ));
        }
        if mem.max_memory_percent <= mem.cleanup_threshold_percent {
            return Err(MinerError::Config(format!(
                "memory.max_memory_percent ({}) must exceed cleanup_threshold_percent ({})",
                mem.max_memory_percent, mem.cleanup_threshold_percent
            )));
        }
        if mem.chunk_size == 0 {
            return Err(MinerError::Config(
                "memory.chunk_size must be positive".to_string(),
            ));
        }

        if self.resolver.max_reference_depth == 0 {
            return Err(MinerError::Config(
                "resolver.max_reference_depth must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
