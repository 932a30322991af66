//! # Ticket Miner CLI (`tkt`)
//!
//! The `tkt` binary is the thin command-line surface over the library. It
//! provides commands for resolving a ticket into its reference tree,
//! classifying URLs in arbitrary text, and inspecting the active pattern
//! table.
//!
//! ## Usage
//!
//! ```bash
//! tkt --config ./config/tkt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tkt fetch <TICKET-ID>` | Resolve a ticket and print (or save) its JSON record tree |
//! | `tkt classify <FILE>` | Classify every URL in a text file |
//! | `tkt patterns` | Show the active platform pattern table |
//!
//! ## Examples
//!
//! ```bash
//! # Resolve a ticket two references deep (the configured default)
//! tkt fetch PROJ-1234
//!
//! # Deeper walk, saved to a timestamped file in ./dumps
//! tkt fetch PROJ-1234 --depth 3 --output ./dumps
//!
//! # Classify URLs found in a notes file
//! tkt classify meeting-notes.txt
//! ```
//!
//! Credentials come from the environment: `JIRA_USERNAME` /
//! `JIRA_API_TOKEN` for the ticket client, `CONFLUENCE_USERNAME` /
//! `CONFLUENCE_API_TOKEN` for page enrichment. Missing Confluence
//! credentials disable enrichment with a warning rather than failing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ticket_miner::classifier::UrlClassifier;
use ticket_miner::config::Config;
use ticket_miner::confluence::ConfluenceExtractor;
use ticket_miner::jira::JiraClient;
use ticket_miner::memory::MemoryGovernor;
use ticket_miner::models::TicketRecord;
use ticket_miner::patterns::PlatformPatterns;
use ticket_miner::rate_limit::RateLimiter;
use ticket_miner::resolver::Resolver;
use ticket_miner::webpage::WebPageExtractor;

/// Ticket Miner CLI — mine tickets and their reference graphs from
/// ticket-tracking and wiki platforms.
#[derive(Parser)]
#[command(
    name = "tkt",
    about = "Ticket Miner — mine tickets and their reference graphs",
    version,
    long_about = "Ticket Miner fetches a root ticket, classifies every URL embedded in its \
    text against a configurable platform pattern table, and recursively resolves \
    ticket-to-ticket and ticket-to-document references into a bounded JSON record tree."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tkt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Resolve a ticket into its reference record tree.
    ///
    /// Fetches the ticket and its comments, classifies embedded URLs,
    /// follows ticket references up to the configured depth, and prints
    /// the resulting JSON record.
    Fetch {
        /// Ticket id (e.g. `PROJ-1234`).
        ticket_id: String,

        /// Reference depth override; defaults to `resolver.max_reference_depth`.
        #[arg(long)]
        depth: Option<u32>,

        /// Write the record to this file instead of stdout. A directory
        /// gets a timestamped `ticket_<id>_<ts>.json` inside it.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Classify every URL found in a text file.
    ///
    /// Runs the URL classification engine alone — no fetching, no
    /// recursion — and prints the matches as JSON.
    Classify {
        /// Text file to scan.
        file: PathBuf,
    },

    /// Show the active platform pattern table.
    Patterns,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let patterns = match &config.resolver.url_patterns_file {
        Some(path) => Arc::new(PlatformPatterns::from_file(path)?),
        None => Arc::new(PlatformPatterns::builtin(&config.site)),
    };

    match cli.command {
        Commands::Fetch {
            ticket_id,
            depth,
            output,
            pretty,
        } => {
            let classifier = Arc::new(UrlClassifier::new(patterns));
            let limiter = Arc::new(RateLimiter::new(config.rate_limit));
            let memory = Arc::new(MemoryGovernor::new(config.memory));

            let client = Arc::new(JiraClient::from_env(&config.site.jira_url)?);
            let mut resolver = Resolver::new(
                client,
                classifier,
                limiter,
                Arc::clone(&memory),
                config.site.clone(),
            )
            .with_web_extractor(Arc::new(WebPageExtractor::new()?));

            match ConfluenceExtractor::from_env(&config.site.confluence_url, Arc::clone(&memory)) {
                Ok(extractor) => {
                    resolver = resolver.with_confluence_extractor(Arc::new(extractor));
                }
                Err(e) => eprintln!("Warning: confluence enrichment disabled: {e}"),
            }

            let depth = depth.unwrap_or(config.resolver.max_reference_depth);
            let record = resolver.resolve(&ticket_id, depth).await?;

            let json = if pretty {
                serde_json::to_string_pretty(&record)?
            } else {
                serde_json::to_string(&record)?
            };

            match output {
                Some(path) => {
                    let path = resolve_output_path(path, &ticket_id);
                    std::fs::write(&path, &json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    print_summary(&ticket_id, &record, Some(&path));
                }
                None => println!("{json}"),
            }
        }

        Commands::Classify { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let classifier = UrlClassifier::new(patterns);
            let matches = classifier.classify(&text, "");
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }

        Commands::Patterns => {
            println!("{:<16} {:<8} DOMAINS", "PLATFORM", "SCRAPE");
            for platform in patterns.platforms() {
                println!(
                    "{:<16} {:<8} {}",
                    platform.name,
                    platform.scrape,
                    platform.domains.join(", ")
                );
            }
        }
    }

    Ok(())
}

/// A directory output target gets a timestamped file inside it.
fn resolve_output_path(path: PathBuf, ticket_id: &str) -> PathBuf {
    if path.is_dir() {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        path.join(format!("ticket_{ticket_id}_{timestamp}.json"))
    } else {
        path
    }
}

fn print_summary(ticket_id: &str, record: &TicketRecord, saved_to: Option<&std::path::Path>) {
    let refs = &record.references;
    println!("fetch {ticket_id}");
    println!("  comments: {}", record.comments.len());
    println!("  jira references: {}", refs.jira_tickets.len());
    println!("  confluence pages: {}", refs.confluence_pages.len());
    println!(
        "  scrapable documentation: {}",
        refs.scrapable_documentation.len()
    );
    println!("  other urls: {}", refs.other_urls.len());
    if let Some(path) = saved_to {
        println!("  saved: {}", path.display());
    }
    println!("ok");
}
