//! # Ticket Miner
//!
//! A reference-mining framework for ticket-tracking and wiki platforms.
//!
//! Ticket Miner fetches a root ticket, extracts and classifies every URL
//! embedded in its text against a configurable platform pattern table, and
//! recursively resolves ticket-to-ticket and ticket-to-document references
//! into a bounded record tree — while throttling every outbound call and
//! keeping resident memory under a configured ceiling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ TicketClient │──▶│   Resolver    │──▶│ TicketRecord  │
//! │  (Jira REST) │   │ classify +    │   │  JSON tree    │
//! └──────────────┘   │ walk + dedup  │   └───────────────┘
//!                    └──────┬────────┘
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!   ┌────────────┐   ┌────────────┐   ┌────────────┐
//!   │ Classifier │   │ RateLimiter│   │  Memory    │
//!   │ (patterns) │   │ (throttle) │   │  Governor  │
//!   └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tkt fetch PROJ-1234                  # resolve a ticket to JSON
//! tkt fetch PROJ-1234 --depth 3        # deeper reference following
//! tkt classify notes.txt               # classify URLs in a text file
//! tkt patterns                         # show the active pattern table
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core record and reference types |
//! | [`patterns`] | Platform URL pattern table (JSON rules, compiled once) |
//! | [`classifier`] | URL classification engine |
//! | [`resolver`] | Recursive reference resolver |
//! | [`rate_limit`] | Outbound-call rate governor |
//! | [`memory`] | Process memory governor |
//! | [`traits`] | Injected collaborator seams |
//! | [`jira`] | Jira REST ticket client |
//! | [`confluence`] | Confluence page extractor |
//! | [`webpage`] | Generic webpage extractor |
//! | [`extract`] | HTML-to-text extraction |

pub mod classifier;
pub mod config;
pub mod confluence;
pub mod error;
pub mod extract;
pub mod jira;
pub mod memory;
pub mod models;
pub mod patterns;
pub mod rate_limit;
pub mod resolver;
pub mod traits;
pub mod webpage;
