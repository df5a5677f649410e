//! # Post Relay Library
//!
//! Receives chat messages (text or a photo with caption), fans each one
//! out to every configured publishing target concurrently and reports a
//! per-target outcome back to the sender.
//!
//! Modules:
//! - `config` — YAML service configuration, env expansion and validation
//! - `cache` — the OAuth2 credential record and its shared store
//! - `sources` — token providers, refresh protocol and credential persistence
//! - `targets` — publishing adapters and their capabilities
//! - `dispatch` — eligibility, fan-out and outcome aggregation
//! - `resilience` — refresh-once-on-auth-failure publishing
//! - `hosting` — public image hosting for URL-only targets
//! - `inbound` — Telegram long polling

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod helpers;
pub mod hosting;
pub mod inbound;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod targets;
pub mod utils;

#[cfg(test)]
mod tests;
