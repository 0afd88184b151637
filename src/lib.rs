//! linkpulse - URL shortening core
//!
//! Maps long URLs to short codes, resolves codes back to URLs behind a
//! read-through cache, and records click events through a bounded,
//! non-blocking pipeline into idempotent daily rollups.
//!
//! # Architecture
//! - `services`: code generation, link management, redirect resolution, analytics queries
//! - `storage`: link store and click event log (in-memory and SeaORM backends)
//! - `cache`: tiered link cache (object cache + tombstones + eviction stamps)
//! - `analytics`: click event construction, ingestion pipeline, rollups, retention
//! - `config`: static configuration (TOML + `LP__*` environment)
//! - `runtime`: application wiring and shutdown
//! - `interfaces`: operator CLI
//! - `system`: logging setup

pub mod analytics;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
