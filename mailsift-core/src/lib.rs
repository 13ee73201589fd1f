//! # mailsift-core
//!
//! Core library for mailsift - local email intelligence.
//!
//! This library provides:
//! - Domain types for sender profiles, priority history, actions, and
//!   email context
//! - The aggregation store (SQLite) with derived analytics
//! - A multi-provider classification gateway with retry and fallback
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Scraped emails (external) flow through the classification gateway into
//! canonical analysis records, which the aggregation store persists across
//! four collections; the analytics module derives statistics from the
//! store on demand for whatever front end consumes them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mailsift_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, Provider};
pub use db::Database;
pub use error::{Error, ProviderErrorKind, Result};
pub use gateway::{BatchAnalyzer, BatchOutcome, BatchReport, ClassificationGateway};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod types;
