//! Classification gateway
//!
//! Invokes an external AI provider to classify scraped emails, with
//! bounded retries, provider fallback, and infallible response
//! normalization. The batch session layers grouped concurrency and pacing
//! on top and writes results through the aggregation store.
//!
//! Configure providers in `~/.config/mailsift/config.toml`:
//!
//! ```toml
//! [gateway]
//! providers = ["openai", "anthropic"]
//!
//! [gateway.openai]
//! api_key = "sk-..."
//! model = "gpt-4o-mini"
//! ```

mod batch;
mod client;
mod parse;
mod providers;

pub use batch::{BatchAnalyzer, BatchOutcome, BatchReport};
pub use client::{
    ClassificationGateway, HttpRequest, HttpResponse, HttpTransport, Transport, TransportFuture,
};
pub use parse::normalize_response;
