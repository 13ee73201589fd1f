//! Classification gateway
//!
//! Turns scraped emails into [`Analysis`] records by calling the first
//! viable configured provider, retrying transient failures with backoff,
//! and falling through to the next provider on anything else. Responses
//! are normalized via [`super::parse`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::{GatewayConfig, ResolvedProvider};
use crate::error::{Error, ProviderErrorKind, Result};
use crate::types::{Analysis, EmailData};

use super::parse;

/// A provider-agnostic HTTP request: url, extra headers, JSON body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// Status and raw body of a provider response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Boxed future so [`Transport`] stays object-safe.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;

/// Seam between the gateway and the network. Production uses
/// [`HttpTransport`]; tests substitute a scripted stub and assert on call
/// counts.
pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let mut builder = self.client.post(&request.url).json(&request.body);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Http(format!("request failed: {}", e)))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("failed to read response body: {}", e)))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Multi-provider classification client.
pub struct ClassificationGateway {
    providers: Vec<ResolvedProvider>,
    transport: Box<dyn Transport>,
    retry_backoff: Vec<Duration>,
}

impl ClassificationGateway {
    /// Create a gateway with the real HTTP transport.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Create a gateway over an arbitrary transport (tests).
    pub fn with_transport(config: &GatewayConfig, transport: Box<dyn Transport>) -> Self {
        let providers = config.viable_providers();
        for rp in &providers {
            tracing::debug!(
                provider = rp.provider.as_str(),
                model = %rp.model,
                "Provider viable"
            );
        }

        Self {
            providers,
            transport,
            retry_backoff: config
                .retry_backoff_secs
                .iter()
                .map(|&secs| Duration::from_secs(secs))
                .collect(),
        }
    }

    /// Number of providers with a usable credential.
    pub fn viable_provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Classify one scraped email.
    ///
    /// Zero viable providers fails with a configuration error before any
    /// network traffic. Otherwise providers are tried in order; each gets
    /// retries for transient failures; the error from the final provider is
    /// wrapped in [`Error::AllProvidersFailed`] once every provider is
    /// exhausted.
    pub async fn classify(&self, email: &EmailData) -> Result<Analysis> {
        if self.providers.is_empty() {
            return Err(Error::Config(
                "no classification provider configured; add an API key under [gateway] in config.toml"
                    .to_string(),
            ));
        }

        let prompt = analysis_prompt(email);
        let mut last_error = None;

        for rp in &self.providers {
            match self.call_provider(rp, &prompt).await {
                Ok(text) => {
                    let analysis = parse::normalize_response(&text, email);
                    tracing::debug!(
                        provider = rp.provider.as_str(),
                        priority = %analysis.priority,
                        sender = %email.sender,
                        "Email classified"
                    );
                    return Ok(analysis);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = rp.provider.as_str(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(Error::AllProvidersFailed {
            attempted: self.providers.len(),
            last: Box::new(
                last_error.unwrap_or_else(|| Error::Config("no provider attempted".to_string())),
            ),
        })
    }

    /// One provider with retries: transient failures (rate-limited,
    /// service-unavailable) sleep through the backoff schedule; everything
    /// else fails the provider immediately.
    async fn call_provider(&self, rp: &ResolvedProvider, prompt: &str) -> Result<String> {
        let request = rp.build_request(prompt);
        let mut attempt = 0usize;

        loop {
            match self.attempt(rp, &request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.retry_backoff.len() => {
                    let delay = self.retry_backoff[attempt];
                    attempt += 1;
                    tracing::debug!(
                        provider = rp.provider.as_str(),
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Retrying provider call"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, rp: &ResolvedProvider, request: &HttpRequest) -> Result<String> {
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(Error::Http(message)) => {
                return Err(Error::Provider {
                    provider: rp.provider.as_str().to_string(),
                    kind: ProviderErrorKind::ServiceUnavailable,
                    message,
                });
            }
            Err(e) => return Err(e),
        };

        if !(200..300).contains(&response.status) {
            let kind = classify_failure(response.status, &response.body);
            return Err(Error::Provider {
                provider: rp.provider.as_str().to_string(),
                kind,
                message: format!("HTTP {}: {}", response.status, excerpt(&response.body)),
            });
        }

        rp.extract_text(&response.body)
    }
}

/// The prompt sent to every provider.
fn analysis_prompt(email: &EmailData) -> String {
    format!(
        r#"Analyze this email and provide:
1. Priority level (High/Medium/Low) with reasoning
2. Sender importance assessment
3. Brief summary (2-3 sentences)
4. Suggested action items (if any)
5. Key topics/categories

Email Details:
From: {} <{}>
Subject: {}
Date: {}

Body:
{}

Respond in JSON format:
{{
  "priority": "High/Medium/Low",
  "priorityReason": "explanation",
  "senderImportance": "High/Medium/Low",
  "importanceReason": "explanation",
  "summary": "brief summary",
  "actionItems": ["item1", "item2"],
  "categories": ["category1", "category2"]
}}"#,
        email.sender_name, email.sender, email.subject, email.date, email.body
    )
}

/// Categorize a non-success status for the retry and batch-abort policy.
fn classify_failure(status: u16, body: &str) -> ProviderErrorKind {
    let lower = body.to_ascii_lowercase();
    match status {
        429 if lower.contains("quota")
            || lower.contains("resource_exhausted")
            || lower.contains("billing") =>
        {
            ProviderErrorKind::QuotaExhausted
        }
        429 => ProviderErrorKind::RateLimited,
        400 if lower.contains("safety")
            || lower.contains("content_filter")
            || lower.contains("blocked") =>
        {
            ProviderErrorKind::SafetyBlocked
        }
        500 | 502 | 503 | 504 | 529 => ProviderErrorKind::ServiceUnavailable,
        _ => ProviderErrorKind::Other,
    }
}

/// First chunk of an error body for log and error messages.
fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(429, r#"{"error":"rate limit exceeded"}"#),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            classify_failure(429, r#"{"error":{"type":"insufficient_quota"}}"#),
            ProviderErrorKind::QuotaExhausted
        );
        assert_eq!(
            classify_failure(429, r#"{"status":"RESOURCE_EXHAUSTED"}"#),
            ProviderErrorKind::QuotaExhausted
        );
        assert_eq!(
            classify_failure(503, "overloaded"),
            ProviderErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify_failure(400, r#"{"error":"blocked by safety filter"}"#),
            ProviderErrorKind::SafetyBlocked
        );
        assert_eq!(classify_failure(401, "unauthorized"), ProviderErrorKind::Other);
        assert_eq!(classify_failure(400, "bad request"), ProviderErrorKind::Other);
    }

    #[test]
    fn test_analysis_prompt_includes_email_fields() {
        let email = EmailData {
            sender: "a@example.com".to_string(),
            sender_name: "Alice".to_string(),
            subject: "Quarterly report".to_string(),
            body: "Please review by Friday.".to_string(),
            date: "Mon, 3 Jun".to_string(),
            timestamp: Utc::now(),
        };

        let prompt = analysis_prompt(&email);
        assert!(prompt.contains("Alice <a@example.com>"));
        assert!(prompt.contains("Subject: Quarterly report"));
        assert!(prompt.contains("Please review by Friday."));
        assert!(prompt.contains(r#""priority": "High/Medium/Low""#));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "y".repeat(500);
        let cut = excerpt(&long);
        assert!(cut.len() <= 203);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }
}
