//! Per-provider wire formats
//!
//! Each provider gets the same analysis prompt but wants its own request
//! shape and returns the generated text in its own envelope. Everything
//! provider-specific lives here; retry and fallback policy live in
//! [`super::client`].

use serde_json::json;

use crate::config::{Provider, ResolvedProvider};
use crate::error::{Error, ProviderErrorKind, Result};

use super::client::HttpRequest;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1000;
const TEMPERATURE: f64 = 0.7;

const SYSTEM_PROMPT: &str =
    "You are an expert email assistant. Provide accurate, helpful analysis and responses.";

impl ResolvedProvider {
    /// Build the provider-specific HTTP request for one prompt.
    pub(crate) fn build_request(&self, prompt: &str) -> HttpRequest {
        match self.provider {
            Provider::OpenAI => HttpRequest {
                url: format!("{}/v1/chat/completions", self.endpoint),
                headers: vec![(
                    "Authorization".to_string(),
                    format!("Bearer {}", self.api_key),
                )],
                body: json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": SYSTEM_PROMPT},
                        {"role": "user", "content": prompt}
                    ],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                }),
            },
            Provider::Anthropic => HttpRequest {
                url: format!("{}/v1/messages", self.endpoint),
                headers: vec![
                    ("x-api-key".to_string(), self.api_key.clone()),
                    (
                        "anthropic-version".to_string(),
                        ANTHROPIC_VERSION.to_string(),
                    ),
                ],
                body: json!({
                    "model": self.model,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "messages": [
                        {"role": "user", "content": prompt}
                    ],
                }),
            },
            Provider::Gemini => HttpRequest {
                url: format!(
                    "{}/v1beta/models/{}:generateContent?key={}",
                    self.endpoint,
                    urlencoding::encode(&self.model),
                    urlencoding::encode(&self.api_key),
                ),
                headers: vec![],
                body: json!({
                    "contents": [
                        {"parts": [{"text": prompt}]}
                    ],
                    "generationConfig": {
                        "temperature": TEMPERATURE,
                        "maxOutputTokens": MAX_OUTPUT_TOKENS,
                    },
                }),
            },
        }
    }

    /// Pull the generated text out of a successful provider response.
    ///
    /// A body that parses but lacks the expected field is a malformed
    /// response: the caller falls through to the next provider.
    pub(crate) fn extract_text(&self, body: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| self.malformed(format!("response is not JSON: {}", e)))?;

        let text = match self.provider {
            Provider::OpenAI => value["choices"][0]["message"]["content"].as_str(),
            Provider::Anthropic => value["content"][0]["text"].as_str(),
            Provider::Gemini => value["candidates"][0]["content"]["parts"][0]["text"].as_str(),
        };

        text.map(str::to_string)
            .ok_or_else(|| self.malformed("response missing generated text".to_string()))
    }

    fn malformed(&self, message: String) -> Error {
        Error::Provider {
            provider: self.provider.as_str().to_string(),
            kind: ProviderErrorKind::Other,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(provider: Provider) -> ResolvedProvider {
        ResolvedProvider {
            provider,
            api_key: "test-key".to_string(),
            model: provider.default_model().to_string(),
            endpoint: provider.default_endpoint().to_string(),
        }
    }

    #[test]
    fn test_openai_request_shape() {
        let request = resolved(Provider::OpenAI).build_request("classify this");
        assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(request.headers[0].1, "Bearer test-key");
        assert_eq!(request.body["messages"][1]["content"], "classify this");
    }

    #[test]
    fn test_anthropic_request_shape() {
        let request = resolved(Provider::Anthropic).build_request("classify this");
        assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
        assert!(request
            .headers
            .iter()
            .any(|(name, value)| name == "x-api-key" && value == "test-key"));
        assert_eq!(request.body["max_tokens"], 1000);
    }

    #[test]
    fn test_gemini_key_in_query() {
        let request = resolved(Provider::Gemini).build_request("classify this");
        assert!(request.url.contains(":generateContent?key=test-key"));
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_extract_text_per_provider() {
        let openai = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        assert_eq!(
            resolved(Provider::OpenAI).extract_text(openai).unwrap(),
            "hello"
        );

        let anthropic = r#"{"content":[{"type":"text","text":"hello"}]}"#;
        assert_eq!(
            resolved(Provider::Anthropic)
                .extract_text(anthropic)
                .unwrap(),
            "hello"
        );

        let gemini = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#;
        assert_eq!(
            resolved(Provider::Gemini).extract_text(gemini).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_extract_text_malformed() {
        let err = resolved(Provider::OpenAI)
            .extract_text(r#"{"unexpected": true}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider {
                kind: ProviderErrorKind::Other,
                ..
            }
        ));
    }
}
