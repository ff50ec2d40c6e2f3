//! Minimal JSON-over-HTTPS plumbing shared by the OpenAI-compatible clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use askpdf_core::{Error, Result};

const ERROR_SNIPPET_CHARS: usize = 300;

pub(crate) struct HttpEndpoint {
    provider: String,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub(crate) fn new(provider: &str, base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client error: {e}")))?;
        Ok(Self {
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client,
        })
    }

    pub(crate) fn provider(&self) -> &str {
        &self.provider
    }

    /// POST `body` as JSON to `{base_url}/{path}` and decode the JSON reply.
    /// Transport errors, timeouts, non-2xx statuses and undecodable bodies all
    /// surface as `Error::Provider`.
    pub(crate) async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(&e))?;
        debug!(provider = %self.provider, %url, status = status.as_u16(), bytes = text.len(), "provider response");
        if !status.is_success() {
            return Err(Error::provider(
                &self.provider,
                format!("HTTP {}: {}", status.as_u16(), error_detail(&text)),
            ));
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::provider(&self.provider, format!("malformed response body: {e}")))
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::provider(&self.provider, format!("request timed out after {}s", self.timeout.as_secs()))
        } else {
            Error::provider(&self.provider, format!("request failed: {err}"))
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body, or fall back to a
/// prefix of the raw body.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str().map(str::to_string))
    });
    match message {
        Some(m) => m,
        None => body.chars().take(ERROR_SNIPPET_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::error_detail;

    #[test]
    fn extracts_openai_error_message() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(error_detail(body), "Rate limit reached");
        assert_eq!(error_detail(r#"{"error":"bad key"}"#), "bad key");
        assert_eq!(error_detail("upstream exploded"), "upstream exploded");
    }
}
