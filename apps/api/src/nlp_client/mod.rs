//! NLP service client — the single point of entry for all calls to the
//! external skill-extraction/recommendation microservice.
//!
//! ARCHITECTURAL RULE: No other module may call the NLP service directly.
//! The service's contract is a black box: request bodies are forwarded
//! as-is and responses returned untouched. This client only adds a timeout,
//! a bounded retry on transport failures, and error translation — a
//! downstream non-2xx is surfaced with its status and body attached, an
//! unreachable service maps to 503 at the boundary.

pub mod handlers;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const EXTRACT_SKILLS_PATH: &str = "/extract-skills";
pub const RECOMMEND_USERS_PATH: &str = "/recommend/users-for-project";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NLP service error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("NLP service unreachable after {retries} retries")]
    Unavailable { retries: u32 },
}

/// Thin proxy client for the FastAPI NLP service.
#[derive(Clone)]
pub struct NlpClient {
    client: Client,
    base_url: String,
}

impl NlpClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Forwards a JSON body to the given service path and returns the raw
    /// JSON response. Retries transport failures with exponential backoff;
    /// downstream HTTP errors are returned immediately, status intact.
    pub async fn forward(&self, path: &str, body: &Value) -> Result<Value, NlpError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<NlpError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 500ms, 1s
                let delay = std::time::Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "NLP call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(NlpError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NlpError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            let payload: Value = response.json().await?;
            debug!("NLP call to {path} succeeded");
            return Ok(payload);
        }

        Err(last_error.unwrap_or(NlpError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let client = NlpClient::new("http://nlp:8000/".to_string());
        assert_eq!(client.base_url, "http://nlp:8000");

        let client = NlpClient::new("http://nlp:8000".to_string());
        assert_eq!(client.base_url, "http://nlp:8000");
    }
}
