//! Creative tips service client.
//!
//! The tips service proposes fresh captions, a call to action and a short
//! headline for a creative. The control loop only consumes it through the
//! [`TipsGenerator`] capability so tests can substitute a fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use crate::config::TipsConfig;
use crate::{Error, Result};

/// Request sent to the tips service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipsRequest {
    /// Existing copy of the base creative, or a generic brief.
    pub transcript: String,
    /// What the new variant should try differently.
    pub context: String,
    pub industry: String,
}

/// Generated copy for a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeTips {
    pub captions: Vec<String>,
    pub cta: String,
    pub headline: String,
}

impl CreativeTips {
    /// First non-blank caption candidate, trimmed.
    pub fn primary_caption(&self) -> Option<&str> {
        self.captions
            .iter()
            .map(|c| c.trim())
            .find(|c| !c.is_empty())
    }
}

/// Capability for generating creative tips.
#[async_trait]
pub trait TipsGenerator: Send + Sync {
    /// Generate tips. Never returns an empty or partial success.
    async fn generate_tips(&self, request: &TipsRequest) -> Result<CreativeTips>;
}

/// HTTP client for the tips service.
pub struct HttpTipsClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpTipsClient {
    /// Maximum retry attempts for API calls.
    const MAX_RETRIES: u32 = 3;

    #[allow(clippy::result_large_err)]
    pub fn new(config: &TipsConfig) -> Result<Self> {
        let base_url = config.base_url.clone().ok_or_else(|| Error::Config {
            message: "TIPS_API_URL is not set".to_string(),
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/creative-tips", self.base_url)
    }

    /// POST with retry and exponential backoff on 429 and 5xx.
    async fn post_with_retry(&self, request: &TipsRequest) -> Result<reqwest::Response> {
        let url = self.endpoint();
        let mut last_error = None;

        for attempt in 0..Self::MAX_RETRIES {
            let mut builder = self.http_client.post(&url).json(request);
            if let Some(ref key) = self.api_key {
                builder = builder.bearer_auth(key);
            }

            match builder.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().as_u16() == 429 || response.status().is_server_error() =>
                {
                    let status = response.status();
                    warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Retryable tips service error, backing off"
                    );
                    last_error = Some(Error::Tips {
                        message: format!("tips service returned {}", status),
                        status: Some(status.as_u16()),
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Tips {
                        message: format!("tips service returned {}: {}", status, body),
                        status: Some(status.as_u16()),
                    });
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Tips request failed");
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt + 1 < Self::MAX_RETRIES {
                tokio::time::sleep(StdDuration::from_millis(250 * 2u64.pow(attempt))).await;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Tips {
            message: "tips service retries exhausted".to_string(),
            status: None,
        }))
    }
}

#[async_trait]
impl TipsGenerator for HttpTipsClient {
    async fn generate_tips(&self, request: &TipsRequest) -> Result<CreativeTips> {
        let response = self.post_with_retry(request).await?;
        let tips: CreativeTips = response.json().await?;
        validate(tips)
    }
}

#[allow(clippy::result_large_err)]
fn validate(tips: CreativeTips) -> Result<CreativeTips> {
    if tips.primary_caption().is_none() {
        return Err(Error::Tips {
            message: "tips service returned no caption candidates".to_string(),
            status: None,
        });
    }
    debug!(captions = tips.captions.len(), "Received creative tips");
    Ok(tips)
}
