use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{CloudConfig, DomainError, PolishStyle};
use crate::ports::TextPolisher;

/// Inputs shorter than this are skipped without a network call.
const MIN_INPUT_CHARS: usize = 10;

#[derive(Debug, Serialize)]
struct FunctionRequest<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct PolishPayload<'a> {
    text: &'a str,
    style: &'static str,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    result: Option<FunctionResult>,
}

#[derive(Debug, Deserialize)]
struct FunctionResult {
    #[serde(default)]
    text: String,
}

/// Remote LLM text-cleanup service.
///
/// Failures are absorbed: every error path logs and yields `None`, so
/// the caller keeps the unpolished transcript.
pub struct CloudTextPolisher {
    client: Client,
    config: CloudConfig,
    style: PolishStyle,
}

impl CloudTextPolisher {
    pub fn new(config: CloudConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("voxnote/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DomainError::Http(format!("Failed to create HTTP client: {}", e)))?;

        let style = config.polish_style;
        Ok(Self {
            client,
            config,
            style,
        })
    }

    fn cleanup_url(&self) -> String {
        format!("{}/cleanup", self.config.base_url.trim_end_matches('/'))
    }

    async fn call_cleanup(&self, text: &str) -> Result<String, DomainError> {
        let request = FunctionRequest {
            data: PolishPayload {
                text,
                style: self.style.as_str(),
            },
        };

        let response = self
            .client
            .post(self.cleanup_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::PolishFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::PolishFailed(format!(
                "service returned status {}",
                status
            )));
        }

        let body: FunctionResponse = response
            .json()
            .await
            .map_err(|e| DomainError::PolishFailed(format!("malformed response: {}", e)))?;

        match body.result {
            Some(result) if !result.text.trim().is_empty() => Ok(result.text.trim().to_string()),
            _ => Err(DomainError::PolishFailed("empty response".to_string())),
        }
    }
}

#[async_trait]
impl TextPolisher for CloudTextPolisher {
    async fn polish(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() < MIN_INPUT_CHARS {
            debug!(chars = trimmed.chars().count(), "Polish skipped for trivial input");
            return None;
        }

        match self.call_cleanup(trimmed).await {
            Ok(polished) => {
                info!(
                    input_len = trimmed.len(),
                    output_len = polished.len(),
                    "Polish complete"
                );
                Some(polished)
            }
            Err(err) => {
                warn!(error = %err, "Polish failed, keeping original text");
                None
            }
        }
    }
}
