//! Operator reset: an HTTP side action outside the WebSocket session.

use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::{IdentityToken, ScannerClientConfig, ScannerError};

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
struct ResetBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResetOutcome {
    pub status: u16,
    pub message: String,
}

/// Issues `POST {server}/api/v1/users/{identity}/reset`.
#[derive(Debug, Clone)]
pub struct ResetClient {
    http: reqwest::Client,
    url: Url,
}

impl ResetClient {
    pub fn new(config: &ScannerClientConfig, identity: &IdentityToken) -> Result<Self, ScannerError> {
        let http = reqwest::Client::builder()
            .timeout(config.reset_timeout())
            .build()?;
        Ok(Self {
            http,
            url: config.reset_url(identity)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Succeeds on any 2xx. The body is only read for a message; a body that
    /// is not the expected JSON does not fail the reset.
    pub async fn reset(&self) -> Result<ResetOutcome, ScannerError> {
        info!(url = %self.url, "requesting scanner reset");
        let response = self.http.post(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "scanner reset rejected");
            return Err(ScannerError::Reset(format!("server answered {}", status)));
        }

        let text = response.text().await.unwrap_or_default();
        let body: ResetBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .message
            .or(body.status)
            .unwrap_or_else(|| "scanner reset".to_string());
        info!(status = status.as_u16(), message = %message, "scanner reset accepted");
        Ok(ResetOutcome {
            status: status.as_u16(),
            message,
        })
    }
}
