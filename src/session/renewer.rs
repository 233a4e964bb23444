use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::errors::RenewalError;

/// Exchanges a refresh token for a fresh access token.
///
/// Implementations only talk to the remote endpoint; reading and writing the
/// credential store is the coordinator's job.
#[async_trait::async_trait]
pub trait TokenRenewer: Send + Sync {
    /// A descriptive name (for logs/debug).
    fn get_name(&self) -> &str;

    async fn exchange(&self, refresh_token: &str) -> Result<String, RenewalError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Renews via `POST <refresh_url>` with `{"refresh": ...}`, expecting `{"access": ...}` back.
///
/// Posts directly with the HTTP client rather than through the gateway, so a
/// renewal can't recurse into another renewal.
pub struct HttpRenewer {
    client: reqwest::Client,
    refresh_url: Url,
}

impl HttpRenewer {
    pub fn new(client: reqwest::Client, refresh_url: Url) -> Self {
        info!("Creating HttpRenewer for '{}'", refresh_url);
        Self {
            client,
            refresh_url,
        }
    }
}

#[async_trait::async_trait]
impl TokenRenewer for HttpRenewer {
    fn get_name(&self) -> &str {
        "http"
    }

    async fn exchange(&self, refresh_token: &str) -> Result<String, RenewalError> {
        debug!("Exchanging refresh token at '{}'", self.refresh_url);

        let resp = self
            .client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RenewalError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = resp
            .json::<RefreshResponse>()
            .await
            .map_err(|e| RenewalError::MalformedResponse(e.to_string()))?;
        if body.access.is_empty() {
            return Err(RenewalError::MalformedResponse(
                "access token is empty".to_string(),
            ));
        }

        debug!("Refresh token exchange completed successfully");
        Ok(body.access)
    }
}
