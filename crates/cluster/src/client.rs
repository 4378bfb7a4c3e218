//! Outbound peer client.
//!
//! One pooled HTTP client per node, shared across all forwards. Connection
//! failures, timeouts, and malformed bodies all collapse into
//! `OwnerUnreachable`; a well-formed peer error body is decoded back into
//! the same error kind so forwarding surfaces it unchanged.

use crate::config::NodeConfig;
use crate::error::FetchError;
use crate::protocol::{ErrorBody, FetchRequest, FETCH_PATH};
use corelib::NodeUrl;
use serde_json::Value;
use std::time::Duration;

/// Pooled HTTP client for peer fetches.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(config: &NodeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.http_pool_connections)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http })
    }

    /// Forwards a fetch to the key's owner.
    pub async fn fetch(
        &self,
        owner: &NodeUrl,
        key: &str,
        params: Value,
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", owner, FETCH_PATH);
        let request = FetchRequest {
            key: key.to_string(),
            params,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| FetchError::OwnerUnreachable {
                url: owner.to_string(),
                detail: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|err| FetchError::OwnerUnreachable {
                    url: owner.to_string(),
                    detail: format!("malformed response body: {}", err),
                });
        }

        match response.json::<ErrorBody>().await {
            Ok(body) => Err(FetchError::from_wire(&body.error, body.detail.clone())
                .unwrap_or_else(|| FetchError::OwnerUnreachable {
                    url: owner.to_string(),
                    detail: format!("{}: {}", status, body.detail),
                })),
            Err(_) => Err(FetchError::OwnerUnreachable {
                url: owner.to_string(),
                detail: format!("status {}", status),
            }),
        }
    }
}
