use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use payout_core::{GatewayError, NetworkGateway, SubmitOutcome, TransferPayload};

use crate::config::Config;
use crate::error::{LedgerError, Result};

#[derive(Deserialize)]
struct WindowResponse {
    window: u64,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    payload: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    accepted: bool,
    transaction_id: Option<String>,
    error: Option<String>,
}

/// JSON/HTTP client for the remote ledger network.
pub struct LedgerClient {
    client: Client,
    config: Config,
}

impl LedgerClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Read the current network window. Fetched fresh on every call;
    /// windows are time-sensitive and must not be cached.
    pub async fn fetch_current_window(&self) -> Result<u64> {
        let url = format!("{}/v1/ledger/current", self.config.base_url);
        let response: WindowResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Http(format!("GET request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LedgerError::Api(format!("Window read rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| LedgerError::Http(format!("JSON parse failed: {}", e)))?;

        debug!(window = response.window, "Fetched current network window");
        Ok(response.window)
    }

    /// Broadcast a signed payload, hex encoded.
    pub async fn submit_payload(&self, payload: &TransferPayload) -> Result<SubmitOutcome> {
        let url = format!("{}/v1/transactions", self.config.base_url);
        let body = SubmitRequest {
            payload: &hex::encode(&payload.bytes),
        };

        let response: SubmitResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Http(format!("POST request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| LedgerError::Api(format!("Submission rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| LedgerError::Http(format!("JSON parse failed: {}", e)))?;

        Ok(SubmitOutcome {
            accepted: response.accepted,
            transaction_id: response.transaction_id,
            error: response.error,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl NetworkGateway for LedgerClient {
    async fn current_window(&self) -> std::result::Result<u64, GatewayError> {
        self.fetch_current_window().await.map_err(Into::into)
    }

    async fn submit(
        &self,
        payload: &TransferPayload,
    ) -> std::result::Result<SubmitOutcome, GatewayError> {
        self.submit_payload(payload).await.map_err(Into::into)
    }
}
