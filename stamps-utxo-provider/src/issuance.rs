//! Counterparty-compatible [`IssuanceApi`] client.
//!
//! The compose endpoint returns a full unsigned transaction; the engine only
//! keeps its outputs, so this client stays deliberately thin — one call, one
//! raw hex string out, same primary/fallback discipline as the UTXO side.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use stamps_bitcoin_transactions::{EngineError, IssuanceApi, IssuanceRequest};

/// Endpoints for the issuance/protocol API.
#[derive(Clone, Debug)]
pub struct IssuanceConfig {
    pub primary_url: String,
    pub fallback_url: String,
    pub timeout_secs: u64,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        IssuanceConfig {
            primary_url: "https://api.counterparty.io:4000".to_string(),
            fallback_url: "https://api.counterparty.info".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Deserialize)]
struct ComposeResponse {
    result: ComposeResult,
}

#[derive(Deserialize)]
struct ComposeResult {
    rawtransaction: String,
}

/// HTTP client for the compose-issuance endpoint.
pub struct CounterpartyClient {
    client: reqwest::Client,
    config: IssuanceConfig,
    timeout: Duration,
}

impl CounterpartyClient {
    pub fn new(config: IssuanceConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        CounterpartyClient {
            client: reqwest::Client::new(),
            config,
            timeout,
        }
    }

    fn compose_url(&self, base: &str, request: &IssuanceRequest) -> String {
        let description = request.description.as_deref().unwrap_or("");
        format!(
            "{base}/v2/addresses/{source}/compose/issuance\
             ?asset={asset}&quantity={quantity}&divisible={divisible}&lock={lock}\
             &description={description}&return_only_data=false",
            source = request.source,
            asset = request.asset,
            quantity = request.quantity,
            divisible = request.divisible,
            lock = request.lock,
        )
    }
}

#[async_trait]
impl IssuanceApi for CounterpartyClient {
    async fn compose_issuance(&self, request: &IssuanceRequest) -> Result<String, EngineError> {
        let mut last_reason = String::new();
        for base in [self.config.primary_url.as_str(), self.config.fallback_url.as_str()] {
            let url = self.compose_url(base, request);
            let response = match self.client.get(&url).timeout(self.timeout).send().await {
                Ok(response) => response,
                Err(error) => {
                    warn!(base, %error, "issuance compose request failed, trying next source");
                    last_reason = error.to_string();
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                last_reason = format!("status {status}");
                warn!(base, %status, "issuance compose rejected, trying next source");
                continue;
            }

            match response.json::<ComposeResponse>().await {
                Ok(composed) => {
                    info!(base, asset = %request.asset, "issuance composed");
                    return Ok(composed.result.rawtransaction);
                }
                Err(error) => {
                    warn!(base, %error, "issuance compose response unparseable");
                    last_reason = error.to_string();
                }
            }
        }

        Err(EngineError::ExternalFetchFailure {
            endpoint: "compose/issuance".to_string(),
            reason: last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_url_carries_every_parameter() {
        let client = CounterpartyClient::new(IssuanceConfig::default());
        let request = IssuanceRequest {
            source: "bc1qsource".to_string(),
            asset: "A95428956661682177".to_string(),
            quantity: 1,
            divisible: false,
            lock: true,
            description: Some("STAMP:abcdef".to_string()),
        };
        let url = client.compose_url("https://api.example", &request);
        assert!(url.starts_with("https://api.example/v2/addresses/bc1qsource/compose/issuance?"));
        assert!(url.contains("asset=A95428956661682177"));
        assert!(url.contains("quantity=1"));
        assert!(url.contains("divisible=false"));
        assert!(url.contains("lock=true"));
        assert!(url.contains("description=STAMP:abcdef"));
    }

    #[test]
    fn compose_response_parses() {
        let json = r#"{"result": {"rawtransaction": "0200000001abcd", "btc_fee": 500}}"#;
        let parsed: ComposeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.result.rawtransaction, "0200000001abcd");
    }
}
