//! Esplora-backed [`UtxoProvider`] with a primary/fallback endpoint chain.
//!
//! Source fallback is this crate's concern: the engine sees one fallible
//! call per contract method and never retries on its own. Raw transaction
//! hex is cached per process, negative results included, since the builder
//! may ask for the same parent repeatedly within one request burst.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{ScriptBuf, Txid};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use stamps_bitcoin_transactions::{
    AncestorInfo, EngineError, FetchOptions, Utxo, UtxoProvider,
};

use crate::config::ProviderConfig;

#[derive(Debug, Error)]
enum EsploraError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl EsploraError {
    fn not_found(&self) -> bool {
        matches!(self, EsploraError::Api { status: 404, .. })
    }
}

fn fetch_failure(endpoint: &str, error: &EsploraError) -> EngineError {
    EngineError::ExternalFetchFailure {
        endpoint: endpoint.to_string(),
        reason: error.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    confirmed: bool,
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AddressUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: StatusInfo,
}

#[derive(Debug, Deserialize)]
struct TxOutInfo {
    scriptpubkey: String,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct TxInfo {
    vout: Vec<TxOutInfo>,
    weight: Option<u64>,
    fee: Option<u64>,
    status: StatusInfo,
}

/// HTTP provider over two Esplora-compatible backends.
pub struct EsploraProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
    raw_tx_cache: Mutex<HashMap<Txid, Option<String>>>,
}

impl EsploraProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        EsploraProvider {
            client: reqwest::Client::new(),
            config,
            timeout,
            raw_tx_cache: Mutex::new(HashMap::new()),
        }
    }

    fn bases(&self) -> [&str; 2] {
        [&self.config.primary_url, &self.config.fallback_url]
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, EsploraError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EsploraError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EsploraError::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| EsploraError::Parse(e.to_string()))
    }

    async fn get_text(&self, url: &str) -> Result<String, EsploraError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EsploraError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EsploraError::Api { status, body });
        }

        response
            .text()
            .await
            .map_err(|e| EsploraError::Parse(e.to_string()))
    }

    async fn tip_height(&self) -> Option<u64> {
        for base in self.bases() {
            match self.get_text(&format!("{base}/blocks/tip/height")).await {
                Ok(text) => match text.trim().parse() {
                    Ok(height) => return Some(height),
                    Err(_) => warn!(base, "unparseable tip height"),
                },
                Err(error) => debug!(base, %error, "tip height fetch failed"),
            }
        }
        None
    }

    /// Fetch `txid` and project out one of its outputs as a UTXO.
    async fn output_from_tx(
        &self,
        txid: &Txid,
        vout: u32,
    ) -> Result<Option<Utxo>, EngineError> {
        let mut last_error: Option<EsploraError> = None;
        for base in self.bases() {
            match self.get_json::<TxInfo>(&format!("{base}/tx/{txid}")).await {
                Ok(tx) => {
                    let Some(output) = tx.vout.get(vout as usize) else {
                        warn!(%txid, vout, base, "output index not present in transaction");
                        return Ok(None);
                    };
                    let script = hex::decode(&output.scriptpubkey)
                        .map(ScriptBuf::from_bytes)
                        .unwrap_or_default();
                    let mut utxo = Utxo::new(*txid, vout, output.value, script);
                    if !tx.status.confirmed {
                        if let (Some(fee), Some(weight)) = (tx.fee, tx.weight) {
                            let vsize = weight.div_ceil(4);
                            utxo.ancestor = Some(AncestorInfo {
                                fees: fee,
                                vsize,
                                effective_fee_rate: fee as f64 / vsize.max(1) as f64,
                            });
                        }
                    }
                    debug!(%txid, vout, base, "fetched specific utxo");
                    return Ok(Some(utxo));
                }
                Err(error) if error.not_found() => return Ok(None),
                Err(error) => {
                    warn!(%txid, vout, base, %error, "tx fetch failed, trying next source");
                    last_error = Some(error);
                }
            }
        }
        Err(fetch_failure(
            "tx",
            &last_error.unwrap_or(EsploraError::Request("no sources configured".into())),
        ))
    }

    async fn list_address_utxos(
        &self,
        address: &str,
    ) -> Result<Vec<AddressUtxo>, EngineError> {
        let mut last_error: Option<EsploraError> = None;
        for base in self.bases() {
            match self
                .get_json::<Vec<AddressUtxo>>(&format!("{base}/address/{address}/utxo"))
                .await
            {
                Ok(list) => {
                    info!(address, base, count = list.len(), "listed address utxos");
                    return Ok(list);
                }
                Err(error) => {
                    warn!(address, base, %error, "utxo listing failed, trying next source");
                    last_error = Some(error);
                }
            }
        }
        Err(fetch_failure(
            "address/utxo",
            &last_error.unwrap_or(EsploraError::Request("no sources configured".into())),
        ))
    }
}

#[async_trait]
impl UtxoProvider for EsploraProvider {
    async fn get_spendable_utxos(
        &self,
        address: &str,
        options: FetchOptions,
    ) -> Result<Vec<Utxo>, EngineError> {
        let listing = self.list_address_utxos(address).await?;
        let tip = self.tip_height().await;

        let mut utxos = Vec::with_capacity(listing.len());
        for basic in listing {
            if options.confirmed_only && !basic.status.confirmed {
                continue;
            }
            let txid = Txid::from_str(&basic.txid).map_err(|e| {
                EngineError::MalformedTransaction(format!("bad txid {}: {e}", basic.txid))
            })?;

            // The listing has no scripts; fill each entry from its parent
            // transaction. Entries that cannot be completed are skipped
            // rather than failing the whole listing.
            match self.output_from_tx(&txid, basic.vout).await {
                Ok(Some(mut utxo)) => {
                    if !options.include_ancestors {
                        utxo.ancestor = None;
                    }
                    utxo.confirmations = match (tip, basic.status.block_height) {
                        (Some(tip), Some(height)) if basic.status.confirmed => {
                            Some(tip.saturating_sub(height) as u32 + 1)
                        }
                        _ if !basic.status.confirmed => Some(0),
                        _ => None,
                    };
                    if utxo.value != basic.value {
                        warn!(
                            txid = %basic.txid,
                            vout = basic.vout,
                            listed = basic.value,
                            detailed = utxo.value,
                            "sources disagree on utxo value, keeping the detailed one"
                        );
                    }
                    utxos.push(utxo);
                }
                Ok(None) => {
                    warn!(txid = %basic.txid, vout = basic.vout, "skipping utxo with no detail");
                }
                Err(error) => {
                    warn!(txid = %basic.txid, vout = basic.vout, %error, "skipping utxo after fetch failure");
                }
            }
        }

        info!(address, count = utxos.len(), "spendable utxos assembled");
        Ok(utxos)
    }

    async fn get_specific_utxo(
        &self,
        txid: &Txid,
        vout: u32,
    ) -> Result<Option<Utxo>, EngineError> {
        self.output_from_tx(txid, vout).await
    }

    async fn get_raw_transaction_hex(
        &self,
        txid: &Txid,
    ) -> Result<Option<String>, EngineError> {
        {
            let cache = self.raw_tx_cache.lock().await;
            if let Some(cached) = cache.get(txid) {
                debug!(%txid, hit = cached.is_some(), "raw tx cache hit");
                return Ok(cached.clone());
            }
        }

        let mut result: Option<String> = None;
        let mut last_error: Option<EsploraError> = None;
        let mut found_absent = false;
        for base in self.bases() {
            match self.get_text(&format!("{base}/tx/{txid}/hex")).await {
                Ok(hex) => {
                    result = Some(hex.trim().to_string());
                    break;
                }
                Err(error) if error.not_found() => {
                    found_absent = true;
                }
                Err(error) => {
                    warn!(%txid, base, %error, "raw tx fetch failed, trying next source");
                    last_error = Some(error);
                }
            }
        }

        if result.is_none() && !found_absent {
            if let Some(error) = last_error {
                return Err(fetch_failure("tx/hex", &error));
            }
        }

        self.raw_tx_cache
            .lock()
            .await
            .insert(*txid, result.clone());
        Ok(result)
    }
}
