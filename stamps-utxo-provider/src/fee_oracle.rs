//! Recommended fee rates with a short-lived cache and static fallback.
//!
//! Sources are tried in order — mempool.space's recommended endpoint, then
//! Blockstream's estimate map, then hard-coded defaults — and the first set
//! that passes validation wins. Rates are cached for 30 seconds so bursts of
//! fee previews do not hammer the APIs.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

/// How soon the caller wants confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePriority {
    /// ~1 hour.
    Economy,
    /// ~30 minutes.
    Standard,
    /// ~10 minutes.
    Priority,
    /// Next block or two.
    Urgent,
}

/// One snapshot of recommended rates, sat/vB per priority tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeeRates {
    pub economy: f64,
    pub standard: f64,
    pub priority: f64,
    pub urgent: f64,
    /// Which source produced this snapshot.
    pub source: &'static str,
}

impl FeeRates {
    pub fn rate_for(&self, priority: FeePriority) -> f64 {
        match priority {
            FeePriority::Economy => self.economy,
            FeePriority::Standard => self.standard,
            FeePriority::Priority => self.priority,
            FeePriority::Urgent => self.urgent,
        }
    }

    /// Sanity check: every tier positive and tiers monotonically
    /// non-decreasing with urgency.
    pub fn is_valid(&self) -> bool {
        self.economy > 0.0
            && self.standard >= self.economy
            && self.priority >= self.standard
            && self.urgent >= self.priority
    }
}

/// Rates used when every live source fails.
pub const FALLBACK_RATES: FeeRates = FeeRates {
    economy: 1.0,
    standard: 5.0,
    priority: 15.0,
    urgent: 30.0,
    source: "fallback",
};

const CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct MempoolRecommended {
    #[serde(rename = "fastestFee")]
    fastest: f64,
    #[serde(rename = "halfHourFee")]
    half_hour: f64,
    #[serde(rename = "hourFee")]
    hour: f64,
}

fn rates_from_mempool(recommended: &MempoolRecommended) -> FeeRates {
    FeeRates {
        economy: recommended.hour,
        standard: recommended.half_hour,
        priority: recommended.fastest,
        urgent: (recommended.fastest * 1.5).max(FALLBACK_RATES.urgent),
        source: "mempool.space",
    }
}

fn rates_from_estimate_map(map: &serde_json::Map<String, serde_json::Value>) -> FeeRates {
    let block = |key: &str, default: f64| {
        map.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    };
    FeeRates {
        economy: block("144", FALLBACK_RATES.economy),
        standard: block("6", FALLBACK_RATES.standard),
        priority: block("3", FALLBACK_RATES.priority),
        urgent: block("1", FALLBACK_RATES.urgent),
        source: "blockstream.info",
    }
}

/// Fee-rate source with TTL caching. Never fails: the static fallback backs
/// every live source.
pub struct FeeOracle {
    client: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
    cache: Mutex<Option<(Instant, FeeRates)>>,
}

impl FeeOracle {
    pub fn new(config: ProviderConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        FeeOracle {
            client: reqwest::Client::new(),
            config,
            timeout,
            cache: Mutex::new(None),
        }
    }

    /// Current recommended rates, cached up to 30 seconds.
    pub async fn recommended(&self) -> FeeRates {
        {
            let cache = self.cache.lock().await;
            if let Some((stamp, rates)) = *cache {
                if stamp.elapsed() < CACHE_TTL {
                    debug!(source = rates.source, "fee rates served from cache");
                    return rates;
                }
            }
        }

        let rates = self.fetch_with_fallback().await;
        *self.cache.lock().await = Some((Instant::now(), rates));
        rates
    }

    /// Rate for one priority tier.
    pub async fn rate_for(&self, priority: FeePriority) -> f64 {
        self.recommended().await.rate_for(priority)
    }

    /// Drop the cached snapshot.
    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
    }

    async fn fetch_with_fallback(&self) -> FeeRates {
        match self.fetch_mempool_recommended().await {
            Ok(rates) if rates.is_valid() => return rates,
            Ok(rates) => warn!(?rates, "mempool.space rates failed validation"),
            Err(error) => warn!(%error, "mempool.space fee fetch failed"),
        }

        match self.fetch_blockstream_estimates().await {
            Ok(rates) if rates.is_valid() => return rates,
            Ok(rates) => warn!(?rates, "blockstream rates failed validation"),
            Err(error) => warn!(%error, "blockstream fee fetch failed"),
        }

        FALLBACK_RATES
    }

    async fn fetch_mempool_recommended(&self) -> Result<FeeRates, String> {
        let url = format!("{}/v1/fees/recommended", self.config.primary_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let recommended: MempoolRecommended =
            response.json().await.map_err(|e| e.to_string())?;
        Ok(rates_from_mempool(&recommended))
    }

    async fn fetch_blockstream_estimates(&self) -> Result<FeeRates, String> {
        let url = format!("{}/fee-estimates", self.config.fallback_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let map: serde_json::Map<String, serde_json::Value> =
            response.json().await.map_err(|e| e.to_string())?;
        Ok(rates_from_estimate_map(&map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rates_are_valid_and_monotonic() {
        assert!(FALLBACK_RATES.is_valid());
    }

    #[test]
    fn validation_rejects_inverted_tiers() {
        let inverted = FeeRates {
            economy: 10.0,
            standard: 5.0,
            priority: 15.0,
            urgent: 30.0,
            source: "test",
        };
        assert!(!inverted.is_valid());

        let zeroed = FeeRates {
            economy: 0.0,
            ..FALLBACK_RATES
        };
        assert!(!zeroed.is_valid());
    }

    #[test]
    fn mempool_mapping_orders_tiers() {
        let recommended: MempoolRecommended = serde_json::from_str(
            r#"{"fastestFee": 25, "halfHourFee": 12, "hourFee": 4, "economyFee": 2, "minimumFee": 1}"#,
        )
        .unwrap();
        let rates = rates_from_mempool(&recommended);
        assert_eq!(rates.economy, 4.0);
        assert_eq!(rates.standard, 12.0);
        assert_eq!(rates.priority, 25.0);
        assert!(rates.urgent >= rates.priority);
        assert!(rates.is_valid());
    }

    #[test]
    fn blockstream_mapping_reads_block_targets() {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(
            r#"{"1": 30.1, "3": 20.5, "6": 10.0, "144": 2.2, "504": 1.1}"#,
        )
        .unwrap();
        let rates = rates_from_estimate_map(&map);
        assert_eq!(rates.urgent, 30.1);
        assert_eq!(rates.priority, 20.5);
        assert_eq!(rates.standard, 10.0);
        assert_eq!(rates.economy, 2.2);
        assert!(rates.is_valid());
    }

    #[test]
    fn missing_estimate_keys_fall_back_per_tier() {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"1": 30.0}"#).unwrap();
        let rates = rates_from_estimate_map(&map);
        assert_eq!(rates.economy, FALLBACK_RATES.economy);
        assert_eq!(rates.urgent, 30.0);
    }

    #[test]
    fn rate_for_selects_the_tier() {
        assert_eq!(FALLBACK_RATES.rate_for(FeePriority::Economy), 1.0);
        assert_eq!(FALLBACK_RATES.rate_for(FeePriority::Urgent), 30.0);
    }

    #[tokio::test]
    async fn cache_round_trips_within_ttl() {
        let oracle = FeeOracle::new(ProviderConfig::default());
        *oracle.cache.lock().await = Some((Instant::now(), FALLBACK_RATES));
        let rates = oracle.recommended().await;
        assert_eq!(rates, FALLBACK_RATES);

        oracle.clear_cache().await;
        assert!(oracle.cache.lock().await.is_none());
    }
}
