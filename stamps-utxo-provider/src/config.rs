use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Endpoints and limits for the HTTP provider.
///
/// The defaults point at the public Esplora-compatible APIs the explorer
/// runs against in production; self-hosted instances just swap the URLs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub network: Network,
    /// Tried first for every call.
    pub primary_url: String,
    /// Tried when the primary errors or lacks the data.
    pub fallback_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::for_network(Network::Bitcoin)
    }
}

impl ProviderConfig {
    pub fn for_network(network: Network) -> Self {
        let (primary_url, fallback_url) = match network {
            Network::Testnet => (
                "https://mempool.space/testnet/api".to_string(),
                "https://blockstream.info/testnet/api".to_string(),
            ),
            _ => (
                "https://mempool.space/api".to_string(),
                "https://blockstream.info/api".to_string(),
            ),
        };
        ProviderConfig {
            network,
            primary_url,
            fallback_url,
            timeout_secs: 10,
        }
    }
}
