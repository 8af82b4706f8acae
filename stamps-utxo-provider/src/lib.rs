//! HTTP-backed implementations of the transaction engine's provider
//! contracts.
//!
//! [`EsploraProvider`] satisfies
//! [`UtxoProvider`](stamps_bitcoin_transactions::UtxoProvider) against two
//! Esplora-compatible backends with transparent fallback, and [`FeeOracle`]
//! supplies recommended fee rates with a short-lived cache. The engine
//! itself never retries; everything resilient lives here.

pub mod config;
pub mod esplora;
pub mod fee_oracle;
pub mod issuance;

pub use config::ProviderConfig;
pub use esplora::EsploraProvider;
pub use fee_oracle::{FeeOracle, FeePriority, FeeRates, FALLBACK_RATES};
pub use issuance::{CounterpartyClient, IssuanceConfig};
