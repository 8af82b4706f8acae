//! Boundary contracts for external data sources.
//!
//! The engine consumes these traits and nothing else about the outside
//! world. Implementations may fan out across multiple backends, cache, or
//! retry internally — the engine performs no retries of its own and treats
//! every call as fallible.

use async_trait::async_trait;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::utxo::Utxo;

/// Knobs for a spendable-UTXO listing.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Only return outputs from confirmed transactions.
    pub confirmed_only: bool,
    /// Populate `Utxo::ancestor` for unconfirmed parents where the source
    /// can supply it.
    pub include_ancestors: bool,
}

/// Supplies spendable UTXOs and raw parent transactions.
#[async_trait]
pub trait UtxoProvider: Send + Sync {
    /// All spendable outputs of `address`.
    async fn get_spendable_utxos(
        &self,
        address: &str,
        options: FetchOptions,
    ) -> Result<Vec<Utxo>, EngineError>;

    /// A specific output with full script details, or `None` if absent.
    async fn get_specific_utxo(
        &self,
        txid: &Txid,
        vout: u32,
    ) -> Result<Option<Utxo>, EngineError>;

    /// Raw hex of a transaction, or `None` if the source does not know it.
    async fn get_raw_transaction_hex(
        &self,
        txid: &Txid,
    ) -> Result<Option<String>, EngineError>;
}

/// Parameters for composing a token-issuance message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub source: String,
    pub asset: String,
    pub quantity: u64,
    pub divisible: bool,
    pub lock: bool,
    pub description: Option<String>,
}

/// Opaque issuance/protocol API. Returns a raw unsigned transaction whose
/// outputs encode the issuance message; the builder extracts those outputs
/// and discards everything else, inputs included.
#[async_trait]
pub trait IssuanceApi: Send + Sync {
    async fn compose_issuance(&self, request: &IssuanceRequest) -> Result<String, EngineError>;
}
