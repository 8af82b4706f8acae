use thiserror::Error;

/// Errors surfaced by the transaction engine.
///
/// Individual selection-strategy failures are absorbed by the orchestrator
/// and only become [`EngineError::InsufficientFunds`] once every strategy has
/// failed. Everything else propagates to the caller with enough context to
/// reproduce the request; nothing is retried inside the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A source, destination, change or service-fee address failed to parse
    /// for the configured network.
    #[error(
        "invalid {role} address `{address}`: {reason}; \
         supported formats are base58 (P2PKH/P2SH) and bech32 (P2WPKH/P2WSH/P2TR)"
    )]
    InvalidAddress {
        role: &'static str,
        address: String,
        reason: String,
    },

    /// The configured per-output dust value is outside `[1, 332] ∪ {333}`.
    #[error("invalid per-output value {value}: must be between 1 and 332 sats, or exactly 333")]
    InvalidOutputValue { value: u64 },

    /// No selection strategy covered the target, or the final fee pass made
    /// change negative.
    #[error(
        "insufficient funds: {available} sats spendable, {required} sats required \
         ({target} target + ~{fee} fee) at {fee_rate} sat/vB"
    )]
    InsufficientFunds {
        available: u64,
        required: u64,
        target: u64,
        fee: u64,
        fee_rate: f64,
    },

    /// A selected UTXO arrived without its scriptPubKey.
    #[error("selected utxo {outpoint} is missing its scriptPubKey")]
    MissingScriptData { outpoint: String },

    /// A non-witness input needs its full parent transaction attached and the
    /// provider could not supply it.
    #[error("raw transaction {txid} unavailable; required to attach a non-witness input")]
    RawTransactionUnavailable { txid: String },

    /// Key grinding exhausted its retry budget while encoding a data chunk.
    #[error("payload encoding failed: no valid key material for chunk {chunk} after {attempts} attempts")]
    PayloadEncodingFailure { chunk: usize, attempts: u32 },

    /// The framed payload does not fit the 16-bit length field.
    #[error("payload of {len} bytes exceeds the frameable maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// A provider or external API call failed.
    #[error("external fetch failed ({endpoint}): {reason}")]
    ExternalFetchFailure { endpoint: String, reason: String },

    /// A fee rate was non-positive or non-finite.
    #[error("fee rate {0} sat/vB is not a positive finite number")]
    InvalidFeeRate(f64),

    /// Raw transaction hex from an external API could not be decoded.
    #[error("transaction decode failed: {0}")]
    MalformedTransaction(String),
}
