//! Protocol and policy constants used across the engine.
//!
//! Dust values and chunk sizes come from the stamps embedding conventions;
//! selection bounds mirror the coin-selection policy defaults.

/// Minimum change value the selection engine will leave as a change output.
/// Smaller positive remainders are folded into the miner fee.
pub const DUST_LIMIT: u64 = 546;

/// Weight applied to the future cost of spending a change output when
/// scoring a selection's waste. Avoiding change is worth roughly half an
/// input's future spend cost.
pub const CHANGE_COST_WEIGHT: f64 = 0.5;

/// Fee rate (sat/vB) assumed when estimating the future cost of spending
/// selected inputs and change in the waste metric.
pub const DEFAULT_LONG_TERM_FEE_RATE: f64 = 10.0;

/// ASCII marker prepended to every embedded payload.
pub const STAMP_MARKER: &[u8; 6] = b"stamp:";

/// Chunk size for the bare-multisig embedding path. Each chunk splits into
/// two 31-byte key payloads.
pub const MULTISIG_CHUNK_SIZE: usize = 62;

/// Unit size for the fake-P2WSH embedding path: one witness-v0 program per
/// 32 data bytes.
pub const P2WSH_CHUNK_SIZE: usize = 32;

/// Default satoshi value carried by each data-chunk output.
pub const DEFAULT_OUTPUT_VALUE: u64 = 333;

/// Upper bound of the continuous valid per-output value range. Values in
/// `1..=332` are accepted, as is exactly [`DEFAULT_OUTPUT_VALUE`].
pub const MAX_CONTINUOUS_OUTPUT_VALUE: u64 = 332;

/// Per-output values below this threshold switch size estimation to the
/// reduced ("MARA") profile. Operator convention, not a protocol rule.
pub const REDUCED_PROFILE_THRESHOLD: u64 = 330;

/// Default value of the recipient output on embedding transactions.
pub const RECIPIENT_DUST: u64 = 789;

/// Default value of each bare-multisig data output.
pub const MULTISIG_DUST: u64 = 809;

/// Change below this amount is folded into the fee by the builder.
pub const CHANGE_DUST: u64 = 1000;

/// Constant third key completing each bare-multisig data output.
pub const THIRD_PUBKEY: [u8; 33] = [0x02; 33];

/// Serialized transaction overhead (version, in/out counts, locktime) in
/// vbytes, as assumed by the size estimator.
pub const TX_BASE_VSIZE: usize = 10;

/// Branch-and-bound search budget.
pub const BNB_MAX_TRIES: usize = 100_000;

/// Knapsack only considers this many of the largest spendable UTXOs.
pub const KNAPSACK_MAX_UTXOS: usize = 50;

/// Default number of shuffled draws attempted by single random draw.
pub const DEFAULT_SRD_MAX_TRIES: usize = 1000;

/// Attempts to grind a valid compressed pubkey out of one 31-byte data half
/// before giving up. Each attempt succeeds with probability ~1/2, so this
/// bound is unreachable for practical purposes while keeping the loop finite.
pub const MAX_KEY_GRIND_ATTEMPTS: u32 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_pubkey_matches_protocol_constant() {
        assert_eq!(
            hex::encode(THIRD_PUBKEY),
            "020202020202020202020202020202020202020202020202020202020202020202"
        );
    }
}
