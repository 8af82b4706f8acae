//! Core value types: UTXOs, requested outputs and selection results.

use bitcoin::hashes::Hash;
use bitcoin::{Address, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

use crate::script_type::ScriptType;
use crate::size::OutputKind;

/// Mempool ancestry of an unconfirmed UTXO's parent transaction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AncestorInfo {
    /// Fees already paid by the ancestor package, in sats.
    pub fees: u64,
    /// Virtual size of the ancestor package.
    pub vsize: u64,
    /// Package fee rate in sat/vB.
    pub effective_fee_rate: f64,
}

/// A spendable prior output.
///
/// Immutable once fetched; owned exclusively by the selection call that
/// consumes it. There is no shared UTXO registry in this engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    /// Value in satoshis. Never a floating-point quantity.
    pub value: u64,
    /// The output's scriptPubKey. May be empty when the upstream source only
    /// returned a basic listing; the builder rejects such inputs at attach
    /// time with `MissingScriptData`.
    pub script: ScriptBuf,
    pub script_type: ScriptType,
    pub ancestor: Option<AncestorInfo>,
    pub confirmations: Option<u32>,
}

impl Utxo {
    /// A UTXO with only outpoint, value and script known.
    pub fn new(txid: Txid, vout: u32, value: u64, script: ScriptBuf) -> Self {
        let script_type = ScriptType::from_script(&script);
        Utxo {
            txid,
            vout,
            value,
            script,
            script_type,
            ancestor: None,
            confirmations: None,
        }
    }

    /// `txid:vout`, the conventional outpoint notation.
    pub fn outpoint_str(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }
}

impl PartialEq for Utxo {
    fn eq(&self, other: &Self) -> bool {
        self.txid == other.txid && self.vout == other.vout
    }
}

impl Eq for Utxo {}

impl std::fmt::Display for Utxo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Where a requested output pays to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    Address(Address),
    Script(ScriptBuf),
}

/// What role an output plays in the assembled transaction. Change is
/// synthesized by the builder and never supplied by callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    Recipient,
    DataChunk,
    ServiceFee,
    Change,
}

/// An output the caller wants in the final transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestedOutput {
    pub value: u64,
    pub target: OutputTarget,
    pub role: OutputRole,
}

impl RequestedOutput {
    pub fn to_address(address: Address, value: u64, role: OutputRole) -> Self {
        RequestedOutput {
            value,
            target: OutputTarget::Address(address),
            role,
        }
    }

    pub fn to_script(script: ScriptBuf, value: u64, role: OutputRole) -> Self {
        RequestedOutput {
            value,
            target: OutputTarget::Script(script),
            role,
        }
    }

    /// The concrete scriptPubKey this output pays to.
    pub fn script_pubkey(&self) -> ScriptBuf {
        match &self.target {
            OutputTarget::Address(address) => address.script_pubkey(),
            OutputTarget::Script(script) => script.clone(),
        }
    }

    /// How this output counts toward a size estimate.
    pub fn output_kind(&self) -> OutputKind {
        let spk = self.script_pubkey();
        if spk.is_op_return() {
            return OutputKind::OpReturn {
                data_len: spk.len().saturating_sub(2),
            };
        }
        let ty = ScriptType::from_script(&spk);
        if ty == ScriptType::Unknown {
            return OutputKind::Raw { spk_len: spk.len() };
        }
        match self.role {
            OutputRole::DataChunk => OutputKind::Data(ty),
            _ => OutputKind::Pay(ty),
        }
    }
}

/// Seed for the payload keystream: the big-endian bytes of the first
/// selected input's txid.
///
/// Selection produces it, chunking consumes it. Passing it as a value keeps
/// the ordering dependency between the two components explicit without
/// letting the chunker reach into selection internals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeystreamSeed([u8; 32]);

impl KeystreamSeed {
    /// Derive the seed from a txid, using its display (big-endian) byte
    /// order — the same bytes a hex-encoded txid string decodes to.
    pub fn from_txid(txid: &Txid) -> Self {
        let mut bytes = txid.to_byte_array();
        bytes.reverse();
        KeystreamSeed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Outcome of a successful coin selection.
#[derive(Clone, Debug)]
pub struct SelectionResult {
    /// Chosen inputs, in selection order. The first input's txid seeds the
    /// payload keystream.
    pub inputs: Vec<Utxo>,
    /// Fee implied by this selection at the requested rate.
    pub fee: u64,
    /// Leftover value returned to the sender. Zero, or at least the dust
    /// threshold — never in between.
    pub change: u64,
    /// Waste score used to rank strategies; lower is better.
    pub waste: f64,
    /// Name of the strategy that produced this result.
    pub algorithm: &'static str,
}

impl SelectionResult {
    pub fn total_input_value(&self) -> u64 {
        self.inputs.iter().map(|u| u.value).sum()
    }

    /// Keystream seed derived from the first selected input, if any.
    pub fn keystream_seed(&self) -> Option<KeystreamSeed> {
        self.inputs.first().map(|u| KeystreamSeed::from_txid(&u.txid))
    }
}
