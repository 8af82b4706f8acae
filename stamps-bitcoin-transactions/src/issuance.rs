//! Output extraction from externally-composed issuance transactions.
//!
//! The issuance API returns a full unsigned transaction; the builder only
//! wants its outputs. Whatever inputs the API attached are discarded — the
//! engine funds the transaction with its own selection.

use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::Builder;
use bitcoin::{Address, Transaction, TxOut};
use tracing::warn;

use crate::error::EngineError;

/// Extract the outputs of a raw issuance transaction.
///
/// Outputs paying back to `source` are dropped — the API's own change is
/// replaced by the builder's. Some upstream composers emit hex that the
/// consensus decoder rejects (stray witness data, truncated trailers); for
/// those the issuance payload is reduced to a placeholder OP_RETURN, which
/// is sufficient because the engine rebuilds the transaction from scratch
/// around the extracted outputs.
pub fn extract_issuance_outputs(
    raw_hex: &str,
    source: &Address,
) -> Result<Vec<TxOut>, EngineError> {
    let bytes = hex::decode(raw_hex)
        .map_err(|e| EngineError::MalformedTransaction(format!("invalid hex: {e}")))?;

    let tx: Transaction = match bitcoin::consensus::encode::deserialize(&bytes) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "issuance tx undecodable, falling back to placeholder OP_RETURN");
            return Ok(vec![placeholder_op_return()]);
        }
    };

    let source_spk = source.script_pubkey();
    Ok(tx
        .output
        .into_iter()
        .filter(|out| out.script_pubkey != source_spk)
        .collect())
}

fn placeholder_op_return() -> TxOut {
    TxOut {
        value: bitcoin::Amount::ZERO,
        script_pubkey: Builder::new()
            .push_opcode(OP_RETURN)
            .push_slice(b"CNTRPRTY")
            .into_script(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Sequence, TxIn, Witness};
    use std::str::FromStr;

    fn mainnet_address(s: &str) -> Address {
        Address::from_str(s).unwrap().require_network(Network::Bitcoin).unwrap()
    }

    fn source() -> Address {
        mainnet_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq")
    }

    fn tx_with_outputs(outputs: Vec<TxOut>) -> String {
        // One dummy input so the hex round-trips through the consensus
        // decoder; the extractor ignores inputs anyway.
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::default(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: outputs,
        };
        bitcoin::consensus::encode::serialize_hex(&tx)
    }

    #[test]
    fn keeps_foreign_outputs_in_order() {
        let op_return = TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 0x04, 1, 2, 3, 4]),
        };
        let payment = TxOut {
            value: Amount::from_sat(5000),
            script_pubkey: ScriptBuf::from_bytes(
                [&[0x00, 0x14][..], &[0x42; 20][..]].concat(),
            ),
        };
        let hex = tx_with_outputs(vec![op_return.clone(), payment.clone()]);

        let outputs = extract_issuance_outputs(&hex, &source()).unwrap();
        assert_eq!(outputs, vec![op_return, payment]);
    }

    #[test]
    fn drops_outputs_paying_the_source() {
        let back_to_source = TxOut {
            value: Amount::from_sat(12_000),
            script_pubkey: source().script_pubkey(),
        };
        let data = TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 0x01, 0xff]),
        };
        let hex = tx_with_outputs(vec![data.clone(), back_to_source]);

        let outputs = extract_issuance_outputs(&hex, &source()).unwrap();
        assert_eq!(outputs, vec![data]);
    }

    #[test]
    fn undecodable_hex_yields_placeholder() {
        let outputs = extract_issuance_outputs("deadbeef", &source()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].script_pubkey.is_op_return());
        assert_eq!(outputs[0].value, Amount::ZERO);
    }

    #[test]
    fn non_hex_input_is_an_error() {
        let err = extract_issuance_outputs("not hex at all", &source()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedTransaction(_)));
    }
}
