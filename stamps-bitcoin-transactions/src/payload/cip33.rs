//! Fake-P2WSH embedding: the modern path. Data is cut into 32-byte units and
//! each unit becomes the witness program of a P2WSH-shaped output. The
//! "script hash" is raw payload, so the outputs are unspendable by design and
//! carry the minimum dust value the caller configures.

use bitcoin::{Address, Network, ScriptBuf};

use crate::constants::P2WSH_CHUNK_SIZE;

/// Split data into 32-byte witness programs, zero-padding the last unit.
pub fn witness_programs(data: &[u8]) -> Vec<[u8; P2WSH_CHUNK_SIZE]> {
    data.chunks(P2WSH_CHUNK_SIZE)
        .map(|unit| {
            let mut program = [0u8; P2WSH_CHUNK_SIZE];
            program[..unit.len()].copy_from_slice(unit);
            program
        })
        .collect()
}

/// Fake P2WSH scriptPubKeys carrying `data`, one per 32-byte unit.
pub fn data_scripts(data: &[u8]) -> Vec<ScriptBuf> {
    witness_programs(data)
        .into_iter()
        .map(|program| {
            let mut spk = Vec::with_capacity(2 + P2WSH_CHUNK_SIZE);
            spk.push(0x00); // witness v0
            spk.push(P2WSH_CHUNK_SIZE as u8);
            spk.extend_from_slice(&program);
            ScriptBuf::from_bytes(spk)
        })
        .collect()
}

/// Bech32 rendering of the fake outputs, for display and signer previews.
pub fn data_addresses(data: &[u8], network: Network) -> Vec<String> {
    data_scripts(data)
        .iter()
        .map(|spk| {
            Address::from_script(spk, network)
                .expect("a 32-byte witness-v0 program is always addressable")
                .to_string()
        })
        .collect()
}
