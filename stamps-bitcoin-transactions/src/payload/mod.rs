//! Payload framing, keystreaming and chunking.
//!
//! A payload travels through three steps before it becomes outputs:
//! framing (marker + length + zero padding), keystream encryption (RC4 keyed
//! by the first selected input's txid, passed in as a
//! [`KeystreamSeed`](crate::utxo::KeystreamSeed)), and chunking into
//! script-sized segments. Selection must therefore complete before encoding
//! begins; the seed value is the only thing the two components share.

use crate::constants::{MULTISIG_CHUNK_SIZE, STAMP_MARKER};
use crate::error::EngineError;
use crate::utxo::KeystreamSeed;

pub mod cip33;
pub mod multisig;
mod rc4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Run a payload through an optional compressor, keeping the compressed form
/// only when it is actually smaller.
///
/// The codec is the caller's business (the protocol tolerates either form on
/// decode); this helper just guarantees compression never inflates the
/// on-chain footprint.
pub fn compact_payload<F>(payload: &[u8], compress: F) -> Vec<u8>
where
    F: Fn(&[u8]) -> Option<Vec<u8>>,
{
    match compress(payload) {
        Some(compressed) if compressed.len() < payload.len() => compressed,
        _ => payload.to_vec(),
    }
}

/// Frame a payload without padding: 6-byte marker, 2-byte big-endian payload
/// length, the payload itself. The fake-P2WSH path consumes this directly
/// (its chunker pads to its own 32-byte units).
pub fn frame_raw(payload: &[u8]) -> Result<Vec<u8>, EngineError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EngineError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut framed =
        Vec::with_capacity(STAMP_MARKER.len() + 2 + payload.len() + MULTISIG_CHUNK_SIZE);
    framed.extend_from_slice(STAMP_MARKER);
    framed.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Frame a payload for the multisig path: [`frame_raw`] zero-padded to the
/// next 62-byte boundary.
///
/// An empty payload frames fine (the frame is pure marker and padding);
/// whether zero data is acceptable is the caller's decision.
pub fn frame(payload: &[u8]) -> Result<Vec<u8>, EngineError> {
    let mut framed = frame_raw(payload)?;
    let rem = framed.len() % MULTISIG_CHUNK_SIZE;
    if rem != 0 {
        framed.resize(framed.len() + (MULTISIG_CHUNK_SIZE - rem), 0);
    }
    Ok(framed)
}

/// Recover the payload from a frame: strip the marker, read the length,
/// drop the padding. Returns `None` when the marker or length is wrong.
pub fn unframe(framed: &[u8]) -> Option<Vec<u8>> {
    let body = framed.strip_prefix(STAMP_MARKER.as_slice())?;
    let (len_bytes, rest) = body.split_first_chunk::<2>()?;
    let len = u16::from_be_bytes(*len_bytes) as usize;
    if rest.len() < len {
        return None;
    }
    Some(rest[..len].to_vec())
}

/// Apply the payload keystream. RC4 is symmetric, so the same call decrypts.
pub fn encrypt(framed: &[u8], seed: &KeystreamSeed) -> Vec<u8> {
    rc4::rc4(seed.as_bytes(), framed)
}

/// Split a ciphertext into 62-byte chunks, zero-padding the tail. Framing
/// already pads to the boundary, so the tail padding only triggers for
/// callers chunking unframed data.
pub fn chunk(cipher: &[u8]) -> Vec<[u8; MULTISIG_CHUNK_SIZE]> {
    cipher
        .chunks(MULTISIG_CHUNK_SIZE)
        .map(|c| {
            let mut chunk = [0u8; MULTISIG_CHUNK_SIZE];
            chunk[..c.len()].copy_from_slice(c);
            chunk
        })
        .collect()
}
