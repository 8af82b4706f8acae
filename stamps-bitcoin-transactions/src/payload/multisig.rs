//! Legacy bare-multisig embedding: each 62-byte chunk becomes a multisig
//! output whose first two keys carry 31 data bytes apiece.

use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_1, OP_PUSHNUM_3};
use bitcoin::script::Builder;
use bitcoin::secp256k1::PublicKey;
use bitcoin::ScriptBuf;
use rand::Rng;

use crate::constants::{MAX_KEY_GRIND_ATTEMPTS, MULTISIG_CHUNK_SIZE, THIRD_PUBKEY};
use crate::error::EngineError;

/// Grind a compressed-pubkey encoding of a 31-byte data half.
///
/// One random byte supplies both the parity prefix (low bit selects 02/03)
/// and the trailing filler byte; the candidate must be a point on the
/// secp256k1 curve. Roughly half of all candidates are, so the bounded loop
/// terminates almost immediately in practice — the cap only guards against
/// pathological RNG behavior looping forever.
fn grind_key<R: Rng>(
    half: &[u8; 31],
    chunk_index: usize,
    rng: &mut R,
) -> Result<[u8; 33], EngineError> {
    for _ in 0..MAX_KEY_GRIND_ATTEMPTS {
        let filler: u8 = rng.gen();
        let mut candidate = [0u8; 33];
        candidate[0] = if filler & 1 == 1 { 0x02 } else { 0x03 };
        candidate[1..32].copy_from_slice(half);
        candidate[32] = filler;

        if PublicKey::from_slice(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    Err(EngineError::PayloadEncodingFailure {
        chunk: chunk_index,
        attempts: MAX_KEY_GRIND_ATTEMPTS,
    })
}

/// Build the bare-multisig scriptPubKey for one data chunk:
/// `OP_1 <data key> <data key> <constant key> OP_3 OP_CHECKMULTISIG`.
pub fn script_for_chunk<R: Rng>(
    chunk: &[u8; MULTISIG_CHUNK_SIZE],
    chunk_index: usize,
    rng: &mut R,
) -> Result<ScriptBuf, EngineError> {
    let mut first = [0u8; 31];
    let mut second = [0u8; 31];
    first.copy_from_slice(&chunk[..31]);
    second.copy_from_slice(&chunk[31..]);

    let key1 = grind_key(&first, chunk_index, rng)?;
    let key2 = grind_key(&second, chunk_index, rng)?;

    Ok(Builder::new()
        .push_opcode(OP_PUSHNUM_1)
        .push_slice(key1)
        .push_slice(key2)
        .push_slice(THIRD_PUBKEY)
        .push_opcode(OP_PUSHNUM_3)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script())
}

/// Encode every chunk of a ciphertext into multisig scripts.
pub fn data_scripts<R: Rng>(
    chunks: &[[u8; MULTISIG_CHUNK_SIZE]],
    rng: &mut R,
) -> Result<Vec<ScriptBuf>, EngineError> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| script_for_chunk(chunk, i, rng))
        .collect()
}

/// Recover the 62 data bytes from a script built by [`script_for_chunk`].
/// The layout is fixed, so the halves sit at known offsets.
#[cfg(test)]
pub(crate) fn decode_chunk(script: &ScriptBuf) -> Option<[u8; MULTISIG_CHUNK_SIZE]> {
    let bytes = script.as_bytes();
    // OP_1, then three `0x21 <33 bytes>` pushes, OP_3, OP_CHECKMULTISIG.
    if bytes.len() != 105 || bytes[0] != 0x51 {
        return None;
    }
    let mut chunk = [0u8; MULTISIG_CHUNK_SIZE];
    chunk[..31].copy_from_slice(&bytes[3..34]);
    chunk[31..].copy_from_slice(&bytes[37..68]);
    Some(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1337)
    }

    #[test]
    fn script_shape_is_one_of_three_multisig() {
        let chunk = [0x5au8; MULTISIG_CHUNK_SIZE];
        let script = script_for_chunk(&chunk, 0, &mut rng()).unwrap();
        let bytes = script.to_bytes();

        assert_eq!(bytes.len(), 105);
        assert_eq!(bytes[0], 0x51); // OP_1
        assert_eq!(bytes[1], 0x21); // 33-byte push
        assert_eq!(bytes[103], 0x53); // OP_3
        assert_eq!(bytes[104], 0xae); // OP_CHECKMULTISIG
        // Third slot carries the protocol constant.
        assert_eq!(&bytes[70..103], &THIRD_PUBKEY[..]);
    }

    #[test]
    fn generated_keys_are_valid_curve_points() {
        let chunk = [0x11u8; MULTISIG_CHUNK_SIZE];
        let script = script_for_chunk(&chunk, 0, &mut rng()).unwrap();
        let bytes = script.to_bytes();

        for offset in [2usize, 36] {
            let key = &bytes[offset..offset + 33];
            assert!(PublicKey::from_slice(key).is_ok());
        }
    }

    #[test]
    fn chunk_bytes_survive_the_encoding() {
        let mut chunk = [0u8; MULTISIG_CHUNK_SIZE];
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let script = script_for_chunk(&chunk, 0, &mut rng()).unwrap();
        assert_eq!(decode_chunk(&script).unwrap(), chunk);
    }

    #[test]
    fn every_chunk_of_a_stream_encodes() {
        let chunks: Vec<[u8; MULTISIG_CHUNK_SIZE]> = (0..8u8)
            .map(|tag| [tag.wrapping_mul(17); MULTISIG_CHUNK_SIZE])
            .collect();
        let scripts = data_scripts(&chunks, &mut rng()).unwrap();
        assert_eq!(scripts.len(), 8);
        for (script, chunk) in scripts.iter().zip(&chunks) {
            assert_eq!(&decode_chunk(script).unwrap(), chunk);
        }
    }
}
