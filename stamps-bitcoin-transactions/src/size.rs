//! Virtual-size estimation.
//!
//! Pure arithmetic over script-type lists; the caller is responsible for
//! passing the input and output types it actually intends to use. Fees are
//! derived from the estimate through [`FeeRate::fee`](crate::fee_rate::FeeRate::fee),
//! which rounds up.

use crate::constants::{P2WSH_CHUNK_SIZE, REDUCED_PROFILE_THRESHOLD, TX_BASE_VSIZE};
use crate::script_type::ScriptType;

/// One output in a size estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// A value-bearing output paying to a script of the given type.
    Pay(ScriptType),
    /// A data-chunk output of the given type, subject to the active
    /// [`SizeProfile`]'s data-output assumption.
    Data(ScriptType),
    /// An OP_RETURN carrying `data_len` payload bytes.
    OpReturn { data_len: usize },
    /// A nonstandard output sized from its literal scriptPubKey length
    /// (bare multisig data outputs land here).
    Raw { spk_len: usize },
}

/// Bytes a varint occupies for the value `n`.
const fn varint_len(n: usize) -> usize {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x10000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Output-size assumptions for one estimate.
///
/// The reduced profile exists for operators that mine their own embedding
/// transactions with a lower per-output dust value and correspondingly
/// tighter size accounting. Both the threshold and the reduced size are
/// conventions, not protocol rules, so they are plain configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeProfile {
    /// Overrides the per-type size of [`OutputKind::Data`] outputs when set.
    pub data_output_vsize: Option<usize>,
}

impl SizeProfile {
    /// Standard sizing: data outputs cost the same as a payment of their type.
    pub const STANDARD: SizeProfile = SizeProfile {
        data_output_vsize: None,
    };

    /// Reduced sizing used below the operator dust threshold.
    pub const REDUCED: SizeProfile = SizeProfile {
        data_output_vsize: Some(34),
    };

    /// Select the profile for a configured per-output dust value.
    pub fn for_output_value(per_output_value: u64) -> SizeProfile {
        if per_output_value < REDUCED_PROFILE_THRESHOLD {
            SizeProfile::REDUCED
        } else {
            SizeProfile::STANDARD
        }
    }
}

impl OutputKind {
    fn vsize(&self, profile: SizeProfile) -> usize {
        match self {
            OutputKind::Pay(ty) => ty.output_vsize(),
            OutputKind::Data(ty) => profile
                .data_output_vsize
                .unwrap_or_else(|| ty.output_vsize()),
            // 8-byte value + script len varint + OP_RETURN + pushdata byte.
            OutputKind::OpReturn { data_len } => 11 + data_len,
            OutputKind::Raw { spk_len } => 8 + varint_len(*spk_len) + spk_len,
        }
    }
}

/// Estimate the virtual size of a transaction spending `inputs` into
/// `outputs`, optionally with a P2WPKH change output appended.
pub fn estimate_vsize(
    inputs: &[ScriptType],
    outputs: &[OutputKind],
    include_change: bool,
    profile: SizeProfile,
) -> usize {
    let mut vsize = TX_BASE_VSIZE;
    for input in inputs {
        vsize += input.input_vsize();
    }
    for output in outputs {
        vsize += output.vsize(profile);
    }
    if include_change {
        vsize += ScriptType::P2wpkh.output_vsize();
    }
    vsize
}

/// Number of data-chunk outputs a file of `len` bytes occupies on the
/// fake-P2WSH path: one output per 32-byte unit.
pub fn chunk_count_for_len(len: usize) -> usize {
    len.div_ceil(P2WSH_CHUNK_SIZE)
}

/// Total dust locked by embedding `len` bytes at `per_output_value` sats per
/// data output.
pub fn dust_for_len(len: usize, per_output_value: u64) -> u64 {
    chunk_count_for_len(len) as u64 * per_output_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_rate::FeeRate;

    #[test]
    fn single_p2wpkh_spend_with_change() {
        let vsize = estimate_vsize(
            &[ScriptType::P2wpkh],
            &[OutputKind::Pay(ScriptType::P2wpkh)],
            true,
            SizeProfile::STANDARD,
        );
        // 10 base + 68 input + 31 output + 31 change
        assert_eq!(vsize, 140);
    }

    #[test]
    fn mixed_input_types_accumulate() {
        let vsize = estimate_vsize(
            &[ScriptType::P2pkh, ScriptType::P2tr],
            &[OutputKind::Pay(ScriptType::P2sh)],
            false,
            SizeProfile::STANDARD,
        );
        assert_eq!(vsize, 10 + 148 + 58 + 32);
    }

    #[test]
    fn op_return_size_scales_with_payload() {
        let small = estimate_vsize(
            &[],
            &[OutputKind::OpReturn { data_len: 0 }],
            false,
            SizeProfile::STANDARD,
        );
        let large = estimate_vsize(
            &[],
            &[OutputKind::OpReturn { data_len: 80 }],
            false,
            SizeProfile::STANDARD,
        );
        assert_eq!(large - small, 80);
    }

    #[test]
    fn raw_outputs_are_sized_from_their_script_length() {
        // A bare 1-of-3 multisig data output: 105-byte script.
        let vsize = estimate_vsize(
            &[],
            &[OutputKind::Raw { spk_len: 105 }],
            false,
            SizeProfile::STANDARD,
        );
        assert_eq!(vsize, 10 + 8 + 1 + 105);
    }

    #[test]
    fn reduced_profile_shrinks_data_outputs_only() {
        let outputs = [
            OutputKind::Pay(ScriptType::P2wpkh),
            OutputKind::Data(ScriptType::P2wsh),
        ];
        let standard = estimate_vsize(&[], &outputs, false, SizeProfile::STANDARD);
        let reduced = estimate_vsize(&[], &outputs, false, SizeProfile::REDUCED);
        assert_eq!(standard - reduced, 43 - 34);
    }

    #[test]
    fn profile_selection_follows_threshold() {
        assert_eq!(SizeProfile::for_output_value(329), SizeProfile::REDUCED);
        assert_eq!(SizeProfile::for_output_value(330), SizeProfile::STANDARD);
        assert_eq!(SizeProfile::for_output_value(333), SizeProfile::STANDARD);
    }

    #[test]
    fn chunk_counts_per_32_byte_unit() {
        assert_eq!(chunk_count_for_len(0), 0);
        assert_eq!(chunk_count_for_len(1), 1);
        assert_eq!(chunk_count_for_len(32), 1);
        assert_eq!(chunk_count_for_len(33), 2);
        assert_eq!(chunk_count_for_len(1024), 32);
    }

    #[test]
    fn dust_is_chunks_times_output_value() {
        assert_eq!(dust_for_len(64, 333), 666);
        assert_eq!(dust_for_len(65, 333), 999);
        assert_eq!(dust_for_len(0, 333), 0);
    }

    #[test]
    fn fee_from_estimate_rounds_up() {
        let vsize = estimate_vsize(
            &[ScriptType::P2wpkh],
            &[OutputKind::Pay(ScriptType::P2wpkh)],
            true,
            SizeProfile::STANDARD,
        );
        assert_eq!(vsize, 140);
        let fee = FeeRate::try_from(1.1).unwrap().fee(vsize).to_sat();
        // 140 * 1.1 sits just above 154 in binary floating point; the
        // ceiling never lets the estimate under-pay.
        assert_eq!(fee, 155);
    }
}
