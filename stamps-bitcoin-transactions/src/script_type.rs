use bitcoin::Script;
use serde::{Deserialize, Serialize};

/// Output script families the engine can estimate sizes for.
///
/// `P2sh` is treated as a wrapped-witness spend throughout (the common case
/// for wallets this engine serves); a bare P2SH spend would be larger, but
/// its scriptPubKey is indistinguishable and the wrapped assumption matches
/// the upstream data sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    Unknown,
}

impl ScriptType {
    /// Classify a scriptPubKey.
    pub fn from_script(script: &Script) -> Self {
        if script.is_p2pkh() {
            ScriptType::P2pkh
        } else if script.is_p2sh() {
            ScriptType::P2sh
        } else if script.is_p2wpkh() {
            ScriptType::P2wpkh
        } else if script.is_p2wsh() {
            ScriptType::P2wsh
        } else if script.is_p2tr() {
            ScriptType::P2tr
        } else {
            ScriptType::Unknown
        }
    }

    /// Virtual size contributed by spending an output of this type,
    /// witness discount already applied. Unknown types assume P2WPKH.
    pub fn input_vsize(&self) -> usize {
        match self {
            ScriptType::P2pkh => 148,
            ScriptType::P2sh => 91,
            ScriptType::P2wpkh => 68,
            ScriptType::P2wsh => 104,
            ScriptType::P2tr => 58,
            ScriptType::Unknown => 68,
        }
    }

    /// Virtual size of an output paying to this script type.
    pub fn output_vsize(&self) -> usize {
        match self {
            ScriptType::P2pkh => 34,
            ScriptType::P2sh => 32,
            ScriptType::P2wpkh => 31,
            ScriptType::P2wsh => 43,
            ScriptType::P2tr => 43,
            ScriptType::Unknown => 31,
        }
    }

    /// Network dust limit for an output of this type.
    pub fn dust_limit(&self) -> u64 {
        match self {
            ScriptType::P2pkh => 546,
            ScriptType::P2sh => 540,
            ScriptType::P2wpkh => 294,
            ScriptType::P2wsh | ScriptType::P2tr => 330,
            ScriptType::Unknown => 546,
        }
    }

    /// Whether an input of this type is satisfied with witness data.
    pub fn is_witness(&self) -> bool {
        matches!(
            self,
            ScriptType::P2wpkh | ScriptType::P2wsh | ScriptType::P2tr
        )
    }

    /// Whether the builder attaches a witness UTXO for this input instead of
    /// fetching the full parent transaction. True for native witness types
    /// and for P2SH, which is assumed to wrap a witness program.
    pub fn attaches_witness(&self) -> bool {
        self.is_witness() || matches!(self, ScriptType::P2sh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::ScriptBuf;

    fn script_of(hex: &str) -> ScriptBuf {
        ScriptBuf::from_bytes(hex::decode(hex).unwrap())
    }

    #[test]
    fn classifies_standard_script_pubkeys() {
        // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
        let p2pkh = script_of(&format!("76a914{}88ac", "11".repeat(20)));
        assert_eq!(ScriptType::from_script(&p2pkh), ScriptType::P2pkh);

        // OP_HASH160 <20> OP_EQUAL
        let p2sh = script_of(&format!("a914{}87", "22".repeat(20)));
        assert_eq!(ScriptType::from_script(&p2sh), ScriptType::P2sh);

        // OP_0 <20>
        let p2wpkh = script_of(&format!("0014{}", "33".repeat(20)));
        assert_eq!(ScriptType::from_script(&p2wpkh), ScriptType::P2wpkh);

        // OP_0 <32>
        let p2wsh = script_of(&format!("0020{}", "44".repeat(32)));
        assert_eq!(ScriptType::from_script(&p2wsh), ScriptType::P2wsh);

        // OP_1 <32>
        let p2tr = script_of(&format!("5120{}", "55".repeat(32)));
        assert_eq!(ScriptType::from_script(&p2tr), ScriptType::P2tr);

        let bare_multisig = script_of("51ae");
        assert_eq!(ScriptType::from_script(&bare_multisig), ScriptType::Unknown);
    }

    #[test]
    fn input_sizes_follow_witness_discount() {
        assert_eq!(ScriptType::P2pkh.input_vsize(), 148);
        assert_eq!(ScriptType::P2wpkh.input_vsize(), 68);
        assert_eq!(ScriptType::P2sh.input_vsize(), 91);
        assert_eq!(ScriptType::P2wsh.input_vsize(), 104);
        assert_eq!(ScriptType::P2tr.input_vsize(), 58);
        // Unknown falls back to the P2WPKH assumption.
        assert_eq!(ScriptType::Unknown.input_vsize(), 68);
    }

    #[test]
    fn dust_limits_follow_output_cost() {
        // Witness outputs are cheaper to spend, so their dust floor is lower.
        assert!(ScriptType::P2wpkh.dust_limit() < ScriptType::P2pkh.dust_limit());
        assert_eq!(ScriptType::P2pkh.dust_limit(), 546);
        assert_eq!(ScriptType::P2wpkh.dust_limit(), 294);
        assert_eq!(ScriptType::P2wsh.dust_limit(), 330);
    }

    #[test]
    fn p2sh_attaches_witness_but_is_not_native_witness() {
        assert!(ScriptType::P2sh.attaches_witness());
        assert!(!ScriptType::P2sh.is_witness());
        assert!(ScriptType::P2tr.attaches_witness());
        assert!(!ScriptType::P2pkh.attaches_witness());
    }
}
