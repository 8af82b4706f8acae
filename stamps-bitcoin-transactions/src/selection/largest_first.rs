//! Largest first: deterministic greedy fallback. Runs last so the engine
//! never fails while the balance actually covers the target.

use crate::script_type::ScriptType;
use crate::utxo::{SelectionResult, Utxo};

use super::{fee_for, SelectionStrategy, StrategyContext};

pub(crate) struct LargestFirst;

impl SelectionStrategy for LargestFirst {
    fn name(&self) -> &'static str {
        "Largest First"
    }

    fn attempt(&self, ctx: &StrategyContext<'_>) -> Option<SelectionResult> {
        let mut sorted: Vec<&Utxo> = ctx.utxos.iter().collect();
        sorted.sort_by(|a, b| b.value.cmp(&a.value));

        let mut picked: Vec<&Utxo> = Vec::new();
        let mut total = 0u64;

        for utxo in sorted {
            picked.push(utxo);
            total += utxo.value;

            let input_types: Vec<ScriptType> = picked.iter().map(|u| u.script_type).collect();
            let fee = fee_for(&input_types, ctx.output_kinds, ctx.fee_rate);
            let needed = ctx.target + fee;
            if total < needed {
                continue;
            }

            let mut change = total - needed;
            if change < ctx.options.dust_threshold {
                change = 0;
            }
            return Some(SelectionResult {
                inputs: picked.iter().map(|u| (*u).clone()).collect(),
                fee,
                change,
                waste: 0.0,
                algorithm: "Largest First",
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_rate::FeeRate;
    use crate::selection::SelectionOptions;
    use crate::size::OutputKind;
    use crate::utxo::test_util::make_utxo;

    #[test]
    fn accumulates_descending_until_covered() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![
            make_utxo(1, 10_000),
            make_utxo(2, 60_000),
            make_utxo(3, 30_000),
        ];
        let c = StrategyContext {
            utxos: &utxos,
            output_kinds: &kinds,
            target: 75_000,
            fee_rate: FeeRate::try_from(1.0).unwrap(),
            options: &options,
        };

        let result = LargestFirst.attempt(&c).unwrap();
        let values: Vec<u64> = result.inputs.iter().map(|u| u.value).collect();
        assert_eq!(values, vec![60_000, 30_000]);
        assert!(result.total_input_value() >= 75_000 + result.fee);
    }

    #[test]
    fn none_when_total_balance_is_short() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![make_utxo(1, 10_000)];
        let c = StrategyContext {
            utxos: &utxos,
            output_kinds: &kinds,
            target: 75_000,
            fee_rate: FeeRate::try_from(1.0).unwrap(),
            options: &options,
        };

        assert!(LargestFirst.attempt(&c).is_none());
    }
}
