//! Knapsack: bounded subset-sum aiming slightly above target plus fee, so a
//! viable change output (or none) falls out naturally.

use std::collections::BTreeMap;

use crate::constants::KNAPSACK_MAX_UTXOS;
use crate::script_type::ScriptType;
use crate::utxo::{SelectionResult, Utxo};

use super::{fee_for, SelectionStrategy, StrategyContext};

pub(crate) struct Knapsack;

impl SelectionStrategy for Knapsack {
    fn name(&self) -> &'static str {
        "Knapsack"
    }

    fn attempt(&self, ctx: &StrategyContext<'_>) -> Option<SelectionResult> {
        // Aim a little above target + fee to leave room for the change
        // output; three P2WPKH inputs is the provisional fee assumption.
        let fee_estimate = fee_for(
            &[ScriptType::P2wpkh; 3],
            ctx.output_kinds,
            ctx.fee_rate,
        );
        let aim = ctx.target + fee_estimate + 2 * ctx.options.dust_threshold;
        let cap = aim.saturating_mul(2);

        let mut sorted: Vec<&Utxo> = ctx.utxos.iter().collect();
        sorted.sort_by(|a, b| b.value.cmp(&a.value));
        sorted.truncate(KNAPSACK_MAX_UTXOS);

        let mut best: Option<(u64, Vec<usize>)> = None;
        let consider = |sum: u64, selection: &Vec<usize>, best: &mut Option<(u64, Vec<usize>)>| {
            let diff = sum.abs_diff(aim);
            if best.as_ref().map(|(d, _)| diff < *d).unwrap_or(true) {
                *best = Some((diff, selection.clone()));
            }
        };

        // Reachable sums, each with one subset realizing it.
        let mut sums: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, utxo) in sorted.iter().enumerate() {
            let mut extensions: Vec<(u64, Vec<usize>)> = Vec::new();
            for (&sum, selection) in &sums {
                let extended_sum = sum + utxo.value;
                if extended_sum > cap {
                    continue;
                }
                let mut extended = selection.clone();
                extended.push(i);
                consider(extended_sum, &extended, &mut best);
                extensions.push((extended_sum, extended));
            }
            for (sum, selection) in extensions {
                sums.entry(sum).or_insert(selection);
            }

            let single = vec![i];
            consider(utxo.value, &single, &mut best);
            sums.entry(utxo.value).or_insert(single);
        }

        let (_, picked) = best?;
        let inputs: Vec<Utxo> = picked.iter().map(|&i| sorted[i].clone()).collect();
        let input_types: Vec<ScriptType> = inputs.iter().map(|u| u.script_type).collect();
        let fee = fee_for(&input_types, ctx.output_kinds, ctx.fee_rate);
        let total: u64 = inputs.iter().map(|u| u.value).sum();

        if total < ctx.target + fee {
            return None;
        }

        let mut change = total - ctx.target - fee;
        if change < ctx.options.dust_threshold {
            change = 0;
        }

        Some(SelectionResult {
            inputs,
            fee,
            change,
            waste: 0.0,
            algorithm: "Knapsack",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_rate::FeeRate;
    use crate::selection::SelectionOptions;
    use crate::size::OutputKind;
    use crate::utxo::test_util::make_utxo;

    fn ctx<'a>(
        utxos: &'a [Utxo],
        kinds: &'a [OutputKind],
        target: u64,
        rate: f64,
        options: &'a SelectionOptions,
    ) -> StrategyContext<'a> {
        StrategyContext {
            utxos,
            output_kinds: kinds,
            target,
            fee_rate: FeeRate::try_from(rate).unwrap(),
            options,
        }
    }

    #[test]
    fn picks_subset_closest_to_target_window() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![
            make_utxo(1, 365_589),
            make_utxo(2, 107_626),
            make_utxo(3, 65_223),
        ];
        let c = ctx(&utxos, &kinds, 35_000, 1.1, &options);

        let result = Knapsack.attempt(&c).unwrap();
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.inputs[0].value, 65_223);
    }

    #[test]
    fn combines_small_utxos_when_closest() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![
            make_utxo(1, 30_000),
            make_utxo(2, 25_000),
            make_utxo(3, 400_000),
        ];
        let c = ctx(&utxos, &kinds, 50_000, 1.0, &options);

        let result = Knapsack.attempt(&c).unwrap();
        assert_eq!(result.inputs.len(), 2);
        assert_eq!(result.total_input_value(), 55_000);
    }

    #[test]
    fn returns_none_when_closest_subset_cannot_pay() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![make_utxo(1, 10_000)];
        let c = ctx(&utxos, &kinds, 50_000, 1.0, &options);

        assert!(Knapsack.attempt(&c).is_none());
    }

    #[test]
    fn sub_dust_change_folds_to_zero() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        // One UTXO, remainder after fee lands under the dust threshold.
        let utxos = vec![make_utxo(1, 20_340)];
        let c = ctx(&utxos, &kinds, 20_000, 1.0, &options);

        let result = Knapsack.attempt(&c).unwrap();
        assert_eq!(result.change, 0);
        assert!(result.total_input_value() >= 20_000 + result.fee);
    }
}
