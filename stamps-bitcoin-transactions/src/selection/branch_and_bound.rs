//! Branch and bound: bounded search for the least-wasteful covering subset,
//! exact (zero-change) matches preferred.

use tracing::debug;

use crate::constants::BNB_MAX_TRIES;
use crate::script_type::ScriptType;
use crate::utxo::{SelectionResult, Utxo};

use super::{fee_for, input_spend_cost, SelectionStrategy, StrategyContext};

pub(crate) struct BranchAndBound;

struct Candidate<'a> {
    utxo: &'a Utxo,
    spend_cost: u64,
}

#[derive(PartialEq)]
enum Outcome {
    /// Keep exploring siblings.
    Continue,
    /// An exact match was accepted under `avoid_change`; unwind.
    FoundExact,
    /// The try budget ran out; unwind.
    Budget,
}

struct Search<'a, 'c> {
    entries: &'a [Candidate<'a>],
    ctx: &'a StrategyContext<'c>,
    tries: usize,
    best: Option<Vec<usize>>,
    /// Accumulated spend cost plus excess of the best selection, in sats.
    best_waste: u64,
}

impl<'a, 'c> Search<'a, 'c> {
    fn run(
        &mut self,
        start: usize,
        picked: &mut Vec<usize>,
        value: u64,
        spend_cost: u64,
    ) -> Outcome {
        self.tries += 1;
        if self.tries > BNB_MAX_TRIES {
            return Outcome::Budget;
        }

        let input_types: Vec<ScriptType> = picked
            .iter()
            .map(|&i| self.entries[i].utxo.script_type)
            .collect();
        let fee = fee_for(&input_types, self.ctx.output_kinds, self.ctx.fee_rate);
        let needed = self.ctx.target + fee;

        if value >= needed {
            let excess = value - needed;
            // Remainders between zero and the dust threshold are invalid
            // selections; the branch is abandoned without recording it.
            if excess == 0 || excess >= self.ctx.options.dust_threshold {
                let waste = spend_cost + excess;
                if waste < self.best_waste {
                    self.best_waste = waste;
                    self.best = Some(picked.clone());
                }
                if excess == 0 && self.ctx.options.avoid_change {
                    return Outcome::FoundExact;
                }
            }
            // A superset can only add more excess.
            return Outcome::Continue;
        }

        for i in start..self.entries.len() {
            let entry = &self.entries[i];
            if spend_cost + entry.spend_cost > self.best_waste {
                continue;
            }

            picked.push(i);
            let outcome = self.run(
                i + 1,
                picked,
                value + entry.utxo.value,
                spend_cost + entry.spend_cost,
            );
            picked.pop();

            if outcome != Outcome::Continue {
                return outcome;
            }
        }

        Outcome::Continue
    }
}

impl SelectionStrategy for BranchAndBound {
    fn name(&self) -> &'static str {
        "Branch and Bound"
    }

    fn attempt(&self, ctx: &StrategyContext<'_>) -> Option<SelectionResult> {
        // Sort by effective value (value minus own spend cost), descending,
        // keeping only UTXOs that contribute positively.
        let mut entries: Vec<Candidate<'_>> = ctx
            .utxos
            .iter()
            .map(|utxo| Candidate {
                utxo,
                spend_cost: input_spend_cost(utxo.script_type, ctx.fee_rate),
            })
            .filter(|c| c.utxo.value > c.spend_cost)
            .collect();
        entries.sort_by(|a, b| {
            (b.utxo.value - b.spend_cost).cmp(&(a.utxo.value - a.spend_cost))
        });

        if entries.is_empty() {
            return None;
        }

        let mut search = Search {
            entries: &entries,
            ctx,
            tries: 0,
            best: None,
            best_waste: u64::MAX,
        };
        let mut picked = Vec::new();
        search.run(0, &mut picked, 0, 0);

        debug!(
            tries = search.tries,
            found = search.best.is_some(),
            "branch and bound finished"
        );

        let picked = search.best?;
        let inputs: Vec<Utxo> = picked.iter().map(|&i| entries[i].utxo.clone()).collect();
        let input_types: Vec<ScriptType> = inputs.iter().map(|u| u.script_type).collect();
        let fee = fee_for(&input_types, ctx.output_kinds, ctx.fee_rate);
        let total: u64 = inputs.iter().map(|u| u.value).sum();
        let change = total - ctx.target - fee;

        Some(SelectionResult {
            inputs,
            fee,
            change,
            waste: 0.0,
            algorithm: "Branch and Bound",
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
    fn finds_exact_match_without_change() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        // fee for one P2WPKH input, one P2WPKH output, change slot: 140 vB.
        let fee = 140;
        let utxos = vec![
            make_utxo(1, 50_000),
            make_utxo(2, 20_000 + fee),
            make_utxo(3, 7_000),
        ];
        let c = ctx(&utxos, &kinds, 20_000, 1.0, &options);

        let result = BranchAndBound.attempt(&c).unwrap();
        assert_eq!(result.change, 0);
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.inputs[0].value, 20_000 + fee);
    }

    #[test]
    fn skips_selections_with_sub_dust_remainder() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        // Only UTXO leaves a remainder of 100 sats: invalid, so no result.
        let utxos = vec![make_utxo(1, 20_240)];
        let c = ctx(&utxos, &kinds, 20_000, 1.0, &options);

        assert!(BranchAndBound.attempt(&c).is_none());
    }

    #[test]
    fn prefers_lower_excess_over_input_order() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![
            make_utxo(1, 365_589),
            make_utxo(2, 107_626),
            make_utxo(3, 65_223),
        ];
        let c = ctx(&utxos, &kinds, 35_000, 1.1, &options);

        let result = BranchAndBound.attempt(&c).unwrap();
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.inputs[0].value, 65_223);
    }

    #[test]
    fn combines_utxos_when_no_single_one_covers() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![make_utxo(1, 30_000), make_utxo(2, 25_000)];
        let c = ctx(&utxos, &kinds, 50_000, 1.0, &options);

        let result = BranchAndBound.attempt(&c).unwrap();
        assert_eq!(result.inputs.len(), 2);
        assert!(result.total_input_value() >= 50_000 + result.fee);
    }

    #[test]
    fn returns_none_when_balance_is_insufficient() {
        let options = SelectionOptions::default();
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![make_utxo(1, 30_000)];
        let c = ctx(&utxos, &kinds, 50_000, 1.0, &options);

        assert!(BranchAndBound.attempt(&c).is_none());
    }
}
