//! Single random draw: shuffle and accumulate until covered. Produces varied
//! input sets, which is good for privacy; the orchestrator's waste ranking
//! decides whether any draw beats the deterministic strategies.

use rand::seq::SliceRandom;

use crate::script_type::ScriptType;
use crate::utxo::{SelectionResult, Utxo};

use super::{calculate_waste, fee_for, SelectionStrategy, StrategyContext};

pub(crate) struct SingleRandomDraw;

impl SelectionStrategy for SingleRandomDraw {
    fn name(&self) -> &'static str {
        "Single Random Draw"
    }

    fn attempt(&self, ctx: &StrategyContext<'_>) -> Option<SelectionResult> {
        let mut rng = rand::thread_rng();
        let mut best: Option<SelectionResult> = None;
        let mut best_waste = f64::MAX;

        for _ in 0..ctx.options.max_tries {
            let mut order: Vec<&Utxo> = ctx.utxos.iter().collect();
            order.shuffle(&mut rng);

            let mut picked: Vec<&Utxo> = Vec::new();
            let mut total = 0u64;

            for utxo in order {
                picked.push(utxo);
                total += utxo.value;

                let input_types: Vec<ScriptType> =
                    picked.iter().map(|u| u.script_type).collect();
                let fee = fee_for(&input_types, ctx.output_kinds, ctx.fee_rate);
                let needed = ctx.target + fee;
                if total < needed {
                    continue;
                }

                let change = total - needed;
                // A positive remainder below the dust threshold is not a
                // valid result; keep drawing inputs instead of rounding it
                // into the fee.
                if change > 0 && change < ctx.options.dust_threshold {
                    continue;
                }

                let result = SelectionResult {
                    inputs: picked.iter().map(|u| (*u).clone()).collect(),
                    fee,
                    change,
                    waste: 0.0,
                    algorithm: "Single Random Draw",
                };
                let waste = calculate_waste(&result, ctx);
                if waste < best_waste {
                    best_waste = waste;
                    best = Some(SelectionResult { waste, ..result });
                }
                break;
            }
        }

        best
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
        options: &'a SelectionOptions,
    ) -> StrategyContext<'a> {
        StrategyContext {
            utxos,
            output_kinds: kinds,
            target,
            fee_rate: FeeRate::try_from(1.0).unwrap(),
            options,
        }
    }

    #[test]
    fn every_draw_satisfies_the_dust_rule() {
        let options = SelectionOptions {
            max_tries: 50,
            ..SelectionOptions::default()
        };
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![
            make_utxo(1, 30_000),
            make_utxo(2, 25_000),
            make_utxo(3, 12_000),
            make_utxo(4, 80_000),
        ];
        let c = ctx(&utxos, &kinds, 40_000, &options);

        for _ in 0..10 {
            let result = SingleRandomDraw.attempt(&c).unwrap();
            assert!(result.change == 0 || result.change >= options.dust_threshold);
            assert!(result.total_input_value() >= 40_000 + result.fee);
        }
    }

    #[test]
    fn fails_when_balance_cannot_cover() {
        let options = SelectionOptions {
            max_tries: 20,
            ..SelectionOptions::default()
        };
        let kinds = [OutputKind::Pay(ScriptType::P2wpkh)];
        let utxos = vec![make_utxo(1, 5_000)];
        let c = ctx(&utxos, &kinds, 40_000, &options);

        assert!(SingleRandomDraw.attempt(&c).is_none());
    }
}
