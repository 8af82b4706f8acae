//! Coin selection.
//!
//! Four strategies behind one [`SelectionStrategy`] contract, tried in a
//! fixed order; the orchestrator keeps the lowest-waste success. Selection is
//! pure — it never locks or reserves UTXOs, so two concurrent requests over
//! the same address can pick overlapping inputs. Callers that need exclusion
//! must layer a lease service between their provider and this engine.

use tracing::{debug, info, warn};

use crate::constants::{CHANGE_COST_WEIGHT, DEFAULT_LONG_TERM_FEE_RATE, DEFAULT_SRD_MAX_TRIES, DUST_LIMIT};
use crate::error::EngineError;
use crate::fee_rate::FeeRate;
use crate::script_type::ScriptType;
use crate::size::{estimate_vsize, OutputKind, SizeProfile};
use crate::utxo::{RequestedOutput, SelectionResult, Utxo};

mod branch_and_bound;
mod knapsack;
mod largest_first;
mod single_random_draw;

use branch_and_bound::BranchAndBound;
use knapsack::Knapsack;
use largest_first::LargestFirst;
use single_random_draw::SingleRandomDraw;

/// Tunables for one selection call.
#[derive(Clone, Copy, Debug)]
pub struct SelectionOptions {
    /// Rate used to price the future cost of spending inputs and change.
    pub long_term_fee_rate: FeeRate,
    /// Minimum acceptable change; smaller remainders are folded into fee.
    pub dust_threshold: u64,
    /// Stop at the first exact (zero-change) match.
    pub avoid_change: bool,
    /// Shuffle budget for single random draw.
    pub max_tries: usize,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        SelectionOptions {
            long_term_fee_rate: FeeRate(DEFAULT_LONG_TERM_FEE_RATE),
            dust_threshold: DUST_LIMIT,
            avoid_change: true,
            max_tries: DEFAULT_SRD_MAX_TRIES,
        }
    }
}

/// Inputs shared by every strategy attempt.
pub(crate) struct StrategyContext<'a> {
    pub utxos: &'a [Utxo],
    pub output_kinds: &'a [OutputKind],
    /// Sum of requested output values, in sats.
    pub target: u64,
    pub fee_rate: FeeRate,
    pub options: &'a SelectionOptions,
}

/// One coin-selection algorithm. Returns `None` when it cannot produce a
/// viable selection; the orchestrator treats that as a soft failure.
pub(crate) trait SelectionStrategy {
    fn name(&self) -> &'static str;
    fn attempt(&self, ctx: &StrategyContext<'_>) -> Option<SelectionResult>;
}

/// Fee implied by spending `input_types` into `output_kinds` plus a change
/// output, at `fee_rate`.
pub(crate) fn fee_for(
    input_types: &[ScriptType],
    output_kinds: &[OutputKind],
    fee_rate: FeeRate,
) -> u64 {
    fee_rate
        .fee(estimate_vsize(
            input_types,
            output_kinds,
            true,
            SizeProfile::STANDARD,
        ))
        .to_sat()
}

/// Cost of spending one input of `ty` at `fee_rate`, floored at 1 sat.
pub(crate) fn input_spend_cost(ty: ScriptType, fee_rate: FeeRate) -> u64 {
    fee_rate.fee(ty.input_vsize()).to_sat().max(1)
}

/// Waste score of a selection: the future cost of spending every chosen
/// input, half the future cost of spending the change output, and any fee
/// paid beyond the selection's own minimum. Lower is better.
pub(crate) fn calculate_waste(
    result: &SelectionResult,
    ctx: &StrategyContext<'_>,
) -> f64 {
    let long_term = ctx.options.long_term_fee_rate;
    let inputs_cost: u64 = result
        .inputs
        .iter()
        .map(|u| input_spend_cost(u.script_type, long_term))
        .sum();

    let change_cost = if result.change > 0 {
        input_spend_cost(ScriptType::P2wpkh, long_term)
    } else {
        0
    };

    let input_types: Vec<ScriptType> = result.inputs.iter().map(|u| u.script_type).collect();
    let min_fee = fee_for(&input_types, &[], ctx.fee_rate);
    let excess = result.fee.saturating_sub(min_fee);

    inputs_cost as f64 + change_cost as f64 * CHANGE_COST_WEIGHT + excess as f64
}

/// Discard UTXOs that cost more to spend than they are worth at `fee_rate`.
fn filter_dust(utxos: &[Utxo], fee_rate: FeeRate) -> Vec<Utxo> {
    utxos
        .iter()
        .filter(|u| u.value > input_spend_cost(u.script_type, fee_rate))
        .cloned()
        .collect()
}

/// Select a UTXO subset covering `outputs` plus fee at `fee_rate`.
///
/// Strategies run in a fixed order — branch and bound, knapsack, single
/// random draw, largest first — and the lowest-waste success wins, ties
/// going to the earlier strategy. Fails with
/// [`EngineError::InsufficientFunds`] only when every strategy fails.
pub fn select_utxos(
    available: &[Utxo],
    outputs: &[RequestedOutput],
    fee_rate: FeeRate,
    options: &SelectionOptions,
) -> Result<SelectionResult, EngineError> {
    let target: u64 = outputs.iter().map(|o| o.value).sum();
    let output_kinds: Vec<OutputKind> = outputs.iter().map(|o| o.output_kind()).collect();

    let spendable = filter_dust(available, fee_rate);
    info!(
        available = available.len(),
        spendable = spendable.len(),
        target,
        rate = fee_rate.sat_per_vb(),
        "starting utxo selection"
    );

    let assumed: Vec<ScriptType> = vec![ScriptType::P2wpkh; spendable.len().max(1)];
    let rough_fee = fee_for(&assumed[..assumed.len().min(3)], &output_kinds, fee_rate);

    if spendable.is_empty() {
        warn!(
            filtered = available.len(),
            rate = fee_rate.sat_per_vb(),
            "every utxo costs more to spend than its value"
        );
        return Err(EngineError::InsufficientFunds {
            available: 0,
            required: target + rough_fee,
            target,
            fee: rough_fee,
            fee_rate: fee_rate.sat_per_vb(),
        });
    }

    let ctx = StrategyContext {
        utxos: &spendable,
        output_kinds: &output_kinds,
        target,
        fee_rate,
        options,
    };

    let strategies: [&dyn SelectionStrategy; 4] =
        [&BranchAndBound, &Knapsack, &SingleRandomDraw, &LargestFirst];

    let mut best: Option<SelectionResult> = None;
    for strategy in strategies {
        let Some(mut result) = strategy.attempt(&ctx) else {
            debug!(strategy = strategy.name(), "strategy produced no selection");
            continue;
        };
        result.waste = calculate_waste(&result, &ctx);
        result.algorithm = strategy.name();
        debug!(
            strategy = strategy.name(),
            inputs = result.inputs.len(),
            fee = result.fee,
            change = result.change,
            waste = result.waste,
            "strategy succeeded"
        );

        let improves = best
            .as_ref()
            .map(|b| result.waste < b.waste)
            .unwrap_or(true);
        if improves {
            let exact = result.change == 0;
            best = Some(result);
            if exact && options.avoid_change {
                debug!("exact match found, skipping remaining strategies");
                break;
            }
        }
    }

    match best {
        Some(result) => {
            info!(
                algorithm = result.algorithm,
                inputs = result.inputs.len(),
                fee = result.fee,
                change = result.change,
                waste = result.waste,
                "utxo selection completed"
            );
            debug_assert!(result.total_input_value() >= target + result.fee);
            debug_assert!(result.change == 0 || result.change >= options.dust_threshold);
            Ok(result)
        }
        None => {
            let available_total: u64 = spendable.iter().map(|u| u.value).sum();
            warn!(
                available = available_total,
                target,
                fee = rough_fee,
                "no strategy covered the target"
            );
            Err(EngineError::InsufficientFunds {
                available: available_total,
                required: target + rough_fee,
                target,
                fee: rough_fee,
                fee_rate: fee_rate.sat_per_vb(),
            })
        }
    }
}
