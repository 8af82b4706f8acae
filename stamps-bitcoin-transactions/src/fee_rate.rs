use bitcoin::Amount;

use crate::error::EngineError;

/// Fee rate in satoshis per virtual byte.
///
/// Constructed through `TryFrom<f64>` so a zero, negative or non-finite rate
/// is rejected at the boundary instead of producing nonsense fees deep inside
/// the engine.
///
/// ```
/// use stamps_bitcoin_transactions::fee_rate::FeeRate;
///
/// let rate = FeeRate::try_from(2.0).unwrap();
/// assert_eq!(rate.fee(141).to_sat(), 282);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct FeeRate(pub f64);

impl TryFrom<f64> for FeeRate {
    type Error = EngineError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::InvalidFeeRate(rate));
        }
        Ok(FeeRate(rate))
    }
}

impl FeeRate {
    /// Fee owed for a transaction of `vsize` virtual bytes.
    ///
    /// Always rounds up: the estimate may never under-pay the miner.
    pub fn fee(&self, vsize: usize) -> Amount {
        Amount::from_sat((vsize as f64 * self.0).ceil() as u64)
    }

    /// The raw rate in sat/vB.
    pub fn sat_per_vb(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite_rates() {
        assert!(FeeRate::try_from(0.0).is_err());
        assert!(FeeRate::try_from(-1.0).is_err());
        assert!(FeeRate::try_from(f64::NAN).is_err());
        assert!(FeeRate::try_from(f64::INFINITY).is_err());
        assert!(FeeRate::try_from(0.1).is_ok());
    }

    #[test]
    fn fee_rounds_up_never_down() {
        // 1.1 is not exactly representable, so 100 * 1.1 lands a hair above
        // 110 and the ceiling keeps the estimate on the paying side.
        let rate = FeeRate::try_from(1.1).unwrap();
        assert_eq!(rate.fee(100).to_sat(), 111);
        assert_eq!(rate.fee(101).to_sat(), 112);
        assert_eq!(rate.fee(0).to_sat(), 0);

        let whole = FeeRate::try_from(50.0).unwrap();
        assert_eq!(whole.fee(140).to_sat(), 7000);
        let half = FeeRate::try_from(2.5).unwrap();
        assert_eq!(half.fee(141).to_sat(), 353); // 352.5 rounds up
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fee_is_at_least_exact_product(vsize in 0usize..100_000, rate in 0.01f64..500.0) {
            let fee = FeeRate::try_from(rate).unwrap().fee(vsize).to_sat();
            prop_assert!(fee as f64 >= vsize as f64 * rate - 1e-6);
        }
    }
}
