//! Fee estimation and change/dust handling.
//!
//! The virtual size is estimated with a fixed linear model that assumes one
//! P2WPKH input and one P2WPKH change output:
//!
//! ```text
//! vsize = 10 + 68 + Σ(10 + len(payload_i)) + 31
//! ```
//!
//! It does not measure the serialized transaction, so the rate actually paid
//! drifts a little from the requested one with signature length and payload
//! size. The change output is always counted, even when it ends up dropped as
//! dust.

use std::fmt;

use bitcoin::Amount;

use crate::error::{TxError, TxResult};

/// Version, locktime, counts and segwit marker.
pub const TX_OVERHEAD_VBYTES: u64 = 10;

/// One P2WPKH input including its witness.
pub const P2WPKH_INPUT_VBYTES: u64 = 68;

/// Per data-carrier output, on top of the payload itself.
pub const DATA_CARRIER_OVERHEAD_VBYTES: u64 = 10;

/// One P2WPKH output.
pub const P2WPKH_OUTPUT_VBYTES: u64 = 31;

/// Outputs below this value are not created.
pub const DUST_LIMIT: Amount = Amount::from_sat(546);

/// Smallest fee ever charged.
pub const MIN_FEE: Amount = Amount::from_sat(1);

/// Fee rate in satoshis per virtual byte. Fractional rates are allowed.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct FeeRate(f64);

impl FeeRate {
    /// Two satoshis per vbyte.
    pub const DEFAULT: FeeRate = FeeRate(2.0);

    /// Constructs a new instance, rejecting negative and non-finite rates.
    pub fn from_sat_per_vb(rate: f64) -> TxResult<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(TxError::InvalidFeeRate(rate));
        }

        Ok(Self(rate))
    }

    /// Gets the rate in sat/vB.
    pub fn as_sat_per_vb(self) -> f64 {
        self.0
    }

    /// Fee for `vsize` virtual bytes, truncated to whole satoshis and never
    /// below [`MIN_FEE`].
    pub fn fee_for_vsize(self, vsize: u64) -> Amount {
        // Float to int casts saturate.
        let sats = (self.0 * vsize as f64) as u64;
        Amount::from_sat(sats).max(MIN_FEE)
    }

    /// Rate actually paid by `fee` over `vsize`.
    pub(crate) fn achieved(fee: Amount, vsize: u64) -> Self {
        if vsize == 0 {
            return Self(0.0);
        }

        Self(fee.to_sat() as f64 / vsize as f64)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

impl TryFrom<f64> for FeeRate {
    type Error = TxError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        Self::from_sat_per_vb(rate)
    }
}

impl From<FeeRate> for f64 {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

/// Estimated virtual size of a transaction carrying `payloads`.
pub fn estimate_vsize<P: AsRef<[u8]>>(payloads: &[P]) -> u64 {
    let data_outputs: u64 = payloads
        .iter()
        .map(|p| DATA_CARRIER_OVERHEAD_VBYTES + p.as_ref().len() as u64)
        .sum();

    TX_OVERHEAD_VBYTES + P2WPKH_INPUT_VBYTES + data_outputs + P2WPKH_OUTPUT_VBYTES
}

/// What happened to the value left over after the fee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutput {
    /// A change output of this value was created.
    Created(Amount),

    /// The remainder was below [`DUST_LIMIT`] and was left to the miner.
    AbsorbedAsFee(Amount),
}

impl ChangeOutput {
    /// Splits `input_value` into the fee and the change decision.
    ///
    /// Returns the effective fee alongside the decision: the nominal fee when
    /// change is created, the whole input when the remainder is dust.
    pub(crate) fn split(input_value: Amount, fee: Amount) -> TxResult<(Amount, Self)> {
        let remainder = input_value
            .checked_sub(fee)
            .ok_or(TxError::InsufficientFunds {
                available: input_value,
                required: fee,
            })?;

        if remainder < DUST_LIMIT {
            Ok((input_value, Self::AbsorbedAsFee(remainder)))
        } else {
            Ok((fee, Self::Created(remainder)))
        }
    }

    /// Value of the change output, if one exists.
    pub fn value(&self) -> Option<Amount> {
        match self {
            Self::Created(v) => Some(*v),
            Self::AbsorbedAsFee(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_estimate_single_payload() {
        assert_eq!(estimate_vsize(&[[0u8; 13]]), 132);
    }

    #[test]
    fn test_estimate_multiple_payloads() {
        let payloads: [&[u8]; 2] = [&[0; 20], &[0; 100]];
        assert_eq!(estimate_vsize(&payloads), 10 + 68 + 30 + 110 + 31);
    }

    #[test]
    fn test_fee_truncates() {
        let rate = FeeRate::from_sat_per_vb(1.5).unwrap();
        assert_eq!(rate.fee_for_vsize(133), Amount::from_sat(199));

        let rate = FeeRate::from_sat_per_vb(2.0).unwrap();
        assert_eq!(rate.fee_for_vsize(132), Amount::from_sat(264));
    }

    #[test]
    fn test_fee_floor() {
        let rate = FeeRate::from_sat_per_vb(0.001).unwrap();
        assert_eq!(rate.fee_for_vsize(132), MIN_FEE);

        let rate = FeeRate::from_sat_per_vb(0.0).unwrap();
        assert_eq!(rate.fee_for_vsize(132), MIN_FEE);
    }

    #[test]
    fn test_invalid_fee_rates() {
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                FeeRate::from_sat_per_vb(rate),
                Err(TxError::InvalidFeeRate(_))
            ));
        }
    }

    #[test]
    fn test_split_creates_change() {
        let (fee, change) =
            ChangeOutput::split(Amount::from_sat(100_000), Amount::from_sat(264)).unwrap();
        assert_eq!(fee, Amount::from_sat(264));
        assert_eq!(change, ChangeOutput::Created(Amount::from_sat(99_736)));
    }

    #[test]
    fn test_split_absorbs_dust() {
        let (fee, change) =
            ChangeOutput::split(Amount::from_sat(600), Amount::from_sat(264)).unwrap();
        assert_eq!(fee, Amount::from_sat(600));
        assert_eq!(change, ChangeOutput::AbsorbedAsFee(Amount::from_sat(336)));
        assert_eq!(change.value(), None);
    }

    #[test]
    fn test_split_at_dust_limit_keeps_change() {
        let (fee, change) = ChangeOutput::split(Amount::from_sat(810), Amount::from_sat(264)).unwrap();
        assert_eq!(fee, Amount::from_sat(264));
        assert_eq!(change.value(), Some(DUST_LIMIT));
    }

    #[test]
    fn test_split_exact_fee() {
        let (fee, change) = ChangeOutput::split(Amount::from_sat(264), Amount::from_sat(264)).unwrap();
        assert_eq!(fee, Amount::from_sat(264));
        assert_eq!(change, ChangeOutput::AbsorbedAsFee(Amount::ZERO));
    }

    #[test]
    fn test_split_insufficient() {
        let res = ChangeOutput::split(Amount::from_sat(100), Amount::from_sat(1320));
        assert!(matches!(res, Err(TxError::InsufficientFunds { .. })));
    }

    proptest! {
        #[test]
        fn prop_split_preserves_value(input in 1u64..10_000_000, fee in 1u64..100_000) {
            let input = Amount::from_sat(input);
            let fee = Amount::from_sat(fee);

            match ChangeOutput::split(input, fee) {
                Ok((effective_fee, change)) => {
                    let change = change.value().unwrap_or(Amount::ZERO);
                    prop_assert_eq!(effective_fee + change, input);
                    prop_assert!(effective_fee >= fee);
                    prop_assert!(change == Amount::ZERO || change >= DUST_LIMIT);
                }
                Err(_) => prop_assert!(input < fee),
            }
        }
    }
}
