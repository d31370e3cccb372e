use thiserror::Error;

/// Fee math over integer minor units. No floats anywhere: the platform fee is
/// expressed in basis points and rounded half up, the seller earns the exact
/// remainder, so `fee + earnings == gross` holds for every input.

pub const MAX_FEE_BPS: i64 = 10_000;
pub const MAX_REFUND_PERCENT: i64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPolicyInput {
    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(i64),
    #[error("fee basis points must be within 0..=10000, got {0}")]
    FeeOutOfRange(i64),
    #[error("refund percent must be within 0..=100, got {0}")]
    PercentOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee_minor: i64,
    pub seller_earnings_minor: i64,
}

/// Splits a gross amount into platform fee and seller earnings.
pub fn compute_split(gross_minor: i64, fee_bps: i64) -> Result<FeeSplit, InvalidPolicyInput> {
    if gross_minor < 0 {
        return Err(InvalidPolicyInput::NegativeAmount(gross_minor));
    }
    if !(0..=MAX_FEE_BPS).contains(&fee_bps) {
        return Err(InvalidPolicyInput::FeeOutOfRange(fee_bps));
    }

    // Round half up: 0.5 of a minor unit goes to the platform.
    let fee_minor = (gross_minor * fee_bps + MAX_FEE_BPS / 2) / MAX_FEE_BPS;
    Ok(FeeSplit {
        fee_minor,
        seller_earnings_minor: gross_minor - fee_minor,
    })
}

/// Amount to refund for a percentage-based dispute resolution, rounded half
/// up in the buyer's favor.
pub fn compute_refund(gross_minor: i64, refund_percent: i64) -> Result<i64, InvalidPolicyInput> {
    if gross_minor < 0 {
        return Err(InvalidPolicyInput::NegativeAmount(gross_minor));
    }
    if !(0..=MAX_REFUND_PERCENT).contains(&refund_percent) {
        return Err(InvalidPolicyInput::PercentOutOfRange(refund_percent));
    }

    Ok((gross_minor * refund_percent + MAX_REFUND_PERCENT / 2) / MAX_REFUND_PERCENT)
}
