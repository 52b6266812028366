use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::api::{Credits, Selection, SelectionStatus};
use crate::error::{Error, Result};

/// Legs beyond this are rejected before any arithmetic runs.
pub const MAX_SELECTIONS: usize = 20;

/// Multiplies all leg odds into the coupon's combined odds, rounded half-up
/// to the two decimals odds are quoted in.
pub fn total_odds(legs: &[Decimal]) -> Result<Decimal> {
    if legs.is_empty() {
        return Err(Error::InvalidSelections(
            "a coupon needs at least one selection".to_string(),
        ));
    }
    if legs.len() > MAX_SELECTIONS {
        return Err(Error::InvalidSelections(format!(
            "a coupon can hold at most {} selections",
            MAX_SELECTIONS
        )));
    }
    let mut product = Decimal::ONE;
    for odds in legs {
        if *odds <= Decimal::ZERO {
            return Err(Error::InvalidSelections(format!(
                "selection odds must be positive, got {}",
                odds
            )));
        }
        product *= odds;
    }
    Ok(round_odds(product))
}

pub fn round_odds(odds: Decimal) -> Decimal {
    odds.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `floor(stake × odds)`. The truncation keeps payouts from ever exceeding
/// what the combined odds promised.
pub fn potential_win(stake: Credits, total_odds: Decimal) -> Result<Credits> {
    (Decimal::from(stake) * total_odds)
        .floor()
        .to_u32()
        .ok_or_else(|| {
            Error::InvalidSelections(format!(
                "stake {} at odds {} overflows the payout range",
                stake, total_odds
            ))
        })
}

/// Combined odds of the won legs only; voided legs drop out of the product.
/// With no won legs this is 1.00, which turns the payout into a plain stake
/// refund.
pub fn effective_odds(selections: &[Selection]) -> Decimal {
    let product = selections
        .iter()
        .filter(|s| s.status == SelectionStatus::Won)
        .fold(Decimal::ONE, |acc, s| acc * s.odds);
    round_odds(product)
}
