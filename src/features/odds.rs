//! Odds conversions.
//!
//! Turns quoted prices into implied probabilities and strips the
//! bookmaker margin so the two sides of a prop sum to 1.0.

use crate::types::{Price, PropError};

/// Implied probability of a single quoted price, margin included.
pub fn implied_probability(price: Price) -> Result<f64, PropError> {
    match price {
        Price::American(odds) => {
            if !odds.is_finite() || odds.abs() < 100.0 {
                return Err(PropError::InvalidOdds(format!(
                    "American odds must be <= -100 or >= +100, got {odds}"
                )));
            }
            if odds > 0.0 {
                Ok(100.0 / (odds + 100.0))
            } else {
                Ok(-odds / (-odds + 100.0))
            }
        }
        Price::Decimal(odds) => {
            if !odds.is_finite() || odds <= 1.0 {
                return Err(PropError::InvalidOdds(format!(
                    "Decimal odds must be greater than 1.0, got {odds}"
                )));
            }
            Ok(1.0 / odds)
        }
    }
}

/// Decimal odds for a price (total return per unit staked).
pub fn to_decimal(price: Price) -> Result<f64, PropError> {
    // Validates the price as a side effect.
    implied_probability(price)?;
    Ok(match price {
        Price::American(odds) if odds > 0.0 => 1.0 + odds / 100.0,
        Price::American(odds) => 1.0 + 100.0 / -odds,
        Price::Decimal(odds) => odds,
    })
}

/// No-vig probabilities `(over, under)` for a two-sided quote.
///
/// Each side's raw implied probability is divided by their sum, which
/// removes the overround. The result always sums to 1.0.
pub fn no_vig(over: Price, under: Price) -> Result<(f64, f64), PropError> {
    let raw_over = implied_probability(over)?;
    let raw_under = implied_probability(under)?;
    let total = raw_over + raw_under;
    let p_over = raw_over / total;
    Ok((p_over, 1.0 - p_over))
}

/// Expected profit per unit staked at `price` given a win probability.
pub fn expected_value_per_unit(price: Price, win_prob: f64) -> Result<f64, PropError> {
    let payout = to_decimal(price)? - 1.0;
    Ok(win_prob * payout - (1.0 - win_prob))
}
