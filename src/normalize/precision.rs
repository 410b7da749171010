//! Rounding of order amounts and prices to a market's tick sizes.

use crate::error::{ClassifiedError, ErrorKind, ExchangeError};
use crate::precise::{CountingMode, Precise, RoundingMode, decimal_to_precision};
use crate::types::Market;

fn to_precision(value: &str, step: Option<&Precise>, rounding: RoundingMode) -> Result<String, ExchangeError> {
    match step {
        Some(step) => Ok(decimal_to_precision(
            value,
            rounding,
            &CountingMode::TickSize(step.clone()),
        )?),
        None => Ok(Precise::parse(value)?.to_string()),
    }
}

/// Truncate an order amount to the market's amount step.
///
/// An amount that truncates to zero is rejected as an invalid order, since the
/// exchange would refuse it anyway.
pub fn amount_to_precision(market: &Market, amount: &str) -> Result<String, ExchangeError> {
    let result = to_precision(amount, market.precision.amount.as_ref(), RoundingMode::Truncate)?;
    if Precise::parse(&result)?.is_zero() {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidOrder,
            format!(
                "{} amount of {} must be greater than minimum amount precision of {}",
                market.symbol,
                amount,
                market
                    .precision
                    .amount
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
        )
        .into());
    }
    Ok(result)
}

/// Round a price to the market's price step using `rounding`.
pub fn price_to_precision(market: &Market, price: &str, rounding: RoundingMode) -> Result<String, ExchangeError> {
    to_precision(price, market.precision.price.as_ref(), rounding)
}

/// Truncate a cost (quote amount) to the market's price step.
pub fn cost_to_precision(market: &Market, cost: &str) -> Result<String, ExchangeError> {
    to_precision(cost, market.precision.price.as_ref(), RoundingMode::Truncate)
}
