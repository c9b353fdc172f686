//! Purification of impermissible income.
//!
//! Informational only: these amounts are given away in addition to zakat and
//! never enter zakatable wealth or the amount due.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zakat_core::FinancialInput;

/// Income to purify, split by source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purification {
    /// Interest earned, purified in full.
    pub interest: Decimal,
    /// Impermissible share of dividends.
    pub dividends: Decimal,
    pub total: Decimal,
}

pub fn purification(input: &FinancialInput) -> Purification {
    let interest = input.interest_income;
    let dividends = input.dividend_income * input.impermissible_dividend_fraction;
    Purification {
        interest,
        dividends,
        total: interest + dividends,
    }
}
