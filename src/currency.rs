//! SAR→BDT conversion for Saudi-side cost figures.
//!
//! Historical packages may lack a recorded exchange rate, so conversion
//! degrades gracefully: a zero, negative or non-finite rate is treated as
//! identity (the amount is assumed already local) rather than raising an
//! error or zeroing the cost.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Bdt,
    Sar,
}

/// A non-negative amount in a named currency. Construction clamps, so a
/// figure derived by subtraction can never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoneyFigure {
    pub amount: f64,
    pub currency: Currency,
}

impl MoneyFigure {
    pub fn new(amount: f64, currency: Currency) -> Self {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        Self { amount, currency }
    }

    pub fn bdt(amount: f64) -> Self {
        Self::new(amount, Currency::Bdt)
    }

    pub fn sar(amount: f64) -> Self {
        Self::new(amount, Currency::Sar)
    }

    /// Convert to BDT using the package's recorded rate. BDT figures pass
    /// through untouched.
    pub fn to_local(self, rate: f64) -> MoneyFigure {
        match self.currency {
            Currency::Bdt => self,
            Currency::Sar => MoneyFigure::bdt(to_local(self.amount, rate)),
        }
    }
}

/// Convert a foreign-currency amount to local currency.
pub fn to_local(amount_foreign: f64, rate: f64) -> f64 {
    if !rate.is_finite() || rate <= 0.0 {
        return amount_foreign;
    }
    amount_foreign * rate
}
