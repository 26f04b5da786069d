//! Currency codes for Vendora
//!
//! Settlement currencies are a fiat subset of ISO 4217. A payout never
//! mixes currencies, so the code travels with every monetary value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fiat currency codes (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyCode {
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    AUD,
    CAD,
    SGD,
    KRW,
    INR,
    BRL,
    MXN,
}

impl CurrencyCode {
    /// Get the number of minor-unit digits for this currency
    pub fn minor_units(&self) -> u8 {
        match self {
            Self::JPY | Self::KRW => 0,
            _ => 2,
        }
    }

    /// Get the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::JPY => "JPY",
            Self::CHF => "CHF",
            Self::AUD => "AUD",
            Self::CAD => "CAD",
            Self::SGD => "SGD",
            Self::KRW => "KRW",
            Self::INR => "INR",
            Self::BRL => "BRL",
            Self::MXN => "MXN",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
