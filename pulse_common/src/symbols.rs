//! The synthetic symbol universe shared between server and observer.
//!
//! Every known symbol carries a realistic starting price and the name of the demo
//! data source it belongs to. Symbols parse case-insensitively, so `eurusd` and
//! `EURUSD` name the same instrument.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Symbols produced by the synthetic generator.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Hash,
    Eq,
    PartialEq,
)]
#[strum(ascii_case_insensitive)]
pub enum Symbol {
    AAPL,
    MSFT,
    AMZN,
    EURUSD,
    USDJPY,
    BTCUSD,
    ETHUSD,
    XAUUSD,
}

/// Lower bound of the random seed for symbols outside the universe.
pub const UNKNOWN_SEED_MIN: f64 = 50.0;
/// Upper bound (exclusive) of the random seed for symbols outside the universe.
pub const UNKNOWN_SEED_MAX: f64 = 550.0;

impl Symbol {
    /// Starting price used the first time the symbol is walked.
    pub fn seed_price(&self) -> f64 {
        match self {
            Symbol::AAPL => 185.0,
            Symbol::MSFT => 400.0,
            Symbol::AMZN => 140.0,
            Symbol::EURUSD => 1.10,
            Symbol::USDJPY => 145.0,
            Symbol::BTCUSD => 60_000.0,
            Symbol::ETHUSD => 3_000.0,
            Symbol::XAUUSD => 1_900.0,
        }
    }

    /// Display name of the data source this symbol is attributed to.
    pub fn home_source(&self) -> &'static str {
        match self {
            Symbol::AAPL | Symbol::MSFT | Symbol::AMZN => "Equities Feed",
            Symbol::EURUSD | Symbol::USDJPY => "FX Rates",
            Symbol::BTCUSD | Symbol::ETHUSD => "Crypto Prices",
            Symbol::XAUUSD => "Commodities",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Symbol::from_str("eurusd").unwrap(), Symbol::EURUSD);
        assert_eq!(Symbol::from_str("BtcUsd").unwrap(), Symbol::BTCUSD);
        assert!(Symbol::from_str("DOGE").is_err());
    }

    #[test]
    fn every_symbol_has_a_positive_seed_and_a_home() {
        for symbol in Symbol::iter() {
            assert!(symbol.seed_price() > 0.0, "{symbol}");
            assert!(!symbol.home_source().is_empty(), "{symbol}");
        }
    }
}
