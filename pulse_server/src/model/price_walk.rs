//! Random-walk price simulation.
//!
//! `PriceWalk` remembers the last emitted price per symbol (keys compare
//! case-insensitively) and moves it on every `next` call:
//!
//! ```text
//! next = prev * (1 + drift + mean_reversion)
//! drift          ~ U[-1%, +1%)
//! mean_reversion ~ U[-0.1%, +0.1%)
//! ```
//!
//! A move that would end at or below zero is rejected and the previous price is
//! kept, so stored prices stay strictly positive. Results are rounded to four
//! decimal places. The map and the random source live behind one mutex owned by
//! the walk, which keeps overlapping ticks from racing on the same symbol, and a
//! fixed seed makes the whole sequence reproducible.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use pulse_common::Result;
use pulse_common::symbols::{Symbol, UNKNOWN_SEED_MAX, UNKNOWN_SEED_MIN};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Half-width of the per-step drift.
pub const DRIFT: f64 = 0.01;
/// Half-width of the per-step mean-reversion pull.
pub const MEAN_REVERSION: f64 = 0.001;

struct WalkState {
    last: HashMap<String, f64>,
    rng: StdRng,
}

/// Per-symbol random walk with explicitly owned, synchronized state.
pub struct PriceWalk {
    state: Mutex<WalkState>,
}

impl Default for PriceWalk {
    fn default() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }
}

impl PriceWalk {
    /// Walk driven by OS entropy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk whose sequence is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    /// `with_seed` when a seed is configured, OS entropy otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    fn from_rng(rng: StdRng) -> Self {
        PriceWalk {
            state: Mutex::new(WalkState {
                last: HashMap::new(),
                rng,
            }),
        }
    }

    /// Advance the walk for `symbol` and return the new price.
    pub fn next(&self, symbol: &str) -> Result<f64> {
        let key = symbol.to_ascii_uppercase();
        let mut state = self.state.lock()?;
        let WalkState { last, rng } = &mut *state;

        let prev = match last.get(&key) {
            Some(price) => *price,
            None => seed_price(&key, rng),
        };
        let drift = rng.random_range(-DRIFT..DRIFT);
        let mean_reversion = rng.random_range(-MEAN_REVERSION..MEAN_REVERSION);
        let next = step(prev, drift, mean_reversion);

        last.insert(key, next);
        Ok(next)
    }

    /// Continue the walk for `symbol` from `price` unless it already has one.
    /// Returns whether the price was taken.
    pub fn prime(&self, symbol: &str, price: f64) -> Result<bool> {
        if !(price > 0.0) {
            return Ok(false);
        }
        let mut state = self.state.lock()?;
        let key = symbol.to_ascii_uppercase();
        if state.last.contains_key(&key) {
            return Ok(false);
        }
        state.last.insert(key, price);
        Ok(true)
    }

    /// Last emitted price for `symbol`, if any.
    pub fn last(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.state.lock()?.last.get(&symbol.to_ascii_uppercase()).copied())
    }
}

fn seed_price(key: &str, rng: &mut StdRng) -> f64 {
    match Symbol::from_str(key) {
        Ok(symbol) => symbol.seed_price(),
        Err(_) => round4(rng.random_range(UNKNOWN_SEED_MIN..UNKNOWN_SEED_MAX)),
    }
}

/// One walk step from `prev`. Keeps `prev` when the move would not stay positive.
pub fn step(prev: f64, drift: f64, mean_reversion: f64) -> f64 {
    let next = round4(prev * (1.0 + drift + mean_reversion));
    if next > 0.0 { next } else { prev }
}

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_identical_sequences() {
        let a = PriceWalk::with_seed(42);
        let b = PriceWalk::with_seed(42);
        let run_a: Vec<f64> = (0..200).map(|_| a.next("AAPL").unwrap()).collect();
        let run_b: Vec<f64> = (0..200).map(|_| b.next("AAPL").unwrap()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = PriceWalk::with_seed(1);
        let b = PriceWalk::with_seed(2);
        let run_a: Vec<f64> = (0..20).map(|_| a.next("MSFT").unwrap()).collect();
        let run_b: Vec<f64> = (0..20).map(|_| b.next("MSFT").unwrap()).collect();
        assert_ne!(run_a, run_b);
    }

    #[test]
    fn first_move_starts_from_the_seed_table() {
        let walk = PriceWalk::with_seed(7);
        let first = walk.next("BTCUSD").unwrap();
        let bound = 60_000.0 * (DRIFT + MEAN_REVERSION) + 0.0001;
        assert!((first - 60_000.0).abs() <= bound, "{first}");
    }

    #[test]
    fn keys_are_case_insensitive() {
        let walk = PriceWalk::with_seed(3);
        let price = walk.next("eurusd").unwrap();
        assert_eq!(walk.last("EURUSD").unwrap(), Some(price));
        assert_eq!(walk.last("EurUsd").unwrap(), Some(price));
    }

    #[test]
    fn unknown_symbols_seed_in_default_range() {
        let walk = PriceWalk::with_seed(11);
        let price = walk.next("ZZZ").unwrap();
        let lo = UNKNOWN_SEED_MIN * (1.0 - DRIFT - MEAN_REVERSION) - 0.0001;
        let hi = UNKNOWN_SEED_MAX * (1.0 + DRIFT + MEAN_REVERSION) + 0.0001;
        assert!(price > lo && price < hi, "{price}");
    }

    #[test]
    fn prices_stay_positive_over_long_walks() {
        let walk = PriceWalk::with_seed(99);
        for _ in 0..5_000 {
            for symbol in ["EURUSD", "AAPL", "XAUUSD", "unknown"] {
                assert!(walk.next(symbol).unwrap() > 0.0);
            }
        }
    }

    #[test]
    fn non_positive_moves_are_rejected() {
        assert_eq!(step(10.0, -1.5, 0.0), 10.0);
        assert_eq!(step(10.0, -1.0, 0.0), 10.0);
        assert_eq!(step(0.0001, -0.9, 0.0), 0.0001);
        assert_eq!(step(100.0, 0.01, 0.0), 101.0);
    }

    #[test]
    fn results_are_rounded_to_four_places() {
        assert_eq!(step(1.1, 0.0012345, 0.0), 1.1014);
        assert_eq!(round4(185.123456), 185.1235);
    }

    #[test]
    fn overlapping_callers_share_one_consistent_walk() {
        let walk = std::sync::Arc::new(PriceWalk::with_seed(21));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let walk = std::sync::Arc::clone(&walk);
                std::thread::spawn(move || (0..250).map(|_| walk.next("ethusd").unwrap()).collect::<Vec<f64>>())
            })
            .collect();
        let seen: Vec<f64> = workers.into_iter().flat_map(|w| w.join().unwrap()).collect();

        assert_eq!(seen.len(), 2_000);
        assert!(seen.iter().all(|p| *p > 0.0));
        let last = walk.last("ETHUSD").unwrap().unwrap();
        assert!(seen.contains(&last));

        let after = walk.next("ETHUSD").unwrap();
        assert!((after - last).abs() <= last * (DRIFT + MEAN_REVERSION) + 0.0001, "{last} -> {after}");
    }

    #[test]
    fn prime_only_fills_missing_symbols() {
        let walk = PriceWalk::with_seed(5);
        assert!(walk.prime("aapl", 190.0).unwrap());
        assert!(!walk.prime("AAPL", 10.0).unwrap());
        assert!(!walk.prime("MSFT", 0.0).unwrap());
        assert_eq!(walk.last("AAPL").unwrap(), Some(190.0));
        assert_eq!(walk.last("MSFT").unwrap(), None);
    }
}
