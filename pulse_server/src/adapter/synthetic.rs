//! Synthetic adapter: records produced by the price walk, no I/O.
//!
//! In synthetic mode the coordinator draws a batch of symbols from the universe and
//! `generate` attributes each one to the active source named after the symbol's home
//! source, or to a uniformly random active source when no name matches. A `Synthetic`
//! source pulled on its own (`pull`) walks the symbols homed at it, or a single symbol
//! named after the source when none are.

use std::sync::Arc;

use chrono::Utc;
use pulse_common::Result;
use pulse_common::model::{DataSource, IngestedRecord};
use pulse_common::symbols::Symbol;
use rand::Rng;
use strum::IntoEnumIterator;

use crate::model::price_walk::PriceWalk;

#[derive(Clone)]
pub struct SyntheticAdapter {
    walk: Arc<PriceWalk>,
    universe: Vec<Symbol>,
}

impl SyntheticAdapter {
    pub fn new(walk: Arc<PriceWalk>) -> Self {
        Self {
            walk,
            universe: Symbol::iter().collect(),
        }
    }

    pub fn pull(&self, source: &DataSource) -> Result<Vec<IngestedRecord>> {
        let now = Utc::now();
        let homed: Vec<Symbol> = self
            .universe
            .iter()
            .copied()
            .filter(|s| s.home_source().eq_ignore_ascii_case(&source.name))
            .collect();

        if homed.is_empty() {
            let price = self.walk.next(&source.name)?;
            return Ok(vec![IngestedRecord::new(source.id, &source.name, price, now, None)]);
        }
        homed
            .into_iter()
            .map(|symbol| {
                let price = self.walk.next(&symbol.to_string())?;
                Ok(IngestedRecord::new(source.id, &symbol.to_string(), price, now, None))
            })
            .collect()
    }

    /// Draw `count` symbols from the universe, with replacement.
    pub fn pick_symbols<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Symbol> {
        (0..count)
            .map(|_| self.universe[rng.random_range(0..self.universe.len())])
            .collect()
    }

    /// One record per pick, all stamped with the same tick time.
    pub fn generate<R: Rng>(
        &self,
        picks: &[Symbol],
        sources: &[DataSource],
        rng: &mut R,
    ) -> Result<Vec<IngestedRecord>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut records = Vec::with_capacity(picks.len());

        for symbol in picks {
            let source = match sources
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(symbol.home_source()))
            {
                Some(source) => source,
                None => &sources[rng.random_range(0..sources.len())],
            };
            let price = self.walk.next(&symbol.to_string())?;
            records.push(IngestedRecord::new(source.id, &symbol.to_string(), price, now, None));
        }
        Ok(records)
    }
}
