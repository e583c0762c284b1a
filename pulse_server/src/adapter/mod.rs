//! Source adapters.
//!
//! A `SourceAdapter` turns one configured `DataSource` into zero or more records.
//! The variants mirror `SourceKind`:
//! - `feed`: RSS/Atom documents, one record per entry.
//! - `api`: a single HTTP GET, the body becomes the payload.
//! - `synthetic`: random-walk prices, no I/O.
//! - `fetch`: the HTTP transport shared by the pulling variants.
//!
//! Adapters only report failures; isolating them per source is the coordinator's job.

pub mod api;
pub mod feed;
pub mod fetch;
pub mod synthetic;

use std::sync::Arc;

use pulse_common::Result;
use pulse_common::model::{DataSource, IngestedRecord, SourceKind};

use self::api::ApiAdapter;
use self::feed::FeedAdapter;
use self::fetch::Fetch;
use self::synthetic::SyntheticAdapter;
use crate::model::price_walk::PriceWalk;

/// One adapter per source kind behind a single `pull` capability.
pub enum SourceAdapter {
    Feed(FeedAdapter),
    ExternalApi(ApiAdapter),
    Synthetic(SyntheticAdapter),
}

impl SourceAdapter {
    pub fn pull(&self, source: &DataSource) -> Result<Vec<IngestedRecord>> {
        match self {
            SourceAdapter::Feed(adapter) => adapter.pull(source),
            SourceAdapter::ExternalApi(adapter) => adapter.pull(source),
            SourceAdapter::Synthetic(adapter) => adapter.pull(source),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceAdapter::Feed(_) => SourceKind::Feed,
            SourceAdapter::ExternalApi(_) => SourceKind::ExternalApi,
            SourceAdapter::Synthetic(_) => SourceKind::Synthetic,
        }
    }
}

/// The adapters of a running pipeline, one per kind.
pub struct Adapters {
    feed: SourceAdapter,
    api: SourceAdapter,
    synthetic: SourceAdapter,
    generator: SyntheticAdapter,
}

impl Adapters {
    pub fn new(fetcher: Arc<dyn Fetch>, walk: Arc<PriceWalk>) -> Self {
        let generator = SyntheticAdapter::new(walk);
        Self {
            feed: SourceAdapter::Feed(FeedAdapter::new(Arc::clone(&fetcher))),
            api: SourceAdapter::ExternalApi(ApiAdapter::new(fetcher)),
            synthetic: SourceAdapter::Synthetic(generator.clone()),
            generator,
        }
    }

    pub fn for_kind(&self, kind: SourceKind) -> &SourceAdapter {
        match kind {
            SourceKind::Feed => &self.feed,
            SourceKind::ExternalApi => &self.api,
            SourceKind::Synthetic => &self.synthetic,
        }
    }

    /// Batch generator of the synthetic tick path. Shares its walk with the `Synthetic` adapter.
    pub fn synthetic(&self) -> &SyntheticAdapter {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNetwork;

    impl Fetch for NoNetwork {
        fn fetch(&self, url: &str, _credential: Option<&str>) -> Result<Vec<u8>> {
            Err(pulse_common::PulseError::Fetch {
                url: url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    #[test]
    fn dispatches_by_source_kind() {
        let adapters = Adapters::new(Arc::new(NoNetwork), Arc::new(PriceWalk::with_seed(1)));
        for kind in [SourceKind::Feed, SourceKind::ExternalApi, SourceKind::Synthetic] {
            assert_eq!(adapters.for_kind(kind).kind(), kind);
        }

        let api = DataSource::new("FX Rates", SourceKind::ExternalApi, "https://api.example.com/fx");
        assert!(adapters.for_kind(api.kind).pull(&api).is_err());

        let synthetic = DataSource::new("FX Rates", SourceKind::Synthetic, "synthetic://fx");
        assert_eq!(adapters.for_kind(synthetic.kind).pull(&synthetic).unwrap().len(), 2);
    }
}
