//! RSS/Atom feed adapter.
//!
//! Every feed entry becomes one record: the entry title is the symbol, the value is
//! always 0 because feeds carry no numeric signal, and the summary (or the content
//! body when there is no summary) is the payload. Entries without a title fall back
//! to their feed-assigned id.

use std::sync::Arc;

use chrono::Utc;
use pulse_common::model::{DataSource, IngestedRecord};
use pulse_common::{PulseError, Result};

use super::fetch::Fetch;

pub struct FeedAdapter {
    fetcher: Arc<dyn Fetch>,
}

impl FeedAdapter {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    pub fn pull(&self, source: &DataSource) -> Result<Vec<IngestedRecord>> {
        let body = self.fetcher.fetch(&source.url, source.api_key.as_deref())?;
        parse_feed(source, &body)
    }
}

/// Turn a syndication document into records attributed to `source`.
pub fn parse_feed(source: &DataSource, document: &[u8]) -> Result<Vec<IngestedRecord>> {
    let feed = feed_rs::parser::parse(document).map_err(|e| PulseError::FeedParse(e.to_string()))?;
    let now = Utc::now();

    let records = feed
        .entries
        .into_iter()
        .map(|entry| {
            let symbol = entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or(entry.id);
            let payload = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            IngestedRecord::new(source.id, &symbol, 0.0, now, payload)
        })
        .collect();
    Ok(records)
}
