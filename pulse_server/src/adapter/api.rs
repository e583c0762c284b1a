//! Generic HTTP pull adapter: one GET, one record carrying the whole body.

use std::sync::Arc;

use chrono::Utc;
use pulse_common::Result;
use pulse_common::model::{DataSource, IngestedRecord};

use super::fetch::Fetch;

pub struct ApiAdapter {
    fetcher: Arc<dyn Fetch>,
}

impl ApiAdapter {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// The record is named after the source, has value 0 and the response body as payload.
    /// Invalid UTF-8 sequences in the body are replaced, never rejected.
    pub fn pull(&self, source: &DataSource) -> Result<Vec<IngestedRecord>> {
        let body = self.fetcher.fetch(&source.url, source.api_key.as_deref())?;
        let payload = String::from_utf8_lossy(&body).into_owned();
        Ok(vec![IngestedRecord::new(
            source.id,
            &source.name,
            0.0,
            Utc::now(),
            Some(payload),
        )])
    }
}
