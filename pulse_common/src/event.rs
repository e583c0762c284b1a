//! Broadcast events pushed to observers.
//!
//! Events travel as JSON objects tagged with a `type` field:
//!
//! ```json
//! {"type":"IngestionUpdate","timestamp":"2025-08-23T03:33:41Z","rate":4,"totalRecords":120,"successCount":4,"errorCount":0}
//! {"type":"HealthUpdate","component":"API","status":"Degraded","metrics":{"cpuUsage":40,"memoryUsage":52,"responseTime":210}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PulseError;
use crate::model::{HealthMetrics, HealthRecord, HealthStatus, TickSummary};

/// Health entry in its wire shape. Missing metrics are reported with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthUpdate {
    /// Component the entry describes.
    pub component: String,
    /// Its status at check time.
    pub status: HealthStatus,
    /// Resource metrics, defaulted when the record had none.
    pub metrics: HealthMetrics,
}

impl From<&HealthRecord> for HealthUpdate {
    fn from(record: &HealthRecord) -> Self {
        HealthUpdate {
            component: record.component.clone(),
            status: record.status,
            metrics: record.metrics.unwrap_or_default(),
        }
    }
}

/// Message delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Counters of one finished ingestion tick.
    IngestionUpdate(TickSummary),
    /// Latest health of one component.
    HealthUpdate(HealthUpdate),
}

impl Event {
    /// Encode the event to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PulseError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an event from a JSON datagram.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Event, PulseError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn ingestion_update_matches_wire_contract() {
        let summary = TickSummary {
            timestamp: Utc.with_ymd_and_hms(2025, 8, 23, 3, 33, 41).unwrap(),
            rate: 4,
            total_records: 120,
            success_count: 4,
            error_count: 0,
        };
        let value: serde_json::Value =
            serde_json::from_slice(&Event::IngestionUpdate(summary).to_json_bytes().unwrap()).unwrap();

        assert_eq!(value["type"], "IngestionUpdate");
        assert_eq!(value["timestamp"], "2025-08-23T03:33:41Z");
        assert_eq!(value["rate"], 4);
        assert_eq!(value["totalRecords"], 120);
        assert_eq!(value["successCount"], 4);
        assert_eq!(value["errorCount"], 0);
    }

    #[test]
    fn health_update_defaults_missing_metrics() {
        let record = HealthRecord::new("API", HealthStatus::Degraded, Utc::now());
        let event = Event::HealthUpdate(HealthUpdate::from(&record));
        let value: serde_json::Value = serde_json::from_slice(&event.to_json_bytes().unwrap()).unwrap();

        assert_eq!(value["type"], "HealthUpdate");
        assert_eq!(value["component"], "API");
        assert_eq!(value["status"], "Degraded");
        assert_eq!(value["metrics"]["cpuUsage"], 25);
        assert_eq!(value["metrics"]["memoryUsage"], 30);
        assert_eq!(value["metrics"]["responseTime"], 120);
    }
}
