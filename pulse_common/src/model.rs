//! Data model of the ingestion pipeline.
//!
//! - `DataSource`: a configured origin of data with an active flag and poll interval.
//! - `IngestedRecord`: one immutable data point produced by a source.
//! - `HealthRecord`: one entry of the append-only component health history.
//! - `TickSummary`: ephemeral per-tick throughput counters, never persisted.
//!
//! All types serialize with camelCase field names, which is also their wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Poll interval applied to sources that do not declare one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Which adapter turns a source into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SourceKind {
    /// RSS/Atom syndication document.
    #[serde(alias = "Rss")]
    Feed,
    /// Plain HTTP GET; the body becomes the payload.
    ExternalApi,
    /// Random-walk generator, no I/O.
    Synthetic,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_active() -> bool {
    true
}

/// A configured origin of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Generated when a sources file leaves it out.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Display name; synthetic records are attributed by it.
    pub name: String,
    /// Adapter selector, `type` on the wire.
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Address pulled by the feed and API adapters.
    pub url: String,
    /// Credential sent with pulls. Accepted from configuration, never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Declared cadence. Informational, the live trigger runs on its own interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Inactive sources are never pulled or listed.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Opaque per-source configuration blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl DataSource {
    /// Active source with a fresh id and the default poll interval.
    pub fn new(name: &str, kind: SourceKind, url: &str) -> Self {
        DataSource {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            url: url.to_string(),
            api_key: None,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            is_active: true,
            config: None,
        }
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, seconds: u64) -> Self {
        self.poll_interval_seconds = seconds;
        self
    }

    /// Attach a credential.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Mark the source inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// One ingested data point. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedRecord {
    /// Unique per record.
    pub id: Uuid,
    /// Source the record is attributed to.
    pub data_source_id: Uuid,
    /// Symbol, feed entry title or source name, depending on the adapter.
    pub symbol: String,
    /// Walked price; 0 for feed and API records.
    pub value: f64,
    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
    /// Raw text carried along: feed entry summary or API response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl IngestedRecord {
    /// New record with a fresh id.
    pub fn new(
        data_source_id: Uuid,
        symbol: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        payload: Option<String>,
    ) -> Self {
        IngestedRecord {
            id: Uuid::new_v4(),
            data_source_id,
            symbol: symbol.to_string(),
            value,
            timestamp,
            payload,
        }
    }
}

/// Health status of a component.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum HealthStatus {
    /// Working normally.
    #[default]
    Healthy,
    /// Working, but slow or under pressure.
    Degraded,
    /// Not working.
    Unhealthy,
}

/// Resource metrics attached to a health record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    /// CPU usage in percent.
    pub cpu_usage: u32,
    /// Memory usage in percent.
    pub memory_usage: u32,
    /// Response time in milliseconds, `responseTime` on the wire.
    #[serde(rename = "responseTime", alias = "responseTimeMs")]
    pub response_time_ms: u32,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        HealthMetrics {
            cpu_usage: 25,
            memory_usage: 30,
            response_time_ms: 120,
        }
    }
}

/// One entry of the component health history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    /// Unique per entry.
    pub id: Uuid,
    /// Display name, same as the component unless set otherwise.
    pub name: String,
    /// Component the entry describes.
    pub component: String,
    /// Status at check time.
    pub status: HealthStatus,
    /// Optional human-readable note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Resource metrics, when the check measured any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HealthMetrics>,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
}

impl HealthRecord {
    /// Entry for `component` with no message or metrics.
    pub fn new(component: &str, status: HealthStatus, timestamp: DateTime<Utc>) -> Self {
        HealthRecord {
            id: Uuid::new_v4(),
            name: component.to_string(),
            component: component.to_string(),
            status,
            message: None,
            metrics: None,
            timestamp,
        }
    }

    /// Attach a note.
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Attach metrics.
    pub fn with_metrics(mut self, metrics: HealthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Throughput counters of one ingestion tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    /// When the tick started.
    pub timestamp: DateTime<Utc>,
    /// Records emitted this tick.
    pub rate: u64,
    /// Running total since process start.
    pub total_records: u64,
    /// Records counted as successes.
    pub success_count: u64,
    /// Failures counted this tick.
    pub error_count: u64,
}

impl TickSummary {
    /// Summary of a tick that produced nothing.
    pub fn empty(timestamp: DateTime<Utc>, total_records: u64) -> Self {
        TickSummary {
            timestamp,
            rate: 0,
            total_records,
            success_count: 0,
            error_count: 0,
        }
    }
}
