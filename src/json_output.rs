//! JSON output format for instrumentation data

use crate::record::InstrumentationRecord;
use crate::stats::StatsAggregator;
use serde::Serialize;

/// Aggregated timings for one operation
#[derive(Debug, Clone, Serialize)]
pub struct JsonOperation {
    /// Display name (`Type#op` or `Type.op`)
    pub operation: String,
    pub type_name: String,
    pub operation_name: String,
    pub is_instance_level: bool,
    pub calls: u64,
    pub total_time_us: u64,
    pub avg_time_us: u64,
    pub min_time_us: u64,
    pub max_time_us: u64,
}

/// Summary statistics for the report
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub total_calls: u64,
    pub total_time_us: u64,
    /// Records lost to collector backpressure
    pub dropped_records: u64,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    /// Individual call records (empty unless requested)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<InstrumentationRecord>,
    pub operations: Vec<JsonOperation>,
    pub summary: JsonSummary,
}

impl JsonReport {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "interpose-json-v1".to_string(),
            records: Vec::new(),
            operations: Vec::new(),
            summary: JsonSummary {
                total_calls: 0,
                total_time_us: 0,
                dropped_records: 0,
            },
        }
    }

    /// Build a report from aggregated statistics
    pub fn from_stats(stats: &StatsAggregator) -> Self {
        let mut report = Self::new();
        report.operations = stats
            .sorted()
            .into_iter()
            .map(|(key, s)| JsonOperation {
                operation: key.to_string(),
                type_name: key.type_name.clone(),
                operation_name: key.operation.clone(),
                is_instance_level: key.is_instance_level(),
                calls: s.calls,
                total_time_us: s.total_time_us,
                avg_time_us: s.avg_time_us(),
                min_time_us: s.min_time_us,
                max_time_us: s.max_time_us,
            })
            .collect();

        let totals = stats.totals();
        report.summary.total_calls = totals.total_calls;
        report.summary.total_time_us = totals.total_time_us;
        report
    }

    pub fn add_record(&mut self, record: InstrumentationRecord) {
        self.records.push(record);
    }

    pub fn set_dropped_records(&mut self, dropped: u64) {
        self.summary.dropped_records = dropped;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for JsonReport {
    fn default() -> Self {
        Self::new()
    }
}
