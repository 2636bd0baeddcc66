//! Per-operation timing aggregation
//!
//! Folds instrumentation records into call counts and duration totals per
//! operation, and prints a summary table sorted by total time.

use crate::operation::OperationKey;
use crate::record::InstrumentationRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Statistics for a single operation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationStats {
    /// Number of recorded calls
    pub calls: u64,
    /// Total time spent in the operation (microseconds)
    pub total_time_us: u64,
    /// Fastest call (microseconds)
    pub min_time_us: u64,
    /// Slowest call (microseconds)
    pub max_time_us: u64,
}

impl OperationStats {
    fn record(&mut self, duration_us: u64) {
        if self.calls == 0 {
            self.min_time_us = duration_us;
            self.max_time_us = duration_us;
        } else {
            self.min_time_us = self.min_time_us.min(duration_us);
            self.max_time_us = self.max_time_us.max(duration_us);
        }
        self.calls += 1;
        self.total_time_us += duration_us;
    }

    /// Mean call time in microseconds (0 when no calls)
    pub fn avg_time_us(&self) -> u64 {
        if self.calls > 0 {
            self.total_time_us / self.calls
        } else {
            0
        }
    }
}

/// Summary totals across all operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatTotals {
    pub operations: usize,
    pub total_calls: u64,
    pub total_time_us: u64,
}

/// Aggregates records per operation
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: HashMap<OperationKey, OperationStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &InstrumentationRecord) {
        self.record_duration(record.key(), record.duration_us());
    }

    pub fn record_duration(&mut self, key: OperationKey, duration_us: u64) {
        self.stats.entry(key).or_default().record(duration_us);
    }

    pub fn extend<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a InstrumentationRecord>,
    {
        for record in records {
            self.record(record);
        }
    }

    pub fn get(&self, key: &OperationKey) -> Option<&OperationStats> {
        self.stats.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Operations sorted by total time, descending (ties by name)
    pub fn sorted(&self) -> Vec<(&OperationKey, &OperationStats)> {
        let mut sorted: Vec<_> = self.stats.iter().collect();
        sorted.sort_by(|a, b| {
            b.1.total_time_us
                .cmp(&a.1.total_time_us)
                .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
        });
        sorted
    }

    pub fn totals(&self) -> StatTotals {
        StatTotals {
            operations: self.stats.len(),
            total_calls: self.stats.values().map(|s| s.calls).sum(),
            total_time_us: self.stats.values().map(|s| s.total_time_us).sum(),
        }
    }

    /// Render the summary table
    pub fn format_summary(&self) -> String {
        if self.stats.is_empty() {
            return "No instrumentation data collected.\n".to_string();
        }

        let mut out = String::new();
        out.push_str(&format!(
            "{:<40} {:>10} {:>12} {:>12} {:>12} {:>12}\n",
            "Operation", "Calls", "Total Time", "Avg Time", "Min (us)", "Max (us)"
        ));
        out.push_str(&format!("{}\n", "─".repeat(103)));

        for (key, stats) in self.sorted() {
            let total_seconds = stats.total_time_us as f64 / 1_000_000.0;
            let avg_seconds = stats.avg_time_us() as f64 / 1_000_000.0;
            out.push_str(&format!(
                "{:<40} {:>10} {:>11.6}s {:>11.6}s {:>12} {:>12}\n",
                key.to_string(),
                stats.calls,
                total_seconds,
                avg_seconds,
                stats.min_time_us,
                stats.max_time_us
            ));
        }

        let totals = self.totals();
        out.push_str(&format!("{}\n", "─".repeat(103)));
        out.push_str(&format!(
            "{:<40} {:>10} {:>11.6}s\n",
            "total",
            totals.total_calls,
            totals.total_time_us as f64 / 1_000_000.0
        ));
        out
    }

    /// Print the summary table to stderr
    pub fn print_summary(&self) {
        eprintln!("\n╔════════════════════════════════════════════════════════════════════════════════╗");
        eprintln!("║  Intercepted Operation Summary (sorted by total time)                          ║");
        eprintln!("╚════════════════════════════════════════════════════════════════════════════════╝");
        eprintln!();
        eprint!("{}", self.format_summary());
    }
}
