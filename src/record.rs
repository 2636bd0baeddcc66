//! Per-call instrumentation records
//!
//! One `InstrumentationRecord` is built for every call routed through an
//! enabled interceptor whose forwarded segment completed. The timing window
//! covers only the replaced/original implementation, never the hooks.
//!
//! Wall-clock start is sampled once; the end is derived from a monotonic
//! `Instant` measurement, so `end_time >= start_time` holds even if the
//! system clock steps backwards mid-call.

use crate::operation::{OperationKey, OperationKind};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Timing data for one completed call
///
/// Records compare equal only to themselves: every record carries a
/// process-unique `call_id`, so two calls with identical fields still yield
/// distinct records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentationRecord {
    call_id: u64,
    type_name: String,
    operation_name: String,
    is_instance_level: bool,
    #[serde(rename = "start_time_nanos", serialize_with = "serialize_unix_nanos")]
    start_time: SystemTime,
    #[serde(rename = "end_time_nanos", serialize_with = "serialize_unix_nanos")]
    end_time: SystemTime,
    /// Seconds
    duration: f64,
    /// Call arguments, present only when a consumer opted into capturing them
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
}

impl InstrumentationRecord {
    /// Build a record for a segment that started at `start_time` and ran for `elapsed`
    pub fn new(key: &OperationKey, start_time: SystemTime, elapsed: Duration) -> Self {
        Self {
            call_id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
            type_name: key.type_name.clone(),
            operation_name: key.operation.clone(),
            is_instance_level: key.is_instance_level(),
            start_time,
            end_time: start_time + elapsed,
            duration: elapsed.as_secs_f64(),
            arguments: None,
        }
    }

    /// Attach the arguments the call ran with
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Captured arguments, if any were attached
    pub fn arguments(&self) -> Option<&[Value]> {
        self.arguments.as_deref()
    }

    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn is_instance_level(&self) -> bool {
        self.is_instance_level
    }

    pub fn kind(&self) -> OperationKind {
        OperationKind::from_instance_level(self.is_instance_level)
    }

    /// Rebuild the dispatch key this record was produced for
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.type_name.clone(), self.operation_name.clone(), self.kind())
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }

    /// Execution time in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Execution time as a `Duration`
    pub fn elapsed(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }

    pub fn duration_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }
}

/// Measures the forwarded segment of one call
#[derive(Debug)]
pub(crate) struct SegmentTimer {
    wall: SystemTime,
    mono: Instant,
}

impl SegmentTimer {
    pub(crate) fn start() -> Self {
        Self {
            wall: SystemTime::now(),
            mono: Instant::now(),
        }
    }

    pub(crate) fn finish(self, key: &OperationKey) -> InstrumentationRecord {
        InstrumentationRecord::new(key, self.wall, self.mono.elapsed())
    }
}

fn serialize_unix_nanos<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_derives_end_and_duration() {
        let key = OperationKey::instance("Calculator", "compute");
        let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let record = InstrumentationRecord::new(&key, start, Duration::from_millis(250));

        assert_eq!(record.type_name(), "Calculator");
        assert_eq!(record.operation_name(), "compute");
        assert!(record.is_instance_level());
        assert_eq!(record.end_time(), start + Duration::from_millis(250));
        assert!((record.duration() - 0.25).abs() < 1e-9);
        assert_eq!(record.duration_us(), 250_000);
        assert_eq!(record.key(), key);
    }

    #[test]
    fn test_identical_calls_yield_distinct_records() {
        let key = OperationKey::type_level("Store", "shared");
        let start = UNIX_EPOCH;
        let a = InstrumentationRecord::new(&key, start, Duration::ZERO);
        let b = InstrumentationRecord::new(&key, start, Duration::ZERO);

        assert_ne!(a.call_id(), b.call_id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_segment_timer_is_monotonic() {
        let key = OperationKey::instance("Worker", "run");
        let timer = SegmentTimer::start();
        thread::sleep(Duration::from_millis(5));
        let record = timer.finish(&key);

        assert!(record.end_time() >= record.start_time());
        assert!(record.duration() >= 0.005);
        assert_eq!(record.kind(), OperationKind::Instance);
    }

    #[test]
    fn test_serializes_every_field_by_name() {
        let key = OperationKey::type_level("Store", "shared");
        let start = UNIX_EPOCH + Duration::from_secs(2);
        let record = InstrumentationRecord::new(&key, start, Duration::from_secs(1));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type_name"], "Store");
        assert_eq!(json["operation_name"], "shared");
        assert_eq!(json["is_instance_level"], false);
        assert_eq!(json["start_time_nanos"], 2_000_000_000u64);
        assert_eq!(json["end_time_nanos"], 3_000_000_000u64);
        assert_eq!(json["duration"], 1.0);
        assert!(json["call_id"].is_u64());
        assert!(json.get("arguments").is_none());
    }

    #[test]
    fn test_with_arguments_keeps_timing() {
        let key = OperationKey::instance("Calculator", "compute");
        let record = InstrumentationRecord::new(&key, UNIX_EPOCH, Duration::from_millis(3));
        let call_id = record.call_id();
        let record = record.with_arguments(vec![serde_json::json!(5)]);

        assert_eq!(record.call_id(), call_id);
        assert_eq!(record.duration_us(), 3_000);
        assert_eq!(record.arguments(), Some(&[serde_json::json!(5)][..]));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["arguments"], serde_json::json!([5]));
    }
}
