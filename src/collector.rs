//! Bounded lock-free collector for instrumentation records
//!
//! Intercepted calls run on arbitrary threads, so the after-hook side only
//! enqueues into a `crossbeam::queue::ArrayQueue`; a reader drains batches
//! whenever it likes. A full buffer drops the new record and counts it
//! instead of blocking the intercepted call.

use crate::interceptor::AfterHook;
use crate::invocation::Invocation;
use crate::record::InstrumentationRecord;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Collector counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorStats {
    pub total_pushed: u64,
    pub total_dropped: u64,
    pub current_size: usize,
    pub capacity: usize,
}

/// Lock-free record buffer
///
/// # Example
/// ```
/// use interpose::collector::RecordCollector;
///
/// let collector = RecordCollector::new(128);
/// assert!(collector.is_empty());
/// assert_eq!(collector.stats().capacity, 128);
/// ```
#[derive(Debug)]
pub struct RecordCollector {
    queue: ArrayQueue<InstrumentationRecord>,
    slow_call_threshold_us: Option<u64>,
    capture_arguments: bool,
    total_pushed: AtomicU64,
    total_dropped: AtomicU64,
}

impl RecordCollector {
    /// Create a collector holding at most `capacity` records
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Collector capacity must be > 0");

        Self {
            queue: ArrayQueue::new(capacity),
            slow_call_threshold_us: None,
            capture_arguments: false,
            total_pushed: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Log calls lasting at least `threshold_us` microseconds at warn level
    pub fn with_slow_call_threshold(mut self, threshold_us: Option<u64>) -> Self {
        self.slow_call_threshold_us = threshold_us;
        self
    }

    /// Keep each call's arguments on the records delivered through [`Self::after_hook`]
    pub fn with_argument_capture(mut self, capture: bool) -> Self {
        self.capture_arguments = capture;
        self
    }

    pub fn captures_arguments(&self) -> bool {
        self.capture_arguments
    }

    /// Enqueue a record (hot path, never blocks)
    ///
    /// Returns `false` if the buffer was full and the record was dropped.
    pub fn push(&self, record: InstrumentationRecord) -> bool {
        self.total_pushed.fetch_add(1, Ordering::Relaxed);

        if let Some(threshold) = self.slow_call_threshold_us {
            let duration_us = record.duration_us();
            if duration_us >= threshold {
                tracing::warn!(
                    type_name = record.type_name(),
                    operation = record.operation_name(),
                    duration_us,
                    "slow intercepted call"
                );
            }
        }

        match self.queue.push(record) {
            Ok(()) => true,
            Err(_dropped) => {
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    capacity = self.queue.capacity(),
                    "record collector full, record dropped"
                );
                false
            }
        }
    }

    /// Remove up to `max` records, oldest first
    pub fn drain(&self, max: usize) -> Vec<InstrumentationRecord> {
        let mut batch = Vec::with_capacity(max.min(self.queue.len()));
        while batch.len() < max {
            match self.queue.pop() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        batch
    }

    /// Remove every buffered record
    pub fn drain_all(&self) -> Vec<InstrumentationRecord> {
        let mut batch = Vec::with_capacity(self.queue.len());
        while let Some(record) = self.queue.pop() {
            batch.push(record);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    /// After-hook that pushes every record into this collector
    pub fn after_hook(self: &Arc<Self>) -> AfterHook {
        let collector = Arc::clone(self);
        Arc::new(move |invocation: &Invocation, record: InstrumentationRecord| {
            let record = if collector.capture_arguments {
                record.with_arguments(invocation.arguments().to_vec())
            } else {
                record
            };
            collector.push(record);
            Ok(())
        })
    }
}
