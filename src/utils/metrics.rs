//! Observability and Metrics
//!
//! Atomic counters for frames sent and captured.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters shared by the sender and receiver services
#[derive(Debug)]
pub struct Metrics {
    /// Frames handed to the raw socket
    pub frames_sent: AtomicU64,
    /// Bytes handed to the raw socket
    pub bytes_sent: AtomicU64,
    /// Entry records transmitted
    pub entries_sent: AtomicU64,
    /// Frames read from the raw socket
    pub frames_captured: AtomicU64,
    /// Captured frames that passed the protocol filter
    pub frames_matched: AtomicU64,
    /// Relation stacks decoded from matched frames
    pub relations_decoded: AtomicU64,
    /// Matched frames that failed to parse
    pub decode_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            entries_sent: AtomicU64::new(0),
            frames_captured: AtomicU64::new(0),
            frames_matched: AtomicU64::new(0),
            relations_decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn frame_sent(&self, bytes: usize, entries: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.entries_sent.fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_matched(&self) {
        self.frames_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relation_decoded(&self) {
        self.relations_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            entries_sent: self.entries_sent.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_matched: self.frames_matched.load(Ordering::Relaxed),
            relations_decoded: self.relations_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }

    /// Log all counters at info level
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            frames_sent = s.frames_sent,
            bytes_sent = s.bytes_sent,
            entries_sent = s.entries_sent,
            frames_captured = s.frames_captured,
            frames_matched = s.frames_matched,
            relations_decoded = s.relations_decoded,
            decode_errors = s.decode_errors,
            uptime_secs = s.uptime_secs,
            "metrics summary"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub entries_sent: u64,
    pub frames_captured: u64,
    pub frames_matched: u64,
    pub relations_decoded: u64,
    pub decode_errors: u64,
    pub uptime_secs: u64,
}
