//! Metrics store shared by the event handlers, the reporter and shutdown.
//!
//! All state sits behind one mutex: a record either lands completely
//! (count, timestamp, size and latency together) or not at all, and
//! `snapshot()` waits for any write in progress.

use parking_lot::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::SwitchId;
use crate::snapshot::{Category, ConnectionEntry, MetricsSnapshot};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetricsError {
    #[error("category {0} does not track latency")]
    LatencyNotTracked(Category),
    #[error("invalid latency sample: {0} ms")]
    InvalidLatency(f64),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(f64),
}

/// Monotonic clock anchored to the wall-clock time the controller started.
///
/// Timestamps are seconds since the Unix epoch but advance with `Instant`,
/// so they never go backwards within a run.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    started: Instant,
    epoch_at_start: f64,
}

impl Clock {
    pub fn new() -> Self {
        let epoch_at_start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self { started: Instant::now(), epoch_at_start }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn timestamp_at(&self, instant: Instant) -> f64 {
        self.epoch_at_start + instant.saturating_duration_since(self.started).as_secs_f64()
    }

    pub fn now(&self) -> f64 {
        self.timestamp_at(Instant::now())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds between two instants, never negative.
pub fn elapsed_ms(start: Instant, end: Instant) -> f64 {
    end.saturating_duration_since(start).as_secs_f64() * 1000.0
}

/// One observed protocol message, validated before it reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    category: Category,
    timestamp: f64,
    size: u64,
    latency_ms: Option<f64>,
}

impl MessageRecord {
    pub fn new(category: Category, timestamp: f64, size: u64) -> Result<Self, MetricsError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(MetricsError::InvalidTimestamp(timestamp));
        }
        Ok(Self { category, timestamp, size, latency_ms: None })
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Result<Self, MetricsError> {
        validate_latency(self.category, latency_ms)?;
        self.latency_ms = Some(latency_ms);
        Ok(self)
    }
}

fn validate_latency(category: Category, latency_ms: f64) -> Result<(), MetricsError> {
    if !category.tracks_latency() {
        return Err(MetricsError::LatencyNotTracked(category));
    }
    if !latency_ms.is_finite() || latency_ms < 0.0 {
        return Err(MetricsError::InvalidLatency(latency_ms));
    }
    Ok(())
}

#[derive(Debug)]
pub struct MetricsStore {
    clock: Clock,
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock, inner: Mutex::new(MetricsSnapshot::new()) }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn record(&self, record: MessageRecord) {
        let mut metrics = self.inner.lock();
        let entry = metrics.category_mut(record.category);
        entry.count += 1;
        entry.timestamps.push(record.timestamp);
        entry.sizes.push(record.size);
        if let Some(latency) = record.latency_ms {
            entry.latencies.get_or_insert_with(Vec::new).push(latency);
        }
    }

    /// Append a latency sample that completes after the message was recorded
    /// (the packet-in end-to-end measurement).
    pub fn record_latency(&self, category: Category, latency_ms: f64) -> Result<(), MetricsError> {
        validate_latency(category, latency_ms)?;
        self.inner
            .lock()
            .category_mut(category)
            .latencies
            .get_or_insert_with(Vec::new)
            .push(latency_ms);
        Ok(())
    }

    /// Register a switch connection. Returns the establishment latency in
    /// milliseconds when this is the first connection of the process.
    pub fn record_connection(&self, switch: SwitchId, at: Instant) -> Option<f64> {
        let timestamp = self.clock.timestamp_at(at);
        let datetime = format_epoch(timestamp);

        let mut metrics = self.inner.lock();
        let connection = &mut metrics.connection;
        let establishment = connection.established.is_empty().then(|| elapsed_ms(self.clock.started(), at));
        if let Some(ms) = establishment {
            connection.establishment_times.push(ms);
        }
        connection.established.push(ConnectionEntry { dpid: switch, timestamp, datetime });
        connection.active_connections += 1;
        establishment
    }

    pub fn add_overhead(&self, header_bytes: u64, payload_bytes: u64) {
        let mut metrics = self.inner.lock();
        metrics.overhead.total_headers = metrics.overhead.total_headers.saturating_add(header_bytes);
        metrics.overhead.payload = metrics.overhead.payload.saturating_add(payload_bytes);
    }

    pub fn active_connections(&self) -> u64 {
        self.inner.lock().connection.active_connections
    }

    /// Consistent copy of everything recorded so far.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn format_epoch(seconds: f64) -> String {
    let nanos = (seconds * 1e9) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}
