//! Live aggregate statistics.
//!
//! The aggregator keeps fixed-capacity rolling windows of recent samples and
//! derives everything else on demand. Long-run figures are therefore windowed
//! approximations rather than true historical means — a deliberate
//! memory/accuracy tradeoff for a live dashboard, not a bug.
//!
//! Known quirk preserved for compatibility: the bandwidth estimate divides a
//! *windowed* byte sum by the *lifetime* elapsed time. It understates
//! bandwidth on long sessions and that is accepted for monitoring tooling.
//!
//! Time is injected (`record_at` / `snapshot_at`) so trailing-window behavior
//! is testable without sleeping; the public `record` / `snapshot` wrappers
//! use `Instant::now()`.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use crate::message::Message;

/// Width of the trailing window used for the data-rate figure.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-capacity FIFO sample buffer.
///
/// Pushing past capacity evicts the oldest sample; insertion order defines
/// eviction order.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}

/// Avg/min/max over one retained window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub avg: f64,
    pub min: u64,
    pub max: u64,
}

impl WindowStats {
    fn over(window: &RollingWindow<u64>) -> Option<Self> {
        if window.is_empty() {
            return None;
        }
        let mut min = u64::MAX;
        let mut max = 0u64;
        let mut sum = 0u64;
        for &sample in window.iter() {
            min = min.min(sample);
            max = max.max(sample);
            sum += sample;
        }
        Some(Self { avg: sum as f64 / window.len() as f64, min, max })
    }
}

/// Read-only statistics projection, computed at snapshot time.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Lifetime packet count (not windowed).
    pub packets_received: u64,
    /// Messages per second over the trailing 60 s window.
    pub data_rate: f64,
    /// Wire-size stats over the retained window, in bytes.
    pub size_stats: Option<WindowStats>,
    /// Unit-count stats over the retained window.
    pub unit_stats: Option<WindowStats>,
    /// Lifetime per-variant message counts.
    pub variant_counts: BTreeMap<String, u64>,
    /// Lifetime decode-error count.
    pub decode_errors: u64,
    /// Windowed byte sum over lifetime elapsed seconds (see module docs).
    pub bandwidth_bytes_per_sec: f64,
    /// Time since the aggregator was created.
    pub elapsed: Duration,
}

/// Rolling statistics over one harness lifetime.
///
/// Mutated only from the receive path; read via [`snapshot`](Self::snapshot),
/// which never mutates the windows.
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: Instant,
    packets_received: u64,
    decode_errors: u64,
    packet_times: RollingWindow<Instant>,
    sizes: RollingWindow<u64>,
    unit_counts: RollingWindow<u64>,
    variant_counts: BTreeMap<&'static str, u64>,
    last_packet_at: Option<Instant>,
}

impl StatsAggregator {
    pub fn new(window_capacity: usize) -> Self {
        Self::with_start(window_capacity, Instant::now())
    }

    pub(crate) fn with_start(window_capacity: usize, started_at: Instant) -> Self {
        Self {
            started_at,
            packets_received: 0,
            decode_errors: 0,
            packet_times: RollingWindow::new(window_capacity),
            sizes: RollingWindow::new(window_capacity),
            unit_counts: RollingWindow::new(window_capacity),
            variant_counts: BTreeMap::new(),
            last_packet_at: None,
        }
    }

    /// Record one decoded message and its wire size.
    pub fn record(&mut self, message: &Message, wire_size: usize) {
        self.record_at(message, wire_size, Instant::now());
    }

    pub(crate) fn record_at(&mut self, message: &Message, wire_size: usize, now: Instant) {
        self.packets_received += 1;
        self.packet_times.push(now);
        self.sizes.push(wire_size as u64);
        if let Some(count) = message.unit_count() {
            self.unit_counts.push(count as u64);
        }
        *self.variant_counts.entry(message.variant_label()).or_insert(0) += 1;
        self.last_packet_at = Some(now);
    }

    /// Count one undecodable frame.
    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    /// Instant the most recent packet arrived, if any.
    pub fn last_packet_at(&self) -> Option<Instant> {
        self.last_packet_at
    }

    /// Compute the current statistics projection.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let elapsed = now.duration_since(self.started_at);

        let recent =
            self.packet_times.iter().filter(|&&t| now.duration_since(t) < RATE_WINDOW).count();

        // Early in the aggregator's life the 60 s window is mostly empty air;
        // dividing by the full window would understate a client that has only
        // been sending for a few seconds. Clamp the divisor to the time
        // actually covered.
        let span = elapsed.min(RATE_WINDOW).as_secs_f64();
        let data_rate = if recent == 0 || span < 1e-3 { 0.0 } else { recent as f64 / span };

        let windowed_bytes: u64 = self.sizes.iter().sum();
        let bandwidth_bytes_per_sec = if elapsed.as_secs_f64() > 0.0 {
            windowed_bytes as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        StatsSnapshot {
            packets_received: self.packets_received,
            data_rate,
            size_stats: WindowStats::over(&self.sizes),
            unit_stats: WindowStats::over(&self.unit_counts),
            variant_counts: self
                .variant_counts
                .iter()
                .map(|(&label, &count)| (label.to_string(), count))
                .collect(),
            decode_errors: self.decode_errors,
            bandwidth_bytes_per_sec,
            elapsed,
        }
    }
}
