//! Repeated-log suppression.
//!
//! A healthy telemetry client produces the same "validation successful" line
//! several times a second, and a broken one produces the same error just as
//! fast. [`DedupeCache`] keeps log output readable: the first occurrence of a
//! (severity, text) pair is emitted, repeats inside the window are counted
//! silently, and the count is flushed as a single `(xN in last minute)`
//! summary once the window rolls over.
//!
//! This is a discrete component with its own state and tests rather than a
//! side effect buried in a logging call. The cache is bounded: when it holds
//! more than `capacity` distinct lines, the stalest entry is evicted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Severity of a deduplicated log line. Maps onto `tracing` levels at the
/// emission site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What the caller should do with a log line it just produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDecision {
    /// Emit the line. If a prior run of suppressed duplicates just ended,
    /// `flushed` carries the summary text to emit first.
    Emit { flushed: Option<String> },
    /// Swallow the line; it has been counted toward the next summary.
    Suppress,
}

#[derive(Debug)]
struct Entry {
    last_emitted: Instant,
    pending: u64,
}

/// Bounded eviction cache keyed by (severity, exact text).
#[derive(Debug)]
pub struct DedupeCache {
    window: Duration,
    capacity: usize,
    entries: HashMap<(Severity, String), Entry>,
}

impl DedupeCache {
    /// Default bound on distinct tracked lines.
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(window: Duration, capacity: usize) -> Self {
        Self { window, capacity, entries: HashMap::new() }
    }

    /// Record one occurrence of a log line and decide whether to emit it.
    pub fn observe(&mut self, severity: Severity, text: &str, now: Instant) -> LogDecision {
        let key = (severity, text.to_string());

        if let Some(entry) = self.entries.get_mut(&key) {
            if now.duration_since(entry.last_emitted) < self.window {
                entry.pending += 1;
                return LogDecision::Suppress;
            }
            // Window rolled over: flush the suppressed count, then emit anew
            let flushed = (entry.pending > 0).then(|| summary(text, entry.pending));
            entry.last_emitted = now;
            entry.pending = 0;
            return LogDecision::Emit { flushed };
        }

        self.evict_if_full();
        self.entries.insert(key, Entry { last_emitted: now, pending: 0 });
        LogDecision::Emit { flushed: None }
    }

    /// Flush summaries for every entry whose window has rolled over.
    ///
    /// Called opportunistically (e.g. on each distinct log event or a
    /// dashboard tick) so suppressed counts surface even when the identical
    /// line never recurs.
    pub fn flush_expired(&mut self, now: Instant) -> Vec<(Severity, String)> {
        let window = self.window;
        let mut flushed = Vec::new();
        for ((severity, text), entry) in self.entries.iter_mut() {
            if entry.pending > 0 && now.duration_since(entry.last_emitted) >= window {
                flushed.push((*severity, summary(text, entry.pending)));
                entry.pending = 0;
                entry.last_emitted = now;
            }
        }
        flushed
    }

    /// Number of distinct lines currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_full(&mut self) {
        if self.entries.len() < self.capacity {
            return;
        }
        // Evict the stalest entry; its pending count is dropped, which is
        // acceptable for a diagnostics cache under churn.
        if let Some(stalest) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_emitted)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&stalest);
        }
    }
}

fn summary(text: &str, pending: u64) -> String {
    format!("{text} (x{pending} in last minute)")
}
