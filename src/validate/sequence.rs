//! Sequence-continuity tracking for `full_update` packets.
//!
//! A well-behaved client increments `sequence` by exactly one between
//! consecutive `full_update` messages. A gap or regression means frames were
//! dropped or reordered in transit — worth a warning, but the packet itself
//! is still valid. The tracker always advances to the observed value, so one
//! bad jump yields one warning instead of an endless cascade.
//!
//! State is per connection and must be reset when a new client connects.

use crate::message::Message;

/// Per-connection sequence continuity tracker.
#[derive(Debug, Default)]
pub struct SequenceValidator {
    last_sequence: Option<i64>,
    discontinuities: u64,
}

impl SequenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed `sequence` value on this connection.
    pub fn last_sequence(&self) -> Option<i64> {
        self.last_sequence
    }

    /// Discontinuities observed since the last reset.
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Observe one message; returns a warning when continuity breaks.
    ///
    /// Messages that are not `full_update`, or whose `sequence` is missing
    /// or malformed, are ignored.
    pub fn observe(&mut self, message: &Message) -> Option<String> {
        let sequence = message.sequence()?;

        let warning = match self.last_sequence {
            Some(last) if sequence != last.wrapping_add(1) => {
                self.discontinuities += 1;
                Some(format!(
                    "Sequence discontinuity: expected {}, got {sequence}",
                    last.wrapping_add(1)
                ))
            }
            _ => None,
        };

        self.last_sequence = Some(sequence);
        warning
    }

    /// Clear state for a fresh connection.
    pub fn reset(&mut self) {
        self.last_sequence = None;
        self.discontinuities = 0;
    }
}
