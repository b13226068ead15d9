//! Per-frame processing pipeline.
//!
//! One [`Pipeline`] owns the decode → validate → record fan-out for a
//! harness. Frames are ingested strictly in arrival order; validation and
//! statistics recording for a message complete before the next frame is
//! touched. Nothing here performs I/O — the pipeline is a synchronous
//! transform over already-delivered frames, which keeps backpressure entirely
//! at the socket-read boundary.
//!
//! Decoder and sequence state are per connection and reset through
//! [`Pipeline::on_new_connection`]; the statistics aggregator, schema
//! bookkeeping, and dedupe cache span the harness lifetime.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::decode::MessageDecoder;
use crate::dedupe::{DedupeCache, LogDecision, Severity};
use crate::framing::RawFrame;
use crate::message::Message;
use crate::stats::{StatsAggregator, StatsSnapshot};
use crate::validate::{SchemaValidator, SequenceValidator, ValidationVerdict};

/// Decode/validate/record engine for one harness.
#[derive(Debug)]
pub struct Pipeline {
    decoder: MessageDecoder,
    schema: SchemaValidator,
    sequence: SequenceValidator,
    stats: StatsAggregator,
    dedupe: DedupeCache,
    last_message: Option<Message>,
    last_verdict: Option<ValidationVerdict>,
}

impl Pipeline {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            decoder: MessageDecoder::new(),
            schema: SchemaValidator::new(config.accepted_schema_version.clone()),
            sequence: SequenceValidator::new(),
            stats: StatsAggregator::new(config.window_capacity),
            dedupe: DedupeCache::new(config.log_dedupe_window),
            last_message: None,
            last_verdict: None,
        }
    }

    /// Reset per-connection state. Statistics and schema bookkeeping survive
    /// across connections; sequence continuity and frame indexing do not.
    pub fn on_new_connection(&mut self) {
        self.decoder = MessageDecoder::new();
        self.sequence.reset();
    }

    /// Process one reassembled frame payload.
    pub fn ingest_frame(&mut self, frame: RawFrame) {
        self.ingest_frame_at(frame, Instant::now());
    }

    pub(crate) fn ingest_frame_at(&mut self, frame: RawFrame, now: Instant) {
        // Surface any dedupe summaries whose window rolled over
        for (severity, summary) in self.dedupe.flush_expired(now) {
            emit(severity, &summary);
        }

        let wire_size = frame.len();
        let message = match self.decoder.decode(frame) {
            Ok(message) => message,
            Err(decode_err) => {
                self.stats.record_decode_error();
                self.log_deduped(Severity::Error, &decode_err.to_string(), now);
                debug!("Raw data: {}", decode_err.preview);
                return;
            }
        };

        self.stats.record_at(&message, wire_size, now);
        self.last_message = Some(message.clone());

        let mut verdict = self.schema.validate(&message);
        if let Some(gap) = self.sequence.observe(&message) {
            // Discontinuities never invalidate the packet itself
            verdict.warnings.push(gap);
        }

        let severity = if !verdict.errors.is_empty() {
            Severity::Error
        } else if !verdict.warnings.is_empty() {
            Severity::Warning
        } else {
            Severity::Info
        };
        self.log_deduped(severity, &verdict.summary(), now);

        self.last_verdict = Some(verdict);
    }

    /// Count a frame lost to a connection-level fault (framing or transport)
    /// so the dashboard error counter reflects it.
    pub fn record_stream_error(&mut self) {
        self.stats.record_decode_error();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        self.stats.snapshot_at(now)
    }

    /// Most recent message, valid or not.
    pub fn last_message(&self) -> Option<&Message> {
        self.last_message.as_ref()
    }

    /// Verdict for the most recent decodable message.
    pub fn last_verdict(&self) -> Option<&ValidationVerdict> {
        self.last_verdict.as_ref()
    }

    /// Most recent message that validated clean.
    pub fn last_known_good(&self) -> Option<&Message> {
        self.schema.last_known_good()
    }

    /// Last schema version any client declared.
    pub fn last_schema_version(&self) -> Option<&str> {
        self.schema.last_schema_version()
    }

    /// Sequence discontinuities on the current connection.
    pub fn discontinuities(&self) -> u64 {
        self.sequence.discontinuities()
    }

    /// Re-run schema validation on the last received message, without side
    /// effects on validator state.
    pub fn revalidate_last(&self) -> Option<ValidationVerdict> {
        self.last_message.as_ref().map(|message| self.schema.evaluate(message))
    }

    fn log_deduped(&mut self, severity: Severity, text: &str, now: Instant) {
        match self.dedupe.observe(severity, text, now) {
            LogDecision::Emit { flushed } => {
                if let Some(summary) = flushed {
                    emit(severity, &summary);
                }
                emit(severity, text);
            }
            LogDecision::Suppress => {}
        }
    }
}

fn emit(severity: Severity, text: &str) {
    match severity {
        Severity::Info => info!("{text}"),
        Severity::Warning => warn!("{text}"),
        Severity::Error => error!("{text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn pipeline() -> Pipeline {
        Pipeline::new(&HarnessConfig::default())
    }

    fn full_update_frame(sequence: i64) -> RawFrame {
        json!({
            "type": "full_update",
            "schema_version": "1.0",
            "timestamp": sequence as f64,
            "game_frame": sequence * 30,
            "game_time": sequence as f64,
            "is_paused": false,
            "game_speed": 1.0,
            "teams": [],
            "units": [{"id": 1, "position": [0.0, 0.0, 0.0]}],
            "is_spectator": false,
            "sequence": sequence
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn valid_frame_updates_everything() {
        let mut p = pipeline();
        p.ingest_frame(full_update_frame(1));

        assert_eq!(p.snapshot().packets_received, 1);
        assert!(p.last_message().is_some());
        assert!(p.last_verdict().unwrap().passed());
        assert!(p.last_known_good().is_some());
        assert_eq!(p.last_schema_version(), Some("1.0"));
    }

    #[test]
    fn decode_failure_counts_but_does_not_stop_stream() {
        let mut p = pipeline();
        p.ingest_frame(b"not json at all".to_vec());
        p.ingest_frame(full_update_frame(1));

        let snap = p.snapshot();
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.packets_received, 1);
        assert!(p.last_verdict().unwrap().passed());
    }

    #[test]
    fn invalid_message_is_last_received_but_not_last_known_good() {
        let mut p = pipeline();
        p.ingest_frame(full_update_frame(1));
        p.ingest_frame(json!({"type": "wedge"}).to_string().into_bytes());

        assert_eq!(p.last_message().unwrap().variant_label(), "unknown");
        assert!(!p.last_verdict().unwrap().passed());
        // Last-known-good still points at the earlier valid packet
        assert_eq!(p.last_known_good().unwrap().variant_label(), "full_update");
    }

    #[test]
    fn sequence_gap_lands_in_verdict_warnings() {
        let mut p = pipeline();
        for seq in [1, 2, 3] {
            p.ingest_frame(full_update_frame(seq));
        }
        p.ingest_frame(full_update_frame(5));

        let verdict = p.last_verdict().unwrap();
        assert!(verdict.passed());
        assert_eq!(
            verdict.warnings,
            vec!["Sequence discontinuity: expected 4, got 5".to_string()]
        );
        assert_eq!(p.discontinuities(), 1);
    }

    #[test]
    fn new_connection_resets_sequence_but_not_stats() {
        let mut p = pipeline();
        p.ingest_frame(full_update_frame(7));
        p.on_new_connection();
        // Would be a gap on the old connection; clean start on the new one
        p.ingest_frame(full_update_frame(1));

        assert!(p.last_verdict().unwrap().warnings.is_empty());
        assert_eq!(p.snapshot().packets_received, 2);
    }

    #[test]
    fn revalidate_last_is_side_effect_free() {
        let mut p = pipeline();
        assert!(p.revalidate_last().is_none());

        p.ingest_frame(json!({"game_frame": 1.5, "schema_version": "1.0"}).to_string().into_bytes());
        let verdict = p.revalidate_last().expect("have last message");
        assert!(!verdict.passed());

        // Re-running validation must not disturb last-known-good
        assert!(p.last_known_good().is_none());
    }

    #[test]
    fn ingest_respects_injected_time_for_rate() {
        let mut p = pipeline();
        let start = Instant::now();
        for i in 1..=9u64 {
            p.ingest_frame_at(full_update_frame(i as i64), start + Duration::from_millis(330 * i));
        }
        let snap = p.snapshot_at(start + Duration::from_millis(3000));
        // Windows are driven by injected instants, not wall clock
        assert_eq!(snap.packets_received, 9);
        assert!(snap.data_rate > 0.0);
    }
}
