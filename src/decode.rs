//! Frame payload decoding.
//!
//! Sits between the frame reader and the validators: takes one [`RawFrame`]
//! and produces either a typed [`Message`] or a [`DecodeError`] describing why
//! the payload could not be understood. Decode failure is strictly local — it
//! is counted and logged with a bounded preview, and the stream continues
//! with the next frame.

use std::fmt;

use crate::framing::RawFrame;
use crate::message::Message;

/// Maximum number of payload bytes echoed into diagnostics.
const PREVIEW_LEN: usize = 100;

/// Why a frame payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Payload was not valid UTF-8.
    InvalidUtf8,
    /// Payload was not parseable JSON.
    InvalidJson(String),
    /// Payload parsed but was not a JSON object.
    NotAnObject,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFailure::InvalidUtf8 => write!(f, "payload is not valid UTF-8"),
            DecodeFailure::InvalidJson(detail) => write!(f, "invalid JSON: {detail}"),
            DecodeFailure::NotAnObject => write!(f, "payload is not a JSON object"),
        }
    }
}

/// Diagnostic record for one undecodable frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Position of the frame in the connection's stream (1-based, counting
    /// every emitted frame including failed ones).
    pub frame_index: u64,
    /// Size of the offending payload in bytes.
    pub byte_length: usize,
    /// What went wrong.
    pub failure: DecodeFailure,
    /// Up to the first 100 bytes of the payload, lossily stringified.
    pub preview: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {} ({} bytes): {}", self.frame_index, self.byte_length, self.failure)
    }
}

/// Stateful decoder for one connection; tracks the running frame index so
/// decode errors can say which frame broke.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    frames_seen: u64,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames decoded or rejected so far on this connection.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Decode one frame payload into a typed message.
    pub fn decode(&mut self, frame: RawFrame) -> Result<Message, DecodeError> {
        self.frames_seen += 1;
        let index = self.frames_seen;

        let text = match std::str::from_utf8(&frame) {
            Ok(text) => text,
            Err(_) => return Err(self.error(index, &frame, DecodeFailure::InvalidUtf8)),
        };

        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                return Err(self.error(index, &frame, DecodeFailure::InvalidJson(e.to_string())));
            }
        };

        match Message::from_value(value) {
            Some(message) => Ok(message),
            None => Err(self.error(index, &frame, DecodeFailure::NotAnObject)),
        }
    }

    fn error(&self, frame_index: u64, payload: &[u8], failure: DecodeFailure) -> DecodeError {
        let preview_bytes = &payload[..payload.len().min(PREVIEW_LEN)];
        DecodeError {
            frame_index,
            byte_length: payload.len(),
            failure,
            preview: String::from_utf8_lossy(preview_bytes).into_owned(),
        }
    }
}
