//! Streaming frame reassembly.
//!
//! A telemetry client delivers bytes in arbitrarily-sized chunks; this module
//! turns those deliveries back into discrete message payloads. Two framing
//! conventions exist across client protocol revisions, modeled as
//! [`FramingStrategy`] implementations selected once at connection start:
//!
//! - [`NewlineFraming`]: one UTF-8 JSON document per `\n`-terminated line.
//!   Whitespace-only lines are skipped and do not count as frames.
//! - [`PrefixedFraming`]: `[u32 big-endian length][payload]`, frames packed
//!   back-to-back with no delimiter.
//!
//! The two conventions were never given a negotiation mechanism, so the
//! reader also supports [`FramingMode::Auto`], which sniffs the first byte of
//! the connection: JSON documents open with a printable character (`{`, `[`,
//! `"`, a digit, or whitespace), while a length prefix for any plausible
//! payload starts with a low binary byte.
//!
//! ## Invariants
//!
//! - The reader never blocks mid-emission: [`FrameReader::next_frame`] drains
//!   every complete frame currently buffered before reporting exhaustion.
//! - Reassembly is split-invariant: any chunking of a byte sequence produces
//!   the identical ordered frame sequence as delivering it whole.
//! - Consumed prefixes are discarded after each emitted frame, so the buffer
//!   does not grow without bound in steady state.
//!
//! A declared length above the configured cap (or a line that exceeds the cap
//! without a terminator) poisons the reader: the stream cannot be
//! resynchronized once the framing layer is in doubt, so the connection is
//! torn down and the harness returns to accept-waiting.

use std::fmt;

use crate::{HarnessError, Result};

/// One complete message payload, ready for decoding. Never retained past the
/// decode call that consumes it.
pub type RawFrame = Vec<u8>;

/// Framing convention for a connection, fixed at connection start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// One frame per `\n`-terminated line.
    NewlineDelimited,
    /// `[u32 big-endian length][payload]` records.
    LengthPrefixed,
    /// Sniff the first delivered byte, then lock to one of the above.
    Auto,
}

/// A framing convention: how to carve one frame off the front of the buffer.
///
/// Implementations consume the bytes of any frame they emit (and any
/// inter-frame filler such as blank lines) and leave partial frames in place.
pub trait FramingStrategy: Send + fmt::Debug {
    /// Extract the next complete frame, or `None` if more bytes are needed.
    fn next_frame(&mut self, buffer: &mut Vec<u8>, max_frame_len: usize)
    -> Result<Option<RawFrame>>;
}

/// Newline-delimited framing: a frame ends at the first `\n`.
#[derive(Debug, Default)]
pub struct NewlineFraming;

impl FramingStrategy for NewlineFraming {
    fn next_frame(
        &mut self,
        buffer: &mut Vec<u8>,
        max_frame_len: usize,
    ) -> Result<Option<RawFrame>> {
        loop {
            match buffer.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    // The cap holds even when the terminator arrived in the
                    // same delivery as the oversized line
                    if newline > max_frame_len {
                        return Err(HarnessError::FrameTooLarge {
                            declared: newline,
                            cap: max_frame_len,
                        });
                    }
                    let mut line: Vec<u8> = buffer.drain(..=newline).collect();
                    line.pop(); // drop the terminator
                    if line.iter().all(|b| b.is_ascii_whitespace()) {
                        // Blank line between packets, not a frame
                        continue;
                    }
                    return Ok(Some(line));
                }
                None => {
                    if buffer.len() > max_frame_len {
                        return Err(HarnessError::FrameTooLarge {
                            declared: buffer.len(),
                            cap: max_frame_len,
                        });
                    }
                    return Ok(None);
                }
            }
        }
    }
}

/// Length-prefixed framing: `[u32 big-endian length][payload]`.
#[derive(Debug, Default)]
pub struct PrefixedFraming;

impl FramingStrategy for PrefixedFraming {
    fn next_frame(
        &mut self,
        buffer: &mut Vec<u8>,
        max_frame_len: usize,
    ) -> Result<Option<RawFrame>> {
        if buffer.len() < 4 {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        if declared > max_frame_len {
            return Err(HarnessError::FrameTooLarge { declared, cap: max_frame_len });
        }

        // Payload bytes must not be interpreted until all are present
        if buffer.len() < 4 + declared {
            return Ok(None);
        }

        let frame: Vec<u8> = buffer.drain(..4 + declared).skip(4).collect();
        Ok(Some(frame))
    }
}

/// Incremental frame reassembler for one connection.
///
/// Feed byte deliveries with [`push`](Self::push), then loop
/// [`next_frame`](Self::next_frame) until it yields `Ok(None)`. The reader is
/// not restartable: a new connection gets a new reader, and no partial frame
/// ever carries over.
#[derive(Debug)]
pub struct FrameReader {
    buffer: Vec<u8>,
    mode: FramingMode,
    strategy: Option<Box<dyn FramingStrategy>>,
    max_frame_len: usize,
    poisoned: bool,
}

impl FrameReader {
    /// Create a reader for the given mode and frame-size cap.
    pub fn new(mode: FramingMode, max_frame_len: usize) -> Self {
        let strategy: Option<Box<dyn FramingStrategy>> = match mode {
            FramingMode::NewlineDelimited => Some(Box::new(NewlineFraming)),
            FramingMode::LengthPrefixed => Some(Box::new(PrefixedFraming)),
            FramingMode::Auto => None,
        };
        Self { buffer: Vec::new(), mode, strategy, max_frame_len, poisoned: false }
    }

    /// Append one socket delivery to the reassembly buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes currently buffered awaiting frame completion.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// The configured mode (may be `Auto` even after resolution).
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Emit the next complete frame from the buffer, if one is present.
    ///
    /// Returns `Ok(None)` when the buffered bytes do not yet contain a full
    /// frame; the caller should deliver more bytes and retry. A framing fault
    /// poisons the reader, and every subsequent call repeats the failure.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.poisoned {
            return Err(HarnessError::framing("reader poisoned by earlier framing fault"));
        }

        if self.strategy.is_none() {
            self.strategy = sniff(&self.buffer);
        }
        let Some(strategy) = self.strategy.as_mut() else {
            return Ok(None); // Auto mode, no bytes yet
        };

        let result = strategy.next_frame(&mut self.buffer, self.max_frame_len);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }
}

/// Pick a strategy from the first delivered byte. JSON text opens with a
/// printable byte; a 4-byte big-endian prefix for any payload under 16 MiB
/// opens with 0x00.
fn sniff(buffer: &[u8]) -> Option<Box<dyn FramingStrategy>> {
    let first = *buffer.first()?;
    if first.is_ascii_whitespace() || first.is_ascii_graphic() {
        Some(Box::new(NewlineFraming))
    } else {
        Some(Box::new(PrefixedFraming))
    }
}
