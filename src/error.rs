//! Error types for the telemetry harness.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. The taxonomy follows the harness failure model:
//!
//! - **Bind errors**: failure to bind or listen on the configured address —
//!   the only startup-fatal condition.
//! - **Io errors**: socket read failures or abrupt disconnects; these end the
//!   current connection's receive path and return the harness to
//!   accept-waiting, never terminating the process.
//! - **Framing errors**: an unrecoverable framing-layer fault (oversized
//!   declared length, unterminated line past the cap). The byte stream cannot
//!   be resynchronized afterwards, so the connection is dropped.
//!
//! Decode failures are deliberately *not* represented here: a malformed
//! payload is data, not control flow. See [`crate::decode::DecodeError`].

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Main error type for harness operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HarnessError {
    #[error("Failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Declared frame length {declared} exceeds cap of {cap} bytes")]
    FrameTooLarge { declared: usize, cap: usize },

    #[error("Framing error: {reason}")]
    Framing { reason: String },
}

impl HarnessError {
    /// Returns whether this error leaves the process able to keep serving.
    ///
    /// Everything except a bind failure is scoped to a single connection.
    pub fn is_connection_scoped(&self) -> bool {
        !matches!(self, HarnessError::Bind { .. })
    }

    /// Helper constructor for bind failures.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        HarnessError::Bind { addr, source }
    }

    /// Helper constructor for socket I/O errors with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HarnessError::Io { context: context.into(), source }
    }

    /// Helper constructor for framing-layer faults.
    pub fn framing(reason: impl Into<String>) -> Self {
        HarnessError::Framing { reason: reason.into() }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Io { context: "socket operation".to_string(), source: err }
    }
}
