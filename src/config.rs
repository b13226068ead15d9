//! Harness configuration.
//!
//! A single immutable [`HarnessConfig`] is constructed at startup and passed
//! by reference into each component's constructor. There is no process-wide
//! mutable settings map; anything a component needs is copied out of the
//! config when the component is built.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::framing::FramingMode;

/// Default listen port for the telemetry client.
pub const DEFAULT_PORT: u16 = 9876;

/// Default cap on a single frame's payload size (1 MiB).
///
/// A declared length-prefix above this, or a newline-mode line that grows past
/// it without a terminator, is treated as a framing fault rather than buffered
/// indefinitely.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Default capacity of the rolling statistics windows.
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// Immutable harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,

    /// Framing convention for incoming connections.
    pub framing: FramingMode,

    /// Schema version string the validator accepts without warning.
    pub accepted_schema_version: String,

    /// Upper bound on a single frame payload, in bytes.
    pub max_frame_len: usize,

    /// Rolling-window capacity for rate/size statistics.
    pub window_capacity: usize,

    /// Window within which identical log lines are deduplicated.
    pub log_dedupe_window: Duration,

    /// Suggested refresh interval for an external dashboard consumer.
    pub dashboard_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            framing: FramingMode::Auto,
            accepted_schema_version: "1.0".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            log_dedupe_window: Duration::from_secs(60),
            dashboard_interval: Duration::from_secs(5),
        }
    }
}

impl HarnessConfig {
    /// Configuration bound to an ephemeral loopback port, for tests.
    pub fn ephemeral() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            ..Self::default()
        }
    }
}
