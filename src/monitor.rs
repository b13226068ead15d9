//! Connection lifecycle observation.
//!
//! The monitor does not own the socket — accept/close events are driven
//! externally and the monitor only records transition timestamps so the
//! dashboard can report how long the current link has been stable.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Lifecycle state of the (at most one) client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No client has connected yet.
    Idle,
    Connected,
    Disconnected,
}

/// Point-in-time view of the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Peer address of the current or most recent connection.
    pub peer: Option<SocketAddr>,
    /// How long the current connection has been up.
    pub stable_for: Option<Duration>,
    /// Number of connections accepted after the first.
    pub reconnects: u64,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.state, self.stable_for) {
            (ConnectionState::Connected, Some(uptime)) => {
                let secs = uptime.as_secs();
                write!(f, "STABLE ({}m {}s)", secs / 60, secs % 60)
            }
            (ConnectionState::Idle, _) => write!(f, "IDLE"),
            _ => write!(f, "DISCONNECTED"),
        }
    }
}

/// Tracks connect/disconnect transitions for the single serviced client.
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    peer: Option<SocketAddr>,
    stable_since: Option<Instant>,
    connections_seen: u64,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self { state: ConnectionState::Idle, peer: None, stable_since: None, connections_seen: 0 }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Record a client connect.
    pub fn on_connect(&mut self, peer: SocketAddr) {
        self.on_connect_at(peer, Instant::now());
    }

    pub(crate) fn on_connect_at(&mut self, peer: SocketAddr, now: Instant) {
        self.state = ConnectionState::Connected;
        self.peer = Some(peer);
        self.stable_since = Some(now);
        self.connections_seen += 1;
    }

    /// Record a client disconnect (explicit close or natural teardown).
    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.stable_since = None;
    }

    /// Current status projection.
    pub fn status(&self) -> ConnectionStatus {
        self.status_at(Instant::now())
    }

    pub(crate) fn status_at(&self, now: Instant) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            peer: self.peer,
            stable_for: self.stable_since.map(|since| now.duration_since(since)),
            reconnects: self.connections_seen.saturating_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:55555".parse().unwrap()
    }

    #[test]
    fn starts_idle() {
        let monitor = ConnectionMonitor::new();
        let status = monitor.status();
        assert_eq!(status.state, ConnectionState::Idle);
        assert_eq!(status.to_string(), "IDLE");
        assert!(status.stable_for.is_none());
    }

    #[test]
    fn connect_then_disconnect_transitions() {
        let mut monitor = ConnectionMonitor::new();
        let start = Instant::now();

        monitor.on_connect_at(peer(), start);
        let status = monitor.status_at(start + Duration::from_secs(125));
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.stable_for, Some(Duration::from_secs(125)));
        assert_eq!(status.to_string(), "STABLE (2m 5s)");

        monitor.on_disconnect();
        let status = monitor.status_at(start + Duration::from_secs(130));
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(status.stable_for.is_none());
        assert_eq!(status.to_string(), "DISCONNECTED");
    }

    #[test]
    fn reconnects_are_counted() {
        let mut monitor = ConnectionMonitor::new();
        monitor.on_connect(peer());
        assert_eq!(monitor.status().reconnects, 0);

        monitor.on_disconnect();
        monitor.on_connect(peer());
        monitor.on_disconnect();
        monitor.on_connect(peer());
        assert_eq!(monitor.status().reconnects, 2);
    }

    #[test]
    fn new_connection_restarts_stability_clock() {
        let mut monitor = ConnectionMonitor::new();
        let start = Instant::now();
        monitor.on_connect_at(peer(), start);
        monitor.on_disconnect();
        monitor.on_connect_at(peer(), start + Duration::from_secs(100));

        let status = monitor.status_at(start + Duration::from_secs(101));
        assert_eq!(status.stable_for, Some(Duration::from_secs(1)));
    }
}
