//! Harness server: socket ownership and task orchestration.
//!
//! One accept task services at most one client connection at a time. The
//! receive path reads byte chunks, feeds the per-connection [`FrameReader`],
//! and hands every complete frame to the shared [`Pipeline`] — all inside a
//! single task, so frames are processed strictly in arrival order.
//!
//! Shared state lives behind a `Mutex` inside an `Arc`; it is mutated only by
//! the receive path and read concurrently by dashboard/inspection consumers
//! through [`HarnessHandle`]. Locks are never held across an `await`, so
//! readers always observe fully-formed values. Lifecycle transitions are
//! additionally published on a `watch` channel for consumers that prefer
//! subscribing over polling.
//!
//! Shutdown is coordinated with a [`CancellationToken`]: cancelling releases
//! the accept wait and any blocked read, the active frame buffer is dropped
//! with its task, and no partial frame carries over to a future connection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::framing::FrameReader;
use crate::message::Message;
use crate::monitor::{ConnectionMonitor, ConnectionState, ConnectionStatus};
use crate::pipeline::Pipeline;
use crate::stats::StatsSnapshot;
use crate::validate::ValidationVerdict;
use crate::{HarnessError, Result};

/// Socket read buffer size, matching the client's delivery granularity.
const RECV_BUF_LEN: usize = 4096;

struct Shared {
    config: HarnessConfig,
    pipeline: Mutex<Pipeline>,
    monitor: Mutex<ConnectionMonitor>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Diagnostic harness terminating one streaming telemetry connection.
///
/// Bind with [`Harness::bind`], hand [`HarnessHandle`]s to dashboard or
/// console collaborators, and call [`shutdown`](Self::shutdown) (or drop) to
/// stop serving.
pub struct Harness {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl Harness {
    /// Bind the listener and start accepting.
    ///
    /// Bind/listen failure is the only startup-fatal condition; every later
    /// fault is scoped to a single connection.
    pub async fn bind(config: HarnessConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| HarnessError::bind_failed(config.listen_addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| HarnessError::io("local_addr", e))?;

        info!("Harness listening on {local_addr}");

        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let shared = Arc::new(Shared {
            pipeline: Mutex::new(Pipeline::new(&config)),
            monitor: Mutex::new(ConnectionMonitor::new()),
            state_tx,
            config,
        });

        let cancel = CancellationToken::new();
        let accept_cancel = cancel.clone();
        let accept_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            accept_loop(listener, accept_shared, accept_cancel).await;
        });

        Ok(Self { shared, local_addr, state_rx, cancel })
    }

    /// Address the listener actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Create a read-only handle for an external collaborator.
    pub fn handle(&self) -> HarnessHandle {
        HarnessHandle { shared: Arc::clone(&self.shared), state_rx: self.state_rx.clone() }
    }

    /// Stop accepting and tear down any active connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        debug!("Dropping harness");
        self.cancel.cancel();
    }
}

/// Read-only interface consumed by the console/dashboard collaborators.
///
/// Every method is side-effect-free from the collaborator's perspective.
#[derive(Clone)]
pub struct HarnessHandle {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl HarnessHandle {
    /// Current statistics projection.
    pub fn snapshot(&self) -> StatsSnapshot {
        lock(&self.shared.pipeline).snapshot()
    }

    /// Most recent message, valid or not.
    pub fn last_message(&self) -> Option<Message> {
        lock(&self.shared.pipeline).last_message().cloned()
    }

    /// Verdict for the most recent decodable message.
    pub fn last_verdict(&self) -> Option<ValidationVerdict> {
        lock(&self.shared.pipeline).last_verdict().cloned()
    }

    /// Most recent message that validated clean.
    pub fn last_known_good(&self) -> Option<Message> {
        lock(&self.shared.pipeline).last_known_good().cloned()
    }

    /// Last schema version any client declared.
    pub fn last_schema_version(&self) -> Option<String> {
        lock(&self.shared.pipeline).last_schema_version().map(str::to_string)
    }

    /// Connection lifecycle state plus stable duration.
    pub fn connection_status(&self) -> ConnectionStatus {
        lock(&self.shared.monitor).status()
    }

    /// Re-run schema validation on the last received message.
    pub fn revalidate_last(&self) -> Option<ValidationVerdict> {
        lock(&self.shared.pipeline).revalidate_last()
    }

    /// Subscribe to lifecycle transitions without polling.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Suggested dashboard refresh interval from the harness config.
    pub fn dashboard_interval(&self) -> std::time::Duration {
        self.shared.config.dashboard_interval
    }
}

/// Lock a shared component, recovering the data if a panicking writer
/// poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, cancel: CancellationToken) {
    info!("Waiting for telemetry client connection...");

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Accept loop cancelled");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Accept error: {e}");
                continue;
            }
        };

        info!("Client connected from {peer}");
        lock(&shared.monitor).on_connect(peer);
        lock(&shared.pipeline).on_new_connection();
        let _ = shared.state_tx.send(ConnectionState::Connected);

        // Serve this client to completion before accepting another; at most
        // one connection is serviced at a time.
        receive_loop(stream, &shared, &cancel).await;

        lock(&shared.monitor).on_disconnect();
        let _ = shared.state_tx.send(ConnectionState::Disconnected);

        if cancel.is_cancelled() {
            break;
        }
        info!("Waiting for telemetry client connection...");
    }
}

/// Read byte deliveries and drive the frame reader until the connection ends.
///
/// The frame buffer lives here; when this function returns it is dropped
/// entirely, so no partial frame survives into a future connection.
async fn receive_loop(mut stream: TcpStream, shared: &Shared, cancel: &CancellationToken) {
    let mut reader = FrameReader::new(shared.config.framing, shared.config.max_frame_len);
    let mut buf = [0u8; RECV_BUF_LEN];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Receive loop cancelled");
                return;
            }
            read = stream.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Client disconnected");
                return;
            }
            Ok(n) => {
                reader.push(&buf[..n]);
                loop {
                    match reader.next_frame() {
                        Ok(Some(frame)) => lock(&shared.pipeline).ingest_frame(frame),
                        Ok(None) => break,
                        Err(e) => {
                            // The stream cannot be resynchronized; drop the
                            // connection and return to accept-waiting.
                            warn!("Framing fault, closing connection: {e}");
                            lock(&shared.pipeline).record_stream_error();
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Receive error: {e}");
                return;
            }
        }
    }
}
