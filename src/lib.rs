//! Diagnostic harness for streaming game telemetry.
//!
//! Warroom terminates a single TCP telemetry connection from a game client,
//! reassembles framed messages out of arbitrarily-chunked byte deliveries,
//! validates each against an evolving schema, and maintains live aggregate
//! statistics for an external console or dashboard.
//!
//! # Features
//!
//! - **Dual framing**: newline-delimited JSON lines and `[u32 BE length]`
//!   prefixed frames, with first-byte sniffing when the client revision is
//!   unknown
//! - **Tolerant validation**: structural errors vs. drift warnings, with
//!   per-connection sequence-continuity tracking
//! - **Windowed statistics**: trailing-window data rate, size and unit-count
//!   stats over the last 100 packets
//! - **Quiet logs**: repeated diagnostics collapse into `(xN in last minute)`
//!   summaries
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use warroom::{Harness, HarnessConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> warroom::Result<()> {
//!     let harness = Harness::bind(HarnessConfig::default()).await?;
//!     let handle = harness.handle();
//!
//!     loop {
//!         tokio::time::sleep(handle.dashboard_interval()).await;
//!         let snap = handle.snapshot();
//!         println!("{} | {} packets | {:.1} Hz | {} errors",
//!             handle.connection_status(),
//!             snap.packets_received,
//!             snap.data_rate,
//!             snap.decode_errors);
//!     }
//! }
//! ```

// Core types and error handling
mod config;
mod error;

// Frame ingestion pipeline
pub mod decode;
pub mod framing;
pub mod message;
pub mod pipeline;

// Validation and aggregation
pub mod dedupe;
pub mod stats;
pub mod validate;

// Connection surface
pub mod monitor;
pub mod server;

// Core exports
pub use config::{DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, DEFAULT_WINDOW_CAPACITY, HarnessConfig};
pub use error::{HarnessError, Result};

// Pipeline exports
pub use decode::{DecodeError, DecodeFailure, MessageDecoder};
pub use framing::{FrameReader, FramingMode, FramingStrategy, RawFrame};
pub use message::{Field, Message, MessageBody};
pub use pipeline::Pipeline;

// Validation and statistics exports
pub use stats::{RollingWindow, StatsAggregator, StatsSnapshot, WindowStats};
pub use validate::{SchemaValidator, SequenceValidator, ValidationVerdict};

// Connection exports
pub use monitor::{ConnectionMonitor, ConnectionState, ConnectionStatus};
pub use server::{Harness, HarnessHandle};
