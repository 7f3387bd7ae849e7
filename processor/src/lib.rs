//! Rivulet - expression-driven stream processors
//!
//! Two processors share one pipeline shape:
//!
//! ```text
//! HTTP ingest ──► input queue ──► Channel | Joiner ──► output queue ──► OutputRouter ──► Transport
//! ```
//!
//! - **Channel**: one stream, per-event filter and select, optionally held
//!   in an aggregate until a trigger expression fires.
//! - **Joiner**: two streams, cross-joined once per time window.
//!
//! Filters, selects and triggers are small expressions over JSON payloads,
//! compiled once at startup (see [`expr`]).

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod channel;
pub mod config;
pub mod error;
pub mod expr;
pub mod ingest;
pub mod joiner;
pub mod metrics;
pub mod metrics_server;
pub mod payload;
pub mod router;
pub mod transport;

pub use channel::{ChannelProcessor, Outcome, TriggerGate};
pub use config::{
    ChannelConfig, ChannelMode, ConfigError, JoinerConfig, LogFormat, RuntimeConfig, StreamInfo,
    TransportKind,
};
pub use error::{EmptyWindowError, ProcessorError, Result};
pub use expr::{Bindings, Program, Value};
pub use ingest::{EventSender, IngestError, IngestServer, InvocationEvent};
pub use joiner::{JoinEngine, JoinOutput, Joiner, WindowScheduler, WindowStore};
pub use metrics::Metrics;
pub use metrics_server::MetricsServer;
pub use router::{output_loop, OutputRouter, RouteReport, Targets};
pub use transport::{SidecarTransport, StdoutTransport};

pub use rivulet_core::{Event, OutputEnvelope, Target, Transport, TransportError};
