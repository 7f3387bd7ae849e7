//! Convenience re-exports for embedding a processor.
//!
//! ```rust
//! use rivulet_runtime::prelude::*;
//! ```

// Core types
pub use rivulet_core::{Event, OutputEnvelope, Target, Transport, TransportError};

// Configuration
pub use rivulet_processor::{
    ChannelConfig, ChannelMode, JoinerConfig, LogFormat, RuntimeConfig, StreamInfo, TransportKind,
};

// Processors
pub use rivulet_processor::{ChannelProcessor, Joiner, Outcome};

// Ingest and output
pub use rivulet_processor::{
    output_loop, EventSender, IngestServer, OutputRouter, SidecarTransport, StdoutTransport,
    Targets,
};

// Expressions
pub use rivulet_processor::{Bindings, Program, Value};

// Error types
pub use rivulet_processor::{EmptyWindowError, ProcessorError};

// Zero-copy payload
pub use bytes::Bytes;

// Runtime
pub use crate::{init_tracing, run_channel_with, run_joiner_with, shutdown_signal};
