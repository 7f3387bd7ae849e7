//! Error types for rivulet processors
//!
//! Startup failures (`Config`, `Compile`) stop the process. Everything else
//! is a per-event or per-window outcome: logged, counted, never fatal.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::expr::{CompileError, EvalError, TypeMismatchError};
pub use crate::ingest::IngestError;
pub use rivulet_core::{EventError, TargetError, TransportError};

/// Result type alias for rivulet processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// A window closed without producing output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmptyWindowError {
    /// One of the joined topics received nothing during the window
    #[error("topic '{0}' has no events in this window")]
    EmptyBucket(String),

    /// Both topics had events but no pair passed the filter
    #[error("no pairs matched out of {candidates} candidates")]
    NoMatches { candidates: usize },
}

/// Main error type for rivulet processors
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An expression failed to compile
    #[error("{name} expression: {source}")]
    Compile {
        name: &'static str,
        #[source]
        source: CompileError,
    },

    /// Expression evaluation failed
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Expression result had the wrong type
    #[error("{0}")]
    TypeMismatch(#[from] TypeMismatchError),

    /// Payload is not a JSON object
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// Window closed without output
    #[error("empty window: {0}")]
    EmptyWindow(#[from] EmptyWindowError),

    /// Inbound delivery rejected
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Outbound dispatch failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Shutdown requested
    #[error("shutdown requested")]
    Shutdown,
}

impl ProcessorError {
    /// Wrap a compile error with the role of the expression
    pub fn compile(name: &'static str, source: CompileError) -> Self {
        ProcessorError::Compile { name, source }
    }

    /// Short label for the `reason` metric dimension
    pub fn reason(&self) -> &'static str {
        match self {
            ProcessorError::Config(_) => "config",
            ProcessorError::Compile { .. } => "compile",
            ProcessorError::Eval(_) => "eval_error",
            ProcessorError::TypeMismatch(_) => "type_mismatch",
            ProcessorError::Event(_) => "invalid_payload",
            ProcessorError::EmptyWindow(_) => "empty_window",
            ProcessorError::Ingest(_) => "ingest",
            ProcessorError::Transport(_) => "transport",
            ProcessorError::Io(_) => "io",
            ProcessorError::Metrics(_) => "metrics",
            ProcessorError::Shutdown => "shutdown",
        }
    }
}

impl From<TargetError> for ProcessorError {
    fn from(err: TargetError) -> Self {
        ProcessorError::Config(ConfigError::Invalid {
            key: "target".to_string(),
            message: err.to_string(),
        })
    }
}
