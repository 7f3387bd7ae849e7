//! Output transports
//!
//! - [`SidecarTransport`] - HTTP to the local pub/sub + invocation sidecar
//! - [`StdoutTransport`] - one line per dispatch, for dry runs
//!
//! Other substrates implement [`rivulet_core::Transport`] directly.

mod sidecar;
mod stdout;

pub use sidecar::SidecarTransport;
pub use stdout::StdoutTransport;

use crate::config::{RuntimeConfig, TransportKind};
use rivulet_core::{Transport, TransportError};
use std::sync::Arc;

/// Build the transport selected by `RIVULET_TRANSPORT`
pub fn from_config(config: &RuntimeConfig) -> Result<Arc<dyn Transport>, TransportError> {
    Ok(match config.transport {
        TransportKind::Sidecar => Arc::new(SidecarTransport::new(
            &config.sidecar_url,
            config.dispatch_timeout,
        )?),
        TransportKind::Stdout => Arc::new(StdoutTransport::new()),
    })
}
