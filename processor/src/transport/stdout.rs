//! Stdout transport for dry runs
//!
//! Prints each dispatch as one line instead of sending it:
//!
//! ```text
//! publish pubsub/priced {"x":1}
//! invoke pricing/compute {"x":1}
//! ```

use async_trait::async_trait;
use rivulet_core::{OutputEnvelope, Target, Transport, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout transport - prints dispatches for debugging
pub struct StdoutTransport {
    /// Count of dispatches written
    dispatched_count: AtomicU64,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self {
            dispatched_count: AtomicU64::new(0),
        }
    }

    /// Total dispatches written
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    fn write(
        &self,
        kind: &str,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        use std::io::Write;

        let body = String::from_utf8_lossy(payload.bytes());
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{kind} {target} {body}")
            .map_err(|e| TransportError::Publish(format!("stdout write failed: {e}")))?;

        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn publish(
        &self,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        self.write("publish", target, payload)
    }

    async fn invoke(
        &self,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        self.write("invoke", target, payload)
    }

    async fn health(&self) -> bool {
        true
    }
}
