//! Transport trait for rivulet outputs
//!
//! The [`Transport`] trait is the boundary between the processors and the
//! pub/sub + RPC substrate. Processors never talk to the network directly;
//! the output router hands every payload to a `Transport`.

use crate::error::TransportError;
use crate::event::CONTENT_TYPE_JSON;
use crate::target::Target;
use async_trait::async_trait;
use bytes::Bytes;

/// A payload ready for dispatch
///
/// Always JSON in rivulet: Channel emits one JSON value per collected event,
/// Joiner emits one JSON array per window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEnvelope {
    bytes: Bytes,
    content_type: &'static str,
}

impl OutputEnvelope {
    /// Wrap serialized JSON bytes
    pub fn json(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: CONTENT_TYPE_JSON,
        }
    }

    /// Payload bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Payload content type
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Transport trait - delivers payloads to topics and remote routes
///
/// # Implementation Requirements
///
/// - Transports must be `Send + Sync`; one instance is shared by the output task
/// - Each call is a single attempt. Retries belong to the substrate behind
///   the transport, never to the processor
/// - `publish` and `invoke` are independent: the router may call both for
///   the same payload and a failure of one must not affect the other
///
/// # Example
///
/// ```ignore
/// use rivulet_core::{OutputEnvelope, Target, Transport, TransportError};
/// use async_trait::async_trait;
///
/// struct LogTransport;
///
/// #[async_trait]
/// impl Transport for LogTransport {
///     fn name(&self) -> &'static str {
///         "log"
///     }
///
///     async fn publish(&self, target: &Target, payload: &OutputEnvelope) -> Result<(), TransportError> {
///         println!("publish {} ({} bytes)", target, payload.len());
///         Ok(())
///     }
///
///     async fn invoke(&self, target: &Target, payload: &OutputEnvelope) -> Result<(), TransportError> {
///         println!("invoke {} ({} bytes)", target, payload.len());
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logging and metrics (e.g. "sidecar", "stdout")
    fn name(&self) -> &'static str;

    /// Publish a payload to `(pubsub = target.endpoint, topic = target.route)`
    async fn publish(&self, target: &Target, payload: &OutputEnvelope)
        -> Result<(), TransportError>;

    /// Invoke `(app_id = target.endpoint, method = target.route)` with a POST
    /// carrying the payload
    async fn invoke(&self, target: &Target, payload: &OutputEnvelope)
        -> Result<(), TransportError>;

    /// Check whether the substrate is reachable
    ///
    /// Should be lightweight; called from health endpoints.
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// The default implementation returns `Ok(())` for transports that
    /// hold no resources.
    async fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
