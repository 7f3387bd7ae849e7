//! Event ingestion for rivulet processors
//!
//! Inbound deliveries are decoded into [`Event`]s and handed to the
//! processor through a bounded queue. Ingestion never blocks: a full queue
//! rejects the delivery and the transport is expected to redeliver.
//!
//! # Architecture
//!
//! ```text
//! POST /{service_route} ──► InvocationEvent ──┐
//!                                              ├─► decode ──► EventSender::try_send ──► mpsc ──► processor
//! POST /{stream_route}  ──► CloudEvents body ──┘
//! ```
//!
//! # Accepted payloads
//!
//! - `application/json` - the body is the event payload
//! - `application/cloudevents+json` - payload under `data` (or base64 `data_base64`)
//!
//! Anything else is rejected as an unsupported event type. Payloads must
//! decode as a JSON object.

mod cloudevents;
pub mod server;

pub use cloudevents::CloudEvent;
pub use server::IngestServer;

use crate::metrics;
use bytes::Bytes;
use rivulet_core::{CONTENT_TYPE_CLOUDEVENTS, CONTENT_TYPE_JSON, Event, EventError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Delivery rejected before reaching the processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("unsupported event type: {0}")]
    UnsupportedType(String),

    /// Envelope could not be parsed
    #[error("invalid cloudevent envelope: {0}")]
    InvalidEnvelope(String),

    #[error("cloudevent has no data")]
    MissingData,

    #[error("invalid data_base64: {0}")]
    InvalidBase64(String),

    /// Payload is not a JSON object
    #[error("invalid payload: {0}")]
    Payload(#[from] EventError),

    /// Input queue is at capacity
    #[error("input queue full")]
    QueueFull,

    /// Processor has shut down
    #[error("input queue closed")]
    Closed,
}

impl IngestError {
    /// True when redelivering the same payload later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::QueueFull | IngestError::Closed)
    }

    /// Label for the `reason` dimension of the dropped-events counter
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::UnsupportedType(_) => "unsupported_type",
            IngestError::InvalidEnvelope(_)
            | IngestError::MissingData
            | IngestError::InvalidBase64(_)
            | IngestError::Payload(_) => "invalid_payload",
            IngestError::QueueFull => "queue_full",
            IngestError::Closed => "closed",
        }
    }
}

/// A push-style invocation
#[derive(Debug, Clone, Default)]
pub struct InvocationEvent {
    pub content_type: String,
    pub data: Bytes,
    pub data_type_url: String,
    pub query_string: String,
}

/// Decode an invocation into an event attributed to `topic`
///
/// The JSON object view is parsed here once and cached on the event, so
/// processors never re-parse.
pub fn decode_invocation(topic: &str, invocation: &InvocationEvent) -> Result<Event, IngestError> {
    let event = match media_type(&invocation.content_type).as_str() {
        CONTENT_TYPE_JSON => Event::generated(topic, CONTENT_TYPE_JSON, invocation.data.clone()),
        CONTENT_TYPE_CLOUDEVENTS => {
            let envelope = CloudEvent::parse(&invocation.data)?;
            let id = envelope.id.clone();
            let payload = envelope.into_payload()?;
            match id {
                Some(id) if !id.is_empty() => Event::new(id, topic, CONTENT_TYPE_JSON, payload),
                _ => Event::generated(topic, CONTENT_TYPE_JSON, payload),
            }
        }
        _ => return Err(IngestError::UnsupportedType(invocation.content_type.clone())),
    };

    event.json()?;
    Ok(event)
}

/// Lowercased media type without parameters (`; charset=...`)
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Producer half of a processor's bounded input queue
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Create a bounded queue of `capacity` events
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting
    pub fn try_send(&self, event: Event) -> Result<(), IngestError> {
        let stream = event.source_topic().to_string();
        match self.tx.try_send(event) {
            Ok(()) => {
                metrics::try_record_received(&stream);
                metrics::try_set_queue_depth(self.depth());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(IngestError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(IngestError::Closed),
        }
    }

    /// Events currently queued
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}
