//! The inbound event envelope
//!
//! An [`Event`] is created once at ingestion and never mutated afterwards.
//! Its payload is kept as `Bytes` so handing an event to the windowed store
//! or cloning it for a join pass only bumps a refcount.
//!
//! # Lazy JSON view
//!
//! ```text
//! raw bytes ──► first json() call ──► parsed object cached in OnceLock
//!                                        │
//!                       later calls ─────┘ (no re-parse)
//! ```
//!
//! Processors that route without filtering never pay for parsing.

use crate::error::EventError;
use bytes::Bytes;
use std::sync::OnceLock;

/// A parsed JSON object payload
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Content type for plain JSON payloads
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for structured CloudEvents envelopes
pub const CONTENT_TYPE_CLOUDEVENTS: &str = "application/cloudevents+json";

/// Immutable inbound event
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use rivulet_core::Event;
///
/// let event = Event::new("evt-1", "orders", "application/json", Bytes::from(r#"{"x":1}"#));
/// assert_eq!(event.source_topic(), "orders");
/// assert_eq!(event.json().unwrap()["x"], 1);
/// ```
#[derive(Debug, Clone)]
pub struct Event {
    id: String,
    source_topic: String,
    content_type: String,
    raw: Bytes,
    /// Unix timestamp in nanoseconds, taken at ingestion
    received_at: i64,
    parsed: OnceLock<Result<JsonObject, EventError>>,
}

impl Event {
    /// Create an event with an explicit ID
    pub fn new(
        id: impl Into<String>,
        source_topic: impl Into<String>,
        content_type: impl Into<String>,
        raw: Bytes,
    ) -> Self {
        Self {
            id: id.into(),
            source_topic: source_topic.into(),
            content_type: content_type.into(),
            raw,
            received_at: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            parsed: OnceLock::new(),
        }
    }

    /// Create an event with a generated ULID
    pub fn generated(
        source_topic: impl Into<String>,
        content_type: impl Into<String>,
        raw: Bytes,
    ) -> Self {
        Self::new(ulid::Ulid::new().to_string(), source_topic, content_type, raw)
    }

    /// Event identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Topic (or logical stream) the event arrived on
    pub fn source_topic(&self) -> &str {
        &self.source_topic
    }

    /// Content type the payload was delivered with
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw JSON payload bytes
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Ingestion timestamp (unix nanoseconds)
    pub fn received_at(&self) -> i64 {
        self.received_at
    }

    /// Payload as UTF-8, if valid
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw).ok()
    }

    /// Parsed JSON object view of the payload
    ///
    /// Parsed at most once; the outcome (including failure) is cached.
    pub fn json(&self) -> Result<&JsonObject, EventError> {
        self.parsed
            .get_or_init(|| parse_object(&self.raw))
            .as_ref()
            .map_err(Clone::clone)
    }
}

fn parse_object(raw: &[u8]) -> Result<JsonObject, EventError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| EventError::InvalidJson(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(EventError::NotAnObject(json_type_name(&other))),
    }
}

/// JSON type name for diagnostics
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
