//! Structured-mode CloudEvents envelope

use super::IngestError;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;

/// The envelope fields rivulet reads; everything else is ignored
#[derive(Debug, Clone, Deserialize)]
pub struct CloudEvent {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub pubsubname: Option<String>,

    #[serde(default)]
    pub datacontenttype: Option<String>,

    #[serde(default)]
    pub data: Option<serde_json::Value>,

    /// Payload as base64-encoded bytes
    #[serde(default)]
    pub data_base64: Option<String>,
}

impl CloudEvent {
    pub fn parse(body: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(body).map_err(|e| IngestError::InvalidEnvelope(e.to_string()))
    }

    /// Payload bytes carried by the envelope
    ///
    /// A string `data` is taken as JSON text, as publishers that serialize
    /// before publishing produce it.
    pub fn into_payload(self) -> Result<Bytes, IngestError> {
        match (self.data, self.data_base64) {
            (Some(serde_json::Value::String(text)), _) => Ok(Bytes::from(text)),
            (Some(serde_json::Value::Null) | None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map(Bytes::from)
                .map_err(|e| IngestError::InvalidBase64(e.to_string())),
            (Some(serde_json::Value::Null) | None, None) => Err(IngestError::MissingData),
            (Some(value), _) => serde_json::to_vec(&value)
                .map(Bytes::from)
                .map_err(|e| IngestError::InvalidEnvelope(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_object_data() {
        let ce = CloudEvent::parse(br#"{"topic":"A","pubsubname":"ps","data":{"id":1}}"#).unwrap();
        assert_eq!(ce.topic.as_deref(), Some("A"));
        assert_eq!(ce.pubsubname.as_deref(), Some("ps"));
        assert_eq!(&ce.into_payload().unwrap()[..], br#"{"id":1}"#);
    }

    #[test]
    fn test_string_data_is_json_text() {
        let ce = CloudEvent::parse(br#"{"data":"{\"id\":1}"}"#).unwrap();
        assert_eq!(&ce.into_payload().unwrap()[..], br#"{"id":1}"#);
    }

    #[test]
    fn test_base64_data() {
        // {"id":1}
        let ce = CloudEvent::parse(br#"{"data_base64":"eyJpZCI6MX0="}"#).unwrap();
        assert_eq!(&ce.into_payload().unwrap()[..], br#"{"id":1}"#);
    }

    #[test]
    fn test_bad_base64() {
        let ce = CloudEvent::parse(br#"{"data_base64":"!!!"}"#).unwrap();
        assert!(matches!(ce.into_payload(), Err(IngestError::InvalidBase64(_))));
    }

    #[test]
    fn test_missing_data() {
        let ce = CloudEvent::parse(br#"{"id":"x","data":null}"#).unwrap();
        assert_eq!(ce.into_payload(), Err(IngestError::MissingData));
    }

    #[test]
    fn test_not_an_envelope() {
        assert!(matches!(
            CloudEvent::parse(b"[1,2]"),
            Err(IngestError::InvalidEnvelope(_))
        ));
    }
}
