//! Splicing of already-serialized JSON payloads
//!
//! Event payloads are validated JSON when they reach a processor, so
//! composite outputs are built by concatenating their bytes instead of
//! re-serializing parsed trees.

use bytes::{BufMut, Bytes, BytesMut};

/// `[item, item, ...]`
pub fn json_array<'a>(items: impl IntoIterator<Item = &'a [u8]>) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u8(b'[');
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.put_u8(b',');
        }
        out.extend_from_slice(item);
    }
    out.put_u8(b']');
    out.freeze()
}

/// `{"key_a": a, "key_b": b}`
pub fn pair_object(key_a: &str, a: &[u8], key_b: &str, b: &[u8]) -> Bytes {
    let key_a = serde_json::Value::from(key_a).to_string();
    let key_b = serde_json::Value::from(key_b).to_string();

    let mut out = BytesMut::with_capacity(key_a.len() + key_b.len() + a.len() + b.len() + 4);
    out.put_u8(b'{');
    out.extend_from_slice(key_a.as_bytes());
    out.put_u8(b':');
    out.extend_from_slice(a);
    out.put_u8(b',');
    out.extend_from_slice(key_b.as_bytes());
    out.put_u8(b':');
    out.extend_from_slice(b);
    out.put_u8(b'}');
    out.freeze()
}
