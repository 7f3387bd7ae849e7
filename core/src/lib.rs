//! rivulet-core - Core types for rivulet stream processors
//!
//! This crate provides the foundational types shared between the rivulet
//! processors and external transport plugins:
//!
//! - [`Event`] - the immutable inbound event (lazily parsed JSON view)
//! - [`Target`] - a resolved `(endpoint, route)` destination
//! - [`OutputEnvelope`] - a JSON payload ready for dispatch
//! - [`Transport`] trait - async interface for publishing and invoking
//! - [`TransportError`], [`EventError`] - error types at this boundary
//!
//! # Why this crate exists
//!
//! A transport for a different substrate only needs `Transport`,
//! `Target` and `OutputEnvelope`. Keeping them here lets such a plugin
//! depend on a small crate instead of the whole processor engine:
//!
//! ```text
//! rivulet-core ◄── rivulet-processor ◄── rivulet-runtime
//!      ▲
//!      └────────── custom transports
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod error;
/// The inbound event envelope
pub mod event;
/// Output target addresses
pub mod target;
mod transport;

pub use error::{EventError, TransportError};
pub use event::{Event, JsonObject, CONTENT_TYPE_CLOUDEVENTS, CONTENT_TYPE_JSON};
pub use target::{Target, TargetError};
pub use transport::{OutputEnvelope, Transport};
