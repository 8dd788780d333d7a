//! Message envelope and payload codecs for kafka-bridge.
//!
//! This crate converts between raw broker payloads and the values handed to
//! application code.
//!
//! # Capabilities
//!
//! ```text
//! encode:  Frame (passthrough) > protobuf (binary) > anything else (JSON)
//! decode:  protobuf (JSON text) > Envelope (verbatim body) > anything else (JSON)
//! ```
//!
//! # Modules
//!
//! - [`codec`] - the [`Codec`] trait and the [`Encodable`]/[`Decodable`] variants
//! - [`marshaler`] - [`Marshaler`], the codec used for Kafka payloads
//! - [`json`] - [`JsonCodec`], a plain JSON codec
//! - [`proto`] - the protobuf capability and the legacy-message adapter
//! - [`envelope`] - [`Envelope`] and [`Frame`]
//! - [`error`] - [`CodecError`] and its poison classification
//!
//! # Example
//!
//! ```
//! use bridge_codec::{Codec, Decodable, Envelope, Marshaler, JSON_CONTENT_TYPE};
//!
//! let mut envelope = Envelope::default();
//! Marshaler
//!     .unmarshal(br#"{"id":"A-1"}"#, Decodable::from(&mut envelope))
//!     .unwrap();
//! assert_eq!(envelope.body, br#"{"id":"A-1"}"#);
//! assert_eq!(envelope.header("Content-Type"), Some(JSON_CONTENT_TYPE));
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod json;
pub mod marshaler;
pub mod proto;

pub use codec::{Codec, Decodable, Encodable, FromJson, ToJson};
pub use envelope::{Envelope, Frame, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, KEY_HEADER};
pub use error::{CodecError, Result};
pub use json::JsonCodec;
pub use marshaler::Marshaler;
pub use proto::{Legacy, LegacyMessage, ProtoMessage};
