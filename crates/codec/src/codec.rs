//! The codec interface and the capability variants it dispatches on.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::envelope::{Envelope, Frame};
use crate::error::Result;
use crate::proto::ProtoMessage;

/// Converts between wire bytes and in-memory values.
///
/// Implementations must check capabilities in the declared variant order of
/// [`Encodable`] and [`Decodable`]; that order is part of the wire contract.
pub trait Codec: Send + Sync {
    fn marshal(&self, value: Encodable<'_>) -> Result<Vec<u8>>;

    fn unmarshal(&self, data: &[u8], target: Decodable<'_>) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// A value to encode, tagged with its strongest capability.
pub enum Encodable<'a> {
    /// Precomputed bytes, passed through unchanged.
    Frame(&'a Frame),
    /// A protobuf message of either generation.
    Proto(&'a dyn ProtoMessage),
    /// Anything serde can serialize.
    Json(&'a dyn ToJson),
}

impl<'a> Encodable<'a> {
    pub fn proto(message: &'a dyn ProtoMessage) -> Self {
        Encodable::Proto(message)
    }

    pub fn json<T: Serialize>(value: &'a T) -> Self {
        Encodable::Json(value)
    }
}

impl<'a> From<&'a Frame> for Encodable<'a> {
    fn from(frame: &'a Frame) -> Self {
        Encodable::Frame(frame)
    }
}

/// A decode target, tagged with its strongest capability.
pub enum Decodable<'a> {
    /// A protobuf message of either generation.
    Proto(&'a mut dyn ProtoMessage),
    /// The generic envelope.
    Envelope(&'a mut Envelope),
    /// Anything serde can deserialize.
    Json(&'a mut dyn FromJson),
}

impl<'a> Decodable<'a> {
    pub fn proto(message: &'a mut dyn ProtoMessage) -> Self {
        Decodable::Proto(message)
    }

    pub fn json<T: DeserializeOwned>(value: &'a mut T) -> Self {
        Decodable::Json(value)
    }
}

impl<'a> From<&'a mut Envelope> for Decodable<'a> {
    fn from(envelope: &'a mut Envelope) -> Self {
        Decodable::Envelope(envelope)
    }
}

/// Object-safe view of [`Serialize`] for JSON output.
pub trait ToJson {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + ?Sized> ToJson for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Object-safe view of [`DeserializeOwned`] for JSON input.
///
/// The target is only replaced once the whole document parsed.
pub trait FromJson {
    fn replace_from_json(&mut self, data: &[u8]) -> serde_json::Result<()>;
}

impl<T: DeserializeOwned> FromJson for T {
    fn replace_from_json(&mut self, data: &[u8]) -> serde_json::Result<()> {
        *self = serde_json::from_slice(data)?;
        Ok(())
    }
}
