//! Protobuf message capability.
//!
//! Two generations of generated protobuf code are in circulation:
//!
//! - current: types implementing [`protobuf::MessageFull`], with generated
//!   reflection;
//! - legacy: types that only know their binary wire form and can name a
//!   runtime-resolved descriptor ([`LegacyMessage`]).
//!
//! Codecs only ever talk to [`ProtoMessage`]. Legacy types are upgraded by
//! wrapping them in [`Legacy`].

use std::ops::{Deref, DerefMut};

use protobuf::reflect::MessageDescriptor;
use protobuf::{CodedInputStream, MessageDyn, MessageFull};

use crate::error::{CodecError, Result};

/// A protobuf message a codec can encode and decode.
pub trait ProtoMessage: Send + Sync {
    /// Reflection handle used for the canonical JSON mapping.
    fn message_descriptor(&self) -> MessageDescriptor;

    /// Serialize to the canonical binary wire form.
    fn write_binary(&self) -> Result<Vec<u8>>;

    /// Replace the contents with a message given in binary wire form.
    fn replace_binary(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<M: MessageFull> ProtoMessage for M {
    fn message_descriptor(&self) -> MessageDescriptor {
        M::descriptor()
    }

    fn write_binary(&self) -> Result<Vec<u8>> {
        self.write_to_bytes().map_err(CodecError::Encode)
    }

    fn replace_binary(&mut self, bytes: &[u8]) -> Result<()> {
        *self = M::parse_from_bytes(bytes).map_err(CodecError::WireFormat)?;
        Ok(())
    }
}

/// Protobuf message generated without reflection support.
pub trait LegacyMessage: Send + Sync {
    /// Descriptor of the message type, typically resolved from a
    /// `.proto` schema at runtime.
    fn descriptor(&self) -> MessageDescriptor;

    fn write_to_bytes(&self) -> protobuf::Result<Vec<u8>>;

    fn merge_from_bytes(&mut self, bytes: &[u8]) -> protobuf::Result<()>;

    fn clear(&mut self);
}

/// Upgrades a [`LegacyMessage`] to the [`ProtoMessage`] capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legacy<T>(pub T);

impl<T> Legacy<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Legacy<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Legacy<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: LegacyMessage> ProtoMessage for Legacy<T> {
    fn message_descriptor(&self) -> MessageDescriptor {
        self.0.descriptor()
    }

    fn write_binary(&self) -> Result<Vec<u8>> {
        self.0.write_to_bytes().map_err(CodecError::Encode)
    }

    fn replace_binary(&mut self, bytes: &[u8]) -> Result<()> {
        // Validate before touching the wrapped message.
        self.0
            .descriptor()
            .parse_from_bytes(bytes)
            .map_err(CodecError::WireFormat)?;
        self.0.clear();
        self.0.merge_from_bytes(bytes).map_err(CodecError::WireFormat)
    }
}

/// Parse canonical protobuf JSON into `target`.
///
/// The text is parsed into a fresh message first, so `target` is left
/// untouched when the JSON is malformed.
pub(crate) fn merge_json(target: &mut dyn ProtoMessage, data: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(data)?;
    let descriptor = target.message_descriptor();
    let parsed = protobuf_json_mapping::parse_dyn_from_str(&descriptor, text)?;
    let bytes = parsed.write_to_bytes_dyn().map_err(CodecError::Encode)?;
    target.replace_binary(&bytes)
}

/// Render `message` as canonical protobuf JSON.
pub(crate) fn print_json(message: &dyn ProtoMessage) -> Result<Vec<u8>> {
    let dynamic = to_dynamic(message)?;
    Ok(protobuf_json_mapping::print_to_string(&*dynamic)?.into_bytes())
}

fn to_dynamic(message: &dyn ProtoMessage) -> Result<Box<dyn MessageDyn>> {
    let bytes = message.write_binary()?;
    let descriptor = message.message_descriptor();
    let mut dynamic = descriptor.new_instance();
    let mut input = CodedInputStream::from_bytes(&bytes);
    dynamic
        .merge_from_dyn(&mut input)
        .map_err(CodecError::WireFormat)?;
    Ok(dynamic)
}
