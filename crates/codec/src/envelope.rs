//! Generic message envelope and raw frames.
//!
//! An [`Envelope`] is what application handlers receive: string headers plus
//! an opaque body. A [`Frame`] carries bytes that were encoded ahead of time
//! and must reach the wire untouched.

use std::collections::HashMap;

use base64::Engine;
use protobuf::MessageFull;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CodecError, Result};

/// Header holding the media type of an envelope body.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Header holding the `<topic>/<partition>/<offset>` coordinates of a delivered message.
pub const KEY_HEADER: &str = "key";

/// Media type of the generic textual interchange format.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Decoded representation of a message: headers plus an opaque body.
///
/// The JSON form uses the `Header`/`Body` field names emitted by existing
/// producers, with the body base64 encoded and a `null` header accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Header", default, deserialize_with = "nullable_header")]
    pub header: HashMap<String, String>,
    #[serde(rename = "Body", default, with = "base64_body")]
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            header: HashMap::new(),
            body: body.into(),
        }
    }

    /// Look up a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header.get(key).map(String::as_str)
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.header.insert(key.into(), value.into());
    }

    /// Parse the body as a protobuf message in binary wire form.
    ///
    /// Wire-format failures surface as [`CodecError::WireFormat`], which the
    /// claim processor treats as a poison message.
    pub fn proto_body<M: MessageFull>(&self) -> Result<M> {
        M::parse_from_bytes(&self.body).map_err(CodecError::WireFormat)
    }

    /// Parse the body as JSON.
    ///
    /// Targets using `#[serde(deny_unknown_fields)]` report extra fields as
    /// [`CodecError::UnknownField`].
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Bytes encoded ahead of time; passed through by every codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

fn nullable_header<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

mod base64_body {
    use super::*;

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::well_known_types::source_context::SourceContext;
    use protobuf::Message;

    #[test]
    fn test_envelope_json_accepts_null_header() {
        let envelope: Envelope = serde_json::from_str(r#"{"Header":null,"Body":"aGVsbG8="}"#).unwrap();
        assert!(envelope.header.is_empty());
        assert_eq!(envelope.body, b"hello");
    }

    #[test]
    fn test_envelope_json_shape() {
        let mut envelope = Envelope::new("hi");
        envelope.set_header("Content-Type", "text/plain");
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["Header"]["Content-Type"], "text/plain");
        assert_eq!(json["Body"], "aGk=");
    }

    #[test]
    fn test_proto_body_wire_format_error_is_poison() {
        let envelope = Envelope::new(vec![0xff, 0xff, 0xff]);
        let err = envelope.proto_body::<SourceContext>().unwrap_err();
        assert!(matches!(err, CodecError::WireFormat(_)));
        assert!(err.is_poison());
    }

    #[test]
    fn test_proto_body_parses_binary() {
        let mut context = SourceContext::new();
        context.file_name = "orders.proto".to_string();
        let envelope = Envelope::new(context.write_to_bytes().unwrap());
        let parsed: SourceContext = envelope.proto_body().unwrap();
        assert_eq!(parsed.file_name, "orders.proto");
    }
}
