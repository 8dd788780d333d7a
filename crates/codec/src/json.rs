//! Plain JSON codec.

use crate::codec::{Codec, Decodable, Encodable};
use crate::error::Result;
use crate::proto;

/// Codec that writes everything as JSON text.
///
/// Unlike [`Marshaler`](crate::Marshaler), envelopes travel in their
/// structured JSON form (`{"Header": {...}, "Body": "<base64>"}`), so a
/// malformed payload fails to decode into an envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn marshal(&self, value: Encodable<'_>) -> Result<Vec<u8>> {
        match value {
            Encodable::Frame(frame) => Ok(frame.data.clone()),
            Encodable::Proto(message) => proto::print_json(message),
            Encodable::Json(value) => Ok(value.to_json()?),
        }
    }

    fn unmarshal(&self, data: &[u8], target: Decodable<'_>) -> Result<()> {
        match target {
            Decodable::Proto(message) => proto::merge_json(message, data),
            Decodable::Envelope(envelope) => {
                *envelope = serde_json::from_slice(data)?;
                Ok(())
            }
            Decodable::Json(value) => Ok(value.replace_from_json(data)?),
        }
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::error::CodecError;
    use protobuf::well_known_types::source_context::SourceContext;

    #[test]
    fn test_envelope_round_trip() {
        let mut envelope = Envelope::new("payload");
        envelope.set_header("Micro-Topic", "orders");
        let bytes = JsonCodec.marshal(Encodable::json(&envelope)).unwrap();

        let mut decoded = Envelope::default();
        JsonCodec
            .unmarshal(&bytes, Decodable::from(&mut decoded))
            .unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_malformed_envelope_fails_without_mutation() {
        let mut envelope = Envelope::new("kept");
        let err = JsonCodec
            .unmarshal(b"not json", Decodable::from(&mut envelope))
            .unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
        assert_eq!(envelope.body, b"kept");
    }

    #[test]
    fn test_proto_is_written_as_json_text() {
        let mut context = SourceContext::new();
        context.file_name = "orders.proto".to_string();
        let bytes = JsonCodec.marshal(Encodable::proto(&context)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["fileName"], "orders.proto");

        let mut decoded = SourceContext::new();
        JsonCodec
            .unmarshal(&bytes, Decodable::proto(&mut decoded))
            .unwrap();
        assert_eq!(decoded, context);
    }
}
