//! The Kafka payload codec.

use tracing::trace;

use crate::codec::{Codec, Decodable, Encodable};
use crate::envelope::{CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE};
use crate::error::Result;
use crate::proto;

/// Codec used for Kafka payloads, where the broker carries no separate
/// message headers.
///
/// Protobuf messages are written in binary but read from their canonical
/// JSON text. Producers on the other side of the topic publish protobuf
/// messages as JSON, so the asymmetry is part of the wire contract.
///
/// Decoding into an [`Envelope`](crate::Envelope) never parses the payload:
/// the bytes become the body and the content type is recorded as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Marshaler;

impl Codec for Marshaler {
    fn marshal(&self, value: Encodable<'_>) -> Result<Vec<u8>> {
        match value {
            Encodable::Frame(frame) => Ok(frame.data.clone()),
            Encodable::Proto(message) => message.write_binary(),
            Encodable::Json(value) => Ok(value.to_json()?),
        }
    }

    fn unmarshal(&self, data: &[u8], target: Decodable<'_>) -> Result<()> {
        match target {
            Decodable::Proto(message) => proto::merge_json(message, data),
            Decodable::Envelope(envelope) => {
                trace!(len = data.len(), "storing payload verbatim as envelope body");
                envelope.set_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
                envelope.body = data.to_vec();
                Ok(())
            }
            Decodable::Json(value) => Ok(value.replace_from_json(data)?),
        }
    }

    fn name(&self) -> &'static str {
        "json-marshaler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, Frame};
    use crate::error::CodecError;
    use crate::proto::{Legacy, LegacyMessage};
    use protobuf::descriptor::field_descriptor_proto::{Label, Type};
    use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
    use protobuf::reflect::{FileDescriptor, MessageDescriptor, ReflectValueRef};
    use protobuf::well_known_types::source_context::SourceContext;
    use protobuf::{CodedInputStream, Message, MessageDyn};
    use serde::{Deserialize, Serialize};

    /// A legacy-style message backed by a runtime descriptor.
    struct Order {
        descriptor: MessageDescriptor,
        message: Box<dyn MessageDyn>,
    }

    impl Order {
        fn new() -> Self {
            let mut file = FileDescriptorProto::new();
            file.set_name("order.proto".to_string());
            file.set_package("shop".to_string());
            file.set_syntax("proto3".to_string());

            let mut order = DescriptorProto::new();
            order.set_name("Order".to_string());
            for (name, number, field_type) in [("id", 1, Type::TYPE_STRING), ("quantity", 2, Type::TYPE_INT64)] {
                let mut field = FieldDescriptorProto::new();
                field.set_name(name.to_string());
                field.set_json_name(name.to_string());
                field.set_number(number);
                field.set_label(Label::LABEL_OPTIONAL);
                field.set_type(field_type);
                order.field.push(field);
            }
            file.message_type.push(order);

            let file = FileDescriptor::new_dynamic(file, &[]).unwrap();
            let descriptor = file.message_by_package_relative_name("Order").unwrap();
            let message = descriptor.new_instance();
            Self { descriptor, message }
        }

        fn id(&self) -> String {
            let field = self.descriptor.field_by_name("id").unwrap();
            match field.get_singular_field_or_default(&*self.message) {
                ReflectValueRef::String(id) => id.to_string(),
                other => panic!("unexpected id value {other:?}"),
            }
        }

        fn quantity(&self) -> i64 {
            let field = self.descriptor.field_by_name("quantity").unwrap();
            match field.get_singular_field_or_default(&*self.message) {
                ReflectValueRef::I64(quantity) => quantity,
                other => panic!("unexpected quantity value {other:?}"),
            }
        }
    }

    impl LegacyMessage for Order {
        fn descriptor(&self) -> MessageDescriptor {
            self.descriptor.clone()
        }

        fn write_to_bytes(&self) -> protobuf::Result<Vec<u8>> {
            self.message.write_to_bytes_dyn()
        }

        fn merge_from_bytes(&mut self, bytes: &[u8]) -> protobuf::Result<()> {
            let mut input = CodedInputStream::from_bytes(bytes);
            self.message.merge_from_dyn(&mut input)
        }

        fn clear(&mut self) {
            self.message = self.descriptor.new_instance();
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
    }

    #[test]
    fn test_frame_is_passed_through() {
        let frame = Frame::new(vec![0, 159, 146, 150]);
        let bytes = Marshaler.marshal(Encodable::from(&frame)).unwrap();
        assert_eq!(bytes, frame.data);
    }

    #[test]
    fn test_proto_is_encoded_in_binary() {
        let mut context = SourceContext::new();
        context.file_name = "orders.proto".to_string();
        let bytes = Marshaler.marshal(Encodable::proto(&context)).unwrap();
        assert_eq!(bytes, context.write_to_bytes().unwrap());
    }

    #[test]
    fn test_other_values_fall_back_to_json() {
        let greeting = Greeting { text: "hi".into() };
        let bytes = Marshaler.marshal(Encodable::json(&greeting)).unwrap();
        assert_eq!(bytes, br#"{"text":"hi"}"#);
    }

    #[test]
    fn test_frame_round_trip_through_envelope() {
        let frame = Frame::new(b"\x01not json at all".to_vec());
        let bytes = Marshaler.marshal(Encodable::from(&frame)).unwrap();

        let mut envelope = Envelope::default();
        Marshaler
            .unmarshal(&bytes, Decodable::from(&mut envelope))
            .unwrap();
        assert_eq!(envelope.body, frame.data);
        assert_eq!(envelope.header(CONTENT_TYPE_HEADER), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn test_proto_target_is_decoded_from_json_text() {
        let mut context = SourceContext::new();
        Marshaler
            .unmarshal(
                br#"{"fileName":"orders.proto"}"#,
                Decodable::proto(&mut context),
            )
            .unwrap();
        assert_eq!(context.file_name, "orders.proto");
    }

    #[test]
    fn test_proto_target_rejects_binary_payload() {
        let mut source = SourceContext::new();
        source.file_name = "orders.proto".to_string();
        let binary = source.write_to_bytes().unwrap();

        let mut context = SourceContext::new();
        let err = Marshaler
            .unmarshal(&binary, Decodable::proto(&mut context))
            .unwrap_err();
        assert!(!matches!(err, CodecError::WireFormat(_)));
        assert_eq!(context.file_name, "");
    }

    #[test]
    fn test_unknown_proto_field_is_poison() {
        let mut context = SourceContext::new();
        let err = Marshaler
            .unmarshal(br#"{"bogus":1}"#, Decodable::proto(&mut context))
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownField(_)), "{err:?}");
    }

    #[test]
    fn test_legacy_message_is_upgraded_for_json_decode() {
        let mut order = Legacy(Order::new());
        Marshaler
            .unmarshal(
                br#"{"id":"A-1","quantity":"3"}"#,
                Decodable::proto(&mut order),
            )
            .unwrap();
        assert_eq!(order.id(), "A-1");
        assert_eq!(order.quantity(), 3);
    }

    #[test]
    fn test_legacy_message_is_encoded_in_binary() {
        let mut order = Legacy(Order::new());
        Marshaler
            .unmarshal(br#"{"id":"A-1"}"#, Decodable::proto(&mut order))
            .unwrap();
        let bytes = Marshaler.marshal(Encodable::proto(&order)).unwrap();
        assert_eq!(bytes, order.message.write_to_bytes_dyn().unwrap());
        // field 1, length-delimited, "A-1"
        assert_eq!(bytes, vec![0x0a, 0x03, b'A', b'-', b'1']);
    }

    #[test]
    fn test_malformed_json_leaves_target_untouched() {
        let mut greeting = Greeting { text: "before".into() };
        assert!(Marshaler
            .unmarshal(b"{\"text\":", Decodable::json(&mut greeting))
            .is_err());
        assert_eq!(greeting.text, "before");
    }

    #[test]
    fn test_json_target() {
        let mut greeting = Greeting { text: String::new() };
        Marshaler
            .unmarshal(br#"{"text":"hello"}"#, Decodable::json(&mut greeting))
            .unwrap();
        assert_eq!(greeting.text, "hello");
    }
}
