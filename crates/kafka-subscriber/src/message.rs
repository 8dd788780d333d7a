//! Raw broker messages.

use rdkafka::message::{BorrowedMessage, Message as RdkafkaMessage};

/// A message as received from the broker, before decoding.
///
/// Owns its data so it can cross task boundaries; the rdkafka borrowed
/// message it was built from is released right after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Kafka topic
    pub topic: String,
    /// Kafka partition
    pub partition: i32,
    /// Kafka offset
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Payload; empty when the broker delivered none
    pub value: Vec<u8>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

impl RawMessage {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value: value.into(),
            timestamp: None,
        }
    }

    /// The `<topic>/<partition>/<offset>` coordinates of this message.
    pub fn coordinates(&self) -> String {
        format!("{}/{}/{}", self.topic, self.partition, self.offset)
    }
}

impl From<&BorrowedMessage<'_>> for RawMessage {
    fn from(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(|k| k.to_vec()),
            value: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
            timestamp: msg.timestamp().to_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates() {
        let msg = RawMessage::new("orders", 2, 57, b"{}".to_vec());
        assert_eq!(msg.coordinates(), "orders/2/57");
    }
}
