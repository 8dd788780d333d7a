use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use tracing::debug;

use super::context::{Assignment, GroupContext};
use crate::error::{Error, Result};
use crate::message::RawMessage;
use crate::session::Session;

/// One generation of this member's group membership, backed by rdkafka.
///
/// Commits store `offset + 1` for the message's partition; librdkafka
/// commits stored offsets in the background.
pub struct KafkaSession {
    consumer: Arc<StreamConsumer<GroupContext>>,
    assignment: Arc<Assignment>,
    member_id: String,
    generation_id: i32,
    active: AtomicBool,
}

impl KafkaSession {
    pub fn new(
        consumer: Arc<StreamConsumer<GroupContext>>,
        member_id: impl Into<String>,
        generation_id: i32,
    ) -> Self {
        let assignment = Arc::clone(consumer.context().assignment());
        Self {
            consumer,
            assignment,
            member_id: member_id.into(),
            generation_id,
            active: AtomicBool::new(true),
        }
    }

    /// Refuse further commits. Called when the generation ends.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    // A revoke may land between the ownership check and the store.
    fn store_failed(&self, message: &RawMessage, err: KafkaError) -> Result<()> {
        if !self.assignment.owns(&message.topic, message.partition) {
            debug!(key = %message.coordinates(), "Partition revoked during commit: {err}");
            return Ok(());
        }
        Err(Error::Commit {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason: err.to_string(),
        })
    }
}

impl Session for KafkaSession {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn generation_id(&self) -> i32 {
        self.generation_id
    }

    fn claims(&self) -> HashMap<String, Vec<i32>> {
        self.assignment.snapshot()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn commit(&self, message: &RawMessage) -> Result<()> {
        if !self.assignment.owns(&message.topic, message.partition) {
            debug!(key = %message.coordinates(), "Partition no longer owned, skipping commit");
            return Ok(());
        }
        match self
            .consumer
            .store_offset(&message.topic, message.partition, message.offset + 1)
        {
            Ok(()) => Ok(()),
            Err(e) => self.store_failed(message, e),
        }
    }
}
