//! The rdkafka driver loop.
//!
//! Turns the consumer's rebalance events and message stream into the
//! session callbacks of [`GroupHandler`]: one [`KafkaSession`] per
//! generation, one claim task per assigned partition, and messages routed
//! to their partition's claim in fetch order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_codec::Codec;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::BorrowedMessage;
use rdkafka::Offset;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::context::{Assignment, GroupContext, RebalanceEvent, TopicPartition};
use super::session::KafkaSession;
use crate::config::ConsumerConfig;
use crate::error::Result;
use crate::group::GroupHandler;
use crate::handler::{Handler, SubscribeOptions};
use crate::message::RawMessage;
use crate::processor::ClaimProcessor;
use crate::session::{Claim, Session};

type ClaimOutcome = (TopicPartition, Result<()>);

struct Generation {
    session: Arc<KafkaSession>,
    claims: HashMap<TopicPartition, mpsc::Sender<RawMessage>>,
}

/// A consumer-group member delivering every subscribed message to a handler.
pub struct KafkaSubscriber {
    consumer: Arc<StreamConsumer<GroupContext>>,
    events: mpsc::UnboundedReceiver<RebalanceEvent>,
    group: Arc<GroupHandler>,
    member_id: String,
    topics: Vec<String>,
    claim_buffer: usize,
    generation_id: i32,
    generation: Option<Generation>,
    tasks: JoinSet<ClaimOutcome>,
}

impl KafkaSubscriber {
    /// Create the consumer. Nothing is fetched until [`KafkaSubscriber::run`].
    ///
    /// `config.auto_ack` overrides `options.auto_ack`.
    pub fn new(
        config: ConsumerConfig,
        handler: Arc<dyn Handler>,
        codec: Arc<dyn Codec>,
        options: SubscribeOptions,
    ) -> Result<Self> {
        config.validate()?;

        let member_id = format!("{}-{}", config.group_id, Uuid::new_v4());
        let (context, events) = GroupContext::new(Arc::new(Assignment::default()));
        let mut client = config.client_config();
        client.set("client.id", &member_id);
        let consumer: StreamConsumer<GroupContext> = client.create_with_context(context)?;

        let options = options.with_auto_ack(config.auto_ack);
        let processor = ClaimProcessor::new(handler, codec, options);

        Ok(Self {
            consumer: Arc::new(consumer),
            events,
            group: Arc::new(GroupHandler::new(processor)),
            member_id,
            topics: config.topics,
            claim_buffer: config.claim_buffer,
            generation_id: 0,
            generation: None,
            tasks: JoinSet::new(),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Consume until `shutdown` is cancelled or a claim aborts the session.
    ///
    /// On abort the member leaves the group, which hands its partitions to
    /// the other members; uncommitted messages are redelivered there. The
    /// caller may build a new subscriber to rejoin.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        info!(member_id = %self.member_id, topics = ?self.topics, "Subscribed");

        let consumer = Arc::clone(&self.consumer);
        let result = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                Some(event) = self.events.recv() => {
                    if let Err(e) = self.on_rebalance(event).await {
                        break Err(e);
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = claim_finished(joined) {
                        break Err(e);
                    }
                }
                received = async { into_raw(consumer.recv().await) } => {
                    match received {
                        Ok(raw) => {
                            if let Err(e) = self.route(raw, &shutdown).await {
                                break Err(e);
                            }
                        }
                        Err(e) => warn!("Error receiving message: {e}"),
                    }
                }
            }
        };

        let ended = self.end_generation(result.is_err()).await;
        self.consumer.unsubscribe();
        info!(member_id = %self.member_id, "Unsubscribed");
        result.and(ended)
    }

    async fn on_rebalance(&mut self, event: RebalanceEvent) -> Result<()> {
        match event {
            RebalanceEvent::Assign(partitions) => {
                if self.generation.is_none() {
                    self.generation_id += 1;
                    let session = Arc::new(KafkaSession::new(
                        Arc::clone(&self.consumer),
                        self.member_id.clone(),
                        self.generation_id,
                    ));
                    self.group.setup(session.as_ref())?;
                    self.generation = Some(Generation {
                        session,
                        claims: HashMap::new(),
                    });
                }
                for tp in partitions {
                    self.spawn_claim(tp);
                }
                Ok(())
            }
            RebalanceEvent::Revoke(partitions) => {
                let Some(generation) = self.generation.as_mut() else {
                    return Ok(());
                };
                for tp in &partitions {
                    generation.claims.remove(tp);
                }
                if generation.claims.is_empty() {
                    self.end_generation(false).await?;
                }
                Ok(())
            }
        }
    }

    fn spawn_claim(&mut self, tp: TopicPartition) {
        let Some(generation) = self.generation.as_mut() else {
            return;
        };
        if generation.claims.contains_key(&tp) {
            return;
        }
        let (tx, claim) = Claim::channel(tp.0.clone(), tp.1, self.claim_buffer);
        generation.claims.insert(tp.clone(), tx);

        let group = Arc::clone(&self.group);
        let session: Arc<dyn Session> = generation.session.clone();
        self.tasks.spawn(async move {
            let result = group.consume_claim(session, claim).await;
            (tp, result)
        });
    }

    async fn route(&mut self, raw: RawMessage, shutdown: &CancellationToken) -> Result<()> {
        let tp = (raw.topic.clone(), raw.partition);
        // The assign event for this partition may still be queued behind
        // the message that triggered it.
        if self.claim_sender(&tp).is_none() {
            while let Ok(event) = self.events.try_recv() {
                self.on_rebalance(event).await?;
            }
        }
        let Some(sender) = self.claim_sender(&tp) else {
            return self.rewind_unclaimed(&raw);
        };

        tokio::select! {
            _ = shutdown.cancelled() => {}
            sent = sender.send(raw) => {
                if sent.is_err() {
                    debug!(topic = %tp.0, partition = tp.1, "Claim already closed");
                }
            }
        }
        Ok(())
    }

    /// A message arrived for a partition without a claim. While the
    /// partition is still ours, fetching is rewound to it so a later commit
    /// on the partition cannot move the group past it.
    fn rewind_unclaimed(&self, raw: &RawMessage) -> Result<()> {
        let assignment = self.consumer.context().assignment();
        if !assignment.owns(&raw.topic, raw.partition) {
            debug!(key = %raw.coordinates(), "Partition not owned, dropping message");
            return Ok(());
        }
        warn!(key = %raw.coordinates(), "No claim for owned partition, rewinding fetch position");
        self.consumer.seek(
            &raw.topic,
            raw.partition,
            Offset::Offset(raw.offset),
            Duration::from_secs(5),
        )?;
        Ok(())
    }

    fn claim_sender(&self, tp: &TopicPartition) -> Option<mpsc::Sender<RawMessage>> {
        self.generation
            .as_ref()
            .and_then(|generation| generation.claims.get(tp))
            .cloned()
    }

    /// Close every claim of the current generation, wait for the claim
    /// tasks and run `cleanup`. Aborted generations stop committing first
    /// and do not drain buffered messages.
    async fn end_generation(&mut self, aborted: bool) -> Result<()> {
        let Some(Generation { session, claims }) = self.generation.take() else {
            return Ok(());
        };
        drop(claims);
        if aborted {
            session.deactivate();
            self.tasks.abort_all();
        }

        let mut outcome = Ok(());
        while let Some(joined) = self.tasks.join_next().await {
            if matches!(&joined, Err(e) if e.is_cancelled()) {
                continue;
            }
            if let Err(e) = claim_finished(joined) {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        session.deactivate();
        self.group.cleanup(session.as_ref())?;
        outcome
    }
}

fn claim_finished(joined: std::result::Result<ClaimOutcome, JoinError>) -> Result<()> {
    let ((topic, partition), result) = joined?;
    match result {
        Ok(()) => {
            debug!(%topic, partition, "Claim finished");
            Ok(())
        }
        Err(e) => {
            error!(%topic, partition, "Claim aborted: {e}");
            Err(e)
        }
    }
}

fn into_raw(received: KafkaResult<BorrowedMessage<'_>>) -> KafkaResult<RawMessage> {
    received.map(|msg| RawMessage::from(&msg))
}
