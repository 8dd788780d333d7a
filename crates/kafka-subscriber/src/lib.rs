//! Kafka consumer-group subscriber for kafka-bridge.
//!
//! This crate provides:
//! - A claim processor that decodes each message into an envelope, hands it
//!   to an application [`Handler`] and decides whether to commit, skip or
//!   abort
//! - The consumer-group session callbacks driving it ([`GroupHandler`])
//! - An rdkafka driver ([`KafkaSubscriber`]) that maps rebalances to sessions
//!   and partitions to claim tasks
//!
//! # Delivery
//!
//! At least once. An offset is committed only after its message was handled,
//! and only poison messages (see [`bridge_codec::CodecError::is_poison`]) are
//! committed without succeeding.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bridge_codec::Marshaler;
//! use bridge_kafka_subscriber::{ConsumerConfig, KafkaSubscriber, Publication, SubscribeOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ConsumerConfig {
//!     group_id: "billing".to_string(),
//!     topics: vec!["orders".to_string()],
//!     ..Default::default()
//! };
//! let handler = Arc::new(|p: &Publication| -> anyhow::Result<()> {
//!     println!("{} bytes at {}", p.envelope().body.len(), p.offset());
//!     Ok(())
//! });
//! let subscriber =
//!     KafkaSubscriber::new(config, handler, Arc::new(Marshaler), SubscribeOptions::default())?;
//! subscriber.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod group;
pub mod handler;
pub mod kafka;
pub mod message;
pub mod processor;
pub mod publication;
pub mod session;

/// Broker-free session for tests
pub mod testing;

pub use config::{Config, ConsumerConfig};
pub use error::{Error, Result};
pub use group::GroupHandler;
pub use handler::{Handler, SubscribeOptions};
pub use kafka::KafkaSubscriber;
pub use message::RawMessage;
pub use processor::{is_poison, ClaimProcessor, Disposition};
pub use publication::Publication;
pub use session::{Claim, Session, SessionPhase};
