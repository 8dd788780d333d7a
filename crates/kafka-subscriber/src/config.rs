//! Broker connection settings.

use clap::Parser;
use rdkafka::config::ClientConfig;

use crate::error::{Error, Result};

/// Command-line / environment form of [`ConsumerConfig`].
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[arg(
        long,
        value_delimiter = ',',
        env = "KAFKA_BROKERS",
        default_value = "localhost:9092"
    )]
    pub brokers: Vec<String>,
    /// Consumer group ID
    #[arg(long, env = "KAFKA_GROUP_ID")]
    pub group_id: String,
    /// Topics to subscribe to (comma-separated or multiple --topics)
    #[arg(long, value_delimiter = ',', env = "KAFKA_TOPICS", required = true)]
    pub topics: Vec<String>,
    /// Where to start when the group has no committed offset ("earliest" or "latest")
    #[arg(long, default_value = "earliest")]
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub session_timeout_ms: String,
    /// Messages buffered per partition claim before the fetch loop waits
    #[arg(long, default_value_t = 256)]
    pub claim_buffer: usize,
    /// Leave committing to the handler instead of committing after each success
    #[arg(long)]
    pub manual_ack: bool,
}

impl From<Config> for ConsumerConfig {
    fn from(config: Config) -> Self {
        Self {
            brokers: config.brokers.join(","),
            group_id: config.group_id,
            topics: config.topics,
            auto_offset_reset: config.auto_offset_reset,
            session_timeout_ms: config.session_timeout_ms,
            claim_buffer: config.claim_buffer,
            auto_ack: !config.manual_ack,
        }
    }
}

/// Configuration for the consumer-group subscriber
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topics to subscribe to
    pub topics: Vec<String>,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// Only applies when the group has no committed offset for a partition.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
    /// Capacity of each partition claim's channel.
    ///
    /// When a claim's handler falls behind, the fetch loop waits on this
    /// channel, which pauses delivery for every partition of the member.
    pub claim_buffer: usize,
    /// Commit after every successful handler call.
    pub auto_ack: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "kafka-bridge".to_string(),
            topics: Vec::new(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "30000".to_string(),
            claim_buffer: 256,
            auto_ack: true,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(Error::InvalidConfig("brokers must not be empty".into()));
        }
        if self.group_id.trim().is_empty() {
            return Err(Error::InvalidConfig("group_id must not be empty".into()));
        }
        if self.topics.is_empty() || self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "at least one non-empty topic is required".into(),
            ));
        }
        if self.claim_buffer == 0 {
            return Err(Error::InvalidConfig("claim_buffer must be positive".into()));
        }
        Ok(())
    }

    /// The rdkafka client settings for this configuration.
    ///
    /// Offsets are stored explicitly (one store per acknowledged message)
    /// and the stored offsets are committed by librdkafka in the background.
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", &self.session_timeout_ms)
            .set("enable.partition.eof", "false");
        client
    }
}
