//! kafka-bridge library
//!
//! Wires the consumer-group subscriber to a command line: pick a codec,
//! log every delivered envelope, and rejoin the group after an aborted
//! session until interrupted.
//!
//! # CLI Usage
//!
//! ```bash
//! # Consume two topics, decoding payloads with the Kafka marshaler
//! kafka-bridge consume --brokers localhost:9092 --group-id billing --topics orders,refunds
//!
//! # Plain JSON envelopes, with failed messages logged instead of aborting
//! kafka-bridge consume --group-id billing --topics orders --codec json --log-errors
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_codec::{Codec, JsonCodec, Marshaler, CONTENT_TYPE_HEADER, KEY_HEADER};
use bridge_kafka_subscriber::{
    Config, ConsumerConfig, Handler, KafkaSubscriber, Publication, SubscribeOptions,
};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Payload codec selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    /// Protobuf-aware marshaler; payloads are taken verbatim as the envelope body
    Kafka,
    /// Payloads are JSON-encoded envelopes
    Json,
}

impl CodecKind {
    pub fn codec(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::Kafka => Arc::new(Marshaler),
            CodecKind::Json => Arc::new(JsonCodec),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ConsumeArgs {
    #[command(flatten)]
    pub config: Config,

    /// Payload codec
    #[arg(long, value_enum, default_value = "kafka")]
    pub codec: CodecKind,

    /// Log failed messages and keep going instead of aborting the session
    #[arg(long)]
    pub log_errors: bool,

    /// Seconds to wait before rejoining the group after an aborted session
    #[arg(long, default_value_t = 5)]
    pub retry_backoff_secs: u64,
}

/// Logs each delivered envelope.
pub fn log_envelope(publication: &Publication) -> anyhow::Result<()> {
    let envelope = publication.envelope();
    let body = match serde_json::from_slice::<serde_json::Value>(&envelope.body) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(&envelope.body).into_owned(),
    };
    info!(
        key = envelope.header(KEY_HEADER).unwrap_or_default(),
        content_type = envelope.header(CONTENT_TYPE_HEADER).unwrap_or_default(),
        "{body}"
    );
    Ok(())
}

/// Error handler that records the failure and lets the claim continue.
pub fn log_failure(publication: &Publication) -> anyhow::Result<()> {
    let reason = publication
        .error()
        .map(|e| format!("{e:#}"))
        .unwrap_or_default();
    warn!(
        topic = publication.topic(),
        partition = publication.partition(),
        offset = publication.offset(),
        body = %String::from_utf8_lossy(&publication.envelope().body),
        "Message failed: {reason}"
    );
    Ok(())
}

impl ConsumeArgs {
    pub fn subscribe_options(&self) -> SubscribeOptions {
        let options = SubscribeOptions::default();
        if self.log_errors {
            options.with_error_handler(log_failure)
        } else {
            options
        }
    }
}

/// Run `consume` until `shutdown` is cancelled.
///
/// A session aborted by a failing message is logged and the member rejoins
/// the group after the backoff; the failed message is redelivered then.
pub async fn run_consume(args: ConsumeArgs, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config = ConsumerConfig::from(args.config.clone());
    config.validate().context("Invalid consumer configuration")?;
    let handler: Arc<dyn Handler> = Arc::new(log_envelope);
    let backoff = Duration::from_secs(args.retry_backoff_secs);

    loop {
        let subscriber = KafkaSubscriber::new(
            config.clone(),
            Arc::clone(&handler),
            args.codec.codec(),
            args.subscribe_options(),
        )
        .context("Failed to create Kafka consumer")?;
        info!(member_id = subscriber.member_id(), "Joining consumer group");

        match subscriber.run(shutdown.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => warn!("Consumer session aborted: {e:#}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}
