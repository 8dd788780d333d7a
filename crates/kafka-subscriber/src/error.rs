use thiserror::Error;

use crate::session::SessionPhase;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The application handler failed and no error handler was configured.
    #[error("offset: {offset}: {source:#}")]
    Handler {
        offset: i64,
        #[source]
        source: anyhow::Error,
    },

    /// The configured error handler itself failed.
    #[error("error handler failed at offset {offset}: {source:#}")]
    ErrorHandler {
        offset: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to commit {topic}/{partition}/{offset}: {reason}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error("Invalid session transition from {from} on {event}")]
    Lifecycle { from: SessionPhase, event: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Claim task failed: {0}")]
    ClaimTask(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
