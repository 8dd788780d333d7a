//! Consumer-group sessions and partition claims.
//!
//! A session is one generation of this member's place in the consumer
//! group. It is bounded by `setup` and `cleanup` and hands out one
//! [`Claim`] per assigned partition.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::RawMessage;

/// The broker-side view of a session that the claim processor needs.
///
/// Implementations must serialize concurrent `commit` calls coming from
/// different partitions' claim tasks.
pub trait Session: Send + Sync {
    fn member_id(&self) -> &str;

    fn generation_id(&self) -> i32;

    /// Topic to assigned partitions for this generation.
    fn claims(&self) -> HashMap<String, Vec<i32>>;

    /// Whether commits are still accepted. False once the session was
    /// revoked or aborted.
    fn is_active(&self) -> bool {
        true
    }

    /// Records `message` (and everything before it on its partition) as
    /// processed.
    fn commit(&self, message: &RawMessage) -> Result<()>;
}

/// The ordered stream of messages for one partition in one session.
///
/// Ends when the sending side is dropped, which happens when the partition
/// is revoked or the session shuts down.
pub struct Claim {
    topic: String,
    partition: i32,
    messages: mpsc::Receiver<RawMessage>,
}

impl Claim {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        messages: mpsc::Receiver<RawMessage>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            messages,
        }
    }

    /// Create a claim together with the sender that feeds it.
    pub fn channel(
        topic: impl Into<String>,
        partition: i32,
        buffer: usize,
    ) -> (mpsc::Sender<RawMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(topic, partition, rx))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Wait for the next message. `None` once the claim is exhausted.
    pub async fn next(&mut self) -> Option<RawMessage> {
        self.messages.recv().await
    }
}

/// Where a session is in its lifecycle.
///
/// ```text
/// Idle ──setup──▶ SetUp ──consume_claim──▶ Consuming ──cleanup──▶ CleanedUp
/// ```
///
/// `cleanup` is also accepted straight from `SetUp` (a generation with no
/// claims), and `setup` from `CleanedUp` starts the next generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No session has been set up yet.
    Idle,
    /// `setup` ran; no claim has started.
    SetUp,
    /// At least one claim is being processed.
    Consuming,
    /// `cleanup` ran; the next generation may be set up.
    CleanedUp,
}

impl SessionPhase {
    pub fn as_str(&self) -> &str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::SetUp => "set_up",
            SessionPhase::Consuming => "consuming",
            SessionPhase::CleanedUp => "cleaned_up",
        }
    }

    pub fn on_setup(self) -> Result<Self> {
        match self {
            SessionPhase::Idle | SessionPhase::CleanedUp => Ok(SessionPhase::SetUp),
            from => Err(Error::Lifecycle {
                from,
                event: "setup",
            }),
        }
    }

    pub fn on_consume(self) -> Result<Self> {
        match self {
            SessionPhase::SetUp | SessionPhase::Consuming => Ok(SessionPhase::Consuming),
            from => Err(Error::Lifecycle {
                from,
                event: "consume_claim",
            }),
        }
    }

    pub fn on_cleanup(self) -> Result<Self> {
        match self {
            SessionPhase::SetUp | SessionPhase::Consuming => Ok(SessionPhase::CleanedUp),
            from => Err(Error::Lifecycle {
                from,
                event: "cleanup",
            }),
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_happy_path() {
        let phase = SessionPhase::Idle.on_setup().unwrap();
        let phase = phase.on_consume().unwrap();
        let phase = phase.on_consume().unwrap();
        let phase = phase.on_cleanup().unwrap();
        assert_eq!(phase, SessionPhase::CleanedUp);
        assert_eq!(phase.on_setup().unwrap(), SessionPhase::SetUp);
    }

    #[test]
    fn test_phase_rejects_consume_before_setup() {
        let err = SessionPhase::Idle.on_consume().unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle {
                from: SessionPhase::Idle,
                event: "consume_claim"
            }
        ));
        assert!(SessionPhase::CleanedUp.on_consume().is_err());
        assert!(SessionPhase::Consuming.on_setup().is_err());
        assert!(SessionPhase::Idle.on_cleanup().is_err());
    }

    #[tokio::test]
    async fn test_claim_ends_when_sender_dropped() {
        let (tx, mut claim) = Claim::channel("orders", 0, 4);
        tx.send(RawMessage::new("orders", 0, 1, b"a".to_vec()))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(claim.next().await.map(|m| m.offset), Some(1));
        assert!(claim.next().await.is_none());
    }
}
