//! A received message bound to its source coordinates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bridge_codec::Envelope;
use tracing::debug;

use crate::error::Result;
use crate::message::RawMessage;
use crate::session::Session;

/// One decoded message as seen by a handler.
///
/// Lives for a single processing step. The session is held weakly, so a
/// publication never keeps a finished session alive.
pub struct Publication {
    envelope: Envelope,
    raw: RawMessage,
    error: Option<anyhow::Error>,
    session: Weak<dyn Session>,
    acked: AtomicBool,
}

impl Publication {
    pub fn new(envelope: Envelope, raw: RawMessage, session: &Arc<dyn Session>) -> Self {
        Self {
            envelope,
            raw,
            error: None,
            session: Arc::downgrade(session),
            acked: AtomicBool::new(false),
        }
    }

    pub fn topic(&self) -> &str {
        &self.raw.topic
    }

    pub fn partition(&self) -> i32 {
        self.raw.partition
    }

    pub fn offset(&self) -> i64 {
        self.raw.offset
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The decode or handler error this publication was created for, if any.
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    /// Whether this publication's offset has been committed.
    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }

    /// Commit this message's offset on the session it came from.
    ///
    /// Calling it again after a successful commit does nothing, and so does
    /// calling it once the session has ended.
    pub fn ack(&self) -> Result<()> {
        if self.is_acked() {
            return Ok(());
        }
        let Some(session) = self.session.upgrade().filter(|s| s.is_active()) else {
            debug!(key = %self.raw.coordinates(), "session gone, skipping ack");
            return Ok(());
        };
        session.commit(&self.raw)?;
        self.acked.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn set_error(&mut self, err: anyhow::Error) {
        debug_assert!(self.error.is_none(), "publication error is set once");
        self.error.get_or_insert(err);
    }
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("key", &self.raw.coordinates())
            .field("envelope", &self.envelope)
            .field("error", &self.error)
            .field("acked", &self.is_acked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSession;

    fn publication(session: &Arc<dyn Session>) -> Publication {
        let raw = RawMessage::new("orders", 2, 57, b"{}".to_vec());
        Publication::new(Envelope::new(raw.value.clone()), raw, session)
    }

    #[test]
    fn test_accessors() {
        let session: Arc<dyn Session> = Arc::new(RecordingSession::new());
        let p = publication(&session);
        assert_eq!(p.topic(), "orders");
        assert_eq!(p.partition(), 2);
        assert_eq!(p.offset(), 57);
        assert_eq!(p.envelope().body, b"{}");
        assert!(p.error().is_none());
    }

    #[test]
    fn test_ack_is_idempotent() {
        let recording = Arc::new(RecordingSession::new());
        let session: Arc<dyn Session> = recording.clone();
        let p = publication(&session);

        p.ack().unwrap();
        p.ack().unwrap();
        assert!(p.is_acked());
        assert_eq!(recording.committed_offsets(), vec![57]);
    }

    #[test]
    fn test_ack_after_session_dropped_is_noop() {
        let session: Arc<dyn Session> = Arc::new(RecordingSession::new());
        let p = publication(&session);
        drop(session);

        p.ack().unwrap();
        assert!(!p.is_acked());
    }

    #[test]
    fn test_ack_on_inactive_session_is_noop() {
        let recording = Arc::new(RecordingSession::new());
        let session: Arc<dyn Session> = recording.clone();
        let p = publication(&session);
        recording.deactivate();

        p.ack().unwrap();
        assert!(recording.committed_offsets().is_empty());
    }
}
