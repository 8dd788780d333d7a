//! Consumer-group session callbacks.
//!
//! The group membership protocol decides when a session starts and ends;
//! [`GroupHandler`] only reacts to it. The driver in [`crate::kafka`] calls
//! `setup` once per generation, `consume_claim` once per assigned partition
//! (concurrently), and `cleanup` when the generation ends.

use std::sync::{Arc, Mutex};

use tracing::{info, info_span, Instrument};

use crate::error::Result;
use crate::processor::ClaimProcessor;
use crate::session::{Claim, Session, SessionPhase};

pub struct GroupHandler {
    processor: ClaimProcessor,
    phase: Mutex<SessionPhase>,
}

impl GroupHandler {
    pub fn new(processor: ClaimProcessor) -> Self {
        Self {
            processor,
            phase: Mutex::new(SessionPhase::Idle),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: impl FnOnce(SessionPhase) -> Result<SessionPhase>) -> Result<()> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        *phase = next(*phase)?;
        Ok(())
    }

    /// A new generation was assigned to this member.
    pub fn setup(&self, session: &dyn Session) -> Result<()> {
        self.transition(SessionPhase::on_setup)?;
        info!(
            claims = ?session.claims(),
            member_id = session.member_id(),
            generation_id = session.generation_id(),
            "Consumer group session set up"
        );
        Ok(())
    }

    /// Process one partition claim until it ends or aborts the session.
    pub async fn consume_claim(&self, session: Arc<dyn Session>, claim: Claim) -> Result<()> {
        self.transition(SessionPhase::on_consume)?;
        let span = info_span!("claim", topic = claim.topic(), partition = claim.partition());
        self.processor.process(&session, claim).instrument(span).await
    }

    /// The generation ended, either by rebalance or by an aborted claim.
    pub fn cleanup(&self, session: &dyn Session) -> Result<()> {
        self.transition(SessionPhase::on_cleanup)?;
        info!(
            claims = ?session.claims(),
            member_id = session.member_id(),
            generation_id = session.generation_id(),
            "Consumer group session cleaned up"
        );
        Ok(())
    }
}
