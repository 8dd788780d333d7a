//! In-memory session for exercising claim processing without a broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::message::RawMessage;
use crate::session::Session;

/// A [`Session`] that records every commit instead of sending it anywhere.
#[derive(Debug)]
pub struct RecordingSession {
    member_id: String,
    generation_id: i32,
    claims: HashMap<String, Vec<i32>>,
    commits: Mutex<Vec<RawMessage>>,
    active: AtomicBool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::with_claims(HashMap::new())
    }

    pub fn with_claims(claims: HashMap<String, Vec<i32>>) -> Self {
        Self {
            member_id: "recording-member".to_string(),
            generation_id: 1,
            claims,
            commits: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
        }
    }

    /// Every committed message, in commit order.
    pub fn commits(&self) -> Vec<RawMessage> {
        self.commits
            .lock()
            .map(|commits| commits.clone())
            .unwrap_or_default()
    }

    pub fn committed_offsets(&self) -> Vec<i64> {
        self.commits().iter().map(|m| m.offset).collect()
    }

    /// Simulate a revoked session; later commits are refused.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for RecordingSession {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn generation_id(&self) -> i32 {
        self.generation_id
    }

    fn claims(&self) -> HashMap<String, Vec<i32>> {
        self.claims.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn commit(&self, message: &RawMessage) -> Result<()> {
        if let Ok(mut commits) = self.commits.lock() {
            commits.push(message.clone());
        }
        Ok(())
    }
}
