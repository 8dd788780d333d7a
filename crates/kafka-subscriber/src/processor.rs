//! Per-partition claim processing.
//!
//! Each message of a claim goes through:
//!
//! ```text
//! decode ──fail──▶ error handler, or drop without commit
//!   │
//!   ▼
//! add "key" header ─▶ handler ──ok──▶ commit if auto-ack
//!                        │
//!                        └─err─▶ poison?        ─▶ commit and skip
//!                                error handler? ─▶ handled, or abort if it fails
//!                                otherwise      ─▶ abort
//! ```
//!
//! Messages are handled strictly one after the other; message N+1 is not
//! read from the claim before message N has been classified.

use std::sync::Arc;

use bridge_codec::{Codec, CodecError, Decodable, Envelope, KEY_HEADER};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::handler::{Handler, SubscribeOptions};
use crate::message::RawMessage;
use crate::publication::Publication;
use crate::session::{Claim, Session};

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handled successfully and committed.
    Committed,
    /// Handled successfully; committing is left to the handler.
    Delivered,
    /// Poison message, committed without being handled.
    Skipped,
    /// Failed, and the error handler took care of it.
    Handled,
    /// Could not be decoded and no error handler is configured. Not
    /// committed, so it is redelivered after a restart.
    Dropped,
}

/// Drives decode, dispatch, classification and commit for one partition.
pub struct ClaimProcessor {
    handler: Arc<dyn Handler>,
    codec: Arc<dyn Codec>,
    options: SubscribeOptions,
}

impl ClaimProcessor {
    pub fn new(
        handler: Arc<dyn Handler>,
        codec: Arc<dyn Codec>,
        options: SubscribeOptions,
    ) -> Self {
        Self {
            handler,
            codec,
            options,
        }
    }

    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    /// Process `claim` until it is exhausted or a message aborts it.
    ///
    /// Returning an error ends the consumer session; the broker then
    /// redelivers every uncommitted message to whichever member gets the
    /// partition next.
    pub async fn process(&self, session: &Arc<dyn Session>, mut claim: Claim) -> Result<()> {
        debug!(
            topic = claim.topic(),
            partition = claim.partition(),
            "Processing claim"
        );
        while let Some(raw) = claim.next().await {
            self.process_message(session, raw).await?;
        }
        debug!(
            topic = claim.topic(),
            partition = claim.partition(),
            "Claim exhausted"
        );
        Ok(())
    }

    /// Handle one message and report what happened to it.
    pub async fn process_message(
        &self,
        session: &Arc<dyn Session>,
        raw: RawMessage,
    ) -> Result<Disposition> {
        let mut envelope = Envelope::default();
        if let Err(err) = self
            .codec
            .unmarshal(&raw.value, Decodable::from(&mut envelope))
        {
            return self.on_decode_failure(session, raw, err).await;
        }

        let key = raw.coordinates();
        envelope.set_header(KEY_HEADER, key.clone());
        let offset = raw.offset;
        let mut publication = Publication::new(envelope, raw, session);

        let err = match self.handler.handle(&publication).await {
            Ok(()) if self.options.auto_ack => {
                publication.ack()?;
                return Ok(Disposition::Committed);
            }
            Ok(()) => return Ok(Disposition::Delivered),
            Err(err) => err,
        };

        if is_poison(&err) {
            error!(%key, "Skipping poison message: {err:#}");
            publication.ack()?;
            return Ok(Disposition::Skipped);
        }

        let Some(error_handler) = &self.options.error_handler else {
            error!(%key, "Handler failed: {err:#}");
            return Err(Error::Handler {
                offset,
                source: err,
            });
        };

        publication.set_error(err);
        if let Err(source) = error_handler.handle(&publication).await {
            error!(%key, "Error handler failed: {source:#}");
            return Err(Error::ErrorHandler { offset, source });
        }
        Ok(Disposition::Handled)
    }

    async fn on_decode_failure(
        &self,
        session: &Arc<dyn Session>,
        raw: RawMessage,
        err: CodecError,
    ) -> Result<Disposition> {
        let Some(error_handler) = &self.options.error_handler else {
            error!(
                key = %raw.coordinates(),
                codec = self.codec.name(),
                "Failed to unmarshal, leaving message uncommitted: {err}"
            );
            return Ok(Disposition::Dropped);
        };

        warn!(
            key = %raw.coordinates(),
            codec = self.codec.name(),
            "Failed to unmarshal, passing to error handler: {err}"
        );
        let offset = raw.offset;
        let mut publication = Publication::new(Envelope::new(raw.value.clone()), raw, session);
        publication.set_error(err.into());
        if let Err(source) = error_handler.handle(&publication).await {
            error!(offset, "Error handler failed on undecodable message: {source:#}");
            return Err(Error::ErrorHandler { offset, source });
        }
        Ok(Disposition::Handled)
    }
}

/// Whether a handler error marks a message that can never be handled.
pub fn is_poison(err: &anyhow::Error) -> bool {
    CodecError::chain_is_poison(&**err)
}
