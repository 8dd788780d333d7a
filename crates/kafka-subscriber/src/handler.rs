//! Application handlers and subscription options.

use std::sync::Arc;

use async_trait::async_trait;

use crate::publication::Publication;

/// Application callback invoked once per delivered message.
///
/// Returning an error hands the message to the error-classification
/// policy of the claim processor. Wrap a [`bridge_codec::CodecError`] of a
/// poison kind in the error to have the message skipped.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, publication: &Publication) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&Publication) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, publication: &Publication) -> anyhow::Result<()> {
        self(publication)
    }
}

/// Per-subscription behaviour of the claim processor.
#[derive(Clone)]
pub struct SubscribeOptions {
    /// Commit automatically when the handler succeeds.
    pub auto_ack: bool,
    /// Receives decode failures and non-poison handler failures. Without
    /// one, a handler failure aborts the claim.
    pub error_handler: Option<Arc<dyn Handler>>,
}

impl SubscribeOptions {
    pub fn with_error_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            auto_ack: true,
            error_handler: None,
        }
    }
}

impl std::fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("auto_ack", &self.auto_ack)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
