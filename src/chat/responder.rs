//! Assistant reply providers.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::core::config::ReplyConfig;
use crate::core::errors::ChatResult;

/// Boxed future type for responder operations.
pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = ChatResult<String>> + Send + 'a>>;

/// Trait abstraction over whatever answers user messages.
pub trait Responder: Send + Sync {
    /// Produce the assistant reply to `prompt`.
    ///
    /// # Errors
    /// Returns an error if the exchange fails; the store marks the user
    /// message as failed and keeps the error text.
    fn reply(&self, prompt: &str) -> ReplyFuture<'_>;
}

/// Waits a fixed latency, then answers with fixed text.
#[derive(Clone, Debug)]
pub struct SimulatedResponder {
    delay: Duration,
    text: String,
}

impl SimulatedResponder {
    /// Build from reply settings.
    #[must_use]
    pub fn new(config: &ReplyConfig) -> Self {
        Self {
            delay: config.delay(),
            text: config.text.clone(),
        }
    }
}

impl Responder for SimulatedResponder {
    fn reply(&self, _prompt: &str) -> ReplyFuture<'_> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.text.clone())
        })
    }
}
