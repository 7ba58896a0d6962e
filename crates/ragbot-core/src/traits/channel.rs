//! Messaging channel trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::OutgoingMessage;

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Verify credentials and mark the channel ready.
    async fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    async fn send_typing(&self, thread_id: &str) -> Result<()>;
}
