pub mod log;
pub mod memory;
pub mod outbox;

use async_trait::async_trait;

use crate::envelope::Envelope;

pub use self::log::LogSink;
pub use memory::MemorySink;
pub use outbox::OutboxSink;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: &'static str, reason: String },
    #[error("event could not be encoded: {0}")]
    Encode(String),
}

/// Synchronous, at-least-once destination for downstream events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, topic: &'static str, envelope: &Envelope) -> Result<(), SinkError>;
}
