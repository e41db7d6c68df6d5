use async_trait::async_trait;

use super::{EventSink, SinkError};
use crate::envelope::Envelope;

/// Emits each event through `tracing`. Useful for dry runs against a copy of production data.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, topic: &'static str, envelope: &Envelope) -> Result<(), SinkError> {
        let payload = envelope
            .payload
            .as_ref()
            .map(|p| p.value.to_string())
            .unwrap_or_default();
        let event = envelope
            .payload
            .as_ref()
            .map(|p| p.type_name())
            .unwrap_or_default();

        tracing::info!(topic, event, id = %envelope.id, payload = %payload, "publish");
        Ok(())
    }
}
