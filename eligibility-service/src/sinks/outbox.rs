use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use super::{EventSink, SinkError};
use crate::envelope::Envelope;

/// Writes downstream events into the `event_outbox` table for a relay to forward.
pub struct OutboxSink {
    pool: PgPool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OutboxSink {
    pub fn new(pool: PgPool, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            max_retries,
            retry_backoff,
        }
    }

    async fn insert(&self, topic: &str, envelope: &Envelope, body: &str) -> Result<(), sqlx::Error> {
        let type_url = envelope
            .payload
            .as_ref()
            .map(|p| p.type_url.as_str())
            .unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO event_outbox (id, topic, type_url, sender, occurred_at, envelope)
            VALUES ($1::uuid, $2, $3, $4, $5, $6::jsonb)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(envelope.id.to_string())
        .bind(topic)
        .bind(type_url)
        .bind(&envelope.sender)
        .bind(envelope.occurred_at)
        .bind(body)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl EventSink for OutboxSink {
    async fn publish(&self, topic: &'static str, envelope: &Envelope) -> Result<(), SinkError> {
        let body = serde_json::to_string(envelope).map_err(|e| SinkError::Encode(e.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            match self.insert(topic, envelope, &body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        topic,
                        "outbox insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, topic, "outbox insert failed, giving up");
                    return Err(SinkError::Publish {
                        topic,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
