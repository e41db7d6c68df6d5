use std::{pin::Pin, sync::Arc};

use futures::{Stream, StreamExt};
use tokio::sync::oneshot;

use crate::{
    envelope::Envelope,
    observability::{Metrics, BATCHES_FAILED_TOTAL},
};

/// One batch as handed over by a transport, with an optional channel to report the outcome.
#[derive(Debug)]
pub struct Delivery {
    pub envelopes: Vec<Envelope>,
    pub ack: Option<oneshot::Sender<Result<(), String>>>,
}

impl Delivery {
    pub fn new(envelopes: Vec<Envelope>) -> Self {
        Self { envelopes, ack: None }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("handler error: {0}")]
    Handler(String),
}

#[async_trait::async_trait]
pub trait Source: Send + Sync {
    async fn stream(&self) -> Pin<Box<dyn Stream<Item = Result<Delivery, PipelineError>> + Send>>;
}

/// Processes one topic's batches strictly in order.
///
/// An `Err` fails the whole batch; the transport is expected to redeliver it.
#[async_trait::async_trait]
pub trait BatchHandler: Send + Sync {
    fn topic(&self) -> &'static str;

    async fn handle(&self, batch: &[Envelope]) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub batches: u64,
    pub failed_batches: u64,
    pub source_errors: u64,
}

/// Drains a source into a handler, one batch at a time.
pub struct Consumer<S> {
    pub source: S,
    pub handler: Arc<dyn BatchHandler>,
    pub metrics: Arc<dyn Metrics>,
}

impl<S> Consumer<S>
where
    S: Source + Send + Sync + 'static,
{
    pub async fn run(self) -> ConsumerStats {
        let topic = self.handler.topic();
        let mut stream = self.source.stream().await;
        let mut stats = ConsumerStats::default();

        while let Some(item) = stream.next().await {
            let delivery = match item {
                Ok(delivery) => delivery,
                Err(e) => {
                    stats.source_errors += 1;
                    tracing::error!(error = %e, topic, "error in upstream source");
                    continue;
                }
            };

            stats.batches += 1;
            let res = self.handler.handle(&delivery.envelopes).await;
            if let Err(e) = &res {
                stats.failed_batches += 1;
                self.metrics.increment(BATCHES_FAILED_TOTAL, ("topic", topic));
                tracing::error!(error = %e, topic, size = delivery.envelopes.len(), "batch failed");
            }

            if let Some(ack) = delivery.ack {
                // The sender may have given up waiting; nothing to do then.
                let _ = ack.send(res.map_err(|e| e.to_string()));
            }
        }

        tracing::info!(topic, batches = stats.batches, failed = stats.failed_batches, "consumer finished");
        stats
    }
}
