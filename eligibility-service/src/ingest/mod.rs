//! Upstream ingestion: one handler per topic.
//!
//! Each handler persists the fact an envelope carries and, unless running in
//! state-rebuild mode, re-evaluates the occupancies it affects before moving
//! on to the next message of the batch.

pub mod alt_han;
pub mod booking_reference;
pub mod meter;
pub mod meterpoint;
pub mod occupancy;
pub mod opt_out;
pub mod psr;
pub mod router;
pub mod service;
pub mod site;
pub mod wan_coverage;

use std::{fmt, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use eligibility_client::db::{Store, StoreError, StoreResult};

use crate::{
    envelope::{AnyPayload, DecodeError, Envelope},
    evaluation::{EvaluationError, Evaluator},
    observability::{
        Metrics, ENVELOPES_MALFORMED_TOTAL, ENVELOPES_RECEIVED_TOTAL, ENVELOPES_SKIPPED_TOTAL,
        EVENTS_UNHANDLED_TOTAL,
    },
    pipeline::{BatchHandler, PipelineError},
};

pub use router::{resolve, Cascade, CascadeKey};

/// Static description of one upstream topic.
#[async_trait]
pub trait Topic: Send + Sync + 'static {
    type Event: Send + Sync + fmt::Debug;

    const NAME: &'static str;

    /// Unknown type URLs decode to the topic's `Unhandled` variant, not an error.
    fn decode(payload: &AnyPayload) -> Result<Self::Event, DecodeError>;

    fn unhandled_type(event: &Self::Event) -> Option<&str>;

    /// Keys the event moves an entity away from, read before `persist` overwrites them.
    async fn displaced(_store: &dyn Store, _event: &Self::Event) -> StoreResult<Vec<CascadeKey>> {
        Ok(Vec::new())
    }

    async fn persist(store: &dyn Store, event: &Self::Event) -> StoreResult<()>;

    fn cascade(event: &Self::Event) -> Option<Cascade>;
}

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

/// Shared dependencies of every topic handler.
#[derive(Clone)]
pub struct IngestContext {
    pub store: Arc<dyn Store>,
    pub evaluator: Arc<Evaluator>,
    pub metrics: Arc<dyn Metrics>,
    /// Persist facts only; no cascade evaluation and therefore no downstream events.
    pub state_rebuild: bool,
}

pub struct TopicHandler<T> {
    ctx: IngestContext,
    _topic: PhantomData<fn() -> T>,
}

impl<T: Topic> TopicHandler<T> {
    pub fn new(ctx: IngestContext) -> Self {
        Self {
            ctx,
            _topic: PhantomData,
        }
    }

    async fn handle_message(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let topic = T::NAME;
        let metrics = &self.ctx.metrics;
        metrics.increment(ENVELOPES_RECEIVED_TOTAL, ("topic", topic));

        let Some(payload) = envelope.inner() else {
            metrics.increment(ENVELOPES_SKIPPED_TOTAL, ("topic", topic));
            tracing::debug!(topic, id = %envelope.id, "envelope without payload, skipping");
            return Ok(());
        };

        let event = match T::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                metrics.increment(ENVELOPES_MALFORMED_TOTAL, ("topic", topic));
                tracing::warn!(topic, id = %envelope.id, error = %e, "malformed envelope, skipping");
                return Ok(());
            }
        };

        if let Some(type_url) = T::unhandled_type(&event) {
            metrics.increment(EVENTS_UNHANDLED_TOTAL, ("topic", topic));
            tracing::debug!(topic, type_url, "unhandled event type");
            return Ok(());
        }

        let store = self.ctx.store.as_ref();
        let displaced = if self.ctx.state_rebuild {
            Vec::new()
        } else {
            T::displaced(store, &event).await?
        };

        match T::persist(store, &event).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::warn!(topic, ?event, "event refers to an unknown entity, skipping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if self.ctx.state_rebuild {
            return Ok(());
        }
        let Some(cascade) = T::cascade(&event) else {
            return Ok(());
        };

        let mut occupancy_ids = resolve(store, &cascade.key).await?;
        for key in &displaced {
            for id in resolve(store, key).await? {
                if !occupancy_ids.contains(&id) {
                    occupancy_ids.push(id);
                }
            }
        }
        for occupancy_id in occupancy_ids {
            match self.ctx.evaluator.run(cascade.entry, &occupancy_id).await {
                Ok(_) => {}
                Err(EvaluationError::UnknownOccupancy(_)) => {
                    // Evaluated once its OccupancyStarted arrives.
                    tracing::debug!(topic, occupancy_id = %occupancy_id, "occupancy not known yet");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Topic> BatchHandler for TopicHandler<T> {
    fn topic(&self) -> &'static str {
        T::NAME
    }

    async fn handle(&self, batch: &[Envelope]) -> Result<(), PipelineError> {
        for (index, envelope) in batch.iter().enumerate() {
            self.handle_message(envelope).await.map_err(|e| {
                PipelineError::Handler(format!(
                    "{} message {index} ({}) failed: {e}",
                    T::NAME,
                    envelope.id
                ))
            })?;
        }
        Ok(())
    }
}

/// Names of every consumed topic.
pub const TOPICS: [&str; 10] = [
    alt_han::AltHanTopic::NAME,
    opt_out::OptOutTopic::NAME,
    psr::PsrTopic::NAME,
    booking_reference::BookingReferenceTopic::NAME,
    meter::MeterTopic::NAME,
    meterpoint::MeterpointTopic::NAME,
    occupancy::OccupancyTopic::NAME,
    service::ServiceTopic::NAME,
    site::SiteTopic::NAME,
    wan_coverage::WanCoverageTopic::NAME,
];

fn handler<T: Topic>(ctx: &IngestContext) -> Arc<dyn BatchHandler> {
    Arc::new(TopicHandler::<T>::new(ctx.clone()))
}

pub fn handlers(ctx: IngestContext) -> Vec<Arc<dyn BatchHandler>> {
    vec![
        handler::<alt_han::AltHanTopic>(&ctx),
        handler::<opt_out::OptOutTopic>(&ctx),
        handler::<psr::PsrTopic>(&ctx),
        handler::<booking_reference::BookingReferenceTopic>(&ctx),
        handler::<meter::MeterTopic>(&ctx),
        handler::<meterpoint::MeterpointTopic>(&ctx),
        handler::<occupancy::OccupancyTopic>(&ctx),
        handler::<service::ServiceTopic>(&ctx),
        handler::<site::SiteTopic>(&ctx),
        handler::<wan_coverage::WanCoverageTopic>(&ctx),
    ]
}

pub fn handler_for(ctx: IngestContext, topic: &str) -> Option<Arc<dyn BatchHandler>> {
    handlers(ctx).into_iter().find(|handler| handler.topic() == topic)
}
