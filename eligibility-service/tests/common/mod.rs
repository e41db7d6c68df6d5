#![allow(dead_code)]

use std::sync::Arc;

use eligibility_client::{
    db::{EvaluationStore, MemoryStore},
    domain::{EvaluationResults, ReasonSet},
};
use eligibility_service::{
    envelope::{Envelope, TypedPayload},
    evaluation::Evaluator,
    events::DownstreamEvent,
    ingest::{self, IngestContext},
    observability::RecordingMetrics,
    pipeline::PipelineError,
    sinks::MemorySink,
};
use time::macros::datetime;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemorySink>,
    pub metrics: Arc<RecordingMetrics>,
    pub evaluator: Arc<Evaluator>,
    pub state_rebuild: bool,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let metrics = Arc::new(RecordingMetrics::new());
        let evaluator = Arc::new(Evaluator::new(store.clone(), sink.clone(), metrics.clone()));
        Self {
            store,
            sink,
            metrics,
            evaluator,
            state_rebuild: false,
        }
    }

    pub fn rebuilding() -> Self {
        Self {
            state_rebuild: true,
            ..Self::new()
        }
    }

    pub fn context(&self) -> IngestContext {
        IngestContext {
            store: self.store.clone(),
            evaluator: self.evaluator.clone(),
            metrics: self.metrics.clone(),
            state_rebuild: self.state_rebuild,
        }
    }

    pub async fn deliver(&self, topic: &str, batch: &[Envelope]) -> Result<(), PipelineError> {
        let handler = ingest::handler_for(self.context(), topic).expect("known topic");
        handler.handle(batch).await
    }

    pub async fn send<T: TypedPayload>(&self, topic: &str, event: &T) -> Result<(), PipelineError> {
        self.deliver(topic, &[wrap(event)]).await
    }

    pub fn events_on(&self, topic: &str) -> Vec<DownstreamEvent> {
        self.sink.events_on(topic)
    }

    pub fn last_on(&self, topic: &str) -> Option<DownstreamEvent> {
        self.events_on(topic).pop()
    }

    pub async fn results(&self, occupancy_id: &str, account_id: &str) -> EvaluationResults {
        self.store.get_results(occupancy_id, account_id).await.unwrap()
    }

    pub async fn eligibility(&self, occupancy_id: &str, account_id: &str) -> ReasonSet {
        self.results(occupancy_id, account_id).await.eligibility.reasons
    }
}

pub fn wrap<T: TypedPayload>(event: &T) -> Envelope {
    Envelope::wrap("upstream", datetime!(2024-03-01 09:00:00 UTC), event).unwrap()
}
