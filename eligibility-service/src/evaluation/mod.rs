//! Re-evaluation engine: load an occupancy, run the rule sets, publish what changed.

pub mod bulk;
pub mod loader;
pub mod publisher;
pub mod rules;

use std::{fmt, sync::Arc};

use eligibility_client::{
    db::{Store, StoreError},
    domain::{EvaluationKind, Occupancy, ReasonSet},
};

use crate::{
    observability::{Metrics, EVALUATIONS_TOTAL, EVALUATION_FAILURES_TOTAL},
    sinks::{EventSink, SinkError},
};

pub use bulk::{BulkRunner, BulkSummary};
pub use loader::OccupancyLoader;
pub use publisher::ChangePublisher;

pub const SENDER: &str = "eligibility-service";

#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    #[error("occupancy {0} does not exist")]
    UnknownOccupancy(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Which dimensions a run re-evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Full,
    Eligibility,
    Suppliability,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Eligibility => "eligibility",
            Self::Suppliability => "suppliability",
        }
    }

    fn kinds(&self) -> &'static [EvaluationKind] {
        match self {
            Self::Full => &EvaluationKind::ALL,
            Self::Eligibility => &[EvaluationKind::Eligibility],
            Self::Suppliability => &[EvaluationKind::Suppliability],
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one run computed and which dimensions it published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub eligibility: Option<ReasonSet>,
    pub suppliability: Option<ReasonSet>,
    pub campaignability: Option<ReasonSet>,
    pub published: Vec<EvaluationKind>,
    /// `Some(added)` when the booking-journey event was published.
    pub booking_journey: Option<bool>,
}

impl EvaluationOutcome {
    fn record(&mut self, kind: EvaluationKind, reasons: ReasonSet) {
        let slot = match kind {
            EvaluationKind::Eligibility => &mut self.eligibility,
            EvaluationKind::Suppliability => &mut self.suppliability,
            EvaluationKind::Campaignability => &mut self.campaignability,
        };
        *slot = Some(reasons);
    }

    fn fully_qualifies(&self) -> bool {
        [&self.eligibility, &self.suppliability, &self.campaignability]
            .into_iter()
            .all(|reasons| reasons.as_ref().is_some_and(ReasonSet::is_empty))
    }
}

pub fn evaluate(kind: EvaluationKind, occupancy: &Occupancy) -> ReasonSet {
    match kind {
        EvaluationKind::Eligibility => rules::evaluate_eligibility(occupancy),
        EvaluationKind::Suppliability => rules::evaluate_suppliability(occupancy),
        EvaluationKind::Campaignability => rules::evaluate_campaignability(occupancy),
    }
}

pub struct Evaluator {
    loader: OccupancyLoader,
    publisher: ChangePublisher,
    metrics: Arc<dyn Metrics>,
}

impl Evaluator {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn EventSink>, metrics: Arc<dyn Metrics>) -> Self {
        Self {
            loader: OccupancyLoader::new(store.clone()),
            publisher: ChangePublisher::new(store, sink, metrics.clone(), SENDER),
            metrics,
        }
    }

    pub async fn run_full(&self, occupancy_id: &str) -> Result<EvaluationOutcome, EvaluationError> {
        self.run(EntryPoint::Full, occupancy_id).await
    }

    pub async fn run_eligibility(&self, occupancy_id: &str) -> Result<EvaluationOutcome, EvaluationError> {
        self.run(EntryPoint::Eligibility, occupancy_id).await
    }

    pub async fn run_suppliability(&self, occupancy_id: &str) -> Result<EvaluationOutcome, EvaluationError> {
        self.run(EntryPoint::Suppliability, occupancy_id).await
    }

    pub async fn run(&self, entry: EntryPoint, occupancy_id: &str) -> Result<EvaluationOutcome, EvaluationError> {
        self.metrics.increment(EVALUATIONS_TOTAL, ("entry", entry.as_str()));

        let res = self.run_inner(entry, occupancy_id).await;
        if let Err(e) = &res {
            self.metrics.increment(EVALUATION_FAILURES_TOTAL, ("entry", entry.as_str()));
            tracing::warn!(occupancy_id, entry = %entry, error = %e, "evaluation failed");
        }
        res
    }

    async fn run_inner(&self, entry: EntryPoint, occupancy_id: &str) -> Result<EvaluationOutcome, EvaluationError> {
        let occupancy = self.loader.load(occupancy_id).await?;
        let mut outcome = EvaluationOutcome::default();

        for kind in entry.kinds() {
            let reasons = evaluate(*kind, &occupancy);
            if self.publisher.publish_if_changed(&occupancy, *kind, &reasons).await? {
                outcome.published.push(*kind);
            }
            outcome.record(*kind, reasons);
        }

        if entry == EntryPoint::Full {
            let added = self
                .publisher
                .publish_booking_journey(&occupancy, outcome.fully_qualifies())
                .await?;
            outcome.booking_journey = Some(added);
        }

        Ok(outcome)
    }
}
