use std::sync::Arc;

use eligibility_client::{
    db::{Store, StoreError},
    domain::{EvaluationKind, Occupancy, ReasonSet},
};

use super::EvaluationError;
use crate::{
    events::{DownstreamEvent, SmartBookingJourneyOccupancyAdded, SmartBookingJourneyOccupancyRemoved},
    observability::{Metrics, EVENTS_PUBLISHED_TOTAL, PUBLISH_FAILURES_TOTAL},
    sinks::{EventSink, SinkError},
};

/// Publishes a dimension's outcome only when it differs from the persisted baseline,
/// then records the new baseline.
pub struct ChangePublisher {
    store: Arc<dyn Store>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<dyn Metrics>,
    sender: String,
}

impl ChangePublisher {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn EventSink>,
        metrics: Arc<dyn Metrics>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            metrics,
            sender: sender.into(),
        }
    }

    /// Returns whether an event was published.
    pub async fn publish_if_changed(
        &self,
        occupancy: &Occupancy,
        kind: EvaluationKind,
        reasons: &ReasonSet,
    ) -> Result<bool, EvaluationError> {
        if !occupancy.results.get(kind).differs_from(reasons) {
            return Ok(false);
        }

        let event = DownstreamEvent::for_outcome(kind, &occupancy.id, &occupancy.account.id, reasons);
        self.publish(&event).await?;

        self.store
            .save_result(&occupancy.id, &occupancy.account.id, kind, reasons)
            .await?;

        tracing::debug!(
            occupancy_id = %occupancy.id,
            kind = %kind,
            reasons = ?reasons.codes(),
            "evaluation outcome changed"
        );
        Ok(true)
    }

    /// Publishes the derived booking-journey state. Not change-detected: callers
    /// invoke it on every full run.
    pub async fn publish_booking_journey(
        &self,
        occupancy: &Occupancy,
        qualifies: bool,
    ) -> Result<bool, EvaluationError> {
        let reference = if qualifies {
            self.first_booking_reference(occupancy).await?
        } else {
            None
        };

        let occupancy_id = occupancy.id.clone();
        let account_id = occupancy.account.id.clone();
        let event = match reference {
            Some(booking_reference) => DownstreamEvent::JourneyAdded(SmartBookingJourneyOccupancyAdded {
                occupancy_id,
                account_id,
                booking_reference,
            }),
            None => DownstreamEvent::JourneyRemoved(SmartBookingJourneyOccupancyRemoved {
                occupancy_id,
                account_id,
            }),
        };
        let added = matches!(event, DownstreamEvent::JourneyAdded(_));
        self.publish(&event).await?;
        Ok(added)
    }

    /// First usable reference, provided every live service has one.
    async fn first_booking_reference(&self, occupancy: &Occupancy) -> Result<Option<String>, EvaluationError> {
        let mut first = None;
        for service in occupancy.live_services() {
            let reference = match self.store.get_booking_reference(&service.mpxn).await {
                Ok(reference) if reference.is_usable() => reference,
                Ok(_) | Err(StoreError::NotFound) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            first.get_or_insert(reference.reference);
        }
        Ok(first)
    }

    async fn publish(&self, event: &DownstreamEvent) -> Result<(), EvaluationError> {
        let topic = event.topic();
        let envelope = event
            .to_envelope(&self.sender)
            .map_err(|e| SinkError::Encode(e.to_string()))?;

        match self.sink.publish(topic, &envelope).await {
            Ok(()) => {
                self.metrics.increment(EVENTS_PUBLISHED_TOTAL, ("topic", topic));
                Ok(())
            }
            Err(e) => {
                self.metrics.increment(PUBLISH_FAILURES_TOTAL, ("topic", topic));
                Err(e.into())
            }
        }
    }
}
