//! Events this service produces.

use eligibility_client::domain::{EvaluationKind, ReasonSet};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    envelope::{DecodeError, Envelope, TypedPayload},
    typed_payload,
};

pub const ELIGIBLE_OCCUPANCY_TOPIC: &str = "eligible-occupancy";
pub const SUPPLIABLE_OCCUPANCY_TOPIC: &str = "suppliable-occupancy";
pub const CAMPAIGNABLE_OCCUPANCY_TOPIC: &str = "campaignable-occupancy";
pub const SMART_BOOKING_JOURNEY_TOPIC: &str = "smart-booking-journey-occupancy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleOccupancyAdded {
    pub occupancy_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleOccupancyRemoved {
    pub occupancy_id: String,
    pub account_id: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppliableOccupancyAdded {
    pub occupancy_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppliableOccupancyRemoved {
    pub occupancy_id: String,
    pub account_id: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignableOccupancyAdded {
    pub occupancy_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignableOccupancyRemoved {
    pub occupancy_id: String,
    pub account_id: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartBookingJourneyOccupancyAdded {
    pub occupancy_id: String,
    pub account_id: String,
    pub booking_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartBookingJourneyOccupancyRemoved {
    pub occupancy_id: String,
    pub account_id: String,
}

typed_payload!(
    EligibleOccupancyAdded,
    EligibleOccupancyRemoved,
    SuppliableOccupancyAdded,
    SuppliableOccupancyRemoved,
    CampaignableOccupancyAdded,
    CampaignableOccupancyRemoved,
    SmartBookingJourneyOccupancyAdded,
    SmartBookingJourneyOccupancyRemoved,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamEvent {
    EligibleAdded(EligibleOccupancyAdded),
    EligibleRemoved(EligibleOccupancyRemoved),
    SuppliableAdded(SuppliableOccupancyAdded),
    SuppliableRemoved(SuppliableOccupancyRemoved),
    CampaignableAdded(CampaignableOccupancyAdded),
    CampaignableRemoved(CampaignableOccupancyRemoved),
    JourneyAdded(SmartBookingJourneyOccupancyAdded),
    JourneyRemoved(SmartBookingJourneyOccupancyRemoved),
}

impl DownstreamEvent {
    /// "Added" when `reasons` is empty, otherwise "Removed" carrying every reason code.
    pub fn for_outcome(kind: EvaluationKind, occupancy_id: &str, account_id: &str, reasons: &ReasonSet) -> Self {
        let occupancy_id = occupancy_id.to_string();
        let account_id = account_id.to_string();

        if reasons.is_empty() {
            return match kind {
                EvaluationKind::Eligibility => Self::EligibleAdded(EligibleOccupancyAdded {
                    occupancy_id,
                    account_id,
                }),
                EvaluationKind::Suppliability => Self::SuppliableAdded(SuppliableOccupancyAdded {
                    occupancy_id,
                    account_id,
                }),
                EvaluationKind::Campaignability => Self::CampaignableAdded(CampaignableOccupancyAdded {
                    occupancy_id,
                    account_id,
                }),
            };
        }

        let reasons = reasons.codes();
        match kind {
            EvaluationKind::Eligibility => Self::EligibleRemoved(EligibleOccupancyRemoved {
                occupancy_id,
                account_id,
                reasons,
            }),
            EvaluationKind::Suppliability => Self::SuppliableRemoved(SuppliableOccupancyRemoved {
                occupancy_id,
                account_id,
                reasons,
            }),
            EvaluationKind::Campaignability => Self::CampaignableRemoved(CampaignableOccupancyRemoved {
                occupancy_id,
                account_id,
                reasons,
            }),
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Self::EligibleAdded(_) | Self::EligibleRemoved(_) => ELIGIBLE_OCCUPANCY_TOPIC,
            Self::SuppliableAdded(_) | Self::SuppliableRemoved(_) => SUPPLIABLE_OCCUPANCY_TOPIC,
            Self::CampaignableAdded(_) | Self::CampaignableRemoved(_) => CAMPAIGNABLE_OCCUPANCY_TOPIC,
            Self::JourneyAdded(_) | Self::JourneyRemoved(_) => SMART_BOOKING_JOURNEY_TOPIC,
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            Self::EligibleAdded(_) => EligibleOccupancyAdded::TYPE_URL,
            Self::EligibleRemoved(_) => EligibleOccupancyRemoved::TYPE_URL,
            Self::SuppliableAdded(_) => SuppliableOccupancyAdded::TYPE_URL,
            Self::SuppliableRemoved(_) => SuppliableOccupancyRemoved::TYPE_URL,
            Self::CampaignableAdded(_) => CampaignableOccupancyAdded::TYPE_URL,
            Self::CampaignableRemoved(_) => CampaignableOccupancyRemoved::TYPE_URL,
            Self::JourneyAdded(_) => SmartBookingJourneyOccupancyAdded::TYPE_URL,
            Self::JourneyRemoved(_) => SmartBookingJourneyOccupancyRemoved::TYPE_URL,
        }
    }

    pub fn to_envelope(&self, sender: &str) -> Result<Envelope, DecodeError> {
        let now = OffsetDateTime::now_utc();
        match self {
            Self::EligibleAdded(e) => Envelope::wrap(sender, now, e),
            Self::EligibleRemoved(e) => Envelope::wrap(sender, now, e),
            Self::SuppliableAdded(e) => Envelope::wrap(sender, now, e),
            Self::SuppliableRemoved(e) => Envelope::wrap(sender, now, e),
            Self::CampaignableAdded(e) => Envelope::wrap(sender, now, e),
            Self::CampaignableRemoved(e) => Envelope::wrap(sender, now, e),
            Self::JourneyAdded(e) => Envelope::wrap(sender, now, e),
            Self::JourneyRemoved(e) => Envelope::wrap(sender, now, e),
        }
    }

    /// Inverse of [`DownstreamEvent::to_envelope`]; `None` for foreign payloads.
    pub fn from_envelope(envelope: &Envelope) -> Option<Result<Self, DecodeError>> {
        let inner = envelope.inner()?;
        let decoded = match inner.type_url.as_str() {
            EligibleOccupancyAdded::TYPE_URL => inner.unpack().map(Self::EligibleAdded),
            EligibleOccupancyRemoved::TYPE_URL => inner.unpack().map(Self::EligibleRemoved),
            SuppliableOccupancyAdded::TYPE_URL => inner.unpack().map(Self::SuppliableAdded),
            SuppliableOccupancyRemoved::TYPE_URL => inner.unpack().map(Self::SuppliableRemoved),
            CampaignableOccupancyAdded::TYPE_URL => inner.unpack().map(Self::CampaignableAdded),
            CampaignableOccupancyRemoved::TYPE_URL => inner.unpack().map(Self::CampaignableRemoved),
            SmartBookingJourneyOccupancyAdded::TYPE_URL => inner.unpack().map(Self::JourneyAdded),
            SmartBookingJourneyOccupancyRemoved::TYPE_URL => inner.unpack().map(Self::JourneyRemoved),
            _ => return None,
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::domain::IneligibilityReason;

    #[test]
    fn empty_reasons_produce_added_events() {
        let event = DownstreamEvent::for_outcome(EvaluationKind::Suppliability, "occ-1", "acc-1", &ReasonSet::new());
        assert_eq!(
            event,
            DownstreamEvent::SuppliableAdded(SuppliableOccupancyAdded {
                occupancy_id: "occ-1".to_string(),
                account_id: "acc-1".to_string(),
            })
        );
        assert_eq!(event.topic(), SUPPLIABLE_OCCUPANCY_TOPIC);
    }

    #[test]
    fn removed_events_list_reason_codes() {
        let reasons = ReasonSet::from([IneligibilityReason::NoWanCoverage, IneligibilityReason::AlreadySmart]);
        let event = DownstreamEvent::for_outcome(EvaluationKind::Eligibility, "occ-1", "acc-1", &reasons);
        let DownstreamEvent::EligibleRemoved(removed) = &event else {
            panic!("expected a removed event, got {event:?}");
        };
        assert_eq!(removed.reasons, vec!["NO_WAN_COVERAGE".to_string(), "ALREADY_SMART".to_string()]);
    }

    #[test]
    fn envelope_round_trip_preserves_the_variant() {
        let event = DownstreamEvent::JourneyAdded(SmartBookingJourneyOccupancyAdded {
            occupancy_id: "occ-1".to_string(),
            account_id: "acc-1".to_string(),
            booking_reference: "BR-42".to_string(),
        });
        let env = event.to_envelope("eligibility-service").unwrap();
        assert_eq!(env.payload.as_ref().unwrap().type_url, event.type_url());
        assert_eq!(DownstreamEvent::from_envelope(&env).unwrap().unwrap(), event);
    }
}
