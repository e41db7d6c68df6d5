use time::OffsetDateTime;

use super::{Account, EvaluationResults, Service, Site};

/// Row-level view of an occupancy as stored, before any joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyRecord {
    pub id: String,
    pub account_id: String,
    pub site_id: Option<String>,
    pub ended_at: Option<OffsetDateTime>,
}

/// Denormalised occupancy assembled for a single evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupancy {
    pub id: String,
    pub account: Account,
    pub site: Option<Site>,
    pub services: Vec<Service>,
    pub results: EvaluationResults,
}

impl Occupancy {
    pub fn live_services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|service| service.is_live)
    }

    pub fn live_service_count(&self) -> usize {
        self.live_services().count()
    }
}
