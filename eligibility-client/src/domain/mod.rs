pub mod account;
pub mod booking_reference;
pub mod evaluation;
pub mod meter;
pub mod meterpoint;
pub mod occupancy;
pub mod service;
pub mod site;

pub use account::Account;
pub use booking_reference::BookingReference;
pub use evaluation::{EvaluationKind, EvaluationResult, EvaluationResults, IneligibilityReason, ReasonSet};
pub use meter::Meter;
pub use meterpoint::Meterpoint;
pub use occupancy::{Occupancy, OccupancyRecord};
pub use service::{Service, SupplyType};
pub use site::{normalise_postcode, Site};
