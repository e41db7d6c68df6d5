//! Entity stores.
//!
//! Every store is a plain upsert/get surface with no business rules. `PgStore`
//! is the production implementation; `MemoryStore` backs tests and local runs.

pub mod account_queries;
pub mod booking_reference_queries;
pub mod evaluation_queries;
pub mod memory;
pub mod meter_queries;
pub mod meterpoint_queries;
pub mod occupancy_queries;
pub mod service_queries;
pub mod site_queries;

use async_trait::async_trait;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use crate::domain::{
    Account, BookingReference, EvaluationKind, EvaluationResults, Meter, Meterpoint, OccupancyRecord,
    ReasonSet, Service, Site,
};

pub use memory::MemoryStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The requested row does not exist. Callers may pick a default instead of failing.
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the account row with defaults if it does not exist yet.
    async fn ensure_account(&self, account_id: &str) -> StoreResult<()>;
    async fn set_opt_out(&self, account_id: &str, opt_out: bool) -> StoreResult<()>;
    async fn set_psr_codes(&self, account_id: &str, codes: &[String]) -> StoreResult<()>;
    async fn get_account(&self, account_id: &str) -> StoreResult<Account>;
}

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn upsert_site(&self, site_id: &str, postcode: &str) -> StoreResult<()>;
    async fn set_wan_coverage(&self, postcode: &str, covered: bool) -> StoreResult<()>;
    async fn get_site(&self, site_id: &str) -> StoreResult<Site>;
}

#[async_trait]
pub trait MeterStore: Send + Sync {
    /// Inserts or refreshes a meter. A meter carrying `installed_at` is (re)installed,
    /// which also clears any earlier uninstall.
    async fn upsert_meter(&self, meter: &Meter) -> StoreResult<()>;
    async fn mark_uninstalled(&self, meter_id: &str, uninstalled_at: OffsetDateTime) -> StoreResult<()>;
    /// Reverses an uninstall without touching install data.
    async fn reverse_uninstall(&self, meter_id: &str) -> StoreResult<()>;
    async fn set_meter_type(&self, meter_id: &str, meter_type: &str) -> StoreResult<()>;
    async fn set_capacity(&self, meter_id: &str, capacity: f64) -> StoreResult<()>;
    /// Latest installed meter on the meterpoint; uninstalled meters are excluded.
    async fn get_meter_by_mpxn(&self, mpxn: &str) -> StoreResult<Meter>;
    /// Mpxn of a meter, including uninstalled ones.
    async fn get_meter_mpxn(&self, meter_id: &str) -> StoreResult<String>;
}

#[async_trait]
pub trait MeterpointStore: Send + Sync {
    async fn set_alt_han(&self, mpxn: &str, alt_han: bool) -> StoreResult<()>;
    async fn set_profile_class(&self, mpxn: &str, profile_class: &str) -> StoreResult<()>;
    async fn set_ssc(&self, mpxn: &str, ssc: &str) -> StoreResult<()>;
    async fn get_meterpoint(&self, mpxn: &str) -> StoreResult<Meterpoint>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Records a started service. Only identity and start fields are taken from `service`.
    async fn upsert_service(&self, service: &Service) -> StoreResult<()>;
    async fn end_service(&self, service_id: &str, end_date: Date) -> StoreResult<()>;
    async fn cancel_service(&self, service_id: &str) -> StoreResult<()>;
    /// Live services with `meter` and `meterpoint` left unresolved.
    async fn live_services(&self, occupancy_id: &str) -> StoreResult<Vec<Service>>;
}

#[async_trait]
pub trait OccupancyStore: Send + Sync {
    async fn upsert_occupancy(
        &self,
        occupancy_id: &str,
        account_id: &str,
        site_id: Option<&str>,
    ) -> StoreResult<()>;
    async fn set_occupancy_site(&self, occupancy_id: &str, site_id: &str) -> StoreResult<()>;
    async fn end_occupancy(&self, occupancy_id: &str, ended_at: OffsetDateTime) -> StoreResult<()>;
    async fn get_occupancy(&self, occupancy_id: &str) -> StoreResult<OccupancyRecord>;
    async fn occupancy_ids_for_account(&self, account_id: &str) -> StoreResult<Vec<String>>;
    async fn occupancy_ids_for_mpxn(&self, mpxn: &str) -> StoreResult<Vec<String>>;
    async fn occupancy_ids_for_site(&self, site_id: &str) -> StoreResult<Vec<String>>;
    async fn occupancy_ids_for_postcode(&self, postcode: &str) -> StoreResult<Vec<String>>;
    /// Live occupancies with at least one dimension never evaluated.
    async fn pending_evaluation_ids(&self) -> StoreResult<Vec<String>>;
    async fn live_occupancy_ids(&self) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait BookingReferenceStore: Send + Sync {
    async fn upsert_booking_reference(&self, mpxn: &str, reference: &str) -> StoreResult<()>;
    async fn remove_booking_reference(&self, mpxn: &str) -> StoreResult<()>;
    /// Returns soft-deleted references too, flagged as deleted.
    async fn get_booking_reference(&self, mpxn: &str) -> StoreResult<BookingReference>;
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Missing rows come back as "never evaluated".
    async fn get_results(&self, occupancy_id: &str, account_id: &str) -> StoreResult<EvaluationResults>;
    async fn save_result(
        &self,
        occupancy_id: &str,
        account_id: &str,
        kind: EvaluationKind,
        reasons: &ReasonSet,
    ) -> StoreResult<()>;
}

/// Everything the evaluation engine reads and writes.
pub trait Store:
    AccountStore
    + SiteStore
    + MeterStore
    + MeterpointStore
    + ServiceStore
    + OccupancyStore
    + BookingReferenceStore
    + EvaluationStore
{
}

impl<T> Store for T where
    T: AccountStore
        + SiteStore
        + MeterStore
        + MeterpointStore
        + ServiceStore
        + OccupancyStore
        + BookingReferenceStore
        + EvaluationStore
{
}

/// Postgres-backed implementation of every store trait.
///
/// Schema is expected to be applied out-of-band via `sql/schema/*.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps "zero rows touched" on an UPDATE to the not-found sentinel.
pub(crate) fn expect_row(rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}
