use std::collections::HashMap;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use super::{
    AccountStore, BookingReferenceStore, EvaluationStore, MeterStore, MeterpointStore, OccupancyStore,
    ServiceStore, SiteStore, StoreError, StoreResult,
};
use crate::domain::{
    Account, BookingReference, EvaluationKind, EvaluationResult, EvaluationResults, Meter, Meterpoint,
    OccupancyRecord, ReasonSet, Service, Site,
};

#[derive(Debug, Clone)]
struct StoredMeter {
    meter: Meter,
    deleted_at: Option<OffsetDateTime>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct StoredService {
    service: Service,
    cancelled: bool,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    sites: HashMap<String, String>,
    wan_coverage: HashMap<String, bool>,
    meters: HashMap<String, StoredMeter>,
    meterpoints: HashMap<String, Meterpoint>,
    services: HashMap<String, StoredService>,
    occupancies: HashMap<String, OccupancyRecord>,
    booking_references: HashMap<String, BookingReference>,
    results: HashMap<(String, String), EvaluationResults>,
    seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn account_mut(&mut self, account_id: &str) -> &mut Account {
        self.accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id))
    }

    fn meter_mut(&mut self, meter_id: &str) -> StoreResult<&mut StoredMeter> {
        self.meters.get_mut(meter_id).ok_or(StoreError::NotFound)
    }

    fn sorted_ids<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
        let mut ids: Vec<String> = ids.cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// In-process store with the same observable semantics as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    today: Option<Date>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the date used to decide whether an ended service is still live.
    pub fn with_today(today: Date) -> Self {
        Self {
            state: Mutex::default(),
            today: Some(today),
        }
    }

    fn today(&self) -> Date {
        self.today
            .unwrap_or_else(|| OffsetDateTime::now_utc().date())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ensure_account(&self, account_id: &str) -> StoreResult<()> {
        self.state.lock().await.account_mut(account_id);
        Ok(())
    }

    async fn set_opt_out(&self, account_id: &str, opt_out: bool) -> StoreResult<()> {
        self.state.lock().await.account_mut(account_id).opt_out = opt_out;
        Ok(())
    }

    async fn set_psr_codes(&self, account_id: &str, codes: &[String]) -> StoreResult<()> {
        self.state.lock().await.account_mut(account_id).psr_codes = codes.to_vec();
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> StoreResult<Account> {
        self.state
            .lock()
            .await
            .accounts
            .get(account_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn upsert_site(&self, site_id: &str, postcode: &str) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .sites
            .insert(site_id.to_string(), postcode.to_string());
        Ok(())
    }

    async fn set_wan_coverage(&self, postcode: &str, covered: bool) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .wan_coverage
            .insert(postcode.to_string(), covered);
        Ok(())
    }

    async fn get_site(&self, site_id: &str) -> StoreResult<Site> {
        let state = self.state.lock().await;
        let postcode = state.sites.get(site_id).ok_or(StoreError::NotFound)?;
        Ok(Site {
            id: site_id.to_string(),
            postcode: postcode.clone(),
            wan_coverage: state.wan_coverage.get(postcode).copied().unwrap_or(false),
        })
    }
}

#[async_trait]
impl MeterStore for MemoryStore {
    async fn upsert_meter(&self, meter: &Meter) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq();
        let stored = state
            .meters
            .entry(meter.id.clone())
            .or_insert_with(|| StoredMeter {
                meter: meter.clone(),
                deleted_at: None,
                seq,
            });

        let previous = stored.meter.clone();
        stored.meter = Meter {
            capacity: meter.capacity.or(previous.capacity),
            installed_at: meter.installed_at.or(previous.installed_at),
            ..meter.clone()
        };
        if meter.installed_at.is_some() {
            stored.deleted_at = None;
        }
        stored.seq = seq;
        Ok(())
    }

    async fn mark_uninstalled(&self, meter_id: &str, uninstalled_at: OffsetDateTime) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let stored = state.meter_mut(meter_id)?;
        stored.deleted_at.get_or_insert(uninstalled_at);
        Ok(())
    }

    async fn reverse_uninstall(&self, meter_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.meter_mut(meter_id)?.deleted_at = None;
        Ok(())
    }

    async fn set_meter_type(&self, meter_id: &str, meter_type: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.meter_mut(meter_id)?.meter.meter_type = meter_type.to_string();
        Ok(())
    }

    async fn set_capacity(&self, meter_id: &str, capacity: f64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.meter_mut(meter_id)?.meter.capacity = Some(capacity);
        Ok(())
    }

    async fn get_meter_by_mpxn(&self, mpxn: &str) -> StoreResult<Meter> {
        let state = self.state.lock().await;
        state
            .meters
            .values()
            .filter(|stored| stored.meter.mpxn == mpxn && stored.deleted_at.is_none())
            .max_by_key(|stored| (stored.meter.installed_at, stored.seq))
            .map(|stored| stored.meter.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_meter_mpxn(&self, meter_id: &str) -> StoreResult<String> {
        let state = self.state.lock().await;
        state
            .meters
            .get(meter_id)
            .map(|stored| stored.meter.mpxn.clone())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl MeterpointStore for MemoryStore {
    async fn set_alt_han(&self, mpxn: &str, alt_han: bool) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        meterpoint_mut(&mut state, mpxn).alt_han = alt_han;
        Ok(())
    }

    async fn set_profile_class(&self, mpxn: &str, profile_class: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        meterpoint_mut(&mut state, mpxn).profile_class = Some(profile_class.to_string());
        Ok(())
    }

    async fn set_ssc(&self, mpxn: &str, ssc: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        meterpoint_mut(&mut state, mpxn).ssc = Some(ssc.to_string());
        Ok(())
    }

    async fn get_meterpoint(&self, mpxn: &str) -> StoreResult<Meterpoint> {
        self.state
            .lock()
            .await
            .meterpoints
            .get(mpxn)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

fn meterpoint_mut<'a>(state: &'a mut State, mpxn: &str) -> &'a mut Meterpoint {
    state
        .meterpoints
        .entry(mpxn.to_string())
        .or_insert_with(|| Meterpoint {
            mpxn: mpxn.to_string(),
            ..Meterpoint::default()
        })
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn upsert_service(&self, service: &Service) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = Service {
            is_live: true,
            meter: None,
            meterpoint: None,
            ..service.clone()
        };
        match state.services.get_mut(&service.id) {
            Some(stored) => {
                stored.service = Service {
                    end_date: stored.service.end_date,
                    ..record
                };
            }
            None => {
                state.services.insert(
                    service.id.clone(),
                    StoredService {
                        service: Service {
                            end_date: None,
                            ..record
                        },
                        cancelled: false,
                    },
                );
            }
        }
        Ok(())
    }

    async fn end_service(&self, service_id: &str, end_date: Date) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let stored = state.services.get_mut(service_id).ok_or(StoreError::NotFound)?;
        stored.service.end_date = Some(end_date);
        Ok(())
    }

    async fn cancel_service(&self, service_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let stored = state.services.get_mut(service_id).ok_or(StoreError::NotFound)?;
        stored.cancelled = true;
        Ok(())
    }

    async fn live_services(&self, occupancy_id: &str) -> StoreResult<Vec<Service>> {
        let today = self.today();
        let state = self.state.lock().await;
        let mut services: Vec<Service> = state
            .services
            .values()
            .filter(|stored| stored.service.occupancy_id == occupancy_id && !stored.cancelled)
            .filter(|stored| stored.service.end_date.map_or(true, |end| end > today))
            .map(|stored| stored.service.clone())
            .collect();
        services.sort_by(|a, b| {
            (a.start_date.is_none(), a.start_date, &a.id).cmp(&(b.start_date.is_none(), b.start_date, &b.id))
        });
        Ok(services)
    }
}

#[async_trait]
impl OccupancyStore for MemoryStore {
    async fn upsert_occupancy(
        &self,
        occupancy_id: &str,
        account_id: &str,
        site_id: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.account_mut(account_id);
        let record = state
            .occupancies
            .entry(occupancy_id.to_string())
            .or_insert_with(|| OccupancyRecord {
                id: occupancy_id.to_string(),
                account_id: account_id.to_string(),
                site_id: None,
                ended_at: None,
            });
        record.account_id = account_id.to_string();
        if let Some(site_id) = site_id {
            record.site_id = Some(site_id.to_string());
        }
        Ok(())
    }

    async fn set_occupancy_site(&self, occupancy_id: &str, site_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state.occupancies.get_mut(occupancy_id).ok_or(StoreError::NotFound)?;
        record.site_id = Some(site_id.to_string());
        Ok(())
    }

    async fn end_occupancy(&self, occupancy_id: &str, ended_at: OffsetDateTime) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state.occupancies.get_mut(occupancy_id).ok_or(StoreError::NotFound)?;
        record.ended_at = Some(ended_at);
        Ok(())
    }

    async fn get_occupancy(&self, occupancy_id: &str) -> StoreResult<OccupancyRecord> {
        self.state
            .lock()
            .await
            .occupancies
            .get(occupancy_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn occupancy_ids_for_account(&self, account_id: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .occupancies
                .values()
                .filter(|o| o.account_id == account_id)
                .map(|o| &o.id),
        ))
    }

    async fn occupancy_ids_for_mpxn(&self, mpxn: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .services
                .values()
                .filter(|stored| stored.service.mpxn == mpxn)
                .map(|stored| &stored.service.occupancy_id),
        ))
    }

    async fn occupancy_ids_for_site(&self, site_id: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .occupancies
                .values()
                .filter(|o| o.site_id.as_deref() == Some(site_id))
                .map(|o| &o.id),
        ))
    }

    async fn occupancy_ids_for_postcode(&self, postcode: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .occupancies
                .values()
                .filter(|o| {
                    o.site_id
                        .as_ref()
                        .and_then(|site_id| state.sites.get(site_id))
                        .is_some_and(|pc| pc == postcode)
                })
                .map(|o| &o.id),
        ))
    }

    async fn pending_evaluation_ids(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .occupancies
                .values()
                .filter(|o| o.ended_at.is_none())
                .filter(|o| {
                    let key = (o.id.clone(), o.account_id.clone());
                    state.results.get(&key).map_or(true, |results| {
                        EvaluationKind::ALL.iter().any(|kind| !results.get(*kind).evaluated)
                    })
                })
                .map(|o| &o.id),
        ))
    }

    async fn live_occupancy_ids(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(State::sorted_ids(
            state
                .occupancies
                .values()
                .filter(|o| o.ended_at.is_none())
                .map(|o| &o.id),
        ))
    }
}

#[async_trait]
impl BookingReferenceStore for MemoryStore {
    async fn upsert_booking_reference(&self, mpxn: &str, reference: &str) -> StoreResult<()> {
        self.state.lock().await.booking_references.insert(
            mpxn.to_string(),
            BookingReference {
                mpxn: mpxn.to_string(),
                reference: reference.to_string(),
                deleted: false,
            },
        );
        Ok(())
    }

    async fn remove_booking_reference(&self, mpxn: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let reference = state.booking_references.get_mut(mpxn).ok_or(StoreError::NotFound)?;
        reference.deleted = true;
        Ok(())
    }

    async fn get_booking_reference(&self, mpxn: &str) -> StoreResult<BookingReference> {
        self.state
            .lock()
            .await
            .booking_references
            .get(mpxn)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn get_results(&self, occupancy_id: &str, account_id: &str) -> StoreResult<EvaluationResults> {
        let state = self.state.lock().await;
        Ok(state
            .results
            .get(&(occupancy_id.to_string(), account_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save_result(
        &self,
        occupancy_id: &str,
        account_id: &str,
        kind: EvaluationKind,
        reasons: &ReasonSet,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let results = state
            .results
            .entry((occupancy_id.to_string(), account_id.to_string()))
            .or_default();
        *results.get_mut(kind) = EvaluationResult::evaluated(reasons.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IneligibilityReason, SupplyType};
    use time::macros::{date, datetime};

    fn gas_meter(id: &str, mpxn: &str) -> Meter {
        Meter {
            id: id.to_string(),
            mpxn: mpxn.to_string(),
            serial_number: format!("SER-{id}"),
            supply_type: SupplyType::Gas,
            capacity: Some(6.0),
            meter_type: "GAS_CREDIT".to_string(),
            installed_at: Some(datetime!(2023-05-01 09:00:00 UTC)),
        }
    }

    fn service(id: &str, occupancy_id: &str, mpxn: &str) -> Service {
        Service {
            id: id.to_string(),
            occupancy_id: occupancy_id.to_string(),
            mpxn: mpxn.to_string(),
            supply_type: SupplyType::Electricity,
            is_live: true,
            start_date: Some(date!(2024 - 01 - 01)),
            end_date: None,
            meter: None,
            meterpoint: None,
        }
    }

    #[tokio::test]
    async fn uninstalled_meter_is_hidden_until_the_uninstall_is_reversed() {
        let store = MemoryStore::new();
        store.upsert_meter(&gas_meter("m-1", "mprn-1")).await.unwrap();

        store
            .mark_uninstalled("m-1", datetime!(2024-02-01 00:00:00 UTC))
            .await
            .unwrap();
        assert!(store.get_meter_by_mpxn("mprn-1").await.unwrap_err().is_not_found());
        assert_eq!(store.get_meter_mpxn("m-1").await.unwrap(), "mprn-1");

        store.reverse_uninstall("m-1").await.unwrap();
        let meter = store.get_meter_by_mpxn("mprn-1").await.unwrap();
        assert_eq!(meter.installed_at, Some(datetime!(2023-05-01 09:00:00 UTC)));
    }

    #[tokio::test]
    async fn updating_an_unknown_meter_reports_not_found() {
        let store = MemoryStore::new();
        let err = store.set_capacity("ghost", 6.0).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn ended_and_cancelled_services_are_not_live() {
        let store = MemoryStore::with_today(date!(2024 - 06 - 01));
        for id in ["s-1", "s-2", "s-3", "s-4"] {
            store.upsert_service(&service(id, "occ-1", id)).await.unwrap();
        }
        store.end_service("s-2", date!(2024 - 05 - 01)).await.unwrap();
        store.end_service("s-3", date!(2024 - 07 - 01)).await.unwrap();
        store.cancel_service("s-4").await.unwrap();

        let live: Vec<String> = store
            .live_services("occ-1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(live, vec!["s-1".to_string(), "s-3".to_string()]);
    }

    #[tokio::test]
    async fn site_coverage_is_joined_by_postcode() {
        let store = MemoryStore::new();
        store.upsert_site("site-1", "AB1 2CD").await.unwrap();
        assert!(!store.get_site("site-1").await.unwrap().wan_coverage);

        store.set_wan_coverage("AB1 2CD", true).await.unwrap();
        assert!(store.get_site("site-1").await.unwrap().wan_coverage);
    }

    #[tokio::test]
    async fn pending_evaluation_excludes_fully_evaluated_and_ended_occupancies() {
        let store = MemoryStore::new();
        for id in ["occ-1", "occ-2", "occ-3"] {
            store.upsert_occupancy(id, "acc-1", None).await.unwrap();
        }
        for kind in EvaluationKind::ALL {
            store
                .save_result("occ-1", "acc-1", kind, &ReasonSet::new())
                .await
                .unwrap();
        }
        store
            .save_result(
                "occ-2",
                "acc-1",
                EvaluationKind::Eligibility,
                &ReasonSet::from([IneligibilityReason::AlreadySmart]),
            )
            .await
            .unwrap();
        store
            .end_occupancy("occ-3", datetime!(2024-01-01 00:00:00 UTC))
            .await
            .unwrap();

        assert_eq!(store.pending_evaluation_ids().await.unwrap(), vec!["occ-2".to_string()]);
        assert_eq!(
            store.live_occupancy_ids().await.unwrap(),
            vec!["occ-1".to_string(), "occ-2".to_string()]
        );
    }

    #[tokio::test]
    async fn removed_booking_reference_is_kept_as_deleted() {
        let store = MemoryStore::new();
        store.upsert_booking_reference("mpan-1", "REF-1").await.unwrap();
        store.remove_booking_reference("mpan-1").await.unwrap();

        let reference = store.get_booking_reference("mpan-1").await.unwrap();
        assert!(reference.deleted);
        assert!(!reference.is_usable());
    }
}
