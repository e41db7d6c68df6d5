use std::sync::Arc;

use eligibility_client::{
    db::{Store, StoreError, StoreResult},
    domain::{Meter, Meterpoint, Occupancy},
};

use super::EvaluationError;

/// Assembles the denormalised [`Occupancy`] one evaluation pass works on.
///
/// Missing site, meter or meterpoint rows become explicit `None`s so the rules
/// can report them; any other store failure aborts the load.
#[derive(Clone)]
pub struct OccupancyLoader {
    store: Arc<dyn Store>,
}

impl OccupancyLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn load(&self, occupancy_id: &str) -> Result<Occupancy, EvaluationError> {
        let record = match self.store.get_occupancy(occupancy_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                return Err(EvaluationError::UnknownOccupancy(occupancy_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let account = self.store.get_account(&record.account_id).await?;

        let site = match &record.site_id {
            Some(site_id) => optional(self.store.get_site(site_id).await)?,
            None => None,
        };

        let mut services = self.store.live_services(occupancy_id).await?;
        for service in &mut services {
            service.meter = self.meter(&service.mpxn).await?;
            service.meterpoint = self.meterpoint(&service.mpxn).await?;
        }

        let results = self.store.get_results(occupancy_id, &account.id).await?;

        Ok(Occupancy {
            id: record.id,
            account,
            site,
            services,
            results,
        })
    }

    async fn meter(&self, mpxn: &str) -> StoreResult<Option<Meter>> {
        optional(self.store.get_meter_by_mpxn(mpxn).await)
    }

    async fn meterpoint(&self, mpxn: &str) -> StoreResult<Option<Meterpoint>> {
        optional(self.store.get_meterpoint(mpxn).await)
    }
}

fn optional<T>(res: StoreResult<T>) -> StoreResult<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}
