//! Maps decoded upstream facts to the occupancies they affect.

use eligibility_client::db::{Store, StoreError, StoreResult};

use crate::evaluation::EntryPoint;

/// Reverse-index key naming whatever an upstream event touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeKey {
    Occupancy(String),
    Account(String),
    Mpxn(String),
    /// Resolved through the meter's Mpxn, uninstalled meters included.
    Meter(String),
    Site(String),
    Postcode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cascade {
    pub key: CascadeKey,
    pub entry: EntryPoint,
}

impl Cascade {
    pub fn full(key: CascadeKey) -> Self {
        Self {
            key,
            entry: EntryPoint::Full,
        }
    }

    pub fn eligibility(key: CascadeKey) -> Self {
        Self {
            key,
            entry: EntryPoint::Eligibility,
        }
    }

    pub fn suppliability(key: CascadeKey) -> Self {
        Self {
            key,
            entry: EntryPoint::Suppliability,
        }
    }
}

pub async fn resolve(store: &dyn Store, key: &CascadeKey) -> StoreResult<Vec<String>> {
    match key {
        CascadeKey::Occupancy(id) => Ok(vec![id.clone()]),
        CascadeKey::Account(account_id) => store.occupancy_ids_for_account(account_id).await,
        CascadeKey::Mpxn(mpxn) => store.occupancy_ids_for_mpxn(mpxn).await,
        CascadeKey::Meter(meter_id) => match store.get_meter_mpxn(meter_id).await {
            Ok(mpxn) => store.occupancy_ids_for_mpxn(&mpxn).await,
            Err(StoreError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        },
        CascadeKey::Site(site_id) => store.occupancy_ids_for_site(site_id).await,
        CascadeKey::Postcode(postcode) => store.occupancy_ids_for_postcode(postcode).await,
    }
}
