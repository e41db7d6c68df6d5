use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStarted {
    pub occupancy_id: String,
    pub account_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySiteCorrected {
    pub occupancy_id: String,
    pub site_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyEnded {
    pub occupancy_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub ended_at: OffsetDateTime,
}

typed_payload!(OccupancyStarted, OccupancySiteCorrected, OccupancyEnded);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancyEvent {
    Started(OccupancyStarted),
    SiteCorrected(OccupancySiteCorrected),
    Ended(OccupancyEnded),
    Unhandled(String),
}

pub struct OccupancyTopic;

#[async_trait]
impl Topic for OccupancyTopic {
    type Event = OccupancyEvent;

    const NAME: &'static str = "occupancy";

    fn decode(payload: &AnyPayload) -> Result<OccupancyEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<OccupancyStarted>() => OccupancyEvent::Started(p.unpack()?),
            p if p.is::<OccupancySiteCorrected>() => OccupancyEvent::SiteCorrected(p.unpack()?),
            p if p.is::<OccupancyEnded>() => OccupancyEvent::Ended(p.unpack()?),
            p => OccupancyEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &OccupancyEvent) -> Option<&str> {
        match event {
            OccupancyEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    /// A started occupancy also creates its account row, so the account is
    /// never missing once the occupancy is known.
    async fn persist(store: &dyn Store, event: &OccupancyEvent) -> StoreResult<()> {
        match event {
            OccupancyEvent::Started(e) => {
                store
                    .upsert_occupancy(&e.occupancy_id, &e.account_id, e.site_id.as_deref())
                    .await
            }
            OccupancyEvent::SiteCorrected(e) => {
                store.set_occupancy_site(&e.occupancy_id, &e.site_id).await
            }
            OccupancyEvent::Ended(e) => store.end_occupancy(&e.occupancy_id, e.ended_at).await,
            OccupancyEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &OccupancyEvent) -> Option<Cascade> {
        let occupancy_id = match event {
            OccupancyEvent::Started(e) => &e.occupancy_id,
            OccupancyEvent::SiteCorrected(e) => &e.occupancy_id,
            OccupancyEvent::Ended(e) => &e.occupancy_id,
            OccupancyEvent::Unhandled(_) => return None,
        };
        Some(Cascade::full(CascadeKey::Occupancy(occupancy_id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::db::{AccountStore, MemoryStore, OccupancyStore, StoreError};
    use time::macros::datetime;

    #[tokio::test]
    async fn started_occupancy_creates_account_and_can_be_corrected() {
        let store = MemoryStore::new();
        let payload = AnyPayload {
            type_url: "type.googleapis.com/energy.smartbooking.v1.OccupancyStarted".to_string(),
            value: serde_json::json!({"occupancy_id": "occ-1", "account_id": "acc-1"}),
        };
        let started = OccupancyTopic::decode(&payload).unwrap();
        OccupancyTopic::persist(&store, &started).await.unwrap();

        assert!(store.get_account("acc-1").await.is_ok());
        assert_eq!(store.get_occupancy("occ-1").await.unwrap().site_id, None);

        let corrected = OccupancyEvent::SiteCorrected(OccupancySiteCorrected {
            occupancy_id: "occ-1".to_string(),
            site_id: "site-7".to_string(),
        });
        OccupancyTopic::persist(&store, &corrected).await.unwrap();
        assert_eq!(
            store.get_occupancy("occ-1").await.unwrap().site_id.as_deref(),
            Some("site-7")
        );
        assert_eq!(
            OccupancyTopic::cascade(&corrected),
            Some(Cascade::full(CascadeKey::Occupancy("occ-1".to_string())))
        );
    }

    #[tokio::test]
    async fn ended_occupancy_leaves_the_live_set() {
        let store = MemoryStore::new();
        store.upsert_occupancy("occ-1", "acc-1", None).await.unwrap();

        let ended = OccupancyEvent::Ended(OccupancyEnded {
            occupancy_id: "occ-1".to_string(),
            ended_at: datetime!(2024-06-30 23:59:59 UTC),
        });
        OccupancyTopic::persist(&store, &ended).await.unwrap();

        assert!(store.live_occupancy_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn correcting_unknown_occupancy_is_not_found() {
        let store = MemoryStore::new();
        let corrected = OccupancyEvent::SiteCorrected(OccupancySiteCorrected {
            occupancy_id: "occ-404".to_string(),
            site_id: "site-1".to_string(),
        });
        assert!(matches!(
            OccupancyTopic::persist(&store, &corrected).await,
            Err(StoreError::NotFound)
        ));
    }
}
