use async_trait::async_trait;
use eligibility_client::{
    db::{Store, StoreResult},
    domain::normalise_postcode,
};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanCoverageStarted {
    pub postcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanCoverageEnded {
    pub postcode: String,
}

typed_payload!(WanCoverageStarted, WanCoverageEnded);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WanCoverageEvent {
    Started(WanCoverageStarted),
    Ended(WanCoverageEnded),
    Unhandled(String),
}

impl WanCoverageEvent {
    fn postcode(&self) -> Option<String> {
        match self {
            Self::Started(e) => Some(normalise_postcode(&e.postcode)),
            Self::Ended(e) => Some(normalise_postcode(&e.postcode)),
            Self::Unhandled(_) => None,
        }
    }
}

pub struct WanCoverageTopic;

#[async_trait]
impl Topic for WanCoverageTopic {
    type Event = WanCoverageEvent;

    const NAME: &'static str = "wan-coverage";

    fn decode(payload: &AnyPayload) -> Result<WanCoverageEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<WanCoverageStarted>() => WanCoverageEvent::Started(p.unpack()?),
            p if p.is::<WanCoverageEnded>() => WanCoverageEvent::Ended(p.unpack()?),
            p => WanCoverageEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &WanCoverageEvent) -> Option<&str> {
        match event {
            WanCoverageEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &WanCoverageEvent) -> StoreResult<()> {
        let covered = matches!(event, WanCoverageEvent::Started(_));
        match event.postcode() {
            Some(postcode) => store.set_wan_coverage(&postcode, covered).await,
            None => Ok(()),
        }
    }

    fn cascade(event: &WanCoverageEvent) -> Option<Cascade> {
        event
            .postcode()
            .map(|postcode| Cascade::full(CascadeKey::Postcode(postcode)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::db::{MemoryStore, OccupancyStore, SiteStore};

    #[tokio::test]
    async fn coverage_is_keyed_by_normalised_postcode() {
        let store = MemoryStore::new();
        store.upsert_site("site-1", "AB1 2CD").await.unwrap();
        store.upsert_occupancy("occ-1", "acc-1", Some("site-1")).await.unwrap();

        let started = WanCoverageEvent::Started(WanCoverageStarted {
            postcode: "ab12cd".to_string(),
        });
        WanCoverageTopic::persist(&store, &started).await.unwrap();
        assert!(store.get_site("site-1").await.unwrap().wan_coverage);
        assert_eq!(
            WanCoverageTopic::cascade(&started),
            Some(Cascade::full(CascadeKey::Postcode("AB1 2CD".to_string())))
        );

        let ended = WanCoverageEvent::Ended(WanCoverageEnded {
            postcode: "AB1 2CD".to_string(),
        });
        WanCoverageTopic::persist(&store, &ended).await.unwrap();
        assert!(!store.get_site("site-1").await.unwrap().wan_coverage);
    }
}
