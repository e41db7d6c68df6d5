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
pub struct SiteDiscovered {
    pub site_id: String,
    pub postcode: String,
    /// Carried upstream but not used by any rule.
    #[serde(default)]
    pub address_lines: Vec<String>,
}

typed_payload!(SiteDiscovered);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteEvent {
    Discovered(SiteDiscovered),
    Unhandled(String),
}

pub struct SiteTopic;

#[async_trait]
impl Topic for SiteTopic {
    type Event = SiteEvent;

    const NAME: &'static str = "site";

    fn decode(payload: &AnyPayload) -> Result<SiteEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<SiteDiscovered>() => SiteEvent::Discovered(p.unpack()?),
            p => SiteEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &SiteEvent) -> Option<&str> {
        match event {
            SiteEvent::Unhandled(type_url) => Some(type_url),
            SiteEvent::Discovered(_) => None,
        }
    }

    async fn persist(store: &dyn Store, event: &SiteEvent) -> StoreResult<()> {
        match event {
            SiteEvent::Discovered(e) => {
                store
                    .upsert_site(&e.site_id, &normalise_postcode(&e.postcode))
                    .await
            }
            SiteEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &SiteEvent) -> Option<Cascade> {
        match event {
            SiteEvent::Discovered(e) => Some(Cascade::full(CascadeKey::Site(e.site_id.clone()))),
            SiteEvent::Unhandled(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::db::{MemoryStore, SiteStore};

    #[tokio::test]
    async fn discovered_site_stores_normalised_postcode() {
        let store = MemoryStore::new();
        let payload = AnyPayload {
            type_url: "type.googleapis.com/energy.smartbooking.v1.SiteDiscovered".to_string(),
            value: serde_json::json!({"site_id": "site-1", "postcode": "sw1a1aa"}),
        };

        let event = SiteTopic::decode(&payload).unwrap();
        SiteTopic::persist(&store, &event).await.unwrap();

        assert_eq!(store.get_site("site-1").await.unwrap().postcode, "SW1A 1AA");
        assert_eq!(
            SiteTopic::cascade(&event),
            Some(Cascade::full(CascadeKey::Site("site-1".to_string())))
        );
    }
}
