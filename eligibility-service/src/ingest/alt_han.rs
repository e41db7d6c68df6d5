use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltHanMeterpointDiscovered {
    pub mpxn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltHanMeterpointRemoved {
    pub mpxn: String,
}

typed_payload!(AltHanMeterpointDiscovered, AltHanMeterpointRemoved);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltHanEvent {
    Discovered(AltHanMeterpointDiscovered),
    Removed(AltHanMeterpointRemoved),
    Unhandled(String),
}

pub struct AltHanTopic;

#[async_trait]
impl Topic for AltHanTopic {
    type Event = AltHanEvent;

    const NAME: &'static str = "alt-han";

    fn decode(payload: &AnyPayload) -> Result<AltHanEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<AltHanMeterpointDiscovered>() => AltHanEvent::Discovered(p.unpack()?),
            p if p.is::<AltHanMeterpointRemoved>() => AltHanEvent::Removed(p.unpack()?),
            p => AltHanEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &AltHanEvent) -> Option<&str> {
        match event {
            AltHanEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &AltHanEvent) -> StoreResult<()> {
        match event {
            AltHanEvent::Discovered(e) => store.set_alt_han(&e.mpxn, true).await,
            AltHanEvent::Removed(e) => store.set_alt_han(&e.mpxn, false).await,
            AltHanEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &AltHanEvent) -> Option<Cascade> {
        let mpxn = match event {
            AltHanEvent::Discovered(e) => &e.mpxn,
            AltHanEvent::Removed(e) => &e.mpxn,
            AltHanEvent::Unhandled(_) => return None,
        };
        Some(Cascade::full(CascadeKey::Mpxn(mpxn.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::db::{MemoryStore, MeterpointStore};

    #[tokio::test]
    async fn flag_follows_discovered_then_removed() {
        let store = MemoryStore::new();
        let discovered = AnyPayload::pack(&AltHanMeterpointDiscovered {
            mpxn: "mpan-1".to_string(),
        })
        .unwrap();

        let event = AltHanTopic::decode(&discovered).unwrap();
        AltHanTopic::persist(&store, &event).await.unwrap();
        assert!(store.get_meterpoint("mpan-1").await.unwrap().alt_han);
        assert_eq!(
            AltHanTopic::cascade(&event),
            Some(Cascade::full(CascadeKey::Mpxn("mpan-1".to_string())))
        );

        let removed = AltHanEvent::Removed(AltHanMeterpointRemoved {
            mpxn: "mpan-1".to_string(),
        });
        AltHanTopic::persist(&store, &removed).await.unwrap();
        assert!(!store.get_meterpoint("mpan-1").await.unwrap().alt_han);
    }

    #[test]
    fn unknown_type_is_unhandled() {
        let payload = AnyPayload {
            type_url: "type.googleapis.com/energy.smartbooking.v1.AltHanAudited".to_string(),
            value: serde_json::json!({}),
        };
        let event = AltHanTopic::decode(&payload).unwrap();
        assert!(AltHanTopic::unhandled_type(&event).is_some());
        assert_eq!(AltHanTopic::cascade(&event), None);
    }
}
