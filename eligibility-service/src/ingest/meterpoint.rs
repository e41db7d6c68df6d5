use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterpointProfileClassChanged {
    pub mpxn: String,
    pub profile_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterpointSscChanged {
    pub mpxn: String,
    pub ssc: String,
}

typed_payload!(MeterpointProfileClassChanged, MeterpointSscChanged);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterpointEvent {
    ProfileClassChanged(MeterpointProfileClassChanged),
    SscChanged(MeterpointSscChanged),
    Unhandled(String),
}

pub struct MeterpointTopic;

#[async_trait]
impl Topic for MeterpointTopic {
    type Event = MeterpointEvent;

    const NAME: &'static str = "meterpoint";

    fn decode(payload: &AnyPayload) -> Result<MeterpointEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<MeterpointProfileClassChanged>() => {
                MeterpointEvent::ProfileClassChanged(p.unpack()?)
            }
            p if p.is::<MeterpointSscChanged>() => MeterpointEvent::SscChanged(p.unpack()?),
            p => MeterpointEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &MeterpointEvent) -> Option<&str> {
        match event {
            MeterpointEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &MeterpointEvent) -> StoreResult<()> {
        match event {
            MeterpointEvent::ProfileClassChanged(e) => {
                store.set_profile_class(&e.mpxn, &e.profile_class).await
            }
            MeterpointEvent::SscChanged(e) => store.set_ssc(&e.mpxn, &e.ssc).await,
            MeterpointEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &MeterpointEvent) -> Option<Cascade> {
        let mpxn = match event {
            MeterpointEvent::ProfileClassChanged(e) => &e.mpxn,
            MeterpointEvent::SscChanged(e) => &e.mpxn,
            MeterpointEvent::Unhandled(_) => return None,
        };
        Some(Cascade::full(CascadeKey::Mpxn(mpxn.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::db::{MemoryStore, MeterpointStore};

    #[tokio::test]
    async fn profile_class_and_ssc_make_a_complex_tariff() {
        let store = MemoryStore::new();
        for payload in [
            AnyPayload::pack(&MeterpointProfileClassChanged {
                mpxn: "mpan-1".to_string(),
                profile_class: "02".to_string(),
            })
            .unwrap(),
            AnyPayload::pack(&MeterpointSscChanged {
                mpxn: "mpan-1".to_string(),
                ssc: "0003".to_string(),
            })
            .unwrap(),
        ] {
            let event = MeterpointTopic::decode(&payload).unwrap();
            MeterpointTopic::persist(&store, &event).await.unwrap();
            assert_eq!(
                MeterpointTopic::cascade(&event),
                Some(Cascade::full(CascadeKey::Mpxn("mpan-1".to_string())))
            );
        }

        assert!(store.get_meterpoint("mpan-1").await.unwrap().is_complex_tariff());
    }

    #[test]
    fn body_without_mpxn_is_malformed() {
        let payload = AnyPayload {
            type_url: "type.googleapis.com/energy.smartbooking.v1.MeterpointSscChanged".to_string(),
            value: serde_json::json!({"ssc": "0003"}),
        };
        assert!(MeterpointTopic::decode(&payload).is_err());
    }
}
