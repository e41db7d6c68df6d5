use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPsrCodesChanged {
    pub account_id: String,
    #[serde(default)]
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPsrCodesRemoved {
    pub account_id: String,
}

typed_payload!(AccountPsrCodesChanged, AccountPsrCodesRemoved);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsrEvent {
    Changed(AccountPsrCodesChanged),
    Removed(AccountPsrCodesRemoved),
    Unhandled(String),
}

pub struct PsrTopic;

#[async_trait]
impl Topic for PsrTopic {
    type Event = PsrEvent;

    const NAME: &'static str = "psr";

    fn decode(payload: &AnyPayload) -> Result<PsrEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<AccountPsrCodesChanged>() => PsrEvent::Changed(p.unpack()?),
            p if p.is::<AccountPsrCodesRemoved>() => PsrEvent::Removed(p.unpack()?),
            p => PsrEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &PsrEvent) -> Option<&str> {
        match event {
            PsrEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &PsrEvent) -> StoreResult<()> {
        match event {
            PsrEvent::Changed(e) => store.set_psr_codes(&e.account_id, &e.codes).await,
            PsrEvent::Removed(e) => store.set_psr_codes(&e.account_id, &[]).await,
            PsrEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &PsrEvent) -> Option<Cascade> {
        let account_id = match event {
            PsrEvent::Changed(e) => &e.account_id,
            PsrEvent::Removed(e) => &e.account_id,
            PsrEvent::Unhandled(_) => return None,
        };
        Some(Cascade::eligibility(CascadeKey::Account(account_id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::TypedPayload;
    use eligibility_client::db::{AccountStore, MemoryStore};

    #[tokio::test]
    async fn codes_are_replaced_then_cleared() {
        let store = MemoryStore::new();
        let changed = PsrTopic::decode(
            &AnyPayload::pack(&AccountPsrCodesChanged {
                account_id: "acc-1".to_string(),
                codes: vec!["10".to_string(), "22".to_string()],
            })
            .unwrap(),
        )
        .unwrap();

        PsrTopic::persist(&store, &changed).await.unwrap();
        assert!(store.get_account("acc-1").await.unwrap().has_psr_vulnerability());

        let removed = PsrEvent::Removed(AccountPsrCodesRemoved {
            account_id: "acc-1".to_string(),
        });
        PsrTopic::persist(&store, &removed).await.unwrap();
        assert!(store.get_account("acc-1").await.unwrap().psr_codes.is_empty());
        assert_eq!(
            PsrTopic::cascade(&removed),
            Some(Cascade::eligibility(CascadeKey::Account("acc-1".to_string())))
        );
    }

    #[test]
    fn missing_codes_default_to_empty() {
        let payload = AnyPayload {
            type_url: AccountPsrCodesChanged::TYPE_URL.to_string(),
            value: serde_json::json!({"account_id": "acc-1"}),
        };
        match PsrTopic::decode(&payload).unwrap() {
            PsrEvent::Changed(e) => assert!(e.codes.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
