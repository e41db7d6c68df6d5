use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBookingOptOutAdded {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBookingOptOutRemoved {
    pub account_id: String,
}

typed_payload!(AccountBookingOptOutAdded, AccountBookingOptOutRemoved);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptOutEvent {
    Added(AccountBookingOptOutAdded),
    Removed(AccountBookingOptOutRemoved),
    Unhandled(String),
}

impl OptOutEvent {
    fn account_id(&self) -> Option<&str> {
        match self {
            Self::Added(e) => Some(&e.account_id),
            Self::Removed(e) => Some(&e.account_id),
            Self::Unhandled(_) => None,
        }
    }
}

pub struct OptOutTopic;

#[async_trait]
impl Topic for OptOutTopic {
    type Event = OptOutEvent;

    const NAME: &'static str = "opt-out";

    fn decode(payload: &AnyPayload) -> Result<OptOutEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<AccountBookingOptOutAdded>() => OptOutEvent::Added(p.unpack()?),
            p if p.is::<AccountBookingOptOutRemoved>() => OptOutEvent::Removed(p.unpack()?),
            p => OptOutEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &OptOutEvent) -> Option<&str> {
        match event {
            OptOutEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &OptOutEvent) -> StoreResult<()> {
        match event {
            OptOutEvent::Added(e) => store.set_opt_out(&e.account_id, true).await,
            OptOutEvent::Removed(e) => store.set_opt_out(&e.account_id, false).await,
            OptOutEvent::Unhandled(_) => Ok(()),
        }
    }

    // Opt-out feeds campaignability, which only the full run evaluates.
    fn cascade(event: &OptOutEvent) -> Option<Cascade> {
        event
            .account_id()
            .map(|account_id| Cascade::full(CascadeKey::Account(account_id.to_string())))
    }
}
