use async_trait::async_trait;
use eligibility_client::db::{Store, StoreResult};
use serde::{Deserialize, Serialize};

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReferenceCreated {
    pub mpxn: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReferenceRemoved {
    pub mpxn: String,
}

typed_payload!(BookingReferenceCreated, BookingReferenceRemoved);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingReferenceEvent {
    Created(BookingReferenceCreated),
    Removed(BookingReferenceRemoved),
    Unhandled(String),
}

pub struct BookingReferenceTopic;

#[async_trait]
impl Topic for BookingReferenceTopic {
    type Event = BookingReferenceEvent;

    const NAME: &'static str = "booking-reference";

    fn decode(payload: &AnyPayload) -> Result<BookingReferenceEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<BookingReferenceCreated>() => BookingReferenceEvent::Created(p.unpack()?),
            p if p.is::<BookingReferenceRemoved>() => BookingReferenceEvent::Removed(p.unpack()?),
            p => BookingReferenceEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &BookingReferenceEvent) -> Option<&str> {
        match event {
            BookingReferenceEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    /// Removal is a soft delete; removing an unknown reference is not found.
    async fn persist(store: &dyn Store, event: &BookingReferenceEvent) -> StoreResult<()> {
        match event {
            BookingReferenceEvent::Created(e) => {
                store.upsert_booking_reference(&e.mpxn, &e.reference).await
            }
            BookingReferenceEvent::Removed(e) => store.remove_booking_reference(&e.mpxn).await,
            BookingReferenceEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &BookingReferenceEvent) -> Option<Cascade> {
        let mpxn = match event {
            BookingReferenceEvent::Created(e) => &e.mpxn,
            BookingReferenceEvent::Removed(e) => &e.mpxn,
            BookingReferenceEvent::Unhandled(_) => return None,
        };
        Some(Cascade::full(CascadeKey::Mpxn(mpxn.clone())))
    }
}
