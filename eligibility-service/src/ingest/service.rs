use async_trait::async_trait;
use eligibility_client::{
    db::{Store, StoreResult},
    domain::{Service, SupplyType},
};
use serde::{Deserialize, Serialize};
use time::Date;

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStarted {
    pub service_id: String,
    pub occupancy_id: String,
    pub mpxn: String,
    #[serde(default)]
    pub start_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEnded {
    pub service_id: String,
    pub occupancy_id: String,
    pub end_date: Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCancelled {
    pub service_id: String,
    pub occupancy_id: String,
}

// Electricity and gas variants share a body; the type URL carries the supply.
macro_rules! service_events {
    ($($name:ident => $body:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub $body);

            typed_payload!($name);
        )+
    };
}

service_events!(
    ElectricityServiceStarted => ServiceStarted,
    GasServiceStarted => ServiceStarted,
    ElectricityServiceEnded => ServiceEnded,
    GasServiceEnded => ServiceEnded,
    ElectricityServiceCancelled => ServiceCancelled,
    GasServiceCancelled => ServiceCancelled,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Started(SupplyType, ServiceStarted),
    Ended(SupplyType, ServiceEnded),
    Cancelled(SupplyType, ServiceCancelled),
    Unhandled(String),
}

pub struct ServiceTopic;

#[async_trait]
impl Topic for ServiceTopic {
    type Event = ServiceEvent;

    const NAME: &'static str = "service";

    fn decode(payload: &AnyPayload) -> Result<ServiceEvent, DecodeError> {
        use SupplyType::{Electricity, Gas};

        Ok(match payload {
            p if p.is::<ElectricityServiceStarted>() => {
                ServiceEvent::Started(Electricity, p.unpack::<ElectricityServiceStarted>()?.0)
            }
            p if p.is::<GasServiceStarted>() => {
                ServiceEvent::Started(Gas, p.unpack::<GasServiceStarted>()?.0)
            }
            p if p.is::<ElectricityServiceEnded>() => {
                ServiceEvent::Ended(Electricity, p.unpack::<ElectricityServiceEnded>()?.0)
            }
            p if p.is::<GasServiceEnded>() => ServiceEvent::Ended(Gas, p.unpack::<GasServiceEnded>()?.0),
            p if p.is::<ElectricityServiceCancelled>() => {
                ServiceEvent::Cancelled(Electricity, p.unpack::<ElectricityServiceCancelled>()?.0)
            }
            p if p.is::<GasServiceCancelled>() => {
                ServiceEvent::Cancelled(Gas, p.unpack::<GasServiceCancelled>()?.0)
            }
            p => ServiceEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &ServiceEvent) -> Option<&str> {
        match event {
            ServiceEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn persist(store: &dyn Store, event: &ServiceEvent) -> StoreResult<()> {
        match event {
            ServiceEvent::Started(supply_type, e) => {
                store
                    .upsert_service(&Service {
                        id: e.service_id.clone(),
                        occupancy_id: e.occupancy_id.clone(),
                        mpxn: e.mpxn.clone(),
                        supply_type: *supply_type,
                        is_live: true,
                        start_date: e.start_date,
                        end_date: None,
                        meter: None,
                        meterpoint: None,
                    })
                    .await
            }
            ServiceEvent::Ended(_, e) => store.end_service(&e.service_id, e.end_date).await,
            ServiceEvent::Cancelled(_, e) => store.cancel_service(&e.service_id).await,
            ServiceEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &ServiceEvent) -> Option<Cascade> {
        let occupancy_id = match event {
            ServiceEvent::Started(_, e) => &e.occupancy_id,
            ServiceEvent::Ended(_, e) => &e.occupancy_id,
            ServiceEvent::Cancelled(_, e) => &e.occupancy_id,
            ServiceEvent::Unhandled(_) => return None,
        };
        Some(Cascade::full(CascadeKey::Occupancy(occupancy_id.clone())))
    }
}
