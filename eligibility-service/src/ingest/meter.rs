use async_trait::async_trait;
use eligibility_client::{
    db::{Store, StoreError, StoreResult},
    domain::{Meter, SupplyType},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Cascade, CascadeKey, Topic};
use crate::{
    envelope::{AnyPayload, DecodeError},
    typed_payload,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityMeterDiscovered {
    pub meter_id: String,
    pub mpxn: String,
    pub serial_number: String,
    pub meter_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasMeterDiscovered {
    pub meter_id: String,
    pub mpxn: String,
    pub serial_number: String,
    pub meter_type: String,
    /// Nominal capacity in cubic metres per hour, when known.
    #[serde(default)]
    pub capacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterInstalled {
    pub meter_id: String,
    pub mpxn: String,
    pub serial_number: String,
    pub supply_type: SupplyType,
    pub meter_type: String,
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub installed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterUninstalled {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uninstalled_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterErroneouslyUninstalled {
    pub meter_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterTypeCorrected {
    pub meter_id: String,
    pub meter_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasMeterCapacityChanged {
    pub meter_id: String,
    pub capacity: f64,
}

typed_payload!(
    ElectricityMeterDiscovered,
    GasMeterDiscovered,
    MeterInstalled,
    MeterUninstalled,
    MeterErroneouslyUninstalled,
    MeterTypeCorrected,
    GasMeterCapacityChanged,
);

#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    ElectricityDiscovered(ElectricityMeterDiscovered),
    GasDiscovered(GasMeterDiscovered),
    Installed(MeterInstalled),
    Uninstalled(MeterUninstalled),
    ErroneouslyUninstalled(MeterErroneouslyUninstalled),
    TypeCorrected(MeterTypeCorrected),
    CapacityChanged(GasMeterCapacityChanged),
    Unhandled(String),
}

pub struct MeterTopic;

#[async_trait]
impl Topic for MeterTopic {
    type Event = MeterEvent;

    const NAME: &'static str = "meter";

    fn decode(payload: &AnyPayload) -> Result<MeterEvent, DecodeError> {
        Ok(match payload {
            p if p.is::<ElectricityMeterDiscovered>() => MeterEvent::ElectricityDiscovered(p.unpack()?),
            p if p.is::<GasMeterDiscovered>() => MeterEvent::GasDiscovered(p.unpack()?),
            p if p.is::<MeterInstalled>() => MeterEvent::Installed(p.unpack()?),
            p if p.is::<MeterUninstalled>() => MeterEvent::Uninstalled(p.unpack()?),
            p if p.is::<MeterErroneouslyUninstalled>() => {
                MeterEvent::ErroneouslyUninstalled(p.unpack()?)
            }
            p if p.is::<MeterTypeCorrected>() => MeterEvent::TypeCorrected(p.unpack()?),
            p if p.is::<GasMeterCapacityChanged>() => MeterEvent::CapacityChanged(p.unpack()?),
            p => MeterEvent::Unhandled(p.type_url.clone()),
        })
    }

    fn unhandled_type(event: &MeterEvent) -> Option<&str> {
        match event {
            MeterEvent::Unhandled(type_url) => Some(type_url),
            _ => None,
        }
    }

    async fn displaced(store: &dyn Store, event: &MeterEvent) -> StoreResult<Vec<CascadeKey>> {
        let (meter_id, mpxn) = match event {
            MeterEvent::ElectricityDiscovered(e) => (&e.meter_id, &e.mpxn),
            MeterEvent::GasDiscovered(e) => (&e.meter_id, &e.mpxn),
            MeterEvent::Installed(e) => (&e.meter_id, &e.mpxn),
            _ => return Ok(Vec::new()),
        };
        match store.get_meter_mpxn(meter_id).await {
            Ok(previous) if &previous != mpxn => Ok(vec![CascadeKey::Mpxn(previous)]),
            Ok(_) | Err(StoreError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn persist(store: &dyn Store, event: &MeterEvent) -> StoreResult<()> {
        match event {
            MeterEvent::ElectricityDiscovered(e) => {
                store
                    .upsert_meter(&Meter {
                        id: e.meter_id.clone(),
                        mpxn: e.mpxn.clone(),
                        serial_number: e.serial_number.clone(),
                        supply_type: SupplyType::Electricity,
                        capacity: None,
                        meter_type: e.meter_type.clone(),
                        installed_at: None,
                    })
                    .await
            }
            MeterEvent::GasDiscovered(e) => {
                store
                    .upsert_meter(&Meter {
                        id: e.meter_id.clone(),
                        mpxn: e.mpxn.clone(),
                        serial_number: e.serial_number.clone(),
                        supply_type: SupplyType::Gas,
                        capacity: e.capacity,
                        meter_type: e.meter_type.clone(),
                        installed_at: None,
                    })
                    .await
            }
            MeterEvent::Installed(e) => {
                store
                    .upsert_meter(&Meter {
                        id: e.meter_id.clone(),
                        mpxn: e.mpxn.clone(),
                        serial_number: e.serial_number.clone(),
                        supply_type: e.supply_type,
                        capacity: e.capacity,
                        meter_type: e.meter_type.clone(),
                        installed_at: Some(e.installed_at),
                    })
                    .await
            }
            MeterEvent::Uninstalled(e) => store.mark_uninstalled(&e.meter_id, e.uninstalled_at).await,
            MeterEvent::ErroneouslyUninstalled(e) => store.reverse_uninstall(&e.meter_id).await,
            MeterEvent::TypeCorrected(e) => store.set_meter_type(&e.meter_id, &e.meter_type).await,
            MeterEvent::CapacityChanged(e) => store.set_capacity(&e.meter_id, e.capacity).await,
            MeterEvent::Unhandled(_) => Ok(()),
        }
    }

    fn cascade(event: &MeterEvent) -> Option<Cascade> {
        let meter = |id: &str| CascadeKey::Meter(id.to_string());
        Some(match event {
            MeterEvent::ElectricityDiscovered(e) => Cascade::full(CascadeKey::Mpxn(e.mpxn.clone())),
            MeterEvent::GasDiscovered(e) => Cascade::full(CascadeKey::Mpxn(e.mpxn.clone())),
            MeterEvent::Installed(e) => Cascade::full(CascadeKey::Mpxn(e.mpxn.clone())),
            MeterEvent::Uninstalled(e) => Cascade::full(meter(&e.meter_id)),
            MeterEvent::ErroneouslyUninstalled(e) => Cascade::full(meter(&e.meter_id)),
            MeterEvent::TypeCorrected(e) => Cascade::eligibility(meter(&e.meter_id)),
            MeterEvent::CapacityChanged(e) => Cascade::suppliability(meter(&e.meter_id)),
            MeterEvent::Unhandled(_) => return None,
        })
    }
}
