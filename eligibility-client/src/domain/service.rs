use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::Date;

use super::{Meter, Meterpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyType {
    Electricity,
    Gas,
}

impl SupplyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Gas => "gas",
        }
    }
}

impl fmt::Display for SupplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupplyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electricity" => Ok(Self::Electricity),
            "gas" => Ok(Self::Gas),
            other => Err(format!("unknown supply type {other:?}")),
        }
    }
}

/// A gas or electricity supply at an occupancy.
///
/// `meter` and `meterpoint` are `None` when the store could not resolve them;
/// rule evaluation reports that as missing data rather than skipping the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub occupancy_id: String,
    pub mpxn: String,
    pub supply_type: SupplyType,
    pub is_live: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub meter: Option<Meter>,
    pub meterpoint: Option<Meterpoint>,
}

impl Service {
    pub fn is_gas(&self) -> bool {
        self.supply_type == SupplyType::Gas
    }
}
