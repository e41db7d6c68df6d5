use time::OffsetDateTime;

use super::SupplyType;

/// Electricity meter type codes already counted as smart.
pub const SMART_ELECTRICITY_METER_TYPES: [&str; 4] =
    ["ELEC_SMETS1", "ELEC_SMETS2", "ELEC_S1", "ELEC_S2"];

/// Gas meter type codes already counted as smart.
pub const SMART_GAS_METER_TYPES: [&str; 4] = ["GAS_SMETS1", "GAS_SMETS2", "GAS_S1", "GAS_S2"];

/// Gas capacities (m3/h) a standard smart install can handle.
pub const SUPPORTED_GAS_CAPACITIES: [f64; 2] = [6.0, 212.0];

#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    pub id: String,
    pub mpxn: String,
    pub serial_number: String,
    pub supply_type: SupplyType,
    pub capacity: Option<f64>,
    pub meter_type: String,
    pub installed_at: Option<OffsetDateTime>,
}

impl Meter {
    pub fn is_smart(&self) -> bool {
        let table: &[&str] = match self.supply_type {
            SupplyType::Electricity => &SMART_ELECTRICITY_METER_TYPES,
            SupplyType::Gas => &SMART_GAS_METER_TYPES,
        };
        table.contains(&self.meter_type.as_str())
    }

    pub fn has_supported_capacity(&self) -> Option<bool> {
        self.capacity
            .map(|capacity| SUPPORTED_GAS_CAPACITIES.iter().any(|c| *c == capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter(supply_type: SupplyType, meter_type: &str) -> Meter {
        Meter {
            id: "m-1".to_string(),
            mpxn: "mpxn-1".to_string(),
            serial_number: "S123".to_string(),
            supply_type,
            capacity: None,
            meter_type: meter_type.to_string(),
            installed_at: None,
        }
    }

    #[test]
    fn smart_type_tables_are_per_supply_type() {
        assert!(meter(SupplyType::Electricity, "ELEC_SMETS1").is_smart());
        assert!(!meter(SupplyType::Electricity, "ELEC_S2AD").is_smart());
        assert!(!meter(SupplyType::Gas, "ELEC_SMETS1").is_smart());
        assert!(meter(SupplyType::Gas, "GAS_SMETS2").is_smart());
    }

    #[test]
    fn capacity_support_is_unknown_without_a_capacity() {
        let mut m = meter(SupplyType::Gas, "GAS_CREDIT");
        assert_eq!(m.has_supported_capacity(), None);
        m.capacity = Some(6.0);
        assert_eq!(m.has_supported_capacity(), Some(true));
        m.capacity = Some(16.0);
        assert_eq!(m.has_supported_capacity(), Some(false));
    }
}
