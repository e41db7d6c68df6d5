//! Pure rule sets. Each returns the reasons an occupancy does not qualify;
//! an empty set means it qualifies for that dimension.

use eligibility_client::domain::{IneligibilityReason, Occupancy, ReasonSet, Service};

use IneligibilityReason::*;

pub fn evaluate_suppliability(occupancy: &Occupancy) -> ReasonSet {
    let live: Vec<&Service> = occupancy.live_services().collect();

    // A lone gas supply cannot be booked on its own, whatever else is wrong.
    if let [only] = live.as_slice() {
        if only.is_gas() {
            return ReasonSet::from([GasServiceOnly]);
        }
    }

    let mut reasons = site_reasons(occupancy);
    if live.is_empty() {
        reasons.insert(NoActiveService);
    }

    for service in live {
        match &service.meterpoint {
            None => {
                reasons.insert(MissingMeterpointData);
            }
            Some(meterpoint) if meterpoint.alt_han => {
                reasons.insert(AltHan);
            }
            Some(_) => {}
        }

        let Some(meter) = &service.meter else {
            reasons.insert(MissingMeterData);
            continue;
        };
        if service.is_gas() {
            match meter.has_supported_capacity() {
                None => {
                    reasons.insert(MissingMeterData);
                }
                Some(false) => {
                    reasons.insert(MeterLargeCapacity);
                }
                Some(true) => {}
            }
        }
    }

    reasons
}

pub fn evaluate_eligibility(occupancy: &Occupancy) -> ReasonSet {
    let mut reasons = site_reasons(occupancy);

    if occupancy.account.has_psr_vulnerability() {
        reasons.insert(PsrVulnerabilities);
    }
    if occupancy.live_service_count() == 0 {
        reasons.insert(NoActiveService);
    }

    for service in occupancy.live_services() {
        match &service.meterpoint {
            None => {
                reasons.insert(MissingMeterpointData);
            }
            Some(meterpoint) if meterpoint.is_complex_tariff() => {
                reasons.insert(ComplexTariff);
            }
            Some(_) => {}
        }

        match &service.meter {
            None => {
                reasons.insert(MissingMeterData);
            }
            Some(meter) if meter.is_smart() => {
                reasons.insert(AlreadySmart);
            }
            Some(_) => {}
        }
    }

    reasons
}

pub fn evaluate_campaignability(occupancy: &Occupancy) -> ReasonSet {
    let mut reasons = ReasonSet::new();
    if occupancy.account.opt_out {
        reasons.insert(BookingOptOut);
    }
    if occupancy.live_service_count() == 0 {
        reasons.insert(NoActiveService);
    }
    reasons
}

fn site_reasons(occupancy: &Occupancy) -> ReasonSet {
    let mut reasons = ReasonSet::new();
    match &occupancy.site {
        None => {
            reasons.insert(MissingSiteData);
        }
        Some(site) if !site.wan_coverage => {
            reasons.insert(NoWanCoverage);
        }
        Some(_) => {}
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use eligibility_client::domain::{
        Account, EvaluationResults, Meter, Meterpoint, Site, SupplyType,
    };

    fn elec_service(id: &str) -> Service {
        Service {
            id: id.to_string(),
            occupancy_id: "occ-1".to_string(),
            mpxn: format!("mpan-{id}"),
            supply_type: SupplyType::Electricity,
            is_live: true,
            start_date: None,
            end_date: None,
            meter: Some(Meter {
                id: format!("meter-{id}"),
                mpxn: format!("mpan-{id}"),
                serial_number: "E12345".to_string(),
                supply_type: SupplyType::Electricity,
                capacity: None,
                meter_type: "ELEC_S2AD".to_string(),
                installed_at: None,
            }),
            meterpoint: Some(Meterpoint {
                mpxn: format!("mpan-{id}"),
                profile_class: Some("01".to_string()),
                ssc: Some("0393".to_string()),
                alt_han: false,
            }),
        }
    }

    fn gas_service(id: &str, capacity: Option<f64>) -> Service {
        let mut service = elec_service(id);
        service.mpxn = format!("mprn-{id}");
        service.supply_type = SupplyType::Gas;
        if let Some(meter) = service.meter.as_mut() {
            meter.supply_type = SupplyType::Gas;
            meter.meter_type = "GAS_CREDIT".to_string();
            meter.capacity = capacity;
        }
        service
    }

    fn occupancy(services: Vec<Service>) -> Occupancy {
        Occupancy {
            id: "occ-1".to_string(),
            account: Account::new("acc-1"),
            site: Some(Site {
                id: "site-1".to_string(),
                postcode: "AB1 2CD".to_string(),
                wan_coverage: true,
            }),
            services,
            results: EvaluationResults::default(),
        }
    }

    #[test]
    fn no_live_services_fails_every_dimension() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.services[0].is_live = false;

        assert!(evaluate_suppliability(&occ).contains(NoActiveService));
        assert!(evaluate_eligibility(&occ).contains(NoActiveService));
        assert!(evaluate_campaignability(&occ).contains(NoActiveService));
    }

    #[test]
    fn lone_gas_service_short_circuits_suppliability_only() {
        let mut occ = occupancy(vec![gas_service("1", None)]);
        occ.site = None;
        occ.services[0].meterpoint = None;

        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([GasServiceOnly]));

        let eligibility = evaluate_eligibility(&occ);
        assert!(!eligibility.contains(GasServiceOnly));
        assert!(eligibility.contains(MissingSiteData));
        assert!(eligibility.contains(MissingMeterpointData));
    }

    #[test]
    fn dual_fuel_with_supported_gas_capacity_is_suppliable() {
        let occ = occupancy(vec![elec_service("1"), gas_service("2", Some(6.0))]);
        assert!(evaluate_suppliability(&occ).is_empty());
    }

    #[test]
    fn gas_capacity_rules() {
        let occ = occupancy(vec![elec_service("1"), gas_service("2", Some(25.0))]);
        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([MeterLargeCapacity]));

        let occ = occupancy(vec![elec_service("1"), gas_service("2", None)]);
        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([MissingMeterData]));
    }

    #[test]
    fn missing_site_and_coverage_are_reported() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.site.as_mut().unwrap().wan_coverage = false;
        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([NoWanCoverage]));
        assert_eq!(evaluate_eligibility(&occ), ReasonSet::from([NoWanCoverage]));

        occ.site = None;
        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([MissingSiteData]));
    }

    #[test]
    fn missing_meter_and_meterpoint_are_reasons_not_skips() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.services[0].meter = None;
        occ.services[0].meterpoint = None;

        let expected = ReasonSet::from([MissingMeterData, MissingMeterpointData]);
        assert_eq!(evaluate_suppliability(&occ), expected);
        assert_eq!(evaluate_eligibility(&occ), expected);
    }

    #[test]
    fn alt_han_blocks_suppliability() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.services[0].meterpoint.as_mut().unwrap().alt_han = true;
        assert_eq!(evaluate_suppliability(&occ), ReasonSet::from([AltHan]));
        assert!(evaluate_eligibility(&occ).is_empty());
    }

    #[test]
    fn traditional_electricity_meter_is_eligible() {
        let occ = occupancy(vec![elec_service("1")]);
        assert!(evaluate_eligibility(&occ).is_empty());
    }

    #[test]
    fn smart_meter_is_already_smart() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.services[0].meter.as_mut().unwrap().meter_type = "ELEC_SMETS1".to_string();
        assert_eq!(evaluate_eligibility(&occ), ReasonSet::from([AlreadySmart]));
    }

    #[test]
    fn complex_tariff_is_ineligible() {
        let mut occ = occupancy(vec![elec_service("1")]);
        let mp = occ.services[0].meterpoint.as_mut().unwrap();
        mp.profile_class = Some("02".to_string());
        mp.ssc = Some("0003".to_string());
        assert!(evaluate_eligibility(&occ).contains(ComplexTariff));
    }

    #[test]
    fn psr_vulnerability_is_ineligible() {
        let mut occ = occupancy(vec![elec_service("1")]);
        occ.account.psr_codes = vec!["08".to_string(), "36".to_string()];
        assert_eq!(evaluate_eligibility(&occ), ReasonSet::from([PsrVulnerabilities]));
    }

    #[test]
    fn opt_out_is_not_campaignable() {
        let mut occ = occupancy(vec![elec_service("1")]);
        assert!(evaluate_campaignability(&occ).is_empty());
        occ.account.opt_out = true;
        assert_eq!(evaluate_campaignability(&occ), ReasonSet::from([BookingOptOut]));
    }
}
