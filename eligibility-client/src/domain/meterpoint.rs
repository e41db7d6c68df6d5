/// Profile classes whose SSC has to be checked for complex tariffs.
pub const COMPLEX_TARIFF_PROFILE_CLASSES: [&str; 2] = ["02", "04"];

/// Settlement configurations a smart install cannot reproduce.
pub const UNSUPPORTED_SSC_CODES: [&str; 12] = [
    "0003", "0005", "0006", "0007", "0010", "0011", "0013", "0014", "0018", "0020", "0022", "0026",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meterpoint {
    pub mpxn: String,
    pub profile_class: Option<String>,
    pub ssc: Option<String>,
    pub alt_han: bool,
}

impl Meterpoint {
    pub fn is_complex_tariff(&self) -> bool {
        let (Some(profile_class), Some(ssc)) = (&self.profile_class, &self.ssc) else {
            return false;
        };
        COMPLEX_TARIFF_PROFILE_CLASSES.contains(&profile_class.as_str())
            && UNSUPPORTED_SSC_CODES.contains(&ssc.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meterpoint(profile_class: Option<&str>, ssc: Option<&str>) -> Meterpoint {
        Meterpoint {
            mpxn: "1012345678901".to_string(),
            profile_class: profile_class.map(str::to_string),
            ssc: ssc.map(str::to_string),
            alt_han: false,
        }
    }

    #[test]
    fn complex_tariff_needs_both_profile_class_and_ssc() {
        assert!(meterpoint(Some("02"), Some("0003")).is_complex_tariff());
        assert!(meterpoint(Some("04"), Some("0026")).is_complex_tariff());
        assert!(!meterpoint(Some("01"), Some("0003")).is_complex_tariff());
        assert!(!meterpoint(Some("02"), Some("0393")).is_complex_tariff());
        assert!(!meterpoint(Some("02"), None).is_complex_tariff());
        assert!(!meterpoint(None, Some("0003")).is_complex_tariff());
    }
}
