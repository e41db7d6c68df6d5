/// PSR codes that mark an account as too vulnerable for a smart booking.
pub const VULNERABLE_PSR_CODES: [&str; 3] = ["10", "35", "36"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub opt_out: bool,
    pub psr_codes: Vec<String>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Substring match over the comma-joined code list, so "100" also matches "10".
    pub fn has_psr_vulnerability(&self) -> bool {
        let joined = self.psr_codes.join(",");
        VULNERABLE_PSR_CODES.iter().any(|code| joined.contains(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_codes(codes: &[&str]) -> Account {
        Account {
            id: "acc-1".to_string(),
            opt_out: false,
            psr_codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn no_codes_is_not_vulnerable() {
        assert!(!account_with_codes(&[]).has_psr_vulnerability());
    }

    #[test]
    fn listed_code_is_vulnerable() {
        assert!(account_with_codes(&["02", "35"]).has_psr_vulnerability());
    }

    #[test]
    fn codes_are_matched_as_substrings_of_the_joined_list() {
        assert!(account_with_codes(&["100"]).has_psr_vulnerability());
        assert!(!account_with_codes(&["1", "0"]).has_psr_vulnerability());
        assert!(!account_with_codes(&["03", "22"]).has_psr_vulnerability());
    }
}
