#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub id: String,
    pub postcode: String,
    /// Looked up from the WAN coverage table by postcode, never stored on the site row.
    pub wan_coverage: bool,
}

/// Canonical postcode form used as the WAN coverage key: upper-case, single inner space.
pub fn normalise_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    if compact.len() > 3 && compact.is_ascii() {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        format!("{outward} {inward}")
    } else {
        compact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postcodes_are_normalised_for_coverage_lookups() {
        assert_eq!(normalise_postcode("ab12cd"), "AB1 2CD");
        assert_eq!(normalise_postcode(" sw1a  1aa "), "SW1A 1AA");
        assert_eq!(normalise_postcode("EC1A 1BB"), "EC1A 1BB");
        assert_eq!(normalise_postcode("n1"), "N1");
    }
}
