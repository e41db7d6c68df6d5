use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Why an occupancy does not qualify in one evaluation dimension.
///
/// The wire code of each variant is part of the downstream contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    MissingSiteData,
    NoWanCoverage,
    NoActiveService,
    GasServiceOnly,
    MissingMeterpointData,
    AltHan,
    MissingMeterData,
    MeterLargeCapacity,
    PsrVulnerabilities,
    ComplexTariff,
    AlreadySmart,
    BookingOptOut,
}

impl IneligibilityReason {
    pub const ALL: [IneligibilityReason; 12] = [
        Self::MissingSiteData,
        Self::NoWanCoverage,
        Self::NoActiveService,
        Self::GasServiceOnly,
        Self::MissingMeterpointData,
        Self::AltHan,
        Self::MissingMeterData,
        Self::MeterLargeCapacity,
        Self::PsrVulnerabilities,
        Self::ComplexTariff,
        Self::AlreadySmart,
        Self::BookingOptOut,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSiteData => "MISSING_SITE_DATA",
            Self::NoWanCoverage => "NO_WAN_COVERAGE",
            Self::NoActiveService => "NO_ACTIVE_SERVICE",
            Self::GasServiceOnly => "GAS_SERVICE_ONLY",
            Self::MissingMeterpointData => "MISSING_METERPOINT_DATA",
            Self::AltHan => "ALT_HAN",
            Self::MissingMeterData => "MISSING_METER_DATA",
            Self::MeterLargeCapacity => "METER_LARGE_CAPACITY",
            Self::PsrVulnerabilities => "PSR_VULNERABILITIES",
            Self::ComplexTariff => "COMPLEX_TARIFF",
            Self::AlreadySmart => "ALREADY_SMART",
            Self::BookingOptOut => "BOOKING_OPT_OUT",
        }
    }
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IneligibilityReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.code() == s)
            .ok_or_else(|| format!("unknown ineligibility reason {s:?}"))
    }
}

/// Unordered, duplicate-free collection of reasons. Empty means "qualifies".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReasonSet(BTreeSet<IneligibilityReason>);

impl ReasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reason: IneligibilityReason) -> bool {
        self.0.insert(reason)
    }

    pub fn contains(&self, reason: IneligibilityReason) -> bool {
        self.0.contains(&reason)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = IneligibilityReason> + '_ {
        self.0.iter().copied()
    }

    /// Wire codes in a stable order.
    pub fn codes(&self) -> Vec<String> {
        self.iter().map(|reason| reason.code().to_string()).collect()
    }

    pub fn from_codes<I, S>(codes: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .map(|code| code.as_ref().parse::<IneligibilityReason>())
            .collect()
    }
}

impl FromIterator<IneligibilityReason> for ReasonSet {
    fn from_iter<T: IntoIterator<Item = IneligibilityReason>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[IneligibilityReason; N]> for ReasonSet {
    fn from(reasons: [IneligibilityReason; N]) -> Self {
        reasons.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationKind {
    Eligibility,
    Suppliability,
    Campaignability,
}

impl EvaluationKind {
    pub const ALL: [EvaluationKind; 3] = [Self::Eligibility, Self::Suppliability, Self::Campaignability];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligibility => "eligibility",
            Self::Suppliability => "suppliability",
            Self::Campaignability => "campaignability",
        }
    }
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last persisted outcome of one dimension.
///
/// `evaluated == false` means "never evaluated", which is distinct from an
/// evaluated row with no reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    pub reasons: ReasonSet,
    pub evaluated: bool,
}

impl EvaluationResult {
    pub fn evaluated(reasons: ReasonSet) -> Self {
        Self {
            reasons,
            evaluated: true,
        }
    }

    pub fn qualifies(&self) -> bool {
        self.evaluated && self.reasons.is_empty()
    }

    pub fn differs_from(&self, reasons: &ReasonSet) -> bool {
        !self.evaluated || self.reasons != *reasons
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResults {
    pub eligibility: EvaluationResult,
    pub suppliability: EvaluationResult,
    pub campaignability: EvaluationResult,
}

impl EvaluationResults {
    pub fn get(&self, kind: EvaluationKind) -> &EvaluationResult {
        match kind {
            EvaluationKind::Eligibility => &self.eligibility,
            EvaluationKind::Suppliability => &self.suppliability,
            EvaluationKind::Campaignability => &self.campaignability,
        }
    }

    pub fn get_mut(&mut self, kind: EvaluationKind) -> &mut EvaluationResult {
        match kind {
            EvaluationKind::Eligibility => &mut self.eligibility,
            EvaluationKind::Suppliability => &mut self.suppliability,
            EvaluationKind::Campaignability => &mut self.campaignability,
        }
    }

    pub fn any_evaluated(&self) -> bool {
        EvaluationKind::ALL.iter().any(|kind| self.get(*kind).evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IneligibilityReason::*;

    #[test]
    fn reason_sets_compare_without_order_or_duplicates() {
        let a: ReasonSet = [AlreadySmart, NoWanCoverage, AlreadySmart].into_iter().collect();
        let b = ReasonSet::from([NoWanCoverage, AlreadySmart]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn codes_round_trip_through_the_wire_representation() {
        let set = ReasonSet::from([PsrVulnerabilities, ComplexTariff]);
        let parsed = ReasonSet::from_codes(set.codes()).unwrap();
        assert_eq!(parsed, set);
        assert!(ReasonSet::from_codes(["NOT_A_REASON"]).is_err());
    }

    #[test]
    fn never_evaluated_differs_even_from_an_empty_set() {
        let never = EvaluationResult::default();
        assert!(never.differs_from(&ReasonSet::new()));
        assert!(!never.qualifies());

        let qualifies = EvaluationResult::evaluated(ReasonSet::new());
        assert!(!qualifies.differs_from(&ReasonSet::new()));
        assert!(qualifies.qualifies());
        assert!(qualifies.differs_from(&ReasonSet::from([BookingOptOut])));
    }
}
