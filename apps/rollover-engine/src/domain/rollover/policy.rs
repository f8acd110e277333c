//! Rollover policies and output labelling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::record::RawRecord;

/// Activity figure compared by the crossover policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverMetric {
    /// Traded volume.
    Volume,
    /// Open interest.
    OpenInterest,
}

impl CrossoverMetric {
    /// Read the metric off a record.
    #[must_use]
    pub const fn value(self, record: &RawRecord) -> u64 {
        match self {
            Self::Volume => record.volume,
            Self::OpenInterest => record.open_interest,
        }
    }
}

impl fmt::Display for CrossoverMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => write!(f, "volume"),
            Self::OpenInterest => write!(f, "open_interest"),
        }
    }
}

/// How a continuous series decides when to move to the next contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// Roll once fewer than `delta` trading days remain before expiry.
    FixedOffset {
        /// Trading-day offset; zero rolls on the expiry day itself.
        delta: u32,
    },
    /// Roll the day after the next contract trades more volume.
    VolumeCrossover,
    /// Roll the day after the next contract carries more open interest.
    OpenInterestCrossover,
}

impl RolloverPolicy {
    /// Label marker for this policy when several variants run side by side.
    ///
    /// Fixed offsets use roman numerals ("0" for delta zero); crossovers use
    /// "VOL" and "OI".
    #[must_use]
    pub fn marker(&self) -> String {
        match self {
            Self::FixedOffset { delta } => roman(*delta),
            Self::VolumeCrossover => "VOL".to_string(),
            Self::OpenInterestCrossover => "OI".to_string(),
        }
    }

    /// Crossover metric, for crossover policies.
    #[must_use]
    pub const fn metric(&self) -> Option<CrossoverMetric> {
        match self {
            Self::FixedOffset { .. } => None,
            Self::VolumeCrossover => Some(CrossoverMetric::Volume),
            Self::OpenInterestCrossover => Some(CrossoverMetric::OpenInterest),
        }
    }
}

impl fmt::Display for RolloverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedOffset { delta } => write!(f, "fixed_offset({delta})"),
            Self::VolumeCrossover => write!(f, "volume_crossover"),
            Self::OpenInterestCrossover => write!(f, "open_interest_crossover"),
        }
    }
}

/// Output label for a symbol under a policy.
///
/// With a single configured variant the bare symbol is used; otherwise the
/// policy marker is appended (`GOLDM-II`, `GOLDM-VOL`).
#[must_use]
pub fn series_label(symbol: &str, policy: &RolloverPolicy, variants: usize) -> String {
    if variants <= 1 {
        symbol.to_string()
    } else {
        format!("{symbol}-{}", policy.marker())
    }
}

/// Roman numeral for `n`, with "0" standing in for zero.
#[must_use]
pub fn roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    if n == 0 {
        return "0".to_string();
    }

    let mut out = String::new();
    for (value, glyph) in TABLE {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0")]
    #[test_case(1, "I")]
    #[test_case(4, "IV")]
    #[test_case(9, "IX")]
    #[test_case(14, "XIV")]
    #[test_case(40, "XL")]
    #[test_case(1994, "MCMXCIV")]
    fn test_roman(n: u32, expected: &str) {
        assert_eq!(roman(n), expected);
    }

    #[test]
    fn test_labels() {
        let fixed = RolloverPolicy::FixedOffset { delta: 2 };
        assert_eq!(series_label("GOLDM", &fixed, 1), "GOLDM");
        assert_eq!(series_label("GOLDM", &fixed, 3), "GOLDM-II");
        assert_eq!(series_label("GOLDM", &RolloverPolicy::VolumeCrossover, 2), "GOLDM-VOL");
        assert_eq!(series_label("GOLDM", &RolloverPolicy::OpenInterestCrossover, 2), "GOLDM-OI");
        assert_eq!(
            series_label("GOLDM", &RolloverPolicy::FixedOffset { delta: 0 }, 2),
            "GOLDM-0"
        );
    }

    #[test]
    fn test_metric_reads_record() {
        let date = chrono::NaiveDate::from_ymd_opt(2020, 2, 3).unwrap();
        let record = RawRecord::new("GOLDM", date, date, rust_decimal::Decimal::ONE).with_activity(10, 20);
        assert_eq!(CrossoverMetric::Volume.value(&record), 10);
        assert_eq!(CrossoverMetric::OpenInterest.value(&record), 20);
        assert_eq!(RolloverPolicy::FixedOffset { delta: 1 }.metric(), None);
    }
}
