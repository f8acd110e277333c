//! Rollover multipliers per label.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// When a rollover multiplier starts to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    /// On the rollover date itself.
    #[default]
    SameDay,
    /// From the trading day after the rollover date.
    NextDay,
}

impl fmt::Display for AdjustmentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameDay => write!(f, "same_day"),
            Self::NextDay => write!(f, "next_day"),
        }
    }
}

/// `label -> rollover date -> previous close / current close`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiplierTable {
    labels: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl MultiplierTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the multiplier of a rollover.
    pub fn insert(&mut self, label: &str, date: NaiveDate, ratio: f64) {
        self.labels
            .entry(label.to_string())
            .or_default()
            .insert(date, ratio);
    }

    /// Register a label with no rollover.
    pub fn ensure_label(&mut self, label: &str) {
        self.labels.entry(label.to_string()).or_default();
    }

    /// Multiplier recorded for (label, date).
    #[must_use]
    pub fn get(&self, label: &str, date: NaiveDate) -> Option<f64> {
        self.labels.get(label).and_then(|m| m.get(&date)).copied()
    }

    /// A label's multipliers in date order.
    pub fn multipliers<'a>(
        &'a self,
        label: &str,
    ) -> impl DoubleEndedIterator<Item = (NaiveDate, f64)> + use<'a> {
        self.labels
            .get(label)
            .into_iter()
            .flat_map(|m| m.iter().map(|(d, r)| (*d, *r)))
    }

    /// Labels, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Total multipliers across labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.values().map(BTreeMap::len).sum()
    }

    /// Whether no multiplier is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another table into this one.
    pub fn merge(&mut self, other: Self) {
        for (label, entries) in other.labels {
            self.labels.entry(label).or_default().extend(entries);
        }
    }

    /// Cumulative multiplier in effect for `label` on `date`.
    ///
    /// Same-day takes every multiplier dated on or before `date`; next-day
    /// only those strictly before it.
    #[must_use]
    pub fn cumulative(&self, label: &str, date: NaiveDate, direction: AdjustmentDirection) -> f64 {
        let Some(entries) = self.labels.get(label) else {
            return 1.0;
        };
        let applicable = match direction {
            AdjustmentDirection::SameDay => entries.range(..=date),
            AdjustmentDirection::NextDay => entries.range(..date),
        };
        applicable.map(|(_, ratio)| *ratio).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table() -> MultiplierTable {
        let mut table = MultiplierTable::new();
        table.insert("GOLDM", date("2020-02-28"), 0.98);
        table.insert("GOLDM", date("2020-03-31"), 0.5);
        table
    }

    #[test]
    fn test_cumulative_same_day_includes_rollover_date() {
        let table = table();
        assert!((table.cumulative("GOLDM", date("2020-02-27"), AdjustmentDirection::SameDay) - 1.0).abs() < 1e-12);
        assert!((table.cumulative("GOLDM", date("2020-02-28"), AdjustmentDirection::SameDay) - 0.98).abs() < 1e-12);
        assert!((table.cumulative("GOLDM", date("2020-04-01"), AdjustmentDirection::SameDay) - 0.49).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_next_day_lags_one_day() {
        let table = table();
        assert!((table.cumulative("GOLDM", date("2020-02-28"), AdjustmentDirection::NextDay) - 1.0).abs() < 1e-12);
        assert!((table.cumulative("GOLDM", date("2020-03-02"), AdjustmentDirection::NextDay) - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_label_is_neutral() {
        assert!((table().cumulative("SILVERM", date("2020-03-02"), AdjustmentDirection::SameDay) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(table()).unwrap();
        assert_eq!(json["GOLDM"]["2020-03-31"], serde_json::json!(0.5));
    }
}
