//! Continuous series keyed by output label.
//!
//! A label is the bare symbol when a single rollover variant is configured,
//! or `SYMBOL-<marker>` when several are (see [`crate::domain::rollover`]).
//! Each label holds at most one record per trading date.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::RangeBounds;

use chrono::NaiveDate;

use super::record::RawRecord;

/// Label-keyed, date-ordered continuous series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuousSeries {
    labels: BTreeMap<String, BTreeMap<NaiveDate, RawRecord>>,
}

impl ContinuousSeries {
    /// Create an empty series set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under `label`, returning the record it replaced.
    pub fn insert(&mut self, label: &str, record: RawRecord) -> Option<RawRecord> {
        self.labels
            .entry(label.to_string())
            .or_default()
            .insert(record.trading_date, record)
    }

    /// Insert every record under `label`.
    pub fn extend(&mut self, label: &str, records: impl IntoIterator<Item = RawRecord>) {
        let entry = self.labels.entry(label.to_string()).or_default();
        for record in records {
            entry.insert(record.trading_date, record);
        }
    }

    /// Remove the record for (label, date). Empty labels are kept so a label
    /// that was produced once keeps being persisted.
    pub fn remove(&mut self, label: &str, date: NaiveDate) -> Option<RawRecord> {
        self.labels.get_mut(label).and_then(|days| days.remove(&date))
    }

    /// Register a label without records.
    pub fn ensure_label(&mut self, label: &str) {
        if let Entry::Vacant(slot) = self.labels.entry(label.to_string()) {
            slot.insert(BTreeMap::new());
        }
    }

    /// Record for (label, date).
    #[must_use]
    pub fn get(&self, label: &str, date: NaiveDate) -> Option<&RawRecord> {
        self.labels.get(label).and_then(|days| days.get(&date))
    }

    /// Whether a record exists for (label, date).
    #[must_use]
    pub fn contains(&self, label: &str, date: NaiveDate) -> bool {
        self.get(label, date).is_some()
    }

    /// All labels, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Records for a label in date order.
    pub fn records<'a>(
        &'a self,
        label: &str,
    ) -> impl DoubleEndedIterator<Item = &'a RawRecord> + use<'a> {
        self.labels.get(label).into_iter().flat_map(BTreeMap::values)
    }

    /// Records for a label whose date lies in `range`.
    pub fn records_in<'a, R>(
        &'a self,
        label: &str,
        range: R,
    ) -> impl DoubleEndedIterator<Item = &'a RawRecord> + use<'a, R>
    where
        R: RangeBounds<NaiveDate> + 'a,
    {
        self.labels
            .get(label)
            .into_iter()
            .flat_map(move |days| days.range((range.start_bound().cloned(), range.end_bound().cloned())))
            .map(|(_, record)| record)
    }

    /// Base symbol backing a label, taken from its records.
    #[must_use]
    pub fn symbol_of(&self, label: &str) -> Option<&str> {
        self.records(label).next().map(|r| r.symbol.as_str())
    }

    /// Number of records across all labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.values().map(BTreeMap::len).sum()
    }

    /// Whether no label holds a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records for one label.
    #[must_use]
    pub fn label_len(&self, label: &str) -> usize {
        self.labels.get(label).map_or(0, BTreeMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_insert_replaces_same_day() {
        let mut series = ContinuousSeries::new();
        let day = date("2020-02-27");
        assert!(series
            .insert("GOLDM", RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(1)))
            .is_none());
        let replaced = series.insert("GOLDM", RawRecord::new("GOLDM", day, date("2020-03-31"), dec!(2)));

        assert_eq!(replaced.map(|r| r.expiry_date), Some(date("2020-02-28")));
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("GOLDM", day).map(|r| r.close), Some(dec!(2)));
    }

    #[test]
    fn test_records_in_range() {
        let mut series = ContinuousSeries::new();
        for (day, close) in [("2020-02-26", dec!(1)), ("2020-02-27", dec!(2)), ("2020-02-28", dec!(3))] {
            series.insert("GOLDM", RawRecord::new("GOLDM", date(day), date("2020-03-31"), close));
        }

        let inner: Vec<_> = series
            .records_in("GOLDM", (std::ops::Bound::Excluded(date("2020-02-26")), std::ops::Bound::Unbounded))
            .map(|r| r.close)
            .collect();
        assert_eq!(inner, vec![dec!(2), dec!(3)]);
        assert_eq!(series.symbol_of("GOLDM"), Some("GOLDM"));
        assert_eq!(series.records_in("MISSING", ..).count(), 0);
    }

    #[test]
    fn test_remove_keeps_label() {
        let mut series = ContinuousSeries::new();
        let day = date("2020-02-27");
        series.insert("GOLDM-I", RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(1)));
        assert!(series.remove("GOLDM-I", day).is_some());
        assert!(series.is_empty());
        assert_eq!(series.labels().collect::<Vec<_>>(), vec!["GOLDM-I"]);
    }
}
