//! Raw daily futures records and the per-day snapshots they arrive in.
//!
//! A [`RawRecord`] is one expiry of one symbol on one trading day. Records are
//! immutable once loaded: every later stage (expiry index, selector,
//! reconciliation, multipliers) reads them through a [`SnapshotArchive`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single contract row from a daily snapshot.
///
/// Field names follow the bhavcopy dump columns so the same struct reads the
/// per-day CSV files and maps one-to-one onto the relational `tblDump` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Underlying symbol (e.g. "GOLDM").
    #[serde(rename = "Symbol")]
    pub symbol: String,
    /// Trading date of the snapshot this row belongs to.
    #[serde(rename = "Date")]
    pub trading_date: NaiveDate,
    /// Expiry date of the contract.
    #[serde(rename = "ExpiryDate", alias = "Expiry Date")]
    pub expiry_date: NaiveDate,
    /// Opening price.
    #[serde(rename = "Open")]
    pub open: Decimal,
    /// High price.
    #[serde(rename = "High")]
    pub high: Decimal,
    /// Low price.
    #[serde(rename = "Low")]
    pub low: Decimal,
    /// Closing price.
    #[serde(rename = "Close")]
    pub close: Decimal,
    /// Traded volume in lots.
    #[serde(rename = "VolumeLots", alias = "Volume")]
    pub volume: u64,
    /// Open interest in lots.
    #[serde(rename = "OpenInterestLots", alias = "Open Interest")]
    pub open_interest: u64,
    /// Trading day of month (1-based). Zero means "not supplied".
    #[serde(rename = "TDM", default)]
    pub trading_day_of_month: u32,
}

impl RawRecord {
    /// Create a record with flat prices at `close`, no volume and no TDM.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        trading_date: NaiveDate,
        expiry_date: NaiveDate,
        close: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            trading_date,
            expiry_date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
            open_interest: 0,
            trading_day_of_month: 0,
        }
    }

    /// Set open/high/low/close.
    #[must_use]
    pub const fn with_prices(
        mut self,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        self.open = open;
        self.high = high;
        self.low = low;
        self.close = close;
        self
    }

    /// Set volume and open interest.
    #[must_use]
    pub const fn with_activity(mut self, volume: u64, open_interest: u64) -> Self {
        self.volume = volume;
        self.open_interest = open_interest;
        self
    }

    /// Set the trading day of month.
    #[must_use]
    pub const fn with_tdm(mut self, trading_day_of_month: u32) -> Self {
        self.trading_day_of_month = trading_day_of_month;
        self
    }

    /// Whether the record was taken on its own expiry day.
    #[must_use]
    pub fn is_expiry_day(&self) -> bool {
        self.trading_date == self.expiry_date
    }
}

/// A snapshot failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// A record carries a trading date different from the snapshot date.
    #[error("record {symbol}/{expiry} dated {found} inside snapshot for {expected}")]
    DateMismatch {
        /// Snapshot date.
        expected: NaiveDate,
        /// Date found on the record.
        found: NaiveDate,
        /// Symbol of the offending record.
        symbol: String,
        /// Expiry of the offending record.
        expiry: NaiveDate,
    },

    /// Two records share the same (symbol, expiry) on one day.
    #[error("duplicate record for {symbol}/{expiry} on {date}")]
    Duplicate {
        /// Snapshot date.
        date: NaiveDate,
        /// Symbol.
        symbol: String,
        /// Expiry.
        expiry: NaiveDate,
    },

    /// A record has an empty symbol.
    #[error("record with empty symbol on {0}")]
    EmptySymbol(NaiveDate),
}

/// All records for one trading day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySnapshot {
    date: NaiveDate,
    trading_day_of_month: Option<u32>,
    records: Vec<RawRecord>,
}

impl DailySnapshot {
    /// Build and validate a snapshot.
    ///
    /// Symbols are trimmed; records are ordered by (symbol, expiry).
    pub fn new(date: NaiveDate, records: Vec<RawRecord>) -> Result<Self, SnapshotError> {
        let mut seen = BTreeSet::new();
        let mut cleaned = Vec::with_capacity(records.len());

        for mut record in records {
            let trimmed = record.symbol.trim();
            if trimmed.is_empty() {
                return Err(SnapshotError::EmptySymbol(date));
            }
            if trimmed.len() != record.symbol.len() {
                record.symbol = trimmed.to_string();
            }
            if record.trading_date != date {
                return Err(SnapshotError::DateMismatch {
                    expected: date,
                    found: record.trading_date,
                    symbol: record.symbol,
                    expiry: record.expiry_date,
                });
            }
            if !seen.insert((record.symbol.clone(), record.expiry_date)) {
                return Err(SnapshotError::Duplicate {
                    date,
                    symbol: record.symbol,
                    expiry: record.expiry_date,
                });
            }
            cleaned.push(record);
        }

        cleaned.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.expiry_date.cmp(&b.expiry_date))
        });

        let trading_day_of_month = cleaned
            .iter()
            .map(|r| r.trading_day_of_month)
            .find(|tdm| *tdm > 0);

        Ok(Self {
            date,
            trading_day_of_month,
            records: cleaned,
        })
    }

    /// A trading day with no records.
    #[must_use]
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            trading_day_of_month: None,
            records: Vec::new(),
        }
    }

    /// Snapshot date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// All records, ordered by (symbol, expiry).
    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Trading day of month for this snapshot, if known.
    #[must_use]
    pub const fn trading_day_of_month(&self) -> Option<u32> {
        self.trading_day_of_month
    }

    /// Whether the day has no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct symbols present on this day, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        let mut last: Option<&str> = None;
        self.records.iter().filter_map(move |r| {
            if last == Some(r.symbol.as_str()) {
                None
            } else {
                last = Some(r.symbol.as_str());
                last
            }
        })
    }

    /// Records for one symbol, ordered by expiry.
    pub fn records_for<'a, 's>(
        &'a self,
        symbol: &'s str,
    ) -> impl Iterator<Item = &'a RawRecord> + use<'a, 's> {
        let start = self.records.partition_point(|r| r.symbol.as_str() < symbol);
        self.records[start..]
            .iter()
            .take_while(move |r| r.symbol == symbol)
    }

    /// The record for (symbol, expiry), if present.
    #[must_use]
    pub fn record(&self, symbol: &str, expiry: NaiveDate) -> Option<&RawRecord> {
        self.records_for(symbol).find(|r| r.expiry_date == expiry)
    }

    /// Overwrite the trading day of month on every record.
    pub fn set_trading_day_of_month(&mut self, tdm: u32) {
        self.trading_day_of_month = Some(tdm);
        for record in &mut self.records {
            record.trading_day_of_month = tdm;
        }
    }
}

/// Chronological store of every loaded snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotArchive {
    days: BTreeMap<NaiveDate, DailySnapshot>,
}

impl SnapshotArchive {
    /// Create an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an archive from loose records, grouping them by trading date.
    pub fn from_records(
        records: impl IntoIterator<Item = RawRecord>,
    ) -> Result<Self, SnapshotError> {
        let mut by_day: BTreeMap<NaiveDate, Vec<RawRecord>> = BTreeMap::new();
        for record in records {
            by_day.entry(record.trading_date).or_default().push(record);
        }

        let mut archive = Self::new();
        for (date, records) in by_day {
            archive.insert(DailySnapshot::new(date, records)?);
        }
        Ok(archive)
    }

    /// Add (or replace) a day.
    pub fn insert(&mut self, snapshot: DailySnapshot) {
        self.days.insert(snapshot.date(), snapshot);
    }

    /// Mark `date` as a trading day, empty unless already loaded.
    pub fn ensure_day(&mut self, date: NaiveDate) {
        self.days
            .entry(date)
            .or_insert_with(|| DailySnapshot::empty(date));
    }

    /// Number of days held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether no day is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Snapshot for a date.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&DailySnapshot> {
        self.days.get(&date)
    }

    /// Mutable snapshot for a date.
    pub fn get_mut(&mut self, date: NaiveDate) -> Option<&mut DailySnapshot> {
        self.days.get_mut(&date)
    }

    /// All snapshots in date order.
    pub fn snapshots(&self) -> impl DoubleEndedIterator<Item = &DailySnapshot> {
        self.days.values()
    }

    /// All dates in ascending order.
    pub fn dates(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Dates within a range, ascending.
    pub fn dates_in<R>(&self, range: R) -> impl DoubleEndedIterator<Item = NaiveDate> + '_
    where
        R: RangeBounds<NaiveDate>,
    {
        self.days.range(range).map(|(date, _)| *date)
    }

    /// Earliest date held.
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    /// Latest date held.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    /// Every record of every day, in date order.
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.days.values().flat_map(|day| day.records().iter())
    }

    /// Look up the record for (symbol, date, expiry).
    #[must_use]
    pub fn record(&self, symbol: &str, date: NaiveDate, expiry: NaiveDate) -> Option<&RawRecord> {
        self.days.get(&date).and_then(|day| day.record(symbol, expiry))
    }

    /// Distinct symbols across the archive, sorted.
    #[must_use]
    pub fn symbols(&self) -> BTreeSet<String> {
        self.records().map(|r| r.symbol.clone()).collect()
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
    fn test_snapshot_orders_and_trims_symbols() {
        let day = date("2020-02-20");
        let snapshot = DailySnapshot::new(
            day,
            vec![
                RawRecord::new("SILVERM ", day, date("2020-02-28"), dec!(46000)),
                RawRecord::new("GOLDM", day, date("2020-03-31"), dec!(41100)),
                RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(41000)),
            ],
        )
        .unwrap();

        let symbols: Vec<&str> = snapshot.symbols().collect();
        assert_eq!(symbols, vec!["GOLDM", "SILVERM"]);

        let goldm: Vec<NaiveDate> = snapshot.records_for("GOLDM").map(|r| r.expiry_date).collect();
        assert_eq!(goldm, vec![date("2020-02-28"), date("2020-03-31")]);
        assert!(snapshot.record("SILVERM", date("2020-02-28")).is_some());
    }

    #[test]
    fn test_record_outlives_symbol_key() {
        let day = date("2020-02-20");
        let snapshot = DailySnapshot::new(
            day,
            vec![RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(41000))],
        )
        .unwrap();

        let found = {
            let key = String::from("GOLDM");
            snapshot.record(&key, date("2020-02-28"))
        };
        assert_eq!(found.map(|r| r.close), Some(dec!(41000)));
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let day = date("2020-02-20");
        let result = DailySnapshot::new(
            day,
            vec![
                RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(1)),
                RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(2)),
            ],
        );
        assert!(matches!(result, Err(SnapshotError::Duplicate { .. })));
    }

    #[test]
    fn test_snapshot_rejects_foreign_dates() {
        let day = date("2020-02-20");
        let result = DailySnapshot::new(
            day,
            vec![RawRecord::new("GOLDM", date("2020-02-21"), date("2020-02-28"), dec!(1))],
        );
        assert!(matches!(result, Err(SnapshotError::DateMismatch { .. })));
    }

    #[test]
    fn test_trading_day_of_month_zero_is_absent() {
        let day = date("2020-02-20");
        let mut snapshot = DailySnapshot::new(
            day,
            vec![RawRecord::new("GOLDM", day, date("2020-02-28"), dec!(1))],
        )
        .unwrap();
        assert_eq!(snapshot.trading_day_of_month(), None);

        snapshot.set_trading_day_of_month(14);
        assert_eq!(snapshot.trading_day_of_month(), Some(14));
    }

    #[test]
    fn test_ensure_day_keeps_loaded_days() {
        let mut archive = SnapshotArchive::from_records(vec![RawRecord::new(
            "GOLDM",
            date("2020-03-02"),
            date("2020-03-31"),
            dec!(1),
        )])
        .unwrap();

        archive.ensure_day(date("2020-03-02"));
        archive.ensure_day(date("2020-03-03"));

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.get(date("2020-03-02")).map(DailySnapshot::is_empty), Some(false));
        assert_eq!(archive.get(date("2020-03-03")).map(DailySnapshot::is_empty), Some(true));
        assert_eq!(archive.records().count(), 1);
    }

    #[test]
    fn test_archive_groups_records_by_day() {
        let archive = SnapshotArchive::from_records(vec![
            RawRecord::new("GOLDM", date("2020-02-21"), date("2020-02-28"), dec!(2)),
            RawRecord::new("GOLDM", date("2020-02-20"), date("2020-02-28"), dec!(1)),
        ])
        .unwrap();

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.first_date(), Some(date("2020-02-20")));
        assert_eq!(archive.last_date(), Some(date("2020-02-21")));
        assert_eq!(
            archive
                .record("GOLDM", date("2020-02-21"), date("2020-02-28"))
                .map(|r| r.close),
            Some(dec!(2))
        );
    }
}
