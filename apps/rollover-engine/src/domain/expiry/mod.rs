//! Expiry index: every expiry ever seen per symbol, and trading-day ordinals.
//!
//! The index is rebuilt from the whole raw archive whenever new data arrives.
//! It is the only place the selector learns which expiries exist, so a
//! contract that stops trading early still appears in the history.

mod history;
mod trading_days;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::record::{RawRecord, SnapshotArchive};

pub use history::ExpiryHistory;
pub use trading_days::{
    MAX_GAP_LOOKBACK_DAYS, TradingDayIndex, derive_trading_day_of_month, weekdays_inclusive,
};

/// Build the expiry history and trading-day index from raw records.
///
/// The trading day of month for each date is taken from the first record of
/// that date carrying a non-zero TDM; dates without one get a TDM derived
/// from their position in the month.
pub fn build_index<'a>(
    records: impl IntoIterator<Item = &'a RawRecord>,
) -> (ExpiryHistory, TradingDayIndex) {
    index_days(records, std::iter::empty())
}

/// Build the expiry index for a whole archive.
///
/// Every archived day counts as a trading day, including days on which no
/// record was loaded.
pub fn index_archive(archive: &SnapshotArchive) -> (ExpiryHistory, TradingDayIndex) {
    index_days(
        archive.records(),
        archive
            .snapshots()
            .map(|snapshot| (snapshot.date(), snapshot.trading_day_of_month())),
    )
}

fn index_days<'a>(
    records: impl IntoIterator<Item = &'a RawRecord>,
    days: impl IntoIterator<Item = (NaiveDate, Option<u32>)>,
) -> (ExpiryHistory, TradingDayIndex) {
    let mut expiries: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    let mut supplied_tdm: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();

    for (date, tdm) in days {
        dates.insert(date);
        if let Some(tdm) = tdm {
            supplied_tdm.insert(date, tdm);
        }
    }

    for record in records {
        dates.insert(record.trading_date);
        expiries
            .entry(record.symbol.clone())
            .or_default()
            .insert(record.expiry_date);
        if record.trading_day_of_month > 0 {
            let existing = supplied_tdm
                .entry(record.trading_date)
                .or_insert(record.trading_day_of_month);
            if *existing != record.trading_day_of_month {
                warn!(
                    date = %record.trading_date,
                    kept = *existing,
                    ignored = record.trading_day_of_month,
                    "Conflicting trading day of month within one snapshot"
                );
            }
        }
    }

    let mut day_tdm = derive_trading_day_of_month(dates.iter().copied());
    day_tdm.extend(supplied_tdm);

    let built_through = dates.last().copied();
    let index = TradingDayIndex::from_dates(dates);
    let history = ExpiryHistory::from_parts(expiries, &day_tdm, built_through);

    debug!(
        symbols = history.len(),
        trading_days = index.len(),
        built_through = ?built_through,
        "Built expiry index"
    );

    (history, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_build_index_collects_every_expiry() {
        let records = vec![
            RawRecord::new("GOLDM", date("2020-02-27"), date("2020-02-28"), dec!(1)).with_tdm(19),
            RawRecord::new("GOLDM", date("2020-02-28"), date("2020-02-28"), dec!(1)).with_tdm(20),
            RawRecord::new("GOLDM", date("2020-02-28"), date("2020-04-30"), dec!(1)).with_tdm(20),
            RawRecord::new("GOLDM", date("2020-03-02"), date("2020-03-31"), dec!(1)).with_tdm(1),
        ];

        let (history, index) = build_index(&records);

        assert_eq!(
            history.expiries("GOLDM"),
            &[date("2020-02-28"), date("2020-03-31"), date("2020-04-30")]
        );
        assert_eq!(history.tdm_at(date("2020-02-28")), Some(20));
        assert_eq!(history.tdm_at(date("2020-03-31")), None);
        assert_eq!(history.built_through(), Some(date("2020-03-02")));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_build_index_derives_missing_tdm() {
        let records = vec![
            RawRecord::new("GOLDM", date("2020-02-27"), date("2020-02-28"), dec!(1)),
            RawRecord::new("GOLDM", date("2020-02-28"), date("2020-02-28"), dec!(1)),
        ];

        let (history, _) = build_index(&records);

        assert_eq!(history.tdm_at(date("2020-02-28")), Some(2));
    }

    #[test]
    fn test_index_archive_counts_empty_days() {
        let mut archive = SnapshotArchive::from_records(vec![
            RawRecord::new("GOLDM", date("2020-03-02"), date("2020-03-31"), dec!(1)),
            RawRecord::new("GOLDM", date("2020-03-04"), date("2020-03-31"), dec!(1)),
        ])
        .unwrap();
        archive.ensure_day(date("2020-03-03"));
        if let Some(day) = archive.get_mut(date("2020-03-03")) {
            day.set_trading_day_of_month(2);
        }

        let (history, index) = index_archive(&archive);

        assert_eq!(index.len(), 3);
        assert_eq!(index.exact(date("2020-03-04")), Some(3));
        assert_eq!(history.built_through(), Some(date("2020-03-04")));
        assert_eq!(history.expiries("GOLDM"), &[date("2020-03-31")]);
    }

    #[test]
    fn test_build_index_empty() {
        let (history, index) = build_index(std::iter::empty());
        assert!(history.is_empty());
        assert!(index.is_empty());
        assert_eq!(history.built_through(), None);
    }
}
