//! Trading-day ordinals and trading-day-of-month derivation.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

/// How far back a non-trading date may look for the nearest earlier trading
/// day before the lookup is declared unresolvable.
pub const MAX_GAP_LOOKBACK_DAYS: i64 = 10;

/// Maps calendar dates to 1-based trading-day ordinals.
///
/// Known trading dates get consecutive ordinals in ascending order. A date
/// that is not itself a trading day resolves to the ordinal of the nearest
/// earlier trading day, as long as that day is at most
/// [`MAX_GAP_LOOKBACK_DAYS`] calendar days away. Dates after the last known
/// trading day are extrapolated by counting weekdays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingDayIndex {
    dates: Vec<NaiveDate>,
}

impl TradingDayIndex {
    /// Build an index from trading dates in any order; duplicates collapse.
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    /// Number of known trading days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the index knows no trading day.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Known trading dates, ascending.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Ordinal of a known trading day.
    #[must_use]
    pub fn exact(&self, date: NaiveDate) -> Option<u32> {
        self.dates
            .binary_search(&date)
            .ok()
            .and_then(|idx| u32::try_from(idx + 1).ok())
    }

    /// Trading date carrying a given ordinal.
    #[must_use]
    pub fn date_of(&self, ordinal: u32) -> Option<NaiveDate> {
        let idx = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.dates.get(idx).copied()
    }

    /// Ordinal for any calendar date, or `None` when it cannot be resolved.
    #[must_use]
    pub fn ordinal(&self, date: NaiveDate) -> Option<u32> {
        let known = self.dates.partition_point(|d| *d <= date);
        if known == 0 {
            return None;
        }
        let nearest = self.dates[known - 1];
        let nearest_ordinal = u32::try_from(known).ok()?;

        if nearest == date {
            return Some(nearest_ordinal);
        }

        if known == self.dates.len() {
            // Beyond the last trading day: count weekdays forward.
            let extra = weekdays_inclusive(nearest, date).saturating_sub(1);
            return Some(nearest_ordinal + extra);
        }

        if (date - nearest).num_days() <= MAX_GAP_LOOKBACK_DAYS {
            Some(nearest_ordinal)
        } else {
            None
        }
    }

    /// Inclusive count of trading days from `start` to `end`.
    ///
    /// Returns zero when `end` precedes `start`, `None` when either end is
    /// unresolvable.
    #[must_use]
    pub fn trading_days_between(&self, start: NaiveDate, end: NaiveDate) -> Option<u32> {
        let from = self.ordinal(start)?;
        let to = self.ordinal(end)?;
        Some(if to < from { 0 } else { to - from + 1 })
    }
}

/// Weekdays (Monday to Friday) in `[start, end]`.
#[must_use]
pub fn weekdays_inclusive(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let total = (end - start).num_days() + 1;
    let full_weeks = total / 7;
    let mut count = full_weeks * 5;

    let mut day = start.weekday();
    for _ in 0..(total % 7) {
        if !matches!(day, Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        day = day.succ();
    }
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Number each date by its position within its calendar month.
///
/// The counter restarts at 1 on the first trading date of every month.
pub fn derive_trading_day_of_month(
    dates: impl IntoIterator<Item = NaiveDate>,
) -> BTreeMap<NaiveDate, u32> {
    let mut sorted: Vec<NaiveDate> = dates.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = BTreeMap::new();
    let mut month = None;
    let mut counter = 0;
    for date in sorted {
        let key = (date.year(), date.month());
        if month != Some(key) {
            month = Some(key);
            counter = 0;
        }
        counter += 1;
        out.insert(date, counter);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn february() -> TradingDayIndex {
        // Trading days Wed 2020-02-26 .. Tue 2020-03-03
        TradingDayIndex::from_dates(
            ["2020-02-27", "2020-02-26", "2020-02-28", "2020-03-02", "2020-03-03"]
                .into_iter()
                .map(date),
        )
    }

    #[test_case("2020-02-26", Some(1) ; "first trading day")]
    #[test_case("2020-03-03", Some(5) ; "last trading day")]
    #[test_case("2020-02-29", Some(3) ; "weekend resolves to friday")]
    #[test_case("2020-02-25", None ; "before first trading day")]
    #[test_case("2020-03-04", Some(6) ; "extrapolated wednesday")]
    #[test_case("2020-03-09", Some(9) ; "extrapolated across weekend")]
    fn test_ordinal(day: &str, expected: Option<u32>) {
        assert_eq!(february().ordinal(date(day)), expected);
    }

    #[test]
    fn test_long_gap_is_unresolvable() {
        let index = TradingDayIndex::from_dates([date("2020-01-01"), date("2020-02-03")]);
        assert_eq!(index.ordinal(date("2020-01-10")), Some(1));
        assert_eq!(index.ordinal(date("2020-01-20")), None);
    }

    #[test]
    fn test_trading_days_between() {
        let index = february();
        assert_eq!(index.trading_days_between(date("2020-02-27"), date("2020-02-28")), Some(2));
        assert_eq!(index.trading_days_between(date("2020-02-28"), date("2020-02-28")), Some(1));
        assert_eq!(index.trading_days_between(date("2020-03-02"), date("2020-02-28")), Some(0));
        assert_eq!(index.trading_days_between(date("2020-02-01"), date("2020-02-28")), None);
    }

    #[test]
    fn test_date_of_round_trips() {
        let index = february();
        assert_eq!(index.date_of(3), Some(date("2020-02-28")));
        assert_eq!(index.date_of(0), None);
        assert_eq!(index.date_of(6), None);
        assert_eq!(index.exact(date("2020-02-29")), None);
    }

    #[test_case("2020-03-02", "2020-03-06", 5 ; "one week")]
    #[test_case("2020-02-28", "2020-03-02", 2 ; "friday to monday")]
    #[test_case("2020-02-29", "2020-03-01", 0 ; "weekend only")]
    #[test_case("2020-03-06", "2020-03-02", 0 ; "reversed")]
    #[test_case("2020-03-02", "2020-03-31", 22 ; "whole month")]
    fn test_weekdays_inclusive(start: &str, end: &str, expected: u32) {
        assert_eq!(weekdays_inclusive(date(start), date(end)), expected);
    }

    #[test]
    fn test_derive_trading_day_of_month_restarts_monthly() {
        let tdm = derive_trading_day_of_month(
            ["2020-02-27", "2020-02-28", "2020-03-02", "2020-03-03", "2020-02-26"]
                .into_iter()
                .map(date),
        );
        assert_eq!(tdm[&date("2020-02-26")], 1);
        assert_eq!(tdm[&date("2020-02-28")], 3);
        assert_eq!(tdm[&date("2020-03-02")], 1);
        assert_eq!(tdm[&date("2020-03-03")], 2);
    }
}
