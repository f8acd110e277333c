//! Per-symbol expiry history.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::trading_days::MAX_GAP_LOOKBACK_DAYS;

/// Ordered list of every expiry ever observed for each symbol, plus the
/// trading day of month on which each expiry date fell.
///
/// `tdm_at_expiry` holds `None` for expiries whose date never appeared as a
/// trading day in the data (including expiries still in the future).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryHistory {
    expiries: BTreeMap<String, Vec<NaiveDate>>,
    tdm_at_expiry: BTreeMap<NaiveDate, Option<u32>>,
    built_through: Option<NaiveDate>,
}

impl ExpiryHistory {
    /// Assemble a history from per-symbol expiry sets.
    ///
    /// `day_tdm` supplies the trading day of month for every known trading
    /// date. An expiry that was not a trading day inherits the TDM of the
    /// nearest earlier trading day at most [`MAX_GAP_LOOKBACK_DAYS`] calendar
    /// days back (or of the first one, if it precedes all data). An expiry
    /// after `built_through`, or inside a longer data gap, stays unresolved.
    #[must_use]
    pub fn from_parts(
        expiries: BTreeMap<String, BTreeSet<NaiveDate>>,
        day_tdm: &BTreeMap<NaiveDate, u32>,
        built_through: Option<NaiveDate>,
    ) -> Self {
        let mut tdm_at_expiry = BTreeMap::new();
        let expiries = expiries
            .into_iter()
            .map(|(symbol, set)| {
                for expiry in &set {
                    tdm_at_expiry.insert(*expiry, resolve_tdm(*expiry, day_tdm, built_through));
                }
                (symbol, set.into_iter().collect())
            })
            .collect();

        Self {
            expiries,
            tdm_at_expiry,
            built_through,
        }
    }

    /// Reassemble a persisted history whose TDMs are already resolved.
    #[must_use]
    pub fn from_resolved(
        expiries: BTreeMap<String, BTreeSet<NaiveDate>>,
        tdm_at_expiry: BTreeMap<NaiveDate, Option<u32>>,
        built_through: Option<NaiveDate>,
    ) -> Self {
        Self {
            expiries: expiries
                .into_iter()
                .map(|(symbol, set)| (symbol, set.into_iter().collect()))
                .collect(),
            tdm_at_expiry,
            built_through,
        }
    }

    /// Expiries for a symbol, strictly increasing. Empty for unknown symbols.
    #[must_use]
    pub fn expiries(&self, symbol: &str) -> &[NaiveDate] {
        self.expiries.get(symbol).map_or(&[] as &[NaiveDate], Vec::as_slice)
    }

    /// Known symbols, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.expiries.keys().map(String::as_str)
    }

    /// Whether the symbol has any expiry.
    #[must_use]
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.expiries.contains_key(symbol)
    }

    /// Trading day of month on an expiry date, when it was a trading day.
    #[must_use]
    pub fn tdm_at(&self, expiry: NaiveDate) -> Option<u32> {
        self.tdm_at_expiry.get(&expiry).copied().flatten()
    }

    /// Every (expiry, tdm) pair, ordered by expiry.
    pub fn tdm_entries(&self) -> impl Iterator<Item = (NaiveDate, Option<u32>)> + '_ {
        self.tdm_at_expiry.iter().map(|(d, t)| (*d, *t))
    }

    /// First expiry strictly after `after`.
    #[must_use]
    pub fn next_after(&self, symbol: &str, after: NaiveDate) -> Option<NaiveDate> {
        let list = self.expiries(symbol);
        list.get(list.partition_point(|e| *e <= after)).copied()
    }

    /// Last expiry strictly before `before`.
    #[must_use]
    pub fn previous_before(&self, symbol: &str, before: NaiveDate) -> Option<NaiveDate> {
        let list = self.expiries(symbol);
        let idx = list.partition_point(|e| *e < before);
        idx.checked_sub(1).and_then(|i| list.get(i)).copied()
    }

    /// Whether `expiry` is the symbol's last known expiry.
    #[must_use]
    pub fn is_last(&self, symbol: &str, expiry: NaiveDate) -> bool {
        self.expiries(symbol).last() == Some(&expiry)
    }

    /// Latest trading date the history covers.
    #[must_use]
    pub const fn built_through(&self) -> Option<NaiveDate> {
        self.built_through
    }

    /// Whether data newer than the history exists.
    #[must_use]
    pub fn is_stale(&self, latest_available: Option<NaiveDate>) -> bool {
        match (self.built_through, latest_available) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(built), Some(latest)) => latest > built,
        }
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    /// Whether no symbol is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Flattened (symbol, expiry) rows in symbol then expiry order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, NaiveDate)> {
        self.expiries
            .iter()
            .flat_map(|(symbol, list)| list.iter().map(move |e| (symbol.as_str(), *e)))
    }
}

fn resolve_tdm(
    expiry: NaiveDate,
    day_tdm: &BTreeMap<NaiveDate, u32>,
    built_through: Option<NaiveDate>,
) -> Option<u32> {
    if built_through.is_none_or(|last| expiry > last) {
        return None;
    }
    match day_tdm.range(..=expiry).next_back() {
        Some((day, tdm)) => ((expiry - *day).num_days() <= MAX_GAP_LOOKBACK_DAYS).then_some(*tdm),
        None => day_tdm.values().next().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn goldm() -> ExpiryHistory {
        let mut expiries = BTreeMap::new();
        expiries.insert(
            "GOLDM".to_string(),
            [date("2020-03-31"), date("2020-02-28"), date("2020-04-30")]
                .into_iter()
                .collect::<BTreeSet<_>>(),
        );
        let mut tdm = BTreeMap::new();
        tdm.insert(date("2020-02-27"), 19);
        tdm.insert(date("2020-02-28"), 20);
        tdm.insert(date("2020-03-02"), 1);
        tdm.insert(date("2020-03-03"), 2);
        ExpiryHistory::from_parts(expiries, &tdm, Some(date("2020-03-03")))
    }

    #[test]
    fn test_expiries_are_sorted() {
        let history = goldm();
        assert_eq!(
            history.expiries("GOLDM"),
            &[date("2020-02-28"), date("2020-03-31"), date("2020-04-30")]
        );
        assert!(history.expiries("SILVERM").is_empty());
    }

    #[test]
    fn test_neighbours() {
        let history = goldm();
        assert_eq!(history.next_after("GOLDM", date("2020-02-28")), Some(date("2020-03-31")));
        assert_eq!(history.next_after("GOLDM", date("2020-03-15")), Some(date("2020-03-31")));
        assert_eq!(history.next_after("GOLDM", date("2020-04-30")), None);
        assert_eq!(history.previous_before("GOLDM", date("2020-03-31")), Some(date("2020-02-28")));
        assert_eq!(history.previous_before("GOLDM", date("2020-02-28")), None);
        assert!(history.is_last("GOLDM", date("2020-04-30")));
    }

    #[test]
    fn test_tdm_at_expiry() {
        let history = goldm();
        assert_eq!(history.tdm_at(date("2020-02-28")), Some(20));
        assert_eq!(history.tdm_at(date("2020-03-31")), None);
        assert_eq!(history.tdm_at(date("2019-01-01")), None);
    }

    #[test]
    fn test_tdm_walks_back_over_holidays() {
        let mut expiries = BTreeMap::new();
        expiries.insert(
            "GOLDM".to_string(),
            [date("2020-02-29"), date("2020-02-01")].into_iter().collect::<BTreeSet<_>>(),
        );
        let mut tdm = BTreeMap::new();
        tdm.insert(date("2020-02-27"), 19);
        tdm.insert(date("2020-02-28"), 20);
        tdm.insert(date("2020-03-02"), 1);
        let history = ExpiryHistory::from_parts(expiries, &tdm, Some(date("2020-03-02")));

        // Saturday expiry inherits Friday's TDM.
        assert_eq!(history.tdm_at(date("2020-02-29")), Some(20));
        assert_eq!(history.tdm_at(date("2020-02-01")), Some(19));
    }

    #[test]
    fn test_tdm_is_unresolved_inside_long_gap() {
        let mut expiries = BTreeMap::new();
        expiries.insert(
            "GOLDM".to_string(),
            [date("2020-06-30"), date("2020-04-10"), date("2020-04-11")]
                .into_iter()
                .collect::<BTreeSet<_>>(),
        );
        let mut tdm = BTreeMap::new();
        tdm.insert(date("2020-03-31"), 22);
        tdm.insert(date("2020-07-10"), 8);
        let history = ExpiryHistory::from_parts(expiries, &tdm, Some(date("2020-07-10")));

        assert_eq!(history.tdm_at(date("2020-06-30")), None);
        assert_eq!(history.tdm_at(date("2020-04-10")), Some(22));
        assert_eq!(history.tdm_at(date("2020-04-11")), None);
    }

    #[test]
    fn test_staleness() {
        let history = goldm();
        assert!(!history.is_stale(Some(date("2020-03-03"))));
        assert!(history.is_stale(Some(date("2020-03-04"))));
        assert!(!history.is_stale(None));
        assert!(ExpiryHistory::default().is_stale(Some(date("2020-01-01"))));
    }

    #[test]
    fn test_json_round_trip_keeps_unresolved_tdm() {
        let history = goldm();
        let json = serde_json::to_string(&history).unwrap();
        let back: ExpiryHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
        assert_eq!(back.tdm_at(date("2020-03-31")), None);
    }
}
