//! Day-by-day rollover selection across symbols and policy variants.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::events::{ExceptionSet, ExceptionStatus, NextSelected, NoneSelected, RolloverEvent};
use super::policy::{RolloverPolicy, series_label};
use super::rules::{RolloverRule, SymbolDay};
use super::state::{RolloverBook, RolloverState};
use crate::domain::expiry::{ExpiryHistory, TradingDayIndex};
use crate::domain::record::{DailySnapshot, RawRecord, SnapshotArchive};
use crate::domain::series::ContinuousSeries;

/// Selections made for one trading day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaySelection {
    /// (label, record) pairs taken into the series.
    pub selected: Vec<(String, RawRecord)>,
    /// Labels for which no record was taken.
    pub none_selected: Vec<NoneSelected>,
    /// Next contract taken ahead of schedule.
    pub next_selected: Vec<NextSelected>,
    /// Rolls decided today.
    pub events: Vec<RolloverEvent>,
}

/// Counters for a selection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    /// Trading days walked.
    pub days: usize,
    /// Records taken into the series.
    pub selected: usize,
    /// None-selected exceptions raised.
    pub none_selected: usize,
    /// Next-contract selections.
    pub next_selected: usize,
    /// Rolls decided.
    pub rollovers: usize,
}

/// Output of a full selection pass: the draft series and its audit trail.
#[derive(Debug, Clone, Default)]
pub struct DraftSeries {
    /// Draft continuous series.
    pub series: ContinuousSeries,
    /// Days with no selection.
    pub exceptions: ExceptionSet,
    /// Next-contract selections.
    pub next_selected: Vec<NextSelected>,
    /// Rollover events.
    pub events: Vec<RolloverEvent>,
    /// Counters.
    pub stats: SelectionStats,
}

struct Variant {
    policy: RolloverPolicy,
    rule: Box<dyn RolloverRule>,
    book: RolloverBook,
}

/// Walks daily snapshots in date order and builds one series per
/// (symbol, policy variant).
///
/// State lives in one [`RolloverBook`] per variant, so several offsets can be
/// produced in a single traversal.
pub struct RolloverSelector<'a> {
    history: &'a ExpiryHistory,
    index: &'a TradingDayIndex,
    variants: Vec<Variant>,
    symbols: Option<BTreeSet<String>>,
    tracked: BTreeSet<String>,
    last_date: Option<NaiveDate>,
}

impl<'a> RolloverSelector<'a> {
    /// Create a selector running every policy in `policies`.
    #[must_use]
    pub fn new(
        history: &'a ExpiryHistory,
        index: &'a TradingDayIndex,
        policies: &[RolloverPolicy],
    ) -> Self {
        let variants = policies
            .iter()
            .map(|policy| Variant {
                policy: *policy,
                rule: policy.rule(),
                book: RolloverBook::new(),
            })
            .collect();

        Self {
            history,
            index,
            variants,
            symbols: None,
            tracked: BTreeSet::new(),
            last_date: None,
        }
    }

    /// Restrict selection to the given symbols. An empty list keeps all.
    #[must_use]
    pub fn with_symbols(mut self, symbols: &[String]) -> Self {
        self.symbols = if symbols.is_empty() {
            None
        } else {
            Some(symbols.iter().cloned().collect())
        };
        self
    }

    /// Output label for a symbol under a variant.
    #[must_use]
    pub fn label(&self, symbol: &str, policy: &RolloverPolicy) -> String {
        series_label(symbol, policy, self.variants.len())
    }

    /// State held for a (policy, label).
    #[must_use]
    pub fn state(&self, policy: &RolloverPolicy, label: &str) -> Option<&RolloverState> {
        self.variants
            .iter()
            .find(|v| v.policy == *policy)
            .and_then(|v| v.book.state(label))
    }

    /// Select records for one trading day.
    ///
    /// Days must be fed in ascending order; a day not after the previous one
    /// is ignored. A symbol seen on an earlier day that has no rows today is
    /// still walked (and reported as none-selected) until its last known
    /// expiry has passed.
    pub fn select_day(&mut self, snapshot: &DailySnapshot) -> DaySelection {
        let date = snapshot.date();
        let mut out = DaySelection::default();

        if self.last_date.is_some_and(|last| date <= last) {
            debug!(date = %date, "Skipping out-of-order snapshot");
            return out;
        }
        self.last_date = Some(date);

        let variant_count = self.variants.len();
        let tdm = snapshot.trading_day_of_month();

        for symbol in snapshot.symbols() {
            if self.symbols.as_ref().is_none_or(|keep| keep.contains(symbol)) {
                self.tracked.insert(symbol.to_string());
            }
        }
        let history = self.history;
        let symbols: Vec<String> = self
            .tracked
            .iter()
            .filter(|symbol| {
                snapshot.records_for(symbol).next().is_some()
                    || history.expiries(symbol).last().is_some_and(|last| *last >= date)
            })
            .cloned()
            .collect();

        for symbol in &symbols {
            let symbol = symbol.as_str();
            let day = SymbolDay {
                symbol,
                date,
                trading_day_of_month: tdm,
                records: snapshot.records_for(symbol).collect(),
                history: self.history,
                index: self.index,
            };

            for variant in &mut self.variants {
                let label = series_label(symbol, &variant.policy, variant_count);
                let state = variant.book.state_mut(&label);
                let outcome = variant.rule.select_day(&day, state);

                if let Some(roll) = outcome.roll {
                    out.events.push(RolloverEvent {
                        label: label.clone(),
                        date,
                        from_expiry: roll.from,
                        to_expiry: roll.to,
                        observed_ratio: roll.observed_ratio,
                    });
                }

                if let Some((current_expiry, selected_expiry)) = outcome.next_selected {
                    out.next_selected.push(NextSelected {
                        label: label.clone(),
                        date,
                        current_expiry,
                        selected_expiry,
                    });
                }

                match outcome.selected {
                    Some(record) => out.selected.push((label, record)),
                    None => out.none_selected.push(NoneSelected {
                        label,
                        symbol: symbol.to_string(),
                        date,
                        implied_current_expiry: outcome.implied_current_expiry,
                        available_expiries: day.available_expiries(),
                        status: ExceptionStatus::Open,
                    }),
                }
            }
        }

        out
    }

    /// Run a full pass over an archive.
    pub fn run(mut self, archive: &SnapshotArchive) -> DraftSeries {
        let mut draft = DraftSeries::default();

        for snapshot in archive.snapshots() {
            let day = self.select_day(snapshot);
            draft.stats.days += 1;
            draft.stats.selected += day.selected.len();
            draft.stats.none_selected += day.none_selected.len();
            draft.stats.next_selected += day.next_selected.len();
            draft.stats.rollovers += day.events.len();

            for (label, record) in day.selected {
                draft.series.insert(&label, record);
            }
            for exception in day.none_selected {
                draft.series.ensure_label(&exception.label);
                draft.exceptions.insert(exception);
            }
            draft.next_selected.extend(day.next_selected);
            draft.events.extend(day.events);
        }

        info!(
            days = draft.stats.days,
            selected = draft.stats.selected,
            none_selected = draft.stats.none_selected,
            rollovers = draft.stats.rollovers,
            "Built draft continuous series"
        );

        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expiry::build_index;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn archive() -> SnapshotArchive {
        let mut records = Vec::new();
        for (day, tdm) in [("2020-02-26", 18), ("2020-02-27", 19), ("2020-02-28", 20), ("2020-03-02", 1)] {
            for expiry in ["2020-02-28", "2020-03-31"] {
                if date(expiry) >= date(day) {
                    records.push(
                        RawRecord::new("GOLDM", date(day), date(expiry), dec!(100)).with_tdm(tdm),
                    );
                }
            }
        }
        SnapshotArchive::from_records(records).unwrap()
    }

    #[test]
    fn test_multiple_offsets_get_suffixed_labels() {
        let archive = archive();
        let (history, index) = build_index(archive.records());
        let policies = [
            RolloverPolicy::FixedOffset { delta: 0 },
            RolloverPolicy::FixedOffset { delta: 2 },
        ];

        let draft = RolloverSelector::new(&history, &index, &policies).run(&archive);

        let labels: Vec<&str> = draft.series.labels().collect();
        assert_eq!(labels, vec!["GOLDM-0", "GOLDM-II"]);

        let expiry = |label: &str, day: &str| draft.series.get(label, date(day)).map(|r| r.expiry_date);
        assert_eq!(expiry("GOLDM-0", "2020-02-27"), Some(date("2020-02-28")));
        assert_eq!(expiry("GOLDM-0", "2020-02-28"), Some(date("2020-03-31")));
        assert_eq!(expiry("GOLDM-II", "2020-02-26"), Some(date("2020-02-28")));
        assert_eq!(expiry("GOLDM-II", "2020-02-27"), Some(date("2020-03-31")));
        assert!(draft.exceptions.is_empty());
    }

    #[test]
    fn test_symbol_filter() {
        let archive = archive();
        let (history, index) = build_index(archive.records());
        let policies = [RolloverPolicy::FixedOffset { delta: 0 }];

        let draft = RolloverSelector::new(&history, &index, &policies)
            .with_symbols(&["SILVERM".to_string()])
            .run(&archive);

        assert!(draft.series.is_empty());
        assert_eq!(draft.stats.days, 4);
    }

    #[test]
    fn test_out_of_order_day_is_ignored() {
        let archive = archive();
        let (history, index) = build_index(archive.records());
        let policies = [RolloverPolicy::VolumeCrossover];
        let mut selector = RolloverSelector::new(&history, &index, &policies);

        let later = archive.get(date("2020-02-28")).unwrap();
        let earlier = archive.get(date("2020-02-27")).unwrap();
        assert_eq!(selector.select_day(later).selected.len(), 1);
        assert!(selector.select_day(earlier).selected.is_empty());
        assert!(selector.state(&policies[0], "GOLDM").is_some());
    }

    #[test]
    fn test_absent_symbol_is_reported_until_last_expiry() {
        let mut archive = archive();
        archive.insert(
            DailySnapshot::new(
                date("2020-03-03"),
                vec![RawRecord::new("SILVERM", date("2020-03-03"), date("2020-03-31"), dec!(1))],
            )
            .unwrap(),
        );
        archive.ensure_day(date("2020-03-04"));
        archive.ensure_day(date("2020-04-01"));
        let (history, index) = build_index(archive.records());
        let policies = [RolloverPolicy::FixedOffset { delta: 0 }];

        let draft = RolloverSelector::new(&history, &index, &policies).run(&archive);

        for day in ["2020-03-03", "2020-03-04"] {
            let exception = draft.exceptions.get("GOLDM", date(day)).unwrap();
            assert_eq!(exception.implied_current_expiry, Some(date("2020-03-31")));
            assert!(exception.available_expiries.is_empty());
        }
        // Past the last known expiry the symbol is no longer followed.
        assert!(draft.exceptions.get("GOLDM", date("2020-04-01")).is_none());
        assert!(draft.exceptions.get("SILVERM", date("2020-03-04")).is_some());
        assert_eq!(draft.stats.days, 7);
    }
}
