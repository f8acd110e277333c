//! Per-policy daily selection rules.
//!
//! Each rule sees one symbol on one day and the label's [`RolloverState`],
//! and decides which record (if any) the continuous series takes.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use tracing::trace;

use super::policy::{CrossoverMetric, RolloverPolicy};
use super::state::RolloverState;
use crate::domain::expiry::{ExpiryHistory, TradingDayIndex};
use crate::domain::record::RawRecord;

/// Everything a rule may look at for one (symbol, day).
#[derive(Debug, Clone)]
pub struct SymbolDay<'a> {
    /// Underlying symbol.
    pub symbol: &'a str,
    /// Trading date.
    pub date: NaiveDate,
    /// Trading day of month of `date`, when known.
    pub trading_day_of_month: Option<u32>,
    /// The symbol's records for the day, ascending by expiry.
    pub records: Vec<&'a RawRecord>,
    /// Expiry history for all symbols.
    pub history: &'a ExpiryHistory,
    /// Trading-day ordinals.
    pub index: &'a TradingDayIndex,
}

impl<'a> SymbolDay<'a> {
    /// Today's record for `expiry`.
    #[must_use]
    pub fn record(&self, expiry: NaiveDate) -> Option<&'a RawRecord> {
        self.records.iter().copied().find(|r| r.expiry_date == expiry)
    }

    /// Expiries traded today.
    #[must_use]
    pub fn available_expiries(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.expiry_date).collect()
    }
}

/// A change of contract decided by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Roll {
    /// Expiry rolled away from.
    pub from: Option<NaiveDate>,
    /// Expiry rolled to.
    pub to: NaiveDate,
    /// Current-to-next metric ratio for crossover rolls.
    pub observed_ratio: Option<f64>,
}

/// What a rule decided for one (symbol, day).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Record taken into the series.
    pub selected: Option<RawRecord>,
    /// Expiry the label follows after today's decision.
    pub implied_current_expiry: Option<NaiveDate>,
    /// Roll decided today.
    pub roll: Option<Roll>,
    /// The expected contract was missing and the next one was taken.
    pub next_selected: Option<(NaiveDate, NaiveDate)>,
}

/// Shared contract of the rollover policies.
pub trait RolloverRule: Send + Sync {
    /// Decide today's record and update the label's state.
    fn select_day(&self, day: &SymbolDay<'_>, state: &mut RolloverState) -> RuleOutcome;
}

impl RolloverPolicy {
    /// The rule implementing this policy.
    #[must_use]
    pub fn rule(&self) -> Box<dyn RolloverRule> {
        match self {
            Self::FixedOffset { delta } => Box::new(FixedOffsetRule { delta: *delta }),
            Self::VolumeCrossover => Box::new(CrossoverRule {
                metric: CrossoverMetric::Volume,
            }),
            Self::OpenInterestCrossover => Box::new(CrossoverRule {
                metric: CrossoverMetric::OpenInterest,
            }),
        }
    }
}

/// Roll `delta` trading days ahead of expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffsetRule {
    /// Trading-day offset.
    pub delta: u32,
}

impl FixedOffsetRule {
    fn roll_due(&self, day: &SymbolDay<'_>, state: &RolloverState) -> bool {
        let Some(current) = state.current_expiry else {
            return true;
        };
        if current <= day.date {
            return true;
        }
        match (day.history.tdm_at(current), day.trading_day_of_month) {
            (Some(at_expiry), Some(today)) => {
                i64::from(at_expiry) - i64::from(today) < i64::from(self.delta)
            }
            _ => false,
        }
    }

    /// First expiry, not earlier than the one held, that is still ahead of
    /// `date` by more than `delta` trading days.
    fn qualifying_expiry(&self, day: &SymbolDay<'_>, current: Option<NaiveDate>) -> Option<NaiveDate> {
        day.history
            .expiries(day.symbol)
            .iter()
            .copied()
            .filter(|expiry| current.is_none_or(|c| *expiry >= c))
            .find(|expiry| {
                *expiry > day.date
                    && day
                        .index
                        .trading_days_between(day.date, *expiry)
                        .is_some_and(|n| n > self.delta)
            })
    }
}

impl RolloverRule for FixedOffsetRule {
    fn select_day(&self, day: &SymbolDay<'_>, state: &mut RolloverState) -> RuleOutcome {
        let mut roll = None;

        if self.roll_due(day, state) {
            match self.qualifying_expiry(day, state.current_expiry) {
                Some(target) => {
                    if let Some(from) = state.roll_to(target) {
                        roll = Some(Roll {
                            from,
                            to: target,
                            observed_ratio: None,
                        });
                    }
                }
                None => trace!(
                    symbol = day.symbol,
                    date = %day.date,
                    current = ?state.current_expiry,
                    "No qualifying expiry, retaining current"
                ),
            }
        }

        RuleOutcome {
            selected: state
                .current_expiry
                .and_then(|expiry| day.record(expiry))
                .cloned(),
            implied_current_expiry: state.current_expiry,
            roll,
            next_selected: None,
        }
    }
}

/// Roll when the next contract overtakes the current one on a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverRule {
    /// Metric compared.
    pub metric: CrossoverMetric,
}

impl RolloverRule for CrossoverRule {
    fn select_day(&self, day: &SymbolDay<'_>, state: &mut RolloverState) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        if state.current_expiry.is_none() {
            let first = day
                .history
                .expiries(day.symbol)
                .iter()
                .copied()
                .find(|expiry| *expiry >= day.date);
            if let Some(first) = first {
                state.roll_to(first);
                outcome.roll = Some(Roll {
                    from: None,
                    to: first,
                    observed_ratio: None,
                });
            }
        } else if state.rollover_pending {
            // Crossover seen on the previous trading day takes effect now.
            state.rollover_pending = false;
            if let Some(next) = state
                .current_expiry
                .and_then(|current| day.history.next_after(day.symbol, current))
            {
                state.roll_to(next);
            }
        }

        let Some(current) = state.current_expiry else {
            return outcome;
        };
        outcome.implied_current_expiry = Some(current);

        let next = day.history.next_after(day.symbol, current);
        let current_record = day.record(current);
        let next_record = next.and_then(|expiry| day.record(expiry));

        match (current_record, next_record) {
            (Some(current_record), Some(next_record)) => {
                outcome.selected = Some(current_record.clone());
                if self.metric.value(current_record) < self.metric.value(next_record) {
                    state.rollover_pending = true;
                    outcome.roll = Some(Roll {
                        from: Some(current),
                        to: next_record.expiry_date,
                        observed_ratio: current_record
                            .close
                            .checked_div(next_record.close)
                            .and_then(|ratio| ratio.to_f64()),
                    });
                }
            }
            (Some(current_record), None) => {
                outcome.selected = Some(current_record.clone());
            }
            (None, Some(next_record)) => {
                let target = next_record.expiry_date;
                state.roll_to(target);
                outcome.implied_current_expiry = Some(target);
                outcome.selected = Some(next_record.clone());
                outcome.next_selected = Some((current, target));
                outcome.roll = Some(Roll {
                    from: Some(current),
                    to: target,
                    observed_ratio: None,
                });
            }
            (None, None) => {}
        }

        outcome
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

    fn record(day: &str, expiry: &str, volume: u64) -> RawRecord {
        RawRecord::new("GOLDM", date(day), date(expiry), dec!(100)).with_activity(volume, volume)
    }

    fn day_of<'a>(
        records: &'a [RawRecord],
        day: &str,
        history: &'a ExpiryHistory,
        index: &'a TradingDayIndex,
    ) -> SymbolDay<'a> {
        SymbolDay {
            symbol: "GOLDM",
            date: date(day),
            trading_day_of_month: records
                .iter()
                .find(|r| r.trading_date == date(day))
                .map(|r| r.trading_day_of_month)
                .filter(|t| *t > 0),
            records: records.iter().filter(|r| r.trading_date == date(day)).collect(),
            history,
            index,
        }
    }

    #[test]
    fn test_fixed_offset_initial_selection_is_front_month() {
        let records = vec![
            record("2020-02-20", "2020-02-28", 1).with_tdm(14),
            record("2020-02-20", "2020-03-31", 1).with_tdm(14),
        ];
        let (history, index) = build_index(&records);
        let rule = FixedOffsetRule { delta: 0 };
        let mut state = RolloverState::default();

        let outcome = rule.select_day(&day_of(&records, "2020-02-20", &history, &index), &mut state);

        assert_eq!(outcome.selected.map(|r| r.expiry_date), Some(date("2020-02-28")));
        assert_eq!(outcome.roll.map(|r| r.from), Some(None));
    }

    #[test]
    fn test_fixed_offset_retains_when_nothing_qualifies() {
        let records = vec![record("2020-02-28", "2020-02-28", 1).with_tdm(20)];
        let (history, index) = build_index(&records);
        let rule = FixedOffsetRule { delta: 0 };
        let mut state = RolloverState {
            current_expiry: Some(date("2020-02-28")),
            ..RolloverState::default()
        };

        let outcome = rule.select_day(&day_of(&records, "2020-02-28", &history, &index), &mut state);

        assert_eq!(state.current_expiry, Some(date("2020-02-28")));
        assert!(outcome.roll.is_none());
        assert_eq!(outcome.selected.map(|r| r.expiry_date), Some(date("2020-02-28")));
    }

    #[test]
    fn test_crossover_rolls_on_following_day() {
        let records = vec![
            record("2020-02-24", "2020-02-28", 50),
            record("2020-02-24", "2020-03-31", 60),
            record("2020-02-25", "2020-02-28", 40),
            record("2020-02-25", "2020-03-31", 70),
        ];
        let (history, index) = build_index(&records);
        let rule = CrossoverRule {
            metric: CrossoverMetric::Volume,
        };
        let mut state = RolloverState::default();

        let first = rule.select_day(&day_of(&records, "2020-02-24", &history, &index), &mut state);
        assert_eq!(first.selected.map(|r| r.expiry_date), Some(date("2020-02-28")));
        assert!(state.rollover_pending);
        assert_eq!(first.roll.and_then(|r| r.observed_ratio), Some(1.0));

        let second = rule.select_day(&day_of(&records, "2020-02-25", &history, &index), &mut state);
        assert_eq!(second.selected.map(|r| r.expiry_date), Some(date("2020-03-31")));
        assert!(!state.rollover_pending);
        assert_eq!(state.previous_expiry, Some(date("2020-02-28")));
    }

    #[test]
    fn test_crossover_takes_next_when_current_missing() {
        let records = vec![
            record("2020-02-24", "2020-02-28", 50),
            record("2020-02-24", "2020-03-31", 10),
            record("2020-02-25", "2020-03-31", 10),
        ];
        let (history, index) = build_index(&records);
        let rule = CrossoverRule {
            metric: CrossoverMetric::OpenInterest,
        };
        let mut state = RolloverState::default();

        rule.select_day(&day_of(&records, "2020-02-24", &history, &index), &mut state);
        let outcome = rule.select_day(&day_of(&records, "2020-02-25", &history, &index), &mut state);

        assert_eq!(
            outcome.next_selected,
            Some((date("2020-02-28"), date("2020-03-31")))
        );
        assert_eq!(state.current_expiry, Some(date("2020-03-31")));
    }

    #[test]
    fn test_crossover_with_both_missing_selects_nothing() {
        let records = vec![
            record("2020-02-24", "2020-02-28", 50),
            record("2020-02-24", "2020-03-31", 10),
            record("2020-02-25", "2020-04-30", 10),
        ];
        let (history, index) = build_index(&records);
        let rule = CrossoverRule {
            metric: CrossoverMetric::Volume,
        };
        let mut state = RolloverState::default();

        rule.select_day(&day_of(&records, "2020-02-24", &history, &index), &mut state);
        let outcome = rule.select_day(&day_of(&records, "2020-02-25", &history, &index), &mut state);

        assert!(outcome.selected.is_none());
        assert_eq!(outcome.implied_current_expiry, Some(date("2020-02-28")));
    }
}
