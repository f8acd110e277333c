//! Gap-fill reconciliation against a persisted series.
//!
//! Works per label and per missed expiry: raw rows that never made it into
//! the series are grouped by expiry, bracketed by the nearest persisted
//! records before and after, and re-admitted only when the raw rows
//! outnumber what the series already holds in that stretch.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::change_log::{ChangeAction, ChangeLog};
use crate::domain::record::{RawRecord, SnapshotArchive};
use crate::domain::series::ContinuousSeries;

/// Counters for a gap-fill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapFillStats {
    /// Labels examined.
    pub labels: usize,
    /// (label, expiry) groups with missed rows.
    pub groups: usize,
    /// Groups skipped because the following record is on an earlier expiry.
    pub skipped: usize,
    /// Groups re-admitted.
    pub admitted: usize,
}

/// Result of a gap-fill pass.
#[derive(Debug, Clone, Default)]
pub struct GapFillOutcome {
    /// Patched series.
    pub series: ContinuousSeries,
    /// Every change made.
    pub change_log: ChangeLog,
    /// Counters.
    pub stats: GapFillStats,
}

/// Re-admit raw rows missing from `series` where the evidence supports it.
///
/// Groups are processed in ascending expiry order and see the effects of
/// earlier groups, so a day filled by one group is no longer missing for
/// the next.
#[must_use]
pub fn gap_fill(archive: &SnapshotArchive, series: ContinuousSeries) -> GapFillOutcome {
    let mut outcome = GapFillOutcome {
        series,
        ..GapFillOutcome::default()
    };
    let labels: Vec<String> = outcome.series.labels().map(str::to_string).collect();

    for label in labels {
        let Some(symbol) = outcome.series.symbol_of(&label).map(str::to_string) else {
            continue;
        };
        outcome.stats.labels += 1;

        let mut missed: BTreeMap<NaiveDate, Vec<NaiveDate>> = BTreeMap::new();
        for record in archive.records().filter(|r| r.symbol == symbol) {
            if !outcome.series.contains(&label, record.trading_date) {
                missed
                    .entry(record.expiry_date)
                    .or_default()
                    .push(record.trading_date);
            }
        }

        for (expiry, dates) in missed {
            fill_group(archive, &label, &symbol, expiry, &dates, &mut outcome);
        }
    }

    info!(
        labels = outcome.stats.labels,
        groups = outcome.stats.groups,
        admitted = outcome.stats.admitted,
        skipped = outcome.stats.skipped,
        changes = outcome.change_log.len(),
        "Gap-filled continuous series"
    );

    outcome
}

fn fill_group(
    archive: &SnapshotArchive,
    label: &str,
    symbol: &str,
    expiry: NaiveDate,
    dates: &[NaiveDate],
    outcome: &mut GapFillOutcome,
) {
    let dates: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .filter(|d| !outcome.series.contains(label, *d))
        .collect();
    let (Some(first), Some(last)) = (dates.first().copied(), dates.last().copied()) else {
        return;
    };
    outcome.stats.groups += 1;

    let series = &outcome.series;
    let before = series.records_in(label, ..first).next_back().map(|r| r.trading_date);
    let after = series
        .records_in(label, (Bound::Excluded(last), Bound::Unbounded))
        .next()
        .map(|r| (r.trading_date, r.expiry_date));

    if after.is_some_and(|(_, next_expiry)| next_expiry < expiry) {
        debug!(label, expiry = %expiry, "Following record is on an earlier expiry, skipping");
        outcome.stats.skipped += 1;
        return;
    }

    let lower = before.map_or(Bound::Unbounded, Bound::Excluded);
    let upper = after.map_or(Bound::Unbounded, |(date, _)| Bound::Excluded(date));

    let selected: Vec<RawRecord> = series.records_in(label, (lower, upper)).cloned().collect();
    let eligible: Vec<RawRecord> = archive
        .dates_in((lower, upper))
        .filter_map(|d| archive.record(symbol, d, expiry).cloned())
        .collect();

    for from in &dates {
        let eligible_from: Vec<&RawRecord> =
            eligible.iter().filter(|r| r.trading_date >= *from).collect();
        let selected_from: Vec<&RawRecord> =
            selected.iter().filter(|r| r.trading_date >= *from).collect();

        if eligible_from.len() > selected_from.len() {
            debug!(
                label,
                expiry = %expiry,
                from = %from,
                eligible = eligible_from.len(),
                selected = selected_from.len(),
                "Re-admitting missed rows"
            );
            replace_from(outcome, label, expiry, &eligible_from, &selected_from);
            outcome.stats.admitted += 1;
            return;
        }
    }
}

fn replace_from(
    outcome: &mut GapFillOutcome,
    label: &str,
    expiry: NaiveDate,
    eligible: &[&RawRecord],
    selected: &[&RawRecord],
) {
    for dropped in selected
        .iter()
        .filter(|s| !eligible.iter().any(|e| e.trading_date == s.trading_date))
    {
        outcome.series.remove(label, dropped.trading_date);
        outcome.change_log.record(
            dropped.trading_date,
            label,
            Some(dropped.expiry_date),
            expiry,
            ChangeAction::Dropped,
        );
    }

    for record in eligible {
        let date = record.trading_date;
        match outcome.series.insert(label, (*record).clone()) {
            None => outcome
                .change_log
                .record(date, label, None, expiry, ChangeAction::Added),
            Some(previous) if previous != **record => outcome.change_log.record(
                date,
                label,
                Some(previous.expiry_date),
                expiry,
                ChangeAction::Replaced,
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn raw(day: &str, expiry: &str) -> RawRecord {
        RawRecord::new("GOLDM", date(day), date(expiry), dec!(100))
    }

    #[test]
    fn test_fills_hole_between_same_expiry() {
        let archive = SnapshotArchive::from_records(vec![
            raw("2020-03-02", "2020-03-31"),
            raw("2020-03-03", "2020-03-31"),
            raw("2020-03-04", "2020-03-31"),
        ])
        .unwrap();
        let mut series = ContinuousSeries::new();
        series.insert("GOLDM", raw("2020-03-02", "2020-03-31"));
        series.insert("GOLDM", raw("2020-03-04", "2020-03-31"));

        let outcome = gap_fill(&archive, series);

        assert!(outcome.series.contains("GOLDM", date("2020-03-03")));
        assert_eq!(outcome.change_log.count(ChangeAction::Added), 1);
        assert_eq!(outcome.stats.admitted, 1);
    }

    #[test]
    fn test_skips_when_following_record_is_earlier_expiry() {
        let archive = SnapshotArchive::from_records(vec![
            raw("2020-02-26", "2020-02-28"),
            raw("2020-02-26", "2020-04-30"),
            raw("2020-02-27", "2020-02-28"),
        ])
        .unwrap();
        let mut series = ContinuousSeries::new();
        series.insert("GOLDM", raw("2020-02-26", "2020-02-28"));
        series.insert("GOLDM", raw("2020-02-27", "2020-02-28"));

        // Only the April row is missing and it sits on an already-covered day.
        let outcome = gap_fill(&archive, series.clone());

        assert_eq!(outcome.series, series);
        assert!(outcome.change_log.is_empty());
    }

    #[test]
    fn test_excluded_stretch_is_not_reintroduced() {
        // March rows on 03-03 and 03-06 bracket two April selections; only
        // the tail after the April stretch outnumbers what is selected.
        let archive = SnapshotArchive::from_records(vec![
            raw("2020-03-02", "2020-03-31"),
            raw("2020-03-02", "2020-04-30"),
            raw("2020-03-03", "2020-03-31"),
            raw("2020-03-04", "2020-04-30"),
            raw("2020-03-05", "2020-04-30"),
            raw("2020-03-06", "2020-03-31"),
            raw("2020-03-09", "2020-04-30"),
        ])
        .unwrap();
        let mut series = ContinuousSeries::new();
        series.insert("GOLDM", raw("2020-03-02", "2020-03-31"));
        series.insert("GOLDM", raw("2020-03-04", "2020-04-30"));
        series.insert("GOLDM", raw("2020-03-05", "2020-04-30"));
        series.insert("GOLDM", raw("2020-03-09", "2020-04-30"));

        let outcome = gap_fill(&archive, series);

        assert!(!outcome.series.contains("GOLDM", date("2020-03-03")));
        assert_eq!(
            outcome.series.get("GOLDM", date("2020-03-06")).map(|r| r.expiry_date),
            Some(date("2020-03-31"))
        );
        assert_eq!(
            outcome.series.get("GOLDM", date("2020-03-04")).map(|r| r.expiry_date),
            Some(date("2020-04-30"))
        );
        assert_eq!(outcome.change_log.len(), 1);
    }
}
