//! Exception-driven reconciliation of a draft series.
//!
//! Exceptions are grouped by (label, implied current expiry). For each group
//! the next expiry is voted in over a trading-day window: when the next
//! contract traded on at least as many window days as it did not, the whole
//! window moves to the next contract.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::change_log::{ChangeAction, ChangeLog};
use crate::domain::expiry::ExpiryHistory;
use crate::domain::record::{RawRecord, SnapshotArchive};
use crate::domain::rollover::{
    ExceptionSet, ExceptionStatus, NoneSelected, UnresolvedReason,
};
use crate::domain::series::ContinuousSeries;

/// Counters for a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationStats {
    /// Exception groups examined.
    pub groups: usize,
    /// Groups whose window moved to the next contract.
    pub admitted_groups: usize,
    /// Exceptions resolved because the expected contract's record turned up.
    pub late_admitted: usize,
    /// Exceptions left unresolved.
    pub residual: usize,
}

/// Result of reconciling a draft.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationOutcome {
    /// Patched series.
    pub series: ContinuousSeries,
    /// Every decision taken.
    pub change_log: ChangeLog,
    /// Exceptions still open, with the reason.
    pub residual: ExceptionSet,
    /// Counters.
    pub stats: ReconciliationStats,
}

/// Patch `draft` using the raw archive and the selector's exceptions.
///
/// Running this again on the returned series and residual exceptions makes
/// no further change.
#[must_use]
pub fn reconcile(
    archive: &SnapshotArchive,
    draft: ContinuousSeries,
    exceptions: ExceptionSet,
    history: &ExpiryHistory,
) -> ReconciliationOutcome {
    let mut outcome = ReconciliationOutcome {
        series: draft,
        ..ReconciliationOutcome::default()
    };

    for ((label, current), members) in exceptions.into_groups() {
        outcome.stats.groups += 1;
        reconcile_group(archive, history, &label, current, members, &mut outcome);
    }

    outcome.stats.residual = outcome.residual.len();
    info!(
        groups = outcome.stats.groups,
        admitted = outcome.stats.admitted_groups,
        late = outcome.stats.late_admitted,
        changes = outcome.change_log.len(),
        residual = outcome.stats.residual,
        "Reconciled draft series"
    );

    outcome
}

fn reconcile_group(
    archive: &SnapshotArchive,
    history: &ExpiryHistory,
    label: &str,
    current: Option<NaiveDate>,
    members: Vec<NoneSelected>,
    outcome: &mut ReconciliationOutcome,
) {
    let Some(current) = current else {
        outcome.residual.extend(
            members
                .into_iter()
                .map(|e| settle(e, UnresolvedReason::NoAnchor)),
        );
        return;
    };
    let Some(symbol) = members.first().map(|e| e.symbol.clone()) else {
        return;
    };

    // Records of the expected contract that turned up after the draft.
    let mut pending = Vec::with_capacity(members.len());
    for exception in members {
        if !exception.lacks_replacement() {
            if let Some(record) = archive.record(&symbol, exception.date, current) {
                admit(&mut outcome.series, &mut outcome.change_log, label, record.clone(), current);
                outcome.stats.late_admitted += 1;
                continue;
            }
        }
        pending.push(exception);
    }

    let (Some(earliest), Some(latest)) = (
        pending.first().map(|e| e.date),
        pending.last().map(|e| e.date),
    ) else {
        return;
    };

    let Some(next) = history.next_after(&symbol, current) else {
        debug!(label, current = %current, "Current expiry is the last one known");
        outcome.residual.extend(
            pending
                .into_iter()
                .map(|e| settle(e, UnresolvedReason::LastExpiry)),
        );
        return;
    };

    let previous = history.previous_before(&symbol, current);
    let upper = latest.min(current.min(next));
    let window: Vec<NaiveDate> = if earliest > upper {
        Vec::new()
    } else {
        archive
            .dates_in(earliest..=upper)
            .filter(|day| previous.is_none_or(|p| *day > p))
            .collect()
    };

    let mut pending: BTreeMap<NaiveDate, NoneSelected> =
        pending.into_iter().map(|e| (e.date, e)).collect();

    if window.is_empty() {
        outcome.residual.extend(
            pending
                .into_values()
                .map(|e| settle(e, UnresolvedReason::OutsideWindow)),
        );
        return;
    }

    let next_count = window
        .iter()
        .filter(|day| archive.record(&symbol, **day, next).is_some())
        .count();
    let current_count = window.len() - next_count;

    if next_count < current_count {
        debug!(label, current = %current, next = %next, next_count, current_count, "Next contract not voted in");
        outcome.residual.extend(
            pending
                .into_values()
                .map(|e| settle(e, UnresolvedReason::InsufficientCoverage)),
        );
        return;
    }

    outcome.stats.admitted_groups += 1;
    let no_replacement = ExceptionStatus::Unresolved(UnresolvedReason::NoReplacement);

    for day in window {
        let exception = pending.remove(&day);
        let drafted = outcome.series.get(label, day).cloned();
        let replacement = archive.record(&symbol, day, next).cloned();

        match (drafted, replacement) {
            (None, Some(record)) => {
                outcome.series.insert(label, record);
                outcome
                    .change_log
                    .record(day, label, Some(current), next, ChangeAction::Added);
            }
            (Some(drafted), Some(record)) => {
                if drafted != record {
                    outcome.series.insert(label, record);
                    outcome.change_log.record(
                        day,
                        label,
                        Some(drafted.expiry_date),
                        next,
                        ChangeAction::Replaced,
                    );
                }
            }
            (Some(drafted), None) => {
                outcome.series.remove(label, day);
                outcome.change_log.record(
                    day,
                    label,
                    Some(drafted.expiry_date),
                    next,
                    ChangeAction::Dropped,
                );
                outcome.residual.insert(NoneSelected {
                    label: label.to_string(),
                    symbol: symbol.clone(),
                    date: day,
                    implied_current_expiry: Some(current),
                    available_expiries: available_expiries(archive, &symbol, day),
                    status: no_replacement,
                });
            }
            (None, None) => {
                let already_logged = exception.as_ref().is_some_and(NoneSelected::lacks_replacement);
                if !already_logged {
                    outcome.change_log.record(
                        day,
                        label,
                        Some(current),
                        next,
                        ChangeAction::NoneSelected,
                    );
                }
                let residual = exception.unwrap_or_else(|| NoneSelected {
                    label: label.to_string(),
                    symbol: symbol.clone(),
                    date: day,
                    implied_current_expiry: Some(current),
                    available_expiries: available_expiries(archive, &symbol, day),
                    status: ExceptionStatus::Open,
                });
                outcome.residual.insert(residual.with_status(no_replacement));
            }
        }
    }

    outcome.residual.extend(
        pending
            .into_values()
            .map(|e| settle(e, UnresolvedReason::OutsideWindow)),
    );
}

/// Mark an exception unresolved. A day already dropped for lack of a
/// replacement keeps that status, so it is never admitted late.
fn settle(exception: NoneSelected, reason: UnresolvedReason) -> NoneSelected {
    if exception.lacks_replacement() {
        exception
    } else {
        exception.with_status(ExceptionStatus::Unresolved(reason))
    }
}

fn admit(
    series: &mut ContinuousSeries,
    log: &mut ChangeLog,
    label: &str,
    record: RawRecord,
    expected: NaiveDate,
) {
    let date = record.trading_date;
    match series.insert(label, record) {
        None => log.record(date, label, None, expected, ChangeAction::Added),
        Some(previous) if previous.expiry_date != expected => log.record(
            date,
            label,
            Some(previous.expiry_date),
            expected,
            ChangeAction::Replaced,
        ),
        Some(_) => {}
    }
}

fn available_expiries(archive: &SnapshotArchive, symbol: &str, day: NaiveDate) -> Vec<NaiveDate> {
    archive
        .get(day)
        .map(|snapshot| snapshot.records_for(symbol).map(|r| r.expiry_date).collect())
        .unwrap_or_default()
}
