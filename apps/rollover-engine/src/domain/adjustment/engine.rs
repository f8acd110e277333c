//! Rollover multiplier computation.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use tracing::{error, info, warn};

use super::integrity::{ExpiryRegression, FlatMultiplier, IntegrityError};
use super::table::MultiplierTable;
use crate::domain::record::SnapshotArchive;
use crate::domain::series::ContinuousSeries;

/// Default number of prior snapshots searched for a rollover ratio.
pub const DEFAULT_LOOKBACK_DAYS: usize = 5;

/// Multipliers and the integrity findings raised while building them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiplierOutcome {
    /// Multipliers per label.
    pub table: MultiplierTable,
    /// Rollovers that defaulted to a multiplier of 1.
    pub flat: Vec<FlatMultiplier>,
    /// Expiry regressions (no multiplier recorded).
    pub regressions: Vec<ExpiryRegression>,
}

/// Compute a multiplier for every rollover in `series`.
///
/// A rollover is a day whose expiry is later than the previous record's. Its
/// multiplier is `previous close / current close` on the most recent of the
/// `lookback` snapshots strictly before the rollover where both contracts
/// traded with a usable close. Labels are processed in parallel.
#[must_use]
pub fn compute_multipliers(
    series: &ContinuousSeries,
    archive: &SnapshotArchive,
    lookback: usize,
) -> MultiplierOutcome {
    let labels: Vec<&str> = series.labels().collect();

    let per_label: Vec<MultiplierOutcome> = labels
        .par_iter()
        .map(|label| label_multipliers(label, series, archive, lookback))
        .collect();

    let mut outcome = MultiplierOutcome::default();
    for part in per_label {
        outcome.table.merge(part.table);
        outcome.flat.extend(part.flat);
        outcome.regressions.extend(part.regressions);
    }

    info!(
        labels = labels.len(),
        multipliers = outcome.table.len(),
        flat = outcome.flat.len(),
        regressions = outcome.regressions.len(),
        "Computed rollover multipliers"
    );

    outcome
}

fn label_multipliers(
    label: &str,
    series: &ContinuousSeries,
    archive: &SnapshotArchive,
    lookback: usize,
) -> MultiplierOutcome {
    let mut outcome = MultiplierOutcome::default();
    outcome.table.ensure_label(label);

    let mut records = series.records(label);
    let Some(first) = records.next() else {
        return outcome;
    };
    let mut previous_expiry = first.expiry_date;

    for record in records {
        let current_expiry = record.expiry_date;

        if current_expiry < previous_expiry {
            let regression = ExpiryRegression {
                label: label.to_string(),
                date: record.trading_date,
                previous_expiry,
                current_expiry,
            };
            error!(error = %IntegrityError::from(regression.clone()), "Data integrity error");
            outcome.regressions.push(regression);
        } else if current_expiry > previous_expiry {
            match lookback_ratio(
                archive,
                &record.symbol,
                record.trading_date,
                previous_expiry,
                current_expiry,
                lookback,
            ) {
                Some(ratio) => outcome.table.insert(label, record.trading_date, ratio),
                None => {
                    let flat = FlatMultiplier {
                        label: label.to_string(),
                        date: record.trading_date,
                        previous_expiry,
                        current_expiry,
                    };
                    warn!(error = %IntegrityError::from(flat.clone()), "Defaulting multiplier to 1");
                    outcome.table.insert(label, record.trading_date, 1.0);
                    outcome.flat.push(flat);
                }
            }
        }

        previous_expiry = current_expiry;
    }

    outcome
}

/// `previous close / current close` from the latest usable prior snapshot.
#[must_use]
pub fn lookback_ratio(
    archive: &SnapshotArchive,
    symbol: &str,
    rollover_date: NaiveDate,
    previous_expiry: NaiveDate,
    current_expiry: NaiveDate,
    lookback: usize,
) -> Option<f64> {
    archive
        .dates_in(..rollover_date)
        .rev()
        .take(lookback)
        .find_map(|date| {
            let previous = archive.record(symbol, date, previous_expiry)?;
            let current = archive.record(symbol, date, current_expiry)?;
            let ratio = previous.close.to_f64()? / current.close.to_f64()?;
            (ratio.is_finite() && ratio > 0.0).then_some(ratio)
        })
}
