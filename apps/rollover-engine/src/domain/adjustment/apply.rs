//! Ratio adjustment of continuous series.

use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::debug;

use super::integrity::IntegrityError;
use super::table::{AdjustmentDirection, MultiplierTable};
use crate::domain::record::RawRecord;
use crate::domain::series::ContinuousSeries;

/// Default number of decimal places for adjusted prices.
pub const DEFAULT_PRICE_DECIMALS: u32 = 2;

/// Scale open/high/low/close of every record by its cumulative multiplier.
///
/// Prices are rounded to `decimals` places with banker's rounding. Volume
/// and open interest are left as they are.
///
/// # Errors
///
/// Returns [`IntegrityError::NonFiniteMultiplier`] when a cumulative
/// multiplier cannot be represented as a decimal or overflows a price.
pub fn apply_adjustment(
    series: &ContinuousSeries,
    table: &MultiplierTable,
    direction: AdjustmentDirection,
    decimals: u32,
) -> Result<ContinuousSeries, IntegrityError> {
    let labels: Vec<&str> = series.labels().collect();

    let adjusted: Vec<(String, Vec<RawRecord>)> = labels
        .par_iter()
        .map(|label| {
            adjust_label(label, series, table, direction, decimals)
                .map(|records| ((*label).to_string(), records))
        })
        .collect::<Result<_, _>>()?;

    let mut out = ContinuousSeries::new();
    for (label, records) in adjusted {
        out.ensure_label(&label);
        out.extend(&label, records);
    }

    debug!(labels = labels.len(), %direction, "Applied ratio adjustment");
    Ok(out)
}

fn adjust_label(
    label: &str,
    series: &ContinuousSeries,
    table: &MultiplierTable,
    direction: AdjustmentDirection,
    decimals: u32,
) -> Result<Vec<RawRecord>, IntegrityError> {
    let mut multipliers = table.multipliers(label).peekable();
    let mut cumulative = 1.0_f64;
    let mut adjusted = Vec::with_capacity(series.label_len(label));

    for record in series.records(label) {
        let date = record.trading_date;

        // Same-day folds in today's multiplier before pricing, next-day after.
        if direction == AdjustmentDirection::SameDay {
            while let Some((_, ratio)) = multipliers.next_if(|(d, _)| *d <= date) {
                cumulative *= ratio;
            }
        } else {
            while let Some((_, ratio)) = multipliers.next_if(|(d, _)| *d < date) {
                cumulative *= ratio;
            }
        }

        let factor = Decimal::from_f64(cumulative)
            .filter(|_| cumulative.is_finite())
            .ok_or_else(|| IntegrityError::NonFiniteMultiplier {
                label: label.to_string(),
                date,
                value: cumulative,
            })?;

        let scale = |price: Decimal| -> Result<Decimal, IntegrityError> {
            price
                .checked_mul(factor)
                .map(|p| p.round_dp(decimals))
                .ok_or_else(|| IntegrityError::NonFiniteMultiplier {
                    label: label.to_string(),
                    date,
                    value: cumulative,
                })
        };

        let mut out = record.clone();
        out.open = scale(record.open)?;
        out.high = scale(record.high)?;
        out.low = scale(record.low)?;
        out.close = scale(record.close)?;
        adjusted.push(out);
    }

    Ok(adjusted)
}
