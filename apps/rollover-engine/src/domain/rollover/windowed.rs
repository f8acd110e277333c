//! Window-based fixed-offset builder used when rebuilding from a relational
//! store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::expiry::{ExpiryHistory, TradingDayIndex};
use crate::domain::record::{RawRecord, SnapshotArchive};
use crate::domain::series::ContinuousSeries;

/// Build a fixed-offset series by carving each expiry's trading-day window.
///
/// Expiry `e` owns the trading days with ordinal in
/// `[previous_cut, ordinal(e) - delta)`, where `previous_cut` is the previous
/// expiry's upper bound. Only days on which `e` actually traded are taken;
/// the gaps are left for gap-fill reconciliation.
#[must_use]
pub fn build_windowed_series(
    archive: &SnapshotArchive,
    history: &ExpiryHistory,
    index: &TradingDayIndex,
    delta: u32,
    symbols: &[String],
) -> ContinuousSeries {
    let mut by_contract: BTreeMap<(&str, NaiveDate), Vec<&RawRecord>> = BTreeMap::new();
    for record in archive.records() {
        by_contract
            .entry((record.symbol.as_str(), record.expiry_date))
            .or_default()
            .push(record);
    }

    let mut series = ContinuousSeries::new();

    for symbol in history.symbols() {
        if !symbols.is_empty() && !symbols.iter().any(|s| s == symbol) {
            continue;
        }

        let mut previous_cut: i64 = 0;
        for expiry in history.expiries(symbol) {
            let Some(ordinal) = index.ordinal(*expiry) else {
                warn!(symbol, expiry = %expiry, "Expiry has no trading-day ordinal, skipping");
                continue;
            };
            let cut = i64::from(ordinal) - i64::from(delta);

            let owned = by_contract
                .get(&(symbol, *expiry))
                .into_iter()
                .flatten()
                .filter(|record| {
                    index
                        .exact(record.trading_date)
                        .map(i64::from)
                        .is_some_and(|day| day >= previous_cut && day < cut)
                })
                .map(|record| (*record).clone());
            series.extend(symbol, owned);

            previous_cut = cut;
        }
    }

    series
}
