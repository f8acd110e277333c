//! Load Archive Use Case
//!
//! Reads every available day from a [`RecordSource`]. A bad day is logged
//! and counted; only an unreachable source aborts the load.

use tracing::{info, warn};

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::expiry::derive_trading_day_of_month;
use crate::domain::record::{DailySnapshot, SnapshotArchive};

/// Counters for a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Days the source listed.
    pub days_listed: usize,
    /// Days loaded into the archive.
    pub days_loaded: usize,
    /// Days that failed to load or validate.
    pub days_failed: usize,
    /// Days whose trading day of month was derived.
    pub tdm_derived: usize,
}

/// Archive plus load counters.
#[derive(Debug, Clone, Default)]
pub struct LoadedArchive {
    /// Snapshots that loaded.
    pub archive: SnapshotArchive,
    /// Counters.
    pub stats: LoadStats,
}

/// Use case for reading the raw archive.
pub struct LoadArchiveUseCase<'a, S>
where
    S: RecordSource + ?Sized,
{
    source: &'a S,
}

impl<'a, S> LoadArchiveUseCase<'a, S>
where
    S: RecordSource + ?Sized,
{
    /// Create a new LoadArchiveUseCase.
    pub const fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Load every listed day.
    ///
    /// A listed day without records stays in the archive as an empty
    /// trading day. Days without a trading day of month get one derived from
    /// their position within the month across the days that loaded.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source cannot list its dates.
    pub fn execute(&self) -> Result<LoadedArchive, SourceError> {
        let dates = self.source.list_available_dates()?;

        let mut loaded = LoadedArchive::default();
        loaded.stats.days_listed = dates.len();

        for date in dates {
            let snapshot = self
                .source
                .records_for(date)
                .and_then(|records| DailySnapshot::new(date, records).map_err(SourceError::from));

            match snapshot {
                Ok(snapshot) => {
                    loaded.archive.insert(snapshot);
                    loaded.stats.days_loaded += 1;
                }
                Err(e) if e.is_per_day() => {
                    warn!(source = self.source.name(), date = %date, error = %e, "Skipping day");
                    loaded.stats.days_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let derived_tdm = derive_trading_day_of_month(loaded.archive.dates());
        for (date, tdm) in derived_tdm {
            if let Some(snapshot) = loaded.archive.get_mut(date) {
                if snapshot.trading_day_of_month().is_none() {
                    snapshot.set_trading_day_of_month(tdm);
                    loaded.stats.tdm_derived += 1;
                }
            }
        }

        info!(
            source = self.source.name(),
            listed = loaded.stats.days_listed,
            loaded = loaded.stats.days_loaded,
            failed = loaded.stats.days_failed,
            "Loaded raw archive"
        );

        Ok(loaded)
    }
}
