//! Windowed Rebuild Use Case
//!
//! Rebuilds fixed-offset series from trading-day windows, then gap-fills
//! them. Only unadjusted series are written.

use tracing::{error, info};

use super::build_index::BuildExpiryIndexUseCase;
use super::load_archive::{LoadArchiveUseCase, LoadStats};
use super::run_pass::PassError;
use crate::application::ports::{RecordSource, SeriesKind, SeriesSink};
use crate::domain::reconciliation::{GapFillStats, gap_fill};
use crate::domain::record::RawRecord;
use crate::domain::rollover::build_windowed_series;

/// Summary of a windowed rebuild.
#[derive(Debug, Clone, Default)]
pub struct WindowedReport {
    /// Load counters.
    pub load: LoadStats,
    /// Records carved from expiry windows.
    pub windowed_records: usize,
    /// Gap-fill counters, when gap filling ran.
    pub gap_fill: Option<GapFillStats>,
    /// Labels written.
    pub labels_persisted: usize,
    /// Labels whose write failed.
    pub failed_labels: Vec<String>,
}

/// Use case rebuilding series from expiry windows.
pub struct WindowedPassUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    source: &'a S,
    sink: &'a mut K,
}

impl<'a, S, K> WindowedPassUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    /// Create a new WindowedPassUseCase.
    pub const fn new(source: &'a S, sink: &'a mut K) -> Self {
        Self { source, sink }
    }

    /// Rebuild every symbol (or only `symbols`) with offset `delta`.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot list its days or a rebuilt
    /// expiry history cannot be persisted.
    pub fn execute(
        &mut self,
        delta: u32,
        symbols: &[String],
        fill_gaps: bool,
    ) -> Result<WindowedReport, PassError> {
        let mut report = WindowedReport::default();

        let loaded = LoadArchiveUseCase::new(self.source).execute()?;
        report.load = loaded.stats;
        let archive = loaded.archive;

        let artifacts = BuildExpiryIndexUseCase::new(&mut *self.sink).execute(&archive, true)?;

        let mut series =
            build_windowed_series(&archive, &artifacts.history, &artifacts.index, delta, symbols);
        report.windowed_records = series.len();

        if fill_gaps {
            let outcome = gap_fill(&archive, series);
            report.gap_fill = Some(outcome.stats);
            series = outcome.series;
        }

        for label in series.labels() {
            let records: Vec<RawRecord> = series.records(label).cloned().collect();
            match self
                .sink
                .persist_series(label, SeriesKind::Continuous, &records)
            {
                Ok(()) => report.labels_persisted += 1,
                Err(e) => {
                    error!(sink = self.sink.name(), label, error = %e, "Failed to persist series");
                    report.failed_labels.push(label.to_string());
                }
            }
        }

        info!(
            delta,
            windowed = report.windowed_records,
            labels = report.labels_persisted,
            "Windowed rebuild complete"
        );
        Ok(report)
    }
}
