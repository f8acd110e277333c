//! Gap-Fill Persisted Use Case
//!
//! Rebuild path for a relational store: read the persisted continuous
//! series back, gap-fill it against the raw archive and write back only the
//! labels that changed.

use tracing::{error, info};

use super::load_archive::{LoadArchiveUseCase, LoadStats};
use super::run_pass::PassError;
use crate::application::ports::{RecordSource, SeriesKind, SeriesSink};
use crate::domain::audit::AuditReport;
use crate::domain::reconciliation::{GapFillStats, gap_fill};
use crate::domain::record::RawRecord;
use crate::domain::series::ContinuousSeries;

/// Summary of a gap-fill run.
#[derive(Debug, Clone, Default)]
pub struct GapFillReport {
    /// Load counters.
    pub load: LoadStats,
    /// Gap-fill counters.
    pub stats: GapFillStats,
    /// Change-log entries.
    pub changes: usize,
    /// Labels rewritten.
    pub labels_updated: Vec<String>,
    /// Labels whose read or write failed.
    pub failed_labels: Vec<String>,
}

/// Use case gap-filling the persisted series.
pub struct GapFillPersistedUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    source: &'a S,
    sink: &'a mut K,
}

impl<'a, S, K> GapFillPersistedUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    /// Create a new GapFillPersistedUseCase.
    pub const fn new(source: &'a S, sink: &'a mut K) -> Self {
        Self { source, sink }
    }

    /// Execute gap filling for every persisted label (or only `labels`).
    ///
    /// # Errors
    ///
    /// Returns an error when the source or the sink's label listing fails.
    pub fn execute(&mut self, labels: &[String]) -> Result<GapFillReport, PassError> {
        let mut report = GapFillReport::default();

        let loaded = LoadArchiveUseCase::new(self.source).execute()?;
        report.load = loaded.stats;

        let mut persisted = ContinuousSeries::new();
        for label in self.sink.series_labels(SeriesKind::Continuous)? {
            if !labels.is_empty() && !labels.contains(&label) {
                continue;
            }
            match self.sink.read_series(&label, SeriesKind::Continuous) {
                Ok(records) => {
                    persisted.ensure_label(&label);
                    persisted.extend(&label, records);
                }
                Err(e) => {
                    error!(sink = self.sink.name(), label, error = %e, "Failed to read series");
                    report.failed_labels.push(label);
                }
            }
        }

        let before = persisted.clone();
        let outcome = gap_fill(&loaded.archive, persisted);
        report.stats = outcome.stats;
        report.changes = outcome.change_log.len();

        for label in outcome.series.labels() {
            let records: Vec<RawRecord> = outcome.series.records(label).cloned().collect();
            if before.records(label).eq(records.iter()) {
                continue;
            }
            match self.sink.persist_series(label, SeriesKind::Continuous, &records) {
                Ok(()) => report.labels_updated.push(label.to_string()),
                Err(e) => {
                    error!(sink = self.sink.name(), label, error = %e, "Failed to persist series");
                    report.failed_labels.push(label.to_string());
                }
            }
        }

        let audit = AuditReport {
            change_log: outcome.change_log.into_entries(),
            ..AuditReport::default()
        };
        if let Err(e) = self.sink.persist_audit(&audit) {
            error!(sink = self.sink.name(), error = %e, "Failed to persist audit exports");
        }

        info!(
            labels = report.stats.labels,
            updated = report.labels_updated.len(),
            changes = report.changes,
            "Gap fill complete"
        );

        Ok(report)
    }
}
