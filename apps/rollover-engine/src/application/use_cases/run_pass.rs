//! Run Pass Use Case
//!
//! One full pass: load, index, select, reconcile, multipliers, adjust,
//! persist. Stages hand values to each other; only the sink sees I/O.

use thiserror::Error;
use tracing::{error, info, warn};

use super::build_index::BuildExpiryIndexUseCase;
use super::load_archive::{LoadArchiveUseCase, LoadStats};
use crate::application::ports::{RecordSource, SeriesKind, SeriesSink, SinkError, SourceError};
use crate::domain::adjustment::{
    AdjustmentDirection, DEFAULT_LOOKBACK_DAYS, DEFAULT_PRICE_DECIMALS, apply_adjustment,
    compute_multipliers,
};
use crate::domain::audit::AuditReport;
use crate::domain::reconciliation::{
    GapFillStats, ReconciliationMode, ReconciliationStats, gap_fill, reconcile,
};
use crate::domain::record::RawRecord;
use crate::domain::rollover::{RolloverPolicy, RolloverSelector, SelectionStats};
use crate::domain::series::ContinuousSeries;

/// Ratio adjustment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentOptions {
    /// When multipliers start to apply.
    pub direction: AdjustmentDirection,
    /// Prior snapshots searched for a rollover ratio.
    pub lookback_days: usize,
    /// Decimal places of adjusted prices.
    pub decimals: u32,
}

impl Default for AdjustmentOptions {
    fn default() -> Self {
        Self {
            direction: AdjustmentDirection::SameDay,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            decimals: DEFAULT_PRICE_DECIMALS,
        }
    }
}

/// Settings for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOptions {
    /// Policy variants, one series per symbol each.
    pub policies: Vec<RolloverPolicy>,
    /// Symbols to process; empty means all.
    pub symbols: Vec<String>,
    /// Reconciliation strategy, `None` to skip reconciliation.
    pub reconciliation: Option<ReconciliationMode>,
    /// Adjustment settings, `None` to skip ratio adjustment.
    pub adjustment: Option<AdjustmentOptions>,
    /// Reuse a persisted, non-stale expiry history.
    pub reuse_expiry_history: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            policies: vec![RolloverPolicy::FixedOffset { delta: 0 }],
            symbols: Vec::new(),
            reconciliation: Some(ReconciliationMode::Exceptions),
            adjustment: Some(AdjustmentOptions::default()),
            reuse_expiry_history: true,
        }
    }
}

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// The record source failed as a whole.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The sink failed outside a per-label write.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Summary of a pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Load counters.
    pub load: LoadStats,
    /// Whether the expiry history was rebuilt.
    pub index_rebuilt: bool,
    /// Selection counters.
    pub selection: SelectionStats,
    /// Exception reconciliation counters.
    pub reconciliation: Option<ReconciliationStats>,
    /// Gap-fill counters.
    pub gap_fill: Option<GapFillStats>,
    /// Reconciliation change-log entries.
    pub changes: usize,
    /// Exceptions left unresolved.
    pub residual_exceptions: usize,
    /// Multipliers computed.
    pub multipliers: usize,
    /// Multipliers defaulted to 1.
    pub flat_multipliers: usize,
    /// Expiry regressions found.
    pub regressions: usize,
    /// Labels fully persisted.
    pub labels_persisted: usize,
    /// Labels whose write failed.
    pub failed_labels: Vec<String>,
    /// Other failures (adjustment, table or audit writes).
    pub failures: Vec<String>,
}

impl PassReport {
    /// Whether every write succeeded and no day failed to load.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.load.days_failed == 0 && self.failed_labels.is_empty() && self.failures.is_empty()
    }
}

/// Use case running a full pass.
pub struct RunPassUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    source: &'a S,
    sink: &'a mut K,
}

impl<'a, S, K> RunPassUseCase<'a, S, K>
where
    S: RecordSource + ?Sized,
    K: SeriesSink + ?Sized,
{
    /// Create a new RunPassUseCase.
    pub const fn new(source: &'a S, sink: &'a mut K) -> Self {
        Self { source, sink }
    }

    /// Execute a pass.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot list its days or a rebuilt
    /// expiry history cannot be persisted. Per-day and per-label failures
    /// are counted in the report instead.
    pub fn execute(&mut self, options: &PassOptions) -> Result<PassReport, PassError> {
        let mut report = PassReport::default();

        // 1. Raw archive
        let loaded = LoadArchiveUseCase::new(self.source).execute()?;
        report.load = loaded.stats;
        let archive = loaded.archive;

        // 2. Expiry index
        let artifacts = BuildExpiryIndexUseCase::new(&mut *self.sink)
            .execute(&archive, options.reuse_expiry_history)?;
        report.index_rebuilt = artifacts.rebuilt;

        // 3. Draft selection
        let draft = RolloverSelector::new(&artifacts.history, &artifacts.index, &options.policies)
            .with_symbols(&options.symbols)
            .run(&archive);
        report.selection = draft.stats;

        let mut audit = AuditReport {
            next_selected: draft.next_selected,
            rollover_events: draft.events,
            ..AuditReport::default()
        };

        // 4. Reconciliation
        let series = match options.reconciliation {
            Some(ReconciliationMode::Exceptions) => {
                let outcome = reconcile(&archive, draft.series, draft.exceptions, &artifacts.history);
                report.reconciliation = Some(outcome.stats);
                audit.change_log = outcome.change_log.into_entries();
                audit.none_selected = outcome.residual.iter().cloned().collect();
                outcome.series
            }
            Some(ReconciliationMode::GapFill) => {
                let outcome = gap_fill(&archive, draft.series);
                report.gap_fill = Some(outcome.stats);
                audit.change_log = outcome.change_log.into_entries();
                audit.none_selected = draft
                    .exceptions
                    .iter()
                    .filter(|e| !outcome.series.contains(&e.label, e.date))
                    .cloned()
                    .collect();
                outcome.series
            }
            None => {
                audit.none_selected = draft.exceptions.iter().cloned().collect();
                draft.series
            }
        };
        report.changes = audit.change_log.len();
        report.residual_exceptions = audit.none_selected.len();

        // 5. Multipliers and adjustment
        let adjustment = options.adjustment.unwrap_or_default();
        let multipliers = compute_multipliers(&series, &archive, adjustment.lookback_days);
        report.multipliers = multipliers.table.len();
        report.flat_multipliers = multipliers.flat.len();
        report.regressions = multipliers.regressions.len();

        let adjusted = match options.adjustment {
            Some(settings) => match apply_adjustment(
                &series,
                &multipliers.table,
                settings.direction,
                settings.decimals,
            ) {
                Ok(adjusted) => Some(adjusted),
                Err(e) => {
                    error!(error = %e, "Ratio adjustment failed, adjusted series not written");
                    report.failures.push(e.to_string());
                    None
                }
            },
            None => None,
        };

        audit.flat_multipliers = multipliers.flat;
        audit.expiry_regressions = multipliers.regressions;

        // 6. Persist
        for label in series.labels() {
            match self.persist_label(label, &series, adjusted.as_ref()) {
                Ok(()) => report.labels_persisted += 1,
                Err(e) => {
                    error!(sink = self.sink.name(), label, error = %e, "Failed to persist series");
                    report.failed_labels.push(label.to_string());
                }
            }
        }

        if let Err(e) = self.sink.persist_multiplier_table(&multipliers.table) {
            error!(sink = self.sink.name(), error = %e, "Failed to persist multiplier table");
            report.failures.push(e.to_string());
        }
        if let Err(e) = self.sink.persist_audit(&audit) {
            error!(sink = self.sink.name(), error = %e, "Failed to persist audit exports");
            report.failures.push(e.to_string());
        }

        if report.is_clean() {
            info!(
                labels = report.labels_persisted,
                changes = report.changes,
                residual = report.residual_exceptions,
                "Pass complete"
            );
        } else {
            warn!(
                labels = report.labels_persisted,
                days_failed = report.load.days_failed,
                failed_labels = report.failed_labels.len(),
                failures = report.failures.len(),
                "Pass complete with errors"
            );
        }

        Ok(report)
    }

    fn persist_label(
        &mut self,
        label: &str,
        series: &ContinuousSeries,
        adjusted: Option<&ContinuousSeries>,
    ) -> Result<(), SinkError> {
        let records: Vec<RawRecord> = series.records(label).cloned().collect();
        self.sink
            .persist_series(label, SeriesKind::Continuous, &records)?;

        if let Some(adjusted) = adjusted {
            let records: Vec<RawRecord> = adjusted.records(label).cloned().collect();
            self.sink
                .persist_series(label, SeriesKind::RatioAdjusted, &records)?;
        }
        Ok(())
    }
}
