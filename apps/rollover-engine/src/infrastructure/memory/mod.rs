//! In-memory source and sink for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::application::ports::{
    RecordSource, SeriesKind, SeriesSink, SinkError, SourceError,
};
use crate::domain::adjustment::MultiplierTable;
use crate::domain::audit::AuditReport;
use crate::domain::expiry::ExpiryHistory;
use crate::domain::record::RawRecord;

/// In-memory implementation of [`RecordSource`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    days: BTreeMap<NaiveDate, Vec<RawRecord>>,
    failing: BTreeSet<NaiveDate>,
}

impl InMemoryRecordSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source holding `records`, grouped by trading date.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        let mut source = Self::new();
        for record in records {
            source.add(record);
        }
        source
    }

    /// Add a record.
    pub fn add(&mut self, record: RawRecord) {
        self.days.entry(record.trading_date).or_default().push(record);
    }

    /// List `date` as a trading day even if it holds no record.
    pub fn add_trading_day(&mut self, date: NaiveDate) {
        self.days.entry(date).or_default();
    }

    /// Make `date` listed but unreadable.
    pub fn fail_on(&mut self, date: NaiveDate) {
        self.failing.insert(date);
    }
}

impl RecordSource for InMemoryRecordSource {
    fn list_available_dates(&self) -> Result<Vec<NaiveDate>, SourceError> {
        Ok(self
            .days
            .keys()
            .chain(self.failing.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn records_for(&self, date: NaiveDate) -> Result<Vec<RawRecord>, SourceError> {
        if self.failing.contains(&date) {
            return Err(SourceError::Malformed {
                location: format!("memory:{date}"),
                message: "injected failure".to_string(),
            });
        }
        self.days
            .get(&date)
            .cloned()
            .ok_or(SourceError::MissingDay { date })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// In-memory implementation of [`SeriesSink`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySeriesSink {
    series: BTreeMap<(SeriesKind, String), Vec<RawRecord>>,
    expiry_history: Option<ExpiryHistory>,
    multipliers: Option<MultiplierTable>,
    audit: Option<AuditReport>,
    rejected: BTreeSet<String>,
    history_writes: usize,
}

impl InMemorySeriesSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every write of `label`.
    pub fn reject_label(&mut self, label: impl Into<String>) {
        self.rejected.insert(label.into());
    }

    /// Stored series, if written.
    #[must_use]
    pub fn series(&self, label: &str, kind: SeriesKind) -> Option<&[RawRecord]> {
        self.series
            .get(&(kind, label.to_string()))
            .map(Vec::as_slice)
    }

    /// Last audit written.
    #[must_use]
    pub const fn audit(&self) -> Option<&AuditReport> {
        self.audit.as_ref()
    }

    /// How many times the expiry history was written.
    #[must_use]
    pub const fn history_writes(&self) -> usize {
        self.history_writes
    }
}

impl SeriesSink for InMemorySeriesSink {
    fn persist_series(
        &mut self,
        label: &str,
        kind: SeriesKind,
        records: &[RawRecord],
    ) -> Result<(), SinkError> {
        if self.rejected.contains(label) {
            return Err(SinkError::Rejected {
                label: label.to_string(),
            });
        }
        self.series
            .insert((kind, label.to_string()), records.to_vec());
        Ok(())
    }

    fn read_series(&self, label: &str, kind: SeriesKind) -> Result<Vec<RawRecord>, SinkError> {
        Ok(self
            .series
            .get(&(kind, label.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn series_labels(&self, kind: SeriesKind) -> Result<Vec<String>, SinkError> {
        Ok(self
            .series
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, label)| label.clone())
            .collect())
    }

    fn persist_expiry_history(&mut self, history: &ExpiryHistory) -> Result<(), SinkError> {
        self.expiry_history = Some(history.clone());
        self.history_writes += 1;
        Ok(())
    }

    fn read_expiry_history(&self) -> Result<Option<ExpiryHistory>, SinkError> {
        Ok(self.expiry_history.clone())
    }

    fn persist_multiplier_table(&mut self, table: &MultiplierTable) -> Result<(), SinkError> {
        self.multipliers = Some(table.clone());
        Ok(())
    }

    fn read_multiplier_table(&self) -> Result<Option<MultiplierTable>, SinkError> {
        Ok(self.multipliers.clone())
    }

    fn persist_audit(&mut self, report: &AuditReport) -> Result<(), SinkError> {
        self.audit = Some(report.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
