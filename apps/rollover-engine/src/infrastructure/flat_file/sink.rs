//! Directory-backed series sink.
//!
//! ```text
//! <root>/continuous/<label>.csv
//! <root>/ratio_adjusted/<label>.csv
//! <root>/expiries.json
//! <root>/rollover_multipliers.json
//! <root>/audit/*.csv
//! ```
//!
//! Every file is written to a `.tmp` sibling and renamed into place, so a
//! failed write leaves the previous file intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::ports::{SeriesKind, SeriesSink, SinkError};
use crate::domain::adjustment::MultiplierTable;
use crate::domain::audit::AuditReport;
use crate::domain::expiry::ExpiryHistory;
use crate::domain::record::RawRecord;
use crate::domain::rollover::NoneSelected;

const EXPIRIES_FILE: &str = "expiries.json";
const MULTIPLIERS_FILE: &str = "rollover_multipliers.json";
const AUDIT_DIR: &str = "audit";

/// Flattened none-selected exception for CSV export.
#[derive(Debug, Serialize)]
struct NoneSelectedRow<'a> {
    label: &'a str,
    symbol: &'a str,
    date: NaiveDate,
    implied_current_expiry: Option<NaiveDate>,
    available_expiries: String,
    status: String,
}

impl<'a> From<&'a NoneSelected> for NoneSelectedRow<'a> {
    fn from(e: &'a NoneSelected) -> Self {
        Self {
            label: &e.label,
            symbol: &e.symbol,
            date: e.date,
            implied_current_expiry: e.implied_current_expiry,
            available_expiries: e
                .available_expiries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";"),
            status: e.status.to_string(),
        }
    }
}

/// [`SeriesSink`] writing CSV and JSON files under one root directory.
#[derive(Debug, Clone)]
pub struct FlatFileSeriesSink {
    root: PathBuf,
}

impl FlatFileSeriesSink {
    /// Sink rooted at `root`; directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn series_path(&self, label: &str, kind: SeriesKind) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{label}.csv"))
    }

    fn write_csv<T: Serialize>(
        &self,
        path: &Path,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<(), SinkError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            writer.serialize(row).map_err(|e| encoding(path, &e))?;
        }
        let bytes = writer.into_inner().map_err(|e| encoding(path, &e))?;
        write_atomic(path, &bytes)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), SinkError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| encoding(path, &e))?;
        write_atomic(path, &bytes)
    }
}

fn encoding(path: &Path, e: &dyn std::fmt::Display) -> SinkError {
    SinkError::Encoding {
        location: path.display().to_string(),
        message: e.to_string(),
    }
}

fn io(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        location: path.display().to_string(),
        source,
    }
}

/// Write `bytes` to a temporary sibling, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io(path, e));
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SinkError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| encoding(path, &e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io(path, e)),
    }
}

impl SeriesSink for FlatFileSeriesSink {
    fn persist_series(
        &mut self,
        label: &str,
        kind: SeriesKind,
        records: &[RawRecord],
    ) -> Result<(), SinkError> {
        let path = self.series_path(label, kind);
        self.write_csv(&path, records)
    }

    fn read_series(&self, label: &str, kind: SeriesKind) -> Result<Vec<RawRecord>, SinkError> {
        let path = self.series_path(label, kind);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| encoding(&path, &e))?;
        reader
            .deserialize::<RawRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| encoding(&path, &e))
    }

    fn series_labels(&self, kind: SeriesKind) -> Result<Vec<String>, SinkError> {
        let dir = self.root.join(kind.as_str());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io(&dir, e)),
        };

        let mut labels = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    labels.push(stem.to_string());
                }
            }
        }
        labels.sort();
        Ok(labels)
    }

    fn persist_expiry_history(&mut self, history: &ExpiryHistory) -> Result<(), SinkError> {
        self.write_json(&self.root.join(EXPIRIES_FILE), history)
    }

    fn read_expiry_history(&self) -> Result<Option<ExpiryHistory>, SinkError> {
        read_json(&self.root.join(EXPIRIES_FILE))
    }

    fn persist_multiplier_table(&mut self, table: &MultiplierTable) -> Result<(), SinkError> {
        self.write_json(&self.root.join(MULTIPLIERS_FILE), table)
    }

    fn read_multiplier_table(&self) -> Result<Option<MultiplierTable>, SinkError> {
        read_json(&self.root.join(MULTIPLIERS_FILE))
    }

    fn persist_audit(&mut self, report: &AuditReport) -> Result<(), SinkError> {
        let dir = self.root.join(AUDIT_DIR);
        self.write_csv(
            &dir.join("none_selected.csv"),
            report.none_selected.iter().map(NoneSelectedRow::from),
        )?;
        self.write_csv(&dir.join("flat_multiplier.csv"), &report.flat_multipliers)?;
        self.write_csv(&dir.join("changed_dates.csv"), &report.change_log)?;
        self.write_csv(&dir.join("expiry_regressions.csv"), &report.expiry_regressions)?;
        self.write_csv(&dir.join("nxt_selected.csv"), &report.next_selected)?;
        self.write_csv(&dir.join("rollover_events.csv"), &report.rollover_events)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "flat_file"
    }
}
