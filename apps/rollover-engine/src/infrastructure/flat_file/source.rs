//! Per-day CSV snapshot files.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::trace;

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::record::RawRecord;

/// Row of a daily dump file. The trading date may be absent, in which case
/// it comes from the file name.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Date", default)]
    trading_date: Option<NaiveDate>,
    #[serde(rename = "ExpiryDate", alias = "Expiry Date")]
    expiry_date: NaiveDate,
    #[serde(rename = "Open")]
    open: Decimal,
    #[serde(rename = "High")]
    high: Decimal,
    #[serde(rename = "Low")]
    low: Decimal,
    #[serde(rename = "Close")]
    close: Decimal,
    #[serde(rename = "VolumeLots", alias = "Volume", default)]
    volume: u64,
    #[serde(rename = "OpenInterestLots", alias = "Open Interest", default)]
    open_interest: u64,
    #[serde(rename = "TDM", default)]
    trading_day_of_month: u32,
}

impl SnapshotRow {
    fn into_record(self, file_date: NaiveDate) -> RawRecord {
        RawRecord {
            symbol: self.symbol,
            trading_date: self.trading_date.unwrap_or(file_date),
            expiry_date: self.expiry_date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            open_interest: self.open_interest,
            trading_day_of_month: self.trading_day_of_month,
        }
    }
}

/// Reads `YYYY-MM-DD*.csv` files from one directory, one file per trading
/// day. A day file with a header and no rows is an empty trading day.
///
/// The directory is listed once, on first use.
#[derive(Debug, Clone)]
pub struct FlatFileRecordSource {
    dir: PathBuf,
    files: OnceCell<BTreeMap<NaiveDate, Vec<PathBuf>>>,
}

impl FlatFileRecordSource {
    /// Source over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: OnceCell::new(),
        }
    }

    /// Directory read.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn day_files(&self) -> Result<&BTreeMap<NaiveDate, Vec<PathBuf>>, SourceError> {
        if let Some(files) = self.files.get() {
            return Ok(files);
        }
        let files = self.scan()?;
        Ok(self.files.get_or_init(|| files))
    }

    fn scan(&self) -> Result<BTreeMap<NaiveDate, Vec<PathBuf>>, SourceError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| SourceError::Unavailable {
            message: format!("{}: {e}", self.dir.display()),
        })?;

        let mut files: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Unavailable {
                message: format!("{}: {e}", self.dir.display()),
            })?;
            let path = entry.path();
            if let Some(date) = file_date(&path) {
                files.entry(date).or_default().push(path);
            } else {
                trace!(path = %path.display(), "Ignoring non-snapshot file");
            }
        }
        for paths in files.values_mut() {
            paths.sort();
        }
        Ok(files)
    }
}

/// Date encoded in the first ten characters of a `.csv` file name.
fn file_date(path: &Path) -> Option<NaiveDate> {
    if path.extension().and_then(|e| e.to_str()) != Some("csv") {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    NaiveDate::parse_from_str(name.get(..10)?, "%Y-%m-%d").ok()
}

impl RecordSource for FlatFileRecordSource {
    fn list_available_dates(&self) -> Result<Vec<NaiveDate>, SourceError> {
        Ok(self.day_files()?.keys().copied().collect())
    }

    fn records_for(&self, date: NaiveDate) -> Result<Vec<RawRecord>, SourceError> {
        let files = self
            .day_files()?
            .get(&date)
            .ok_or(SourceError::MissingDay { date })?;

        let mut records = Vec::new();
        for path in files {
            let location = path.display().to_string();
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)
                .map_err(|e| SourceError::Malformed {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
            for row in reader.deserialize::<SnapshotRow>() {
                let row = row.map_err(|e| SourceError::Malformed {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
                records.push(row.into_record(date));
            }
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "flat_file"
    }
}
