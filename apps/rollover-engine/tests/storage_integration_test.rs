//! Full passes against the flat-file and SQLite backings.

#![allow(clippy::unwrap_used)]

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, params};

use rollover_engine::application::ports::{SeriesKind, SeriesSink};
use rollover_engine::application::use_cases::{PassOptions, RunPassUseCase};
use rollover_engine::infrastructure::flat_file::{FlatFileRecordSource, FlatFileSeriesSink};
use rollover_engine::infrastructure::sqlite::{SqliteRecordSource, SqliteSeriesSink};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

const DAYS: [&str; 6] = [
    "2020-02-26", "2020-02-27", "2020-02-28", "2020-03-02", "2020-03-03", "2020-03-04",
];
const HEADER: &str = "Symbol,Date,Expiry Date,Open,High,Low,Close,Volume,Open Interest\n";

/// (day, expiry, close) rows for GOLDM; 2020-03-31 is missing on 2020-03-03,
/// leaving GOLDM without any row that day.
fn rows() -> Vec<(&'static str, &'static str, &'static str)> {
    let mut rows = Vec::new();
    for day in DAYS {
        if date(day) <= date("2020-02-28") {
            rows.push((day, "2020-02-28", "41000.00"));
        }
        if day != "2020-03-03" {
            rows.push((day, "2020-03-31", "41400.50"));
        }
    }
    rows
}

fn write_snapshots(dir: &Path) {
    let mut by_day: std::collections::BTreeMap<&str, String> =
        DAYS.iter().map(|day| (*day, HEADER.to_string())).collect();
    for (day, expiry, close) in rows() {
        let body = by_day.entry(day).or_default();
        writeln!(body, "GOLDM ,{day},{expiry},{close},{close},{close},{close},10,20").unwrap();
    }
    for (day, body) in by_day {
        fs::write(dir.join(format!("{day}.csv")), body).unwrap();
    }
    fs::write(dir.join("README.txt"), "not a snapshot").unwrap();
}

fn write_dump(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tblDump (
            InstrumentName TEXT, Symbol TEXT, Date TEXT, ExpiryDate TEXT,
            Open TEXT, High TEXT, Low TEXT, Close TEXT,
            VolumeLots INTEGER, OpenInterestLots INTEGER
        );",
    )
    .unwrap();
    let mut stmt = conn
        .prepare("INSERT INTO tblDump VALUES (?1, 'GOLDM', ?2, ?3, ?4, ?4, ?4, ?4, 10, 20)")
        .unwrap();
    for (day, expiry, close) in rows() {
        stmt.execute(params!["FUTCOM", day, expiry, close]).unwrap();
    }
    for day in DAYS {
        stmt.execute(params!["OPTFUT", day, "2020-03-31", "1"]).unwrap();
    }
}

#[test]
fn test_flat_file_pass() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_snapshots(input.path());

    let source = FlatFileRecordSource::new(input.path());
    let mut sink = FlatFileSeriesSink::new(output.path());
    let report = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();

    assert_eq!(report.load.days_loaded, 6);
    assert_eq!(report.load.tdm_derived, 6);
    assert_eq!(report.labels_persisted, 1);

    let series = sink.read_series("GOLDM", SeriesKind::Continuous).unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series[0].symbol, "GOLDM");
    assert_eq!(series[2].expiry_date, date("2020-03-31"));
    assert!(output.path().join("expiries.json").exists());
    assert!(output.path().join("rollover_multipliers.json").exists());
    assert!(output.path().join("ratio_adjusted/GOLDM.csv").exists());

    let exported = fs::read_to_string(output.path().join("audit/none_selected.csv")).unwrap();
    assert!(exported.contains("2020-03-03"));

    // A rerun over unchanged input reuses the stored expiry history.
    let rerun = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();
    assert!(!rerun.index_rebuilt);
    assert_eq!(
        sink.read_series("GOLDM", SeriesKind::Continuous).unwrap(),
        series
    );
}

#[test]
fn test_sqlite_pass() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("dump.db");
    write_dump(&dump);

    let source = SqliteRecordSource::open(&dump, "FUTCOM").unwrap();
    let mut sink = SqliteSeriesSink::open(&dir.path().join("continuous.db")).unwrap();
    let report = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.load.days_loaded, 6);

    let series = sink.read_series("GOLDM", SeriesKind::Continuous).unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series.last().unwrap().close.to_string(), "41400.50");

    let history = sink.read_expiry_history().unwrap().unwrap();
    assert_eq!(history.expiries("GOLDM"), &[date("2020-02-28"), date("2020-03-31")]);
    assert_eq!(history.built_through(), Some(date("2020-03-04")));

    let table = sink.read_multiplier_table().unwrap().unwrap();
    let ratio = table.get("GOLDM", date("2020-02-28")).unwrap();
    assert!((ratio - 41000.0 / 41400.5).abs() < 1e-12);
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = FlatFileRecordSource::new(dir.path().join("absent"));
    let mut sink = FlatFileSeriesSink::new(dir.path().join("out"));

    let result = RunPassUseCase::new(&source, &mut sink).execute(&PassOptions::default());
    assert!(result.is_err());
}
