//! Table layout and column codecs shared by the SQLite source and sink.

use chrono::NaiveDate;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::domain::record::RawRecord;

/// Raw daily dump, filtered by instrument type.
pub const DUMP_TABLE: &str = "tblDump";

/// Output tables, created on open.
pub const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS tblFutures (
    Kind TEXT NOT NULL,
    Label TEXT NOT NULL,
    Symbol TEXT NOT NULL,
    Date TEXT NOT NULL,
    ExpiryDate TEXT NOT NULL,
    Open TEXT NOT NULL,
    High TEXT NOT NULL,
    Low TEXT NOT NULL,
    Close TEXT NOT NULL,
    VolumeLots INTEGER NOT NULL,
    OpenInterestLots INTEGER NOT NULL,
    TDM INTEGER NOT NULL,
    PRIMARY KEY (Kind, Label, Date)
);
CREATE TABLE IF NOT EXISTS tblExpiries (
    Symbol TEXT NOT NULL,
    ExpiryDate TEXT NOT NULL,
    TDM INTEGER,
    PRIMARY KEY (Symbol, ExpiryDate)
);
CREATE TABLE IF NOT EXISTS tblMeta (
    Key TEXT PRIMARY KEY,
    Value TEXT
);
CREATE TABLE IF NOT EXISTS tblMultipliers (
    Label TEXT NOT NULL,
    Date TEXT NOT NULL,
    Multiplier REAL NOT NULL,
    PRIMARY KEY (Label, Date)
);
CREATE TABLE IF NOT EXISTS tblNoneSelected (
    Label TEXT NOT NULL,
    Symbol TEXT NOT NULL,
    Date TEXT NOT NULL,
    ImpliedCurrentExpiry TEXT,
    AvailableExpiries TEXT NOT NULL,
    Status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tblFlatMultiplier (
    Label TEXT NOT NULL,
    Date TEXT NOT NULL,
    PreviousExpiry TEXT NOT NULL,
    CurrentExpiry TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tblChangedDates (
    Date TEXT NOT NULL,
    Label TEXT NOT NULL,
    OldExpiry TEXT,
    NewExpiry TEXT NOT NULL,
    Action TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tblExpiryRegressions (
    Label TEXT NOT NULL,
    Date TEXT NOT NULL,
    PreviousExpiry TEXT NOT NULL,
    CurrentExpiry TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tblNextSelected (
    Label TEXT NOT NULL,
    Date TEXT NOT NULL,
    CurrentExpiry TEXT NOT NULL,
    SelectedExpiry TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tblRolloverEvents (
    Label TEXT NOT NULL,
    Date TEXT NOT NULL,
    FromExpiry TEXT,
    ToExpiry TEXT NOT NULL,
    ObservedRatio REAL
);
";

/// Create output tables if missing.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(MIGRATIONS)
}

/// ISO date text.
#[must_use]
pub fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion(idx: usize, kind: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, kind, message.into())
}

/// Read a date column stored as `YYYY-MM-DD` text (a time suffix is ignored).
pub fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    let day = text.get(..10).unwrap_or(&text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| conversion(idx, Type::Text, format!("{text}: {e}")))
}

/// Read an optional date column.
#[cfg(test)]
pub fn optional_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        _ => date_at(row, idx).map(Some),
    }
}

/// Read a price stored as text, integer or real.
pub fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let value = row.get_ref(idx)?;
    let parsed = match value {
        ValueRef::Integer(i) => Some(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::from_f64(f),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    };
    parsed.ok_or_else(|| conversion(idx, value.data_type(), format!("not a price: {value:?}")))
}

/// Read a non-negative count stored as integer or real.
pub fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value = row.get_ref(idx)?;
    let parsed = match value {
        ValueRef::Integer(i) => u64::try_from(i).ok(),
        ValueRef::Real(f) if f.is_finite() && f >= 0.0 => format!("{f:.0}").parse().ok(),
        ValueRef::Null => Some(0),
        _ => None,
    };
    parsed.ok_or_else(|| conversion(idx, value.data_type(), format!("not a count: {value:?}")))
}

/// Decode the standard record columns starting at `first`:
/// Symbol, Date, ExpiryDate, Open, High, Low, Close, VolumeLots,
/// OpenInterestLots, TDM.
pub fn record_at(row: &Row<'_>, first: usize) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        symbol: row.get::<_, String>(first)?.trim().to_string(),
        trading_date: date_at(row, first + 1)?,
        expiry_date: date_at(row, first + 2)?,
        open: decimal_at(row, first + 3)?,
        high: decimal_at(row, first + 4)?,
        low: decimal_at(row, first + 5)?,
        close: decimal_at(row, first + 6)?,
        volume: count_at(row, first + 7)?,
        open_interest: count_at(row, first + 8)?,
        trading_day_of_month: u32::try_from(count_at(row, first + 9)?).unwrap_or(0),
    })
}
