//! `tblDump` record source.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags, params};

use super::schema::{DUMP_TABLE, date_at, date_text, record_at};
use crate::application::ports::{RecordSource, SourceError};
use crate::domain::record::RawRecord;

/// Reads daily snapshots from the relational dump table, restricted to one
/// instrument type (e.g. `FUTCOM`).
///
/// Expected columns: `InstrumentName, Symbol, Date, ExpiryDate, Open, High,
/// Low, Close, VolumeLots, OpenInterestLots`. The trading day of month is
/// derived at load time.
///
/// Any date with a row of any instrument is a trading day; on such a day the
/// instrument type may have no rows at all.
pub struct SqliteRecordSource {
    conn: Connection,
    instrument_type: String,
}

impl SqliteRecordSource {
    /// Open a database read-only.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] when the file cannot be opened.
    pub fn open(path: &Path, instrument_type: impl Into<String>) -> Result<Self, SourceError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| SourceError::Unavailable {
                message: format!("{}: {e}", path.display()),
            })?;
        Ok(Self::from_connection(conn, instrument_type))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, instrument_type: impl Into<String>) -> Self {
        Self {
            conn,
            instrument_type: instrument_type.into(),
        }
    }
}

impl RecordSource for SqliteRecordSource {
    fn list_available_dates(&self) -> Result<Vec<NaiveDate>, SourceError> {
        let unavailable = |e: rusqlite::Error| SourceError::Unavailable {
            message: e.to_string(),
        };
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT DISTINCT substr(Date, 1, 10) AS Day FROM {DUMP_TABLE} ORDER BY Day"
            ))
            .map_err(unavailable)?;

        stmt.query_map([], |row| date_at(row, 0))
            .map_err(unavailable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }

    fn records_for(&self, date: NaiveDate) -> Result<Vec<RawRecord>, SourceError> {
        let location = format!("{DUMP_TABLE}@{date}");
        let malformed = |e: rusqlite::Error| SourceError::Malformed {
            location: location.clone(),
            message: e.to_string(),
        };
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT Symbol, Date, ExpiryDate, Open, High, Low, Close, \
                 VolumeLots, OpenInterestLots, 0 \
                 FROM {DUMP_TABLE} WHERE InstrumentName = ?1 AND substr(Date, 1, 10) = ?2 \
                 ORDER BY trim(Symbol), ExpiryDate"
            ))
            .map_err(malformed)?;

        let records = stmt
            .query_map(params![self.instrument_type, date_text(date)], |row| {
                record_at(row, 0)
            })
            .map_err(malformed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;

        if records.is_empty() {
            let traded: bool = self
                .conn
                .query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM {DUMP_TABLE} WHERE substr(Date, 1, 10) = ?1)"
                    ),
                    params![date_text(date)],
                    |row| row.get(0),
                )
                .map_err(malformed)?;
            if !traded {
                return Err(SourceError::MissingDay { date });
            }
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
