//! Relational series sink.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use super::schema::{date_at, date_text, migrate, record_at};
use crate::application::ports::{SeriesKind, SeriesSink, SinkError};
use crate::domain::adjustment::MultiplierTable;
use crate::domain::audit::AuditReport;
use crate::domain::expiry::ExpiryHistory;
use crate::domain::record::RawRecord;

const BUILT_THROUGH_KEY: &str = "expiries_built_through";
const MULTIPLIERS_KEY: &str = "multipliers_written";

fn storage(e: rusqlite::Error) -> SinkError {
    SinkError::Storage {
        message: e.to_string(),
    }
}

fn optional_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(date_text)
}

/// [`SeriesSink`] over a SQLite database. Each write runs in one
/// transaction and replaces what it covers.
pub struct SqliteSeriesSink {
    conn: Connection,
}

impl SqliteSeriesSink {
    /// Open (or create) the database and its output tables.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Storage`] when the file cannot be opened or
    /// migrated.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, creating output tables.
    pub fn from_connection(conn: Connection) -> Result<Self, SinkError> {
        migrate(&conn).map_err(storage)?;
        Ok(Self { conn })
    }

    fn meta(&self, key: &str) -> Result<Option<String>, SinkError> {
        self.conn
            .query_row(
                "SELECT Value FROM tblMeta WHERE Key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(storage)
    }
}

fn set_meta(tx: &Transaction<'_>, key: &str, value: Option<String>) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO tblMeta (Key, Value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn write_audit(tx: &Transaction<'_>, report: &AuditReport) -> rusqlite::Result<()> {
    for table in [
        "tblNoneSelected",
        "tblFlatMultiplier",
        "tblChangedDates",
        "tblExpiryRegressions",
        "tblNextSelected",
        "tblRolloverEvents",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }

    let mut stmt = tx.prepare(
        "INSERT INTO tblNoneSelected
            (Label, Symbol, Date, ImpliedCurrentExpiry, AvailableExpiries, Status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for e in &report.none_selected {
        let available = e
            .available_expiries
            .iter()
            .map(|d| date_text(*d))
            .collect::<Vec<_>>()
            .join(";");
        stmt.execute(params![
            e.label,
            e.symbol,
            date_text(e.date),
            optional_text(e.implied_current_expiry),
            available,
            e.status.to_string(),
        ])?;
    }
    drop(stmt);

    let mut stmt = tx.prepare(
        "INSERT INTO tblFlatMultiplier (Label, Date, PreviousExpiry, CurrentExpiry)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for f in &report.flat_multipliers {
        stmt.execute(params![
            f.label,
            date_text(f.date),
            date_text(f.previous_expiry),
            date_text(f.current_expiry),
        ])?;
    }
    drop(stmt);

    let mut stmt = tx.prepare(
        "INSERT INTO tblChangedDates (Date, Label, OldExpiry, NewExpiry, Action)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for c in &report.change_log {
        stmt.execute(params![
            date_text(c.date),
            c.label,
            optional_text(c.old_expiry),
            date_text(c.new_expiry),
            c.action.to_string(),
        ])?;
    }
    drop(stmt);

    let mut stmt = tx.prepare(
        "INSERT INTO tblExpiryRegressions (Label, Date, PreviousExpiry, CurrentExpiry)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for r in &report.expiry_regressions {
        stmt.execute(params![
            r.label,
            date_text(r.date),
            date_text(r.previous_expiry),
            date_text(r.current_expiry),
        ])?;
    }
    drop(stmt);

    let mut stmt = tx.prepare(
        "INSERT INTO tblNextSelected (Label, Date, CurrentExpiry, SelectedExpiry)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for n in &report.next_selected {
        stmt.execute(params![
            n.label,
            date_text(n.date),
            date_text(n.current_expiry),
            date_text(n.selected_expiry),
        ])?;
    }
    drop(stmt);

    let mut stmt = tx.prepare(
        "INSERT INTO tblRolloverEvents (Label, Date, FromExpiry, ToExpiry, ObservedRatio)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for e in &report.rollover_events {
        stmt.execute(params![
            e.label,
            date_text(e.date),
            optional_text(e.from_expiry),
            date_text(e.to_expiry),
            e.observed_ratio,
        ])?;
    }
    drop(stmt);
    Ok(())
}

impl SeriesSink for SqliteSeriesSink {
    fn persist_series(
        &mut self,
        label: &str,
        kind: SeriesKind,
        records: &[RawRecord],
    ) -> Result<(), SinkError> {
        let tx = self.conn.transaction().map_err(storage)?;
        tx.execute(
            "DELETE FROM tblFutures WHERE Kind = ?1 AND Label = ?2",
            params![kind.as_str(), label],
        )
        .map_err(storage)?;

        let mut stmt = tx
            .prepare(
                "INSERT INTO tblFutures
                    (Kind, Label, Symbol, Date, ExpiryDate, Open, High, Low, Close,
                     VolumeLots, OpenInterestLots, TDM)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .map_err(storage)?;
        for r in records {
            stmt.execute(params![
                kind.as_str(),
                label,
                r.symbol,
                date_text(r.trading_date),
                date_text(r.expiry_date),
                r.open.to_string(),
                r.high.to_string(),
                r.low.to_string(),
                r.close.to_string(),
                i64::try_from(r.volume).unwrap_or(i64::MAX),
                i64::try_from(r.open_interest).unwrap_or(i64::MAX),
                r.trading_day_of_month,
            ])
            .map_err(storage)?;
        }
        drop(stmt);
        tx.commit().map_err(storage)?;

        debug!(label, kind = %kind, rows = records.len(), "Stored series");
        Ok(())
    }

    fn read_series(&self, label: &str, kind: SeriesKind) -> Result<Vec<RawRecord>, SinkError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT Symbol, Date, ExpiryDate, Open, High, Low, Close,
                        VolumeLots, OpenInterestLots, TDM
                 FROM tblFutures WHERE Kind = ?1 AND Label = ?2 ORDER BY Date",
            )
            .map_err(storage)?;

        stmt.query_map(params![kind.as_str(), label], |row| record_at(row, 0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SinkError::Encoding {
                location: format!("tblFutures/{kind}/{label}"),
                message: e.to_string(),
            })
    }

    fn series_labels(&self, kind: SeriesKind) -> Result<Vec<String>, SinkError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT Label FROM tblFutures WHERE Kind = ?1 ORDER BY Label")
            .map_err(storage)?;

        stmt.query_map(params![kind.as_str()], |row| row.get(0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)
    }

    fn persist_expiry_history(&mut self, history: &ExpiryHistory) -> Result<(), SinkError> {
        let tx = self.conn.transaction().map_err(storage)?;
        tx.execute("DELETE FROM tblExpiries", []).map_err(storage)?;

        let mut stmt = tx
            .prepare("INSERT INTO tblExpiries (Symbol, ExpiryDate, TDM) VALUES (?1, ?2, ?3)")
            .map_err(storage)?;
        for (symbol, expiry) in history.rows() {
            stmt.execute(params![symbol, date_text(expiry), history.tdm_at(expiry)])
                .map_err(storage)?;
        }
        drop(stmt);

        set_meta(&tx, BUILT_THROUGH_KEY, optional_text(history.built_through()))
            .map_err(storage)?;
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn read_expiry_history(&self) -> Result<Option<ExpiryHistory>, SinkError> {
        let written = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM tblMeta WHERE Key = ?1",
                params![BUILT_THROUGH_KEY],
                |row| row.get::<_, i64>(0),
            )
            .map_err(storage)?;
        if written == 0 {
            return Ok(None);
        }

        let built_through = self
            .meta(BUILT_THROUGH_KEY)?
            .map(|text| {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| SinkError::Encoding {
                    location: format!("tblMeta/{BUILT_THROUGH_KEY}"),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let mut stmt = self
            .conn
            .prepare("SELECT Symbol, ExpiryDate, TDM FROM tblExpiries ORDER BY Symbol, ExpiryDate")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    date_at(row, 1)?,
                    row.get::<_, Option<u32>>(2)?,
                ))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        let mut expiries: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
        let mut tdm_at_expiry = BTreeMap::new();
        for (symbol, expiry, tdm) in rows {
            expiries.entry(symbol).or_default().insert(expiry);
            tdm_at_expiry.insert(expiry, tdm);
        }

        Ok(Some(ExpiryHistory::from_resolved(
            expiries,
            tdm_at_expiry,
            built_through,
        )))
    }

    fn persist_multiplier_table(&mut self, table: &MultiplierTable) -> Result<(), SinkError> {
        let tx = self.conn.transaction().map_err(storage)?;
        tx.execute("DELETE FROM tblMultipliers", []).map_err(storage)?;

        let mut stmt = tx
            .prepare("INSERT INTO tblMultipliers (Label, Date, Multiplier) VALUES (?1, ?2, ?3)")
            .map_err(storage)?;
        for label in table.labels() {
            for (date, ratio) in table.multipliers(label) {
                stmt.execute(params![label, date_text(date), ratio])
                    .map_err(storage)?;
            }
        }
        drop(stmt);

        set_meta(&tx, MULTIPLIERS_KEY, Some(table.len().to_string())).map_err(storage)?;
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn read_multiplier_table(&self) -> Result<Option<MultiplierTable>, SinkError> {
        if self.meta(MULTIPLIERS_KEY)?.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT Label, Date, Multiplier FROM tblMultipliers ORDER BY Label, Date")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, date_at(row, 1)?, row.get::<_, f64>(2)?))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        let mut table = MultiplierTable::new();
        for (label, date, ratio) in rows {
            table.insert(&label, date, ratio);
        }
        Ok(Some(table))
    }

    fn persist_audit(&mut self, report: &AuditReport) -> Result<(), SinkError> {
        let tx = self.conn.transaction().map_err(storage)?;
        write_audit(&tx, report).map_err(storage)?;
        tx.commit().map_err(storage)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
