//! SQLite executor and connection bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections with the pragmas core expects.
//! - Execute SQL with named placeholders bound from a `ParameterSet`.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Every placeholder must find a value; extra set entries are ignored.
//! - A batch runs in one transaction and rolls back entirely on failure.

use super::{ExecutorError, Record, SqlExecutor};
use crate::params::ParameterSet;
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{Connection, Statement};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file ready for statement execution.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    open_logged("file", || Connection::open(path))
}

/// Opens an in-memory SQLite database ready for statement execution.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> rusqlite::Result<Connection> {
    open_logged("memory", Connection::open_in_memory)
}

fn open_logged(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> rusqlite::Result<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=executor status=start mode={mode}");

    let result = open().and_then(|conn| {
        bootstrap_connection(&conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=executor status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=executor status=error mode={} duration_ms={} error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Named-parameter binding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The statement uses an anonymous `?` placeholder.
    Positional { index: usize },
    /// No value was supplied for a named placeholder.
    Missing { name: String },
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positional { index } => write!(
                f,
                "placeholder {index} is positional; only named placeholders are supported"
            ),
            Self::Missing { name } => write!(f, "no value supplied for parameter `{name}`"),
        }
    }
}

impl Error for BindError {}

/// `SqlExecutor` over one SQLite connection.
///
/// The connection sits behind a mutex so one executor can serve many threads.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        open_db(path).map(Self::new)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        open_db_in_memory().map(Self::new)
    }

    /// Runs `f` against the underlying connection, e.g. for schema setup.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> Result<R, ExecutorError> {
        let conn = self.lock()?;
        Ok(f(&*conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ExecutorError> {
        self.conn
            .lock()
            .map_err(|_| ExecutorError::from("sqlite connection mutex is poisoned"))
    }
}

impl SqlExecutor for SqliteExecutor {
    fn query(&self, sql: &str, params: &ParameterSet) -> Result<Vec<Record>, ExecutorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        bind_named(&mut stmt, params)?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.raw_query();
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                record.push(column.as_str(), row.get::<_, Value>(index)?);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn execute(&self, sql: &str, params: &ParameterSet) -> Result<usize, ExecutorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        bind_named(&mut stmt, params)?;
        Ok(stmt.raw_execute()?)
    }

    fn execute_batch(
        &self,
        sql: &str,
        batch: &[ParameterSet],
    ) -> Result<Vec<usize>, ExecutorError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let counts = {
            let mut stmt = tx.prepare_cached(sql)?;
            let mut counts = Vec::with_capacity(batch.len());
            for params in batch {
                bind_named(&mut stmt, params)?;
                counts.push(stmt.raw_execute()?);
            }
            counts
        };
        tx.commit()?;
        Ok(counts)
    }
}

fn bind_named(stmt: &mut Statement<'_>, params: &ParameterSet) -> Result<(), ExecutorError> {
    for index in 1..=stmt.parameter_count() {
        // `?` and `?NNN` report no name or a `?`-prefixed one.
        let name = match stmt.parameter_name(index) {
            Some(placeholder) if !placeholder.starts_with('?') => placeholder
                .trim_start_matches(|c: char| matches!(c, ':' | '@' | '$'))
                .to_string(),
            _ => return Err(BindError::Positional { index }.into()),
        };
        let value = params
            .get(&name)
            .ok_or_else(|| BindError::Missing { name: name.clone() })?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(())
}
