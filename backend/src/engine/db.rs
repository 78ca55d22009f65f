//! SQLite access shared by every engine component.
//!
//! Connections are opened per request with a busy timeout so a locked
//! database surfaces as a storage error instead of blocking a worker
//! indefinitely. Identifiers are only ever interpolated after they passed
//! [`is_valid_identifier`]; all values travel as bound parameters.

use crate::engine::error::Result;
use common::model::value::{Record, Scalar};
use log::info;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Soft-delete flag carried by every grid table.
pub const DELETED_COLUMN: &str = "del";

/// Scalar SQL function lower-casing its argument with full Unicode rules.
/// SQLite's own `lower` and `LIKE` only fold ASCII.
pub const FOLD_FUNCTION: &str = "grid_fold";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Database {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        register_functions(&conn)?;
        Ok(conn)
    }

    /// Runs a SQL script against the database, used to prepare demo tables.
    pub fn bootstrap(&self, script: &Path) -> std::io::Result<()> {
        let sql = std::fs::read_to_string(script)?;
        let conn = self
            .connect()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        conn.execute_batch(&sql)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        info!("Bootstrap script {} applied", script.display());
        Ok(())
    }
}

/// Installs the engine's SQL functions on a connection.
pub fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match scalar_from_sql(ctx.get_raw(0)) {
                Scalar::Null => None,
                value => Some(value.to_text().to_lowercase()),
            })
        },
    )?;
    Ok(())
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Quotes an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Condition that hides soft-deleted rows.
pub fn not_deleted() -> String {
    format!("IFNULL({}, 0) = 0", quote_ident(DELETED_COLUMN))
}

pub fn to_sql_value(value: &Scalar) -> Value {
    match value {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Integer(i64::from(*b)),
        Scalar::Integer(i) => Value::Integer(*i),
        Scalar::Real(f) => Value::Real(*f),
        Scalar::Text(s) => Value::Text(s.clone()),
    }
}

pub fn scalar_from_sql(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Integer(i),
        ValueRef::Real(f) => Scalar::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Scalar::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Runs a query and returns every row keyed by column name, without the
/// soft-delete column.
pub fn query_records(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut record = Record::new();
        for (idx, name) in columns.iter().enumerate() {
            if name == DELETED_COLUMN {
                continue;
            }
            record.insert(name.clone(), scalar_from_sql(row.get_ref(idx)?));
        }
        Ok(record)
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
