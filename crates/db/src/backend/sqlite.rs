//! Embedded backend: SQLite through a sqlx pool.
//!
//! Values come back natively typed. Multi-row results report their
//! column names; the single-row path hands back bare values, the way a
//! driver's row API does when it cannot describe its columns.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{query::Query, Column, Row, Sqlite, TypeInfo, ValueRef};

use super::{BackendKind, Database, ExecOutcome, FetchedRow, ResultSet};
use crate::config::PoolConfig;
use crate::pool::with_deadline;
use crate::wire::{format_timestamp, WireValue};
use crate::DbError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteDatabase {
    pool: SqlitePool,
    statement_timeout: Duration,
}

impl SqliteDatabase {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path, limits: &PoolConfig) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(limits.max_open)
            .min_connections(limits.max_idle.min(limits.max_open))
            .max_lifetime(limits.max_lifetime)
            .idle_timeout(limits.idle_timeout)
            .acquire_timeout(limits.connect_timeout)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            statement_timeout: limits.statement_timeout,
        })
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[WireValue]) -> Result<ExecOutcome, DbError> {
        with_deadline(self.statement_timeout, async {
            let result = bind_all(sqlx::query(sql), params)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            Ok::<_, DbError>(ExecOutcome {
                rows_affected: result.rows_affected(),
                last_insert_id: Some(result.last_insert_rowid()),
            })
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[WireValue]) -> Result<ResultSet, DbError> {
        with_deadline(self.statement_timeout, async {
            let rows = bind_all(sqlx::query(sql), params)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

            let columns = rows
                .first()
                .map(|row| row.columns().iter().map(|c| c.name().to_owned()).collect())
                .unwrap_or_default();
            let rows = rows.iter().map(decode_row).collect::<Result<_, _>>()?;
            Ok::<_, DbError>(ResultSet { columns, rows })
        })
        .await
    }

    async fn query_one(
        &self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<Option<FetchedRow>, DbError> {
        with_deadline(self.statement_timeout, async {
            let row = bind_all(sqlx::query(sql), params)
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;
            Ok::<_, DbError>(match row {
                Some(row) => Some(FetchedRow::Positional(decode_row(&row)?)),
                None => None,
            })
        })
        .await
    }

    async fn ping(&self) -> Result<(), DbError> {
        with_deadline(self.statement_timeout, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, DbError>(())
        })
        .await
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [WireValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            WireValue::Integer(i) => query.bind(*i),
            WireValue::Real(f) => query.bind(*f),
            WireValue::Text(s) => query.bind(s.as_str()),
            WireValue::Blob(b) => query.bind(b.as_slice()),
            WireValue::Timestamp(ts) => query.bind(format_timestamp(ts)),
            WireValue::Null => query.bind(None::<i64>),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Vec<WireValue>, DbError> {
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

// The storage class of the value decides its wire shape. Columns declared
// DATETIME are handed back as native timestamps when they decode as one.
fn decode_value(row: &SqliteRow, index: usize) -> Result<WireValue, DbError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(WireValue::Null);
    }
    let storage = raw.type_info().name().to_owned();

    if row.column(index).type_info().name() == "DATETIME" {
        if let Ok(ts) = row.try_get_unchecked::<DateTime<Utc>, _>(index) {
            return Ok(WireValue::Timestamp(ts));
        }
    }

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => WireValue::Integer(row.try_get_unchecked(index)?),
        "REAL" => WireValue::Real(row.try_get_unchecked(index)?),
        "BLOB" => WireValue::Blob(row.try_get_unchecked(index)?),
        _ => WireValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

fn classify(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DbError::UniqueViolation(db_err.message().to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return DbError::ForeignKeyViolation(db_err.message().to_owned());
        }
    }
    DbError::Sqlx(err)
}
