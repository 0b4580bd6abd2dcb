//! The two-primitive surface every repository is written against.
//!
//! A backend executes writes and runs reads; it never interprets rows.
//! Faults are classified into [`DbError`] variants here, at the driver
//! boundary, so nothing above has to look at driver message text.

pub mod d1;
pub mod sqlite;


use std::fmt;

use async_trait::async_trait;

use crate::scan::RowRef;
use crate::wire::WireValue;
use crate::DbError;

/// Which engine a [`Database`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded SQLite through sqlx.
    Sqlite,
    /// Remote D1-style engine over HTTP.
    D1,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::D1 => write!(f, "d1"),
        }
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A multi-row result. Always reports its column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<WireValue>>,
}

impl ResultSet {
    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(|values| RowRef::Named {
            columns: &self.columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single fetched row, shaped by what the backend's single-row API exposes.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRow {
    Named {
        columns: Vec<String>,
        values: Vec<WireValue>,
    },
    /// Values in `SELECT` order, without column names.
    Positional(Vec<WireValue>),
}

impl FetchedRow {
    pub fn as_row(&self) -> RowRef<'_> {
        match self {
            Self::Named { columns, values } => RowRef::Named { columns, values },
            Self::Positional(values) => RowRef::Positional(values),
        }
    }
}

/// A connection pool to one SQL engine.
///
/// Parameters are bound positionally to `?` placeholders. Every call is
/// bounded by the pool's statement timeout; dropping the returned future
/// abandons the call.
#[async_trait]
pub trait Database: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Run a write statement.
    async fn execute(&self, sql: &str, params: &[WireValue]) -> Result<ExecOutcome, DbError>;

    /// Run a read statement and collect every row.
    async fn query(&self, sql: &str, params: &[WireValue]) -> Result<ResultSet, DbError>;

    /// Run a read statement and return its first row, if any.
    async fn query_one(&self, sql: &str, params: &[WireValue])
        -> Result<Option<FetchedRow>, DbError>;

    /// Round-trip a trivial statement to verify connectivity.
    async fn ping(&self) -> Result<(), DbError>;
}
