//! Shared fixtures for the repository integration tests.
//!
//! Two harnesses are provided:
//! - `embedded()`: a SQLite file in a temp dir, natively typed rows.
//! - `remote_shaped()`: the same SQLite file, but every request and
//!   response is pushed through the D1 JSON wire format, so rows arrive as
//!   floats and strings with columns in whatever order the JSON object has.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use db::backend::d1::{decode_response, param_json};
use db::backend::sqlite::SqliteDatabase;
use db::backend::{BackendKind, Database, ExecOutcome, FetchedRow, ResultSet};
use db::wire::{format_timestamp, WireValue};
use db::{apply_schema, DbError, DbPool, PoolConfig};

pub struct Harness {
    pub pool: DbPool,
    _dir: TempDir,
}

async fn open_sqlite(dir: &TempDir) -> SqliteDatabase {
    SqliteDatabase::open(&dir.path().join("rooms.db"), &PoolConfig::default())
        .await
        .expect("open sqlite")
}

pub async fn embedded() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let pool: DbPool = Arc::new(open_sqlite(&dir).await);
    apply_schema(pool.as_ref()).await.expect("apply schema");
    Harness { pool, _dir: dir }
}

pub async fn remote_shaped() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let pool: DbPool = Arc::new(RemoteShaped {
        inner: open_sqlite(&dir).await,
    });
    apply_schema(pool.as_ref()).await.expect("apply schema");
    Harness { pool, _dir: dir }
}

/// Generate an `embedded` and a `remote_shaped` test for each scenario fn.
macro_rules! on_both_backends {
    ($($scenario:ident),* $(,)?) => {
        $(
            mod $scenario {
                #[tokio::test]
                async fn embedded() {
                    let harness = crate::common::embedded().await;
                    super::$scenario(harness.pool.clone()).await;
                }

                #[tokio::test]
                async fn remote_shaped() {
                    let harness = crate::common::remote_shaped().await;
                    super::$scenario(harness.pool.clone()).await;
                }
            }
        )*
    };
}

/// SQLite behind a D1-style JSON boundary.
pub struct RemoteShaped {
    inner: SqliteDatabase,
}

impl RemoteShaped {
    fn params(params: &[WireValue]) -> Vec<WireValue> {
        params
            .iter()
            .map(|p| match param_json(p) {
                Value::Null => WireValue::Null,
                Value::Number(n) => match n.as_i64() {
                    Some(i) => WireValue::Integer(i),
                    None => WireValue::Real(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => WireValue::Text(s),
                other => WireValue::Text(other.to_string()),
            })
            .collect()
    }

    fn value_json(value: &WireValue) -> Value {
        match value {
            WireValue::Integer(i) => json!(i),
            WireValue::Real(f) => json!(f),
            WireValue::Text(s) => json!(s),
            WireValue::Blob(b) => json!(String::from_utf8_lossy(b)),
            WireValue::Timestamp(ts) => json!(format_timestamp(ts)),
            WireValue::Null => Value::Null,
        }
    }

    fn rows_envelope(set: &ResultSet) -> Vec<u8> {
        let results: Vec<Map<String, Value>> = set
            .rows
            .iter()
            .map(|values| {
                set.columns
                    .iter()
                    .zip(values)
                    .map(|(c, v)| (c.clone(), Self::value_json(v)))
                    .collect()
            })
            .collect();
        let body = json!({
            "success": true,
            "errors": [],
            "result": [{"success": true, "results": results, "meta": {"changes": 0}}],
        });
        serde_json::to_vec(&body).expect("encode envelope")
    }

    fn error_envelope(message: &str) -> Vec<u8> {
        let body = json!({
            "success": false,
            "errors": [{"code": 7500, "message": format!("{message}: SQLITE_CONSTRAINT")}],
            "result": [],
        });
        serde_json::to_vec(&body).expect("encode envelope")
    }

    fn failure(err: DbError) -> Result<Vec<u8>, DbError> {
        match err {
            DbError::UniqueViolation(m) | DbError::ForeignKeyViolation(m) => {
                Ok(Self::error_envelope(&m))
            }
            other => Err(other),
        }
    }

    async fn read(&self, sql: &str, params: &[WireValue]) -> Result<ResultSet, DbError> {
        let body = match self.inner.query(sql, &Self::params(params)).await {
            Ok(set) => Self::rows_envelope(&set),
            Err(err) => Self::failure(err)?,
        };
        Ok(decode_response(&body)?.into_result_set())
    }
}

#[async_trait]
impl Database for RemoteShaped {
    fn kind(&self) -> BackendKind {
        BackendKind::D1
    }

    async fn execute(&self, sql: &str, params: &[WireValue]) -> Result<ExecOutcome, DbError> {
        let body = match self.inner.execute(sql, &Self::params(params)).await {
            Ok(outcome) => serde_json::to_vec(&json!({
                "success": true,
                "errors": [],
                "result": [{
                    "success": true,
                    "results": [],
                    "meta": {
                        "changes": outcome.rows_affected,
                        "last_row_id": outcome.last_insert_id,
                    },
                }],
            }))
            .expect("encode envelope"),
            Err(err) => Self::failure(err)?,
        };
        decode_response(&body)?.outcome()
    }

    async fn query(&self, sql: &str, params: &[WireValue]) -> Result<ResultSet, DbError> {
        self.read(sql, params).await
    }

    async fn query_one(
        &self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<Option<FetchedRow>, DbError> {
        let set = self.read(sql, params).await?;
        Ok(set.rows.into_iter().next().map(|values| FetchedRow::Named {
            columns: set.columns.clone(),
            values,
        }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.inner.ping().await
    }
}
