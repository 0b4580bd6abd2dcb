//! Remote backend: a Cloudflare D1 database behind its HTTP query API.
//!
//! Every statement is one `POST .../query` carrying `{"sql", "params"}`.
//! Rows come back as JSON objects, so the engine's column order is lost
//! and every number is a float. Both `query` and `query_one` therefore
//! return named rows.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tracing::debug;

use super::{BackendKind, Database, ExecOutcome, FetchedRow, ResultSet};
use crate::config::PoolConfig;
use crate::pool::with_deadline;
use crate::wire::{self, WireValue};
use crate::DbError;

pub struct D1Database {
    http: reqwest::Client,
    query_url: String,
    api_token: String,
    in_flight: Semaphore,
    statement_timeout: Duration,
}

impl D1Database {
    pub fn new(
        endpoint: &str,
        account_id: &str,
        database_id: &str,
        api_token: &str,
        limits: &PoolConfig,
    ) -> Result<Self, DbError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(limits.max_idle as usize)
            .pool_idle_timeout(limits.idle_timeout)
            .connect_timeout(limits.connect_timeout)
            .timeout(limits.statement_timeout)
            .build()?;

        Ok(Self {
            http,
            query_url: query_url(endpoint, account_id, database_id),
            api_token: api_token.to_owned(),
            in_flight: Semaphore::new(limits.max_open as usize),
            statement_timeout: limits.statement_timeout,
        })
    }

    async fn run(&self, sql: &str, params: &[WireValue]) -> Result<StatementResult, DbError> {
        with_deadline(self.statement_timeout, async {
            let _permit = self
                .in_flight
                .acquire()
                .await
                .map_err(|_| DbError::PoolClosed)?;

            let body = json!({
                "sql": sql,
                "params": params.iter().map(param_json).collect::<Vec<_>>(),
            });
            debug!(sql, "d1 statement");

            let response = self
                .http
                .post(&self.query_url)
                .bearer_auth(&self.api_token)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            let bytes = response.bytes().await?;

            decode_response(&bytes).map_err(|err| match err {
                DbError::Remote(msg) if !status.is_success() => {
                    DbError::Remote(format!("HTTP {status}: {msg}"))
                }
                other => other,
            })
        })
        .await
    }
}

#[async_trait]
impl Database for D1Database {
    fn kind(&self) -> BackendKind {
        BackendKind::D1
    }

    async fn execute(&self, sql: &str, params: &[WireValue]) -> Result<ExecOutcome, DbError> {
        self.run(sql, params).await?.outcome()
    }

    async fn query(&self, sql: &str, params: &[WireValue]) -> Result<ResultSet, DbError> {
        Ok(self.run(sql, params).await?.into_result_set())
    }

    async fn query_one(
        &self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<Option<FetchedRow>, DbError> {
        Ok(self.run(sql, params).await?.into_first_row())
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.run("SELECT 1", &[]).await.map(|_| ())
    }
}

fn query_url(endpoint: &str, account_id: &str, database_id: &str) -> String {
    format!(
        "{}/accounts/{account_id}/d1/database/{database_id}/query",
        endpoint.trim_end_matches('/')
    )
}

// ---------------------------------------------------------------------------
// wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Result of one statement as the remote engine reports it.
#[derive(Debug, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub changes: Option<f64>,
    #[serde(default)]
    pub last_row_id: Option<f64>,
}

fn default_success() -> bool {
    true
}

impl StatementResult {
    /// Row counts arrive as JSON numbers too, so they go through the normalizer.
    pub fn outcome(&self) -> Result<ExecOutcome, DbError> {
        let as_int = |value: Option<f64>, column: &str| {
            value
                .map(|v| wire::to_i64(&WireValue::Real(v)))
                .transpose()
                .map_err(|source| {
                    DbError::Scan(crate::scan::ScanError {
                        column: column.to_owned(),
                        source,
                    })
                })
        };
        let changes = as_int(self.meta.changes, "changes")?.unwrap_or(0);
        let rows_affected = u64::try_from(changes)
            .map_err(|_| DbError::Remote(format!("negative change count {changes} in response")))?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: as_int(self.meta.last_row_id, "last_row_id")?,
        })
    }

    /// Column names are taken from the first row's keys.
    pub fn into_result_set(self) -> ResultSet {
        let columns: Vec<String> = self
            .results
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        let rows = self
            .results
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map_or(WireValue::Null, wire_from_json))
                    .collect()
            })
            .collect();
        ResultSet { columns, rows }
    }

    pub fn into_first_row(self) -> Option<FetchedRow> {
        let row = self.results.into_iter().next()?;
        let (columns, values): (Vec<String>, Vec<WireValue>) = row
            .iter()
            .map(|(k, v)| (k.clone(), wire_from_json(v)))
            .unzip();
        Some(FetchedRow::Named { columns, values })
    }
}

/// Decode a response body from the query endpoint.
pub fn decode_response(body: &[u8]) -> Result<StatementResult, DbError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|err| {
        let snippet = String::from_utf8_lossy(&body[..body.len().min(200)]);
        DbError::Remote(format!("malformed response ({err}): {snippet}"))
    })?;

    if let Some(first) = envelope.errors.first() {
        return Err(classify_message(&first.message, first.code));
    }
    if !envelope.success {
        return Err(DbError::Remote("request was not successful".into()));
    }

    let result = envelope
        .result
        .into_iter()
        .next()
        .ok_or_else(|| DbError::Remote("response carried no statement result".into()))?;
    if !result.success {
        return Err(DbError::Remote("statement was not successful".into()));
    }
    Ok(result)
}

/// Map the engine's error text onto typed constraint variants.
pub fn classify_message(message: &str, code: i64) -> DbError {
    if message.contains("UNIQUE constraint failed") {
        DbError::UniqueViolation(message.to_owned())
    } else if message.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation(message.to_owned())
    } else {
        DbError::Remote(format!("{message} (code {code})"))
    }
}

/// JSON form of a bound parameter.
pub fn param_json(value: &WireValue) -> Value {
    match value {
        WireValue::Integer(i) => json!(i),
        WireValue::Real(f) => json!(f),
        WireValue::Text(s) => json!(s),
        WireValue::Blob(b) => json!(b),
        WireValue::Timestamp(ts) => json!(wire::format_timestamp(ts)),
        WireValue::Null => Value::Null,
    }
}

/// Wire shape of a JSON column value: numbers become floats, strings text.
pub fn wire_from_json(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::Null,
        Value::Bool(b) => WireValue::Real(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| WireValue::Text(n.to_string()), WireValue::Real),
        Value::String(s) => WireValue::Text(s.clone()),
        other => WireValue::Text(other.to_string()),
    }
}
