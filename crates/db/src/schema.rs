//! Schema bootstrap.
//!
//! The schema lives in `migrations/0001_init.sql` and is applied statement
//! by statement through [`Database::execute`], so it works on both
//! backends. Every statement is `IF NOT EXISTS`; re-running is a no-op.

use tracing::info;

use crate::backend::Database;
use crate::DbError;

// Split naively on `;`, so the script must not contain one inside a string
// literal or a trailing comment. Comments go on their own `--` lines.
const INIT_SQL: &str = include_str!("../../../migrations/0001_init.sql");

/// Split the migration into executable statements, dropping comment lines.
pub fn statements() -> Vec<String> {
    let body: String = INIT_SQL
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    body.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub async fn apply_schema(db: &dyn Database) -> Result<(), DbError> {
    info!("Applying schema ({})", db.kind());
    for statement in statements() {
        db.execute(&statement, &[])
            .await
            .map_err(|err| DbError::Schema(format!("{err} while running: {statement}")))?;
    }
    Ok(())
}
