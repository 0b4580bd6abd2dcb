//! Repositories: one per table, plus the user/room relationship manager.
//!
//! Every repository holds a [`DbPool`] and returns `Result<T, RepoError>`.
//! SQL is written once and runs unmodified on both backends; rows are
//! rebuilt through [`crate::scan`].

pub mod relationships;
pub mod room_types;
pub mod rooms;
pub mod users;

use crate::backend::Database;
use crate::scan::{scan, Record};
use crate::wire::WireValue;
use crate::{DbError, RepoError};

pub use relationships::RelationshipManager;
pub use room_types::RoomTypeRepository;
pub use rooms::RoomRepository;
pub use users::UserRepository;

/// Run a single-row read and scan the row, if any.
pub(crate) async fn fetch_optional<T: Record>(
    db: &dyn Database,
    sql: &str,
    params: &[WireValue],
    op: &'static str,
    entity: &'static str,
) -> Result<Option<T>, RepoError> {
    let row = db
        .query_one(sql, params)
        .await
        .map_err(RepoError::internal(op, entity))?;

    row.map(|row| scan::<T>(row.as_row()))
        .transpose()
        .map_err(|err| RepoError::internal(op, entity)(DbError::Scan(err)))
}

/// Run a multi-row read and scan every row. No rows is an empty `Vec`.
pub(crate) async fn fetch_all<T: Record>(
    db: &dyn Database,
    sql: &str,
    params: &[WireValue],
    op: &'static str,
    entity: &'static str,
) -> Result<Vec<T>, RepoError> {
    let set = db
        .query(sql, params)
        .await
        .map_err(RepoError::internal(op, entity))?;

    set.rows()
        .map(scan::<T>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| RepoError::internal(op, entity)(DbError::Scan(err)))
}

/// Classify a failed write: constraint violations become caller-facing
/// kinds, everything else is internal.
pub(crate) fn write_error(op: &'static str, entity: &'static str) -> impl FnOnce(DbError) -> RepoError {
    move |err| match err {
        DbError::UniqueViolation(detail) => {
            RepoError::Conflict(format!("{entity} already exists ({detail})"))
        }
        DbError::ForeignKeyViolation(detail) => {
            RepoError::Validation(format!("{entity} references a row that does not exist ({detail})"))
        }
        source => RepoError::Internal { op, entity, source },
    }
}

/// Generated id of a successful insert.
pub(crate) fn inserted_id(last_insert_id: Option<i64>, entity: &'static str) -> Result<i64, RepoError> {
    last_insert_id.ok_or_else(|| {
        RepoError::internal("create", entity)(DbError::Remote(
            "backend did not report a generated id".into(),
        ))
    })
}
