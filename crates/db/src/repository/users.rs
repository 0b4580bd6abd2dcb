//! User CRUD operations.

use chrono::Utc;
use tracing::debug;

use super::{fetch_all, fetch_optional, inserted_id, write_error};
use crate::models::{present_str, CreateUserRequest, UpdateUserRequest, User};
use crate::pool::DbPool;
use crate::scan::select_list;
use crate::{DbError, RepoError};

const ENTITY: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    db: DbPool,
}

impl UserRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Insert a new user and return it as stored.
    ///
    /// Returns [`RepoError::Conflict`] if the external id is already taken.
    pub async fn create(&self, req: &CreateUserRequest) -> Result<User, RepoError> {
        if req.external_id.is_empty() {
            return Err(RepoError::Validation("external_id is required".into()));
        }

        let now = Utc::now();
        let outcome = self
            .db
            .execute(
                "INSERT INTO users (external_id, created_at, updated_at) VALUES (?, ?, ?)",
                &[req.external_id.as_str().into(), now.into(), now.into()],
            )
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation(_) => RepoError::Conflict(format!(
                    "user with external_id `{}` already exists",
                    req.external_id
                )),
                other => write_error("create", ENTITY)(other),
            })?;

        let id = inserted_id(outcome.last_insert_id, ENTITY)?;
        debug!(id, "user created");
        self.get(id).await
    }

    /// Fetch a single user by its primary key.
    pub async fn get(&self, id: i64) -> Result<User, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", select_list::<User>(None));
        fetch_optional(&*self.db, &sql, &[id.into()], "get", ENTITY)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTITY, id))
    }

    /// Fetch a single user by the identifier its owner supplied.
    pub async fn get_by_external_id(&self, external_id: &str) -> Result<User, RepoError> {
        let sql = format!(
            "SELECT {} FROM users WHERE external_id = ?",
            select_list::<User>(None)
        );
        fetch_optional(&*self.db, &sql, &[external_id.into()], "get", ENTITY)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTITY, external_id))
    }

    /// Newest first. Bounds are passed through unchanged.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            select_list::<User>(None)
        );
        fetch_all(&*self.db, &sql, &[limit.into(), offset.into()], "list", ENTITY).await
    }

    /// Apply the non-empty fields of `req` and refresh `updated_at`.
    pub async fn update(&self, id: i64, req: &UpdateUserRequest) -> Result<User, RepoError> {
        let external_id = present_str(&req.external_id);
        let outcome = self
            .db
            .execute(
                "UPDATE users SET external_id = COALESCE(?, external_id), updated_at = ? WHERE id = ?",
                &[external_id.into(), Utc::now().into(), id.into()],
            )
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation(_) => RepoError::Conflict(format!(
                    "user with external_id `{}` already exists",
                    external_id.unwrap_or_default()
                )),
                other => write_error("update", ENTITY)(other),
            })?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "user updated");
        self.get(id).await
    }

    /// Permanently delete a user. Its room assignments go with it (schema cascade).
    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let outcome = self
            .db
            .execute("DELETE FROM users WHERE id = ?", &[id.into()])
            .await
            .map_err(RepoError::internal("delete", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "user deleted");
        Ok(())
    }
}
