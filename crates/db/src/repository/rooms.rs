//! Room CRUD operations.

use chrono::Utc;
use tracing::debug;

use super::{fetch_all, fetch_optional, inserted_id};
use crate::models::{present_id, present_str, CreateRoomRequest, Room, UpdateRoomRequest};
use crate::pool::DbPool;
use crate::scan::select_list;
use crate::{DbError, RepoError};

const ENTITY: &str = "room";

#[derive(Clone)]
pub struct RoomRepository {
    db: DbPool,
}

impl RoomRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Insert a new room and return it as stored.
    ///
    /// `description` defaults to the empty string; a `room_type_id` of zero
    /// or less means "no room type".
    pub async fn create(&self, req: &CreateRoomRequest) -> Result<Room, RepoError> {
        if req.name.is_empty() {
            return Err(RepoError::Validation("room name is required".into()));
        }

        let room_type_id = present_id(req.room_type_id);
        let now = Utc::now();
        let outcome = self
            .db
            .execute(
                "INSERT INTO rooms (name, description, room_type_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
                &[
                    req.name.as_str().into(),
                    req.description.as_str().into(),
                    room_type_id.into(),
                    now.into(),
                    now.into(),
                ],
            )
            .await
            .map_err(|err| room_write_error(err, "create", room_type_id))?;

        let id = inserted_id(outcome.last_insert_id, ENTITY)?;
        debug!(id, "room created");
        self.get(id).await
    }

    /// Fetch a single room by its primary key.
    pub async fn get(&self, id: i64) -> Result<Room, RepoError> {
        let sql = format!("SELECT {} FROM rooms WHERE id = ?", select_list::<Room>(None));
        fetch_optional(&*self.db, &sql, &[id.into()], "get", ENTITY)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTITY, id))
    }

    /// Newest first. Bounds are passed through unchanged.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Room>, RepoError> {
        let sql = format!(
            "SELECT {} FROM rooms ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            select_list::<Room>(None)
        );
        fetch_all(&*self.db, &sql, &[limit.into(), offset.into()], "list", ENTITY).await
    }

    /// Apply the present fields of `req` and refresh `updated_at`.
    ///
    /// Strings count as present when non-empty, `room_type_id` when greater
    /// than zero. A field can be replaced but never cleared this way.
    pub async fn update(&self, id: i64, req: &UpdateRoomRequest) -> Result<Room, RepoError> {
        let room_type_id = present_id(req.room_type_id);
        let outcome = self
            .db
            .execute(
                "UPDATE rooms \
                 SET name = COALESCE(?, name), \
                     description = COALESCE(?, description), \
                     room_type_id = COALESCE(?, room_type_id), \
                     updated_at = ? \
                 WHERE id = ?",
                &[
                    present_str(&req.name).into(),
                    present_str(&req.description).into(),
                    room_type_id.into(),
                    Utc::now().into(),
                    id.into(),
                ],
            )
            .await
            .map_err(|err| room_write_error(err, "update", room_type_id))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "room updated");
        self.get(id).await
    }

    /// Permanently delete a room. Its user assignments go with it (schema cascade).
    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let outcome = self
            .db
            .execute("DELETE FROM rooms WHERE id = ?", &[id.into()])
            .await
            .map_err(RepoError::internal("delete", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "room deleted");
        Ok(())
    }
}

fn room_write_error(err: DbError, op: &'static str, room_type_id: Option<i64>) -> RepoError {
    match err {
        DbError::ForeignKeyViolation(_) => RepoError::Validation(format!(
            "room type {} does not exist",
            room_type_id.unwrap_or_default()
        )),
        other => super::write_error(op, ENTITY)(other),
    }
}
