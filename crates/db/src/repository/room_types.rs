//! Room type CRUD operations.

use chrono::Utc;
use tracing::debug;

use super::{fetch_all, fetch_optional, inserted_id, write_error};
use crate::models::{present_str, CreateRoomTypeRequest, RoomType, UpdateRoomTypeRequest};
use crate::pool::DbPool;
use crate::scan::select_list;
use crate::RepoError;

const ENTITY: &str = "room type";

#[derive(Clone)]
pub struct RoomTypeRepository {
    db: DbPool,
}

impl RoomTypeRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, req: &CreateRoomTypeRequest) -> Result<RoomType, RepoError> {
        if req.size.is_empty() || req.style.is_empty() {
            return Err(RepoError::Validation("size and style are required".into()));
        }

        let now = Utc::now();
        let outcome = self
            .db
            .execute(
                "INSERT INTO room_types (size, style, created_at, updated_at) VALUES (?, ?, ?, ?)",
                &[
                    req.size.as_str().into(),
                    req.style.as_str().into(),
                    now.into(),
                    now.into(),
                ],
            )
            .await
            .map_err(write_error("create", ENTITY))?;

        let id = inserted_id(outcome.last_insert_id, ENTITY)?;
        debug!(id, "room type created");
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<RoomType, RepoError> {
        let sql = format!(
            "SELECT {} FROM room_types WHERE id = ?",
            select_list::<RoomType>(None)
        );
        fetch_optional(&*self.db, &sql, &[id.into()], "get", ENTITY)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTITY, id))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<RoomType>, RepoError> {
        let sql = format!(
            "SELECT {} FROM room_types ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            select_list::<RoomType>(None)
        );
        fetch_all(&*self.db, &sql, &[limit.into(), offset.into()], "list", ENTITY).await
    }

    pub async fn update(&self, id: i64, req: &UpdateRoomTypeRequest) -> Result<RoomType, RepoError> {
        let outcome = self
            .db
            .execute(
                "UPDATE room_types \
                 SET size = COALESCE(?, size), style = COALESCE(?, style), updated_at = ? \
                 WHERE id = ?",
                &[
                    present_str(&req.size).into(),
                    present_str(&req.style).into(),
                    Utc::now().into(),
                    id.into(),
                ],
            )
            .await
            .map_err(write_error("update", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "room type updated");
        self.get(id).await
    }

    /// Permanently delete a room type. Rooms that used it keep existing
    /// with their `room_type_id` cleared (schema set-null).
    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let outcome = self
            .db
            .execute("DELETE FROM room_types WHERE id = ?", &[id.into()])
            .await
            .map_err(RepoError::internal("delete", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        debug!(id, "room type deleted");
        Ok(())
    }
}
