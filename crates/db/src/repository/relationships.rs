//! The many-to-many link between users and rooms (`user_rooms`).
//!
//! Uniqueness of a (user, room) pair is enforced by the table's UNIQUE
//! constraint. `assign` counts existing rows first only so the common case
//! reports a clean conflict; a concurrent insert that slips past the count
//! is still rejected by the constraint and reported the same way.
//!
//! Deleting a user or a room removes its pairs through the schema's
//! `ON DELETE CASCADE`; nothing here re-implements that.

use chrono::Utc;
use tracing::{debug, warn};

use super::{fetch_all, fetch_optional, RoomRepository, UserRepository};
use crate::models::{AssignmentCount, Room, RoomWithUsers, User, UserWithRooms};
use crate::pool::DbPool;
use crate::scan::select_list;
use crate::{DbError, RepoError};

const ENTITY: &str = "assignment";

#[derive(Clone)]
pub struct RelationshipManager {
    db: DbPool,
    users: UserRepository,
    rooms: RoomRepository,
}

impl RelationshipManager {
    pub fn new(db: DbPool) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            rooms: RoomRepository::new(db.clone()),
            db,
        }
    }

    /// Link a user to a room.
    ///
    /// Fails with `Conflict` if the pair already exists and with `NotFound`
    /// if either side does not exist.
    pub async fn assign(&self, user_id: i64, room_id: i64) -> Result<(), RepoError> {
        let existing: AssignmentCount = fetch_optional(
            &*self.db,
            "SELECT COUNT(*) AS assignments FROM user_rooms WHERE user_id = ? AND room_id = ?",
            &[user_id.into(), room_id.into()],
            "check",
            ENTITY,
        )
        .await?
        .unwrap_or_default();

        if existing.assignments > 0 {
            return Err(already_assigned(user_id, room_id));
        }

        let inserted = self
            .db
            .execute(
                "INSERT INTO user_rooms (user_id, room_id, created_at) VALUES (?, ?, ?)",
                &[user_id.into(), room_id.into(), Utc::now().into()],
            )
            .await;

        match inserted {
            Ok(_) => {
                debug!(user_id, room_id, "user assigned to room");
                Ok(())
            }
            Err(DbError::UniqueViolation(_)) => {
                warn!(user_id, room_id, "concurrent assignment rejected by unique constraint");
                Err(already_assigned(user_id, room_id))
            }
            Err(DbError::ForeignKeyViolation(_)) => Err(RepoError::NotFound {
                entity: "user or room",
                key: format!("user {user_id}, room {room_id}"),
            }),
            Err(source) => Err(RepoError::Internal {
                op: "create",
                entity: ENTITY,
                source,
            }),
        }
    }

    /// Unlink one pair. `NotFound` means there was nothing to unlink.
    pub async fn remove(&self, user_id: i64, room_id: i64) -> Result<(), RepoError> {
        let outcome = self
            .db
            .execute(
                "DELETE FROM user_rooms WHERE user_id = ? AND room_id = ?",
                &[user_id.into(), room_id.into()],
            )
            .await
            .map_err(RepoError::internal("delete", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                key: format!("user {user_id} is not assigned to room {room_id}"),
            });
        }
        debug!(user_id, room_id, "user removed from room");
        Ok(())
    }

    /// Unlink a user from every room. `NotFound` if the user had no rooms.
    pub async fn remove_all_for_user(&self, user_id: i64) -> Result<u64, RepoError> {
        let outcome = self
            .db
            .execute("DELETE FROM user_rooms WHERE user_id = ?", &[user_id.into()])
            .await
            .map_err(RepoError::internal("delete", ENTITY))?;

        if outcome.rows_affected == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                key: format!("user {user_id} is not assigned to any rooms"),
            });
        }
        debug!(user_id, removed = outcome.rows_affected, "user removed from all rooms");
        Ok(outcome.rows_affected)
    }

    /// A room and its users, ordered by external id.
    ///
    /// `NotFound` only if the room itself is missing.
    pub async fn room_with_users(&self, room_id: i64) -> Result<RoomWithUsers, RepoError> {
        let room = self.rooms.get(room_id).await?;
        let sql = format!(
            "SELECT {} FROM users u \
             INNER JOIN user_rooms ur ON u.id = ur.user_id \
             WHERE ur.room_id = ? \
             ORDER BY u.external_id",
            select_list::<User>(Some("u"))
        );
        let users = fetch_all(&*self.db, &sql, &[room_id.into()], "list users of", "room").await?;
        Ok(RoomWithUsers { room, users })
    }

    /// Rooms a user is assigned to, ordered by name. Empty if none.
    pub async fn user_rooms(&self, user_id: i64) -> Result<Vec<Room>, RepoError> {
        let sql = format!(
            "SELECT {} FROM rooms r \
             INNER JOIN user_rooms ur ON r.id = ur.room_id \
             WHERE ur.user_id = ? \
             ORDER BY r.name",
            select_list::<Room>(Some("r"))
        );
        fetch_all(&*self.db, &sql, &[user_id.into()], "list rooms of", "user").await
    }

    /// A user and their rooms. `NotFound` only if the user itself is missing.
    pub async fn user_with_rooms(&self, user_id: i64) -> Result<UserWithRooms, RepoError> {
        let user = self.users.get(user_id).await?;
        let rooms = self.user_rooms(user_id).await?;
        Ok(UserWithRooms { user, rooms })
    }
}

fn already_assigned(user_id: i64, room_id: i64) -> RepoError {
    RepoError::Conflict(format!("user {user_id} is already assigned to room {room_id}"))
}
