//! Records and request payloads for every table in the schema.
//!
//! Records implement [`Record`] so the row scanner can rebuild them from
//! either backend. Request types use `Option` fields; for partial updates a
//! field counts as present only when it is `Some` and non-empty (strings)
//! or greater than zero (references).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::Record;
use crate::wire::{self, NormalizeError, WireValue};

// Required timestamps keep their default when the column is null.
fn set_timestamp(slot: &mut DateTime<Utc>, value: &WireValue) -> Result<(), NormalizeError> {
    if let Some(ts) = wire::to_timestamp(value)? {
        *slot = ts;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

/// A persisted user row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Identifier supplied by the caller; unique across all users.
    pub external_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    const COLUMNS: &'static [&'static str] = &["id", "external_id", "created_at", "updated_at"];

    fn set_column(&mut self, column: &str, value: &WireValue) -> Result<(), NormalizeError> {
        match column {
            "id" => self.id = wire::to_i64(value)?,
            "external_id" => self.external_id = wire::to_string(value)?,
            "created_at" => set_timestamp(&mut self.created_at, value)?,
            "updated_at" => set_timestamp(&mut self.updated_at, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub external_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

// ---------------------------------------------------------------------------
// room_types
// ---------------------------------------------------------------------------

/// A persisted room type row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: i64,
    pub size: String,
    pub style: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for RoomType {
    const COLUMNS: &'static [&'static str] = &["id", "size", "style", "created_at", "updated_at"];

    fn set_column(&mut self, column: &str, value: &WireValue) -> Result<(), NormalizeError> {
        match column {
            "id" => self.id = wire::to_i64(value)?,
            "size" => self.size = wire::to_string(value)?,
            "style" => self.style = wire::to_string(value)?,
            "created_at" => set_timestamp(&mut self.created_at, value)?,
            "updated_at" => set_timestamp(&mut self.updated_at, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomTypeRequest {
    pub size: String,
    pub style: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoomTypeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

// ---------------------------------------------------------------------------
// rooms
// ---------------------------------------------------------------------------

/// A persisted room row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Cleared by the schema when the referenced room type is deleted.
    pub room_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Room {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "room_type_id",
        "created_at",
        "updated_at",
    ];

    fn set_column(&mut self, column: &str, value: &WireValue) -> Result<(), NormalizeError> {
        match column {
            "id" => self.id = wire::to_i64(value)?,
            "name" => self.name = wire::to_string(value)?,
            "description" => self.description = wire::to_string(value)?,
            "room_type_id" => self.room_type_id = wire::to_opt_i64(value)?,
            "created_at" => set_timestamp(&mut self.created_at, value)?,
            "updated_at" => set_timestamp(&mut self.updated_at, value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoomRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// user_rooms
// ---------------------------------------------------------------------------

/// A room together with every user assigned to it, ordered by external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomWithUsers {
    #[serde(flatten)]
    pub room: Room,
    pub users: Vec<User>,
}

/// A user together with every room they are assigned to, ordered by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithRooms {
    #[serde(flatten)]
    pub user: User,
    pub rooms: Vec<Room>,
}

/// Result of `SELECT COUNT(*) AS assignments` against the join table.
#[derive(Debug, Default)]
pub(crate) struct AssignmentCount {
    pub assignments: i64,
}

impl Record for AssignmentCount {
    const COLUMNS: &'static [&'static str] = &["assignments"];

    fn set_column(&mut self, column: &str, value: &WireValue) -> Result<(), NormalizeError> {
        if column == "assignments" {
            self.assignments = wire::to_i64(value)?;
        }
        Ok(())
    }
}

/// Presence test for partial-update string fields.
pub(crate) fn present_str(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Presence test for partial-update references.
pub(crate) fn present_id(field: Option<i64>) -> Option<i64> {
    field.filter(|id| *id > 0)
}
