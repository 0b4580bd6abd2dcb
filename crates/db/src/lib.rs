//! `db` crate: persistence for users, rooms and room types.
//!
//! Repositories are written once against the [`Database`] trait and run
//! unmodified on the embedded SQLite backend and the remote D1 backend.
//! Rows from either are rebuilt through the [`scan`] module, which routes
//! every value through the [`wire`] normalizer.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod scan;
pub mod schema;
pub mod wire;

pub use backend::{BackendKind, Database};
pub use config::{BackendConfig, DbConfig, PoolConfig};
pub use error::{DbError, ErrorKind, RepoError};
pub use pool::{connect, DbPool};
pub use repository::{RelationshipManager, RoomRepository, RoomTypeRepository, UserRepository};
pub use schema::apply_schema;
