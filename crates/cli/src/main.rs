//! `roomdb` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate`: create the schema if it does not exist yet.
//! - `user`: user CRUD, plus the rooms a user is in.
//! - `room`: room CRUD, plus the users in a room.
//! - `room-type`: room type CRUD.
//! - `assign`: put a user in a room.
//! - `unassign`: take a user out of one room, or out of all of them.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use db::config::DEFAULT_D1_ENDPOINT;
use db::models::{
    CreateRoomRequest, CreateRoomTypeRequest, CreateUserRequest, UpdateRoomRequest,
    UpdateRoomTypeRequest, UpdateUserRequest,
};
use db::{
    BackendConfig, Database, DbConfig, DbPool, PoolConfig, RelationshipManager, RoomRepository,
    RoomTypeRepository, UserRepository,
};

#[derive(Parser)]
#[command(name = "roomdb", about = "Users, rooms and room types over SQLite or D1", version)]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Driver {
    Sqlite,
    D1,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Storage backend.
    #[arg(long, global = true, env = "DATABASE_DRIVER", value_enum, default_value = "sqlite")]
    driver: Driver,

    /// SQLite database file.
    #[arg(long, global = true, env = "DATABASE_DSN", default_value = "./local.db")]
    dsn: PathBuf,

    #[arg(long, global = true, env = "CLOUDFLARE_ACCOUNT_ID")]
    account_id: Option<String>,

    #[arg(long, global = true, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// D1 database identifier.
    #[arg(long, global = true, env = "CLOUDFLARE_DB_NAME")]
    database_id: Option<String>,

    #[arg(long, global = true, env = "D1_ENDPOINT", default_value = DEFAULT_D1_ENDPOINT)]
    d1_endpoint: String,
}

impl ConnectionArgs {
    fn into_config(self) -> anyhow::Result<DbConfig> {
        let backend = match self.driver {
            Driver::Sqlite => BackendConfig::Sqlite { path: self.dsn },
            Driver::D1 => {
                let (Some(account_id), Some(api_token), Some(database_id)) =
                    (self.account_id, self.api_token, self.database_id)
                else {
                    bail!(
                        "the d1 driver needs CLOUDFLARE_ACCOUNT_ID, CLOUDFLARE_API_TOKEN \
                         and CLOUDFLARE_DB_NAME"
                    );
                };
                BackendConfig::D1 {
                    account_id,
                    api_token,
                    database_id,
                    endpoint: self.d1_endpoint,
                }
            }
        };
        Ok(DbConfig {
            backend,
            pool: PoolConfig::default(),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create tables and indexes that do not exist yet.
    Migrate,
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Room(RoomCommand),
    #[command(subcommand)]
    RoomType(RoomTypeCommand),
    /// Put a user in a room.
    Assign { user_id: i64, room_id: i64 },
    /// Take a user out of a room, or out of every room with `--all`.
    Unassign {
        user_id: i64,
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        room_id: Option<i64>,
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args)]
struct Page {
    #[arg(long, default_value_t = 50)]
    limit: i64,
    #[arg(long, default_value_t = 0)]
    offset: i64,
}

#[derive(Subcommand)]
enum UserCommand {
    Create { external_id: String },
    Get { id: i64 },
    /// Look a user up by external id.
    Find { external_id: String },
    List(Page),
    Update {
        id: i64,
        #[arg(long)]
        external_id: Option<String>,
    },
    Delete { id: i64 },
    /// The user together with their rooms.
    Rooms { id: i64 },
}

#[derive(Subcommand)]
enum RoomCommand {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        room_type_id: Option<i64>,
    },
    Get { id: i64 },
    List(Page),
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        room_type_id: Option<i64>,
    },
    Delete { id: i64 },
    /// The room together with its users.
    Users { id: i64 },
}

#[derive(Subcommand)]
enum RoomTypeCommand {
    Create { size: String, style: String },
    Get { id: i64 },
    List(Page),
    Update {
        id: i64,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        style: Option<String>,
    },
    Delete { id: i64 },
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn deleted(entity: &str, id: i64) -> anyhow::Result<()> {
    print(&serde_json::json!({ "deleted": entity, "id": id }))
}

async fn run_user(pool: DbPool, cmd: UserCommand) -> anyhow::Result<()> {
    let users = UserRepository::new(pool.clone());
    match cmd {
        UserCommand::Create { external_id } => {
            print(&users.create(&CreateUserRequest { external_id }).await?)
        }
        UserCommand::Get { id } => print(&users.get(id).await?),
        UserCommand::Find { external_id } => print(&users.get_by_external_id(&external_id).await?),
        UserCommand::List(page) => print(&users.list(page.limit, page.offset).await?),
        UserCommand::Update { id, external_id } => {
            print(&users.update(id, &UpdateUserRequest { external_id }).await?)
        }
        UserCommand::Delete { id } => {
            users.delete(id).await?;
            deleted("user", id)
        }
        UserCommand::Rooms { id } => {
            print(&RelationshipManager::new(pool).user_with_rooms(id).await?)
        }
    }
}

async fn run_room(pool: DbPool, cmd: RoomCommand) -> anyhow::Result<()> {
    let rooms = RoomRepository::new(pool.clone());
    match cmd {
        RoomCommand::Create {
            name,
            description,
            room_type_id,
        } => print(
            &rooms
                .create(&CreateRoomRequest {
                    name,
                    description,
                    room_type_id,
                })
                .await?,
        ),
        RoomCommand::Get { id } => print(&rooms.get(id).await?),
        RoomCommand::List(page) => print(&rooms.list(page.limit, page.offset).await?),
        RoomCommand::Update {
            id,
            name,
            description,
            room_type_id,
        } => print(
            &rooms
                .update(
                    id,
                    &UpdateRoomRequest {
                        name,
                        description,
                        room_type_id,
                    },
                )
                .await?,
        ),
        RoomCommand::Delete { id } => {
            rooms.delete(id).await?;
            deleted("room", id)
        }
        RoomCommand::Users { id } => {
            print(&RelationshipManager::new(pool).room_with_users(id).await?)
        }
    }
}

async fn run_room_type(pool: DbPool, cmd: RoomTypeCommand) -> anyhow::Result<()> {
    let types = RoomTypeRepository::new(pool);
    match cmd {
        RoomTypeCommand::Create { size, style } => {
            print(&types.create(&CreateRoomTypeRequest { size, style }).await?)
        }
        RoomTypeCommand::Get { id } => print(&types.get(id).await?),
        RoomTypeCommand::List(page) => print(&types.list(page.limit, page.offset).await?),
        RoomTypeCommand::Update { id, size, style } => {
            print(&types.update(id, &UpdateRoomTypeRequest { size, style }).await?)
        }
        RoomTypeCommand::Delete { id } => {
            types.delete(id).await?;
            deleted("room type", id)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.conn.into_config()?;
    let pool = db::connect(&config)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Migrate => {
            db::apply_schema(pool.as_ref())
                .await
                .context("schema bootstrap failed")?;
            info!(backend = %pool.kind(), "schema applied");
            Ok(())
        }
        Command::User(cmd) => run_user(pool, cmd).await,
        Command::Room(cmd) => run_room(pool, cmd).await,
        Command::RoomType(cmd) => run_room_type(pool, cmd).await,
        Command::Assign { user_id, room_id } => {
            RelationshipManager::new(pool).assign(user_id, room_id).await?;
            print(&serde_json::json!({ "user_id": user_id, "room_id": room_id }))
        }
        Command::Unassign {
            user_id,
            room_id,
            all,
        } => {
            let links = RelationshipManager::new(pool);
            let removed = match room_id {
                Some(room_id) if !all => {
                    links.remove(user_id, room_id).await?;
                    1
                }
                _ => links.remove_all_for_user(user_id).await?,
            };
            print(&serde_json::json!({ "user_id": user_id, "removed": removed }))
        }
    }
}
