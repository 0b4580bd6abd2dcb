#[macro_use]
mod common;

use db::models::{CreateRoomRequest, CreateUserRequest, Room, User};
use db::{DbPool, ErrorKind, RelationshipManager, RoomRepository, UserRepository};

struct Fixture {
    users: UserRepository,
    rooms: RoomRepository,
    links: RelationshipManager,
}

impl Fixture {
    fn new(pool: DbPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            rooms: RoomRepository::new(pool.clone()),
            links: RelationshipManager::new(pool),
        }
    }

    async fn user(&self, external_id: &str) -> User {
        self.users
            .create(&CreateUserRequest {
                external_id: external_id.into(),
            })
            .await
            .unwrap()
    }

    async fn room(&self, name: &str) -> Room {
        self.rooms
            .create(&CreateRoomRequest {
                name: name.into(),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}

fn names(rooms: &[Room]) -> Vec<&str> {
    rooms.iter().map(|r| r.name.as_str()).collect()
}

async fn assign_list_and_remove(pool: DbPool) {
    let fx = Fixture::new(pool);
    let user = fx.user("u1").await;
    let b = fx.room("B").await;
    let a = fx.room("A").await;

    fx.links.assign(user.id, b.id).await.unwrap();
    fx.links.assign(user.id, a.id).await.unwrap();
    assert_eq!(names(&fx.links.user_rooms(user.id).await.unwrap()), ["A", "B"]);

    fx.links.remove(user.id, a.id).await.unwrap();
    assert_eq!(names(&fx.links.user_rooms(user.id).await.unwrap()), ["B"]);

    let err = fx.links.remove(user.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn duplicate_assignment_conflicts(pool: DbPool) {
    let fx = Fixture::new(pool);
    let user = fx.user("u1").await;
    let room = fx.room("Hall").await;

    fx.links.assign(user.id, room.id).await.unwrap();
    let err = fx.links.assign(user.id, room.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(fx.links.user_rooms(user.id).await.unwrap().len(), 1);
}

async fn assigning_missing_side_is_not_found(pool: DbPool) {
    let fx = Fixture::new(pool);
    let user = fx.user("u1").await;
    let room = fx.room("Hall").await;

    let err = fx.links.assign(user.id, room.id + 50).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = fx.links.assign(user.id + 50, room.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn room_with_users_is_ordered(pool: DbPool) {
    let fx = Fixture::new(pool);
    let room = fx.room("Lounge").await;

    let empty = fx.links.room_with_users(room.id).await.unwrap();
    assert_eq!(empty.room, room);
    assert!(empty.users.is_empty());

    for ext in ["zed", "amy", "mia"] {
        let user = fx.user(ext).await;
        fx.links.assign(user.id, room.id).await.unwrap();
    }

    let full = fx.links.room_with_users(room.id).await.unwrap();
    let ext: Vec<&str> = full.users.iter().map(|u| u.external_id.as_str()).collect();
    assert_eq!(ext, ["amy", "mia", "zed"]);

    let err = fx.links.room_with_users(room.id + 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn user_with_rooms_aggregates(pool: DbPool) {
    let fx = Fixture::new(pool);
    let user = fx.user("owner").await;
    assert!(fx.links.user_rooms(user.id).await.unwrap().is_empty());

    let kitchen = fx.room("Kitchen").await;
    fx.links.assign(user.id, kitchen.id).await.unwrap();

    let view = fx.links.user_with_rooms(user.id).await.unwrap();
    assert_eq!(view.user, user);
    assert_eq!(view.rooms, vec![kitchen]);

    let err = fx.links.user_with_rooms(user.id + 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn remove_all_for_user(pool: DbPool) {
    let fx = Fixture::new(pool);
    let user = fx.user("roamer").await;
    let other = fx.user("stayer").await;
    let north = fx.room("North").await;
    let south = fx.room("South").await;

    for room in [&north, &south] {
        fx.links.assign(user.id, room.id).await.unwrap();
    }
    fx.links.assign(other.id, north.id).await.unwrap();

    assert_eq!(fx.links.remove_all_for_user(user.id).await.unwrap(), 2);
    assert!(fx.links.user_rooms(user.id).await.unwrap().is_empty());
    assert_eq!(names(&fx.links.user_rooms(other.id).await.unwrap()), ["North"]);

    let err = fx.links.remove_all_for_user(user.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn deletes_cascade_to_assignments(pool: DbPool) {
    let fx = Fixture::new(pool);
    let keep = fx.user("keep").await;
    let gone = fx.user("gone").await;
    let stays = fx.room("Stays").await;
    let razed = fx.room("Razed").await;

    for user in [&keep, &gone] {
        for room in [&stays, &razed] {
            fx.links.assign(user.id, room.id).await.unwrap();
        }
    }

    fx.users.delete(gone.id).await.unwrap();
    let members = fx.links.room_with_users(stays.id).await.unwrap().users;
    assert_eq!(members, vec![keep.clone()]);

    fx.rooms.delete(razed.id).await.unwrap();
    assert_eq!(names(&fx.links.user_rooms(keep.id).await.unwrap()), ["Stays"]);
}

on_both_backends!(
    assign_list_and_remove,
    duplicate_assignment_conflicts,
    assigning_missing_side_is_not_found,
    room_with_users_is_ordered,
    user_with_rooms_aggregates,
    remove_all_for_user,
    deletes_cascade_to_assignments,
);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_admit_exactly_one() {
    let harness = common::embedded().await;
    let fx = Fixture::new(harness.pool.clone());
    let user = fx.user("racer").await;
    let room = fx.room("Finish").await;

    let (user_id, room_id) = (user.id, room.id);
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let links = fx.links.clone();
        tasks.push(tokio::spawn(async move { links.assign(user_id, room_id).await }));
    }

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict, "{err}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(fx.links.user_rooms(user_id).await.unwrap().len(), 1);
}
