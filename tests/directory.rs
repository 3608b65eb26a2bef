mod common;

use blimp::error::ChatError;
use blimp::rooms::{CreateOutcome, MessageStream, RoomDirectory};

#[tokio::test]
async fn create_normalizes_the_name_and_enrolls_the_creator() {
    let store = common::memory_store().await;
    let directory = RoomDirectory::new(store);

    let outcome = directory.create_room("alice", "  General  ").await.unwrap();
    let CreateOutcome::Created { room } = outcome else {
        panic!("expected a fresh room");
    };

    assert_eq!(room.name, "General");
    assert_eq!(room.normalized_name, "general");
    assert_eq!(room.creator_id, "alice");
    assert_eq!(room.members, vec!["alice".to_owned()]);
}

#[tokio::test]
async fn an_empty_name_is_rejected() {
    let store = common::memory_store().await;
    let directory = RoomDirectory::new(store);

    let err = directory.create_room("alice", "   ").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidName));
}

#[tokio::test]
async fn a_taken_name_offers_a_suffixed_candidate() {
    let store = common::memory_store().await;
    let directory = RoomDirectory::new(store);

    let first = directory.create_room("alice", "general").await.unwrap();
    assert!(matches!(first, CreateOutcome::Created { .. }));

    // case-insensitive collision: "General" clashes with "general"
    let second = directory.create_room("bob", "General").await.unwrap();
    let CreateOutcome::NameTaken { candidate } = second else {
        panic!("expected a collision");
    };
    assert!(candidate.starts_with("General"));
    let suffix: u32 = candidate["General".len()..].parse().expect("numeric suffix");
    assert!(suffix < 100);

    // the confirmed candidate goes through on the retry
    let retried = directory.create_room("bob", &candidate).await.unwrap();
    let CreateOutcome::Created { room } = retried else {
        panic!("candidate should be free");
    };
    assert_eq!(room.normalized_name, candidate.to_lowercase());
    assert_ne!(room.normalized_name, "general");
}

#[tokio::test]
async fn join_is_case_insensitive_and_idempotent() {
    let store = common::memory_store().await;
    let alice = common::principal("alice", "Alice");
    let room = common::create_room(&store, &alice, "team").await;
    let directory = RoomDirectory::new(store);

    let joined = directory.join_room("bob", "  Team ").await.unwrap();
    assert_eq!(joined.id, room.id);
    assert_eq!(joined.members.len(), 2);

    let joined_again = directory.join_room("bob", "TEAM").await.unwrap();
    assert_eq!(joined_again.members.len(), 2);
}

#[tokio::test]
async fn joining_a_missing_room_fails() {
    let store = common::memory_store().await;
    let directory = RoomDirectory::new(store);

    let err = directory.join_room("bob", "nowhere").await.unwrap_err();
    assert!(matches!(err, ChatError::RoomNotFound(_)));
}

#[tokio::test]
async fn only_the_creator_can_delete_and_the_messages_go_too() {
    let store = common::memory_store().await;
    let alice = common::principal("alice", "Alice");
    let room = common::create_room(&store, &alice, "doomed").await;
    let directory = RoomDirectory::new(store.clone());
    directory.join_room("bob", "doomed").await.unwrap();

    let stream = MessageStream::new(store.clone(), room.id);
    stream.send(&alice, "first").await.unwrap();
    stream.send(&alice, "second").await.unwrap();

    let err = directory.delete_room("bob", room.id).await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden));
    assert!(store.room(room.id).await.unwrap().is_some());

    directory.delete_room("alice", room.id).await.unwrap();
    assert!(store.room(room.id).await.unwrap().is_none());
    assert!(store.messages(room.id).await.unwrap().is_empty());

    // prior members no longer see it listed
    let mut feed = directory.list_rooms("bob");
    let rooms = feed.next().await.unwrap().unwrap();
    assert!(rooms.iter().all(|r| r.id != room.id));
}

#[tokio::test]
async fn the_room_feed_replays_membership_changes_as_snapshots() {
    let store = common::memory_store().await;
    let directory = RoomDirectory::new(store.clone());

    let mut feed = directory.list_rooms("bob");
    assert_eq!(feed.next().await.unwrap().unwrap().len(), 0);

    let alice = common::principal("alice", "Alice");
    let room = common::create_room(&store, &alice, "news").await;

    // alice's create changes the directory, but bob still isn't a member
    assert_eq!(feed.next().await.unwrap().unwrap().len(), 0);

    directory.join_room("bob", "news").await.unwrap();
    let rooms = feed.next().await.unwrap().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, room.id);
    assert!(rooms[0].members.contains(&"bob".to_owned()));
}
