use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::augment::Augmentation;
use crate::auth::Principal;
use crate::error::ChatResult;

const CHANNEL_CAPACITY: usize = 64;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    creator_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS room_members (
    room_id TEXT NOT NULL,
    principal_id TEXT NOT NULL,
    PRIMARY KEY (room_id, principal_id)
);
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    author_display_name TEXT NOT NULL,
    author_avatar_ref TEXT,
    text TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, created_at);
CREATE INDEX IF NOT EXISTS rooms_by_normalized_name ON rooms (normalized_name);
";

#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub creator_id: String,
    pub members: Vec<String>,
    /// unix millis, store-assigned
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: String,
    pub author_display_name: String,
    pub author_avatar_ref: Option<String>,
    pub text: String,
    /// unix millis, store-assigned, authoritative for ordering
    pub created_at: i64,
    /// session-scoped overlay; always `None` as loaded from the store
    pub augmentation: Option<Augmentation>,
}

#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// The set of rooms (or some room's membership) changed. Consumers
    /// re-read their own view rather than patching from a diff.
    Changed,
}

#[derive(Debug, Clone)]
pub enum MessageEvent {
    Added(Message),
}

/// Handle on the backing store, passed into the engine pieces explicitly so
/// tests can stand up their own. Wraps the SQLite pool together with the
/// change channels: one for the room directory, one per room for messages.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    rooms_tx: broadcast::Sender<RoomEvent>,
    room_channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<MessageEvent>>>>,
}

impl Store {
    /// Open (and if needed create) the database behind `url` and prepare the
    /// schema. In-memory databases get a single connection so every query
    /// sees the same data.
    pub async fn open(url: &str) -> ChatResult<Store> {
        let max_connections = if url.contains(":memory:") { 1 } else { 16 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Store {
            pool,
            rooms_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            room_channels: Arc::default(),
        })
    }

    fn now_millis() -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn watch_rooms(&self) -> broadcast::Receiver<RoomEvent> {
        self.rooms_tx.subscribe()
    }

    pub fn watch_room(&self, room_id: Uuid) -> broadcast::Receiver<MessageEvent> {
        self.room_sender(room_id).subscribe()
    }

    fn room_sender(&self, room_id: Uuid) -> broadcast::Sender<MessageEvent> {
        if let Some(tx) = self.room_channels.read().unwrap().get(&room_id) {
            return tx.clone();
        }
        self.room_channels
            .write()
            .unwrap()
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn notify_rooms(&self) {
        let _ = self.rooms_tx.send(RoomEvent::Changed);
    }

    pub async fn insert_room(
        &self,
        name: &str,
        normalized_name: &str,
        creator_id: &str,
    ) -> ChatResult<Room> {
        let id = Uuid::now_v7();
        let created_at = Self::now_millis();
        sqlx::query("INSERT INTO rooms (id,name,normalized_name,creator_id,created_at) VALUES (?,?,?,?,?)")
            .bind(id.to_string())
            .bind(name)
            .bind(normalized_name)
            .bind(creator_id)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO room_members (room_id,principal_id) VALUES (?,?)")
            .bind(id.to_string())
            .bind(creator_id)
            .execute(&self.pool)
            .await?;
        self.notify_rooms();

        Ok(Room {
            id,
            name: name.to_owned(),
            normalized_name: normalized_name.to_owned(),
            creator_id: creator_id.to_owned(),
            members: vec![creator_id.to_owned()],
            created_at,
        })
    }

    pub async fn room(&self, room_id: Uuid) -> ChatResult<Option<Room>> {
        let row: Option<(String, String, String, String, i64)> =
            sqlx::query_as("SELECT id,name,normalized_name,creator_id,created_at FROM rooms WHERE id=?")
                .bind(room_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_room(row).await?)),
            None => Ok(None),
        }
    }

    /// The store has no uniqueness constraint on `normalized_name`; after a
    /// create race there can be several matches, and this picks one.
    pub async fn room_by_normalized_name(&self, normalized_name: &str) -> ChatResult<Option<Room>> {
        let row: Option<(String, String, String, String, i64)> =
            sqlx::query_as("SELECT id,name,normalized_name,creator_id,created_at FROM rooms WHERE normalized_name=? LIMIT 1")
                .bind(normalized_name)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_room(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn rooms_for_member(&self, principal_id: &str) -> ChatResult<Vec<Room>> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT r.id,r.name,r.normalized_name,r.creator_id,r.created_at
             FROM rooms r JOIN room_members m ON m.room_id = r.id
             WHERE m.principal_id=?",
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in rows {
            rooms.push(self.hydrate_room(row).await?);
        }
        Ok(rooms)
    }

    async fn hydrate_room(
        &self,
        (id, name, normalized_name, creator_id, created_at): (String, String, String, String, i64),
    ) -> ChatResult<Room> {
        let id = Uuid::parse_str(&id)?;
        let members: Vec<(String,)> =
            sqlx::query_as("SELECT principal_id FROM room_members WHERE room_id=?")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;

        Ok(Room {
            id,
            name,
            normalized_name,
            creator_id,
            members: members.into_iter().map(|(p,)| p).collect(),
            created_at,
        })
    }

    pub async fn add_member(&self, room_id: Uuid, principal_id: &str) -> ChatResult<()> {
        let result = sqlx::query("INSERT OR IGNORE INTO room_members (room_id,principal_id) VALUES (?,?)")
            .bind(room_id.to_string())
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            self.notify_rooms();
        }
        Ok(())
    }

    pub async fn is_member(&self, room_id: Uuid, principal_id: &str) -> ChatResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM room_members WHERE room_id=? AND principal_id=?")
                .bind(room_id.to_string())
                .bind(principal_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Remove a room, its membership and all its messages, and close the
    /// room's change channel so open feeds end.
    pub async fn delete_room(&self, room_id: Uuid) -> ChatResult<()> {
        sqlx::query("DELETE FROM messages WHERE room_id=?")
            .bind(room_id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM room_members WHERE room_id=?")
            .bind(room_id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM rooms WHERE id=?")
            .bind(room_id.to_string())
            .execute(&self.pool)
            .await?;
        self.room_channels.write().unwrap().remove(&room_id);
        self.notify_rooms();
        Ok(())
    }

    /// Insert a message with a store-assigned id and timestamp, snapshotting
    /// the author's display fields, and fan it out to the room's feeds.
    pub async fn insert_message(
        &self,
        room_id: Uuid,
        author: &Principal,
        text: &str,
    ) -> ChatResult<Message> {
        let id = Uuid::now_v7();
        let created_at = Self::now_millis();
        sqlx::query(
            "INSERT INTO messages (id,room_id,author_id,author_display_name,author_avatar_ref,text,created_at)
             VALUES (?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(room_id.to_string())
        .bind(&author.id)
        .bind(&author.display_name)
        .bind(author.avatar_ref.as_deref())
        .bind(text)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let message = Message {
            id,
            room_id,
            author_id: author.id.clone(),
            author_display_name: author.display_name.clone(),
            author_avatar_ref: author.avatar_ref.clone(),
            text: text.to_owned(),
            created_at,
            augmentation: None,
        };
        let _ = self.room_sender(room_id).send(MessageEvent::Added(message.clone()));
        Ok(message)
    }

    /// Full history of one room, oldest first. Ties in `created_at` fall
    /// back to the id, which the store hands out in insertion order.
    pub async fn messages(&self, room_id: Uuid) -> ChatResult<Vec<Message>> {
        let rows: Vec<(String, String, String, Option<String>, String, i64)> = sqlx::query_as(
            "SELECT id,author_id,author_display_name,author_avatar_ref,text,created_at
             FROM messages WHERE room_id=? ORDER BY created_at ASC, id ASC",
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, author_id, author_display_name, author_avatar_ref, text, created_at) in rows {
            messages.push(Message {
                id: Uuid::parse_str(&id)?,
                room_id,
                author_id,
                author_display_name,
                author_avatar_ref,
                text,
                created_at,
                augmentation: None,
            });
        }
        Ok(messages)
    }
}
