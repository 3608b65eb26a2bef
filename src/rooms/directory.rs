use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::store::{Room, RoomEvent, Store};

/// Room creation, membership and the live per-principal room listing.
#[derive(Clone)]
pub struct RoomDirectory {
    store: Store,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    Created { room: Room },
    /// The normalized name is taken. The caller confirms the suggested
    /// candidate and retries — as many rounds as it takes, or gives up.
    NameTaken { candidate: String },
}

impl RoomDirectory {
    pub fn new(store: Store) -> RoomDirectory {
        RoomDirectory { store }
    }

    pub async fn create_room(
        &self,
        principal_id: &str,
        requested_name: &str,
    ) -> ChatResult<CreateOutcome> {
        let name = requested_name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidName);
        }
        let normalized = name.to_lowercase();

        // Check-then-act: two creators racing past this lookup can still end
        // up with the same normalized name. Accepted; join then picks one.
        if self.store.room_by_normalized_name(&normalized).await?.is_some() {
            let candidate = format!("{name}{}", rand::rng().random_range(0..100));
            return Ok(CreateOutcome::NameTaken { candidate });
        }

        let room = self.store.insert_room(name, &normalized, principal_id).await?;
        tracing::info!(room = %room.id, name = %room.name, "room created");
        Ok(CreateOutcome::Created { room })
    }

    /// Case-insensitive lookup by name, then an idempotent membership add.
    pub async fn join_room(&self, principal_id: &str, room_name: &str) -> ChatResult<Room> {
        let normalized = room_name.trim().to_lowercase();
        let Some(room) = self.store.room_by_normalized_name(&normalized).await? else {
            return Err(ChatError::RoomNotFound(room_name.trim().to_owned()));
        };
        self.store.add_member(room.id, principal_id).await?;

        // re-read so `members` reflects the add
        let Some(room) = self.store.room(room.id).await? else {
            return Err(ChatError::RoomNotFound(room_name.trim().to_owned()));
        };
        Ok(room)
    }

    /// Creator-only. Takes the room's messages with it; there is no undo.
    pub async fn delete_room(&self, principal_id: &str, room_id: Uuid) -> ChatResult<()> {
        let Some(room) = self.store.room(room_id).await? else {
            return Err(ChatError::RoomNotFound(room_id.to_string()));
        };
        if room.creator_id != principal_id {
            return Err(ChatError::Forbidden);
        }
        self.store.delete_room(room_id).await?;
        tracing::info!(room = %room_id, "room deleted");
        Ok(())
    }

    pub fn list_rooms(&self, principal_id: &str) -> RoomFeed {
        RoomFeed {
            store: self.store.clone(),
            principal_id: principal_id.to_owned(),
            rx: self.store.watch_rooms(),
            primed: false,
        }
    }
}

/// Live view of the rooms a principal belongs to. Every delivery is a whole
/// snapshot, re-read from the store on each directory change; ordering
/// across entries is not part of the contract.
pub struct RoomFeed {
    store: Store,
    principal_id: String,
    rx: broadcast::Receiver<RoomEvent>,
    primed: bool,
}

impl RoomFeed {
    /// The first call resolves immediately with the current membership;
    /// later calls wait for a directory change. `None` once the store side
    /// of the channel is gone.
    pub async fn next(&mut self) -> ChatResult<Option<Vec<Room>>> {
        if !self.primed {
            self.primed = true;
            return Ok(Some(self.store.rooms_for_member(&self.principal_id).await?));
        }
        match self.rx.recv().await {
            // a lagged feed re-reads the same way a notified one does
            Ok(RoomEvent::Changed) | Err(broadcast::error::RecvError::Lagged(_)) => {
                Ok(Some(self.store.rooms_for_member(&self.principal_id).await?))
            }
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }
}
