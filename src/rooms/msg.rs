use std::collections::BTreeMap;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::{ChatError, ChatResult};
use crate::store::{Message, MessageEvent, Store};

/// Ordered, live message history for exactly one room.
#[derive(Clone)]
pub struct MessageStream {
    store: Store,
    room_id: Uuid,
}

impl MessageStream {
    pub fn new(store: Store, room_id: Uuid) -> MessageStream {
        MessageStream { store, room_id }
    }

    /// Open a standing subscription. The change channel is tapped *before*
    /// the history read so nothing inserted in between slips through; the
    /// id-keyed merge makes the overlap harmless. Dropping the feed is the
    /// release — it cannot deliver anything after that.
    pub async fn subscribe(&self) -> ChatResult<MessageFeed> {
        let rx = self.store.watch_room(self.room_id);
        let history = self.store.messages(self.room_id).await?;
        let mut entries = BTreeMap::new();
        for message in history {
            entries.insert((message.created_at, message.id), message);
        }

        Ok(MessageFeed {
            store: self.store.clone(),
            room_id: self.room_id,
            rx,
            entries,
            primed: false,
        })
    }

    /// Append a message. The store assigns the id and timestamp; where it
    /// lands in the order is whatever the subscription says — there is no
    /// optimistic local append.
    pub async fn send(&self, author: &Principal, text: &str) -> ChatResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.store.insert_message(self.room_id, author, text).await
    }
}

/// Live ordered view of one room's messages. Insertions merge into a map
/// keyed by `(created_at, id)` so repeated deliveries collapse instead of
/// churning the list, and every delivery out is the whole sorted snapshot.
pub struct MessageFeed {
    store: Store,
    room_id: Uuid,
    rx: broadcast::Receiver<MessageEvent>,
    entries: BTreeMap<(i64, Uuid), Message>,
    primed: bool,
}

impl MessageFeed {
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.values().cloned().collect()
    }

    /// Next whole-list snapshot: the full history on the first call, then a
    /// fresh snapshot after every insertion. `None` once the room is gone.
    pub async fn next(&mut self) -> ChatResult<Option<Vec<Message>>> {
        if !self.primed {
            self.primed = true;
            return Ok(Some(self.snapshot()));
        }
        match self.rx.recv().await {
            Ok(MessageEvent::Added(message)) => {
                self.entries.insert((message.created_at, message.id), message);
                Ok(Some(self.snapshot()))
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(room = %self.room_id, skipped, "message feed lagged, resyncing");
                self.resync().await?;
                Ok(Some(self.snapshot()))
            }
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }

    async fn resync(&mut self) -> ChatResult<()> {
        self.entries.clear();
        for message in self.store.messages(self.room_id).await? {
            self.entries.insert((message.created_at, message.id), message);
        }
        Ok(())
    }
}
