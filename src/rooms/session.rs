use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::AppResult;
use crate::augment::{AugmentKind, Augmentor, DerivedText};
use crate::auth::Principal;
use crate::error::ChatResult;
use crate::store::{Message, Room, Store};

use super::msg::{MessageFeed, MessageStream};

/// One principal's live view of one room: a single feed subscription plus
/// the session-scoped augmentation slots, merged by an owning task and
/// published as whole snapshots. Dropping the session releases the feed and
/// discards every slot — pending, done or failed.
pub struct RoomSession {
    room: Room,
    principal: Principal,
    stream: MessageStream,
    view_rx: watch::Receiver<Vec<Message>>,
    cmd_tx: mpsc::UnboundedSender<AugmentRequest>,
    task: JoinHandle<()>,
}

struct AugmentRequest {
    message_id: Uuid,
    kind: AugmentKind,
}

struct AugmentReply {
    message_id: Uuid,
    kind: AugmentKind,
    outcome: AppResult<String>,
}

impl RoomSession {
    pub async fn open(
        store: Store,
        provider: Arc<dyn DerivedText>,
        principal: Principal,
        room: Room,
    ) -> ChatResult<RoomSession> {
        let stream = MessageStream::new(store, room.id);
        let feed = stream.subscribe().await?;
        let (view_tx, view_rx) = watch::channel(Vec::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(feed, Augmentor::new(provider), cmd_rx, view_tx));

        Ok(RoomSession {
            room,
            principal,
            stream,
            view_rx,
            cmd_tx,
            task,
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Watch the merged message view. Every change publishes the whole list.
    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.view_rx.clone()
    }

    pub async fn send(&self, text: &str) -> ChatResult<Message> {
        self.stream.send(&self.principal, text).await
    }

    /// Ask for an annotation on a message currently in view. Quietly ignored
    /// when the message isn't in view or already holds an augmentation slot
    /// of any kind, in any state.
    pub fn augment(&self, message_id: Uuid, kind: AugmentKind) {
        let _ = self.cmd_tx.send(AugmentRequest { message_id, kind });
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The session's serialization point: the only place the merged list is
/// mutated. Structural replacements come from the feed, field patches from
/// augmentation completions, and both funnel through this loop. Provider
/// calls run in their own tasks; a reply whose session has died fails its
/// channel send and is thereby discarded instead of touching stale state.
async fn run(
    mut feed: MessageFeed,
    mut augmentor: Augmentor,
    mut cmd_rx: mpsc::UnboundedReceiver<AugmentRequest>,
    view_tx: watch::Sender<Vec<Message>>,
) {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<AugmentReply>();
    let mut current: Vec<Message> = Vec::new();

    loop {
        tokio::select! {
            delivered = feed.next() => match delivered {
                Ok(Some(mut messages)) => {
                    augmentor.apply(&mut messages);
                    current = messages;
                    if view_tx.send(current.clone()).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // room deleted
                Err(err) => {
                    tracing::warn!(error = %err, "message feed failed");
                    break;
                }
            },
            Some(AugmentRequest { message_id, kind }) = cmd_rx.recv() => {
                let Some(text) = current
                    .iter()
                    .find(|message| message.id == message_id)
                    .map(|message| message.text.clone())
                else {
                    continue;
                };
                if !augmentor.begin(message_id, kind) {
                    continue;
                }

                let provider = augmentor.provider();
                let prompt = kind.prompt(&text);
                let reply_tx = reply_tx.clone();
                tokio::spawn(async move {
                    let outcome = provider.generate(&prompt).await;
                    let _ = reply_tx.send(AugmentReply { message_id, kind, outcome });
                });

                augmentor.apply(&mut current);
                if view_tx.send(current.clone()).is_err() {
                    break;
                }
            }
            Some(AugmentReply { message_id, kind, outcome }) = reply_rx.recv() => {
                augmentor.complete(message_id, kind, outcome);
                augmentor.apply(&mut current);
                if view_tx.send(current.clone()).is_err() {
                    break;
                }
            }
        }
    }
}
