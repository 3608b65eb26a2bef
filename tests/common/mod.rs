#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use blimp::AppResult;
use blimp::augment::DerivedText;
use blimp::auth::Principal;
use blimp::rooms::{CreateOutcome, RoomDirectory};
use blimp::store::{Message, Room, Store};
use tokio::sync::{Notify, watch};
use tokio::time::timeout;

pub async fn memory_store() -> Store {
    Store::open("sqlite::memory:").await.expect("in-memory store")
}

pub fn principal(id: &str, name: &str) -> Principal {
    Principal {
        id: id.to_owned(),
        display_name: name.to_owned(),
        avatar_ref: None,
        verified: true,
    }
}

pub async fn create_room(store: &Store, creator: &Principal, name: &str) -> Room {
    match RoomDirectory::new(store.clone())
        .create_room(&creator.id, name)
        .await
        .expect("create_room")
    {
        CreateOutcome::Created { room } => room,
        CreateOutcome::NameTaken { candidate } => {
            panic!("room name {name} unexpectedly taken, offered {candidate}")
        }
    }
}

/// Wait (bounded) until the session view satisfies the predicate.
pub async fn await_view<F>(view: &mut watch::Receiver<Vec<Message>>, mut pred: F) -> Vec<Message>
where
    F: FnMut(&[Message]) -> bool,
{
    loop {
        let snapshot = view.borrow_and_update().clone();
        if pred(&snapshot) {
            return snapshot;
        }
        timeout(Duration::from_secs(5), view.changed())
            .await
            .expect("timed out waiting for the session view")
            .expect("session view closed");
    }
}

/// Derived-text stub: counts calls, optionally holds each call until
/// released, and answers with a fixed reply or a failure.
pub struct StubProvider {
    calls: AtomicUsize,
    gate: Option<Notify>,
    reply: Result<String, String>,
}

impl StubProvider {
    pub fn ok(reply: &str) -> Arc<StubProvider> {
        Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
            gate: None,
            reply: Ok(reply.to_owned()),
        })
    }

    pub fn failing() -> Arc<StubProvider> {
        Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
            gate: None,
            reply: Err("provider down".to_owned()),
        })
    }

    pub fn gated(reply: &str) -> Arc<StubProvider> {
        Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
            gate: Some(Notify::new()),
            reply: Ok(reply.to_owned()),
        })
    }

    /// Let one held call through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DerivedText for StubProvider {
    async fn generate(&self, _prompt: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(err) => Err(err.as_str().into()),
        }
    }
}
