mod gemini;

pub use gemini::GeminiClient;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppResult;
use crate::store::Message;

/// Whatever turns a prompt into text. Injected so sessions can run against
/// a stub; the real one is [`GeminiClient`].
#[async_trait]
pub trait DerivedText: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentKind {
    Translate,
    Improve,
}

impl AugmentKind {
    pub fn prompt(&self, text: &str) -> String {
        match self {
            AugmentKind::Translate => format!(
                "Rewrite the following text in English. Return only the rewritten text, nothing else.\n\n{text}"
            ),
            AugmentKind::Improve => format!(
                "Correct the spelling and grammar of the following text, preserving its meaning. Return only the corrected text, nothing else.\n\n{text}"
            ),
        }
    }

    /// Shown in place of a result when the provider call errors. Terminal;
    /// there is no retry.
    pub fn failure_sentinel(&self) -> &'static str {
        match self {
            AugmentKind::Translate => "Translation failed.",
            AugmentKind::Improve => "Improvement failed.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentState {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Augmentation {
    pub kind: AugmentKind,
    pub state: AugmentState,
    /// `None` while pending; the derived text once done; the kind's failure
    /// sentinel once failed.
    pub value: Option<String>,
}

/// Per-session augmentation slots, one per message: whichever kind is
/// requested first occupies the slot, and every later request for that
/// message is ignored regardless of kind or state. Slots live and die with
/// the session that holds this.
pub struct Augmentor {
    provider: Arc<dyn DerivedText>,
    slots: HashMap<Uuid, Augmentation>,
}

impl Augmentor {
    pub fn new(provider: Arc<dyn DerivedText>) -> Augmentor {
        Augmentor {
            provider,
            slots: HashMap::new(),
        }
    }

    pub fn provider(&self) -> Arc<dyn DerivedText> {
        self.provider.clone()
    }

    /// absent -> pending. False (and no transition) when the message already
    /// holds a slot, whatever its kind or state.
    pub fn begin(&mut self, message_id: Uuid, kind: AugmentKind) -> bool {
        if self.slots.contains_key(&message_id) {
            return false;
        }
        self.slots.insert(
            message_id,
            Augmentation {
                kind,
                state: AugmentState::Pending,
                value: None,
            },
        );
        true
    }

    /// pending -> done|failed. A completion that doesn't match a pending
    /// slot of the same kind is stale and gets dropped.
    pub fn complete(&mut self, message_id: Uuid, kind: AugmentKind, outcome: AppResult<String>) {
        let Some(slot) = self.slots.get_mut(&message_id) else {
            return;
        };
        if slot.kind != kind || slot.state != AugmentState::Pending {
            return;
        }
        match outcome {
            Ok(value) => {
                slot.state = AugmentState::Done;
                slot.value = Some(value);
            }
            Err(err) => {
                tracing::warn!(%message_id, ?kind, error = %err.0, "augmentation failed");
                slot.state = AugmentState::Failed;
                slot.value = Some(kind.failure_sentinel().to_owned());
            }
        }
    }

    /// Patch a message list with the current slots, matching by id so the
    /// annotation lands on the right entry no matter how the list has been
    /// reordered or replaced since the request.
    pub fn apply(&self, messages: &mut [Message]) {
        for message in messages {
            message.augmentation = self.slots.get(&message.id).cloned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl DerivedText for Echo {
        async fn generate(&self, prompt: &str) -> AppResult<String> {
            Ok(prompt.to_owned())
        }
    }

    fn augmentor() -> Augmentor {
        Augmentor::new(Arc::new(Echo))
    }

    fn message(id: Uuid) -> Message {
        Message {
            id,
            room_id: Uuid::now_v7(),
            author_id: "author".to_owned(),
            author_display_name: "Author".to_owned(),
            author_avatar_ref: None,
            text: "hola".to_owned(),
            created_at: 0,
            augmentation: None,
        }
    }

    #[test]
    fn one_slot_per_message() {
        let mut augmentor = augmentor();
        let id = Uuid::now_v7();
        assert!(augmentor.begin(id, AugmentKind::Translate));
        assert!(!augmentor.begin(id, AugmentKind::Translate));
        assert!(!augmentor.begin(id, AugmentKind::Improve));
        assert!(augmentor.begin(Uuid::now_v7(), AugmentKind::Improve));
    }

    #[test]
    fn pending_goes_done_with_the_result() {
        let mut augmentor = augmentor();
        let id = Uuid::now_v7();
        augmentor.begin(id, AugmentKind::Translate);
        augmentor.complete(id, AugmentKind::Translate, Ok("hello".to_owned()));

        let mut messages = [message(id)];
        augmentor.apply(&mut messages);
        let augmentation = messages[0].augmentation.as_ref().unwrap();
        assert_eq!(augmentation.state, AugmentState::Done);
        assert_eq!(augmentation.value.as_deref(), Some("hello"));
    }

    #[test]
    fn failure_records_the_sentinel_and_is_terminal() {
        let mut augmentor = augmentor();
        let id = Uuid::now_v7();
        augmentor.begin(id, AugmentKind::Translate);
        augmentor.complete(id, AugmentKind::Translate, Err("provider down".into()));

        let mut messages = [message(id)];
        augmentor.apply(&mut messages);
        let augmentation = messages[0].augmentation.as_ref().unwrap();
        assert_eq!(augmentation.state, AugmentState::Failed);
        assert_eq!(augmentation.value.as_deref(), Some("Translation failed."));

        // terminal: a late success changes nothing, and the slot stays taken
        augmentor.complete(id, AugmentKind::Translate, Ok("late".to_owned()));
        augmentor.apply(&mut messages);
        let augmentation = messages[0].augmentation.as_ref().unwrap();
        assert_eq!(augmentation.state, AugmentState::Failed);
        assert!(!augmentor.begin(id, AugmentKind::Improve));
    }

    #[test]
    fn stale_completions_are_dropped() {
        let mut augmentor = augmentor();
        let id = Uuid::now_v7();

        // no slot at all
        augmentor.complete(id, AugmentKind::Translate, Ok("x".to_owned()));
        let mut messages = [message(id)];
        augmentor.apply(&mut messages);
        assert!(messages[0].augmentation.is_none());

        // wrong kind for the pending slot
        augmentor.begin(id, AugmentKind::Translate);
        augmentor.complete(id, AugmentKind::Improve, Ok("x".to_owned()));
        augmentor.apply(&mut messages);
        let augmentation = messages[0].augmentation.as_ref().unwrap();
        assert_eq!(augmentation.state, AugmentState::Pending);
        assert_eq!(augmentation.value, None);
    }

    #[test]
    fn apply_matches_by_id() {
        let mut augmentor = augmentor();
        let annotated = Uuid::now_v7();
        let plain = Uuid::now_v7();
        augmentor.begin(annotated, AugmentKind::Improve);

        let mut messages = [message(plain), message(annotated)];
        augmentor.apply(&mut messages);
        assert!(messages[0].augmentation.is_none());
        assert!(messages[1].augmentation.is_some());
    }

    #[test]
    fn prompts_carry_the_source_text() {
        let prompt = AugmentKind::Translate.prompt("hola mundo");
        assert!(prompt.contains("hola mundo"));
        assert!(prompt.contains("English"));

        let prompt = AugmentKind::Improve.prompt("helo wrold");
        assert!(prompt.contains("helo wrold"));
        assert!(prompt.contains("grammar"));
    }
}
