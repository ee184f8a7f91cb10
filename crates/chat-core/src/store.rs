//! Message store.
//!
//! [`Histories`] is an immutable snapshot of the display and context
//! histories; every transition returns a new snapshot. [`MessageStore`] owns
//! the current snapshot and hands each new one to the persistence adapter.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::persistence::{HistoryStore, KeyValueStore};

/// Display and context histories of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histories {
    display: Vec<Message>,
    context: Vec<Message>,
}

impl Histories {
    #[must_use]
    pub const fn new(display: Vec<Message>, context: Vec<Message>) -> Self {
        Self { display, context }
    }

    /// The full, never-compressed transcript.
    #[must_use]
    pub fn display(&self) -> &[Message] {
        &self.display
    }

    /// Exactly what is sent to the model next.
    #[must_use]
    pub fn context(&self) -> &[Message] {
        &self.context
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display.is_empty() && self.context.is_empty()
    }

    /// Find a message in either history.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Message> {
        self.display
            .iter()
            .chain(&self.context)
            .find(|m| m.id() == id)
    }

    /// Append to both histories.
    #[must_use]
    pub fn appended(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.context.push(message.clone());
        next.display.push(message);
        next
    }

    /// Append to the display history only.
    #[must_use]
    pub fn appended_to_display(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.display.push(message);
        next
    }

    /// Replace the first `count` context entries with `head`.
    ///
    /// The display history is untouched.
    #[must_use]
    pub fn with_prefix_replaced(&self, head: Message, count: usize) -> Self {
        let count = count.min(self.context.len());
        let mut context = Vec::with_capacity(self.context.len() - count + 1);
        context.push(head);
        context.extend_from_slice(&self.context[count..]);
        Self {
            display: self.display.clone(),
            context,
        }
    }

    /// Drop every message matching `predicate` from both histories.
    #[must_use]
    pub fn without<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Message) -> bool,
    {
        Self {
            display: self.display.iter().filter(|m| !predicate(m)).cloned().collect(),
            context: self.context.iter().filter(|m| !predicate(m)).cloned().collect(),
        }
    }
}

/// Owns a session's histories and keeps them persisted.
///
/// Every public mutation replaces the snapshot as a unit and then saves it.
/// Persistence failures are logged; the in-memory state stays authoritative.
#[derive(Debug)]
pub struct MessageStore<S> {
    project_id: String,
    histories: Histories,
    persistence: HistoryStore<S>,
}

impl<S: KeyValueStore> MessageStore<S> {
    /// Open the store for a project, rehydrating any saved state.
    pub fn open(project_id: impl Into<String>, persistence: HistoryStore<S>) -> Self {
        let project_id = project_id.into();

        let histories = match persistence.load(&project_id) {
            Ok(Some(histories)) => {
                tracing::debug!(
                    project = %project_id,
                    surface = %persistence.surface(),
                    display = histories.display().len(),
                    context = histories.context().len(),
                    "restored chat histories"
                );
                histories
            }
            Ok(None) => Histories::default(),
            Err(e) => {
                tracing::warn!(
                    project = %project_id,
                    surface = %persistence.surface(),
                    error = %e,
                    "failed to load chat histories, starting empty"
                );
                Histories::default()
            }
        };

        Self {
            project_id,
            histories,
            persistence,
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current snapshot.
    #[must_use]
    pub const fn histories(&self) -> &Histories {
        &self.histories
    }

    /// Append a message to both histories.
    pub fn append(&mut self, message: Message) {
        let next = self.histories.appended(message);
        self.commit(next);
    }

    /// Append a message to the display history only.
    pub fn append_display(&mut self, message: Message) {
        let next = self.histories.appended_to_display(message);
        self.commit(next);
    }

    /// Replace the first `count` context entries with a summary.
    pub fn replace_prefix(&mut self, head: Message, count: usize) {
        let next = self.histories.with_prefix_replaced(head, count);
        self.commit(next);
    }

    /// Delete matching messages from both histories, returning how many
    /// entries were dropped in total.
    pub fn remove<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Message) -> bool,
    {
        let before = self.histories.display().len() + self.histories.context().len();
        let next = self.histories.without(predicate);
        let removed = before - next.display().len() - next.context().len();
        if removed > 0 {
            self.commit(next);
        }
        removed
    }

    /// Empty both histories and drop the persisted state.
    pub fn clear(&mut self) {
        self.histories = Histories::default();
        if let Err(e) = self.persistence.clear(&self.project_id) {
            tracing::warn!(
                project = %self.project_id,
                surface = %self.persistence.surface(),
                error = %e,
                "failed to clear saved chat histories"
            );
        }
    }

    fn commit(&mut self, next: Histories) {
        self.histories = next;
        if let Err(e) = self.persistence.save(&self.project_id, &self.histories) {
            tracing::warn!(
                project = %self.project_id,
                surface = %self.persistence.surface(),
                error = %e,
                "failed to persist chat histories, continuing in memory"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::persistence::MemoryStore;
    use crate::surface::Surface;

    fn open(store: MemoryStore) -> MessageStore<MemoryStore> {
        MessageStore::open("skyfall", HistoryStore::new(store, Surface::World))
    }

    #[test]
    fn append_goes_to_both_histories_and_persists() {
        let backing = MemoryStore::new();
        let mut store = open(backing.clone());
        store.append(Message::user("A floating archipelago"));

        assert_eq!(store.histories().display().len(), 1);
        assert_eq!(store.histories().context().len(), 1);

        let reopened = open(backing);
        assert_eq!(reopened.histories(), store.histories());
    }

    #[test]
    fn display_only_append_leaves_context() {
        let mut store = open(MemoryStore::new());
        store.append(Message::user("hi"));
        store.append_display(Message::system("Error: offline"));

        assert_eq!(store.histories().display().len(), 2);
        assert_eq!(store.histories().context().len(), 1);
    }

    #[test]
    fn replace_prefix_only_touches_context() {
        let mut store = open(MemoryStore::new());
        for i in 0..5 {
            store.append(Message::user(format!("turn {i}")));
        }
        store.replace_prefix(Message::summary("digest", 3), 3);

        let histories = store.histories();
        assert_eq!(histories.display().len(), 5);
        assert_eq!(histories.context().len(), 3);
        assert!(histories.context()[0].is_summary());
        assert_eq!(histories.context()[1].content(), "turn 3");
    }

    #[test]
    fn remove_drops_from_both() {
        let mut store = open(MemoryStore::new());
        let artifact = Message::artifact("=== ARC SUMMARY ===");
        let id = artifact.id().to_string();
        store.append(Message::user("hi"));
        store.append(artifact);

        let removed = store.remove(|m| m.id() == id);
        assert_eq!(removed, 2);
        assert!(store.histories().find(&id).is_none());
        assert_eq!(store.remove(|m| m.id() == id), 0);
    }

    #[test]
    fn clear_empties_memory_and_storage() {
        let backing = MemoryStore::new();
        let mut store = open(backing.clone());
        store.append(Message::user("hi"));
        store.clear();

        assert!(store.histories().is_empty());
        assert!(backing.is_empty());
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> crate::persistence::Result<Option<String>> {
            Err(StorageError::InvalidKey("offline".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> crate::persistence::Result<()> {
            Err(StorageError::InvalidKey("offline".to_string()))
        }

        fn remove(&self, _key: &str) -> crate::persistence::Result<()> {
            Err(StorageError::InvalidKey("offline".to_string()))
        }
    }

    #[test]
    fn storage_failures_do_not_lose_memory_state() {
        let mut store = MessageStore::open("skyfall", HistoryStore::new(FailingStore, Surface::Arc));
        store.append(Message::user("hi"));
        store.append(Message::assistant("hello"));
        assert_eq!(store.histories().display().len(), 2);

        store.clear();
        assert!(store.histories().is_empty());
    }
}
