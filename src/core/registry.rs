//! One live chat session per project and surface.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::{ChatSession, CompletionClient, KeyValueStore, SessionSettings, Surface};
use parking_lot::Mutex;

use crate::core::{Error, Result};

/// Session type served by the registry.
pub type Session = ChatSession<Arc<dyn CompletionClient>, Arc<dyn KeyValueStore>>;

/// Shared handle to a live session.
pub type SharedSession = Arc<Session>;

const MAX_PROJECT_ID_LEN: usize = 128;

/// Check that a project ID is safe to use as a storage key segment.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for empty, overlong or unsafe IDs.
pub fn validate_project_id(project_id: &str) -> Result<()> {
    let valid = !project_id.is_empty()
        && project_id.len() <= MAX_PROJECT_ID_LEN
        && !project_id.starts_with('.')
        && project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid project id '{project_id}' (use letters, digits, '-', '_' or '.')"
        )))
    }
}

/// Lazily opens sessions and hands out shared handles.
pub struct SessionRegistry {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn KeyValueStore>,
    settings: SessionSettings,
    greet: bool,
    sessions: Mutex<HashMap<(String, Surface), SharedSession>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("client", &self.client.name())
            .field("settings", &self.settings)
            .field("sessions", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn KeyValueStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            greet: true,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Whether new, empty sessions open with the surface greeting.
    #[must_use]
    pub const fn with_greeting(mut self, greet: bool) -> Self {
        self.greet = greet;
        self
    }

    /// Get the session for a project surface, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the project ID is invalid.
    pub fn session(&self, project_id: &str, surface: Surface) -> Result<SharedSession> {
        validate_project_id(project_id)?;

        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(&(project_id.to_string(), surface)) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(ChatSession::open(
            project_id,
            surface,
            Arc::clone(&self.client),
            Arc::clone(&self.store),
            self.settings.clone(),
        ));
        if self.greet {
            session.greet(project_id);
        }

        tracing::debug!(project = %project_id, %surface, "opened chat session");
        sessions.insert((project_id.to_string(), surface), Arc::clone(&session));
        Ok(session)
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chat_core::error::Result as CompletionResult;
    use chat_core::{CompletionRequest, MemoryStore};

    use super::*;

    struct Canned;

    #[async_trait]
    impl CompletionClient for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn complete(&self, _request: CompletionRequest) -> CompletionResult<String> {
            Ok("noted".to_string())
        }
    }

    fn registry(store: MemoryStore) -> SessionRegistry {
        SessionRegistry::new(Arc::new(Canned), Arc::new(store), SessionSettings::default())
    }

    #[test]
    fn same_key_same_session() {
        let registry = registry(MemoryStore::new());
        let a = registry.session("skyfall", Surface::World).unwrap();
        let b = registry.session("skyfall", Surface::World).unwrap();
        let arc = registry.session("skyfall", Surface::Arc).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &arc));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn new_sessions_are_greeted_once() {
        let store = MemoryStore::new();
        let session = registry(store.clone()).session("skyfall", Surface::Arc).unwrap();
        assert_eq!(session.display_history().len(), 1);
        assert!(session.display_history()[0].content().contains("story arcs"));

        // A second registry over the same store rehydrates instead of greeting again.
        let reopened = registry(store).session("skyfall", Surface::Arc).unwrap();
        assert_eq!(reopened.display_history().len(), 1);
    }

    #[test]
    fn greeting_can_be_disabled() {
        let registry = registry(MemoryStore::new()).with_greeting(false);
        let session = registry.session("skyfall", Surface::World).unwrap();
        assert!(session.display_history().is_empty());
    }

    #[test]
    fn sessions_are_shared_across_handles() {
        let registry = registry(MemoryStore::new()).with_greeting(false);
        let session = registry.session("skyfall", Surface::World).unwrap();

        tokio_test::block_on(session.send_message("A city on stilts")).unwrap();

        let again = registry.session("skyfall", Surface::World).unwrap();
        assert_eq!(again.display_history().len(), 2);
    }

    #[test]
    fn rejects_unsafe_project_ids() {
        for id in ["", "../etc", "a/b", ".hidden", "spaces here"] {
            assert!(validate_project_id(id).is_err(), "{id} should be rejected");
        }
        for id in ["skyfall", "saga-2", "my_world.v1"] {
            validate_project_id(id).unwrap();
        }
        let registry = registry(MemoryStore::new());
        assert!(registry.session("a/b", Surface::World).is_err());
        assert!(registry.is_empty());
    }
}
