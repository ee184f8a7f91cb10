//! Durable storage for session histories.
//!
//! [`KeyValueStore`] is the raw string store; [`HistoryStore`] maps a project
//! onto two namespaced keys (display and context) and handles serialization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::message::Message;
use crate::store::Histories;
use crate::surface::Surface;

/// Storage result type.
pub type Result<T> = std::result::Result<T, StorageError>;

/// String key-value backend.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-memory backend. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

const DISPLAY: &str = "display";
const CONTEXT: &str = "context";

/// Persistence adapter for one chat surface.
#[derive(Debug, Clone)]
pub struct HistoryStore<S> {
    store: S,
    surface: Surface,
}

impl<S: KeyValueStore> HistoryStore<S> {
    #[must_use]
    pub const fn new(store: S, surface: Surface) -> Self {
        Self { store, surface }
    }

    #[must_use]
    pub const fn surface(&self) -> Surface {
        self.surface
    }

    /// Key for one history of a project, e.g. `worldchat/skyfall/context`.
    #[must_use]
    pub fn key(&self, project_id: &str, history: &str) -> String {
        format!("{}/{project_id}/{history}", self.surface.key_prefix())
    }

    /// Key of the single-array transcript written by earlier releases.
    fn legacy_key(&self, project_id: &str) -> String {
        format!("{}_{project_id}", self.surface.key_prefix())
    }

    /// Load both histories for a project.
    ///
    /// A missing context history is rebuilt from the display history, and a
    /// legacy single transcript seeds both. Either way the rebuilt histories
    /// are written back under the current keys, so ids assigned to entries
    /// stored without one stay the same on the next load.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or stored data cannot be parsed.
    pub fn load(&self, project_id: &str) -> Result<Option<Histories>> {
        let Some(display) = self.read(&self.key(project_id, DISPLAY))? else {
            let Some(legacy) = self.read(&self.legacy_key(project_id))? else {
                return Ok(None);
            };
            let histories = Histories::new(legacy.clone(), legacy);
            self.save(project_id, &histories)?;
            tracing::info!(
                project = %project_id,
                surface = %self.surface,
                "migrated legacy transcript"
            );
            return Ok(Some(histories));
        };

        if let Some(context) = self.read(&self.key(project_id, CONTEXT))? {
            return Ok(Some(Histories::new(display, context)));
        }

        let histories = Histories::new(display.clone(), display);
        self.save(project_id, &histories)?;
        Ok(Some(histories))
    }

    /// Save both histories for a project.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the backend fails.
    pub fn save(&self, project_id: &str, histories: &Histories) -> Result<()> {
        let display = serde_json::to_string(histories.display())?;
        let context = serde_json::to_string(histories.context())?;
        self.store.set(&self.key(project_id, DISPLAY), &display)?;
        self.store.set(&self.key(project_id, CONTEXT), &context)?;
        Ok(())
    }

    /// Remove all stored state for a project, legacy transcript included.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    pub fn clear(&self, project_id: &str) -> Result<()> {
        self.store.remove(&self.key(project_id, DISPLAY))?;
        self.store.remove(&self.key(project_id, CONTEXT))?;
        self.store.remove(&self.legacy_key(project_id))?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<Message>>> {
        self.store
            .get(key)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StorageError::from)
    }
}
