//! Saved conversations, read and edited without a live session.

use std::collections::BTreeSet;

use chat_core::{ChatError, Histories, HistoryStore, Message, Surface};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::registry::validate_project_id;
use crate::core::{FileStore, Result};

const DISPLAY_SUFFIX: &str = "/display";

/// A conversation found in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChat {
    pub project_id: String,
    pub surface: Surface,
    /// Transcript length.
    pub messages: usize,
    /// Timestamp of the newest message.
    pub updated: Option<DateTime<Utc>>,
}

/// List every saved conversation, including legacy single-array ones.
///
/// # Errors
///
/// Returns error if storage cannot be read or a history cannot be parsed.
pub fn list(store: &FileStore) -> Result<Vec<SavedChat>> {
    let keys = store.list("")?;
    let mut chats = Vec::new();

    for surface in [Surface::World, Surface::Arc] {
        let prefix = surface.key_prefix();
        let nested = format!("{prefix}/");
        let legacy = format!("{prefix}_");

        let projects: BTreeSet<&str> = keys
            .iter()
            .filter_map(|key| {
                key.strip_prefix(&nested)
                    .and_then(|rest| rest.strip_suffix(DISPLAY_SUFFIX))
                    .or_else(|| key.strip_prefix(&legacy))
            })
            .filter(|project| validate_project_id(project).is_ok())
            .collect();

        for project in projects {
            let histories = SavedHistory::open(store, project, surface)?.load()?;
            chats.push(SavedChat {
                project_id: project.to_string(),
                surface,
                messages: histories.display().len(),
                updated: histories.display().last().map(Message::timestamp),
            });
        }
    }

    Ok(chats)
}

/// One project surface's stored histories.
#[derive(Debug, Clone)]
pub struct SavedHistory {
    project_id: String,
    histories: HistoryStore<FileStore>,
}

impl SavedHistory {
    /// # Errors
    ///
    /// Returns error if the project ID is invalid.
    pub fn open(store: &FileStore, project_id: &str, surface: Surface) -> Result<Self> {
        validate_project_id(project_id)?;
        Ok(Self {
            project_id: project_id.to_string(),
            histories: HistoryStore::new(store.clone(), surface),
        })
    }

    /// Load both histories; empty if nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or the data is corrupt.
    pub fn load(&self) -> Result<Histories> {
        Ok(self.histories.load(&self.project_id)?.unwrap_or_default())
    }

    /// Delete a summary or artifact from both histories.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] or [`ChatError::NotDeletable`] (wrapped)
    /// and storage errors.
    pub fn delete_message(&self, id: &str) -> Result<Message> {
        let histories = self.load()?;
        let message = histories
            .find(id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        if !message.is_deletable() {
            return Err(ChatError::NotDeletable(id.to_string()).into());
        }

        self.histories
            .save(&self.project_id, &histories.without(|m| m.id() == id))?;
        Ok(message)
    }

    /// Remove everything stored for this project surface.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn clear(&self) -> Result<()> {
        Ok(self.histories.clear(&self.project_id)?)
    }
}

#[cfg(test)]
mod tests {
    use chat_core::KeyValueStore;

    use super::*;
    use crate::core::Error;

    fn temp_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileStore::with_root(dir.path().to_path_buf()), dir)
    }

    fn save(store: &FileStore, project: &str, surface: Surface, display: Vec<Message>) {
        HistoryStore::new(store.clone(), surface)
            .save(project, &Histories::new(display.clone(), display))
            .unwrap();
    }

    #[test]
    fn lists_both_surfaces_and_legacy() {
        let (store, _dir) = temp_store();
        save(&store, "skyfall", Surface::World, vec![Message::user("a"), Message::assistant("b")]);
        save(&store, "skyfall", Surface::Arc, vec![Message::user("c")]);
        store
            .set("arcchat_oldsaga", &serde_json::to_string(&[Message::user("d")]).unwrap())
            .unwrap();

        let chats = list(&store).unwrap();
        let summary: Vec<_> = chats
            .iter()
            .map(|c| (c.project_id.as_str(), c.surface, c.messages))
            .collect();
        assert_eq!(
            summary,
            [
                ("skyfall", Surface::World, 2),
                ("oldsaga", Surface::Arc, 1),
                ("skyfall", Surface::Arc, 1),
            ]
        );
        assert!(chats[0].updated.is_some());
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (store, _dir) = temp_store();
        assert!(list(&store).unwrap().is_empty());
    }

    #[test]
    fn load_missing_is_empty() {
        let (store, _dir) = temp_store();
        let saved = SavedHistory::open(&store, "nothing", Surface::World).unwrap();
        assert!(saved.load().unwrap().is_empty());
    }

    #[test]
    fn delete_only_summaries_and_artifacts() {
        let (store, _dir) = temp_store();
        let turn = Message::user("a");
        let artifact = Message::artifact("=== WORLD DIGEST ===");
        save(&store, "skyfall", Surface::World, vec![turn.clone(), artifact.clone()]);

        let saved = SavedHistory::open(&store, "skyfall", Surface::World).unwrap();
        assert!(matches!(
            saved.delete_message(turn.id()),
            Err(Error::Chat(ChatError::NotDeletable(_)))
        ));
        assert!(matches!(
            saved.delete_message("msg_missing"),
            Err(Error::Chat(ChatError::NotFound(_)))
        ));

        let deleted = saved.delete_message(artifact.id()).unwrap();
        assert_eq!(deleted.id(), artifact.id());

        let histories = saved.load().unwrap();
        assert_eq!(histories.display(), [turn.clone()]);
        assert_eq!(histories.context(), [turn]);
    }

    #[test]
    fn legacy_summary_deletes_by_shown_id() {
        let (store, _dir) = temp_store();
        store
            .set(
                "arcchat_oldsaga",
                r#"[{"role":"user","content":"The flood"},{"role":"assistant","content":"=== ARC SUMMARY ===","isSummary":true}]"#,
            )
            .unwrap();

        let saved = SavedHistory::open(&store, "oldsaga", Surface::Arc).unwrap();
        let shown = saved.load().unwrap();
        let summary_id = shown.display()[1].id().to_string();

        let deleted = saved.delete_message(&summary_id).unwrap();
        assert_eq!(deleted.content(), "=== ARC SUMMARY ===");
        assert_eq!(saved.load().unwrap().display().len(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let (store, _dir) = temp_store();
        save(&store, "skyfall", Surface::Arc, vec![Message::user("a")]);

        let saved = SavedHistory::open(&store, "skyfall", Surface::Arc).unwrap();
        saved.clear().unwrap();
        assert!(saved.load().unwrap().is_empty());
        assert!(list(&store).unwrap().is_empty());
    }

    #[test]
    fn rejects_unsafe_project() {
        let (store, _dir) = temp_store();
        assert!(SavedHistory::open(&store, "../up", Surface::World).is_err());
    }
}
