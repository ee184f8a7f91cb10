//! Sessions survive a restart when backed by the file store.

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::error::Result as CompletionResult;
use chat_core::{CompletionClient, CompletionRequest, SessionSettings, Surface, WindowPolicy};
use loresmith::core::{ExportFormat, ExportedChat, FileStore, SavedHistory, SessionRegistry, history};

/// Replies with a fixed digest to summary requests and echoes everything else.
struct Scribe;

#[async_trait]
impl CompletionClient for Scribe {
    fn name(&self) -> &'static str {
        "scribe"
    }

    async fn complete(&self, request: CompletionRequest) -> CompletionResult<String> {
        let last = request
            .messages
            .last()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        if last.contains("Summarize the conversation above") {
            Ok("islands, guilds and a fallen moon".to_string())
        } else {
            Ok(format!("noted: {last}"))
        }
    }
}

fn registry(root: &std::path::Path, limit: usize) -> SessionRegistry {
    let settings = SessionSettings {
        window: WindowPolicy::new(limit),
        ..SessionSettings::default()
    };
    SessionRegistry::new(
        Arc::new(Scribe),
        Arc::new(FileStore::with_root(root.to_path_buf())),
        settings,
    )
}

#[tokio::test]
async fn compressed_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = registry(dir.path(), 4).with_greeting(false);
    let session = first.session("skyfall", Surface::World).unwrap();
    for text in ["islands", "guilds", "the moon"] {
        session.send_message(text).await.unwrap();
    }

    let display = session.display_history();
    let context = session.context_history();
    assert_eq!(display.len(), 6);
    assert!(context.len() <= 4);
    assert!(context[0].is_summary());
    drop(first);

    let second = registry(dir.path(), 4);
    let reopened = second.session("skyfall", Surface::World).unwrap();
    assert_eq!(reopened.display_history(), display);
    assert_eq!(reopened.context_history(), context);

    assert!(dir.path().join("worldchat/skyfall/display.json").exists());
    assert!(dir.path().join("worldchat/skyfall/context.json").exists());
}

#[tokio::test]
async fn surfaces_are_stored_separately() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path(), 10).with_greeting(false);

    registry
        .session("skyfall", Surface::World)
        .unwrap()
        .send_message("a city on stilts")
        .await
        .unwrap();
    registry
        .session("skyfall", Surface::Arc)
        .unwrap()
        .send_message("the flood comes")
        .await
        .unwrap();

    let store = FileStore::with_root(dir.path().to_path_buf());
    let chats = history::list(&store).unwrap();
    assert_eq!(chats.len(), 2);
    assert!(chats.iter().all(|c| c.messages == 2));

    let arc = SavedHistory::open(&store, "skyfall", Surface::Arc)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(arc.display()[0].content(), "the flood comes");
}

#[tokio::test]
async fn offline_reset_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path(), 10);
    let session = registry.session("skyfall", Surface::Arc).unwrap();
    session.send_message("the flood comes").await.unwrap();
    session.generate_artifact(None).await.unwrap();

    let store = FileStore::with_root(dir.path().to_path_buf());
    let saved = SavedHistory::open(&store, "skyfall", Surface::Arc).unwrap();
    let histories = saved.load().unwrap();
    // Greeting, turn, reply, artifact.
    assert_eq!(histories.display().len(), 4);

    let out = dir.path().join("arc.md");
    ExportedChat::new("skyfall", Surface::Arc, histories.display())
        .write_to(&out, ExportFormat::Markdown)
        .unwrap();
    let markdown = std::fs::read_to_string(&out).unwrap();
    assert!(markdown.contains("the flood comes"));

    saved.clear().unwrap();
    assert!(history::list(&store).unwrap().is_empty());
}
