//! Session controller.
//!
//! Drives one user turn end to end: append the turn, compress the context if
//! the window overflowed, call the model, record the reply, persist. State
//! lives behind a short-lived lock that is never held across a model call, so
//! a session can be shared between tasks; a second send while one is in
//! flight is rejected with [`ChatError::Busy`].

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ChatError;
use crate::message::{Message, Role};
use crate::persistence::{HistoryStore, KeyValueStore};
use crate::provider::{ChatTurn, CompletionClient, CompletionRequest};
use crate::store::{Histories, MessageStore};
use crate::summarizer::{DEFAULT_SUMMARY_TEMPERATURE, Summarizer};
use crate::surface::Surface;
use crate::window::WindowPolicy;

/// What the session is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingState {
    #[default]
    Idle,
    Sending,
    Summarizing,
}

impl PendingState {
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Summarizing => "summarizing",
        }
    }
}

/// Model and window settings for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Model identifier used for every request.
    pub model: String,
    /// Temperature for chat turns.
    pub temperature: f32,
    /// Temperature for summaries.
    pub summary_temperature: f32,
    /// Temperature for artifacts.
    pub artifact_temperature: f32,
    /// Context window policy.
    pub window: WindowPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.8,
            summary_temperature: DEFAULT_SUMMARY_TEMPERATURE,
            artifact_temperature: 0.3,
            window: WindowPolicy::default(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered; the reply was appended to both histories.
    Replied(Message),
    /// The call failed; an error notice was appended to the display history.
    Failed(Message),
    /// The session was reset while the turn was in flight.
    Discarded,
}

impl TurnOutcome {
    /// The message this turn added, if any.
    #[must_use]
    pub const fn message(&self) -> Option<&Message> {
        match self {
            Self::Replied(m) | Self::Failed(m) => Some(m),
            Self::Discarded => None,
        }
    }
}

/// Read-only view handed to user interfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub project_id: String,
    pub surface: Surface,
    pub display_history: Vec<Message>,
    pub pending_state: PendingState,
    pub context_length: usize,
}

struct State<S> {
    store: MessageStore<S>,
    pending: PendingState,
    // Bumped by reset; results from an older epoch are dropped.
    epoch: u64,
    preamble: Option<String>,
}

/// One chat session: one project, one surface.
pub struct ChatSession<C, S> {
    project_id: String,
    surface: Surface,
    client: C,
    settings: SessionSettings,
    summarizer: Summarizer,
    state: Mutex<State<S>>,
}

impl<C, S> std::fmt::Debug for ChatSession<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("project_id", &self.project_id)
            .field("surface", &self.surface)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<C, S> ChatSession<C, S>
where
    C: CompletionClient,
    S: KeyValueStore,
{
    /// Open a session, rehydrating saved histories if there are any.
    pub fn open(
        project_id: impl Into<String>,
        surface: Surface,
        client: C,
        store: S,
        settings: SessionSettings,
    ) -> Self {
        let project_id = project_id.into();
        let store = MessageStore::open(project_id.clone(), HistoryStore::new(store, surface));
        let summarizer = Summarizer::new(settings.model.clone(), settings.summary_temperature, surface);

        Self {
            project_id,
            surface,
            client,
            settings,
            summarizer,
            state: Mutex::new(State {
                store,
                pending: PendingState::Idle,
                epoch: 0,
                preamble: None,
            }),
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub const fn surface(&self) -> Surface {
        self.surface
    }

    /// The completion client this session talks to.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn pending_state(&self) -> PendingState {
        self.state.lock().pending
    }

    /// Snapshot of both histories.
    #[must_use]
    pub fn histories(&self) -> Histories {
        self.state.lock().store.histories().clone()
    }

    #[must_use]
    pub fn display_history(&self) -> Vec<Message> {
        self.state.lock().store.histories().display().to_vec()
    }

    #[must_use]
    pub fn context_history(&self) -> Vec<Message> {
        self.state.lock().store.histories().context().to_vec()
    }

    /// View for user interfaces.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let state = self.state.lock();
        let histories = state.store.histories();
        SessionView {
            project_id: self.project_id.clone(),
            surface: self.surface,
            display_history: histories.display().to_vec(),
            pending_state: state.pending,
            context_length: histories.context().len(),
        }
    }

    /// Set the system preamble sent ahead of every request.
    ///
    /// The preamble is never stored in either history.
    pub fn set_preamble(&self, preamble: Option<String>) {
        self.state.lock().preamble = preamble.filter(|p| !p.trim().is_empty());
    }

    /// Append the surface greeting if the session has no messages yet.
    ///
    /// Returns whether a greeting was added.
    pub fn greet(&self, project_title: &str) -> bool {
        let mut state = self.state.lock();
        if !state.pending.is_idle() || !state.store.histories().is_empty() {
            return false;
        }
        state
            .store
            .append(Message::assistant(self.surface.greeting(project_title)));
        true
    }

    /// Send a user message and wait for the model's reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank input and
    /// [`ChatError::Busy`] while another turn is in flight. Model failures are
    /// not errors: they end the turn with [`TurnOutcome::Failed`].
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let turn = self.begin(|store| store.append(Message::user(text)))?;

        tracing::info!(
            project = %self.project_id,
            surface = %self.surface,
            "sending chat turn"
        );

        if !self.compress(&turn).await {
            return Ok(TurnOutcome::Discarded);
        }

        let Some(request) = turn.with_state(|state| {
            self.request(state, None, self.settings.temperature)
        }) else {
            return Ok(TurnOutcome::Discarded);
        };

        let result = self.client.complete(request).await;

        let outcome = turn.with_state(|state| match result {
            Ok(reply) => {
                let message = Message::assistant(reply);
                state.store.append(message.clone());
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                tracing::error!(
                    project = %self.project_id,
                    surface = %self.surface,
                    error = %e,
                    "chat completion failed"
                );
                let message = Message::system(format!("Error: {e}"));
                state.store.append_display(message.clone());
                TurnOutcome::Failed(message)
            }
        });

        Ok(outcome.unwrap_or(TurnOutcome::Discarded))
    }

    /// Ask the model for a structured artifact built from the conversation.
    ///
    /// Uses the surface's default instruction when `instruction` is `None`.
    /// The instruction turn itself is not recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyConversation`] if there is nothing to work
    /// from and [`ChatError::Busy`] while another turn is in flight.
    pub async fn generate_artifact(&self, instruction: Option<&str>) -> Result<TurnOutcome, ChatError> {
        let instruction = instruction
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| self.surface.artifact_prompt())
            .to_string();

        let turn = self.begin(|_| ())?;

        let Some(request) = turn.with_state(|state| {
            if state.store.histories().context().is_empty() {
                return None;
            }
            Some(self.request(
                state,
                Some(ChatTurn::new(Role::User, instruction)),
                self.settings.artifact_temperature,
            ))
        }) else {
            return Ok(TurnOutcome::Discarded);
        };

        let Some(request) = request else {
            return Err(ChatError::EmptyConversation);
        };

        tracing::info!(
            project = %self.project_id,
            surface = %self.surface,
            "generating artifact"
        );

        let result = self.client.complete(request).await;

        let outcome = turn.with_state(|state| match result {
            Ok(text) => {
                let message = Message::artifact(text);
                state.store.append(message.clone());
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                tracing::error!(
                    project = %self.project_id,
                    surface = %self.surface,
                    error = %e,
                    "artifact generation failed"
                );
                let message = Message::system(format!("Error: failed to generate artifact: {e}"));
                state.store.append_display(message.clone());
                TurnOutcome::Failed(message)
            }
        });

        Ok(outcome.unwrap_or(TurnOutcome::Discarded))
    }

    /// Clear both histories and the saved state.
    ///
    /// Always succeeds. A turn in flight is abandoned and its result dropped.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.pending = PendingState::Idle;
        state.store.clear();
        tracing::info!(project = %self.project_id, surface = %self.surface, "chat reset");
    }

    /// Delete a summary or artifact from both histories.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Busy`] while a turn is in flight,
    /// [`ChatError::NotFound`] for unknown IDs and [`ChatError::NotDeletable`]
    /// for ordinary conversation turns.
    pub fn delete_message(&self, id: &str) -> Result<Message, ChatError> {
        let mut state = self.state.lock();
        if !state.pending.is_idle() {
            return Err(ChatError::Busy);
        }

        let message = state
            .store
            .histories()
            .find(id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;

        if !message.is_deletable() {
            return Err(ChatError::NotDeletable(id.to_string()));
        }

        state.store.remove(|m| m.id() == id);
        tracing::debug!(project = %self.project_id, id, "deleted message");
        Ok(message)
    }

    /// Claim the session for a turn.
    fn begin<F>(&self, first: F) -> Result<Turn<'_, S>, ChatError>
    where
        F: FnOnce(&mut MessageStore<S>),
    {
        let mut state = self.state.lock();
        if !state.pending.is_idle() {
            return Err(ChatError::Busy);
        }
        first(&mut state.store);
        state.pending = PendingState::Sending;

        Ok(Turn {
            state: &self.state,
            epoch: state.epoch,
        })
    }

    /// Compress until the context fits the window.
    ///
    /// Returns `false` if the session was reset meanwhile.
    async fn compress(&self, turn: &Turn<'_, S>) -> bool {
        loop {
            let segment = turn.with_state(|state| {
                let segment = self
                    .settings
                    .window
                    .segment(state.store.histories().context())
                    .map(|(prefix, _)| prefix.to_vec());
                if segment.is_some() {
                    state.pending = PendingState::Summarizing;
                }
                segment
            });

            let segment = match segment {
                None => return false,
                Some(None) => return true,
                Some(Some(segment)) => segment,
            };

            tracing::info!(
                project = %self.project_id,
                surface = %self.surface,
                count = segment.len(),
                "compressing context history"
            );

            let summary = self.summarizer.summarize(&self.client, &segment).await;

            let applied = turn.with_state(|state| {
                state.store.replace_prefix(summary, segment.len());
                state.pending = PendingState::Sending;
            });
            if applied.is_none() {
                return false;
            }
        }
    }

    fn request(
        &self,
        state: &State<S>,
        trailing: Option<ChatTurn>,
        temperature: f32,
    ) -> CompletionRequest {
        let preamble = state
            .preamble
            .as_ref()
            .map(|p| ChatTurn::new(Role::System, p.clone()));

        let messages = preamble
            .into_iter()
            .chain(state.store.histories().context().iter().map(ChatTurn::from))
            .chain(trailing)
            .collect();

        CompletionRequest {
            messages,
            model: self.settings.model.clone(),
            temperature,
        }
    }
}

/// An in-flight turn. Returns the session to idle when dropped, unless the
/// session was reset in the meantime.
struct Turn<'a, S> {
    state: &'a Mutex<State<S>>,
    epoch: u64,
}

impl<S> Turn<'_, S> {
    /// Run `f` on the state if this turn is still current.
    fn with_state<T>(&self, f: impl FnOnce(&mut State<S>) -> T) -> Option<T> {
        let mut state = self.state.lock();
        (state.epoch == self.epoch).then(|| f(&mut state))
    }
}

impl<S> Drop for Turn<'_, S> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.epoch == self.epoch {
            state.pending = PendingState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{CompletionError, Result};
    use crate::persistence::MemoryStore;

    /// Replies from a queue and records every request.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn with(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().push(request);
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))
        }
    }

    fn session(client: Scripted, limit: usize) -> ChatSession<Scripted, MemoryStore> {
        let settings = SessionSettings {
            window: WindowPolicy::new(limit),
            ..SessionSettings::default()
        };
        ChatSession::open("skyfall", Surface::World, client, MemoryStore::new(), settings)
    }

    #[tokio::test]
    async fn reply_goes_to_both_histories() {
        let chat = session(Scripted::with(vec![Ok("A desert of glass.".to_string())]), 10);

        let outcome = chat.send_message("  Describe the wastes  ").await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied(ref m) if m.content() == "A desert of glass."));
        let histories = chat.histories();
        assert_eq!(histories.display().len(), 2);
        assert_eq!(histories.context().len(), 2);
        assert_eq!(histories.display()[0].content(), "Describe the wastes");
        assert_eq!(chat.pending_state(), PendingState::Idle);
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let chat = session(Scripted::default(), 10);
        assert!(matches!(chat.send_message("   ").await, Err(ChatError::EmptyMessage)));
        assert!(chat.display_history().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_user_turn_in_context_only_once() {
        let chat = session(
            Scripted::with(vec![Err(CompletionError::Transport("refused".to_string()))]),
            10,
        );

        let outcome = chat.send_message("hello").await.unwrap();

        let TurnOutcome::Failed(notice) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(notice.role(), Role::System);
        assert!(notice.content().starts_with("Error: "));

        let histories = chat.histories();
        assert_eq!(histories.display().len(), 2);
        assert_eq!(histories.context().len(), 1);
        assert_eq!(histories.context()[0].content(), "hello");
        assert_eq!(chat.pending_state(), PendingState::Idle);
    }

    #[tokio::test]
    async fn compression_runs_before_the_model_call() {
        let client = Scripted::with(vec![
            Ok("r1".to_string()),
            Ok("r2".to_string()),
            Ok("the digest".to_string()),
            Ok("r3".to_string()),
        ]);
        let chat = session(client, 4);

        chat.send_message("one").await.unwrap();
        chat.send_message("two").await.unwrap();
        chat.send_message("three").await.unwrap();

        let context = chat.context_history();
        assert_eq!(context.len(), 3);
        assert!(context[0].is_summary());
        assert!(context[0].content().contains("(4 messages): the digest."));
        assert_eq!(context[1].content(), "three");
        assert_eq!(context[2].content(), "r3");
        assert_eq!(chat.display_history().len(), 6);

        let requests = chat.client.requests.lock();
        assert_eq!(requests.len(), 4);
        let main = &requests[3];
        assert_eq!(main.messages.len(), 2);
        assert_eq!(main.messages[0].role, Role::System);
        assert!((main.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn preamble_is_sent_but_not_stored() {
        let chat = session(Scripted::default(), 10);
        chat.set_preamble(Some("WORLD OVERVIEW: Eldoria".to_string()));

        chat.send_message("plan arc one").await.unwrap();

        let requests = chat.client.requests.lock();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].content, "WORLD OVERVIEW: Eldoria");
        assert_eq!(requests[0].messages.len(), 2);
        drop(requests);
        assert!(chat.display_history().iter().all(|m| m.role() != Role::System));
    }

    #[tokio::test]
    async fn artifact_is_tagged_and_deletable() {
        let chat = session(
            Scripted::with(vec![Ok("hi".to_string()), Ok("=== ARC SUMMARY ===".to_string())]),
            10,
        );
        chat.send_message("arc one: the siege").await.unwrap();

        let outcome = chat.generate_artifact(None).await.unwrap();
        let TurnOutcome::Replied(artifact) = outcome else {
            panic!("expected artifact");
        };
        assert!(artifact.is_artifact());
        assert_eq!(chat.context_history().len(), 3);

        {
            let requests = chat.client.requests.lock();
            let last = requests[1].messages.last().unwrap();
            assert!(last.content.contains("=== WORLD DIGEST ==="));
            assert!((requests[1].temperature - 0.3).abs() < f32::EPSILON);
        }

        chat.delete_message(artifact.id()).unwrap();
        assert_eq!(chat.display_history().len(), 2);
        assert_eq!(chat.context_history().len(), 2);
    }

    #[tokio::test]
    async fn artifact_needs_a_conversation() {
        let chat = session(Scripted::default(), 10);
        assert!(matches!(
            chat.generate_artifact(Some("digest")).await,
            Err(ChatError::EmptyConversation)
        ));
        assert_eq!(chat.pending_state(), PendingState::Idle);
    }

    #[tokio::test]
    async fn ordinary_turns_cannot_be_deleted() {
        let chat = session(Scripted::default(), 10);
        chat.send_message("hello").await.unwrap();
        let id = chat.display_history()[0].id().to_string();

        assert!(matches!(chat.delete_message(&id), Err(ChatError::NotDeletable(_))));
        assert!(matches!(chat.delete_message("msg_missing"), Err(ChatError::NotFound(_))));
        assert_eq!(chat.display_history().len(), 2);
    }

    #[tokio::test]
    async fn greeting_only_on_empty_session() {
        let chat = session(Scripted::default(), 10);
        assert!(chat.greet("Skyfall"));
        assert!(!chat.greet("Skyfall"));
        assert_eq!(chat.display_history().len(), 1);
        assert_eq!(chat.context_history().len(), 1);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let chat = session(Scripted::default(), 10);
        chat.send_message("hello").await.unwrap();
        chat.reset();

        let view = chat.view();
        assert!(view.display_history.is_empty());
        assert_eq!(view.context_length, 0);
        assert_eq!(view.pending_state, PendingState::Idle);
    }
}
