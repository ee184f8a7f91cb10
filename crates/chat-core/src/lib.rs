//! Bounded-context chat sessions with rolling summaries.

pub mod error;
pub mod message;
pub mod persistence;
pub mod provider;
pub mod providers;
pub mod session;
pub mod store;
pub mod summarizer;
pub mod surface;
pub mod window;

pub use error::{ChatError, CompletionError, StorageError};
pub use message::{Message, Role};
pub use persistence::{HistoryStore, KeyValueStore, MemoryStore};
pub use provider::{ChatTurn, CompletionClient, CompletionRequest};
pub use session::{ChatSession, PendingState, SessionSettings, SessionView, TurnOutcome};
pub use store::{Histories, MessageStore};
pub use summarizer::Summarizer;
pub use surface::Surface;
pub use window::WindowPolicy;
