//! Core logic shared across the CLI and the HTTP API.

mod error;
pub mod export;
pub mod history;
pub mod registry;
pub mod storage;

pub use error::{Error, Result};
pub use export::{ExportFormat, ExportedChat};
pub use history::{SavedChat, SavedHistory};
pub use registry::{SessionRegistry, SharedSession};
pub use storage::FileStore;
