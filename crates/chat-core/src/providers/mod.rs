//! Completion provider implementations.

mod backend;
mod unified;

pub use backend::BackendClient;
pub use unified::{Backend, UnifiedClient};
