//! Loresmith - world and story-arc chat for authoring projects.
//!
//! Each project has two chat surfaces (world building and story arcs). Every
//! surface keeps a full transcript for display and a bounded context for the
//! model, folding older turns into rolling summaries as the window fills.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐        ┌─────────────┐
//! │  CLI / REPL │        │   HTTP API  │
//! └──────┬──────┘        └──────┬──────┘
//!        └──────────┬───────────┘
//!            ┌──────┴──────┐
//!            │    Core     │  registry, file storage, export
//!            └──────┬──────┘
//!            ┌──────┴──────┐
//!            │  chat-core  │  sessions, window policy, summarizer
//!            └─────────────┘
//! ```

pub mod api;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod core;

pub use config::Config;
