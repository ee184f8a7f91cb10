//! CLI command parsing and execution.

pub mod repl;

use std::path::PathBuf;

use chat_core::Surface;
use clap::{Parser, Subcommand};

use crate::core::ExportFormat;

/// Loresmith - world and story-arc chat for authoring projects.
#[derive(Parser)]
#[command(name = "loresmith")]
#[command(about = "World and story-arc chat for authoring projects")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat about a project interactively.
    #[command(visible_alias = "c")]
    Chat {
        /// Project ID.
        #[arg(short, long)]
        project: String,

        /// Chat surface (world or arc).
        #[arg(short, long, default_value_t = Surface::World)]
        surface: Surface,

        /// File whose contents are sent as a system preamble with every request.
        #[arg(long)]
        preamble_file: Option<PathBuf>,

        /// Don't greet a brand-new conversation.
        #[arg(long)]
        no_greeting: bool,
    },

    /// Inspect and manage saved conversations.
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Start the HTTP API server.
    Serve {
        /// Host to bind to (defaults to [api] host).
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (defaults to [api] port).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Generate a new API token for remote access.
    GenerateToken,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List projects with saved conversations.
    List {
        /// Output format (table or json).
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Print a conversation.
    Show {
        /// Project ID.
        project: String,

        /// Chat surface (world or arc).
        #[arg(short, long, default_value_t = Surface::World)]
        surface: Surface,

        /// Show the compressed context sent to the model instead of the transcript.
        #[arg(long)]
        context: bool,
    },

    /// Export a conversation.
    Export {
        /// Project ID.
        project: String,

        /// Chat surface (world or arc).
        #[arg(short, long, default_value_t = Surface::World)]
        surface: Surface,

        /// Output format (markdown or json).
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,

        /// Output file path (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a conversation.
    Reset {
        /// Project ID.
        project: String,

        /// Chat surface (world or arc).
        #[arg(short, long, default_value_t = Surface::World)]
        surface: Surface,

        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a summary or artifact.
    Delete {
        /// Project ID.
        project: String,

        /// Message ID.
        message_id: String,

        /// Chat surface (world or arc).
        #[arg(short, long, default_value_t = Surface::World)]
        surface: Surface,
    },
}
