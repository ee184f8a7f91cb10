use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use loresmith::{
    Config, build_info,
    cli::{Cli, Commands, ConfigCommands, HistoryCommands, repl},
    core::{ExportedChat, FileStore, SavedHistory, SessionRegistry, history},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    tracing::debug!(version = %build_info::version_string(), "loresmith starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Chat {
            project,
            surface,
            preamble_file,
            no_greeting,
        } => {
            let config = Config::load()?;
            let client = config.provider.create_client()?;
            let store = FileStore::from_config(&config)?;
            let registry =
                SessionRegistry::new(client, Arc::new(store), config.chat.session_settings())
                    .with_greeting(!no_greeting);

            let session = registry.session(&project, surface)?;
            if let Some(path) = preamble_file {
                session.set_preamble(Some(std::fs::read_to_string(&path)?));
            }

            repl::run(session).await?;
        }

        Commands::History { command } => {
            handle_history_command(command)?;
        }

        Commands::Serve { host, port } => {
            let config = Config::load()?;
            let host = host.unwrap_or_else(|| config.api.host.clone());
            let port = port.unwrap_or(config.api.port);
            loresmith::api::serve(&config, &host, port).await?;
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = Config::load()?;
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigCommands::Path => {
                let path = Config::config_path()?;
                println!("{}", path.display());
            }
            ConfigCommands::GenerateToken => {
                let token = loresmith::config::ApiConfig::generate_token();
                println!("Generated API token:\n");
                println!("  {token}\n");
                println!("Add to your config.toml:");
                println!("  [api]");
                println!("  token = \"{token}\"\n");
                println!("Or set environment variable:");
                println!("  export LORESMITH_API_TOKEN=\"{token}\"");
            }
        },
    }

    Ok(())
}

fn handle_history_command(command: HistoryCommands) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = FileStore::from_config(&config)?;

    match command {
        HistoryCommands::List { format } => {
            let chats = history::list(&store)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&chats)?);
            } else {
                // Table format
                println!("{:<32} {:<8} {:>8}  Updated", "Project", "Surface", "Messages");
                println!("{}", "-".repeat(70));
                for chat in chats {
                    let updated = chat.updated.map_or_else(
                        || "-".to_string(),
                        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
                    );
                    let project: String = chat.project_id.chars().take(30).collect();
                    println!(
                        "{:<32} {:<8} {:>8}  {}",
                        project,
                        chat.surface.to_string(),
                        chat.messages,
                        updated
                    );
                }
            }
        }

        HistoryCommands::Show {
            project,
            surface,
            context,
        } => {
            let histories = SavedHistory::open(&store, &project, surface)?.load()?;
            let messages = if context {
                histories.context()
            } else {
                histories.display()
            };
            for message in messages {
                println!("{}\n", repl::render_message(message));
            }
        }

        HistoryCommands::Export {
            project,
            surface,
            format,
            output,
        } => {
            let histories = SavedHistory::open(&store, &project, surface)?.load()?;
            let export = ExportedChat::new(&project, surface, histories.display());

            if let Some(path) = output {
                export.write_to(&path, format)?;
                println!("Exported {surface} chat to {}", path.display());
            } else {
                println!("{}", export.render(format)?);
            }
        }

        HistoryCommands::Reset {
            project,
            surface,
            yes,
        } => {
            let saved = SavedHistory::open(&store, &project, surface)?;
            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt(format!("Delete the {surface} chat for '{project}'?"))
                    .default(false)
                    .interact()?;

            if confirmed {
                saved.clear()?;
                println!("Cleared {surface} chat for '{project}'");
            }
        }

        HistoryCommands::Delete {
            project,
            message_id,
            surface,
        } => {
            let message = SavedHistory::open(&store, &project, surface)?.delete_message(&message_id)?;
            println!("Deleted {}", message.id());
        }
    }

    Ok(())
}
