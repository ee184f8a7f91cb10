//! Line-oriented chat loop.

use std::io::Write as _;

use chat_core::{ChatError, Message, Role, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::SharedSession;

const HELP: &str = "\
Commands:
  /artifact [instruction]  generate a structured digest of the conversation
  /delete <id>             delete a summary or artifact
  /history                 print the transcript
  /context                 print what the model sees, summaries included
  /reset                   clear the conversation
  /quit                    leave
Anything else is sent as a message.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Artifact(Option<String>),
    Delete(String),
    History,
    Context,
    Reset,
    Help,
    Quit,
    Unknown(String),
}

/// Parse a line of input. Blank lines yield `None`.
#[must_use]
pub fn parse(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Say(line.to_string()));
    };

    let (command, arg) = match rest.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let parsed = match (command, arg) {
        ("artifact" | "a", arg) => ReplCommand::Artifact(arg.map(str::to_string)),
        ("delete" | "d", Some(id)) => ReplCommand::Delete(id.to_string()),
        ("history" | "h", None) => ReplCommand::History,
        ("context", None) => ReplCommand::Context,
        ("reset", None) => ReplCommand::Reset,
        ("help" | "?", _) => ReplCommand::Help,
        ("quit" | "q" | "exit", None) => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.to_string()),
    };
    Some(parsed)
}

/// Format a message for the terminal.
#[must_use]
pub fn render_message(message: &Message) -> String {
    let label = match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    let tag = if message.is_summary() {
        format!(" [summary {}]", message.id())
    } else if message.is_artifact() {
        format!(" [artifact {}]", message.id())
    } else {
        String::new()
    };

    format!("{label}{tag}: {}", message.content())
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Replied(message) | TurnOutcome::Failed(message) => {
            println!("\n{}\n", render_message(message));
        }
        TurnOutcome::Discarded => println!("(reply discarded)"),
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Run the chat loop on stdin until `/quit` or end of input.
///
/// # Errors
///
/// Returns error if stdin or stdout fail.
pub async fn run(session: SharedSession) -> anyhow::Result<()> {
    println!(
        "Chatting about '{}' ({}). Type /help for commands.\n",
        session.project_id(),
        session.surface()
    );
    for message in session.display_history() {
        println!("{}\n", render_message(&message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}> ", session.surface());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let Some(command) = parse(&line) else {
            continue;
        };

        match command {
            ReplCommand::Say(text) => match session.send_message(&text).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => eprintln!("error: {e}"),
            },
            ReplCommand::Artifact(instruction) => {
                match session.generate_artifact(instruction.as_deref()).await {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(ChatError::EmptyConversation) => {
                        eprintln!("error: nothing to summarize yet");
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            ReplCommand::Delete(id) => match session.delete_message(&id) {
                Ok(message) => println!("deleted {}", message.id()),
                Err(e) => eprintln!("error: {e}"),
            },
            ReplCommand::History => {
                for message in session.display_history() {
                    println!("{}\n", render_message(&message));
                }
            }
            ReplCommand::Context => {
                for message in session.context_history() {
                    println!("{}\n", render_message(&message));
                }
            }
            ReplCommand::Reset => {
                if confirm("Clear the whole conversation?")? {
                    session.reset();
                    println!("conversation cleared");
                }
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(input) => {
                eprintln!("unknown command: {input} (try /help)");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse("  The moon is hollow  "),
            Some(ReplCommand::Say("The moon is hollow".to_string()))
        );
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("/artifact"), Some(ReplCommand::Artifact(None)));
        assert_eq!(
            parse("/artifact list every faction"),
            Some(ReplCommand::Artifact(Some("list every faction".to_string())))
        );
        assert_eq!(
            parse("/delete msg_01J"),
            Some(ReplCommand::Delete("msg_01J".to_string()))
        );
        assert_eq!(parse("/history"), Some(ReplCommand::History));
        assert_eq!(parse("/context"), Some(ReplCommand::Context));
        assert_eq!(parse("/reset"), Some(ReplCommand::Reset));
        assert_eq!(parse("/q"), Some(ReplCommand::Quit));
        assert_eq!(parse("/help"), Some(ReplCommand::Help));
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(
            parse("/delete"),
            Some(ReplCommand::Unknown("/delete".to_string()))
        );
        assert_eq!(
            parse("/dance now"),
            Some(ReplCommand::Unknown("/dance now".to_string()))
        );
    }

    #[test]
    fn renders_tags_with_ids() {
        let summary = Message::summary("[Previous conversation summary (4 messages): x.]", 4);
        let rendered = render_message(&summary);
        assert!(rendered.starts_with(&format!("system [summary {}]: ", summary.id())));

        assert_eq!(render_message(&Message::user("hi")), "you: hi");
    }
}
