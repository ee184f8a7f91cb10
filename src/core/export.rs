//! Transcript export for sharing and backup
//!
//! Export a chat's display history to JSON or Markdown format

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use chat_core::{Message, Role, Surface};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::Error;

/// Export format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON format (full fidelity)
    Json,
    /// Markdown format (human readable)
    #[default]
    Markdown,
}

impl ExportFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }

    /// MIME type for this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(Error::InvalidArgument(format!(
                "unknown export format '{other}' (expected markdown or json)"
            ))),
        }
    }
}

/// Exported transcript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedChat<'a> {
    pub project_id: &'a str,
    pub surface: Surface,
    pub exported_at: DateTime<Utc>,
    pub messages: &'a [Message],
}

impl<'a> ExportedChat<'a> {
    #[must_use]
    pub fn new(project_id: &'a str, surface: Surface, messages: &'a [Message]) -> Self {
        Self {
            project_id,
            surface,
            exported_at: Utc::now(),
            messages,
        }
    }

    /// Render in the given format.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails
    pub fn render(&self, format: ExportFormat) -> serde_json::Result<String> {
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(self),
            ExportFormat::Markdown => Ok(self.to_markdown()),
        }
    }

    /// Render and write to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or the file write fails
    pub fn write_to(&self, path: &Path, format: ExportFormat) -> anyhow::Result<()> {
        let content = self.render(format)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    fn to_markdown(&self) -> String {
        let mut md = String::new();

        let title = match self.surface {
            Surface::World => "World building",
            Surface::Arc => "Story arcs",
        };
        let _ = writeln!(md, "# {title}: {}\n", self.project_id);
        let _ = writeln!(md, "**Exported:** {}", format_timestamp(self.exported_at));
        let _ = writeln!(md, "**Messages:** {}\n", self.messages.len());
        md.push_str("---\n\n");

        for message in self.messages {
            let role = match message.role() {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            let tag = if message.is_summary() {
                " (summary)"
            } else if message.is_artifact() {
                " (artifact)"
            } else {
                ""
            };

            let _ = writeln!(md, "## {role}{tag}\n");
            let _ = writeln!(md, "*{}*\n", format_timestamp(message.timestamp()));

            if message.is_artifact() {
                md.push_str("```\n");
                md.push_str(message.content());
                md.push_str("\n```\n\n");
            } else {
                md.push_str(message.content());
                md.push_str("\n\n");
            }

            md.push_str("---\n\n");
        }

        md
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Vec<Message> {
        vec![
            Message::assistant("Welcome!"),
            Message::user("Tell me about the Shattered Coast"),
            Message::artifact("=== WORLD DIGEST ===\noverview: coastal ruins"),
            Message::system("Error: connection refused"),
        ]
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn json_keeps_every_field() {
        let messages = transcript();
        let json = ExportedChat::new("skyfall", Surface::World, &messages)
            .render(ExportFormat::Json)
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["projectId"], "skyfall");
        assert_eq!(value["surface"], "world");
        assert_eq!(value["messages"].as_array().unwrap().len(), 4);
        assert_eq!(value["messages"][2]["isArtifact"], true);
    }

    #[test]
    fn markdown_has_headings_and_tags() {
        let messages = transcript();
        let md = ExportedChat::new("skyfall", Surface::Arc, &messages)
            .render(ExportFormat::Markdown)
            .unwrap();

        assert!(md.starts_with("# Story arcs: skyfall"));
        assert!(md.contains("**Messages:** 4"));
        assert!(md.contains("## User\n"));
        assert!(md.contains("## Assistant (artifact)"));
        assert!(md.contains("```\n=== WORLD DIGEST ==="));
        assert!(md.contains("## System\n"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("skyfall.md");
        let messages = transcript();

        ExportedChat::new("skyfall", Surface::World, &messages)
            .write_to(&path, ExportFormat::Markdown)
            .unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("Shattered Coast"));
    }
}
