//! Chat message model shared by the display and context histories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Generate a new message ID.
#[must_use]
pub fn new_message_id() -> String {
    format!("msg_{}", Ulid::new())
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
///
/// Messages are immutable once created: the histories only ever add, drop or
/// replace whole messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable identifier, generated for transcripts saved without one.
    #[serde(default = "new_message_id")]
    id: String,

    role: Role,

    content: String,

    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,

    /// Rolling summary standing in for older turns.
    #[serde(default)]
    is_summary: bool,

    /// Structured output generated on request (e.g. an arc digest).
    #[serde(default)]
    is_artifact: bool,

    /// Number of original messages a summary represents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summarized_count: Option<usize>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_summary: false,
            is_artifact: false,
            summarized_count: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message (errors, notices).
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a rolling summary covering `count` original messages.
    #[must_use]
    pub fn summary(content: impl Into<String>, count: usize) -> Self {
        Self {
            is_summary: true,
            summarized_count: Some(count),
            ..Self::new(Role::System, content)
        }
    }

    /// Create an assistant artifact.
    #[must_use]
    pub fn artifact(content: impl Into<String>) -> Self {
        Self {
            is_artifact: true,
            ..Self::new(Role::Assistant, content)
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub const fn is_summary(&self) -> bool {
        self.is_summary
    }

    #[must_use]
    pub const fn is_artifact(&self) -> bool {
        self.is_artifact
    }

    /// Whether the user may delete this message.
    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        self.is_summary || self.is_artifact
    }

    /// How many original messages this entry accounts for.
    ///
    /// Summaries written before counts were recorded count as one.
    #[must_use]
    pub fn covered_count(&self) -> usize {
        if self.is_summary {
            self.summarized_count.unwrap_or(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert!(a.id().starts_with("msg_"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn only_summaries_and_artifacts_are_deletable() {
        assert!(!Message::user("hi").is_deletable());
        assert!(!Message::assistant("hi").is_deletable());
        assert!(!Message::system("Error: boom").is_deletable());
        assert!(Message::summary("s", 3).is_deletable());
        assert!(Message::artifact("a").is_deletable());
    }

    #[test]
    fn summary_is_system_role_with_count() {
        let summary = Message::summary("digest", 7);
        assert_eq!(summary.role(), Role::System);
        assert_eq!(summary.covered_count(), 7);
        assert_eq!(Message::assistant("x").covered_count(), 1);
    }

    #[test]
    fn loads_legacy_entries_without_id() {
        let json = r#"{"role":"assistant","content":"Welcome!","timestamp":"2024-05-01T10:00:00.000Z"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.role(), Role::Assistant);
        assert!(message.id().starts_with("msg_"));
        assert!(!message.is_summary());
    }

    #[test]
    fn legacy_summary_flag_without_count_covers_one() {
        let json = r#"{"role":"system","content":"old","isSummary":true}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.covered_count(), 1);
    }

    #[test]
    fn serializes_camel_case_flags() {
        let json = serde_json::to_string(&Message::artifact("arc")).unwrap();
        assert!(json.contains(r#""isArtifact":true"#));
        assert!(json.contains(r#""isSummary":false"#));
        assert!(!json.contains("summarizedCount"));
    }
}
