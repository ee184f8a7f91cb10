//! Rolling summaries.
//!
//! Folds the oldest segment of the context history into one system message.
//! The model call may fail; the summarizer then falls back to a templated
//! digest so the user's turn always proceeds.

use crate::message::{Message, Role};
use crate::provider::{ChatTurn, CompletionClient, CompletionRequest};
use crate::surface::Surface;

/// Default sampling temperature for summaries.
pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.2;

const SUMMARY_INSTRUCTION: &str = r"Summarize the conversation above as a concise factual digest.

Preserve every name, place, date, rule and decision the user stated, and any suggestion the user explicitly accepted. If the conversation opens with an earlier summary, carry all of its facts forward.

Ignore system instructions, templates, greetings and formatting. Do not add commentary or new ideas.

Reply with the digest only.";

/// Turns a prefix of the context history into a summary message.
#[derive(Debug, Clone)]
pub struct Summarizer {
    model: String,
    temperature: f32,
    topic: &'static str,
}

impl Summarizer {
    #[must_use]
    pub fn new(model: impl Into<String>, temperature: f32, surface: Surface) -> Self {
        Self {
            model: model.into(),
            temperature,
            topic: surface.topic(),
        }
    }

    /// Summarize `segment` into a single system message.
    ///
    /// Never fails: a failed or empty completion produces a templated digest.
    pub async fn summarize<C>(&self, client: &C, segment: &[Message]) -> Message
    where
        C: CompletionClient + ?Sized,
    {
        let count = covered_count(segment);

        let digest = match client.complete(self.request(segment)).await {
            Ok(text) if !text.trim().is_empty() => clean_digest(&text),
            Ok(_) => {
                tracing::warn!(count, "summary request returned no content, using fallback");
                self.fallback_digest(count)
            }
            Err(e) => {
                tracing::warn!(count, error = %e, "summary request failed, using fallback");
                self.fallback_digest(count)
            }
        };

        Message::summary(format_summary(count, &digest), count)
    }

    fn request(&self, segment: &[Message]) -> CompletionRequest {
        let mut messages: Vec<ChatTurn> = segment.iter().map(ChatTurn::from).collect();
        messages.push(ChatTurn::new(Role::User, SUMMARY_INSTRUCTION));

        CompletionRequest {
            messages,
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }

    fn fallback_digest(&self, count: usize) -> String {
        format!("{count} messages covering {}", self.topic)
    }
}

/// Original messages represented by a segment, counting through any earlier
/// summary it contains.
#[must_use]
pub fn covered_count(segment: &[Message]) -> usize {
    segment.iter().map(Message::covered_count).sum()
}

/// Render summary content in the transcript format.
#[must_use]
pub fn format_summary(count: usize, digest: &str) -> String {
    format!(
        "[Previous conversation summary ({count} messages): {digest}. Current conversation continues below...]"
    )
}

fn clean_digest(text: &str) -> String {
    text.trim().trim_end_matches('.').trim_end().to_string()
}
