//! Context window policy.
//!
//! Decides when the context history must be compressed and which prefix gets
//! folded into a summary. Pure functions over slices; no I/O, no state.

use crate::message::Message;

/// Smallest usable window. With a limit of one, a pass would replace one
/// message with one summary and never shrink the context.
pub const MIN_WINDOW_LIMIT: usize = 2;

/// Whether the context has outgrown the window.
#[must_use]
pub const fn should_compress(context: &[Message], window_limit: usize) -> bool {
    context.len() > window_limit
}

/// Split the context into the oldest `window_limit` entries (to summarize)
/// and everything after them (kept verbatim).
#[must_use]
pub fn select_compression_segment(
    context: &[Message],
    window_limit: usize,
) -> (&[Message], &[Message]) {
    context.split_at(window_limit.min(context.len()))
}

/// Window configuration for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    limit: Option<usize>,
}

impl WindowPolicy {
    /// Compress whenever the context exceeds `limit` entries.
    ///
    /// Limits below [`MIN_WINDOW_LIMIT`] are raised to it.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(MIN_WINDOW_LIMIT)),
        }
    }

    /// Never compress; the context grows with the display history.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { limit: None }
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.limit.is_some()
    }

    /// The segment to summarize next, or `None` when the context fits.
    #[must_use]
    pub fn segment<'a>(&self, context: &'a [Message]) -> Option<(&'a [Message], &'a [Message])> {
        let limit = self.limit?;
        should_compress(context, limit).then(|| select_compression_segment(context, limit))
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("turn {i}"))).collect()
    }

    #[test]
    fn triggers_only_above_limit() {
        assert!(!should_compress(&turns(9), 10));
        assert!(!should_compress(&turns(10), 10));
        assert!(should_compress(&turns(11), 10));
    }

    #[test]
    fn segment_keeps_newest_turns() {
        let context = turns(13);
        let (prefix, rest) = select_compression_segment(&context, 10);
        assert_eq!(prefix.len(), 10);
        assert_eq!(rest.len(), 3);
        assert_eq!(prefix[0].content(), "turn 0");
        assert_eq!(rest[2].content(), "turn 12");
    }

    #[test]
    fn segment_is_none_within_window() {
        let policy = WindowPolicy::new(10);
        assert!(policy.segment(&turns(10)).is_none());
        assert!(policy.segment(&[]).is_none());
    }

    #[test]
    fn disabled_policy_never_compresses() {
        let policy = WindowPolicy::disabled();
        assert!(policy.segment(&turns(500)).is_none());
        assert!(!policy.is_enabled());
    }

    #[test]
    fn tiny_limits_are_raised() {
        assert_eq!(WindowPolicy::new(0).limit(), Some(MIN_WINDOW_LIMIT));
        assert_eq!(WindowPolicy::new(1).limit(), Some(MIN_WINDOW_LIMIT));
        assert_eq!(WindowPolicy::new(5).limit(), Some(5));
    }
}
