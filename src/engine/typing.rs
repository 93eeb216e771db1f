//! Typing indicator state machine
//!
//! Per-conversation ephemeral typing state with timeout-based expiry. Input
//! activity arms (or extends) a single countdown per conversation; silence
//! past the timeout transitions back to not-typing. Purely local state, no
//! network propagation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Silence window after which a typing burst ends.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline map driving the typing indicator for the local user.
///
/// The owner is expected to `sleep_until(next_deadline())` and call
/// [`TypingTracker::expire`] when it fires; expired conversation ids are
/// then cleared from the conversation's typing set.
pub struct TypingTracker {
    timeout: Duration,
    deadlines: HashMap<String, Instant>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::with_timeout(TYPING_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            deadlines: HashMap::new(),
        }
    }

    /// Record input activity in a conversation at `now`.
    ///
    /// Extends the conversation's countdown if one is already armed (at most
    /// one countdown per conversation is ever outstanding). Returns true on
    /// the not-typing -> typing transition.
    pub fn note_input(&mut self, conversation_id: &str, now: Instant) -> bool {
        self.deadlines
            .insert(conversation_id.to_string(), now + self.timeout)
            .is_none()
    }

    /// Earliest outstanding deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every conversation whose countdown has elapsed.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }

    /// Whether a countdown is outstanding for the conversation.
    #[cfg(test)]
    pub fn is_typing(&self, conversation_id: &str) -> bool {
        self.deadlines.contains_key(conversation_id)
    }

    /// Cancel all outstanding countdowns (session teardown).
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_input_then_silence_expires() {
        let mut tracker = TypingTracker::new();
        let t0 = Instant::now();

        assert!(tracker.note_input("a", t0));
        assert!(tracker.is_typing("a"));
        assert_eq!(tracker.next_deadline(), Some(t0 + Duration::from_secs(3)));

        assert!(tracker.expire(t0 + Duration::from_secs(2)).is_empty());
        assert_eq!(tracker.expire(t0 + Duration::from_secs(3)), vec!["a"]);
        assert!(!tracker.is_typing("a"));
    }

    #[tokio::test]
    async fn test_repeat_input_extends_instead_of_stacking() {
        let mut tracker = TypingTracker::new();
        let t0 = Instant::now();

        assert!(tracker.note_input("a", t0));
        // Second burst at 2s is not a new transition and moves the deadline.
        assert!(!tracker.note_input("a", t0 + Duration::from_secs(2)));
        assert_eq!(tracker.next_deadline(), Some(t0 + Duration::from_secs(5)));

        // Still typing at the first deadline; expired 3s after the second.
        assert!(tracker.expire(t0 + Duration::from_secs(3)).is_empty());
        assert!(tracker.is_typing("a"));
        assert_eq!(tracker.expire(t0 + Duration::from_secs(5)), vec!["a"]);
    }

    #[tokio::test]
    async fn test_independent_conversations() {
        let mut tracker = TypingTracker::new();
        let t0 = Instant::now();

        tracker.note_input("a", t0);
        tracker.note_input("b", t0 + Duration::from_secs(1));

        assert_eq!(tracker.next_deadline(), Some(t0 + Duration::from_secs(3)));
        assert_eq!(tracker.expire(t0 + Duration::from_secs(3)), vec!["a"]);
        assert!(tracker.is_typing("b"));
        assert_eq!(tracker.expire(t0 + Duration::from_secs(4)), vec!["b"]);
    }

    #[tokio::test]
    async fn test_clear_cancels_all_countdowns() {
        let mut tracker = TypingTracker::new();
        let t0 = Instant::now();

        tracker.note_input("a", t0);
        tracker.note_input("b", t0);
        tracker.clear();

        assert!(tracker.next_deadline().is_none());
        assert!(tracker.expire(t0 + Duration::from_secs(10)).is_empty());
    }
}
