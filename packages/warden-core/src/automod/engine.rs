//! Per-message policy evaluation.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::rate_window::RateWindow;
use crate::config::AutoModPolicy;
use crate::events::ChatMessage;

// Unwrap as both patterns are fixed and covered by tests
static INVITE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:discord\.gg|discord(?:app)?\.com/invite)/[a-z0-9-]+").unwrap()
});

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://\S+").unwrap());

/// Why a message was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Invite,
    Link,
    BannedWord(String),
    /// Messages counted inside the window.
    Spam(usize),
}

impl Violation {
    /// Reason text used in notices and mod-log entries.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Invite => write!(f, "invite link"),
            Violation::Link => write!(f, "link"),
            Violation::BannedWord(word) => write!(f, "banned word: {}", word),
            Violation::Spam(count) => write!(f, "spam: {} messages", count),
        }
    }
}

/// Evaluates messages against a community's [`AutoModPolicy`].
#[derive(Clone, Default)]
pub struct AutoModEngine {
    window: RateWindow,
}

impl AutoModEngine {
    pub fn new(window: RateWindow) -> Self {
        Self { window }
    }

    pub fn rate_window(&self) -> &RateWindow {
        &self.window
    }

    /// First matching violation in priority order, or `None`.
    ///
    /// Exempt senders and disabled policies return early and leave the
    /// rate window untouched. Content checks run before the rate window is
    /// touched, so a flagged message does not count towards spam.
    pub fn evaluate(
        &self,
        message: &ChatMessage,
        policy: &AutoModPolicy,
        is_exempt: bool,
        now: i64,
    ) -> Option<Violation> {
        if is_exempt || !policy.enabled {
            return None;
        }

        let content = message.content.as_str();
        if policy.anti_invite && INVITE_PATTERN.is_match(content) {
            return Some(Violation::Invite);
        }
        if policy.anti_link && LINK_PATTERN.is_match(content) {
            return Some(Violation::Link);
        }

        let lowered = content.to_lowercase();
        if let Some(word) = policy
            .banned_words
            .iter()
            .find(|w| !w.is_empty() && lowered.contains(&w.to_lowercase()))
        {
            return Some(Violation::BannedWord(word.clone()));
        }

        let count = self.window.record(
            &message.community_id,
            &message.author.id,
            now,
            policy.spam_window_ms,
        );
        if count >= policy.spam_max as usize {
            return Some(Violation::Spam(count));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Member;

    fn message(author: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: "m1".into(),
            community_id: "g1".into(),
            channel_id: "c1".into(),
            author: Member {
                id: author.into(),
                display_name: author.into(),
                role_ids: vec![],
                is_administrator: false,
                is_bot: false,
                joined_at: None,
                created_at: None,
            },
            content: content.into(),
            timestamp: None,
        }
    }

    #[test]
    fn test_invite_detected_case_insensitive() {
        let engine = AutoModEngine::default();
        let policy = AutoModPolicy::default();
        for text in [
            "join discord.gg/abc123",
            "DISCORD.GG/Xyz",
            "https://discord.com/invite/hello",
            "discordapp.com/invite/old-style",
        ] {
            assert_eq!(
                engine.evaluate(&message("u1", text), &policy, false, 0),
                Some(Violation::Invite),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_invite_outranks_link() {
        let engine = AutoModEngine::default();
        let mut policy = AutoModPolicy::default();
        policy.anti_link = true;
        let v = engine.evaluate(&message("u1", "https://discord.gg/abc"), &policy, false, 0);
        assert_eq!(v.unwrap().reason(), "invite link");
    }

    #[test]
    fn test_link_only_when_enabled() {
        let engine = AutoModEngine::default();
        let mut policy = AutoModPolicy::default();
        let msg = message("u1", "see https://example.com/page");
        assert_eq!(engine.evaluate(&msg, &policy, false, 0), None);

        policy.anti_link = true;
        assert_eq!(engine.evaluate(&msg, &policy, false, 1), Some(Violation::Link));
    }

    #[test]
    fn test_banned_word_substring() {
        let engine = AutoModEngine::default();
        let mut policy = AutoModPolicy::default();
        policy.add_banned_word("scam");
        let v = engine.evaluate(&message("u1", "Total SCAMMER here"), &policy, false, 0);
        assert_eq!(v.unwrap().reason(), "banned word: scam");
    }

    #[test]
    fn test_spam_boundary_at_spam_max() {
        let engine = AutoModEngine::default();
        let mut policy = AutoModPolicy::default();
        policy.spam_max = 3;
        policy.spam_window_ms = 8_000;

        assert_eq!(engine.evaluate(&message("u1", "a"), &policy, false, 1_000), None);
        assert_eq!(engine.evaluate(&message("u1", "b"), &policy, false, 2_000), None);
        let third = engine.evaluate(&message("u1", "c"), &policy, false, 3_000);
        assert_eq!(third.unwrap().reason(), "spam: 3 messages");
    }

    #[test]
    fn test_disabled_policy_does_not_touch_window() {
        let engine = AutoModEngine::default();
        let mut policy = AutoModPolicy::default();
        policy.enabled = false;
        for i in 0..10 {
            assert_eq!(engine.evaluate(&message("u1", "discord.gg/x"), &policy, false, i), None);
        }
        assert_eq!(engine.rate_window().count("g1", "u1"), 0);
    }

    #[test]
    fn test_exempt_sender_does_not_touch_window() {
        let engine = AutoModEngine::default();
        let policy = AutoModPolicy::default();
        for i in 0..10 {
            assert_eq!(engine.evaluate(&message("staff", "hi"), &policy, true, i), None);
        }
        assert_eq!(engine.rate_window().tracked_keys(), 0);
    }
}
