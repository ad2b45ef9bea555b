//! # AutoMod Demo
//!
//! Runs a handful of messages through the AutoMod engine with a policy
//! that filters invites, links and one banned word, and a tight spam
//! window.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example automod_demo
//! ```

use warden_core::events::ChatMessage;
use warden_core::platform::Member;
use warden_core::{AutoModEngine, AutoModPolicy};

fn message(author: &str, content: &str, ts: i64) -> ChatMessage {
    ChatMessage {
        id: format!("m{}", ts),
        community_id: "demo".to_string(),
        channel_id: "general".to_string(),
        author: Member {
            id: author.to_string(),
            display_name: author.to_string(),
            role_ids: vec![],
            is_administrator: false,
            is_bot: false,
            joined_at: None,
            created_at: None,
        },
        content: content.to_string(),
        timestamp: Some(ts),
    }
}

fn main() {
    println!("=== Warden Core: AutoMod Demo ===\n");

    let mut policy = AutoModPolicy {
        anti_link: true,
        spam_max: 3,
        spam_window_ms: 5_000,
        ..Default::default()
    };
    policy.add_banned_word("Scam");

    println!("Policy:");
    println!("  anti_invite = {}", policy.anti_invite);
    println!("  anti_link   = {}", policy.anti_link);
    println!("  banned      = {:?}", policy.banned_words);
    println!(
        "  spam        = {} messages / {}ms",
        policy.spam_max, policy.spam_window_ms
    );
    println!();

    let engine = AutoModEngine::default();
    let samples = [
        ("alice", "hello everyone", 0),
        ("bob", "free nitro at discord.gg/free", 100),
        ("bob", "see https://example.com", 200),
        ("carol", "this is NOT a scam, promise", 300),
        ("dave", "one", 1_000),
        ("dave", "two", 2_000),
        ("dave", "three", 3_000),
        ("dave", "four", 9_000),
    ];

    for (author, content, ts) in samples {
        let verdict = engine.evaluate(&message(author, content, ts), &policy, false, ts);
        let outcome = match verdict {
            Some(v) => format!("REMOVED ({})", v),
            None => "ok".to_string(),
        };
        println!("  [{:>5}ms] {:<6} {:<34} {}", ts, author, content, outcome);
    }

    println!();
    println!(
        "Tracked senders in the rate window: {}",
        engine.rate_window().tracked_keys()
    );
}
