//! # AutoMod
//!
//! Content and rate checks applied to every posted message.
//!
//! ```text
//! message ──► exempt / disabled? ──► invite ──► link ──► banned word ──► spam
//!                  │ yes               │          │           │            │
//!                  ▼                   ▼          ▼           ▼            ▼
//!                 none              Violation (first match wins)     RateWindow
//! ```
//!
//! The engine only decides. Deleting the message, posting the short-lived
//! notice and writing the mod-log entry happen in [`crate::router`].

pub mod engine;
pub mod rate_window;

use std::time::Duration;

pub use engine::{AutoModEngine, Violation};
pub use rate_window::RateWindow;

/// How long the public AutoMod notice stays up.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);
