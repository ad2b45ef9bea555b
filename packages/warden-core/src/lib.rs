//! # Warden Core
//!
//! Moderation policy engine for a community chat bot: per-community
//! configuration, automated message moderation, staff commands, support
//! tickets and self-service role panels.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WARDEN CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   InboundEvent ──► ┌────────────────────────────────────────────────┐   │
//! │                    │                 EventRouter                    │   │
//! │                    │   per-community lanes, one reply per command   │   │
//! │                    └───┬──────────┬───────────┬───────────┬─────────┘   │
//! │                        │          │           │           │             │
//! │                        ▼          ▼           ▼           ▼             │
//! │                  ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌───────────┐     │
//! │                  │ AutoMod │ │Moderation│ │ Tickets │ │ RolePanel │     │
//! │                  │         │ │          │ │         │ │           │     │
//! │                  │ - rules │ │ - warn   │ │ - open  │ │ - build   │     │
//! │                  │ - rate  │ │ - kick   │ │ - close │ │ - sync    │     │
//! │                  │  window │ │ - ban .. │ │ - trans.│ │           │     │
//! │                  └────┬────┘ └────┬─────┘ └────┬────┘ └─────┬─────┘     │
//! │                       │           │            │            │           │
//! │         ┌─────────────┴───────────┴────────────┴────────────┘           │
//! │         ▼                                       ▼                       │
//! │  ┌──────────────┐                     ┌──────────────────┐              │
//! │  │ ConfigStore  │                     │ Platform (trait) │              │
//! │  │ JSON file,   │                     │ send / roles /   │              │
//! │  │ atomic save  │                     │ channels / bans  │              │
//! │  └──────────────┘                     └──────────────────┘              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type shared by every workflow
//! - [`config`] - Per-community configuration and its persistent store
//! - [`platform`] - Outbound command surface of the chat platform
//! - [`events`] - Inbound event payloads and component custom IDs
//! - [`commands`] - Slash command parsing
//! - [`automod`] - Content rules and the spam rate window
//! - [`moderation`] - Staff moderation actions
//! - [`tickets`] - Private support ticket channels
//! - [`role_panel`] - Self-assignable role menus
//! - [`router`] - Event dispatch

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod automod;
pub mod commands;
pub mod config;
pub mod duration;
pub mod error;
pub mod events;
pub mod moderation;
pub mod platform;
pub mod role_panel;
pub mod router;
pub mod staff;
pub mod tasks;
pub mod tickets;
/// Wall-clock helpers.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use automod::{AutoModEngine, RateWindow, Violation};
pub use commands::Command;
pub use config::{AutoModPolicy, CommunityConfig, ConfigSlot, ConfigStore, WarningRecord};
pub use error::{Error, Result};
pub use events::{CustomId, InboundEvent};
pub use platform::{Platform, PlatformError, PlatformResult};
pub use router::{EventRouter, RouterSettings};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Warden Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
