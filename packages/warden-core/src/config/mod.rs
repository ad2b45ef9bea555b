//! Per-community configuration: the record types and the file-backed store.

pub mod store;
pub mod types;

pub use store::ConfigStore;
pub use types::{
    AutoModPolicy, CommunityConfig, ConfigSlot, WarningRecord, DEFAULT_PREFIX, DEFAULT_SPAM_MAX,
    DEFAULT_SPAM_WINDOW_MS, WARNINGS_DISPLAY_LIMIT,
};
