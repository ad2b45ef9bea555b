//! Per-community configuration records.
//!
//! Every struct here deserializes with `#[serde(default)]` so that records
//! written by older versions (or by hand) are merged field by field with the
//! current defaults. Unknown keys are kept in `extra` and written back
//! untouched. Stored records go through [`CommunityConfig::from_stored`],
//! which also maps legacy key names.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// Default number of messages inside the window that counts as spam.
pub const DEFAULT_SPAM_MAX: u32 = 6;

/// Default spam window (8 seconds).
pub const DEFAULT_SPAM_WINDOW_MS: u64 = 8_000;

/// How many warnings `listWarnings` shows.
pub const WARNINGS_DISPLAY_LIMIT: usize = 15;

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Legacy record keys and the keys that replaced them.
const LEGACY_CONFIG_KEYS: [(&str, &str); 2] = [("commandPrefix", "prefix"), ("autoMod", "automod")];
const LEGACY_POLICY_KEYS: [(&str, &str); 1] = [("badWords", "bannedWords")];

/// Move legacy keys to their current name. When both are present the
/// current value wins, except that two lists are joined.
fn resolve_legacy_keys(map: &mut Map<String, Value>, keys: &[(&str, &str)]) {
    for (legacy, current) in keys {
        let Some(old) = map.remove(*legacy) else {
            continue;
        };
        match map.get_mut(*current) {
            None | Some(Value::Null) => {
                map.insert(current.to_string(), old);
            }
            Some(Value::Array(list)) => {
                if let Value::Array(old) = old {
                    list.extend(old);
                }
            }
            Some(_) => {}
        }
    }
}

// ── AutoMod Policy ───────────────────────────────────────────────────────────

/// Automated per-message policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoModPolicy {
    pub enabled: bool,
    pub anti_invite: bool,
    pub anti_link: bool,
    /// Messages inside the window at which a sender is flagged.
    pub spam_max: u32,
    pub spam_window_ms: u64,
    /// Lower-cased, de-duplicated. Matched as case-insensitive substrings.
    #[serde(deserialize_with = "null_as_default")]
    pub banned_words: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AutoModPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            anti_invite: true,
            anti_link: false,
            spam_max: DEFAULT_SPAM_MAX,
            spam_window_ms: DEFAULT_SPAM_WINDOW_MS,
            banned_words: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl AutoModPolicy {
    /// Restore invariants after loading: positive thresholds, lower-cased
    /// and de-duplicated word list.
    pub fn normalize(&mut self) {
        if self.spam_max == 0 {
            self.spam_max = DEFAULT_SPAM_MAX;
        }
        if self.spam_window_ms == 0 {
            self.spam_window_ms = DEFAULT_SPAM_WINDOW_MS;
        }
        let mut seen = Vec::with_capacity(self.banned_words.len());
        for word in self.banned_words.drain(..) {
            let word = word.trim().to_lowercase();
            if !word.is_empty() && !seen.contains(&word) {
                seen.push(word);
            }
        }
        self.banned_words = seen;
    }

    /// Add a banned word. Returns false if it was already present.
    pub fn add_banned_word(&mut self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        if word.is_empty() || self.banned_words.contains(&word) {
            return false;
        }
        self.banned_words.push(word);
        true
    }

    /// Remove a banned word. Returns false if it was not present.
    pub fn remove_banned_word(&mut self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        let before = self.banned_words.len();
        self.banned_words.retain(|w| *w != word);
        before != self.banned_words.len()
    }
}

// ── Warnings ─────────────────────────────────────────────────────────────────

/// A single warning issued to a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningRecord {
    pub reason: String,
    pub issuer_id: String,
    /// Unix millis.
    pub timestamp: i64,
}

// ── Community Config ─────────────────────────────────────────────────────────

/// Configuration of one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommunityConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub prefix: String,
    pub staff_role_id: Option<String>,
    pub muted_role_id: Option<String>,
    pub mod_log_channel_id: Option<String>,
    pub welcome_channel_id: Option<String>,
    pub leave_channel_id: Option<String>,
    pub suggestion_channel_id: Option<String>,
    pub ticket_category_id: Option<String>,
    pub autorole_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub automod: AutoModPolicy,
    /// Member ID → warnings in insertion order.
    #[serde(deserialize_with = "null_as_default")]
    pub warnings: BTreeMap<String, Vec<WarningRecord>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            staff_role_id: None,
            muted_role_id: None,
            mod_log_channel_id: None,
            welcome_channel_id: None,
            leave_channel_id: None,
            suggestion_channel_id: None,
            ticket_category_id: None,
            autorole_id: None,
            automod: AutoModPolicy::default(),
            warnings: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl CommunityConfig {
    /// Decode a persisted record: legacy keys are mapped, missing fields
    /// take their defaults, and invariants are restored.
    pub fn from_stored(mut value: Value) -> serde_json::Result<Self> {
        if let Value::Object(map) = &mut value {
            resolve_legacy_keys(map, &LEGACY_CONFIG_KEYS);
            if let Some(Value::Object(policy)) = map.get_mut("automod") {
                resolve_legacy_keys(policy, &LEGACY_POLICY_KEYS);
            }
        }
        let mut config: Self = serde_json::from_value(value)?;
        config.normalize();
        Ok(config)
    }

    /// Restore invariants after loading.
    pub fn normalize(&mut self) {
        if self.prefix.trim().is_empty() {
            self.prefix = DEFAULT_PREFIX.to_string();
        }
        for slot in [
            &mut self.staff_role_id,
            &mut self.muted_role_id,
            &mut self.mod_log_channel_id,
            &mut self.welcome_channel_id,
            &mut self.leave_channel_id,
            &mut self.suggestion_channel_id,
            &mut self.ticket_category_id,
            &mut self.autorole_id,
        ] {
            if slot.as_deref().map_or(false, |s| s.trim().is_empty()) {
                *slot = None;
            }
        }
        self.warnings.retain(|_, records| !records.is_empty());
        self.automod.normalize();
    }

    /// All warnings of a member, oldest first.
    pub fn warnings_for(&self, member_id: &str) -> &[WarningRecord] {
        self.warnings
            .get(member_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The most recent [`WARNINGS_DISPLAY_LIMIT`] warnings, still in
    /// chronological order, numbered from 1.
    pub fn recent_warnings(&self, member_id: &str) -> Vec<(usize, WarningRecord)> {
        let all = self.warnings_for(member_id);
        let skip = all.len().saturating_sub(WARNINGS_DISPLAY_LIMIT);
        all[skip..]
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, record)| (i + 1, record))
            .collect()
    }

    /// Read one of the optional channel/role slots.
    pub fn slot(&self, slot: ConfigSlot) -> Option<&str> {
        match slot {
            ConfigSlot::ModLogChannel => self.mod_log_channel_id.as_deref(),
            ConfigSlot::WelcomeChannel => self.welcome_channel_id.as_deref(),
            ConfigSlot::LeaveChannel => self.leave_channel_id.as_deref(),
            ConfigSlot::SuggestionChannel => self.suggestion_channel_id.as_deref(),
            ConfigSlot::TicketCategory => self.ticket_category_id.as_deref(),
            ConfigSlot::StaffRole => self.staff_role_id.as_deref(),
            ConfigSlot::AutoRole => self.autorole_id.as_deref(),
            ConfigSlot::MutedRole => self.muted_role_id.as_deref(),
        }
    }

    /// Set or clear one of the optional channel/role slots. Blank IDs clear.
    pub fn set_slot(&mut self, slot: ConfigSlot, value: Option<String>) {
        let value = value.filter(|v| !v.trim().is_empty());
        let target = match slot {
            ConfigSlot::ModLogChannel => &mut self.mod_log_channel_id,
            ConfigSlot::WelcomeChannel => &mut self.welcome_channel_id,
            ConfigSlot::LeaveChannel => &mut self.leave_channel_id,
            ConfigSlot::SuggestionChannel => &mut self.suggestion_channel_id,
            ConfigSlot::TicketCategory => &mut self.ticket_category_id,
            ConfigSlot::StaffRole => &mut self.staff_role_id,
            ConfigSlot::AutoRole => &mut self.autorole_id,
            ConfigSlot::MutedRole => &mut self.muted_role_id,
        };
        *target = value;
    }
}

/// The optional channel/role references of a [`CommunityConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSlot {
    ModLogChannel,
    WelcomeChannel,
    LeaveChannel,
    SuggestionChannel,
    TicketCategory,
    StaffRole,
    AutoRole,
    MutedRole,
}

impl ConfigSlot {
    /// Human-readable label used in confirmations.
    pub fn label(&self) -> &'static str {
        match self {
            ConfigSlot::ModLogChannel => "Mod log channel",
            ConfigSlot::WelcomeChannel => "Welcome channel",
            ConfigSlot::LeaveChannel => "Leave channel",
            ConfigSlot::SuggestionChannel => "Suggestion channel",
            ConfigSlot::TicketCategory => "Ticket category",
            ConfigSlot::StaffRole => "Staff role",
            ConfigSlot::AutoRole => "Auto role",
            ConfigSlot::MutedRole => "Muted role",
        }
    }

    /// Whether the slot references a role (as opposed to a channel).
    pub fn is_role(&self) -> bool {
        matches!(
            self,
            ConfigSlot::StaffRole | ConfigSlot::AutoRole | ConfigSlot::MutedRole
        )
    }
}
