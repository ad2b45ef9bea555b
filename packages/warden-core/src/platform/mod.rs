//! # Platform
//!
//! The outbound command surface of the chat platform.
//!
//! Warden never talks to a gateway or REST API directly. Everything it
//! can *do* goes through the [`Platform`] trait, so the policy engine can
//! run against the real Discord REST binding in `warden-bot` or against the
//! in-memory double in [`memory`] during tests.
//!
//! ```text
//! ┌──────────────┐      Platform (async)       ┌──────────────────────────┐
//! │ EventRouter  │ ──────────────────────────► │ send / delete / roles /  │
//! │ Moderation   │                             │ channels / kick / ban /  │
//! │ Tickets      │ ◄────────────────────────── │ timeout / fetch / reply  │
//! └──────────────┘     PlatformResult<T>       └──────────────────────────┘
//! ```

#[cfg(any(test, feature = "testing"))]
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a platform call.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Failure reported by the platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The referenced member, channel or message does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The platform refused the command (missing privilege, hierarchy, ...).
    #[error("{0}")]
    Rejected(String),

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(String),
}

// ── Members & Communities ────────────────────────────────────────────────────

/// A resolved community member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    /// Holds the administrator capability in this community.
    #[serde(default)]
    pub is_administrator: bool,
    #[serde(default)]
    pub is_bot: bool,
    /// Unix millis.
    #[serde(default)]
    pub joined_at: Option<i64>,
    /// Account creation, Unix millis.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Member {
    /// Whether the member currently holds `role_id`.
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|r| r == role_id)
    }
}

/// Summary of a community as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityInfo {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub member_count: u64,
    pub created_at: Option<i64>,
}

// ── Channels & Messages ──────────────────────────────────────────────────────

/// A channel reference returned by lookups and creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
}

/// A message fetched from channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    /// Unix millis.
    pub timestamp: i64,
}

/// Channel-level permissions Warden manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPermission {
    ViewChannel,
    SendMessages,
    ReadMessageHistory,
    AttachFiles,
}

impl ChannelPermission {
    /// Discord permission bit for this flag.
    pub fn bits(&self) -> u64 {
        match self {
            ChannelPermission::ViewChannel => 1 << 10,
            ChannelPermission::SendMessages => 1 << 11,
            ChannelPermission::AttachFiles => 1 << 15,
            ChannelPermission::ReadMessageHistory => 1 << 16,
        }
    }

    /// OR together a set of permissions.
    pub fn combine(perms: &[ChannelPermission]) -> u64 {
        perms.iter().fold(0, |acc, p| acc | p.bits())
    }
}

/// Tri-state value of one permission in a channel overwrite.
///
/// `Inherit` removes the explicit entry; it is not the same as `Allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Allow,
    Deny,
    Inherit,
}

/// Who a channel permission overwrite applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OverwriteSubject {
    Role(String),
    Member(String),
}

impl OverwriteSubject {
    /// The default (`@everyone`) role, whose ID equals the community ID.
    pub fn everyone(community_id: &str) -> Self {
        OverwriteSubject::Role(community_id.to_string())
    }

    pub fn id(&self) -> &str {
        match self {
            OverwriteSubject::Role(id) | OverwriteSubject::Member(id) => id,
        }
    }
}

/// A full overwrite entry used when creating a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub subject: OverwriteSubject,
    pub allow: Vec<ChannelPermission>,
    pub deny: Vec<ChannelPermission>,
}

/// Parameters for creating a text channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub parent_id: Option<String>,
    pub topic: Option<String>,
    pub overwrites: Vec<PermissionOverwrite>,
}

// ── Outbound Content ─────────────────────────────────────────────────────────

/// A field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    /// Unix millis.
    pub timestamp: Option<i64>,
}

impl Embed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    pub fn timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }
}

/// Button colour/style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Danger,
}

/// One option of a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// Interactive message component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Button {
        custom_id: String,
        label: String,
        style: ButtonStyle,
    },
    SelectMenu {
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
        min_values: u8,
        max_values: u8,
    },
}

/// A message to be posted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub components: Vec<Component>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Content and embed text joined, for logs and assertions.
    pub fn plain_text(&self) -> String {
        let mut parts: Vec<String> = self.content.iter().cloned().collect();
        for embed in &self.embeds {
            parts.extend(embed.title.iter().cloned());
            parts.extend(embed.description.iter().cloned());
            for field in &embed.fields {
                parts.push(format!("{}: {}", field.name, field.value));
            }
        }
        parts.join("\n")
    }
}

/// Handle for answering an interaction (slash command, button, menu).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
}

/// The single terminal answer to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub message: OutboundMessage,
    /// Only visible to the invoker.
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(message: OutboundMessage) -> Self {
        Self {
            message,
            ephemeral: false,
        }
    }

    pub fn ephemeral(message: OutboundMessage) -> Self {
        Self {
            message,
            ephemeral: true,
        }
    }
}

// ── The Trait ────────────────────────────────────────────────────────────────

/// Outbound commands Warden can issue against the chat platform.
///
/// Every method is a suspension point. No method retries.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own user ID.
    fn bot_user_id(&self) -> String;

    /// Last measured gateway/API round-trip, if known.
    fn latency_ms(&self) -> Option<u64> {
        None
    }

    /// Post a message; returns the new message ID.
    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> PlatformResult<String>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<()>;

    /// Delete up to `count` recent messages; returns how many were deleted.
    async fn bulk_delete_messages(&self, channel_id: &str, count: u8) -> PlatformResult<usize>;

    /// Fetch up to `limit` messages, oldest first. With `before`, only
    /// messages older than that message ID are returned.
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> PlatformResult<Vec<ChannelMessage>>;

    async fn add_role(&self, community_id: &str, member_id: &str, role_id: &str) -> PlatformResult<()>;

    async fn remove_role(&self, community_id: &str, member_id: &str, role_id: &str)
        -> PlatformResult<()>;

    async fn create_channel(&self, community_id: &str, spec: ChannelSpec) -> PlatformResult<ChannelRef>;

    async fn delete_channel(&self, channel_id: &str) -> PlatformResult<()>;

    /// Look up a channel in a community by exact name.
    async fn find_channel(&self, community_id: &str, name: &str) -> PlatformResult<Option<ChannelRef>>;

    async fn channel_exists(&self, channel_id: &str) -> PlatformResult<bool>;

    async fn set_permission_overwrite(
        &self,
        channel_id: &str,
        subject: &OverwriteSubject,
        permission: ChannelPermission,
        state: PermissionState,
    ) -> PlatformResult<()>;

    async fn set_slowmode(&self, channel_id: &str, seconds: u32) -> PlatformResult<()>;

    async fn kick_member(&self, community_id: &str, member_id: &str, reason: &str) -> PlatformResult<()>;

    async fn ban_member(
        &self,
        community_id: &str,
        user_id: &str,
        purge_days: u8,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn unban_member(&self, community_id: &str, user_id: &str, reason: &str) -> PlatformResult<()>;

    /// Apply (`Some(ms)`) or clear (`None`) a communication timeout.
    async fn set_timeout(
        &self,
        community_id: &str,
        member_id: &str,
        duration_ms: Option<i64>,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn fetch_member(&self, community_id: &str, user_id: &str) -> PlatformResult<Option<Member>>;

    async fn fetch_community(&self, community_id: &str) -> PlatformResult<CommunityInfo>;

    /// Answer an interaction. Called exactly once per slash command.
    async fn reply(&self, interaction: &InteractionRef, reply: Reply) -> PlatformResult<()>;
}
