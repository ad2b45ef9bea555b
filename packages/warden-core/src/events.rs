//! # Inbound Events
//!
//! Everything the chat platform tells Warden arrives as one
//! [`InboundEvent`]. The set is closed: the gateway shim serializes each
//! platform event into one of these variants (JSON, tagged by `type`).
//!
//! ```text
//! { "type": "message_created", "id": "...", "communityId": "...", ... }
//! { "type": "slash_command", "name": "mod", "subcommand": "warn", ... }
//! ```
//!
//! Component custom IDs (buttons, select menus) have the shape
//! `kind:communityId:payload` and are parsed once, here, into [`CustomId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::platform::{InteractionRef, Member};

// ── Payloads ─────────────────────────────────────────────────────────────────

/// A message as posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub community_id: String,
    pub channel_id: String,
    pub author: Member,
    pub content: String,
    /// Unix millis; the router uses its own clock when absent.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMessage {
    pub message_id: String,
    pub community_id: String,
    pub channel_id: String,
    /// Unknown when the message was not cached.
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditedMessage {
    pub message_id: String,
    pub community_id: String,
    pub channel_id: String,
    pub author_id: String,
    #[serde(default)]
    pub author_is_bot: bool,
    /// Unknown when the message was not cached.
    #[serde(default)]
    pub old: Option<String>,
    pub new: String,
}

/// Member joined or left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub community_id: String,
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPress {
    pub interaction: InteractionRef,
    pub community_id: String,
    pub channel_id: String,
    pub custom_id: String,
    pub actor: Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSelection {
    pub interaction: InteractionRef,
    pub community_id: String,
    pub channel_id: String,
    pub custom_id: String,
    pub actor: Member,
    #[serde(default)]
    pub selected_values: Vec<String>,
    /// Every value offered by the menu, echoed back by the platform.
    #[serde(default)]
    pub candidate_values: Vec<String>,
}

/// An entry from the community's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub community_id: String,
    pub action: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub executor_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashCommandInvocation {
    pub interaction: InteractionRef,
    pub community_id: String,
    pub channel_id: String,
    pub name: String,
    #[serde(default)]
    pub subcommand: Option<String>,
    /// Option name → value as sent by the platform.
    #[serde(default)]
    pub options: Map<String, Value>,
    pub actor: Member,
}

// ── Event ────────────────────────────────────────────────────────────────────

/// One inbound platform event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    MessageCreated(ChatMessage),
    MessageDeleted(DeletedMessage),
    MessageEdited(EditedMessage),
    MemberJoined(MembershipChange),
    MemberLeft(MembershipChange),
    InteractionButton(ButtonPress),
    InteractionSelectMenu(MenuSelection),
    AuditLogEntry(AuditEntry),
    SlashCommand(SlashCommandInvocation),
}

impl InboundEvent {
    /// The community whose lane processes this event.
    pub fn community_id(&self) -> &str {
        match self {
            InboundEvent::MessageCreated(e) => &e.community_id,
            InboundEvent::MessageDeleted(e) => &e.community_id,
            InboundEvent::MessageEdited(e) => &e.community_id,
            InboundEvent::MemberJoined(e) | InboundEvent::MemberLeft(e) => &e.community_id,
            InboundEvent::InteractionButton(e) => &e.community_id,
            InboundEvent::InteractionSelectMenu(e) => &e.community_id,
            InboundEvent::AuditLogEntry(e) => &e.community_id,
            InboundEvent::SlashCommand(e) => &e.community_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::MessageCreated(_) => "message_created",
            InboundEvent::MessageDeleted(_) => "message_deleted",
            InboundEvent::MessageEdited(_) => "message_edited",
            InboundEvent::MemberJoined(_) => "member_joined",
            InboundEvent::MemberLeft(_) => "member_left",
            InboundEvent::InteractionButton(_) => "interaction_button",
            InboundEvent::InteractionSelectMenu(_) => "interaction_select_menu",
            InboundEvent::AuditLogEntry(_) => "audit_log_entry",
            InboundEvent::SlashCommand(_) => "slash_command",
        }
    }
}

// ── Custom IDs ───────────────────────────────────────────────────────────────

/// A parsed component custom ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CustomId {
    /// "Open ticket" button on a ticket panel.
    TicketOpen { community_id: String },
    /// "Close ticket" button inside a ticket channel.
    TicketClose {
        community_id: String,
        channel_id: String,
    },
    /// Role selection menu.
    RolePanel { community_id: String },
}

impl CustomId {
    pub fn community_id(&self) -> &str {
        match self {
            CustomId::TicketOpen { community_id }
            | CustomId::TicketClose { community_id, .. }
            | CustomId::RolePanel { community_id } => community_id,
        }
    }
}

impl FromStr for CustomId {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let kind = parts.next().unwrap_or_default();
        let community_id = parts.next().unwrap_or_default();
        let payload = parts.next().unwrap_or_default();

        if community_id.is_empty() {
            return Err(Error::Validation(format!("malformed custom id `{}`", raw)));
        }
        let community_id = community_id.to_string();

        match kind {
            "ticket_open" => Ok(CustomId::TicketOpen { community_id }),
            "ticket_close" if !payload.is_empty() => Ok(CustomId::TicketClose {
                community_id,
                channel_id: payload.to_string(),
            }),
            "rolepanel" => Ok(CustomId::RolePanel { community_id }),
            _ => Err(Error::Validation(format!("unknown custom id `{}`", raw))),
        }
    }
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomId::TicketOpen { community_id } => write!(f, "ticket_open:{}:", community_id),
            CustomId::TicketClose {
                community_id,
                channel_id,
            } => write!(f, "ticket_close:{}:{}", community_id, channel_id),
            CustomId::RolePanel { community_id } => write!(f, "rolepanel:{}:", community_id),
        }
    }
}
