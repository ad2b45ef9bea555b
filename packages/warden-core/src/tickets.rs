//! # Tickets
//!
//! One private support channel per member per community.
//!
//! ```text
//!   open ──► Open ──close()──► Closing ──(5 s)──► finalize ──► gone
//!                     │                              │
//!                     └─ second close: suppressed    └─ transcript → mod log
//! ```
//!
//! The registry is in-memory. A ticket channel that survived a restart is
//! re-adopted by name (`ticket-<ownerId>`) when its owner opens or closes it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::events::CustomId;
use crate::platform::{
    ButtonStyle, ChannelMessage, ChannelPermission, ChannelSpec, Component, Embed, Member,
    OutboundMessage, OverwriteSubject, PermissionOverwrite, Platform,
};
use crate::staff::is_staff;
use crate::tasks;
use crate::time::format_millis;

/// Delay between a close request and the channel being deleted.
pub const CLOSE_DELAY: Duration = Duration::from_secs(5);

/// Messages fetched per history page.
const TRANSCRIPT_PAGE: u8 = 100;

/// Most messages a transcript covers; older ones are reported as omitted.
pub const TRANSCRIPT_MAX_MESSAGES: usize = 1_000;

/// Maximum characters per transcript chunk posted to the mod log.
const TRANSCRIPT_CHUNK: usize = 1_900;

const EMBED_COLOR: u32 = 0x5865f2;

/// Permissions granted to everyone who may see a ticket.
const PARTICIPANT_PERMISSIONS: [ChannelPermission; 4] = [
    ChannelPermission::ViewChannel,
    ChannelPermission::SendMessages,
    ChannelPermission::ReadMessageHistory,
    ChannelPermission::AttachFiles,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Open,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub owner_id: String,
    pub community_id: String,
    pub channel_id: String,
    pub state: TicketState,
}

/// Result of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Moved to Closing; finalize is scheduled.
    Closing,
    /// Already Closing; nothing was scheduled.
    AlreadyClosing,
}

/// What finalize did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Transcript delivered (best-effort) and channel deleted.
    Deleted { transcript_lines: usize },
    /// The channel was already gone.
    ChannelGone,
}

/// Name of the ticket channel for `owner_id`.
pub fn channel_name(owner_id: &str) -> String {
    format!("ticket-{}", owner_id)
}

/// Render transcript lines, oldest first.
pub fn render_transcript(messages: &[ChannelMessage]) -> Vec<String> {
    let mut ordered: Vec<&ChannelMessage> = messages.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);
    ordered
        .into_iter()
        .map(|m| format!("[{}] {}: {}", format_millis(m.timestamp), m.author_name, m.content))
        .collect()
}

/// Break up backtick runs so message content cannot close the code block
/// a transcript chunk is wrapped in.
fn defuse_fences(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '`' && chars.peek() == Some(&'`') {
            out.push('\u{200b}');
        }
    }
    out
}

/// Split lines into chunks of at most `max` characters. Lines longer than
/// `max` are split across chunks.
fn chunk_lines(lines: &[String], max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in lines {
        let chars: Vec<char> = defuse_fences(line).chars().collect();
        for piece in chars.chunks(max) {
            if !current.is_empty() && current_len + 1 + piece.len() > max {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.extend(piece);
            current_len += piece.len();
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn message_count(count: usize, truncated: bool) -> String {
    if truncated {
        format!("{} (older messages omitted)", count)
    } else {
        count.to_string()
    }
}

/// Ticket lifecycle for all communities.
#[derive(Clone)]
pub struct TicketWorkflow {
    store: ConfigStore,
    platform: Arc<dyn Platform>,
    /// Channel ID → ticket.
    registry: Arc<DashMap<String, Ticket>>,
}

impl TicketWorkflow {
    pub fn new(store: ConfigStore, platform: Arc<dyn Platform>) -> Self {
        Self {
            store,
            platform,
            registry: Arc::new(DashMap::new()),
        }
    }

    /// Message with the "open ticket" button, posted by `/ticketpanel`.
    pub fn panel_message(community_id: &str) -> OutboundMessage {
        OutboundMessage::embed(
            Embed::new("🎫 Support")
                .description("Press the button below to open a private ticket with the staff team.")
                .color(EMBED_COLOR),
        )
        .with_component(Component::Button {
            custom_id: CustomId::TicketOpen {
                community_id: community_id.to_string(),
            }
            .to_string(),
            label: "Open ticket".to_string(),
            style: ButtonStyle::Primary,
        })
    }

    pub fn get(&self, channel_id: &str) -> Option<Ticket> {
        self.registry.get(channel_id).map(|t| t.clone())
    }

    pub fn find_by_owner(&self, community_id: &str, owner_id: &str) -> Option<Ticket> {
        self.registry
            .iter()
            .find(|t| t.community_id == community_id && t.owner_id == owner_id)
            .map(|t| t.clone())
    }

    /// Tickets currently tracked (Open or Closing).
    pub fn open_count(&self) -> usize {
        self.registry.len()
    }

    fn register(&self, community_id: &str, owner_id: &str, channel_id: &str) -> Ticket {
        let ticket = Ticket {
            owner_id: owner_id.to_string(),
            community_id: community_id.to_string(),
            channel_id: channel_id.to_string(),
            state: TicketState::Open,
        };
        self.registry.insert(channel_id.to_string(), ticket.clone());
        ticket
    }

    /// Open a ticket for `requester`.
    pub async fn open(&self, community_id: &str, requester: &Member) -> Result<Ticket> {
        let already = |channel_id: &str| Error::AlreadyExists {
            what: "ticket".to_string(),
            reference: channel_id.to_string(),
        };

        if let Some(existing) = self.find_by_owner(community_id, &requester.id) {
            return Err(already(&existing.channel_id));
        }
        let name = channel_name(&requester.id);
        if let Some(channel) = self.platform.find_channel(community_id, &name).await? {
            self.register(community_id, &requester.id, &channel.id);
            return Err(already(&channel.id));
        }

        let config = self.store.get(community_id);
        let mut overwrites = vec![
            PermissionOverwrite {
                subject: OverwriteSubject::everyone(community_id),
                allow: vec![],
                deny: vec![ChannelPermission::ViewChannel],
            },
            PermissionOverwrite {
                subject: OverwriteSubject::Member(requester.id.clone()),
                allow: PARTICIPANT_PERMISSIONS.to_vec(),
                deny: vec![],
            },
            PermissionOverwrite {
                subject: OverwriteSubject::Member(self.platform.bot_user_id()),
                allow: PARTICIPANT_PERMISSIONS.to_vec(),
                deny: vec![],
            },
        ];
        if let Some(staff_role) = &config.staff_role_id {
            overwrites.push(PermissionOverwrite {
                subject: OverwriteSubject::Role(staff_role.clone()),
                allow: PARTICIPANT_PERMISSIONS.to_vec(),
                deny: vec![],
            });
        }

        let channel = self
            .platform
            .create_channel(
                community_id,
                ChannelSpec {
                    name,
                    parent_id: config.ticket_category_id.clone(),
                    topic: Some(format!("Support ticket for {}", requester.display_name)),
                    overwrites,
                },
            )
            .await?;
        let ticket = self.register(community_id, &requester.id, &channel.id);

        let greeting = OutboundMessage::embed(
            Embed::new("🎫 Ticket opened")
                .description(format!(
                    "Hi <@{}>, describe your issue and a staff member will be with you shortly.",
                    requester.id
                ))
                .color(EMBED_COLOR),
        )
        .with_component(Component::Button {
            custom_id: CustomId::TicketClose {
                community_id: community_id.to_string(),
                channel_id: channel.id.clone(),
            }
            .to_string(),
            label: "Close ticket".to_string(),
            style: ButtonStyle::Danger,
        });
        tasks::best_effort("ticket greeting", self.platform.send_message(&channel.id, greeting))
            .await;

        tracing::info!(
            community_id = community_id,
            owner_id = requester.id.as_str(),
            channel_id = channel.id.as_str(),
            "Ticket opened"
        );
        Ok(ticket)
    }

    /// Request closing the ticket in `channel_id`.
    ///
    /// Only staff or the owner may close. Finalize runs after
    /// [`CLOSE_DELAY`] on a detached task.
    pub async fn close(
        &self,
        community_id: &str,
        actor: &Member,
        channel_id: &str,
    ) -> Result<CloseOutcome> {
        let outcome = self.begin_close(community_id, actor, channel_id).await?;
        if outcome == CloseOutcome::Closing {
            let workflow = self.clone();
            let community_id = community_id.to_string();
            let channel_id = channel_id.to_string();
            tasks::schedule_after(CLOSE_DELAY, async move {
                if let Err(e) = workflow.finalize(&community_id, &channel_id).await {
                    tracing::warn!(channel_id = channel_id.as_str(), error = %e, "Ticket finalize failed");
                }
            });
        }
        Ok(outcome)
    }

    /// State transition of [`close`](Self::close) without scheduling.
    async fn begin_close(
        &self,
        community_id: &str,
        actor: &Member,
        channel_id: &str,
    ) -> Result<CloseOutcome> {
        if !self.registry.contains_key(channel_id) {
            // Re-adopt the actor's own ticket channel after a restart.
            let adopted = self
                .platform
                .find_channel(community_id, &channel_name(&actor.id))
                .await?
                .filter(|c| c.id == channel_id);
            match adopted {
                Some(channel) => {
                    self.register(community_id, &actor.id, &channel.id);
                }
                None => {
                    return Err(Error::Validation("this is not an open ticket channel".to_string()))
                }
            }
        }

        let config = self.store.get(community_id);
        let staff = is_staff(actor, &config);

        let mut ticket = self
            .registry
            .get_mut(channel_id)
            .ok_or_else(|| Error::Internal(format!("ticket {} vanished", channel_id)))?;
        if ticket.community_id != community_id {
            return Err(Error::Validation("this is not an open ticket channel".to_string()));
        }
        if !staff && ticket.owner_id != actor.id {
            return Err(Error::PermissionDenied(
                "only staff or the ticket owner can close this ticket".to_string(),
            ));
        }
        if ticket.state == TicketState::Closing {
            return Ok(CloseOutcome::AlreadyClosing);
        }
        ticket.state = TicketState::Closing;
        drop(ticket);

        tracing::info!(
            community_id = community_id,
            channel_id = channel_id,
            actor_id = actor.id.as_str(),
            "Ticket closing"
        );
        Ok(CloseOutcome::Closing)
    }

    /// Channel history for a transcript, oldest first, paged backwards up
    /// to [`TRANSCRIPT_MAX_MESSAGES`]. The flag is set when older messages
    /// were left out.
    async fn fetch_history(&self, channel_id: &str) -> (Vec<ChannelMessage>, bool) {
        let mut history: Vec<ChannelMessage> = Vec::new();
        let mut before: Option<String> = None;
        while history.len() < TRANSCRIPT_MAX_MESSAGES {
            let want = (TRANSCRIPT_MAX_MESSAGES - history.len()).min(TRANSCRIPT_PAGE as usize) as u8;
            let mut page = match tasks::best_effort(
                "ticket history",
                self.platform
                    .fetch_recent_messages(channel_id, before.as_deref(), want),
            )
            .await
            {
                Some(page) => page,
                None => return (history, false),
            };
            let complete = page.len() < want as usize;
            before = page.first().map(|m| m.id.clone());
            page.append(&mut history);
            history = page;
            if complete || before.is_none() {
                return (history, false);
            }
        }

        let older = tasks::best_effort(
            "ticket history",
            self.platform.fetch_recent_messages(channel_id, before.as_deref(), 1),
        )
        .await
        .unwrap_or_default();
        (history, !older.is_empty())
    }

    /// Put a ticket whose close failed back to Open and say so in the channel.
    async fn reopen_after_failure(&self, channel_id: &str, error: &Error) {
        if let Some(mut ticket) = self.registry.get_mut(channel_id) {
            ticket.state = TicketState::Open;
        }
        tracing::warn!(channel_id = channel_id, error = %error, "Ticket close failed, reopened");
        tasks::best_effort(
            "ticket reopen notice",
            self.platform.send_message(
                channel_id,
                OutboundMessage::text("⚠️ This ticket could not be closed. Please try again."),
            ),
        )
        .await;
    }

    /// Deliver the transcript and delete the channel.
    ///
    /// Any failure before the channel is gone puts the ticket back to Open.
    pub async fn finalize(&self, community_id: &str, channel_id: &str) -> Result<FinalizeOutcome> {
        match self.platform.channel_exists(channel_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.registry.remove(channel_id);
                tracing::info!(channel_id = channel_id, "Ticket channel already gone");
                return Ok(FinalizeOutcome::ChannelGone);
            }
            Err(e) => {
                let error = Error::from(e);
                self.reopen_after_failure(channel_id, &error).await;
                return Err(error);
            }
        }

        let (history, truncated) = self.fetch_history(channel_id).await;
        let lines = render_transcript(&history);

        let config = self.store.get(community_id);
        if let Some(log_channel) = config.mod_log_channel_id.as_deref() {
            let (channel_label, owner) = match self.get(channel_id) {
                Some(t) => (format!("#{}", channel_name(&t.owner_id)), format!("<@{}>", t.owner_id)),
                None => (format!("<#{}>", channel_id), "unknown".to_string()),
            };
            let header = OutboundMessage::embed(
                Embed::new("🎫 Ticket closed")
                    .field("Channel", channel_label, true)
                    .field("Owner", owner, true)
                    .field("Messages", message_count(lines.len(), truncated), true)
                    .color(EMBED_COLOR),
            );
            tasks::best_effort("transcript header", self.platform.send_message(log_channel, header))
                .await;
            for chunk in chunk_lines(&lines, TRANSCRIPT_CHUNK) {
                let body = OutboundMessage::text(format!("```\n{}\n```", chunk));
                tasks::best_effort("transcript chunk", self.platform.send_message(log_channel, body))
                    .await;
            }
        }

        if let Err(e) = self.platform.delete_channel(channel_id).await {
            let error = Error::from(e);
            self.reopen_after_failure(channel_id, &error).await;
            return Err(error);
        }
        self.registry.remove(channel_id);

        tracing::info!(channel_id = channel_id, lines = lines.len(), "Ticket finalized");
        Ok(FinalizeOutcome::Deleted {
            transcript_lines: lines.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryPlatform, Recorded};
    use crate::platform::PermissionState;

    fn member(id: &str, admin: bool) -> Member {
        Member {
            id: id.into(),
            display_name: id.into(),
            role_ids: vec![],
            is_administrator: admin,
            is_bot: false,
            joined_at: None,
            created_at: None,
        }
    }

    fn setup() -> (TicketWorkflow, Arc<MemoryPlatform>, ConfigStore) {
        let platform = Arc::new(MemoryPlatform::new());
        let store = ConfigStore::in_memory();
        let workflow = TicketWorkflow::new(store.clone(), platform.clone());
        (workflow, platform, store)
    }

    #[tokio::test]
    async fn test_open_creates_private_channel() {
        let (workflow, platform, store) = setup();
        store
            .update("g1", |cfg| {
                cfg.staff_role_id = Some("mods".into());
                cfg.ticket_category_id = Some("cat".into());
            })
            .unwrap();

        let ticket = workflow.open("g1", &member("u1", false)).await.unwrap();
        assert_eq!(ticket.state, TicketState::Open);
        assert!(platform.has_channel(&ticket.channel_id));

        let spec = platform
            .log()
            .into_iter()
            .find_map(|r| match r {
                Recorded::CreateChannel { spec } => Some(spec),
                _ => None,
            })
            .unwrap();
        assert_eq!(spec.name, "ticket-u1");
        assert_eq!(spec.parent_id.as_deref(), Some("cat"));

        let view = ChannelPermission::ViewChannel;
        assert_eq!(platform.overwrite(&ticket.channel_id, "g1", view), Some(PermissionState::Deny));
        assert_eq!(platform.overwrite(&ticket.channel_id, "u1", view), Some(PermissionState::Allow));
        assert_eq!(platform.overwrite(&ticket.channel_id, "mods", view), Some(PermissionState::Allow));
        assert_eq!(platform.overwrite(&ticket.channel_id, "bot", view), Some(PermissionState::Allow));

        let greeting = platform.sent_to(&ticket.channel_id);
        assert_eq!(greeting.len(), 1);
        assert!(matches!(&greeting[0].components[0], Component::Button { custom_id, .. } if custom_id.starts_with("ticket_close:g1:")));
    }

    #[tokio::test]
    async fn test_second_open_already_exists() {
        let (workflow, _platform, _store) = setup();
        let first = workflow.open("g1", &member("u1", false)).await.unwrap();

        let err = workflow.open("g1", &member("u1", false)).await.unwrap_err();
        assert_eq!(
            err,
            Error::AlreadyExists {
                what: "ticket".into(),
                reference: first.channel_id.clone()
            }
        );
        assert!(err.user_message().contains(&first.channel_id));
    }

    #[tokio::test]
    async fn test_existing_channel_by_name_blocks_open() {
        let (workflow, platform, _store) = setup();
        platform.add_channel("g1", "old", "ticket-u1");

        let err = workflow.open("g1", &member("u1", false)).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref reference, .. } if reference == "old"));
        assert_eq!(workflow.get("old").unwrap().owner_id, "u1");
    }

    #[tokio::test]
    async fn test_stranger_cannot_close() {
        let (workflow, _platform, _store) = setup();
        let ticket = workflow.open("g1", &member("u1", false)).await.unwrap();

        let err = workflow
            .close("g1", &member("u2", false), &ticket.channel_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert_eq!(workflow.get(&ticket.channel_id).unwrap().state, TicketState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_finalize_once() {
        let (workflow, platform, store) = setup();
        platform.add_channel("g1", "log", "mod-log");
        store
            .update("g1", |cfg| cfg.mod_log_channel_id = Some("log".into()))
            .unwrap();
        let owner = member("u1", false);
        let ticket = workflow.open("g1", &owner).await.unwrap();
        platform.push_history(&ticket.channel_id, "u1", "help please", 1_704_067_200_000);

        assert_eq!(
            workflow.close("g1", &owner, &ticket.channel_id).await.unwrap(),
            CloseOutcome::Closing
        );
        assert_eq!(
            workflow.close("g1", &member("admin", true), &ticket.channel_id).await.unwrap(),
            CloseOutcome::AlreadyClosing
        );
        assert!(platform.has_channel(&ticket.channel_id));

        tokio::time::sleep(CLOSE_DELAY + Duration::from_secs(1)).await;

        assert!(!platform.has_channel(&ticket.channel_id));
        assert!(workflow.get(&ticket.channel_id).is_none());
        let deletes = platform
            .log()
            .into_iter()
            .filter(|r| matches!(r, Recorded::DeleteChannel { .. }))
            .count();
        assert_eq!(deletes, 1);

        let log = platform.sent_to("log");
        assert_eq!(log.len(), 2);
        let transcript = log[1].plain_text();
        assert!(transcript.contains("[2024-01-01T00:00:00Z] user-u1: help please"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_channel_check_reopens_ticket() {
        let (workflow, platform, _store) = setup();
        let owner = member("u1", false);
        let ticket = workflow.open("g1", &owner).await.unwrap();
        let channel_id = ticket.channel_id.clone();
        platform.fail_channel_checks(1);

        assert_eq!(
            workflow.close("g1", &owner, &channel_id).await.unwrap(),
            CloseOutcome::Closing
        );
        tokio::time::sleep(CLOSE_DELAY + Duration::from_secs(1)).await;

        assert_eq!(workflow.get(&channel_id).unwrap().state, TicketState::Open);
        let notice = platform.sent_to(&channel_id).last().unwrap().plain_text();
        assert!(notice.contains("could not be closed"));

        // Staff can close it again and the retry goes through.
        assert_eq!(
            workflow.close("g1", &member("admin", true), &channel_id).await.unwrap(),
            CloseOutcome::Closing
        );
        tokio::time::sleep(CLOSE_DELAY + Duration::from_secs(1)).await;
        assert!(!platform.has_channel(&channel_id));
        assert!(workflow.get(&channel_id).is_none());

        assert!(workflow.open("g1", &owner).await.is_ok());
    }

    #[tokio::test]
    async fn test_transcript_pages_through_history() {
        let (workflow, platform, store) = setup();
        platform.add_channel("g1", "log", "mod-log");
        store
            .update("g1", |cfg| cfg.mod_log_channel_id = Some("log".into()))
            .unwrap();
        let ticket = workflow.open("g1", &member("u1", false)).await.unwrap();
        for i in 0..250 {
            platform.push_history(&ticket.channel_id, "u1", &format!("message {}", i), i);
        }

        let outcome = workflow.finalize("g1", &ticket.channel_id).await.unwrap();
        // 250 pushed plus the greeting.
        assert_eq!(outcome, FinalizeOutcome::Deleted { transcript_lines: 251 });
        let header = platform.sent_to("log")[0].plain_text();
        assert!(header.contains("Messages: 251"));
        assert!(!header.contains("omitted"));
    }

    #[tokio::test]
    async fn test_transcript_marks_omitted_history() {
        let (workflow, platform, store) = setup();
        platform.add_channel("g1", "log", "mod-log");
        store
            .update("g1", |cfg| cfg.mod_log_channel_id = Some("log".into()))
            .unwrap();
        let ticket = workflow.open("g1", &member("u1", false)).await.unwrap();
        for i in 0..TRANSCRIPT_MAX_MESSAGES {
            platform.push_history(&ticket.channel_id, "u1", "hi", i as i64);
        }

        let outcome = workflow.finalize("g1", &ticket.channel_id).await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::Deleted {
                transcript_lines: TRANSCRIPT_MAX_MESSAGES
            }
        );
        let header = platform.sent_to("log")[0].plain_text();
        assert!(header.contains("Messages: 1000 (older messages omitted)"));
    }

    #[tokio::test]
    async fn test_finalize_noop_when_channel_gone() {
        let (workflow, platform, _store) = setup();
        let owner = member("u1", false);
        let ticket = workflow.open("g1", &owner).await.unwrap();
        platform.remove_channel(&ticket.channel_id);

        let outcome = workflow.finalize("g1", &ticket.channel_id).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::ChannelGone);
        assert!(workflow.get(&ticket.channel_id).is_none());
    }

    #[tokio::test]
    async fn test_close_unknown_channel() {
        let (workflow, _platform, _store) = setup();
        let err = workflow
            .close("g1", &member("admin", true), "general")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_render_transcript_sorted() {
        let msg = |id: &str, ts: i64, content: &str| ChannelMessage {
            id: id.into(),
            channel_id: "c".into(),
            author_id: "u".into(),
            author_name: "alice".into(),
            content: content.into(),
            timestamp: ts,
        };
        let lines = render_transcript(&[msg("2", 2_000, "second"), msg("1", 0, "first")]);
        assert_eq!(lines[0], "[1970-01-01T00:00:00Z] alice: first");
        assert_eq!(lines[1], "[1970-01-01T00:00:02Z] alice: second");
    }

    #[test]
    fn test_chunk_lines_respects_limit() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        let chunks = chunk_lines(&lines, 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join("\n"), lines.join("\n"));
    }

    #[test]
    fn test_chunk_lines_splits_long_line() {
        let long = "x".repeat(5_000);
        let chunks = chunk_lines(&[long.clone()], TRANSCRIPT_CHUNK);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= TRANSCRIPT_CHUNK));
        assert_eq!(chunks.concat(), long);
    }

    #[test]
    fn test_chunk_lines_defuses_code_fences() {
        let lines = vec!["[t] eve: ```rust".to_string(), "[t] eve: ``````".to_string()];
        let chunks = chunk_lines(&lines, TRANSCRIPT_CHUNK);
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].contains("``"));
        assert_eq!(chunks[0].replace('\u{200b}', ""), lines.join("\n"));
    }
}
