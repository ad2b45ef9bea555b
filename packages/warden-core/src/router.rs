//! # Event Router
//!
//! Entry point for every inbound event.
//!
//! ```text
//! ┌──────────────┐   dispatch()   ┌──────────────────────────────────────┐
//! │ InboundEvent │ ─────────────► │ lane(communityId).lock()             │
//! └──────────────┘                │   ├─ message_created ──► AutoMod     │
//!                                 │   ├─ slash_command ───► Command      │
//!                                 │   │                      ├─ Moderation│
//!                                 │   │                      ├─ Tickets   │
//!                                 │   │                      └─ RolePanel │
//!                                 │   ├─ button / menu ───► Tickets/Roles │
//!                                 │   └─ join/leave/edit/delete/audit     │
//!                                 │        └─► welcome / leave / mod log │
//!                                 └──────────────────────────────────────┘
//! ```
//!
//! Events of one community run strictly one after another: each holds the
//! community's lane (an async mutex) for its whole duration. Different
//! communities proceed concurrently. Slash commands always get exactly one
//! reply, success or the error's user message. Timers (notice cleanup,
//! ticket finalize) run on detached tasks outside the lane.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::automod::{AutoModEngine, RateWindow, Violation, NOTICE_TTL};
use crate::commands::{Command, ModCommand, SetupCommand};
use crate::config::{CommunityConfig, ConfigStore, DEFAULT_SPAM_WINDOW_MS};
use crate::duration::format_duration;
use crate::error::{Error, Result};
use crate::events::{
    AuditEntry, ButtonPress, ChatMessage, CustomId, DeletedMessage, EditedMessage, InboundEvent,
    MembershipChange, MenuSelection, SlashCommandInvocation,
};
use crate::moderation::ModerationHandler;
use crate::platform::{Embed, InteractionRef, Member, OutboundMessage, Platform, Reply};
use crate::role_panel::RolePanel;
use crate::staff::is_staff;
use crate::tasks;
use crate::tickets::{CloseOutcome, TicketWorkflow, CLOSE_DELAY};
use crate::time::now_millis;

const COLOR_INFO: u32 = 0x5865f2;
const COLOR_WARN: u32 = 0xfee75c;
const COLOR_DANGER: u32 = 0xed4245;
const COLOR_OK: u32 = 0x57f287;

/// Longest message excerpt quoted in a mod-log entry.
const EXCERPT_LEN: usize = 1_000;

/// Process-level settings the router needs.
#[derive(Debug, Clone, Default)]
pub struct RouterSettings {
    /// Link shown by `/dashboard`.
    pub public_url: String,
}

/// Dispatches inbound events to the workflows.
pub struct EventRouter {
    store: ConfigStore,
    platform: Arc<dyn Platform>,
    automod: AutoModEngine,
    moderation: ModerationHandler,
    tickets: TicketWorkflow,
    roles: RolePanel,
    settings: RouterSettings,
    lanes: DashMap<String, Arc<Mutex<()>>>,
    handled: AtomicU64,
}

impl EventRouter {
    pub fn new(store: ConfigStore, platform: Arc<dyn Platform>, settings: RouterSettings) -> Self {
        Self {
            automod: AutoModEngine::new(RateWindow::new()),
            moderation: ModerationHandler::new(store.clone(), platform.clone()),
            tickets: TicketWorkflow::new(store.clone(), platform.clone()),
            roles: RolePanel::new(platform.clone()),
            store,
            platform,
            settings,
            lanes: DashMap::new(),
            handled: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn rate_window(&self) -> &RateWindow {
        self.automod.rate_window()
    }

    pub fn tickets(&self) -> &TicketWorkflow {
        &self.tickets
    }

    /// Events dispatched since start.
    pub fn events_handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Evict rate-window keys idle for `idle_windows` times the longest
    /// configured spam window.
    pub fn sweep_rate_window(&self, now: i64, idle_windows: u32) -> usize {
        let longest = self
            .store
            .snapshot()
            .values()
            .map(|c| c.automod.spam_window_ms)
            .max()
            .unwrap_or(DEFAULT_SPAM_WINDOW_MS);
        let idle_ms = longest.saturating_mul(idle_windows.max(1) as u64);
        self.automod.rate_window().sweep(now, idle_ms)
    }

    fn lane(&self, community_id: &str) -> Arc<Mutex<()>> {
        self.lanes
            .entry(community_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one event on its community's lane.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<()> {
        let lane = self.lane(event.community_id());
        let _guard = lane.lock().await;
        self.handled.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            community_id = event.community_id(),
            kind = event.kind(),
            "Dispatching event"
        );

        match event {
            InboundEvent::MessageCreated(msg) => self.on_message(msg).await,
            InboundEvent::MessageDeleted(msg) => self.on_message_deleted(msg).await,
            InboundEvent::MessageEdited(msg) => self.on_message_edited(msg).await,
            InboundEvent::MemberJoined(change) => self.on_member_joined(change).await,
            InboundEvent::MemberLeft(change) => self.on_member_left(change).await,
            InboundEvent::InteractionButton(press) => self.on_button(press).await,
            InboundEvent::InteractionSelectMenu(selection) => self.on_select(selection).await,
            InboundEvent::AuditLogEntry(entry) => self.on_audit_entry(entry).await,
            InboundEvent::SlashCommand(invocation) => self.on_slash_command(invocation).await,
        }
    }

    /// Post to the community's mod log, if one is configured.
    async fn mod_log(&self, config: &CommunityConfig, embed: Embed) {
        if let Some(channel_id) = config.mod_log_channel_id.as_deref() {
            let embed = embed.timestamp(now_millis());
            tasks::best_effort(
                "mod log",
                self.platform.send_message(channel_id, OutboundMessage::embed(embed)),
            )
            .await;
        }
    }

    // ── Messages ─────────────────────────────────────────────────────────

    async fn on_message(&self, msg: ChatMessage) -> Result<()> {
        if msg.author.is_bot {
            return Ok(());
        }
        let config = self.store.get(&msg.community_id);
        let exempt = is_staff(&msg.author, &config);
        let now = msg.timestamp.unwrap_or_else(now_millis);

        let violation = match self.automod.evaluate(&msg, &config.automod, exempt, now) {
            Some(v) => v,
            None => return Ok(()),
        };
        self.enforce(&msg, &config, &violation).await;
        Ok(())
    }

    /// Delete the message, post a short-lived notice, write the mod log.
    async fn enforce(&self, msg: &ChatMessage, config: &CommunityConfig, violation: &Violation) {
        tracing::info!(
            community_id = msg.community_id.as_str(),
            author_id = msg.author.id.as_str(),
            reason = %violation,
            "AutoMod removed message"
        );

        tasks::best_effort(
            "automod delete",
            self.platform.delete_message(&msg.channel_id, &msg.id),
        )
        .await;

        let notice = OutboundMessage::text(format!(
            "⚠️ <@{}>, your message was removed ({}).",
            msg.author.id, violation
        ));
        if let Some(notice_id) = tasks::best_effort(
            "automod notice",
            self.platform.send_message(&msg.channel_id, notice),
        )
        .await
        {
            let platform = self.platform.clone();
            let channel_id = msg.channel_id.clone();
            tasks::spawn_detached("automod notice cleanup", async move {
                tokio::time::sleep(NOTICE_TTL).await;
                platform.delete_message(&channel_id, &notice_id).await
            });
        }

        self.mod_log(
            config,
            Embed::new("🛡️ AutoMod")
                .color(COLOR_WARN)
                .field("User", format!("<@{}>", msg.author.id), true)
                .field("Channel", format!("<#{}>", msg.channel_id), true)
                .field("Reason", violation.reason(), true)
                .field("Content", excerpt(&msg.content), false),
        )
        .await;
    }

    async fn on_message_deleted(&self, msg: DeletedMessage) -> Result<()> {
        let config = self.store.get(&msg.community_id);
        let bot_id = self.platform.bot_user_id();
        if msg.author_id.as_deref() == Some(bot_id.as_str())
            || config.mod_log_channel_id.as_deref() == Some(msg.channel_id.as_str())
        {
            return Ok(());
        }

        let mut embed = Embed::new("🗑️ Message deleted")
            .color(COLOR_DANGER)
            .field("Channel", format!("<#{}>", msg.channel_id), true);
        if let Some(author) = &msg.author_id {
            embed = embed.field("Author", format!("<@{}>", author), true);
        }
        if let Some(content) = msg.content.as_deref().filter(|c| !c.is_empty()) {
            embed = embed.field("Content", excerpt(content), false);
        }
        self.mod_log(&config, embed).await;
        Ok(())
    }

    async fn on_message_edited(&self, msg: EditedMessage) -> Result<()> {
        if msg.author_is_bot || msg.old.as_deref() == Some(msg.new.as_str()) {
            return Ok(());
        }
        let config = self.store.get(&msg.community_id);
        self.mod_log(
            &config,
            Embed::new("✏️ Message edited")
                .color(COLOR_INFO)
                .field("Author", format!("<@{}>", msg.author_id), true)
                .field("Channel", format!("<#{}>", msg.channel_id), true)
                .field("Before", excerpt(msg.old.as_deref().unwrap_or("(unknown)")), false)
                .field("After", excerpt(&msg.new), false),
        )
        .await;
        Ok(())
    }

    // ── Membership ───────────────────────────────────────────────────────

    async fn on_member_joined(&self, change: MembershipChange) -> Result<()> {
        let config = self.store.get(&change.community_id);
        let member = &change.member;

        if let (Some(role_id), false) = (config.autorole_id.as_deref(), member.is_bot) {
            tasks::best_effort(
                "autorole",
                self.platform.add_role(&change.community_id, &member.id, role_id),
            )
            .await;
        }

        if let Some(channel_id) = config.welcome_channel_id.as_deref() {
            let community = tasks::best_effort(
                "community lookup",
                self.platform.fetch_community(&change.community_id),
            )
            .await;
            let (name, count) = community
                .map(|c| (c.name, c.member_count))
                .unwrap_or_else(|| ("the server".to_string(), 0));
            let mut embed = Embed::new("👋 Welcome!")
                .description(format!("Welcome <@{}> to **{}**!", member.id, name))
                .color(COLOR_OK);
            if count > 0 {
                embed = embed.footer(format!("Member #{}", count));
            }
            tasks::best_effort(
                "welcome message",
                self.platform.send_message(channel_id, OutboundMessage::embed(embed)),
            )
            .await;
        }

        self.mod_log(
            &config,
            Embed::new("📥 Member joined")
                .color(COLOR_OK)
                .field("Member", format!("<@{}>", member.id), true),
        )
        .await;
        Ok(())
    }

    async fn on_member_left(&self, change: MembershipChange) -> Result<()> {
        let config = self.store.get(&change.community_id);
        let member = &change.member;
        self.rate_window().clear_author(&change.community_id, &member.id);

        if let Some(channel_id) = config.leave_channel_id.as_deref() {
            let text = format!("👋 **{}** has left the server.", member.display_name);
            tasks::best_effort(
                "leave message",
                self.platform.send_message(channel_id, OutboundMessage::text(text)),
            )
            .await;
        }

        self.mod_log(
            &config,
            Embed::new("📤 Member left")
                .color(COLOR_DANGER)
                .field("Member", format!("{} (<@{}>)", member.display_name, member.id), true),
        )
        .await;
        Ok(())
    }

    async fn on_audit_entry(&self, entry: AuditEntry) -> Result<()> {
        // Actions taken by Warden are already logged where they happen.
        if entry.executor_id.as_deref() == Some(self.platform.bot_user_id().as_str()) {
            return Ok(());
        }
        let config = self.store.get(&entry.community_id);
        let mention = |id: &Option<String>| {
            id.as_deref()
                .map(|i| format!("<@{}>", i))
                .unwrap_or_else(|| "unknown".to_string())
        };
        self.mod_log(
            &config,
            Embed::new("📋 Audit log")
                .color(COLOR_INFO)
                .field("Action", entry.action.clone(), true)
                .field("Target", mention(&entry.target_id), true)
                .field("By", mention(&entry.executor_id), true)
                .field("Reason", entry.reason.clone().unwrap_or_else(|| "none".to_string()), false),
        )
        .await;
        Ok(())
    }

    // ── Components ───────────────────────────────────────────────────────

    /// Parse a custom ID and make sure it belongs to the event's community.
    fn custom_id(raw: &str, community_id: &str) -> Result<CustomId> {
        let id: CustomId = raw.parse()?;
        if id.community_id() != community_id {
            return Err(Error::Validation("this control belongs to another server".to_string()));
        }
        Ok(id)
    }

    async fn on_button(&self, press: ButtonPress) -> Result<()> {
        let result = self.handle_button(&press).await;
        self.answer(&press.interaction, "button", result).await
    }

    async fn handle_button(&self, press: &ButtonPress) -> Result<Reply> {
        match Self::custom_id(&press.custom_id, &press.community_id)? {
            CustomId::TicketOpen { community_id } => {
                let ticket = self.tickets.open(&community_id, &press.actor).await?;
                Ok(Reply::ephemeral(OutboundMessage::text(format!(
                    "✅ Ticket created: <#{}>",
                    ticket.channel_id
                ))))
            }
            CustomId::TicketClose {
                community_id,
                channel_id,
            } => self.close_ticket(&community_id, &press.actor, &channel_id).await,
            CustomId::RolePanel { .. } => Err(Error::Validation(
                "role panels are driven by a select menu".to_string(),
            )),
        }
    }

    async fn on_select(&self, selection: MenuSelection) -> Result<()> {
        let result = self.handle_select(&selection).await;
        self.answer(&selection.interaction, "select menu", result).await
    }

    async fn handle_select(&self, selection: &MenuSelection) -> Result<Reply> {
        match Self::custom_id(&selection.custom_id, &selection.community_id)? {
            CustomId::RolePanel { community_id } => {
                let report = self
                    .roles
                    .reconcile(
                        &community_id,
                        &selection.actor,
                        &selection.selected_values,
                        &selection.candidate_values,
                    )
                    .await;
                Ok(Reply::ephemeral(OutboundMessage::text(report.summary())))
            }
            _ => Err(Error::Validation("unexpected select menu".to_string())),
        }
    }

    async fn close_ticket(&self, community_id: &str, actor: &Member, channel_id: &str) -> Result<Reply> {
        let text = match self.tickets.close(community_id, actor, channel_id).await? {
            CloseOutcome::Closing => format!(
                "🔒 This ticket will be closed in {} seconds.",
                CLOSE_DELAY.as_secs()
            ),
            CloseOutcome::AlreadyClosing => "🔒 This ticket is already closing.".to_string(),
        };
        Ok(Reply::public(OutboundMessage::text(text)))
    }

    /// Send the single terminal reply for an interaction.
    async fn answer(
        &self,
        interaction: &InteractionRef,
        what: &str,
        result: Result<Reply>,
    ) -> Result<()> {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_user_error() {
                    tracing::debug!(kind = what, error = %e, "Interaction refused");
                } else {
                    tracing::warn!(kind = what, error = %e, "Interaction failed");
                }
                Reply::ephemeral(OutboundMessage::text(e.user_message()))
            }
        };
        tasks::best_effort("interaction reply", self.platform.reply(interaction, reply)).await;
        Ok(())
    }

    // ── Slash commands ───────────────────────────────────────────────────

    async fn on_slash_command(&self, invocation: SlashCommandInvocation) -> Result<()> {
        let result = self.run_command(&invocation).await;
        self.answer(&invocation.interaction, "slash command", result).await
    }

    async fn run_command(&self, inv: &SlashCommandInvocation) -> Result<Reply> {
        let command = Command::parse(inv)?;
        let config = self.store.get(&inv.community_id);
        if command.requires_staff() && !is_staff(&inv.actor, &config) {
            return Err(Error::PermissionDenied("this command is for staff only".to_string()));
        }

        tracing::info!(
            community_id = inv.community_id.as_str(),
            actor_id = inv.actor.id.as_str(),
            command = %command.label(),
            "Slash command"
        );

        let community_id = inv.community_id.as_str();
        match command {
            Command::Ping => {
                let text = match self.platform.latency_ms() {
                    Some(ms) => format!("🏓 Pong! {}ms", ms),
                    None => "🏓 Pong!".to_string(),
                };
                Ok(Reply::public(OutboundMessage::text(text)))
            }
            Command::Dashboard => {
                if !inv.actor.is_administrator {
                    return Err(Error::PermissionDenied(
                        "you need the Administrator permission".to_string(),
                    ));
                }
                Ok(Reply::ephemeral(OutboundMessage::embed(
                    Embed::new("🎮 Bot Dashboard")
                        .description("Manage the bot through the web dashboard.")
                        .color(COLOR_INFO)
                        .field("🔗 Link", self.settings.public_url.clone(), false)
                        .field(
                            "📊 Features",
                            "• Channel configuration\n• Role management\n• AutoMod settings\n• Live bot stats",
                            false,
                        )
                        .footer("Only visible to admins")
                        .timestamp(now_millis()),
                )))
            }
            Command::Mod(cmd) => self.run_mod(inv, &config, cmd).await,
            Command::Setup(cmd) => self.run_setup(community_id, cmd),
            Command::Announce { channel_id, text } => {
                let target = channel_id.unwrap_or_else(|| inv.channel_id.clone());
                let embed = Embed::new("📢 Announcement")
                    .description(text)
                    .color(COLOR_INFO)
                    .footer(format!("by {}", inv.actor.display_name))
                    .timestamp(now_millis());
                self.platform
                    .send_message(&target, OutboundMessage::embed(embed))
                    .await?;
                Ok(Reply::ephemeral(OutboundMessage::text(format!(
                    "✅ Announcement posted in <#{}>.",
                    target
                ))))
            }
            Command::Suggest { text } => {
                let channel_id = config.suggestion_channel_id.clone().ok_or_else(|| {
                    Error::Validation("no suggestion channel is configured".to_string())
                })?;
                let embed = Embed::new("💡 Suggestion")
                    .description(text)
                    .color(COLOR_WARN)
                    .footer(format!("from {}", inv.actor.display_name))
                    .timestamp(now_millis());
                self.platform
                    .send_message(&channel_id, OutboundMessage::embed(embed))
                    .await?;
                Ok(Reply::ephemeral(OutboundMessage::text("✅ Thanks, your suggestion was submitted.")))
            }
            Command::TicketPanel { channel_id } => {
                let target = channel_id.unwrap_or_else(|| inv.channel_id.clone());
                self.platform
                    .send_message(&target, TicketWorkflow::panel_message(community_id))
                    .await?;
                Ok(Reply::ephemeral(OutboundMessage::text(format!(
                    "✅ Ticket panel posted in <#{}>.",
                    target
                ))))
            }
            Command::TicketClose => self.close_ticket(community_id, &inv.actor, &inv.channel_id).await,
            Command::RolePanel { title, roles } => {
                let panel = RolePanel::build(community_id, &title, &roles)?;
                self.platform.send_message(&inv.channel_id, panel).await?;
                Ok(Reply::ephemeral(OutboundMessage::text("✅ Role panel posted.")))
            }
            Command::ServerInfo => {
                let info = self.platform.fetch_community(community_id).await?;
                let mut embed = Embed::new(format!("ℹ️ {}", info.name))
                    .color(COLOR_INFO)
                    .field("Owner", format!("<@{}>", info.owner_id), true)
                    .field("Members", info.member_count.to_string(), true)
                    .field("ID", info.id.clone(), true);
                if let Some(created) = info.created_at {
                    embed = embed.field("Created", crate::time::format_millis(created), true);
                }
                Ok(Reply::public(OutboundMessage::embed(embed)))
            }
            Command::UserInfo { user_id } => {
                let user_id = user_id.unwrap_or_else(|| inv.actor.id.clone());
                let member = self
                    .platform
                    .fetch_member(community_id, &user_id)
                    .await?
                    .ok_or_else(|| Error::TargetNotFound(format!("member {}", user_id)))?;
                Ok(Reply::public(OutboundMessage::embed(user_info(&member, &config))))
            }
            Command::Help => Ok(Reply::ephemeral(OutboundMessage::embed(help_embed()))),
        }
    }

    async fn run_mod(
        &self,
        inv: &SlashCommandInvocation,
        config: &CommunityConfig,
        cmd: ModCommand,
    ) -> Result<Reply> {
        let community_id = inv.community_id.as_str();
        let actor = &inv.actor;
        let mod_entry = |action: &str, target: &str, reason: Option<&str>| {
            let mut embed = Embed::new(format!("🔨 {}", action))
                .color(COLOR_DANGER)
                .field("Target", format!("<@{}>", target), true)
                .field("Moderator", format!("<@{}>", actor.id), true);
            if let Some(reason) = reason {
                embed = embed.field("Reason", reason.to_string(), false);
            }
            embed
        };

        match cmd {
            ModCommand::Warn { user_id, reason } => {
                let count = self
                    .moderation
                    .warn(community_id, actor, &user_id, reason.as_deref(), now_millis())
                    .await?;
                let reason = reason.unwrap_or_else(|| crate::moderation::DEFAULT_REASON.to_string());
                self.mod_log(config, mod_entry("Warn", &user_id, Some(&reason)).field("Total", count.to_string(), true))
                    .await;
                Ok(Reply::public(OutboundMessage::text(format!(
                    "⚠️ <@{}> has been warned ({} total). Reason: {}",
                    user_id, count, reason
                ))))
            }
            ModCommand::Warnings { user_id } => {
                let list = self.moderation.list_warnings(community_id, actor, &user_id)?;
                if list.is_empty() {
                    return Ok(Reply::ephemeral(OutboundMessage::text(format!(
                        "✅ <@{}> has no warnings.",
                        user_id
                    ))));
                }
                let lines = list
                    .iter()
                    .map(|(n, w)| {
                        format!(
                            "**{}.** {} by <@{}> ({})",
                            n,
                            w.reason,
                            w.issuer_id,
                            crate::time::format_millis(w.timestamp)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(Reply::ephemeral(OutboundMessage::embed(
                    Embed::new(format!("⚠️ Warnings for {}", user_id))
                        .description(lines)
                        .color(COLOR_WARN),
                )))
            }
            ModCommand::ClearWarnings { user_id } => {
                let removed = self.moderation.clear_warnings(community_id, actor, &user_id)?;
                if removed > 0 {
                    self.mod_log(config, mod_entry("Warnings cleared", &user_id, None).field("Removed", removed.to_string(), true))
                        .await;
                }
                Ok(Reply::ephemeral(OutboundMessage::text(format!(
                    "✅ Removed {} warning(s) from <@{}>.",
                    removed, user_id
                ))))
            }
            ModCommand::Kick { user_id, reason } => {
                self.moderation
                    .kick(community_id, actor, &user_id, reason.as_deref())
                    .await?;
                self.mod_log(config, mod_entry("Kick", &user_id, reason.as_deref())).await;
                Ok(Reply::public(OutboundMessage::text(format!("👢 <@{}> was kicked.", user_id))))
            }
            ModCommand::Ban {
                user_id,
                purge_days,
                reason,
            } => {
                self.moderation
                    .ban(community_id, actor, &user_id, purge_days, reason.as_deref())
                    .await?;
                self.mod_log(config, mod_entry("Ban", &user_id, reason.as_deref())).await;
                Ok(Reply::public(OutboundMessage::text(format!("🔨 <@{}> was banned.", user_id))))
            }
            ModCommand::Unban { user_id, reason } => {
                self.moderation
                    .unban(community_id, actor, &user_id, reason.as_deref())
                    .await?;
                self.mod_log(config, mod_entry("Unban", &user_id, reason.as_deref())).await;
                Ok(Reply::public(OutboundMessage::text(format!("✅ <@{}> was unbanned.", user_id))))
            }
            ModCommand::Timeout {
                user_id,
                duration,
                reason,
            } => {
                let millis = self
                    .moderation
                    .timeout(community_id, actor, &user_id, &duration, reason.as_deref())
                    .await?;
                self.mod_log(
                    config,
                    mod_entry("Timeout", &user_id, reason.as_deref())
                        .field("Duration", format_duration(millis), true),
                )
                .await;
                Ok(Reply::public(OutboundMessage::text(format!(
                    "🔇 <@{}> was timed out for {}.",
                    user_id,
                    format_duration(millis)
                ))))
            }
            ModCommand::Untimeout { user_id } => {
                self.moderation
                    .remove_timeout(community_id, actor, &user_id)
                    .await?;
                self.mod_log(config, mod_entry("Timeout removed", &user_id, None)).await;
                Ok(Reply::public(OutboundMessage::text(format!(
                    "🔊 <@{}> can talk again.",
                    user_id
                ))))
            }
            ModCommand::Purge { amount } => {
                let deleted = self
                    .moderation
                    .purge(community_id, actor, &inv.channel_id, amount)
                    .await?;
                self.mod_log(
                    config,
                    Embed::new("🧹 Purge")
                        .color(COLOR_DANGER)
                        .field("Channel", format!("<#{}>", inv.channel_id), true)
                        .field("Deleted", deleted.to_string(), true)
                        .field("Moderator", format!("<@{}>", actor.id), true),
                )
                .await;
                Ok(Reply::ephemeral(OutboundMessage::text(format!(
                    "🧹 Deleted {} message(s).",
                    deleted
                ))))
            }
            ModCommand::Slowmode { seconds } => {
                let seconds = self
                    .moderation
                    .set_slowmode(community_id, actor, &inv.channel_id, seconds)
                    .await?;
                let text = if seconds == 0 {
                    "🐇 Slowmode disabled.".to_string()
                } else {
                    format!("🐢 Slowmode set to {} second(s).", seconds)
                };
                Ok(Reply::public(OutboundMessage::text(text)))
            }
            ModCommand::Lock => {
                self.moderation.lock(community_id, actor, &inv.channel_id).await?;
                self.mod_log(
                    config,
                    Embed::new("🔒 Channel locked")
                        .color(COLOR_DANGER)
                        .field("Channel", format!("<#{}>", inv.channel_id), true)
                        .field("Moderator", format!("<@{}>", actor.id), true),
                )
                .await;
                Ok(Reply::public(OutboundMessage::text("🔒 Channel locked.")))
            }
            ModCommand::Unlock => {
                self.moderation.unlock(community_id, actor, &inv.channel_id).await?;
                self.mod_log(
                    config,
                    Embed::new("🔓 Channel unlocked")
                        .color(COLOR_OK)
                        .field("Channel", format!("<#{}>", inv.channel_id), true)
                        .field("Moderator", format!("<@{}>", actor.id), true),
                )
                .await;
                Ok(Reply::public(OutboundMessage::text("🔓 Channel unlocked.")))
            }
        }
    }

    fn run_setup(&self, community_id: &str, cmd: SetupCommand) -> Result<Reply> {
        let text = match cmd {
            SetupCommand::Slot { slot, id } => {
                let text = match &id {
                    Some(id) if slot.is_role() => format!("✅ {} set to <@&{}>.", slot.label(), id),
                    Some(id) => format!("✅ {} set to <#{}>.", slot.label(), id),
                    None => format!("✅ {} cleared.", slot.label()),
                };
                self.store.update(community_id, |cfg| cfg.set_slot(slot, id))?;
                text
            }
            SetupCommand::Prefix(prefix) => {
                let text = format!("✅ Prefix set to `{}`.", prefix);
                self.store.update(community_id, |cfg| cfg.prefix = prefix)?;
                text
            }
            SetupCommand::AutoMod(on) => {
                self.store.update(community_id, |cfg| cfg.automod.enabled = on)?;
                format!("✅ AutoMod {}.", on_off(on))
            }
            SetupCommand::AntiLink(on) => {
                self.store.update(community_id, |cfg| cfg.automod.anti_link = on)?;
                format!("✅ Link filter {}.", on_off(on))
            }
            SetupCommand::AntiInvite(on) => {
                self.store.update(community_id, |cfg| cfg.automod.anti_invite = on)?;
                format!("✅ Invite filter {}.", on_off(on))
            }
            SetupCommand::AddWord(word) => {
                if self.store.update(community_id, |cfg| cfg.automod.add_banned_word(&word))? {
                    format!("✅ `{}` added to the banned words.", word.to_lowercase())
                } else {
                    format!("ℹ️ `{}` is already banned.", word.to_lowercase())
                }
            }
            SetupCommand::RemoveWord(word) => {
                if self.store.update(community_id, |cfg| cfg.automod.remove_banned_word(&word))? {
                    format!("✅ `{}` removed from the banned words.", word.to_lowercase())
                } else {
                    format!("ℹ️ `{}` was not banned.", word.to_lowercase())
                }
            }
        };
        Ok(Reply::ephemeral(OutboundMessage::text(text)))
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LEN {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(EXCERPT_LEN).collect();
    cut.push('…');
    cut
}

fn user_info(member: &Member, config: &CommunityConfig) -> Embed {
    let roles = if member.role_ids.is_empty() {
        "none".to_string()
    } else {
        member
            .role_ids
            .iter()
            .map(|r| format!("<@&{}>", r))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut embed = Embed::new(format!("👤 {}", member.display_name))
        .color(COLOR_INFO)
        .field("ID", member.id.clone(), true)
        .field("Warnings", config.warnings_for(&member.id).len().to_string(), true)
        .field("Roles", roles, false);
    if let Some(joined) = member.joined_at {
        embed = embed.field("Joined", crate::time::format_millis(joined), true);
    }
    if let Some(created) = member.created_at {
        embed = embed.field("Account created", crate::time::format_millis(created), true);
    }
    embed
}

fn help_embed() -> Embed {
    Embed::new("📖 Commands")
        .color(COLOR_INFO)
        .field("General", "/ping · /help · /serverinfo · /userinfo · /suggest", false)
        .field(
            "Moderation",
            "/mod warn · warnings · clearwarnings · kick · ban · unban · timeout · untimeout · purge · slowmode · lock · unlock",
            false,
        )
        .field(
            "Setup",
            "/setup log · welcome · leave · suggestions · ticketcategory · staffrole · autorole · mutedrole · prefix · automod · antilink · antiinvite · addword · removeword",
            false,
        )
        .field("Tools", "/announce · /ticketpanel · /ticketclose · /rolepanel · /dashboard", false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryPlatform, Recorded};
    use serde_json::{json, Value};
    use std::time::Duration;

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

    fn setup() -> (EventRouter, Arc<MemoryPlatform>, ConfigStore) {
        let platform = Arc::new(MemoryPlatform::new());
        let store = ConfigStore::in_memory();
        platform.add_channel("g1", "general", "general");
        platform.add_channel("g1", "log", "mod-log");
        platform.add_member("g1", member("admin", true));
        platform.add_member("g1", member("u1", false));
        store
            .update("g1", |cfg| cfg.mod_log_channel_id = Some("log".into()))
            .unwrap();
        let router = EventRouter::new(
            store.clone(),
            platform.clone(),
            RouterSettings {
                public_url: "http://localhost:3000".into(),
            },
        );
        (router, platform, store)
    }

    fn chat(author: Member, content: &str, ts: i64) -> InboundEvent {
        InboundEvent::MessageCreated(ChatMessage {
            id: format!("m{}", ts),
            community_id: "g1".into(),
            channel_id: "general".into(),
            author,
            content: content.into(),
            timestamp: Some(ts),
        })
    }

    fn slash(actor: Member, name: &str, sub: Option<&str>, options: Value) -> InboundEvent {
        InboundEvent::SlashCommand(SlashCommandInvocation {
            interaction: InteractionRef {
                id: "i1".into(),
                token: "t".into(),
            },
            community_id: "g1".into(),
            channel_id: "general".into(),
            name: name.into(),
            subcommand: sub.map(str::to_string),
            options: options.as_object().cloned().unwrap_or_default(),
            actor,
        })
    }

    fn deletes(platform: &MemoryPlatform) -> Vec<String> {
        platform
            .log()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Delete { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_is_removed_with_transient_notice() {
        let (router, platform, _store) = setup();
        router
            .dispatch(chat(member("u1", false), "join discord.gg/abc", 1))
            .await
            .unwrap();

        assert_eq!(deletes(&platform), vec!["m1".to_string()]);
        let notices = platform.sent_to("general");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].plain_text().contains("invite link"));
        let log = platform.sent_to("log");
        assert_eq!(log.len(), 1);
        assert!(log[0].plain_text().contains("Reason: invite link"));

        tokio::time::sleep(NOTICE_TTL + Duration::from_secs(1)).await;
        assert_eq!(deletes(&platform).len(), 2);
    }

    #[tokio::test]
    async fn test_staff_messages_are_exempt() {
        let (router, platform, _store) = setup();
        for i in 0..10 {
            router
                .dispatch(chat(member("admin", true), "discord.gg/abc", i))
                .await
                .unwrap();
        }
        assert!(deletes(&platform).is_empty());
        assert_eq!(router.rate_window().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_spam_flagged_at_threshold() {
        let (router, platform, store) = setup();
        store.update("g1", |cfg| cfg.automod.spam_max = 3).unwrap();
        for ts in [1_000, 2_000, 3_000] {
            router
                .dispatch(chat(member("u1", false), "hello", ts))
                .await
                .unwrap();
        }
        assert_eq!(deletes(&platform), vec!["m3000".to_string()]);
        assert!(platform.sent_to("log")[0].plain_text().contains("spam: 3 messages"));
    }

    #[tokio::test]
    async fn test_non_staff_command_gets_single_error_reply() {
        let (router, platform, store) = setup();
        router
            .dispatch(slash(member("u1", false), "mod", Some("warn"), json!({ "user": "u1" })))
            .await
            .unwrap();

        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].ephemeral);
        assert!(replies[0].message.plain_text().starts_with("❌ Permission denied"));
        assert!(store.get("g1").warnings.is_empty());
    }

    #[tokio::test]
    async fn test_warn_replies_and_logs() {
        let (router, platform, store) = setup();
        router
            .dispatch(slash(
                member("admin", true),
                "mod",
                Some("warn"),
                json!({ "user": "u1", "reason": "rude" }),
            ))
            .await
            .unwrap();

        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].message.plain_text().contains("1 total"));
        assert_eq!(store.get("g1").warnings_for("u1").len(), 1);
        assert!(platform.sent_to("log")[0].plain_text().contains("rude"));
    }

    #[tokio::test]
    async fn test_validation_error_reply() {
        let (router, platform, _store) = setup();
        router
            .dispatch(slash(member("admin", true), "mod", Some("purge"), json!({ "amount": 500 })))
            .await
            .unwrap();
        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].message.plain_text().starts_with("❌ Invalid input"));
    }

    #[tokio::test]
    async fn test_setup_updates_config() {
        let (router, platform, store) = setup();
        router
            .dispatch(slash(member("admin", true), "setup", Some("welcome"), json!({ "channel": "general" })))
            .await
            .unwrap();
        router
            .dispatch(slash(member("admin", true), "setup", Some("addword"), json!({ "word": "Scam" })))
            .await
            .unwrap();

        let cfg = store.get("g1");
        assert_eq!(cfg.welcome_channel_id.as_deref(), Some("general"));
        assert_eq!(cfg.automod.banned_words, vec!["scam".to_string()]);
        assert_eq!(platform.replies().len(), 2);
    }

    #[tokio::test]
    async fn test_member_join_autorole_and_welcome() {
        let (router, platform, store) = setup();
        store
            .update("g1", |cfg| {
                cfg.autorole_id = Some("newbie".into());
                cfg.welcome_channel_id = Some("general".into());
            })
            .unwrap();
        let newcomer = member("u2", false);
        platform.add_member("g1", newcomer.clone());

        router
            .dispatch(InboundEvent::MemberJoined(MembershipChange {
                community_id: "g1".into(),
                member: newcomer,
            }))
            .await
            .unwrap();

        assert!(platform.member("g1", "u2").unwrap().has_role("newbie"));
        let welcome = platform.sent_to("general");
        assert_eq!(welcome.len(), 1);
        assert!(welcome[0].plain_text().contains("<@u2>"));
    }

    #[tokio::test]
    async fn test_member_left_message() {
        let (router, platform, store) = setup();
        store
            .update("g1", |cfg| cfg.leave_channel_id = Some("general".into()))
            .unwrap();
        router.rate_window().record("g1", "u1", 1_000, 5_000);
        router
            .dispatch(InboundEvent::MemberLeft(MembershipChange {
                community_id: "g1".into(),
                member: member("u1", false),
            }))
            .await
            .unwrap();
        assert!(platform.sent_to("general")[0].plain_text().contains("u1"));
        assert_eq!(router.rate_window().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_ticket_button_flow() {
        let (router, platform, _store) = setup();
        let press = |custom_id: String, actor: Member| {
            InboundEvent::InteractionButton(ButtonPress {
                interaction: InteractionRef {
                    id: "b1".into(),
                    token: "t".into(),
                },
                community_id: "g1".into(),
                channel_id: "general".into(),
                custom_id,
                actor,
            })
        };

        router
            .dispatch(press("ticket_open:g1:".into(), member("u1", false)))
            .await
            .unwrap();
        router
            .dispatch(press("ticket_open:g1:".into(), member("u1", false)))
            .await
            .unwrap();

        let replies = platform.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].message.plain_text().starts_with("✅ Ticket created"));
        assert!(replies[1].message.plain_text().contains("already have an open ticket"));
        assert_eq!(router.tickets().open_count(), 1);
    }

    #[tokio::test]
    async fn test_foreign_custom_id_rejected() {
        let (router, platform, _store) = setup();
        router
            .dispatch(InboundEvent::InteractionButton(ButtonPress {
                interaction: InteractionRef {
                    id: "b1".into(),
                    token: "t".into(),
                },
                community_id: "g1".into(),
                channel_id: "general".into(),
                custom_id: "ticket_open:g2:".into(),
                actor: member("u1", false),
            }))
            .await
            .unwrap();
        assert_eq!(router.tickets().open_count(), 0);
        assert!(platform.replies()[0].message.plain_text().starts_with("❌"));
    }

    #[tokio::test]
    async fn test_role_menu_reconciles() {
        let (router, platform, _store) = setup();
        let mut actor = member("u3", false);
        actor.role_ids = vec!["A".into(), "C".into()];
        platform.add_member("g1", actor.clone());

        router
            .dispatch(InboundEvent::InteractionSelectMenu(MenuSelection {
                interaction: InteractionRef {
                    id: "s1".into(),
                    token: "t".into(),
                },
                community_id: "g1".into(),
                channel_id: "general".into(),
                custom_id: "rolepanel:g1:".into(),
                actor,
                selected_values: vec!["B".into()],
                candidate_values: vec!["A".into(), "B".into(), "C".into()],
            }))
            .await
            .unwrap();

        let after = platform.member("g1", "u3").unwrap();
        assert_eq!(after.role_ids, vec!["B".to_string()]);
        assert!(platform.replies()[0].ephemeral);
    }

    #[tokio::test]
    async fn test_edit_and_delete_logged() {
        let (router, platform, _store) = setup();
        router
            .dispatch(InboundEvent::MessageEdited(EditedMessage {
                message_id: "m1".into(),
                community_id: "g1".into(),
                channel_id: "general".into(),
                author_id: "u1".into(),
                author_is_bot: false,
                old: Some("helo".into()),
                new: "hello".into(),
            }))
            .await
            .unwrap();
        router
            .dispatch(InboundEvent::MessageDeleted(DeletedMessage {
                message_id: "m1".into(),
                community_id: "g1".into(),
                channel_id: "general".into(),
                author_id: Some("u1".into()),
                content: Some("hello".into()),
            }))
            .await
            .unwrap();

        let log = platform.sent_to("log");
        assert_eq!(log.len(), 2);
        assert!(log[0].plain_text().contains("Before: helo"));
        assert!(log[1].plain_text().contains("Message deleted"));
        assert_eq!(router.events_handled(), 2);
    }

    #[tokio::test]
    async fn test_sweep_uses_configured_window() {
        let (router, _platform, _store) = setup();
        router
            .dispatch(chat(member("u1", false), "hi", 0))
            .await
            .unwrap();
        assert_eq!(router.sweep_rate_window(79_999, 10), 0);
        assert_eq!(router.sweep_rate_window(80_000, 10), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_single_reply() {
        let (router, platform, _store) = setup();
        router
            .dispatch(slash(member("u1", false), "dance", None, json!({})))
            .await
            .unwrap();
        assert_eq!(platform.replies().len(), 1);
    }
}
