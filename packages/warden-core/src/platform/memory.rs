//! In-memory [`Platform`] double.
//!
//! Records every outbound command in order and keeps just enough state
//! (members, channels, message history) for the workflows to behave like
//! they would against the real platform. Failures can be injected per role
//! and per member. Sends can be made to fail wholesale, and channel checks
//! for a number of calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ChannelMessage, ChannelPermission, ChannelRef, ChannelSpec, CommunityInfo, InteractionRef,
    Member, OutboundMessage, OverwriteSubject, PermissionState, Platform, PlatformError,
    PlatformResult, Reply,
};

/// One recorded outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Send { channel_id: String, message: OutboundMessage },
    Delete { channel_id: String, message_id: String },
    BulkDelete { channel_id: String, requested: u8, deleted: usize },
    AddRole { member_id: String, role_id: String },
    RemoveRole { member_id: String, role_id: String },
    CreateChannel { spec: ChannelSpec },
    DeleteChannel { channel_id: String },
    Overwrite {
        channel_id: String,
        subject: OverwriteSubject,
        permission: ChannelPermission,
        state: PermissionState,
    },
    Slowmode { channel_id: String, seconds: u32 },
    Kick { member_id: String },
    Ban { user_id: String, purge_days: u8 },
    Unban { user_id: String },
    Timeout { member_id: String, duration_ms: Option<i64> },
    Reply { interaction_id: String, reply: Reply },
}

#[derive(Debug, Clone)]
struct ChannelState {
    community_id: String,
    name: String,
    history: Vec<ChannelMessage>,
}

#[derive(Default)]
struct Inner {
    members: HashMap<(String, String), Member>,
    channels: HashMap<String, ChannelState>,
    overwrites: HashMap<(String, String, ChannelPermission), PermissionState>,
    banned: HashSet<(String, String)>,
    log: Vec<Recorded>,
    failing_roles: HashSet<String>,
    protected_members: HashSet<String>,
    fail_sends: bool,
    failing_channel_checks: usize,
}

/// Recording platform double.
pub struct MemoryPlatform {
    bot_id: String,
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            bot_id: "bot".to_string(),
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1000),
        }
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    // ── Fixtures ─────────────────────────────────────────────────────────

    /// Register a member in a community.
    pub fn add_member(&self, community_id: &str, member: Member) {
        self.inner
            .lock()
            .members
            .insert((community_id.to_string(), member.id.clone()), member);
    }

    /// Register an existing channel.
    pub fn add_channel(&self, community_id: &str, channel_id: &str, name: &str) {
        self.inner.lock().channels.insert(
            channel_id.to_string(),
            ChannelState {
                community_id: community_id.to_string(),
                name: name.to_string(),
                history: Vec::new(),
            },
        );
    }

    /// Append a message to a channel's history.
    pub fn push_history(&self, channel_id: &str, author_id: &str, content: &str, timestamp: i64) {
        let id = self.next_id();
        if let Some(channel) = self.inner.lock().channels.get_mut(channel_id) {
            channel.history.push(ChannelMessage {
                id,
                channel_id: channel_id.to_string(),
                author_id: author_id.to_string(),
                author_name: format!("user-{}", author_id),
                content: content.to_string(),
                timestamp,
            });
        }
    }

    /// Make every add/remove of `role_id` fail.
    pub fn fail_role(&self, role_id: &str) {
        self.inner.lock().failing_roles.insert(role_id.to_string());
    }

    /// Make kick/ban/timeout of `member_id` fail as if they outrank the bot.
    pub fn protect_member(&self, member_id: &str) {
        self.inner.lock().protected_members.insert(member_id.to_string());
    }

    /// Make every `send_message` fail.
    pub fn fail_sends(&self) {
        self.inner.lock().fail_sends = true;
    }

    /// Make the next `times` calls to `channel_exists` fail.
    pub fn fail_channel_checks(&self, times: usize) {
        self.inner.lock().failing_channel_checks = times;
    }

    /// Remove a channel as if it had been deleted out-of-band.
    pub fn remove_channel(&self, channel_id: &str) {
        self.inner.lock().channels.remove(channel_id);
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Every recorded command, in order.
    pub fn log(&self) -> Vec<Recorded> {
        self.inner.lock().log.clone()
    }

    /// Messages sent to `channel_id`, in order.
    pub fn sent_to(&self, channel_id: &str) -> Vec<OutboundMessage> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|r| match r {
                Recorded::Send { channel_id: c, message } if c == channel_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Replies sent to interactions, in order.
    pub fn replies(&self) -> Vec<Reply> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|r| match r {
                Recorded::Reply { reply, .. } => Some(reply.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn member(&self, community_id: &str, member_id: &str) -> Option<Member> {
        self.inner
            .lock()
            .members
            .get(&(community_id.to_string(), member_id.to_string()))
            .cloned()
    }

    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.inner.lock().channels.contains_key(channel_id)
    }

    pub fn overwrite(
        &self,
        channel_id: &str,
        subject_id: &str,
        permission: ChannelPermission,
    ) -> Option<PermissionState> {
        self.inner
            .lock()
            .overwrites
            .get(&(channel_id.to_string(), subject_id.to_string(), permission))
            .copied()
    }

    pub fn is_banned(&self, community_id: &str, user_id: &str) -> bool {
        self.inner
            .lock()
            .banned
            .contains(&(community_id.to_string(), user_id.to_string()))
    }

    fn record(&self, entry: Recorded) {
        self.inner.lock().log.push(entry);
    }

    fn check_target(&self, community_id: &str, member_id: &str) -> PlatformResult<()> {
        let inner = self.inner.lock();
        if !inner
            .members
            .contains_key(&(community_id.to_string(), member_id.to_string()))
        {
            return Err(PlatformError::NotFound(format!("member {}", member_id)));
        }
        if inner.protected_members.contains(member_id) {
            return Err(PlatformError::Rejected("Missing Permissions".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn bot_user_id(&self) -> String {
        self.bot_id.clone()
    }

    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> PlatformResult<String> {
        if self.inner.lock().fail_sends {
            return Err(PlatformError::Rejected("Cannot send messages".to_string()));
        }
        let id = self.next_id();
        {
            let mut inner = self.inner.lock();
            if let Some(channel) = inner.channels.get_mut(channel_id) {
                channel.history.push(ChannelMessage {
                    id: id.clone(),
                    channel_id: channel_id.to_string(),
                    author_id: self.bot_id.clone(),
                    author_name: "Warden".to_string(),
                    content: message.plain_text(),
                    timestamp: crate::time::now_millis(),
                });
            }
        }
        self.record(Recorded::Send {
            channel_id: channel_id.to_string(),
            message,
        });
        Ok(id)
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<()> {
        self.record(Recorded::Delete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn bulk_delete_messages(&self, channel_id: &str, count: u8) -> PlatformResult<usize> {
        let deleted = {
            let mut inner = self.inner.lock();
            let channel = inner
                .channels
                .get_mut(channel_id)
                .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;
            let n = (count as usize).min(channel.history.len());
            let keep = channel.history.len() - n;
            channel.history.truncate(keep);
            n
        };
        self.record(Recorded::BulkDelete {
            channel_id: channel_id.to_string(),
            requested: count,
            deleted,
        });
        Ok(deleted)
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> PlatformResult<Vec<ChannelMessage>> {
        let inner = self.inner.lock();
        let channel = inner
            .channels
            .get(channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;
        let end = match before {
            Some(id) => channel
                .history
                .iter()
                .position(|m| m.id == id)
                .unwrap_or(channel.history.len()),
            None => channel.history.len(),
        };
        let start = end.saturating_sub(limit as usize);
        Ok(channel.history[start..end].to_vec())
    }

    async fn add_role(&self, community_id: &str, member_id: &str, role_id: &str) -> PlatformResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.failing_roles.contains(role_id) {
                return Err(PlatformError::Rejected("Missing Permissions".to_string()));
            }
            if let Some(member) = inner
                .members
                .get_mut(&(community_id.to_string(), member_id.to_string()))
            {
                if !member.has_role(role_id) {
                    member.role_ids.push(role_id.to_string());
                }
            }
        }
        self.record(Recorded::AddRole {
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn remove_role(
        &self,
        community_id: &str,
        member_id: &str,
        role_id: &str,
    ) -> PlatformResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.failing_roles.contains(role_id) {
                return Err(PlatformError::Rejected("Missing Permissions".to_string()));
            }
            if let Some(member) = inner
                .members
                .get_mut(&(community_id.to_string(), member_id.to_string()))
            {
                member.role_ids.retain(|r| r != role_id);
            }
        }
        self.record(Recorded::RemoveRole {
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn create_channel(&self, community_id: &str, spec: ChannelSpec) -> PlatformResult<ChannelRef> {
        let id = self.next_id();
        self.add_channel(community_id, &id, &spec.name);
        {
            let mut inner = self.inner.lock();
            for overwrite in &spec.overwrites {
                for perm in &overwrite.allow {
                    inner.overwrites.insert(
                        (id.clone(), overwrite.subject.id().to_string(), *perm),
                        PermissionState::Allow,
                    );
                }
                for perm in &overwrite.deny {
                    inner.overwrites.insert(
                        (id.clone(), overwrite.subject.id().to_string(), *perm),
                        PermissionState::Deny,
                    );
                }
            }
        }
        let name = spec.name.clone();
        self.record(Recorded::CreateChannel { spec });
        Ok(ChannelRef { id, name })
    }

    async fn delete_channel(&self, channel_id: &str) -> PlatformResult<()> {
        if self.inner.lock().channels.remove(channel_id).is_none() {
            return Err(PlatformError::NotFound(format!("channel {}", channel_id)));
        }
        self.record(Recorded::DeleteChannel {
            channel_id: channel_id.to_string(),
        });
        Ok(())
    }

    async fn find_channel(&self, community_id: &str, name: &str) -> PlatformResult<Option<ChannelRef>> {
        Ok(self
            .inner
            .lock()
            .channels
            .iter()
            .find(|(_, c)| c.community_id == community_id && c.name == name)
            .map(|(id, c)| ChannelRef {
                id: id.clone(),
                name: c.name.clone(),
            }))
    }

    async fn channel_exists(&self, channel_id: &str) -> PlatformResult<bool> {
        {
            let mut inner = self.inner.lock();
            if inner.failing_channel_checks > 0 {
                inner.failing_channel_checks -= 1;
                return Err(PlatformError::Transport("connection reset".to_string()));
            }
        }
        Ok(self.has_channel(channel_id))
    }

    async fn set_permission_overwrite(
        &self,
        channel_id: &str,
        subject: &OverwriteSubject,
        permission: ChannelPermission,
        state: PermissionState,
    ) -> PlatformResult<()> {
        {
            let mut inner = self.inner.lock();
            let key = (channel_id.to_string(), subject.id().to_string(), permission);
            match state {
                PermissionState::Inherit => {
                    inner.overwrites.remove(&key);
                }
                other => {
                    inner.overwrites.insert(key, other);
                }
            }
        }
        self.record(Recorded::Overwrite {
            channel_id: channel_id.to_string(),
            subject: subject.clone(),
            permission,
            state,
        });
        Ok(())
    }

    async fn set_slowmode(&self, channel_id: &str, seconds: u32) -> PlatformResult<()> {
        self.record(Recorded::Slowmode {
            channel_id: channel_id.to_string(),
            seconds,
        });
        Ok(())
    }

    async fn kick_member(&self, community_id: &str, member_id: &str, _reason: &str) -> PlatformResult<()> {
        self.check_target(community_id, member_id)?;
        self.inner
            .lock()
            .members
            .remove(&(community_id.to_string(), member_id.to_string()));
        self.record(Recorded::Kick {
            member_id: member_id.to_string(),
        });
        Ok(())
    }

    async fn ban_member(
        &self,
        community_id: &str,
        user_id: &str,
        purge_days: u8,
        _reason: &str,
    ) -> PlatformResult<()> {
        if self.inner.lock().protected_members.contains(user_id) {
            return Err(PlatformError::Rejected("Missing Permissions".to_string()));
        }
        {
            let mut inner = self.inner.lock();
            inner
                .members
                .remove(&(community_id.to_string(), user_id.to_string()));
            inner
                .banned
                .insert((community_id.to_string(), user_id.to_string()));
        }
        self.record(Recorded::Ban {
            user_id: user_id.to_string(),
            purge_days,
        });
        Ok(())
    }

    async fn unban_member(&self, community_id: &str, user_id: &str, _reason: &str) -> PlatformResult<()> {
        let removed = self
            .inner
            .lock()
            .banned
            .remove(&(community_id.to_string(), user_id.to_string()));
        if !removed {
            return Err(PlatformError::NotFound(format!("ban for {}", user_id)));
        }
        self.record(Recorded::Unban {
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn set_timeout(
        &self,
        community_id: &str,
        member_id: &str,
        duration_ms: Option<i64>,
        _reason: &str,
    ) -> PlatformResult<()> {
        self.check_target(community_id, member_id)?;
        self.record(Recorded::Timeout {
            member_id: member_id.to_string(),
            duration_ms,
        });
        Ok(())
    }

    async fn fetch_member(&self, community_id: &str, user_id: &str) -> PlatformResult<Option<Member>> {
        Ok(self.member(community_id, user_id))
    }

    async fn fetch_community(&self, community_id: &str) -> PlatformResult<CommunityInfo> {
        let member_count = self
            .inner
            .lock()
            .members
            .keys()
            .filter(|(c, _)| c == community_id)
            .count() as u64;
        Ok(CommunityInfo {
            id: community_id.to_string(),
            name: format!("community-{}", community_id),
            owner_id: "owner".to_string(),
            member_count,
            created_at: None,
        })
    }

    async fn reply(&self, interaction: &InteractionRef, reply: Reply) -> PlatformResult<()> {
        self.record(Recorded::Reply {
            interaction_id: interaction.id.clone(),
            reply,
        });
        Ok(())
    }
}
