//! # Moderation
//!
//! Staff-gated moderation actions and warning history.
//!
//! Every operation first checks that the invoker is staff (see
//! [`crate::staff::is_staff`]) and validates its input. Nothing is mutated
//! and no platform call is made when either check fails.

use std::sync::Arc;

use crate::config::{CommunityConfig, ConfigStore, WarningRecord};
use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::platform::{ChannelPermission, Member, OverwriteSubject, PermissionState, Platform};
use crate::staff::is_staff;

/// Upper bound for ban message purging, in days.
pub const MAX_BAN_PURGE_DAYS: i64 = 7;

/// Bulk delete bounds.
pub const MIN_PURGE: i64 = 1;
pub const MAX_PURGE: i64 = 100;

/// Longest slowmode the platform accepts (6 hours).
pub const MAX_SLOWMODE_SECS: i64 = 21_600;

/// Reason used when the invoker gave none.
pub const DEFAULT_REASON: &str = "No reason given";

/// Executes moderation commands for any community.
#[derive(Clone)]
pub struct ModerationHandler {
    store: ConfigStore,
    platform: Arc<dyn Platform>,
}

impl ModerationHandler {
    pub fn new(store: ConfigStore, platform: Arc<dyn Platform>) -> Self {
        Self { store, platform }
    }

    /// Load the community config and require staff. Returns the config so
    /// callers do not read it twice.
    fn require_staff(&self, community_id: &str, invoker: &Member) -> Result<CommunityConfig> {
        let config = self.store.get(community_id);
        if !is_staff(invoker, &config) {
            return Err(Error::PermissionDenied(
                "this command is for staff only".to_string(),
            ));
        }
        Ok(config)
    }

    async fn resolve_member(&self, community_id: &str, user_id: &str) -> Result<Member> {
        self.platform
            .fetch_member(community_id, user_id)
            .await?
            .ok_or_else(|| Error::TargetNotFound(format!("member {}", user_id)))
    }

    // ── Warnings ─────────────────────────────────────────────────────────

    /// Record a warning; returns the user's total warning count.
    ///
    /// Warnings are keyed by user ID, so users who already left can still
    /// be warned.
    pub async fn warn(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
        reason: Option<&str>,
        now: i64,
    ) -> Result<usize> {
        self.require_staff(community_id, invoker)?;

        let record = WarningRecord {
            reason: reason.unwrap_or(DEFAULT_REASON).to_string(),
            issuer_id: invoker.id.clone(),
            timestamp: now,
        };
        let count = self.store.update(community_id, |cfg| {
            let list = cfg.warnings.entry(target_id.to_string()).or_default();
            list.push(record);
            list.len()
        })?;

        tracing::info!(
            community_id = community_id,
            target_id = target_id,
            issuer_id = invoker.id.as_str(),
            count = count,
            "Member warned"
        );
        Ok(count)
    }

    /// The most recent warnings of a member, numbered from 1.
    pub fn list_warnings(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
    ) -> Result<Vec<(usize, WarningRecord)>> {
        let config = self.require_staff(community_id, invoker)?;
        Ok(config.recent_warnings(target_id))
    }

    /// Drop all warnings of a member; returns how many were removed.
    pub fn clear_warnings(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
    ) -> Result<usize> {
        let config = self.require_staff(community_id, invoker)?;
        if config.warnings_for(target_id).is_empty() {
            return Ok(0);
        }
        let removed = self.store.update(community_id, |cfg| {
            cfg.warnings.remove(target_id).map(|l| l.len()).unwrap_or(0)
        })?;
        tracing::info!(community_id = community_id, target_id = target_id, removed = removed, "Warnings cleared");
        Ok(removed)
    }

    // ── Member actions ───────────────────────────────────────────────────

    pub async fn kick(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.require_staff(community_id, invoker)?;
        self.resolve_member(community_id, target_id).await?;
        self.platform
            .kick_member(community_id, target_id, reason.unwrap_or(DEFAULT_REASON))
            .await?;
        tracing::info!(community_id = community_id, target_id = target_id, "Member kicked");
        Ok(())
    }

    /// Ban a user, purging `purge_days` (0..=7) of their messages. The user
    /// does not need to be a current member.
    pub async fn ban(
        &self,
        community_id: &str,
        invoker: &Member,
        user_id: &str,
        purge_days: i64,
        reason: Option<&str>,
    ) -> Result<()> {
        self.require_staff(community_id, invoker)?;
        if !(0..=MAX_BAN_PURGE_DAYS).contains(&purge_days) {
            return Err(Error::Validation(format!(
                "purge days must be between 0 and {}",
                MAX_BAN_PURGE_DAYS
            )));
        }
        self.platform
            .ban_member(
                community_id,
                user_id,
                purge_days as u8,
                reason.unwrap_or(DEFAULT_REASON),
            )
            .await?;
        tracing::info!(community_id = community_id, user_id = user_id, purge_days = purge_days, "User banned");
        Ok(())
    }

    pub async fn unban(
        &self,
        community_id: &str,
        invoker: &Member,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.require_staff(community_id, invoker)?;
        self.platform
            .unban_member(community_id, user_id, reason.unwrap_or(DEFAULT_REASON))
            .await?;
        tracing::info!(community_id = community_id, user_id = user_id, "User unbanned");
        Ok(())
    }

    /// Time a member out for a duration like `10m`; returns the duration in
    /// milliseconds.
    pub async fn timeout(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
        duration: &str,
        reason: Option<&str>,
    ) -> Result<i64> {
        self.require_staff(community_id, invoker)?;
        let millis = parse_duration(duration)?;
        self.resolve_member(community_id, target_id).await?;
        self.platform
            .set_timeout(
                community_id,
                target_id,
                Some(millis),
                reason.unwrap_or(DEFAULT_REASON),
            )
            .await?;
        tracing::info!(community_id = community_id, target_id = target_id, duration_ms = millis, "Member timed out");
        Ok(millis)
    }

    pub async fn remove_timeout(
        &self,
        community_id: &str,
        invoker: &Member,
        target_id: &str,
    ) -> Result<()> {
        self.require_staff(community_id, invoker)?;
        self.resolve_member(community_id, target_id).await?;
        self.platform
            .set_timeout(community_id, target_id, None, "Timeout removed")
            .await?;
        tracing::info!(community_id = community_id, target_id = target_id, "Timeout removed");
        Ok(())
    }

    // ── Channel actions ──────────────────────────────────────────────────

    /// Bulk delete up to `amount` (1..=100) recent messages; returns how many
    /// were actually deleted, which may be fewer.
    pub async fn purge(
        &self,
        community_id: &str,
        invoker: &Member,
        channel_id: &str,
        amount: i64,
    ) -> Result<usize> {
        self.require_staff(community_id, invoker)?;
        if !(MIN_PURGE..=MAX_PURGE).contains(&amount) {
            return Err(Error::Validation(format!(
                "amount must be between {} and {}",
                MIN_PURGE, MAX_PURGE
            )));
        }
        let deleted = self
            .platform
            .bulk_delete_messages(channel_id, amount as u8)
            .await?;
        tracing::info!(channel_id = channel_id, requested = amount, deleted = deleted, "Messages purged");
        Ok(deleted)
    }

    pub async fn set_slowmode(
        &self,
        community_id: &str,
        invoker: &Member,
        channel_id: &str,
        seconds: i64,
    ) -> Result<u32> {
        self.require_staff(community_id, invoker)?;
        if !(0..=MAX_SLOWMODE_SECS).contains(&seconds) {
            return Err(Error::Validation(format!(
                "slowmode must be between 0 and {} seconds",
                MAX_SLOWMODE_SECS
            )));
        }
        let seconds = seconds as u32;
        self.platform.set_slowmode(channel_id, seconds).await?;
        Ok(seconds)
    }

    /// Deny SendMessages to the default role.
    pub async fn lock(&self, community_id: &str, invoker: &Member, channel_id: &str) -> Result<()> {
        self.set_everyone_send(community_id, invoker, channel_id, PermissionState::Deny)
            .await
    }

    /// Reset the default role's SendMessages overwrite to inherit.
    pub async fn unlock(&self, community_id: &str, invoker: &Member, channel_id: &str) -> Result<()> {
        self.set_everyone_send(community_id, invoker, channel_id, PermissionState::Inherit)
            .await
    }

    async fn set_everyone_send(
        &self,
        community_id: &str,
        invoker: &Member,
        channel_id: &str,
        state: PermissionState,
    ) -> Result<()> {
        self.require_staff(community_id, invoker)?;
        self.platform
            .set_permission_overwrite(
                channel_id,
                &OverwriteSubject::everyone(community_id),
                ChannelPermission::SendMessages,
                state,
            )
            .await?;
        tracing::info!(channel_id = channel_id, state = ?state, "Channel send permission changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryPlatform, Recorded};

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

    fn setup() -> (ModerationHandler, Arc<MemoryPlatform>, ConfigStore, Member) {
        let platform = Arc::new(MemoryPlatform::new());
        let store = ConfigStore::in_memory();
        let admin = member("admin", true);
        platform.add_member("g1", admin.clone());
        platform.add_member("g1", member("u1", false));
        let handler = ModerationHandler::new(store.clone(), platform.clone());
        (handler, platform, store, admin)
    }

    #[tokio::test]
    async fn test_warn_appends_and_counts() {
        let (handler, _platform, store, admin) = setup();
        assert_eq!(handler.warn("g1", &admin, "u1", Some("rude"), 1).await.unwrap(), 1);
        assert_eq!(handler.warn("g1", &admin, "u1", None, 2).await.unwrap(), 2);

        let cfg = store.get("g1");
        let list = cfg.warnings_for("u1");
        assert_eq!(list[0].reason, "rude");
        assert_eq!(list[1].reason, DEFAULT_REASON);
        assert_eq!(list[1].issuer_id, "admin");
    }

    #[tokio::test]
    async fn test_warn_user_who_left() {
        let (handler, platform, store, admin) = setup();
        assert_eq!(
            handler.warn("g1", &admin, "departed", Some("spam"), 1).await.unwrap(),
            1
        );
        assert_eq!(store.get("g1").warnings_for("departed")[0].reason, "spam");
        assert!(platform.log().is_empty());
    }

    #[tokio::test]
    async fn test_non_staff_is_denied_without_mutation() {
        let (handler, platform, store, _admin) = setup();
        let plain = member("u1", false);

        let err = handler.warn("g1", &plain, "u1", None, 1).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(store.get("g1").warnings.is_empty());

        let err = handler.kick("g1", &plain, "u1", None).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(platform.log().is_empty());
    }

    #[tokio::test]
    async fn test_staff_role_grants_access() {
        let (handler, _platform, store, _admin) = setup();
        store.update("g1", |cfg| cfg.staff_role_id = Some("mods".into())).unwrap();
        let mut moderator = member("m1", false);
        moderator.role_ids.push("mods".into());

        assert_eq!(handler.warn("g1", &moderator, "u1", None, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_warnings_last_fifteen() {
        let (handler, _platform, store, admin) = setup();
        store
            .update("g1", |cfg| {
                cfg.warnings.insert(
                    "u1".into(),
                    (1..=20)
                        .map(|n| WarningRecord {
                            reason: format!("R{}", n),
                            issuer_id: "admin".into(),
                            timestamp: n,
                        })
                        .collect(),
                );
            })
            .unwrap();

        let list = handler.list_warnings("g1", &admin, "u1").unwrap();
        assert_eq!(list.len(), 15);
        assert_eq!((list[0].0, list[0].1.reason.as_str()), (1, "R6"));
        assert_eq!((list[14].0, list[14].1.reason.as_str()), (15, "R20"));
    }

    #[tokio::test]
    async fn test_clear_warnings_idempotent() {
        let (handler, _platform, store, admin) = setup();
        assert_eq!(handler.clear_warnings("g1", &admin, "u1").unwrap(), 0);

        handler.warn("g1", &admin, "u1", None, 1).await.unwrap();
        handler.warn("g1", &admin, "u1", None, 2).await.unwrap();
        assert_eq!(handler.clear_warnings("g1", &admin, "u1").unwrap(), 2);
        assert!(!store.get("g1").warnings.contains_key("u1"));
        assert_eq!(handler.clear_warnings("g1", &admin, "u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_kick_unknown_member() {
        let (handler, _platform, _store, admin) = setup();
        let err = handler.kick("g1", &admin, "ghost", None).await.unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn test_kick_rejected_by_platform() {
        let (handler, platform, _store, admin) = setup();
        platform.protect_member("u1");
        let err = handler.kick("g1", &admin, "u1", None).await.unwrap_err();
        assert_eq!(err, Error::ExternalActionFailed("Missing Permissions".into()));
    }

    #[tokio::test]
    async fn test_ban_validates_purge_days() {
        let (handler, platform, _store, admin) = setup();
        let err = handler.ban("g1", &admin, "u1", 8, None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!platform.is_banned("g1", "u1"));

        handler.ban("g1", &admin, "u1", 7, None).await.unwrap();
        assert!(platform.is_banned("g1", "u1"));
        handler.unban("g1", &admin, "u1", None).await.unwrap();
        assert!(!platform.is_banned("g1", "u1"));
    }

    #[tokio::test]
    async fn test_timeout_parses_duration() {
        let (handler, platform, _store, admin) = setup();
        assert_eq!(
            handler.timeout("g1", &admin, "u1", "10m", None).await.unwrap(),
            600_000
        );
        let err = handler.timeout("g1", &admin, "u1", "29d", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        handler.remove_timeout("g1", &admin, "u1").await.unwrap();
        let timeouts: Vec<Option<i64>> = platform
            .log()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Timeout { duration_ms, .. } => Some(duration_ms),
                _ => None,
            })
            .collect();
        assert_eq!(timeouts, vec![Some(600_000), None]);
    }

    #[tokio::test]
    async fn test_purge_fewer_than_requested() {
        let (handler, platform, _store, admin) = setup();
        platform.add_channel("g1", "c1", "general");
        for i in 0..30 {
            platform.push_history("c1", "u1", &format!("msg {}", i), i);
        }
        assert_eq!(handler.purge("g1", &admin, "c1", 100).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_purge_bounds() {
        let (handler, _platform, _store, admin) = setup();
        for amount in [0, 101] {
            let err = handler.purge("g1", &admin, "c1", amount).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_slowmode_bounds() {
        let (handler, _platform, _store, admin) = setup();
        assert_eq!(handler.set_slowmode("g1", &admin, "c1", 0).await.unwrap(), 0);
        assert_eq!(handler.set_slowmode("g1", &admin, "c1", 21_600).await.unwrap(), 21_600);
        assert!(handler.set_slowmode("g1", &admin, "c1", 21_601).await.is_err());
    }

    #[tokio::test]
    async fn test_lock_then_unlock_resets_to_inherit() {
        let (handler, platform, _store, admin) = setup();
        platform.add_channel("g1", "c1", "general");

        handler.lock("g1", &admin, "c1").await.unwrap();
        assert_eq!(
            platform.overwrite("c1", "g1", ChannelPermission::SendMessages),
            Some(PermissionState::Deny)
        );

        handler.unlock("g1", &admin, "c1").await.unwrap();
        // Inherit, never an explicit allow.
        assert_eq!(platform.overwrite("c1", "g1", ChannelPermission::SendMessages), None);
    }
}
