//! Discord REST API v10 binding for the [`Platform`] trait.
//!
//! Every call authenticates with `Authorization: Bot <token>`. Moderation
//! reasons travel in the URL-encoded `X-Audit-Log-Reason` header. Nothing
//! here retries; failures map onto [`PlatformError`] and the caller decides.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use warden_core::platform::{
    ButtonStyle, ChannelMessage, ChannelPermission, ChannelRef, ChannelSpec, CommunityInfo,
    Component, Embed, InteractionRef, Member, OutboundMessage, OverwriteSubject, PermissionState,
    Platform, PlatformError, PlatformResult, Reply,
};
use warden_core::time::{format_millis, now_millis};

/// Public API base.
pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Snowflake timestamps count from 2015-01-01.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

const ADMINISTRATOR: u64 = 1 << 3;
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Bulk delete refuses messages older than this.
const BULK_DELETE_MAX_AGE_MS: i64 = 14 * 24 * 3600 * 1000;

const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

// ── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: Option<RawUser>,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    joined_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    id: String,
    #[serde(default)]
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct RawGuild {
    id: String,
    name: String,
    owner_id: String,
    #[serde(default)]
    roles: Vec<RawRole>,
    #[serde(default)]
    approximate_member_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOverwrite {
    id: String,
    #[serde(default)]
    allow: String,
    #[serde(default)]
    deny: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<RawOverwrite>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    author: RawUser,
    #[serde(default)]
    content: String,
    timestamp: String,
}

// ── Conversions ──────────────────────────────────────────────────────────────

/// Creation time encoded in a snowflake ID.
fn snowflake_millis(id: &str) -> Option<i64> {
    id.parse::<u64>()
        .ok()
        .map(|raw| (raw >> 22) as i64 + DISCORD_EPOCH_MS)
}

fn parse_timestamp(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.timestamp_millis())
}

/// Message history path; `before` pages towards older messages.
fn messages_path(channel_id: &str, before: Option<&str>, limit: u8) -> String {
    let limit = limit.clamp(1, 100);
    match before {
        Some(id) => format!("/channels/{}/messages?limit={}&before={}", channel_id, limit, id),
        None => format!("/channels/{}/messages?limit={}", channel_id, limit),
    }
}

fn parse_bits(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}

fn embed_json(embed: &Embed) -> Value {
    let mut value = json!({
        "fields": embed.fields.iter().map(|f| json!({
            "name": f.name,
            "value": f.value,
            "inline": f.inline,
        })).collect::<Vec<_>>(),
    });
    if let Some(title) = &embed.title {
        value["title"] = json!(title);
    }
    if let Some(description) = &embed.description {
        value["description"] = json!(description);
    }
    if let Some(color) = embed.color {
        value["color"] = json!(color);
    }
    if let Some(footer) = &embed.footer {
        value["footer"] = json!({ "text": footer });
    }
    if let Some(ts) = embed.timestamp {
        value["timestamp"] = json!(format_millis(ts));
    }
    value
}

/// One action row per component; select menus may not share a row.
fn component_row(component: &Component) -> Value {
    let inner = match component {
        Component::Button {
            custom_id,
            label,
            style,
        } => json!({
            "type": 2,
            "style": match style {
                ButtonStyle::Primary => 1,
                ButtonStyle::Secondary => 2,
                ButtonStyle::Danger => 4,
            },
            "label": label,
            "custom_id": custom_id,
        }),
        Component::SelectMenu {
            custom_id,
            placeholder,
            options,
            min_values,
            max_values,
        } => json!({
            "type": 3,
            "custom_id": custom_id,
            "placeholder": placeholder,
            "min_values": min_values,
            "max_values": max_values,
            "options": options.iter().map(|o| json!({
                "label": o.label,
                "value": o.value,
            })).collect::<Vec<_>>(),
        }),
    };
    json!({ "type": 1, "components": [inner] })
}

fn message_body(message: &OutboundMessage) -> Value {
    let mut body = json!({
        "embeds": message.embeds.iter().map(embed_json).collect::<Vec<_>>(),
        "components": message.components.iter().map(component_row).collect::<Vec<_>>(),
        "allowed_mentions": { "parse": ["users"] },
    });
    if let Some(content) = &message.content {
        body["content"] = json!(content);
    }
    body
}

/// Apply one tri-state permission to an overwrite's allow/deny bitsets.
fn merge_overwrite(allow: u64, deny: u64, bit: u64, state: PermissionState) -> (u64, u64) {
    match state {
        PermissionState::Allow => (allow | bit, deny & !bit),
        PermissionState::Deny => (allow & !bit, deny | bit),
        PermissionState::Inherit => (allow & !bit, deny & !bit),
    }
}

fn overwrite_type(subject: &OverwriteSubject) -> u8 {
    match subject {
        OverwriteSubject::Role(_) => 0,
        OverwriteSubject::Member(_) => 1,
    }
}

fn to_member(raw: RawMember, guild: &RawGuild) -> Option<Member> {
    let user = raw.user?;
    let is_administrator = user.id == guild.owner_id
        || guild.roles.iter().any(|role| {
            (role.id == guild.id || raw.roles.contains(&role.id))
                && parse_bits(&role.permissions) & ADMINISTRATOR != 0
        });
    Some(Member {
        display_name: raw
            .nick
            .or(user.global_name)
            .unwrap_or_else(|| user.username.clone()),
        created_at: snowflake_millis(&user.id),
        joined_at: raw.joined_at.as_deref().and_then(parse_timestamp),
        is_bot: user.bot.unwrap_or(false),
        role_ids: raw.roles,
        is_administrator,
        id: user.id,
    })
}

fn error_for(status: StatusCode, path: &str, body: &str) -> PlatformError {
    if status == StatusCode::NOT_FOUND {
        return PlatformError::NotFound(path.to_string());
    }
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    PlatformError::Rejected(message)
}

// ── Client ───────────────────────────────────────────────────────────────────

/// [`Platform`] over the Discord REST API.
pub struct DiscordPlatform {
    client: Client,
    api_url: String,
    token: String,
    bot_id: String,
    /// Last request round trip; 0 until the first request.
    latency_ms: AtomicU64,
}

impl DiscordPlatform {
    /// Resolve the bot's own user and return a ready client.
    pub async fn connect(api_url: &str, token: &str) -> PlatformResult<Self> {
        let mut platform = Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            bot_id: String::new(),
            latency_ms: AtomicU64::new(0),
        };
        let me: RawUser = platform.get("/users/@me").await?;
        tracing::info!(bot_id = me.id.as_str(), username = me.username.as_str(), "Connected to Discord");
        platform.bot_id = me.id;
        Ok(platform)
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        reason: Option<&str>,
    ) -> PlatformResult<Option<Value>> {
        let mut request = self
            .client
            .request(method.clone(), format!("{}{}", self.api_url, path))
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(reason) = reason {
            request = request.header("X-Audit-Log-Reason", urlencoding::encode(reason).into_owned());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        self.latency_ms
            .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|e| PlatformError::Transport(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(method = %method, path = path, status = %status, "Discord request failed");
        Err(error_for(status, path, &body))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let value = self
            .call(Method::GET, path, None, None)
            .await?
            .unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| PlatformError::Transport(format!("unexpected response from {}: {}", path, e)))
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>, reason: Option<&str>) -> PlatformResult<()> {
        self.call(method, path, body, reason).await.map(|_| ())
    }

    async fn recent(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> PlatformResult<Vec<RawMessage>> {
        self.get(&messages_path(channel_id, before, limit)).await
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    fn bot_user_id(&self) -> String {
        self.bot_id.clone()
    }

    fn latency_ms(&self) -> Option<u64> {
        match self.latency_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    async fn send_message(&self, channel_id: &str, message: OutboundMessage) -> PlatformResult<String> {
        let value = self
            .call(
                Method::POST,
                &format!("/channels/{}/messages", channel_id),
                Some(message_body(&message)),
                None,
            )
            .await?
            .unwrap_or(Value::Null);
        value["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Transport("message created without an id".to_string()))
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<()> {
        self.send(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            None,
            None,
        )
        .await
    }

    async fn bulk_delete_messages(&self, channel_id: &str, count: u8) -> PlatformResult<usize> {
        let cutoff = now_millis() - BULK_DELETE_MAX_AGE_MS;
        let ids: Vec<String> = self
            .recent(channel_id, None, count)
            .await?
            .into_iter()
            .filter(|m| snowflake_millis(&m.id).map(|t| t > cutoff).unwrap_or(false))
            .map(|m| m.id)
            .collect();

        match ids.len() {
            0 => Ok(0),
            1 => {
                self.delete_message(channel_id, &ids[0]).await?;
                Ok(1)
            }
            n => {
                self.send(
                    Method::POST,
                    &format!("/channels/{}/messages/bulk-delete", channel_id),
                    Some(json!({ "messages": ids })),
                    None,
                )
                .await?;
                Ok(n)
            }
        }
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> PlatformResult<Vec<ChannelMessage>> {
        let mut messages: Vec<ChannelMessage> = self
            .recent(channel_id, before, limit)
            .await?
            .into_iter()
            .map(|m| ChannelMessage {
                timestamp: parse_timestamp(&m.timestamp).unwrap_or_default(),
                author_name: m.author.global_name.unwrap_or(m.author.username),
                author_id: m.author.id,
                channel_id: channel_id.to_string(),
                content: m.content,
                id: m.id,
            })
            .collect();
        // The API returns newest first.
        messages.reverse();
        Ok(messages)
    }

    async fn add_role(&self, community_id: &str, member_id: &str, role_id: &str) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/guilds/{}/members/{}/roles/{}", community_id, member_id, role_id),
            None,
            None,
        )
        .await
    }

    async fn remove_role(
        &self,
        community_id: &str,
        member_id: &str,
        role_id: &str,
    ) -> PlatformResult<()> {
        self.send(
            Method::DELETE,
            &format!("/guilds/{}/members/{}/roles/{}", community_id, member_id, role_id),
            None,
            None,
        )
        .await
    }

    async fn create_channel(&self, community_id: &str, spec: ChannelSpec) -> PlatformResult<ChannelRef> {
        let overwrites: Vec<Value> = spec
            .overwrites
            .iter()
            .map(|o| {
                json!({
                    "id": o.subject.id(),
                    "type": overwrite_type(&o.subject),
                    "allow": ChannelPermission::combine(&o.allow).to_string(),
                    "deny": ChannelPermission::combine(&o.deny).to_string(),
                })
            })
            .collect();
        let mut body = json!({
            "name": spec.name,
            "type": 0,
            "permission_overwrites": overwrites,
        });
        if let Some(parent) = &spec.parent_id {
            body["parent_id"] = json!(parent);
        }
        if let Some(topic) = &spec.topic {
            body["topic"] = json!(topic);
        }

        let value = self
            .call(
                Method::POST,
                &format!("/guilds/{}/channels", community_id),
                Some(body),
                None,
            )
            .await?
            .unwrap_or(Value::Null);
        let channel: RawChannel = serde_json::from_value(value)
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        Ok(ChannelRef {
            name: channel.name.unwrap_or(spec.name),
            id: channel.id,
        })
    }

    async fn delete_channel(&self, channel_id: &str) -> PlatformResult<()> {
        self.send(Method::DELETE, &format!("/channels/{}", channel_id), None, None)
            .await
    }

    async fn find_channel(&self, community_id: &str, name: &str) -> PlatformResult<Option<ChannelRef>> {
        let channels: Vec<RawChannel> = self
            .get(&format!("/guilds/{}/channels", community_id))
            .await?;
        Ok(channels.into_iter().find_map(|c| match c.name {
            Some(n) if n == name => Some(ChannelRef { id: c.id, name: n }),
            _ => None,
        }))
    }

    async fn channel_exists(&self, channel_id: &str) -> PlatformResult<bool> {
        match self.get::<RawChannel>(&format!("/channels/{}", channel_id)).await {
            Ok(_) => Ok(true),
            Err(PlatformError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn set_permission_overwrite(
        &self,
        channel_id: &str,
        subject: &OverwriteSubject,
        permission: ChannelPermission,
        state: PermissionState,
    ) -> PlatformResult<()> {
        // Overwrites are whole allow/deny pairs; read the current one first.
        let channel: RawChannel = self.get(&format!("/channels/{}", channel_id)).await?;
        let (allow, deny) = channel
            .permission_overwrites
            .iter()
            .find(|o| o.id == subject.id())
            .map(|o| (parse_bits(&o.allow), parse_bits(&o.deny)))
            .unwrap_or((0, 0));
        let (allow, deny) = merge_overwrite(allow, deny, permission.bits(), state);

        let path = format!("/channels/{}/permissions/{}", channel_id, subject.id());
        if allow == 0 && deny == 0 {
            return match self.send(Method::DELETE, &path, None, None).await {
                Err(PlatformError::NotFound(_)) => Ok(()),
                other => other,
            };
        }
        self.send(
            Method::PUT,
            &path,
            Some(json!({
                "type": overwrite_type(subject),
                "allow": allow.to_string(),
                "deny": deny.to_string(),
            })),
            None,
        )
        .await
    }

    async fn set_slowmode(&self, channel_id: &str, seconds: u32) -> PlatformResult<()> {
        self.send(
            Method::PATCH,
            &format!("/channels/{}", channel_id),
            Some(json!({ "rate_limit_per_user": seconds })),
            None,
        )
        .await
    }

    async fn kick_member(&self, community_id: &str, member_id: &str, reason: &str) -> PlatformResult<()> {
        self.send(
            Method::DELETE,
            &format!("/guilds/{}/members/{}", community_id, member_id),
            None,
            Some(reason),
        )
        .await
    }

    async fn ban_member(
        &self,
        community_id: &str,
        user_id: &str,
        purge_days: u8,
        reason: &str,
    ) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/guilds/{}/bans/{}", community_id, user_id),
            Some(json!({ "delete_message_seconds": purge_days as u64 * 86_400 })),
            Some(reason),
        )
        .await
    }

    async fn unban_member(&self, community_id: &str, user_id: &str, reason: &str) -> PlatformResult<()> {
        self.send(
            Method::DELETE,
            &format!("/guilds/{}/bans/{}", community_id, user_id),
            None,
            Some(reason),
        )
        .await
    }

    async fn set_timeout(
        &self,
        community_id: &str,
        member_id: &str,
        duration_ms: Option<i64>,
        reason: &str,
    ) -> PlatformResult<()> {
        let until = duration_ms.map(|ms| format_millis(now_millis() + ms));
        self.send(
            Method::PATCH,
            &format!("/guilds/{}/members/{}", community_id, member_id),
            Some(json!({ "communication_disabled_until": until })),
            Some(reason),
        )
        .await
    }

    async fn fetch_member(&self, community_id: &str, user_id: &str) -> PlatformResult<Option<Member>> {
        let raw: RawMember = match self
            .get(&format!("/guilds/{}/members/{}", community_id, user_id))
            .await
        {
            Ok(raw) => raw,
            Err(PlatformError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let guild: RawGuild = self.get(&format!("/guilds/{}", community_id)).await?;
        Ok(to_member(raw, &guild))
    }

    async fn fetch_community(&self, community_id: &str) -> PlatformResult<CommunityInfo> {
        let guild: RawGuild = self
            .get(&format!("/guilds/{}?with_counts=true", community_id))
            .await?;
        Ok(CommunityInfo {
            created_at: snowflake_millis(&guild.id),
            member_count: guild.approximate_member_count.unwrap_or(0),
            id: guild.id,
            name: guild.name,
            owner_id: guild.owner_id,
        })
    }

    async fn reply(&self, interaction: &InteractionRef, reply: Reply) -> PlatformResult<()> {
        let mut data = message_body(&reply.message);
        if reply.ephemeral {
            data["flags"] = json!(EPHEMERAL_FLAG);
        }
        self.send(
            Method::POST,
            &format!("/interactions/{}/{}/callback", interaction.id, interaction.token),
            Some(json!({ "type": CHANNEL_MESSAGE_WITH_SOURCE, "data": data })),
            None,
        )
        .await
    }
}
