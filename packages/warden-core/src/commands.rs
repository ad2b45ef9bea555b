//! Slash-command surface.
//!
//! [`Command::parse`] turns a raw [`SlashCommandInvocation`] into a typed
//! command once, at the boundary. Option values are accepted in the shapes
//! the gateway shim may send them: plain strings and numbers, or resolved
//! objects carrying an `id` (and `name` for roles).

use serde_json::{Map, Value};

use crate::config::ConfigSlot;
use crate::error::{Error, Result};
use crate::events::SlashCommandInvocation;
use crate::role_panel::{RoleCandidate, MAX_CANDIDATES};

/// `/mod <subcommand>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModCommand {
    Warn { user_id: String, reason: Option<String> },
    Warnings { user_id: String },
    ClearWarnings { user_id: String },
    Kick { user_id: String, reason: Option<String> },
    Ban { user_id: String, purge_days: i64, reason: Option<String> },
    Unban { user_id: String, reason: Option<String> },
    Timeout { user_id: String, duration: String, reason: Option<String> },
    Untimeout { user_id: String },
    Purge { amount: i64 },
    Slowmode { seconds: i64 },
    Lock,
    Unlock,
}

/// `/setup <subcommand>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCommand {
    /// Set (or clear, when no value is given) a channel/role reference.
    Slot { slot: ConfigSlot, id: Option<String> },
    Prefix(String),
    AutoMod(bool),
    AntiLink(bool),
    AntiInvite(bool),
    AddWord(String),
    RemoveWord(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Dashboard,
    Mod(ModCommand),
    Setup(SetupCommand),
    Announce { channel_id: Option<String>, text: String },
    Suggest { text: String },
    TicketPanel { channel_id: Option<String> },
    TicketClose,
    RolePanel { title: String, roles: Vec<RoleCandidate> },
    ServerInfo,
    UserInfo { user_id: Option<String> },
    Help,
}

impl Command {
    pub fn parse(invocation: &SlashCommandInvocation) -> Result<Self> {
        let opts = Options(&invocation.options);
        let sub = invocation.subcommand.as_deref().unwrap_or_default();

        let command = match invocation.name.as_str() {
            "ping" => Command::Ping,
            "dashboard" => Command::Dashboard,
            "mod" => Command::Mod(parse_mod(sub, &opts)?),
            "setup" => Command::Setup(parse_setup(sub, &opts)?),
            "announce" => Command::Announce {
                channel_id: opts.id("channel"),
                text: opts.required_text("message")?,
            },
            "suggest" => Command::Suggest {
                text: opts.required_text("suggestion")?,
            },
            "ticketpanel" => Command::TicketPanel {
                channel_id: opts.id("channel"),
            },
            "ticketclose" => Command::TicketClose,
            "rolepanel" => Command::RolePanel {
                title: opts.text("title").unwrap_or_else(|| "Pick your roles".to_string()),
                roles: (1..=MAX_CANDIDATES)
                    .filter_map(|n| opts.role(&format!("role{}", n)))
                    .collect(),
            },
            "serverinfo" => Command::ServerInfo,
            "userinfo" => Command::UserInfo {
                user_id: opts.id("user"),
            },
            "help" => Command::Help,
            other => return Err(Error::Validation(format!("unknown command `/{}`", other))),
        };
        Ok(command)
    }

    /// Whether only staff may run this command.
    pub fn requires_staff(&self) -> bool {
        matches!(
            self,
            Command::Mod(_)
                | Command::Setup(_)
                | Command::Announce { .. }
                | Command::TicketPanel { .. }
                | Command::RolePanel { .. }
        )
    }

    /// `name` or `name sub`, for logs.
    pub fn label(&self) -> String {
        let sub = match self {
            Command::Mod(m) => match m {
                ModCommand::Warn { .. } => "warn",
                ModCommand::Warnings { .. } => "warnings",
                ModCommand::ClearWarnings { .. } => "clearwarnings",
                ModCommand::Kick { .. } => "kick",
                ModCommand::Ban { .. } => "ban",
                ModCommand::Unban { .. } => "unban",
                ModCommand::Timeout { .. } => "timeout",
                ModCommand::Untimeout { .. } => "untimeout",
                ModCommand::Purge { .. } => "purge",
                ModCommand::Slowmode { .. } => "slowmode",
                ModCommand::Lock => "lock",
                ModCommand::Unlock => "unlock",
            },
            _ => "",
        };
        let name = match self {
            Command::Ping => "ping",
            Command::Dashboard => "dashboard",
            Command::Mod(_) => "mod",
            Command::Setup(_) => "setup",
            Command::Announce { .. } => "announce",
            Command::Suggest { .. } => "suggest",
            Command::TicketPanel { .. } => "ticketpanel",
            Command::TicketClose => "ticketclose",
            Command::RolePanel { .. } => "rolepanel",
            Command::ServerInfo => "serverinfo",
            Command::UserInfo { .. } => "userinfo",
            Command::Help => "help",
        };
        if sub.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", name, sub)
        }
    }
}

fn parse_mod(sub: &str, opts: &Options<'_>) -> Result<ModCommand> {
    let cmd = match sub {
        "warn" => ModCommand::Warn {
            user_id: opts.required_id("user")?,
            reason: opts.text("reason"),
        },
        "warnings" => ModCommand::Warnings {
            user_id: opts.required_id("user")?,
        },
        "clearwarnings" => ModCommand::ClearWarnings {
            user_id: opts.required_id("user")?,
        },
        "kick" => ModCommand::Kick {
            user_id: opts.required_id("user")?,
            reason: opts.text("reason"),
        },
        "ban" => ModCommand::Ban {
            user_id: opts.required_id("user")?,
            purge_days: opts.int("days")?.unwrap_or(0),
            reason: opts.text("reason"),
        },
        "unban" => ModCommand::Unban {
            user_id: opts.required_id("user")?,
            reason: opts.text("reason"),
        },
        "timeout" => ModCommand::Timeout {
            user_id: opts.required_id("user")?,
            duration: opts.required_text("duration")?,
            reason: opts.text("reason"),
        },
        "untimeout" => ModCommand::Untimeout {
            user_id: opts.required_id("user")?,
        },
        "purge" => ModCommand::Purge {
            amount: opts.required_int("amount")?,
        },
        "slowmode" => ModCommand::Slowmode {
            seconds: opts.required_int("seconds")?,
        },
        "lock" => ModCommand::Lock,
        "unlock" => ModCommand::Unlock,
        other => return Err(Error::Validation(format!("unknown subcommand `/mod {}`", other))),
    };
    Ok(cmd)
}

fn parse_setup(sub: &str, opts: &Options<'_>) -> Result<SetupCommand> {
    let slot = |slot: ConfigSlot| {
        let key = if slot.is_role() { "role" } else { "channel" };
        SetupCommand::Slot {
            slot,
            id: opts.id(key),
        }
    };
    let cmd = match sub {
        "log" => slot(ConfigSlot::ModLogChannel),
        "welcome" => slot(ConfigSlot::WelcomeChannel),
        "leave" => slot(ConfigSlot::LeaveChannel),
        "suggestions" => slot(ConfigSlot::SuggestionChannel),
        "ticketcategory" => slot(ConfigSlot::TicketCategory),
        "staffrole" => slot(ConfigSlot::StaffRole),
        "autorole" => slot(ConfigSlot::AutoRole),
        "mutedrole" => slot(ConfigSlot::MutedRole),
        "prefix" => {
            let prefix = opts.required_text("prefix")?;
            if prefix.chars().count() > 5 || prefix.chars().any(char::is_whitespace) {
                return Err(Error::Validation(
                    "prefix must be 1-5 characters without spaces".to_string(),
                ));
            }
            SetupCommand::Prefix(prefix)
        }
        "automod" => SetupCommand::AutoMod(opts.required_bool("enabled")?),
        "antilink" => SetupCommand::AntiLink(opts.required_bool("enabled")?),
        "antiinvite" => SetupCommand::AntiInvite(opts.required_bool("enabled")?),
        "addword" => SetupCommand::AddWord(opts.required_text("word")?),
        "removeword" => SetupCommand::RemoveWord(opts.required_text("word")?),
        other => return Err(Error::Validation(format!("unknown subcommand `/setup {}`", other))),
    };
    Ok(cmd)
}

// ── Option access ────────────────────────────────────────────────────────────

struct Options<'a>(&'a Map<String, Value>);

impl Options<'_> {
    fn missing(name: &str) -> Error {
        Error::Validation(format!("missing option `{}`", name))
    }

    /// Non-blank text.
    fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn required_text(&self, name: &str) -> Result<String> {
        self.text(name).ok_or_else(|| Self::missing(name))
    }

    /// A user/channel/role reference: a bare ID, a mention, or an object
    /// with an `id` field.
    fn id(&self, name: &str) -> Option<String> {
        let raw = match self.0.get(name)? {
            Value::Object(obj) => match obj.get("id")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            },
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let id = raw
            .trim()
            .trim_start_matches("<@&")
            .trim_start_matches("<@!")
            .trim_start_matches("<@")
            .trim_start_matches("<#")
            .trim_end_matches('>')
            .to_string();
        (!id.is_empty()).then_some(id)
    }

    fn required_id(&self, name: &str) -> Result<String> {
        self.id(name).ok_or_else(|| Self::missing(name))
    }

    fn role(&self, name: &str) -> Option<RoleCandidate> {
        let id = self.id(name)?;
        let label = match self.0.get(name) {
            Some(Value::Object(obj)) => obj
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            _ => id.clone(),
        };
        Some(RoleCandidate::new(id, label))
    }

    fn int(&self, name: &str) -> Result<Option<i64>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| Error::Validation(format!("`{}` must be a whole number", name))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| Error::Validation(format!("`{}` must be a whole number", name))),
            Some(_) => Err(Error::Validation(format!("`{}` must be a whole number", name))),
        }
    }

    fn required_int(&self, name: &str) -> Result<i64> {
        self.int(name)?.ok_or_else(|| Self::missing(name))
    }

    fn required_bool(&self, name: &str) -> Result<bool> {
        match self.0.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" => Ok(true),
                "false" | "off" | "no" => Ok(false),
                _ => Err(Error::Validation(format!("`{}` must be on or off", name))),
            },
            Some(_) => Err(Error::Validation(format!("`{}` must be on or off", name))),
            None => Err(Self::missing(name)),
        }
    }
}
