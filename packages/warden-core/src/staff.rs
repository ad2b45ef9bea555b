//! The single staff/non-staff distinction.

use crate::config::CommunityConfig;
use crate::platform::Member;

/// A member is staff when they hold the administrator capability or the
/// community's configured staff role.
pub fn is_staff(member: &Member, config: &CommunityConfig) -> bool {
    member.is_administrator
        || config
            .staff_role_id
            .as_deref()
            .map_or(false, |role| member.has_role(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(roles: &[&str], admin: bool) -> Member {
        Member {
            id: "u1".into(),
            display_name: "u1".into(),
            role_ids: roles.iter().map(|r| r.to_string()).collect(),
            is_administrator: admin,
            is_bot: false,
            joined_at: None,
            created_at: None,
        }
    }

    #[test]
    fn test_administrator_is_staff() {
        let cfg = CommunityConfig::default();
        assert!(is_staff(&member(&[], true), &cfg));
    }

    #[test]
    fn test_staff_role_is_staff() {
        let mut cfg = CommunityConfig::default();
        assert!(!is_staff(&member(&["mods"], false), &cfg));
        cfg.staff_role_id = Some("mods".into());
        assert!(is_staff(&member(&["mods"], false), &cfg));
        assert!(!is_staff(&member(&["other"], false), &cfg));
    }
}
