//! Self-service role selection menus.
//!
//! A panel is stateless once posted: the candidate roles travel in the menu
//! options and the platform echoes them back with every selection.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::CustomId;
use crate::platform::{Component, Embed, Member, OutboundMessage, Platform, SelectOption};

/// Most roles one panel may offer.
pub const MAX_CANDIDATES: usize = 5;

/// A role offered on a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCandidate {
    pub role_id: String,
    pub label: String,
}

impl RoleCandidate {
    pub fn new(role_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            label: label.into(),
        }
    }
}

/// Outcome of applying one selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Role ID and platform error.
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }

    /// Ephemeral confirmation shown to the member.
    pub fn summary(&self) -> String {
        if self.is_noop() {
            return "✅ Your roles are already up to date.".to_string();
        }
        let mentions = |ids: &[String]| {
            ids.iter()
                .map(|id| format!("<@&{}>", id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut lines = Vec::new();
        if !self.added.is_empty() {
            lines.push(format!("➕ Added: {}", mentions(&self.added)));
        }
        if !self.removed.is_empty() {
            lines.push(format!("➖ Removed: {}", mentions(&self.removed)));
        }
        if !self.failed.is_empty() {
            let ids: Vec<String> = self.failed.iter().map(|(id, _)| id.clone()).collect();
            lines.push(format!("⚠️ Could not update: {}", mentions(&ids)));
        }
        lines.join("\n")
    }
}

/// De-duplicate candidates by role ID, keeping the first occurrence.
fn dedupe(candidates: &[RoleCandidate]) -> Vec<RoleCandidate> {
    let mut out: Vec<RoleCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !out.iter().any(|c| c.role_id == candidate.role_id) {
            out.push(candidate.clone());
        }
    }
    out
}

/// Builds panels and applies selections.
#[derive(Clone)]
pub struct RolePanel {
    platform: Arc<dyn Platform>,
}

impl RolePanel {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// The panel message: 1..=5 distinct roles, any subset selectable.
    pub fn build(
        community_id: &str,
        title: &str,
        candidates: &[RoleCandidate],
    ) -> Result<OutboundMessage> {
        let candidates = dedupe(candidates);
        if candidates.is_empty() || candidates.len() > MAX_CANDIDATES {
            return Err(Error::Validation(format!(
                "a role panel needs between 1 and {} distinct roles",
                MAX_CANDIDATES
            )));
        }

        let listing = candidates
            .iter()
            .map(|c| format!("• <@&{}>", c.role_id))
            .collect::<Vec<_>>()
            .join("\n");
        let options = candidates
            .iter()
            .map(|c| SelectOption {
                label: c.label.clone(),
                value: c.role_id.clone(),
            })
            .collect();

        Ok(OutboundMessage::embed(
            Embed::new(title)
                .description(format!("Pick the roles you want:\n{}", listing))
                .color(0x57f287),
        )
        .with_component(Component::SelectMenu {
            custom_id: CustomId::RolePanel {
                community_id: community_id.to_string(),
            }
            .to_string(),
            placeholder: "Select roles".to_string(),
            max_values: candidates.len() as u8,
            options,
            min_values: 0,
        }))
    }

    /// Make the member's candidate roles match `selected`.
    ///
    /// Roles outside `candidates` are never touched, even if selected. Each
    /// change is attempted independently; failures are reported, not raised.
    pub async fn reconcile(
        &self,
        community_id: &str,
        member: &Member,
        selected: &[String],
        candidates: &[String],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut seen: Vec<&str> = Vec::new();

        for role_id in candidates {
            if seen.contains(&role_id.as_str()) {
                continue;
            }
            seen.push(role_id);

            let wanted = selected.iter().any(|s| s == role_id);
            let held = member.has_role(role_id);
            let result = match (wanted, held) {
                (true, false) => self
                    .platform
                    .add_role(community_id, &member.id, role_id)
                    .await
                    .map(|_| report.added.push(role_id.clone())),
                (false, true) => self
                    .platform
                    .remove_role(community_id, &member.id, role_id)
                    .await
                    .map(|_| report.removed.push(role_id.clone())),
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::warn!(
                    community_id = community_id,
                    member_id = member.id.as_str(),
                    role_id = role_id.as_str(),
                    error = %e,
                    "Role change failed"
                );
                report.failed.push((role_id.clone(), e.to_string()));
            }
        }

        tracing::info!(
            community_id = community_id,
            member_id = member.id.as_str(),
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Role selection applied"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn member_with(roles: &[&str]) -> Member {
        Member {
            id: "u1".into(),
            display_name: "u1".into(),
            role_ids: ids(roles),
            is_administrator: false,
            is_bot: false,
            joined_at: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_reconcile_adds_and_removes() {
        let platform = Arc::new(MemoryPlatform::new());
        let member = member_with(&["A", "C", "Z"]);
        platform.add_member("g1", member.clone());
        let panel = RolePanel::new(platform.clone());

        let report = panel
            .reconcile("g1", &member, &ids(&["B"]), &ids(&["A", "B", "C"]))
            .await;
        assert_eq!(report.added, ids(&["B"]));
        assert_eq!(report.removed, ids(&["A", "C"]));
        assert!(report.failed.is_empty());

        let after = platform.member("g1", "u1").unwrap();
        assert!(after.has_role("B"));
        assert!(after.has_role("Z"));
        assert!(!after.has_role("A"));
    }

    #[tokio::test]
    async fn test_reconcile_ignores_non_candidates() {
        let platform = Arc::new(MemoryPlatform::new());
        let member = member_with(&[]);
        let panel = RolePanel::new(platform.clone());

        let report = panel
            .reconcile("g1", &member, &ids(&["admin"]), &ids(&["A"]))
            .await;
        assert!(report.is_noop());
        assert!(platform.log().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_failures_are_independent() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.fail_role("A");
        let member = member_with(&[]);
        let panel = RolePanel::new(platform.clone());

        let report = panel
            .reconcile("g1", &member, &ids(&["A", "B"]), &ids(&["A", "B"]))
            .await;
        assert_eq!(report.added, ids(&["B"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "A");
        assert!(report.summary().contains("Could not update"));
    }

    #[test]
    fn test_build_dedupes_and_bounds() {
        let candidates = vec![
            RoleCandidate::new("A", "Alpha"),
            RoleCandidate::new("A", "Alpha again"),
            RoleCandidate::new("B", "Beta"),
        ];
        let message = RolePanel::build("g1", "Roles", &candidates).unwrap();
        match &message.components[0] {
            Component::SelectMenu {
                custom_id,
                options,
                max_values,
                ..
            } => {
                assert_eq!(custom_id, "rolepanel:g1:");
                assert_eq!(options.len(), 2);
                assert_eq!(*max_values, 2);
            }
            other => panic!("unexpected component {:?}", other),
        }

        assert!(RolePanel::build("g1", "Roles", &[]).is_err());
        let six: Vec<RoleCandidate> = (0..6).map(|i| RoleCandidate::new(i.to_string(), "r")).collect();
        assert!(matches!(RolePanel::build("g1", "Roles", &six), Err(Error::Validation(_))));
    }
}
