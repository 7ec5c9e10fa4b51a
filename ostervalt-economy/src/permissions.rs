//! Who may act on a character they might not own.
use serde::{Deserialize, Serialize};

use crate::character::{Character, UserId};
use crate::config::RoleConfig;

/// Role lists a guild can grant elevated access through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Balance,
    Progress,
}

/// The user invoking an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
    pub role_ids: Vec<u64>,
}

impl Actor {
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
            role_ids: Vec::new(),
        }
    }

    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
            role_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_roles(mut self, role_ids: impl IntoIterator<Item = u64>) -> Self {
        self.role_ids.extend(role_ids);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionPolicy {
    Admin,
    ConfiguredRole(RoleKind),
    Owner,
}

impl PermissionPolicy {
    /// Policies accepted for viewing a wallet.
    pub const BALANCE: &'static [Self] = &[
        Self::Admin,
        Self::ConfiguredRole(RoleKind::Balance),
        Self::Owner,
    ];
    /// Policies accepted for viewing or awarding progress.
    pub const PROGRESS: &'static [Self] = &[
        Self::Admin,
        Self::ConfiguredRole(RoleKind::Progress),
        Self::Owner,
    ];
    /// Administrative operations.
    pub const ADMIN_ONLY: &'static [Self] = &[Self::Admin];

    #[must_use]
    pub fn allows(self, actor: &Actor, character: &Character, roles: &RoleConfig) -> bool {
        match self {
            Self::Admin => actor.is_admin,
            Self::ConfiguredRole(kind) => {
                let granted = match kind {
                    RoleKind::Balance => &roles.balance,
                    RoleKind::Progress => &roles.progress,
                };
                actor.role_ids.iter().any(|role| granted.contains(role))
            }
            Self::Owner => actor.user_id == character.owner_id,
        }
    }

    #[must_use]
    pub const fn label(policies: &[Self]) -> &'static str {
        match policies {
            [Self::Admin] => "admin",
            [_, Self::ConfiguredRole(RoleKind::Balance), _] => "balance",
            [_, Self::ConfiguredRole(RoleKind::Progress), _] => "progress",
            _ => "custom",
        }
    }
}

/// True when any of `policies` admits the actor.
#[must_use]
pub fn permits(
    policies: &[PermissionPolicy],
    actor: &Actor,
    character: &Character,
    roles: &RoleConfig,
) -> bool {
    policies
        .iter()
        .any(|policy| policy.allows(actor, character, roles))
}
