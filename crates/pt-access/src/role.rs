//! Roles
//!
//! Every user carries exactly one role. Live authorization uses the
//! backend-issued permission set only; the static role tables in [`legacy`]
//! predate it and are not consulted by route guards or navigation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Portal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    QualityInspector,
    StoreKeeper,
    SecurityGuard,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Manager,
        Role::Supervisor,
        Role::QualityInspector,
        Role::StoreKeeper,
        Role::SecurityGuard,
        Role::Viewer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Supervisor => "supervisor",
            Role::QualityInspector => "quality_inspector",
            Role::StoreKeeper => "store_keeper",
            Role::SecurityGuard => "security_guard",
            Role::Viewer => "viewer",
        }
    }

    /// Lenient conversion for backend payloads: unknown roles become `Viewer`.
    pub fn from_backend(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(role = %value, "Unknown role from backend, treating as viewer");
            Role::Viewer
        })
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| format!("unknown role: {value}"))
    }
}

/// Static role tables kept from the role-only authorization scheme.
///
/// Not used by live checks. They remain available for role-only gating
/// (e.g. admin tooling) and are deliberately separate from `PermissionSet`.
pub mod legacy {
    use super::Role;
    use crate::catalog;

    /// Rank of each role; higher outranks lower.
    pub const ROLE_HIERARCHY: &[(Role, u8)] = &[
        (Role::Admin, 100),
        (Role::Manager, 80),
        (Role::Supervisor, 60),
        (Role::QualityInspector, 40),
        (Role::StoreKeeper, 40),
        (Role::SecurityGuard, 30),
        (Role::Viewer, 10),
    ];

    /// Permissions each role carried under the role-only scheme.
    pub const ROLE_PERMISSIONS: &[(Role, &[&str])] = &[
        (Role::Admin, &[WILDCARD]),
        (
            Role::Manager,
            &[
                catalog::gate_entry::VIEW_GATEENTRY,
                catalog::gate_entry::CHANGE_GATEENTRY,
                catalog::quality_control::VIEW_INSPECTION,
                catalog::quality_control::APPROVE_INSPECTION,
                catalog::grpo::VIEW_GRPOPOSTING,
                catalog::grpo::ADD_GRPOPOSTING,
                catalog::notifications::VIEW_NOTIFICATION,
            ],
        ),
        (
            Role::Supervisor,
            &[
                catalog::gate_entry::VIEW_GATEENTRY,
                catalog::gate_entry::CHANGE_GATEENTRY,
                catalog::quality_control::VIEW_INSPECTION,
                catalog::grpo::VIEW_GRPOPOSTING,
                catalog::notifications::VIEW_NOTIFICATION,
            ],
        ),
        (
            Role::QualityInspector,
            &[
                catalog::quality_control::VIEW_INSPECTION,
                catalog::quality_control::ADD_INSPECTION,
                catalog::quality_control::CHANGE_INSPECTION,
                catalog::notifications::VIEW_NOTIFICATION,
            ],
        ),
        (
            Role::StoreKeeper,
            &[
                catalog::grpo::VIEW_GRPOPOSTING,
                catalog::grpo::ADD_GRPOPOSTING,
                catalog::gate_entry::VIEW_GATEENTRY,
                catalog::notifications::VIEW_NOTIFICATION,
            ],
        ),
        (
            Role::SecurityGuard,
            &[
                catalog::gate_entry::VIEW_GATEENTRY,
                catalog::gate_entry::ADD_GATEENTRY,
                catalog::notifications::VIEW_NOTIFICATION,
            ],
        ),
        (Role::Viewer, &[catalog::notifications::VIEW_NOTIFICATION]),
    ];

    /// Grants every permission.
    pub const WILDCARD: &str = "*";

    pub fn level(role: Role) -> u8 {
        ROLE_HIERARCHY
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, level)| *level)
            .unwrap_or_default()
    }

    /// True if `role` ranks at least as high as `required`.
    pub fn outranks_or_equals(role: Role, required: Role) -> bool {
        level(role) >= level(required)
    }

    pub fn role_permissions(role: Role) -> &'static [&'static str] {
        ROLE_PERMISSIONS
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, perms)| *perms)
            .unwrap_or(&[])
    }

    pub fn role_has_permission(role: Role, permission: &str) -> bool {
        role_permissions(role)
            .iter()
            .any(|p| *p == WILDCARD || *p == permission)
    }
}
