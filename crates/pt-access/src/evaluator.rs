//! Permission Evaluator
//!
//! Pure predicates over a user's live permission set. Denials are values,
//! not errors: guards redirect on them and navigation hides on them.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permission::{ModulePrefix, Permission, PermissionSet};
use crate::role::Role;

/// Authorization context for the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl AccessContext {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        role: Role,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role,
            permissions,
        }
    }

    /// True iff `required` is empty or every entry is held (AND).
    pub fn has_permission<S: AsRef<str>>(&self, required: &[S]) -> bool {
        has_permission(&self.permissions, required)
    }

    /// True iff at least one prefix has a held permission under it (OR).
    pub fn has_module_access(&self, prefixes: &ModulePrefix) -> bool {
        has_module_access(&self.permissions, prefixes.as_slice())
    }
}

/// Subset test of `required` against `permissions`.
pub fn has_permission<S: AsRef<str>>(permissions: &PermissionSet, required: &[S]) -> bool {
    permissions.has_all(required)
}

/// Module visibility: some permission starts with `prefix + "."`.
pub fn has_module_access<S: AsRef<str>>(permissions: &PermissionSet, prefixes: &[S]) -> bool {
    permissions.has_any_module(prefixes)
}

/// Why access was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No authenticated user to evaluate
    Unauthenticated,
    /// Direct permissions not held
    MissingPermission { missing: Vec<String> },
    /// None of the module prefixes is visible to the user
    ModuleNotVisible { prefixes: Vec<String> },
}

/// Outcome of evaluating a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied(Denial),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

/// Access declared by a route or navigation item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequirement {
    /// All of these must be held
    #[serde(default)]
    pub permissions: Vec<String>,

    /// At least one of these modules must be visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_prefix: Option<ModulePrefix>,
}

impl AccessRequirement {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            module_prefix: None,
        }
    }

    pub fn module(prefix: impl Into<ModulePrefix>) -> Self {
        Self {
            permissions: Vec::new(),
            module_prefix: Some(prefix.into()),
        }
    }

    pub fn with_module(mut self, prefix: impl Into<ModulePrefix>) -> Self {
        self.module_prefix = Some(prefix.into());
        self
    }

    /// Nothing is required: anyone (even anonymous) passes.
    pub fn is_unrestricted(&self) -> bool {
        self.permissions.is_empty() && self.module_prefix.is_none()
    }

    /// Check that every declared permission and prefix is well-formed.
    pub fn validate(&self) -> Result<()> {
        for p in &self.permissions {
            Permission::parse(p)?;
        }
        if let Some(prefix) = &self.module_prefix {
            prefix.validate()?;
        }
        Ok(())
    }

    /// Evaluate against an optional user; both checks must pass when both
    /// are declared. The permission check is reported first.
    pub fn evaluate(&self, user: Option<&AccessContext>) -> Decision {
        if self.is_unrestricted() {
            return Decision::Granted;
        }
        let Some(user) = user else {
            return Decision::Denied(Denial::Unauthenticated);
        };

        if !user.has_permission(&self.permissions) {
            return Decision::Denied(Denial::MissingPermission {
                missing: user.permissions.missing(&self.permissions),
            });
        }

        if let Some(prefix) = &self.module_prefix {
            if !user.has_module_access(prefix) {
                return Decision::Denied(Denial::ModuleNotVisible {
                    prefixes: prefix.as_slice().to_vec(),
                });
            }
        }

        Decision::Granted
    }

    pub fn allows(&self, user: Option<&AccessContext>) -> bool {
        self.evaluate(user).is_granted()
    }
}
