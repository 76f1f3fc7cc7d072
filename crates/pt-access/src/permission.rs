//! Permission strings and permission sets
//!
//! Permissions are backend-issued strings of the form
//! `<app_label>.<action>_<model>`, e.g. `grpo.add_grpoposting`.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

fn permission_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-z][a-z0-9_]*)\.(([a-z][a-z0-9]*)_([a-z0-9_]+))$")
            .unwrap_or_else(|e| unreachable!("permission pattern is valid: {e}"))
    })
}

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*$")
            .unwrap_or_else(|e| unreachable!("prefix pattern is valid: {e}"))
    })
}

/// A parsed, well-formed permission string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    raw: String,
    app_label_end: usize,
    action_end: usize,
}

impl Permission {
    /// Parse and validate a permission string.
    pub fn parse(value: &str) -> Result<Self> {
        let caps = permission_pattern()
            .captures(value)
            .ok_or_else(|| AccessError::MalformedPermission(value.to_string()))?;

        let app_label_end = caps.get(1).map(|m| m.end()).unwrap_or_default();
        let action_end = caps.get(3).map(|m| m.end()).unwrap_or_default();

        Ok(Self {
            raw: value.to_string(),
            app_label_end,
            action_end,
        })
    }

    /// Whether `value` follows the permission grammar.
    pub fn is_well_formed(value: &str) -> bool {
        permission_pattern().is_match(value)
    }

    /// The module prefix, e.g. `grpo`.
    pub fn app_label(&self) -> &str {
        &self.raw[..self.app_label_end]
    }

    /// Full codename, e.g. `add_grpoposting`.
    pub fn codename(&self) -> &str {
        &self.raw[self.app_label_end + 1..]
    }

    /// Action part of the codename, e.g. `add`.
    pub fn action(&self) -> &str {
        &self.raw[self.app_label_end + 1..self.action_end]
    }

    /// Model part of the codename, e.g. `grpoposting`.
    pub fn model(&self) -> &str {
        &self.raw[self.action_end + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Validate a module prefix (`app_label` grammar).
pub fn validate_module_prefix(prefix: &str) -> Result<()> {
    if prefix_pattern().is_match(prefix) {
        Ok(())
    } else {
        Err(AccessError::MalformedModulePrefix(prefix.to_string()))
    }
}

/// One module prefix or several, as declared on a route or nav item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModulePrefix {
    One(String),
    Many(Vec<String>),
}

impl ModulePrefix {
    /// The prefixes as a slice regardless of arity.
    pub fn as_slice(&self) -> &[String] {
        match self {
            ModulePrefix::One(p) => std::slice::from_ref(p),
            ModulePrefix::Many(ps) => ps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.as_slice()
            .iter()
            .try_for_each(|p| validate_module_prefix(p))
    }
}

impl From<&str> for ModulePrefix {
    fn from(value: &str) -> Self {
        ModulePrefix::One(value.to_string())
    }
}

impl From<String> for ModulePrefix {
    fn from(value: String) -> Self {
        ModulePrefix::One(value)
    }
}

impl From<Vec<String>> for ModulePrefix {
    fn from(value: Vec<String>) -> Self {
        ModulePrefix::Many(value)
    }
}

impl From<&[&str]> for ModulePrefix {
    fn from(value: &[&str]) -> Self {
        ModulePrefix::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ModulePrefix {
    fn from(value: [&str; N]) -> Self {
        ModulePrefix::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

/// The set of permission strings a user currently holds.
///
/// Strings are kept as issued; malformed entries simply never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Subset test: every required permission is held. Empty requirement
    /// lists are always satisfied.
    pub fn has_all<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|p| self.0.contains(p.as_ref()))
    }

    /// Required permissions that are not held, in declaration order.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !self.0.contains(*p))
            .map(str::to_string)
            .collect()
    }

    /// True if any held permission starts with `prefix + "."` for any of the
    /// given prefixes.
    pub fn has_any_module<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        prefixes.iter().any(|prefix| {
            let prefix = prefix.as_ref();
            self.0.iter().any(|p| {
                p.len() > prefix.len()
                    && p.starts_with(prefix)
                    && p.as_bytes()[prefix.len()] == b'.'
            })
        })
    }

    /// Distinct module prefixes present in the set.
    pub fn modules(&self) -> HashSet<&str> {
        self.0
            .iter()
            .filter_map(|p| p.split_once('.').map(|(app, _)| app))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted copy, for stable output.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut v: Vec<String> = self.0.iter().cloned().collect();
        v.sort();
        v
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(value: Vec<String>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl From<HashSet<String>> for PermissionSet {
    fn from(value: HashSet<String>) -> Self {
        Self(value)
    }
}
