//! Portico Access Control
//!
//! Permission-based access control for the portal:
//! - `PermissionSet`: the backend-issued permissions a user holds
//! - `AccessRequirement`: what a route or navigation item declares
//! - `AccessContext`: the evaluated user (permissions + role)
//! - `catalog`: permission strings per feature module
//! - `role::legacy`: the older static role tables, not used by live checks

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod permission;
pub mod role;

pub use error::{AccessError, Result};
pub use evaluator::{has_module_access, has_permission, AccessContext, AccessRequirement, Decision, Denial};
pub use permission::{validate_module_prefix, ModulePrefix, Permission, PermissionSet};
pub use role::Role;
