//! Error types for access control

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Malformed permission string: {0:?} (expected <app_label>.<action>_<model>)")]
    MalformedPermission(String),

    #[error("Malformed module prefix: {0:?}")]
    MalformedModulePrefix(String),
}

pub type Result<T> = std::result::Result<T, AccessError>;
