//! Error types for the shell

use pt_access::AccessError;
use thiserror::Error;

use crate::module::Layout;

/// Boot-time registry validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate module name: {0}")]
    DuplicateModuleName(String),

    #[error("Duplicate {layout} route path {path:?} (modules {first} and {second})")]
    DuplicateRoutePath {
        layout: Layout,
        path: String,
        first: String,
        second: String,
    },

    #[error("Invalid route path {path:?} in module {module}: {reason}")]
    InvalidRoutePath {
        module: String,
        path: String,
        reason: PathError,
    },

    #[error("Malformed permission {permission:?} on {path:?} in module {module}")]
    MalformedPermission {
        module: String,
        path: String,
        permission: String,
    },

    #[error("Malformed module prefix {prefix:?} on {path:?} in module {module}")]
    MalformedModulePrefix {
        module: String,
        path: String,
        prefix: String,
    },

    #[error("Reducer slice {slice:?} registered by both {first} and {second}")]
    ReducerCollision {
        slice: String,
        first: String,
        second: String,
    },
}

/// Path pattern parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with '/'")]
    NotAbsolute,

    #[error("empty parameter name")]
    EmptyParam,

    #[error("duplicate parameter :{0}")]
    DuplicateParam(String),

    #[error("'*' is only allowed as the last segment")]
    MisplacedCatchAll,
}

impl RegistryError {
    pub(crate) fn from_access(module: &str, path: &str, err: AccessError) -> Self {
        match err {
            AccessError::MalformedPermission(permission) => RegistryError::MalformedPermission {
                module: module.to_string(),
                path: path.to_string(),
                permission,
            },
            AccessError::MalformedModulePrefix(prefix) => RegistryError::MalformedModulePrefix {
                module: module.to_string(),
                path: path.to_string(),
                prefix,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
