//! Portico Shell
//!
//! Composes independently authored feature modules into one portal:
//! - `registry`: validated, immutable aggregate of module descriptors
//! - `routes`: guarded route tree grouped by layout
//! - `navigation`: per-user sidebar tree, titles and breadcrumbs
//! - `state`: reducer slices merged into a root reducer

pub mod error;
pub mod module;
pub mod navigation;
pub mod path;
pub mod registry;
pub mod routes;
pub mod state;

pub use error::{PathError, RegistryError, Result};
pub use module::{Layout, ModuleDescriptor, NavItem, RouteDescriptor, ViewHandle};
pub use navigation::{Breadcrumb, NavLink, NavNode, NavigationBuilder};
pub use path::{PathParams, PathPattern};
pub use registry::{ModuleRegistry, ReducerCollision, RegistryOptions};
pub use routes::{GuardOutcome, GuardedRoute, Resolution, RouteComposer, RouteTree};
pub use state::{Action, FnReducer, Reducer, RootReducer, SharedReducer};
