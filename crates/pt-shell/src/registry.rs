//! Module Registry
//!
//! Aggregates module descriptors into one validated value at boot. There is
//! no mutating API: the registry is built once and passed by reference.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::error::{RegistryError, Result};
use crate::module::{Layout, ModuleDescriptor, NavItem, RouteDescriptor};
use crate::path::PathPattern;
use crate::state::{RootReducer, SharedReducer};

/// Registration behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryOptions {
    /// Fail instead of letting the later module's reducer win.
    pub reject_reducer_collisions: bool,
}

/// A reducer slice claimed by more than one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerCollision {
    pub slice: String,
    /// Module whose reducer was replaced
    pub first: String,
    /// Module whose reducer is kept
    pub second: String,
}

#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<ModuleDescriptor>,
    collisions: Vec<ReducerCollision>,
}

impl ModuleRegistry {
    pub fn register(modules: Vec<ModuleDescriptor>) -> Result<Self> {
        Self::register_with(modules, RegistryOptions::default())
    }

    pub fn register_with(modules: Vec<ModuleDescriptor>, options: RegistryOptions) -> Result<Self> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut paths: HashMap<(Layout, String), &str> = HashMap::new();

        for module in &modules {
            if !names.insert(module.name.as_str()) {
                return Err(RegistryError::DuplicateModuleName(module.name.clone()));
            }

            for route in &module.routes {
                let pattern = PathPattern::parse(&route.path).map_err(|reason| {
                    RegistryError::InvalidRoutePath {
                        module: module.name.clone(),
                        path: route.path.clone(),
                        reason,
                    }
                })?;
                route
                    .access
                    .validate()
                    .map_err(|e| RegistryError::from_access(&module.name, &route.path, e))?;

                // Keyed by shape: `/grpo/:id` and `/grpo/:pk` are the same route.
                let key = (route.layout, pattern.shape());
                if let Some(first) = paths.get(&key) {
                    return Err(RegistryError::DuplicateRoutePath {
                        layout: route.layout,
                        path: pattern.to_string(),
                        first: (*first).to_string(),
                        second: module.name.clone(),
                    });
                }
                paths.insert(key, module.name.as_str());
            }

            for item in module.navigation.iter().flat_map(NavItem::walk) {
                item.access
                    .validate()
                    .map_err(|e| RegistryError::from_access(&module.name, &item.path, e))?;
            }
        }

        let collisions = find_collisions(&modules);
        if let Some(c) = collisions.first() {
            if options.reject_reducer_collisions {
                return Err(RegistryError::ReducerCollision {
                    slice: c.slice.clone(),
                    first: c.first.clone(),
                    second: c.second.clone(),
                });
            }
        }
        for c in &collisions {
            warn!(
                slice = %c.slice,
                replaced = %c.first,
                kept = %c.second,
                "Reducer slice registered twice, later module wins"
            );
        }

        let registry = Self { modules, collisions };
        info!(
            modules = registry.modules.len(),
            routes = registry.all_routes().len(),
            nav_items = registry.all_navigation().len(),
            "Module registry built"
        );
        Ok(registry)
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Routes in module-registration order.
    pub fn all_routes(&self) -> Vec<&RouteDescriptor> {
        self.modules.iter().flat_map(|m| m.routes.iter()).collect()
    }

    pub fn routes_by_layout(&self, layout: Layout) -> Vec<&RouteDescriptor> {
        self.all_routes()
            .into_iter()
            .filter(|r| r.layout == layout)
            .collect()
    }

    /// Top-level navigation items in module-registration order.
    pub fn all_navigation(&self) -> Vec<&NavItem> {
        self.modules.iter().flat_map(|m| m.navigation.iter()).collect()
    }

    /// Merged slices; a later module's reducer replaces an earlier one.
    pub fn all_reducers(&self) -> IndexMap<String, SharedReducer> {
        let mut merged = IndexMap::new();
        for module in &self.modules {
            for (slice, reducer) in &module.reducers {
                merged.insert(slice.clone(), reducer.clone());
            }
        }
        merged
    }

    pub fn reducer_collisions(&self) -> &[ReducerCollision] {
        &self.collisions
    }

    pub fn root_reducer(&self) -> RootReducer {
        RootReducer::new(self.all_reducers())
    }
}

fn find_collisions(modules: &[ModuleDescriptor]) -> Vec<ReducerCollision> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    let mut collisions = Vec::new();
    for module in modules {
        for slice in module.reducers.keys() {
            if let Some(previous) = owners.insert(slice.as_str(), module.name.as_str()) {
                collisions.push(ReducerCollision {
                    slice: slice.clone(),
                    first: previous.to_string(),
                    second: module.name.clone(),
                });
            }
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, FnReducer};
    use serde_json::json;

    fn constant(value: serde_json::Value) -> SharedReducer {
        let initial = value.clone();
        FnReducer::shared(initial, move |_, _| value.clone())
    }

    #[test]
    fn test_duplicate_module_name_fails() {
        let err = ModuleRegistry::register(vec![
            ModuleDescriptor::new("grpo"),
            ModuleDescriptor::new("grpo"),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateModuleName("grpo".to_string()));
    }

    #[test]
    fn test_duplicate_route_within_layout_fails() {
        let err = ModuleRegistry::register(vec![
            ModuleDescriptor::new("a").route(RouteDescriptor::new("/shared", "A")),
            ModuleDescriptor::new("b").route(RouteDescriptor::new("/shared/", "B")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateRoutePath { layout: Layout::Main, ref first, ref second, .. }
                if first == "a" && second == "b"
        ));
    }

    #[test]
    fn test_routes_differing_only_in_param_names_are_duplicates() {
        let err = ModuleRegistry::register(vec![
            ModuleDescriptor::new("grpo").route(RouteDescriptor::new("/grpo/:id", "Detail")),
            ModuleDescriptor::new("grpo_admin").route(RouteDescriptor::new("/grpo/:pk", "AdminDetail")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateRoutePath { ref path, ref first, ref second, .. }
                if path == "/grpo/:pk" && first == "grpo" && second == "grpo_admin"
        ));
    }

    #[test]
    fn test_same_path_in_different_layouts_is_allowed() {
        let registry = ModuleRegistry::register(vec![
            ModuleDescriptor::new("a").route(RouteDescriptor::new("/welcome", "A").with_layout(Layout::Auth)),
            ModuleDescriptor::new("b").route(RouteDescriptor::new("/welcome", "B")),
        ])
        .unwrap();
        assert_eq!(registry.routes_by_layout(Layout::Auth).len(), 1);
        assert_eq!(registry.routes_by_layout(Layout::Main).len(), 1);
    }

    #[test]
    fn test_malformed_permission_rejected() {
        let err = ModuleRegistry::register(vec![ModuleDescriptor::new("grpo")
            .route(RouteDescriptor::new("/grpo", "List").with_permissions(["grpo-view"]))])
        .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedPermission { ref permission, .. } if permission == "grpo-view"));
    }

    #[test]
    fn test_malformed_prefix_in_nav_child_rejected() {
        let err = ModuleRegistry::register(vec![ModuleDescriptor::new("qc").nav(
            NavItem::new("/qc", "QC").with_children(vec![NavItem::new("/qc/x", "X").with_module("QC")]),
        )])
        .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedModulePrefix { ref path, .. } if path == "/qc/x"));
    }

    #[test]
    fn test_invalid_route_path_rejected() {
        let err = ModuleRegistry::register(vec![
            ModuleDescriptor::new("a").route(RouteDescriptor::new("relative", "A")),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRoutePath { .. }));
    }

    #[test]
    fn test_routes_and_navigation_keep_registration_order() {
        let registry = ModuleRegistry::register(vec![
            ModuleDescriptor::new("a")
                .route(RouteDescriptor::new("/a1", "A1"))
                .route(RouteDescriptor::new("/a2", "A2"))
                .nav(NavItem::new("/a1", "A")),
            ModuleDescriptor::new("b")
                .route(RouteDescriptor::new("/b1", "B1"))
                .nav(NavItem::new("/b1", "B")),
        ])
        .unwrap();

        let paths: Vec<_> = registry.all_routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a1", "/a2", "/b1"]);
        let titles: Vec<_> = registry.all_navigation().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert!(registry.module("b").is_some());
        assert!(registry.module("c").is_none());
    }

    #[test]
    fn test_later_reducer_wins() {
        let registry = ModuleRegistry::register(vec![
            ModuleDescriptor::new("a").reducer("foo", constant(json!("from-a"))),
            ModuleDescriptor::new("b").reducer("foo", constant(json!("from-b"))),
        ])
        .unwrap();

        let reducers = registry.all_reducers();
        assert_eq!(reducers.len(), 1);
        assert_eq!(reducers["foo"].initial_state(), json!("from-b"));
        assert_eq!(
            registry.reducer_collisions(),
            &[ReducerCollision {
                slice: "foo".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }]
        );

        let root = registry.root_reducer();
        let state = root.reduce(&root.initial_state(), &Action::new("anything"));
        assert_eq!(state, json!({"foo": "from-b"}));
    }

    #[test]
    fn test_strict_mode_rejects_reducer_collision() {
        let err = ModuleRegistry::register_with(
            vec![
                ModuleDescriptor::new("a").reducer("foo", constant(json!(1))),
                ModuleDescriptor::new("b").reducer("foo", constant(json!(2))),
            ],
            RegistryOptions {
                reject_reducer_collisions: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::ReducerCollision { ref slice, .. } if slice == "foo"));
    }
}
