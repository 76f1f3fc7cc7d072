//! Route Composer
//!
//! Turns registry routes into a guarded route tree grouped by layout. Each
//! route carries a guard that decides, for the current user, whether the
//! page renders or where the user is sent instead.

use indexmap::IndexMap;
use pt_access::{AccessContext, Decision, Denial};
use pt_common::{Navigator, Redirect, RoutePaths};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::module::{Layout, RouteDescriptor};
use crate::path::{PathParams, PathPattern};
use crate::registry::ModuleRegistry;

/// Outcome of a route guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Render,
    Redirect(Redirect),
}

/// A registry route wrapped with its guard
#[derive(Debug, Clone)]
pub struct GuardedRoute {
    pub module: String,
    pub route: RouteDescriptor,
    pattern: PathPattern,
}

impl GuardedRoute {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Login when a session is needed and missing; unauthorized when the
    /// user is known but lacks access.
    pub fn guard(&self, user: Option<&AccessContext>, requested_path: &str) -> GuardOutcome {
        if self.route.requires_auth() && user.is_none() {
            return GuardOutcome::Redirect(Redirect::login(requested_path));
        }

        match self.route.access.evaluate(user) {
            Decision::Granted => GuardOutcome::Render,
            Decision::Denied(Denial::Unauthenticated) => {
                GuardOutcome::Redirect(Redirect::login(requested_path))
            }
            Decision::Denied(denial) => {
                debug!(
                    path = %requested_path,
                    module = %self.module,
                    ?denial,
                    "Route access denied"
                );
                GuardOutcome::Redirect(Redirect::Unauthorized)
            }
        }
    }
}

/// What the shell should do with a requested path
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Render {
        route: &'a GuardedRoute,
        params: PathParams,
    },
    Redirect(Redirect),
    NotFound,
}

impl Resolution<'_> {
    pub fn is_render(&self) -> bool {
        matches!(self, Resolution::Render { .. })
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Resolution::Redirect(r) => Some(r),
            _ => None,
        }
    }
}

/// Guarded routes grouped by layout
#[derive(Debug, Clone)]
pub struct RouteTree {
    groups: IndexMap<Layout, Vec<GuardedRoute>>,
    paths: RoutePaths,
}

impl RouteTree {
    pub fn routes(&self, layout: Layout) -> &[GuardedRoute] {
        self.groups.get(&layout).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn paths(&self) -> &RoutePaths {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First structural match in the auth group, then the main group.
    pub fn resolve(&self, path: &str, user: Option<&AccessContext>) -> Resolution<'_> {
        for layout in Layout::ORDER {
            for route in self.routes(layout) {
                let Some(params) = route.pattern.matches(path) else {
                    continue;
                };
                return match route.guard(user, path) {
                    GuardOutcome::Render => Resolution::Render { route, params },
                    GuardOutcome::Redirect(r) => Resolution::Redirect(r),
                };
            }
        }
        Resolution::NotFound
    }

    /// Resolve the navigator's current path and follow any redirect.
    pub fn enforce(&self, navigator: &dyn Navigator, user: Option<&AccessContext>) -> Resolution<'_> {
        let resolution = self.resolve(&navigator.current_path(), user);
        if let Resolution::Redirect(redirect) = &resolution {
            debug!(location = %redirect.location(&self.paths), "Guard redirect");
            navigator.navigate(redirect.clone());
        }
        resolution
    }
}

pub struct RouteComposer;

impl RouteComposer {
    pub fn compose(registry: &ModuleRegistry, paths: RoutePaths) -> Result<RouteTree> {
        let mut groups: IndexMap<Layout, Vec<GuardedRoute>> =
            Layout::ORDER.iter().map(|l| (*l, Vec::new())).collect();

        for module in registry.modules() {
            for route in &module.routes {
                let pattern = PathPattern::parse(&route.path).map_err(|reason| {
                    RegistryError::InvalidRoutePath {
                        module: module.name.clone(),
                        path: route.path.clone(),
                        reason,
                    }
                })?;
                groups.entry(route.layout).or_default().push(GuardedRoute {
                    module: module.name.clone(),
                    route: route.clone(),
                    pattern,
                });
            }
        }

        debug!(
            auth = groups.get(&Layout::Auth).map(Vec::len).unwrap_or(0),
            main = groups.get(&Layout::Main).map(Vec::len).unwrap_or(0),
            "Route tree composed"
        );
        Ok(RouteTree { groups, paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleDescriptor;
    use pt_access::Role;
    use pt_common::MemoryNavigator;

    fn user(permissions: &[&str]) -> AccessContext {
        AccessContext::new("7", "inspector", Role::QualityInspector, permissions.iter().copied().collect())
    }

    fn tree() -> RouteTree {
        let registry = ModuleRegistry::register(vec![
            ModuleDescriptor::new("auth")
                .route(RouteDescriptor::new("/login", "Login").with_layout(Layout::Auth)),
            ModuleDescriptor::new("dashboard").route(RouteDescriptor::new("/", "Dashboard")),
            ModuleDescriptor::new("grpo")
                .route(
                    RouteDescriptor::new("/grpo/new", "GrpoCreate")
                        .with_permissions(["grpo.add_grpoposting"]),
                )
                .route(
                    RouteDescriptor::new("/grpo/:id", "GrpoDetail")
                        .with_permissions(["grpo.view_grpoposting"]),
                )
                .route(RouteDescriptor::new("/grpo", "GrpoList").with_module("grpo")),
        ])
        .unwrap();
        RouteComposer::compose(&registry, RoutePaths::default()).unwrap()
    }

    #[test]
    fn test_groups_by_layout() {
        let tree = tree();
        assert_eq!(tree.routes(Layout::Auth).len(), 1);
        assert_eq!(tree.routes(Layout::Main).len(), 4);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_anonymous_redirected_to_login_with_path() {
        let tree = tree();
        let res = tree.resolve("/grpo/12", None);
        assert_eq!(res.redirect(), Some(&Redirect::login("/grpo/12")));
    }

    #[test]
    fn test_auth_layout_renders_anonymously() {
        let tree = tree();
        assert!(tree.resolve("/login", None).is_render());
    }

    #[test]
    fn test_missing_permission_goes_to_unauthorized_not_login() {
        let tree = tree();
        let u = user(&["quality_control.view_inspection"]);
        let res = tree.resolve("/grpo/12", Some(&u));
        assert_eq!(res.redirect(), Some(&Redirect::Unauthorized));

        let res = tree.resolve("/grpo", Some(&u));
        assert_eq!(res.redirect(), Some(&Redirect::Unauthorized));
    }

    #[test]
    fn test_first_structural_match_wins() {
        let tree = tree();
        let u = user(&["grpo.add_grpoposting", "grpo.view_grpoposting"]);
        match tree.resolve("/grpo/new", Some(&u)) {
            Resolution::Render { route, params } => {
                assert_eq!(route.route.view.as_str(), "GrpoCreate");
                assert!(params.is_empty());
            }
            other => panic!("unexpected resolution: {other:?}"),
        }

        match tree.resolve("/grpo/31/", Some(&u)) {
            Resolution::Render { route, params } => {
                assert_eq!(route.module, "grpo");
                assert_eq!(params.get("id").map(String::as_str), Some("31"));
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_path_not_found() {
        let tree = tree();
        assert!(matches!(tree.resolve("/nope", Some(&user(&[]))), Resolution::NotFound));
    }

    #[test]
    fn test_enforce_drives_navigator() {
        let tree = tree();
        let nav = MemoryNavigator::new("/grpo/new", RoutePaths::default());

        tree.enforce(&nav, None);

        assert_eq!(nav.last_redirect(), Some(Redirect::login("/grpo/new")));
        assert_eq!(nav.current_path(), "/login");
    }
}
