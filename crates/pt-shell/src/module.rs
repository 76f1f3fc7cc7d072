//! Module descriptors
//!
//! What a feature module contributes to the shell: routes, sidebar entries
//! and state slices. Supplied once at boot and never changed afterwards.

use std::fmt;

use indexmap::IndexMap;
use pt_access::{AccessRequirement, ModulePrefix};
use serde::{Deserialize, Serialize};

use crate::state::SharedReducer;

/// Layout group a route renders inside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Login and other pre-authentication pages
    Auth,
    /// Sidebar + header shell
    Main,
}

impl Layout {
    /// Resolution order: auth pages shadow main pages.
    pub const ORDER: [Layout; 2] = [Layout::Auth, Layout::Main];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Auth => "auth",
            Layout::Main => "main",
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Main
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle the rendering layer resolves to a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewHandle(String);

impl ViewHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub path: String,
    pub view: ViewHandle,
    #[serde(flatten)]
    pub access: AccessRequirement,
    /// Unset means "required unless the layout is auth"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
    #[serde(default)]
    pub layout: Layout,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            view: ViewHandle::new(view),
            access: AccessRequirement::none(),
            requires_auth: None,
            layout: Layout::Main,
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_module(mut self, prefix: impl Into<ModulePrefix>) -> Self {
        self.access.module_prefix = Some(prefix.into());
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Reachable without a session.
    pub fn public(mut self) -> Self {
        self.requires_auth = Some(false);
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth.unwrap_or(self.layout != Layout::Auth)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub access: AccessRequirement,
    #[serde(default = "default_true")]
    pub show_in_sidebar: bool,
    #[serde(default)]
    pub has_submenu: bool,
    #[serde(default)]
    pub children: Vec<NavItem>,
}

impl NavItem {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            icon: None,
            access: AccessRequirement::none(),
            show_in_sidebar: true,
            has_submenu: false,
            children: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_module(mut self, prefix: impl Into<ModulePrefix>) -> Self {
        self.access.module_prefix = Some(prefix.into());
        self
    }

    pub fn with_children(mut self, children: Vec<NavItem>) -> Self {
        self.has_submenu = !children.is_empty();
        self.children = children;
        self
    }

    /// Routable but never listed in the sidebar.
    pub fn hidden(mut self) -> Self {
        self.show_in_sidebar = false;
        self
    }

    /// This item followed by all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&NavItem> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Everything one feature module contributes
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub routes: Vec<RouteDescriptor>,
    pub navigation: Vec<NavItem>,
    pub reducers: IndexMap<String, SharedReducer>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            navigation: Vec::new(),
            reducers: IndexMap::new(),
        }
    }

    pub fn route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    pub fn nav(mut self, item: NavItem) -> Self {
        self.navigation.push(item);
        self
    }

    pub fn reducer(mut self, slice: impl Into<String>, reducer: SharedReducer) -> Self {
        self.reducers.insert(slice.into(), reducer);
        self
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("navigation", &self.navigation)
            .field("reducers", &self.reducers.keys().collect::<Vec<_>>())
            .finish()
    }
}
