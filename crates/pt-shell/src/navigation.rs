//! Navigation Builder
//!
//! Filters the registry's navigation items for a user into a sidebar tree,
//! and derives page titles and breadcrumbs from the same items.

use pt_access::AccessContext;
use serde::Serialize;

use crate::module::NavItem;
use crate::path::segments;
use crate::registry::ModuleRegistry;

/// Title shown for the root path
pub const HOME_TITLE: &str = "Home";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NavLink {
    fn from_item(item: &NavItem) -> Self {
        Self {
            path: item.path.clone(),
            title: item.title.clone(),
            icon: item.icon.clone(),
        }
    }
}

/// A visible sidebar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NavNode {
    Link(NavLink),
    Group {
        #[serde(flatten)]
        link: NavLink,
        children: Vec<NavNode>,
    },
}

impl NavNode {
    pub fn link(&self) -> &NavLink {
        match self {
            NavNode::Link(link) => link,
            NavNode::Group { link, .. } => link,
        }
    }

    pub fn children(&self) -> &[NavNode] {
        match self {
            NavNode::Link(_) => &[],
            NavNode::Group { children, .. } => children,
        }
    }

    /// Highlighted for the current path: exact or segment-prefix match, or
    /// any active child.
    pub fn is_active(&self, current_path: &str) -> bool {
        path_covers(&self.link().path, current_path)
            || self.children().iter().any(|c| c.is_active(current_path))
    }
}

/// A single breadcrumb
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub path: String,
    pub title: String,
}

/// `base` equals `path` or is a whole-segment prefix of it. The root only
/// covers itself.
fn path_covers(base: &str, path: &str) -> bool {
    let base = segments(base);
    let path = segments(path);
    if base.is_empty() {
        return path.is_empty();
    }
    path.len() >= base.len() && path[..base.len()] == base[..]
}

fn same_path(a: &str, b: &str) -> bool {
    segments(a) == segments(b)
}

/// Fallback title from the last path segment: first letter upper-cased,
/// dashes turned into spaces.
pub fn title_from_segment(path: &str) -> String {
    let Some(last) = segments(path).last().copied() else {
        return HOME_TITLE.to_string();
    };
    let spaced = last.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => HOME_TITLE.to_string(),
    }
}

pub struct NavigationBuilder<'a> {
    items: Vec<&'a NavItem>,
}

impl<'a> NavigationBuilder<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self {
            items: registry.all_navigation(),
        }
    }

    pub fn from_items(items: Vec<&'a NavItem>) -> Self {
        Self { items }
    }

    /// Listed in the sidebar and every declared check passes.
    pub fn visible(item: &NavItem, user: Option<&AccessContext>) -> bool {
        item.show_in_sidebar && item.access.allows(user)
    }

    /// Sidebar tree for `user`. A hidden parent hides its subtree; a visible
    /// parent whose children are all hidden becomes a plain link.
    pub fn build(&self, user: Option<&AccessContext>) -> Vec<NavNode> {
        self.items
            .iter()
            .filter_map(|item| Self::filter(item, user))
            .collect()
    }

    fn filter(item: &NavItem, user: Option<&AccessContext>) -> Option<NavNode> {
        if !Self::visible(item, user) {
            return None;
        }
        let children: Vec<NavNode> = item
            .children
            .iter()
            .filter_map(|child| Self::filter(child, user))
            .collect();

        let link = NavLink::from_item(item);
        if children.is_empty() {
            Some(NavNode::Link(link))
        } else {
            Some(NavNode::Group { link, children })
        }
    }

    /// Page title for `path`: a top-level item with that exact path, then any
    /// nested item matching exactly, then a nested item whose path is a
    /// segment prefix, then the last segment itself.
    pub fn title_for(&self, path: &str) -> String {
        if let Some(item) = self.items.iter().find(|i| same_path(&i.path, path)) {
            return item.title.clone();
        }

        let nested: Vec<&NavItem> = self
            .items
            .iter()
            .flat_map(|i| i.children.iter().flat_map(NavItem::walk))
            .collect();

        if let Some(item) = nested.iter().find(|i| same_path(&i.path, path)) {
            return item.title.clone();
        }
        if let Some(item) = nested.iter().find(|i| path_covers(&i.path, path)) {
            return item.title.clone();
        }

        title_from_segment(path)
    }

    /// One crumb per path prefix; the root alone yields `Home`.
    pub fn breadcrumbs(&self, path: &str) -> Vec<Breadcrumb> {
        let parts = segments(path);
        if parts.is_empty() {
            return vec![Breadcrumb {
                path: "/".to_string(),
                title: HOME_TITLE.to_string(),
            }];
        }

        (1..=parts.len())
            .map(|n| {
                let prefix = format!("/{}", parts[..n].join("/"));
                Breadcrumb {
                    title: self.title_for(&prefix),
                    path: prefix,
                }
            })
            .collect()
    }
}
