//! Feature modules of the development portal

use pt_access::catalog::{accounts, gate_entry, grpo, notifications, quality_control};
use pt_shell::{Action, FnReducer, Layout, ModuleDescriptor, NavItem, RouteDescriptor};
use serde_json::{json, Value};

pub fn portal_modules() -> Vec<ModuleDescriptor> {
    vec![
        auth(),
        dashboard(),
        gate_entry_module(),
        quality_control_module(),
        grpo_module(),
        notifications_module(),
        accounts_module(),
    ]
}

fn auth() -> ModuleDescriptor {
    ModuleDescriptor::new("auth")
        .route(RouteDescriptor::new("/login", "LoginPage").with_layout(Layout::Auth))
        .reducer(
            "auth",
            FnReducer::shared(json!({ "username": null }), |state: &Value, action: &Action| {
                match action.kind.as_str() {
                    "auth/loggedIn" => json!({ "username": action.payload["username"] }),
                    "auth/loggedOut" => json!({ "username": null }),
                    _ => state.clone(),
                }
            }),
        )
}

fn dashboard() -> ModuleDescriptor {
    ModuleDescriptor::new("dashboard")
        .route(RouteDescriptor::new("/", "Dashboard"))
        .route(RouteDescriptor::new("/unauthorized", "Unauthorized"))
        .route(RouteDescriptor::new("/profile", "Profile"))
        .nav(NavItem::new("/", "Dashboard").with_icon("home"))
        .nav(NavItem::new("/profile", "Profile").hidden())
}

fn gate_entry_module() -> ModuleDescriptor {
    ModuleDescriptor::new("gate_entry")
        .route(
            RouteDescriptor::new("/gate-entry", "GateEntryHome").with_module(gate_entry::PREFIX),
        )
        .route(
            RouteDescriptor::new("/gate-entry/inward", "InwardList")
                .with_permissions([gate_entry::VIEW_GATEENTRY]),
        )
        .route(
            RouteDescriptor::new("/gate-entry/inward/new", "InwardCreate")
                .with_permissions([gate_entry::ADD_GATEENTRY]),
        )
        .route(
            RouteDescriptor::new("/gate-entry/inward/:id", "InwardDetail")
                .with_permissions([gate_entry::VIEW_GATEENTRY]),
        )
        .route(
            RouteDescriptor::new("/gate-entry/vehicles", "VehicleList")
                .with_permissions([gate_entry::VIEW_VEHICLE]),
        )
        .nav(
            NavItem::new("/gate-entry", "Gate Entry")
                .with_icon("truck")
                .with_module(gate_entry::PREFIX)
                .with_children(vec![
                    NavItem::new("/gate-entry/inward", "Inward")
                        .with_permissions([gate_entry::VIEW_GATEENTRY]),
                    NavItem::new("/gate-entry/vehicles", "Vehicles")
                        .with_permissions([gate_entry::VIEW_VEHICLE]),
                ]),
        )
}

fn quality_control_module() -> ModuleDescriptor {
    ModuleDescriptor::new("quality_control")
        .route(
            RouteDescriptor::new("/qc/inspections", "InspectionList")
                .with_permissions([quality_control::VIEW_INSPECTION]),
        )
        .route(
            RouteDescriptor::new("/qc/inspections/:id/approve", "InspectionApprove")
                .with_permissions([
                    quality_control::VIEW_INSPECTION,
                    quality_control::APPROVE_INSPECTION,
                ]),
        )
        .route(
            RouteDescriptor::new("/qc/parameters", "ParameterList")
                .with_permissions([quality_control::VIEW_PARAMETER]),
        )
        .nav(
            NavItem::new("/qc", "Quality Control")
                .with_icon("clipboard-check")
                .with_module(quality_control::PREFIX)
                .with_children(vec![
                    NavItem::new("/qc/inspections", "Inspections")
                        .with_permissions([quality_control::VIEW_INSPECTION]),
                    NavItem::new("/qc/parameters", "Parameters")
                        .with_permissions([quality_control::VIEW_PARAMETER]),
                ]),
        )
}

fn grpo_module() -> ModuleDescriptor {
    ModuleDescriptor::new("grpo")
        .route(
            // Postings are reachable from gate entry records as well.
            RouteDescriptor::new("/grpo", "GrpoList")
                .with_module([grpo::PREFIX, gate_entry::PREFIX]),
        )
        .route(
            RouteDescriptor::new("/grpo/:id", "GrpoDetail")
                .with_permissions([grpo::VIEW_GRPOPOSTING]),
        )
        .nav(
            NavItem::new("/grpo", "GRPO")
                .with_icon("file-text")
                .with_permissions([grpo::VIEW_GRPOPOSTING]),
        )
}

fn notifications_module() -> ModuleDescriptor {
    ModuleDescriptor::new("notifications")
        .route(
            RouteDescriptor::new("/notifications", "NotificationList")
                .with_permissions([notifications::VIEW_NOTIFICATION]),
        )
        .nav(
            NavItem::new("/notifications", "Notifications")
                .with_icon("bell")
                .with_permissions([notifications::VIEW_NOTIFICATION]),
        )
        .reducer(
            "notifications",
            FnReducer::shared(json!({ "unread": 0 }), |state: &Value, action: &Action| {
                let unread = state["unread"].as_u64().unwrap_or(0);
                match action.kind.as_str() {
                    "notifications/received" => json!({ "unread": unread + 1 }),
                    "notifications/readAll" => json!({ "unread": 0 }),
                    _ => state.clone(),
                }
            }),
        )
}

fn accounts_module() -> ModuleDescriptor {
    ModuleDescriptor::new("accounts")
        .route(
            RouteDescriptor::new("/accounts/users", "UserList")
                .with_permissions([accounts::VIEW_USER]),
        )
        .route(
            RouteDescriptor::new("/accounts/users/:id", "UserDetail")
                .with_permissions([accounts::VIEW_USER, accounts::CHANGE_USER]),
        )
        .nav(
            NavItem::new("/accounts", "Administration")
                .with_icon("users")
                .with_module(accounts::PREFIX)
                .with_children(vec![NavItem::new("/accounts/users", "Users")
                    .with_permissions([accounts::VIEW_USER])]),
        )
}
