//! Portal permissions - format: {app_label}.{action}_{model}
//!
//! Mirrors the permission codenames the backend issues for each feature module.

/// Gate entry (inward/outward vehicle and material movement)
pub mod gate_entry {
    pub const PREFIX: &str = "gate_entry";

    pub const VIEW_GATEENTRY: &str = "gate_entry.view_gateentry";
    pub const ADD_GATEENTRY: &str = "gate_entry.add_gateentry";
    pub const CHANGE_GATEENTRY: &str = "gate_entry.change_gateentry";
    pub const DELETE_GATEENTRY: &str = "gate_entry.delete_gateentry";

    pub const VIEW_VEHICLE: &str = "gate_entry.view_vehicle";
    pub const ADD_VEHICLE: &str = "gate_entry.add_vehicle";

    /// All gate entry permissions
    pub const ALL: &[&str] = &[
        VIEW_GATEENTRY, ADD_GATEENTRY, CHANGE_GATEENTRY, DELETE_GATEENTRY,
        VIEW_VEHICLE, ADD_VEHICLE,
    ];
}

/// Quality control inspections
pub mod quality_control {
    pub const PREFIX: &str = "quality_control";

    pub const VIEW_INSPECTION: &str = "quality_control.view_inspection";
    pub const ADD_INSPECTION: &str = "quality_control.add_inspection";
    pub const CHANGE_INSPECTION: &str = "quality_control.change_inspection";
    pub const APPROVE_INSPECTION: &str = "quality_control.approve_inspection";

    pub const VIEW_PARAMETER: &str = "quality_control.view_qcparameter";
    pub const CHANGE_PARAMETER: &str = "quality_control.change_qcparameter";

    /// All quality control permissions
    pub const ALL: &[&str] = &[
        VIEW_INSPECTION, ADD_INSPECTION, CHANGE_INSPECTION, APPROVE_INSPECTION,
        VIEW_PARAMETER, CHANGE_PARAMETER,
    ];
}

/// Goods receipt PO postings
pub mod grpo {
    pub const PREFIX: &str = "grpo";

    pub const VIEW_GRPOPOSTING: &str = "grpo.view_grpoposting";
    pub const ADD_GRPOPOSTING: &str = "grpo.add_grpoposting";
    pub const DELETE_GRPOPOSTING: &str = "grpo.delete_grpoposting";

    /// All GRPO permissions
    pub const ALL: &[&str] = &[VIEW_GRPOPOSTING, ADD_GRPOPOSTING, DELETE_GRPOPOSTING];
}

/// In-app notifications
pub mod notifications {
    pub const PREFIX: &str = "notifications";

    pub const VIEW_NOTIFICATION: &str = "notifications.view_notification";
    pub const SEND_NOTIFICATION: &str = "notifications.send_notification";

    /// All notification permissions
    pub const ALL: &[&str] = &[VIEW_NOTIFICATION, SEND_NOTIFICATION];
}

/// User and role administration
pub mod accounts {
    pub const PREFIX: &str = "accounts";

    pub const VIEW_USER: &str = "accounts.view_user";
    pub const ADD_USER: &str = "accounts.add_user";
    pub const CHANGE_USER: &str = "accounts.change_user";

    /// All account permissions
    pub const ALL: &[&str] = &[VIEW_USER, ADD_USER, CHANGE_USER];
}

/// Every catalogued permission across modules
pub fn all() -> impl Iterator<Item = &'static str> {
    gate_entry::ALL
        .iter()
        .chain(quality_control::ALL)
        .chain(grpo::ALL)
        .chain(notifications::ALL)
        .chain(accounts::ALL)
        .copied()
}
