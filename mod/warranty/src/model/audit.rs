use serde::{Deserialize, Serialize};

/// AuditEntry — immutable record of one mutating action.
///
/// Created only by the audit sink; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// UUID primary key.
    pub id: String,

    /// Identity of the caller that performed the action.
    pub actor: String,

    /// Action name, e.g. "register_serial", "import_serials".
    pub action: String,

    /// Kind of the affected resource ("serial", "product").
    pub target_type: String,

    /// Id or serial of the affected resource.
    pub target_id: String,

    /// Free-form detail payload.
    #[serde(default)]
    pub detail: serde_json::Value,

    pub create_at: String,
}

/// Action name constants used by the warranty module.
pub mod action {
    pub const REGISTER_SERIAL: &str = "register_serial";
    pub const DISASSOCIATE_SERIAL: &str = "disassociate_serial";
    pub const IMPORT_SERIALS: &str = "import_serials";
    pub const CREATE_PRODUCT: &str = "create_product";
    pub const UPDATE_PRODUCT: &str = "update_product";
    pub const DELETE_PRODUCT: &str = "delete_product";
}
