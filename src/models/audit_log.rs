use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DeleteUser,
    SuspendUser,
    ActivateUser,
    DeletePost,
    ApproveReport,
    RejectReport,
    AddAdmin,
    RemoveAdmin,
    PromoteAdmin,
    DemoteAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    User,
    Post,
    Report,
    Admin,
}

/// Append-only record of one administrative mutation. The `timestamp`
/// field is written by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub admin_id: String,
    pub admin_email: String,
    pub action: AuditAction,
    pub target_id: String,
    pub target_type: TargetType,
    pub details: String,
    #[serde(default, skip_serializing)]
    pub timestamp: Option<String>,
}
