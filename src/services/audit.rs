use crate::middleware::auth::AdminContext;
use crate::models::{AuditAction, AuditLogEntry, TargetType};
use crate::store::{SharedStore, StoreError, AUDIT_LOGS};
use serde_json::Value;

/// Best-effort append-only log of admin mutations.
#[derive(Clone)]
pub struct AuditRecorder {
    store: SharedStore,
}

impl AuditRecorder {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append one entry stamped with the store's clock. Failures are logged
    /// and never reach the caller.
    pub async fn record(
        &self,
        admin: &AdminContext,
        action: AuditAction,
        target_id: &str,
        target_type: TargetType,
        details: impl Into<String>,
    ) {
        let entry = AuditLogEntry {
            admin_id: admin.id.clone(),
            admin_email: admin.email.clone(),
            action,
            target_id: target_id.to_string(),
            target_type,
            details: details.into(),
            timestamp: None,
        };

        if let Err(e) = self.append(entry).await {
            tracing::warn!(
                "Failed to record audit entry {:?} on {}: {}",
                action,
                target_id,
                e
            );
        }
    }

    async fn append(&self, entry: AuditLogEntry) -> Result<String, StoreError> {
        let data = match serde_json::to_value(&entry)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::Malformed("audit entry".to_string())),
        };
        self.store.add(AUDIT_LOGS, data, Some("timestamp")).await
    }
}
