//! Confirmed single-record writes.
//!
//! Every action answers `ConfirmationRequired` with its prompt until called
//! with `confirm = true`, writes, appends an audit entry and reports the
//! views whose cached pages are now stale.

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{require_super_admin, AdminContext};
use crate::models::{
    timestamp, Admin, AdminRole, AuditAction, Post, PostStatus, Report, ReportStatus, TargetType,
    User, UserStatus,
};
use crate::services::audit::AuditRecorder;
use crate::services::identity::{is_valid_email, IdentityProvider};
use crate::services::query::View;
use crate::store::{Document, SharedStore, ADMINS, POSTS, REPORTS, USERS};
use serde::Serialize;
use serde_json::{json, Map, Value};
use utoipa::ToSchema;

/// Views whose pagination state an action makes stale.
pub fn invalidated_by(action: AuditAction) -> &'static [View] {
    match action {
        AuditAction::DeleteUser => &[View::Customers, View::AllUsers, View::Artists, View::Overview],
        AuditAction::SuspendUser | AuditAction::ActivateUser => {
            &[View::Customers, View::AllUsers, View::Artists]
        }
        AuditAction::DeletePost => &[View::Posts, View::Overview, View::Analytics],
        AuditAction::ApproveReport => &[View::Reports, View::Posts, View::Overview, View::Analytics],
        AuditAction::RejectReport => &[View::Reports, View::Overview],
        AuditAction::AddAdmin
        | AuditAction::RemoveAdmin
        | AuditAction::PromoteAdmin
        | AuditAction::DemoteAdmin => &[View::Admins],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MutationOutcome {
    /// Notice shown to the admin.
    pub notice: String,
    pub invalidated: Vec<View>,
}

impl MutationOutcome {
    fn new(action: AuditAction, notice: impl Into<String>) -> Self {
        Self {
            notice: notice.into(),
            invalidated: invalidated_by(action).to_vec(),
        }
    }
}

fn confirmed(confirm: bool, prompt: String) -> AppResult<()> {
    if confirm {
        Ok(())
    } else {
        Err(AppError::ConfirmationRequired(prompt))
    }
}

fn single_field(name: &str, value: Value) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(name.to_string(), value);
    fields
}

pub struct MutationService {
    store: SharedStore,
    audit: AuditRecorder,
}

impl MutationService {
    pub fn new(store: SharedStore, audit: AuditRecorder) -> Self {
        Self { store, audit }
    }

    async fn fetch(&self, collection: &str, id: &str) -> AppResult<Document> {
        self.store.get(collection, id).await?.ok_or(AppError::NotFound)
    }

    pub async fn delete_user(
        &self,
        admin: &AdminContext,
        user_id: &str,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        let user: User = self.fetch(USERS, user_id).await?.decode()?;
        confirmed(
            confirm,
            format!("Delete user \"{}\"? This cannot be undone.", user.display_name()),
        )?;

        self.store.delete(USERS, user_id).await?;
        self.audit
            .record(
                admin,
                AuditAction::DeleteUser,
                user_id,
                TargetType::User,
                format!("Deleted user {}", user.display_name()),
            )
            .await;
        Ok(MutationOutcome::new(AuditAction::DeleteUser, "User deleted successfully!"))
    }

    pub async fn set_user_status(
        &self,
        admin: &AdminContext,
        user_id: &str,
        status: UserStatus,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        let user: User = self.fetch(USERS, user_id).await?.decode()?;
        if user.status() == Some(status) {
            return Err(AppError::Conflict(format!(
                "User is already {}.",
                status.as_str()
            )));
        }

        let (action, verb, notice) = match status {
            UserStatus::Suspended => (AuditAction::SuspendUser, "Suspend", "User suspended."),
            UserStatus::Active => (AuditAction::ActivateUser, "Activate", "User activated."),
        };
        confirmed(confirm, format!("{verb} user \"{}\"?", user.display_name()))?;

        self.store
            .update(USERS, user_id, single_field("status", json!(status.as_str())))
            .await?;
        self.audit
            .record(
                admin,
                action,
                user_id,
                TargetType::User,
                format!("Set status of {} to {}", user.display_name(), status.as_str()),
            )
            .await;
        Ok(MutationOutcome::new(action, notice))
    }

    pub async fn delete_post(
        &self,
        admin: &AdminContext,
        post_id: &str,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        let post: Post = self.fetch(POSTS, post_id).await?.decode()?;
        confirmed(confirm, "Delete this post? This cannot be undone.".to_string())?;

        self.store.delete(POSTS, post_id).await?;
        self.audit
            .record(
                admin,
                AuditAction::DeletePost,
                post_id,
                TargetType::Post,
                format!(
                    "Deleted post by {}",
                    post.artist_name.as_deref().unwrap_or("Unknown")
                ),
            )
            .await;
        Ok(MutationOutcome::new(AuditAction::DeletePost, "Post deleted successfully!"))
    }

    async fn pending_report(&self, report_id: &str) -> AppResult<Report> {
        let report: Report = self.fetch(REPORTS, report_id).await?.decode()?;
        if !report.is_pending() {
            return Err(AppError::Conflict(
                "This report has already been reviewed.".to_string(),
            ));
        }
        Ok(report)
    }

    /// Remove the reported post, then close the report. The two writes are
    /// not atomic; a failure of the second leaves the post removed and is
    /// reported as a partial failure.
    pub async fn approve_report(
        &self,
        admin: &AdminContext,
        report_id: &str,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        let report = self.pending_report(report_id).await?;
        let post_id = report
            .post_id
            .clone()
            .ok_or_else(|| AppError::Validation("This report has no post to remove.".to_string()))?;
        confirmed(confirm, "This will remove the reported post. Continue?".to_string())?;

        self.store
            .update(
                POSTS,
                &post_id,
                single_field("status", json!(PostStatus::Removed.as_str())),
            )
            .await?;

        if let Err(e) = self
            .store
            .update(
                REPORTS,
                report_id,
                single_field("status", json!(ReportStatus::Reviewed.as_str())),
            )
            .await
        {
            // The post is already removed.
            self.audit
                .record(
                    admin,
                    AuditAction::ApproveReport,
                    report_id,
                    TargetType::Report,
                    format!("Removed post {post_id}; report still pending"),
                )
                .await;
            return Err(AppError::PartialFailure(format!(
                "post {post_id} was removed but report {report_id} is still pending: {e}"
            )));
        }

        self.audit
            .record(
                admin,
                AuditAction::ApproveReport,
                report_id,
                TargetType::Report,
                format!("Approved report, removed post {post_id}"),
            )
            .await;
        Ok(MutationOutcome::new(
            AuditAction::ApproveReport,
            "Report approved. Post removed.",
        ))
    }

    pub async fn reject_report(
        &self,
        admin: &AdminContext,
        report_id: &str,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        self.pending_report(report_id).await?;
        confirmed(confirm, "Mark report as reviewed without action?".to_string())?;

        self.store
            .update(
                REPORTS,
                report_id,
                single_field("status", json!(ReportStatus::Reviewed.as_str())),
            )
            .await?;
        self.audit
            .record(
                admin,
                AuditAction::RejectReport,
                report_id,
                TargetType::Report,
                "Rejected report without action",
            )
            .await;
        Ok(MutationOutcome::new(AuditAction::RejectReport, "Report rejected."))
    }

    /// Grant admin access to the identity registered under `email`. Without
    /// an identity, `password` creates one.
    pub async fn add_admin(
        &self,
        admin: &AdminContext,
        identities: &dyn IdentityProvider,
        email: &str,
        role: AdminRole,
        password: Option<&str>,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        require_super_admin(admin)?;
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email address format.".to_string()));
        }

        let existing = identities.lookup_by_email(email).await?;
        if let Some(identity) = &existing {
            if self.store.get(ADMINS, &identity.id).await?.is_some() {
                return Err(AppError::Conflict(format!("{} is already an admin.", identity.email)));
            }
        } else if password.is_none() {
            return Err(AppError::Validation(format!(
                "No account exists for {email}. Provide a password to create one."
            )));
        }
        confirmed(confirm, format!("Grant {} access to {email}?", role.as_str()))?;

        let identity = match (existing, password) {
            (Some(identity), _) => identity,
            (None, Some(password)) => identities.create_identity(email, password).await?,
            (None, None) => return Err(AppError::NotFound),
        };

        let record = Admin {
            id: identity.id.clone(),
            email: identity.email.clone(),
            role,
            created_at: None,
        };
        let mut data = serde_json::to_value(&record).map_err(|e| AppError::Internal(e.into()))?;
        if let Value::Object(map) = &mut data {
            map.insert("createdAt".to_string(), json!(timestamp::now()));
        }
        self.store.set(ADMINS, &identity.id, data).await?;

        self.audit
            .record(
                admin,
                AuditAction::AddAdmin,
                &identity.id,
                TargetType::Admin,
                format!("Added {} as {}", identity.email, role.as_str()),
            )
            .await;
        Ok(MutationOutcome::new(AuditAction::AddAdmin, "Admin added."))
    }

    pub async fn remove_admin(
        &self,
        admin: &AdminContext,
        target_id: &str,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        require_super_admin(admin)?;
        if target_id == admin.id {
            return Err(AppError::Validation(
                "You cannot remove your own admin access.".to_string(),
            ));
        }
        let target: Admin = self.fetch(ADMINS, target_id).await?.decode()?;
        confirmed(confirm, format!("Remove admin access for {}?", target.email))?;

        self.store.delete(ADMINS, target_id).await?;
        self.audit
            .record(
                admin,
                AuditAction::RemoveAdmin,
                target_id,
                TargetType::Admin,
                format!("Removed admin {}", target.email),
            )
            .await;
        Ok(MutationOutcome::new(AuditAction::RemoveAdmin, "Admin removed."))
    }

    pub async fn set_admin_role(
        &self,
        admin: &AdminContext,
        target_id: &str,
        role: AdminRole,
        confirm: bool,
    ) -> AppResult<MutationOutcome> {
        require_super_admin(admin)?;
        if target_id == admin.id {
            return Err(AppError::Validation("You cannot change your own role.".to_string()));
        }
        let target: Admin = self.fetch(ADMINS, target_id).await?.decode()?;
        if target.role == role {
            return Err(AppError::Conflict(format!(
                "{} is already {}.",
                target.email,
                role.as_str()
            )));
        }

        let (action, prompt, notice) = match role {
            AdminRole::SuperAdmin => (
                AuditAction::PromoteAdmin,
                format!("Promote {} to super-admin?", target.email),
                "Admin promoted.",
            ),
            AdminRole::Admin => (
                AuditAction::DemoteAdmin,
                format!("Demote {} to admin?", target.email),
                "Admin demoted.",
            ),
        };
        confirmed(confirm, prompt)?;

        self.store
            .update(ADMINS, target_id, single_field("role", json!(role.as_str())))
            .await?;
        self.audit
            .record(
                admin,
                action,
                target_id,
                TargetType::Admin,
                format!("Changed role of {} to {}", target.email, role.as_str()),
            )
            .await;
        Ok(MutationOutcome::new(action, notice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditLogEntry;
    use crate::services::email::EmailService;
    use crate::services::identity::LocalIdentityProvider;
    use crate::store::{DocumentStore, MemoryStore, StoreQuery, AUDIT_LOGS};
    use std::sync::Arc;

    fn context(id: &str, role: AdminRole) -> AdminContext {
        AdminContext {
            id: id.to_string(),
            email: format!("{id}@artisans.test"),
            role,
            session_id: "sess".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    async fn setup() -> (MemoryStore, MutationService) {
        let store = MemoryStore::new();
        store
            .set(USERS, "u1", json!({"name": "Ana", "role": "artist", "status": "active"}))
            .await
            .unwrap();
        store
            .set(POSTS, "p1", json!({"artistName": "Ana", "status": "active"}))
            .await
            .unwrap();
        store
            .set(REPORTS, "r1", json!({"postId": "p1", "reason": "spam", "status": "pending"}))
            .await
            .unwrap();
        store
            .set(REPORTS, "r2", json!({"reason": "orphan", "status": "pending"}))
            .await
            .unwrap();
        let shared: SharedStore = Arc::new(store.clone());
        let service = MutationService::new(shared.clone(), AuditRecorder::new(shared));
        (store, service)
    }

    async fn audit_entries(store: &MemoryStore) -> Vec<AuditLogEntry> {
        store
            .query(&StoreQuery::collection(AUDIT_LOGS))
            .await
            .unwrap()
            .iter()
            .map(|d| d.decode().unwrap())
            .collect()
    }

    async fn status_of(store: &MemoryStore, collection: &str, id: &str) -> String {
        store
            .get(collection, id)
            .await
            .unwrap()
            .unwrap()
            .str_field("status")
            .unwrap()
            .to_string()
    }

    #[test]
    fn deleting_a_user_leaves_posts_alone() {
        let views = invalidated_by(AuditAction::DeleteUser);
        for view in [View::Artists, View::Customers, View::AllUsers, View::Overview] {
            assert!(views.contains(&view));
        }
        assert!(!views.contains(&View::Posts));
    }

    #[tokio::test]
    async fn unconfirmed_action_writes_nothing() {
        let (store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        let err = service.delete_user(&admin, "u1", false).await.unwrap_err();
        match err {
            AppError::ConfirmationRequired(prompt) => {
                assert_eq!(prompt, "Delete user \"Ana\"? This cannot be undone.")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.get(USERS, "u1").await.unwrap().is_some());
        assert!(audit_entries(&store).await.is_empty());
    }

    #[tokio::test]
    async fn delete_user_audits_and_invalidates() {
        let (store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        let outcome = service.delete_user(&admin, "u1", true).await.unwrap();
        assert_eq!(outcome.notice, "User deleted successfully!");
        assert!(outcome.invalidated.contains(&View::Artists));
        assert!(store.get(USERS, "u1").await.unwrap().is_none());

        let entries = audit_entries(&store).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::DeleteUser);
        assert_eq!(entries[0].target_id, "u1");
        assert_eq!(entries[0].admin_id, "a1");
    }

    #[tokio::test]
    async fn suspend_then_suspend_again_conflicts() {
        let (store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        service
            .set_user_status(&admin, "u1", UserStatus::Suspended, true)
            .await
            .unwrap();
        assert_eq!(status_of(&store, USERS, "u1").await, "suspended");
        let again = service
            .set_user_status(&admin, "u1", UserStatus::Suspended, true)
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn approve_removes_post_and_reviews_report() {
        let (store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        let outcome = service.approve_report(&admin, "r1", true).await.unwrap();
        assert_eq!(outcome.notice, "Report approved. Post removed.");
        assert_eq!(
            outcome.invalidated,
            vec![View::Reports, View::Posts, View::Overview, View::Analytics]
        );
        assert_eq!(status_of(&store, POSTS, "p1").await, "removed");
        assert_eq!(status_of(&store, REPORTS, "r1").await, "reviewed");

        let twice = service.approve_report(&admin, "r1", true).await;
        assert!(matches!(twice, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn reject_leaves_post_active() {
        let (store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        service.reject_report(&admin, "r1", true).await.unwrap();
        assert_eq!(status_of(&store, POSTS, "p1").await, "active");
        assert_eq!(status_of(&store, REPORTS, "r1").await, "reviewed");
        assert!(matches!(
            service.reject_report(&admin, "r1", true).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn approving_without_post_is_invalid() {
        let (_store, service) = setup().await;
        let admin = context("a1", AdminRole::Admin);
        let result = service.approve_report(&admin, "r2", true).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn second_write_failure_is_partial() {
        let (store, service) = setup().await;
        store.fail_writes_to(REPORTS);
        let admin = context("a1", AdminRole::Admin);
        let result = service.approve_report(&admin, "r1", true).await;
        assert!(matches!(result, Err(AppError::PartialFailure(_))));
        assert_eq!(status_of(&store, POSTS, "p1").await, "removed");
        assert_eq!(status_of(&store, REPORTS, "r1").await, "pending");

        let entries = audit_entries(&store).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::ApproveReport);
        assert_eq!(entries[0].target_id, "r1");
        assert!(entries[0].details.contains("still pending"));
    }

    #[tokio::test]
    async fn admin_management_needs_super_admin() {
        let (store, service) = setup().await;
        let identities =
            LocalIdentityProvider::new(Arc::new(store.clone()), EmailService::disabled());
        let plain = context("a1", AdminRole::Admin);
        let result = service
            .add_admin(&plain, &identities, "new@artisans.test", AdminRole::Admin, Some("secret1"), true)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn super_admin_adds_promotes_and_removes() {
        let (store, service) = setup().await;
        let identities =
            LocalIdentityProvider::new(Arc::new(store.clone()), EmailService::disabled());
        let root = context("root", AdminRole::SuperAdmin);

        let missing_password = service
            .add_admin(&root, &identities, "new@artisans.test", AdminRole::Admin, None, true)
            .await;
        assert!(matches!(missing_password, Err(AppError::Validation(_))));

        service
            .add_admin(&root, &identities, "new@artisans.test", AdminRole::Admin, Some("secret1"), true)
            .await
            .unwrap();
        let identity = identities
            .lookup_by_email("new@artisans.test")
            .await
            .unwrap()
            .unwrap();
        let duplicate = service
            .add_admin(&root, &identities, "new@artisans.test", AdminRole::Admin, None, true)
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let outcome = service
            .set_admin_role(&root, &identity.id, AdminRole::SuperAdmin, true)
            .await
            .unwrap();
        assert_eq!(outcome.invalidated, vec![View::Admins]);
        let record: Admin = store.get(ADMINS, &identity.id).await.unwrap().unwrap().decode().unwrap();
        assert_eq!(record.role, AdminRole::SuperAdmin);

        service.remove_admin(&root, &identity.id, true).await.unwrap();
        assert!(store.get(ADMINS, &identity.id).await.unwrap().is_none());

        let actions: Vec<AuditAction> = audit_entries(&store).await.iter().map(|e| e.action).collect();
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&AuditAction::AddAdmin));
        assert!(actions.contains(&AuditAction::PromoteAdmin));
        assert!(actions.contains(&AuditAction::RemoveAdmin));
    }

    #[tokio::test]
    async fn super_admin_cannot_touch_own_record() {
        let (_store, service) = setup().await;
        let root = context("root", AdminRole::SuperAdmin);
        assert!(matches!(
            service.remove_admin(&root, "root", true).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.set_admin_role(&root, "root", AdminRole::Admin, true).await,
            Err(AppError::Validation(_))
        ));
    }
}
