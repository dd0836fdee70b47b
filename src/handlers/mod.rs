pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod post;
pub mod report;
pub mod user;

pub use auth::*;

use crate::middleware::AdminContext;
use crate::services::dashboard::SessionRegistry;
use crate::services::mutation::MutationOutcome;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// `?confirm=true` acknowledges the action's confirmation prompt.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// Reset the caller's cached pages for every view the action touched.
pub(crate) async fn apply_invalidation(
    sessions: &SessionRegistry,
    admin: &AdminContext,
    outcome: &MutationOutcome,
) {
    if let Some(session) = sessions.get(&admin.session_id) {
        session.lock().await.invalidate(&outcome.invalidated).await;
    }
}
