//! Per-session dashboard state.
//!
//! Every signed-in session owns one [`DashboardSession`]: the pagination
//! state of each list view, the category-count cache and the live count of
//! pending reports. The registry hands them out behind a mutex so that one
//! session's navigations run one at a time.

use crate::config::dashboard::DashboardConfig;
use crate::services::category_cache::CategoryCache;
use crate::services::pagination::ViewState;
use crate::services::query::View;
use crate::store::{CountSubscription, DocumentStore, FieldFilter, SharedStore, REPORTS};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct DashboardSession {
    admin_id: String,
    views: HashMap<View, ViewState>,
    categories: Arc<CategoryCache>,
    pending_reports: Option<CountSubscription>,
}

impl DashboardSession {
    /// Fresh session with the pending-report subscription attached. A failed
    /// subscription leaves the session usable without a live count.
    pub async fn start(store: &dyn DocumentStore, admin_id: &str, config: &DashboardConfig) -> Self {
        let pending_reports = match store
            .watch_count(REPORTS, vec![FieldFilter::eq("status", "pending")])
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!("Pending report subscription failed for {}: {}", admin_id, e);
                None
            }
        };

        Self {
            admin_id: admin_id.to_string(),
            views: HashMap::new(),
            categories: Arc::new(CategoryCache::new(config.category_cache_ttl)),
            pending_reports,
        }
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }

    pub fn view(&self, view: View) -> Option<&ViewState> {
        self.views.get(&view)
    }

    pub fn view_mut(&mut self, view: View) -> &mut ViewState {
        self.views.entry(view).or_default()
    }

    pub fn categories(&self) -> Arc<CategoryCache> {
        self.categories.clone()
    }

    /// Drop the pagination state of `views`. Overview and analytics also
    /// discard the cached category counts.
    pub async fn invalidate(&mut self, views: &[View]) {
        for view in views {
            if let Some(state) = self.views.get_mut(view) {
                state.reset();
            }
        }
        if views
            .iter()
            .any(|v| matches!(v, View::Overview | View::Analytics))
        {
            self.categories.invalidate().await;
        }
    }

    pub fn pending_count(&self) -> Option<u64> {
        self.pending_reports.as_ref().map(CountSubscription::current)
    }

    pub fn pending_receiver(&self) -> Option<watch::Receiver<u64>> {
        self.pending_reports.as_ref().map(CountSubscription::receiver)
    }
}

pub type SharedSession = Arc<Mutex<DashboardSession>>;

struct SessionEntry {
    session: SharedSession,
    expires_at: DateTime<Utc>,
}

type SessionMap = DashMap<String, SessionEntry>;

/// All live dashboard sessions, keyed by session id.
///
/// Entries outlive their token only until the next sweep; see
/// [`SessionRegistry::spawn_sweeper`].
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    store: SharedStore,
    config: DashboardConfig,
}

impl SessionRegistry {
    pub fn new(store: SharedStore, config: DashboardConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            config,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().session.clone())
    }

    /// Existing session, or a new one when this is the session's first
    /// guarded request. `expires_at` is the token expiry.
    pub async fn get_or_start(
        &self,
        session_id: &str,
        admin_id: &str,
        expires_at: DateTime<Utc>,
    ) -> SharedSession {
        if let Some(mut existing) = self.sessions.get_mut(session_id) {
            existing.expires_at = existing.expires_at.max(expires_at);
            return existing.session.clone();
        }

        let fresh = DashboardSession::start(self.store.as_ref(), admin_id, &self.config).await;
        // A concurrent first request may have won; keep whichever landed first.
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Arc::new(Mutex::new(fresh)),
                expires_at,
            })
            .value()
            .session
            .clone()
    }

    /// Replace the session with a fresh one, resubscribing the live count.
    pub async fn restart(
        &self,
        session_id: &str,
        admin_id: &str,
        expires_at: DateTime<Utc>,
    ) -> SharedSession {
        let fresh = Arc::new(Mutex::new(
            DashboardSession::start(self.store.as_ref(), admin_id, &self.config).await,
        ));
        let entry = SessionEntry {
            session: fresh.clone(),
            expires_at,
        };
        if self.sessions.insert(session_id.to_string(), entry).is_some() {
            tracing::debug!("Dashboard session {} re-initialised", session_id);
        }
        fresh
    }

    /// Tear down the session and its subscription.
    pub fn release(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            tracing::debug!("Dashboard session {} released", session_id);
        }
        removed
    }

    /// Release every session whose token expired at or before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        sweep(&self.sessions, now)
    }

    /// Sweep expired sessions every `period` for as long as the registry is
    /// alive.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let sessions = Arc::downgrade(&self.sessions);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(sessions) = sessions.upgrade() else {
                    break;
                };
                sweep(&sessions, Utc::now());
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn sweep(sessions: &SessionMap, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|session_id, entry| {
        let live = entry.expires_at > now;
        if !live {
            tracing::debug!("Dashboard session {} expired", session_id);
        }
        live
    });
    let swept = before.saturating_sub(sessions.len());
    if swept > 0 {
        tracing::info!("Released {} expired dashboard sessions", swept);
    }
    swept
}
