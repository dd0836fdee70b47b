use crate::store::{DocumentStore, StoreQuery, StoreResult, POSTS};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Post counts per category at one point in time.
#[derive(Debug, Clone)]
pub struct CategorySnapshot {
    pub counts: BTreeMap<String, u64>,
    pub taken_at: Instant,
}

impl CategorySnapshot {
    pub fn labels_and_values(&self) -> (Vec<String>, Vec<u64>) {
        self.counts
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .unzip()
    }
}

/// Per-session cache of the posts-by-category counts. Snapshots are replaced
/// wholesale, never edited.
#[derive(Debug)]
pub struct CategoryCache {
    snapshot: RwLock<Option<Arc<CategorySnapshot>>>,
    ttl: Duration,
}

impl CategoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: RwLock::new(None),
            ttl,
        }
    }

    /// Current snapshot, recomputed from the store once it is older than the TTL.
    pub async fn get_or_refresh(&self, store: &dyn DocumentStore) -> StoreResult<Arc<CategorySnapshot>> {
        if let Some(snapshot) = self.fresh().await {
            return Ok(snapshot);
        }

        let posts = store.query(&StoreQuery::collection(POSTS)).await?;
        let mut counts = BTreeMap::new();
        for post in &posts {
            let category = post.str_field("category").unwrap_or("Unknown");
            *counts.entry(category.to_string()).or_insert(0u64) += 1;
        }

        let snapshot = Arc::new(CategorySnapshot {
            counts,
            taken_at: Instant::now(),
        });
        *self.snapshot.write().await = Some(snapshot.clone());
        tracing::debug!("Category counts refreshed from {} posts", posts.len());
        Ok(snapshot)
    }

    async fn fresh(&self) -> Option<Arc<CategorySnapshot>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|s| s.taken_at.elapsed() < self.ttl)
            .cloned()
    }

    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }
}
