use super::{
    compare_values, CountSubscription, Direction, Document, DocumentStore, FieldFilter,
    StoreError, StoreQuery, StoreResult,
};
use crate::models::timestamp;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// In-process document store. Cheap to clone; clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: RwLock<Collections>,
    // Bumped on every write; live counts recompute when it moves.
    revision: watch::Sender<u64>,
    lookups: DashMap<String, usize>,
    failing_writes: DashSet<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                revision,
                lookups: DashMap::new(),
                failing_writes: DashSet::new(),
            }),
        }
    }

    /// Number of single-document `get` calls made against `collection`.
    pub fn lookups(&self, collection: &str) -> usize {
        self.inner
            .lookups
            .get(collection)
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    pub fn reset_lookups(&self) {
        self.inner.lookups.clear();
    }

    /// Make every subsequent write to `collection` fail as unavailable.
    pub fn fail_writes_to(&self, collection: &str) {
        self.inner.failing_writes.insert(collection.to_string());
    }

    pub fn restore_writes_to(&self, collection: &str) {
        self.inner.failing_writes.remove(collection);
    }

    fn check_writable(&self, collection: &str) -> StoreResult<()> {
        if self.inner.failing_writes.contains(collection) {
            return Err(StoreError::Unavailable(format!(
                "writes to {collection} are failing"
            )));
        }
        Ok(())
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    async fn count_now(&self, collection: &str, filters: &[FieldFilter]) -> u64 {
        let collections = self.inner.collections.read().await;
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(id, data)| {
                        let doc = Document::new(id.as_str(), (*data).clone());
                        filters.iter().all(|f| f.matches(&doc))
                    })
                    .count() as u64
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<Document>> {
        query.check_cursor()?;

        let collections = self.inner.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .filter(|doc| query.filters.iter().all(|f| f.matches(doc)))
            .filter(|doc| {
                query
                    .order
                    .as_ref()
                    .map_or(true, |order| doc.field(&order.field).is_some())
            })
            .filter(|doc| query.within_bound(doc))
            .collect();
        drop(collections);

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    a.field(&order.field).unwrap_or(&Value::Null),
                    b.field(&order.field).unwrap_or(&Value::Null),
                )
                .then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count(&self, collection: &str, filters: &[FieldFilter]) -> StoreResult<u64> {
        Ok(self.count_now(collection, filters).await)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        *self
            .inner
            .lookups
            .entry(collection.to_string())
            .or_insert(0) += 1;

        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        self.check_writable(collection)?;
        if !data.is_object() {
            return Err(StoreError::Malformed(format!(
                "document {collection}/{id} must be an object"
            )));
        }
        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        self.bump_revision();
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        self.check_writable(collection)?;
        {
            let mut collections = self.inner.collections.write().await;
            let existing = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            existing.extend(fields);
        }
        self.bump_revision();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check_writable(collection)?;
        let removed = self
            .inner
            .collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            self.bump_revision();
        }
        Ok(())
    }

    async fn add(
        &self,
        collection: &str,
        mut data: Map<String, Value>,
        timestamp_field: Option<&str>,
    ) -> StoreResult<String> {
        self.check_writable(collection)?;
        if let Some(field) = timestamp_field {
            data.insert(field.to_string(), Value::String(timestamp::now()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Value::Object(data));
        self.bump_revision();
        Ok(id)
    }

    async fn watch_count(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
    ) -> StoreResult<CountSubscription> {
        let mut revisions = self.inner.revision.subscribe();
        let initial = self.count_now(collection, &filters).await;
        let (tx, rx) = watch::channel(initial);

        let store = self.clone();
        let collection = collection.to_string();
        let task = tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                let count = store.count_now(&collection, &filters).await;
                tx.send_if_modified(|current| {
                    if *current == count {
                        false
                    } else {
                        *current = count;
                        true
                    }
                });
                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(CountSubscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Bound, BoundKind, Cursor};
    use serde_json::json;
    use std::time::Duration;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, role, created) in [
            ("u1", "artist", "2025-01-01T00:00:00.000Z"),
            ("u2", "customer", "2025-01-02T00:00:00.000Z"),
            ("u3", "artist", "2025-01-03T00:00:00.000Z"),
            ("u4", "artist", "2025-01-04T00:00:00.000Z"),
        ] {
            store
                .set("users", id, json!({"role": role, "createdAt": created}))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn query_filters_sorts_and_limits() {
        let store = seeded().await;
        let query = StoreQuery::collection("users")
            .filter(FieldFilter::eq("role", "artist"))
            .order_by("createdAt", Direction::Desc)
            .limit(2);
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["u4", "u3"]);
    }

    #[tokio::test]
    async fn query_resumes_after_cursor() {
        let store = seeded().await;
        let mut query = StoreQuery::collection("users").order_by("createdAt", Direction::Desc);
        query.bound = Some(Bound {
            kind: BoundKind::StartAfter,
            cursor: Cursor {
                sort_value: json!("2025-01-03T00:00:00.000Z"),
                id: "u3".to_string(),
                shape: 0,
            },
        });
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u1"]);
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("reviewed"));
        let err = store.update("reports", "nope", fields).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn add_stamps_server_time() {
        let store = MemoryStore::new();
        let id = store
            .add("audit_logs", Map::new(), Some("timestamp"))
            .await
            .unwrap();
        let doc = store.get("audit_logs", &id).await.unwrap().unwrap();
        assert!(doc.str_field("timestamp").is_some());
    }

    #[tokio::test]
    async fn failing_writes_are_reported() {
        let store = MemoryStore::new();
        store.fail_writes_to("posts");
        let err = store.set("posts", "p1", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.restore_writes_to("posts");
        store.set("posts", "p1", json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn live_count_follows_writes_and_stops_on_drop() {
        let store = MemoryStore::new();
        store
            .set("reports", "r1", json!({"status": "pending"}))
            .await
            .unwrap();

        let mut sub = store
            .watch_count("reports", vec![FieldFilter::eq("status", "pending")])
            .await
            .unwrap();
        assert_eq!(sub.current(), 1);

        store
            .set("reports", "r2", json!({"status": "pending"}))
            .await
            .unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), sub.changed())
            .await
            .unwrap();
        assert_eq!(next, Some(2));

        let mut receiver = sub.receiver();
        drop(sub);
        let closed = tokio::time::timeout(Duration::from_secs(1), receiver.changed())
            .await
            .unwrap();
        assert!(closed.is_err());
    }
}
