//! Document store abstraction.
//!
//! Admin data lives in named collections of JSON documents. Backends answer
//! filtered, single-field-sorted, cursor-bounded reads and single-document
//! writes, and can publish a live count for a filtered collection.

pub mod memory;
pub mod postgres;
pub mod subscription;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use subscription::CountSubscription;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const REPORTS: &str = "reports";
pub const RATINGS: &str = "ratings";
pub const ADMINS: &str = "admins";
pub const AUDIT_LOGS: &str = "audit_logs";
pub const IDENTITIES: &str = "identities";
pub const SESSIONS: &str = "sessions";
pub const PASSWORD_RESETS: &str = "password_resets";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("cursor was produced by a different query")]
    CursorMismatch,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Malformed(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document: its id plus the JSON object body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Deserialize the body into a typed record, injecting the document id
    /// as the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        match &mut data {
            Value::Object(map) => {
                map.insert("id".to_string(), Value::String(self.id.clone()));
            }
            _ => {
                return Err(StoreError::Malformed(format!(
                    "document {} is not an object",
                    self.id
                )))
            }
        }
        Ok(serde_json::from_value(data)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Gte,
    Lt,
}

/// One server-side condition on a document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }

    /// Missing fields never match, for every operator.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        let ord = compare_values(actual, &self.value);
        match self.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Gte => {
                same_kind(actual, &self.value) && ord != Ordering::Less
            }
            FilterOp::Lt => same_kind(actual, &self.value) && ord == Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Opaque position of a record inside one query's ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub sort_value: Value,
    pub id: String,
    pub shape: u64,
}

impl Cursor {
    pub fn from_document(doc: &Document, order: Option<&OrderBy>, shape: u64) -> Self {
        let sort_value = order
            .and_then(|o| doc.field(&o.field).cloned())
            .unwrap_or(Value::Null);
        Self {
            sort_value,
            id: doc.id.clone(),
            shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    StartAfter,
    StartAt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub kind: BoundKind,
    pub cursor: Cursor,
}

/// A read request as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order: Option<OrderBy>,
    pub bound: Option<Bound>,
    pub limit: Option<usize>,
    /// Fingerprint of the query shape; cursors must carry the same value.
    pub shape: u64,
}

impl StoreQuery {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order: None,
            bound: None,
            limit: None,
            shape: 0,
        }
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn check_cursor(&self) -> StoreResult<()> {
        match &self.bound {
            Some(bound) if bound.cursor.shape != self.shape => Err(StoreError::CursorMismatch),
            _ => Ok(()),
        }
    }

    /// Whether `doc` lies inside the bound, given the query ordering.
    pub fn within_bound(&self, doc: &Document) -> bool {
        let Some(bound) = &self.bound else {
            return true;
        };
        let doc_value = self
            .order
            .as_ref()
            .and_then(|o| doc.field(&o.field))
            .unwrap_or(&Value::Null);
        let ord = compare_values(doc_value, &bound.cursor.sort_value)
            .then_with(|| doc.id.cmp(&bound.cursor.id));
        let ord = match self.order.as_ref().map(|o| o.direction) {
            Some(Direction::Desc) => ord.reverse(),
            _ => ord,
        };
        match bound.kind {
            BoundKind::StartAfter => ord == Ordering::Greater,
            BoundKind::StartAt => ord != Ordering::Less,
        }
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a filtered, ordered, bounded read. Documents missing the order
    /// field are excluded; ties on the order field break by document id.
    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, filters: &[FieldFilter]) -> StoreResult<u64>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Merge fields into an existing document; fails with `NotFound` when it
    /// does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Map<String, Value>)
        -> StoreResult<()>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Insert under a generated id. When `timestamp_field` is set the store
    /// writes its own current time into that field.
    async fn add(
        &self,
        collection: &str,
        data: Map<String, Value>,
        timestamp_field: Option<&str>,
    ) -> StoreResult<String>;

    /// Live count of the documents matching `filters`.
    async fn watch_count(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
    ) -> StoreResult<CountSubscription>;

    async fn ping(&self) -> bool {
        true
    }
}

pub type SharedStore = Arc<dyn DocumentStore>;
