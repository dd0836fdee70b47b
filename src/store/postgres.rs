use super::{
    CountSubscription, Direction, Document, DocumentStore, FieldFilter, FilterOp, StoreError,
    StoreQuery, StoreResult,
};
use crate::models::{document, timestamp, DocumentEntity};
use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, EntityTrait, Statement, Value as SqlValue,
};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Document store over a single JSONB `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    db: DatabaseConnection,
    poll_interval: Duration,
}

impl PgDocumentStore {
    pub fn new(db: DatabaseConnection, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }
}

struct SqlBuilder {
    sql: String,
    values: Vec<SqlValue>,
}

impl SqlBuilder {
    fn new(base: &str) -> Self {
        Self {
            sql: base.to_string(),
            values: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder.
    fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    fn build(self) -> Statement {
        Statement::from_sql_and_values(DatabaseBackend::Postgres, self.sql, self.values)
    }
}

fn json_param(value: &Value) -> SqlValue {
    SqlValue::Json(Some(Box::new(value.clone())))
}

fn push_where(builder: &mut SqlBuilder, collection: &str, filters: &[FieldFilter]) {
    let collection = builder.bind(collection.to_string());
    builder.push(&format!(" WHERE collection = {collection}"));

    for filter in filters {
        let field = builder.bind(filter.field.clone());
        let value = builder.bind(json_param(&filter.value));
        match filter.op {
            FilterOp::Eq => builder.push(&format!(" AND data -> {field} = {value}::jsonb")),
            FilterOp::Gte | FilterOp::Lt => {
                let op = if filter.op == FilterOp::Gte { ">=" } else { "<" };
                builder.push(&format!(
                    " AND jsonb_typeof(data -> {field}) = jsonb_typeof({value}::jsonb) \
                     AND data -> {field} {op} {value}::jsonb"
                ));
            }
        }
    }
}

async fn count_rows(
    db: &DatabaseConnection,
    collection: &str,
    filters: &[FieldFilter],
) -> StoreResult<u64> {
    let mut builder = SqlBuilder::new("SELECT COUNT(*) AS count FROM documents");
    push_where(&mut builder, collection, filters);

    let row = db.query_one(builder.build()).await?;
    let count = match row {
        Some(row) => row.try_get::<i64>("", "count")?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn query(&self, query: &StoreQuery) -> StoreResult<Vec<Document>> {
        query.check_cursor()?;

        let mut builder = SqlBuilder::new("SELECT id, data FROM documents");
        push_where(&mut builder, &query.collection, &query.filters);

        let order_field = query
            .order
            .as_ref()
            .map(|order| builder.bind(order.field.clone()));
        let descending = matches!(
            query.order.as_ref().map(|o| o.direction),
            Some(Direction::Desc)
        );

        if let Some(field) = &order_field {
            builder.push(&format!(
                " AND data -> {field} IS NOT NULL AND data -> {field} <> 'null'::jsonb"
            ));
        }

        if let Some(bound) = &query.bound {
            let op = match (descending, bound.kind) {
                (true, super::BoundKind::StartAfter) => "<",
                (true, super::BoundKind::StartAt) => "<=",
                (false, super::BoundKind::StartAfter) => ">",
                (false, super::BoundKind::StartAt) => ">=",
            };
            let id = builder.bind(bound.cursor.id.clone());
            match &order_field {
                Some(field) => {
                    let value = builder.bind(json_param(&bound.cursor.sort_value));
                    builder.push(&format!(
                        " AND (data -> {field}, id) {op} ({value}::jsonb, {id})"
                    ));
                }
                None => builder.push(&format!(" AND id {op} {id}")),
            }
        }

        let direction = if descending { "DESC" } else { "ASC" };
        match &order_field {
            Some(field) => builder.push(&format!(
                " ORDER BY data -> {field} {direction}, id {direction}"
            )),
            None => builder.push(" ORDER BY id ASC"),
        }

        if let Some(limit) = query.limit {
            let limit = builder.bind(limit as i64);
            builder.push(&format!(" LIMIT {limit}"));
        }

        let rows = self.db.query_all(builder.build()).await?;
        rows.into_iter()
            .map(|row| {
                let id = row.try_get::<String>("", "id")?;
                let data = row.try_get::<Value>("", "data")?;
                Ok(Document::new(id, data))
            })
            .collect()
    }

    async fn count(&self, collection: &str, filters: &[FieldFilter]) -> StoreResult<u64> {
        count_rows(&self.db, collection, filters).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row = DocumentEntity::find_by_id((collection.to_string(), id.to_string()))
            .one(&self.db)
            .await?;
        Ok(row.map(|m| Document::new(m.id, m.data)))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        if !data.is_object() {
            return Err(StoreError::Malformed(format!(
                "document {collection}/{id} must be an object"
            )));
        }
        let now = chrono::Utc::now().fixed_offset();
        let model = document::ActiveModel {
            collection: Set(collection.to_string()),
            id: Set(id.to_string()),
            data: Set(data),
            created_at: Set(now),
            updated_at: Set(now),
        };

        DocumentEntity::insert(model)
            .on_conflict(
                OnConflict::columns([document::Column::Collection, document::Column::Id])
                    .update_columns([document::Column::Data, document::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut builder = SqlBuilder::new("UPDATE documents SET data = data || ");
        let patch = builder.bind(json_param(&Value::Object(fields)));
        builder.push(&format!("{patch}::jsonb, updated_at = NOW()"));
        let collection_param = builder.bind(collection.to_string());
        let id_param = builder.bind(id.to_string());
        builder.push(&format!(
            " WHERE collection = {collection_param} AND id = {id_param}"
        ));

        let result = self.db.execute(builder.build()).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        DocumentEntity::delete_by_id((collection.to_string(), id.to_string()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn add(
        &self,
        collection: &str,
        mut data: Map<String, Value>,
        timestamp_field: Option<&str>,
    ) -> StoreResult<String> {
        if let Some(field) = timestamp_field {
            data.insert(field.to_string(), Value::String(timestamp::now()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set(collection, &id, Value::Object(data)).await?;
        Ok(id)
    }

    async fn watch_count(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
    ) -> StoreResult<CountSubscription> {
        let initial = count_rows(&self.db, collection, &filters).await?;
        let (tx, rx) = watch::channel(initial);

        let db = self.db.clone();
        let period = self.poll_interval;
        let collection = collection.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the initial count is already published.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match count_rows(&db, &collection, &filters).await {
                    Ok(count) => {
                        tx.send_if_modified(|current| {
                            if *current == count {
                                false
                            } else {
                                *current = count;
                                true
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Live count poll on {} failed: {}", collection, e),
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(CountSubscription::new(rx, task))
    }

    async fn ping(&self) -> bool {
        self.db.ping().await.is_ok()
    }
}
