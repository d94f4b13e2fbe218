//! PostgreSQL adapter: numeric ids pre-allocated from a database sequence
//! before insert.

use crate::descriptor::EntityDescriptor;
use crate::error::{AppError, ConfigError};
use crate::page::{Page, PageRequest, SortSpec};
use crate::sql::{self, BindValue, Dialect, QueryBuf};
use crate::storage::{JsonObject, StorageAdapter};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};

pub struct SequenceAdapter {
    pool: PgPool,
}

impl SequenceAdapter {
    pub fn new(pool: PgPool) -> Self {
        SequenceAdapter { pool }
    }

    fn sequence_name<'a>(&self, desc: &'a EntityDescriptor) -> Result<&'a str, AppError> {
        desc.sequence.as_deref().ok_or_else(|| {
            ConfigError::Invalid {
                entity: desc.name.clone(),
                message: "sequence adapter requires a sequence id strategy".into(),
            }
            .into()
        })
    }

    async fn allocate_id<'e, E: PgExecutor<'e>>(
        &self,
        executor: E,
        sequence: &str,
    ) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT nextval($1::regclass)")
            .bind(sequence)
            .fetch_one(executor)
            .await?;
        Ok(id)
    }

    async fn fetch_optional<'e, E: PgExecutor<'e>>(
        executor: E,
        q: &QueryBuf,
    ) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        let row = query.fetch_optional(executor).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

#[async_trait]
impl StorageAdapter for SequenceAdapter {
    async fn insert(&self, desc: &EntityDescriptor, doc: JsonObject) -> Result<Value, AppError> {
        let sequence = self.sequence_name(desc)?;
        let id = self.allocate_id(&self.pool, sequence).await?;
        let q = sql::insert(Dialect::Postgres, desc, &doc, Some(&Value::from(id)));
        Self::fetch_optional(&self.pool, &q)
            .await?
            .ok_or_else(|| AppError::Persistence("insert returned no row".into()))
    }

    async fn insert_many(
        &self,
        desc: &EntityDescriptor,
        docs: Vec<JsonObject>,
    ) -> Result<Vec<Value>, AppError> {
        let sequence = self.sequence_name(desc)?.to_string();
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in &docs {
            let id = self.allocate_id(&mut *tx, &sequence).await?;
            let q = sql::insert(Dialect::Postgres, desc, doc, Some(&Value::from(id)));
            let row = Self::fetch_optional(&mut *tx, &q)
                .await?
                .ok_or_else(|| AppError::Persistence("insert returned no row".into()))?;
            out.push(row);
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn find_by_id(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(Dialect::Postgres, desc, id);
        Self::fetch_optional(&self.pool, &q).await
    }

    async fn find_all(
        &self,
        desc: &EntityDescriptor,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(Dialect::Postgres, desc, sort, None, None);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn find_page(
        &self,
        desc: &EntityDescriptor,
        req: &PageRequest,
    ) -> Result<Page, AppError> {
        let offset = req
            .offset()
            .ok_or_else(|| AppError::Validation("page number too large".into()))?;
        let count_q = sql::count(Dialect::Postgres, desc);
        let total = sqlx::query_scalar::<_, i64>(&count_q.sql)
            .fetch_one(&self.pool)
            .await?;
        let q = sql::select_list(
            Dialect::Postgres,
            desc,
            req.sort.as_ref(),
            Some(req.size),
            Some(offset),
        );
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        Ok(Page::new(
            rows.iter().map(row_to_json).collect(),
            req.page,
            req.size,
            total.max(0) as u64,
        ))
    }

    async fn update(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
        patch: &JsonObject,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(Dialect::Postgres, desc, id, patch);
        Self::fetch_optional(&self.pool, &q).await
    }

    async fn delete(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let q = sql::delete(Dialect::Postgres, desc, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, desc: &EntityDescriptor) -> Result<u64, AppError> {
        let q = sql::count(Dialect::Postgres, desc);
        let total = sqlx::query_scalar::<_, i64>(&q.sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }

    async fn exists(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let q = sql::select_exists(Dialect::Postgres, desc, id);
        Ok(Self::fetch_optional(&self.pool, &q).await?.is_some())
    }

    async fn exists_matching(
        &self,
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        exclude_id: Option<&Value>,
    ) -> Result<bool, AppError> {
        let q = sql::select_exists_matching(Dialect::Postgres, desc, filters, exclude_id);
        Ok(Self::fetch_optional(&self.pool, &q).await?.is_some())
    }
}

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
