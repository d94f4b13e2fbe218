//! MySQL adapter: the database assigns the numeric id on insert
//! (auto-increment); the adapter reads it back and re-selects the row.

use crate::descriptor::EntityDescriptor;
use crate::error::AppError;
use crate::page::{Page, PageRequest, SortSpec};
use crate::sql::{self, BindValue, Dialect, QueryBuf};
use crate::storage::{JsonObject, StorageAdapter};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlQueryResult, MySqlRow};
use sqlx::{MySqlExecutor, MySqlPool, Row};

pub struct IdentityAdapter {
    pool: MySqlPool,
}

impl IdentityAdapter {
    pub fn new(pool: MySqlPool) -> Self {
        IdentityAdapter { pool }
    }

    async fn execute<'e, E: MySqlExecutor<'e>>(
        executor: E,
        q: &QueryBuf,
    ) -> Result<MySqlQueryResult, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        Ok(query.execute(executor).await?)
    }

    async fn fetch_optional<'e, E: MySqlExecutor<'e>>(
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
impl StorageAdapter for IdentityAdapter {
    async fn insert(&self, desc: &EntityDescriptor, doc: JsonObject) -> Result<Value, AppError> {
        let q = sql::insert(Dialect::MySql, desc, &doc, None);
        let result = Self::execute(&self.pool, &q).await?;
        let id = Value::from(result.last_insert_id() as i64);
        let read = sql::select_by_id(Dialect::MySql, desc, &id);
        Self::fetch_optional(&self.pool, &read)
            .await?
            .ok_or_else(|| AppError::Persistence("inserted row not readable".into()))
    }

    async fn insert_many(
        &self,
        desc: &EntityDescriptor,
        docs: Vec<JsonObject>,
    ) -> Result<Vec<Value>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in &docs {
            let q = sql::insert(Dialect::MySql, desc, doc, None);
            let result = Self::execute(&mut *tx, &q).await?;
            let id = Value::from(result.last_insert_id() as i64);
            let read = sql::select_by_id(Dialect::MySql, desc, &id);
            let row = Self::fetch_optional(&mut *tx, &read)
                .await?
                .ok_or_else(|| AppError::Persistence("inserted row not readable".into()))?;
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
        let q = sql::select_by_id(Dialect::MySql, desc, id);
        Self::fetch_optional(&self.pool, &q).await
    }

    async fn find_all(
        &self,
        desc: &EntityDescriptor,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(Dialect::MySql, desc, sort, None, None);
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
        let count_q = sql::count(Dialect::MySql, desc);
        let total = sqlx::query_scalar::<_, i64>(&count_q.sql)
            .fetch_one(&self.pool)
            .await?;
        let q = sql::select_list(
            Dialect::MySql,
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
        // MySQL has no UPDATE .. RETURNING; confirm presence, apply, re-read.
        let read = sql::select_by_id(Dialect::MySql, desc, id);
        if Self::fetch_optional(&self.pool, &read).await?.is_none() {
            return Ok(None);
        }
        let q = sql::update(Dialect::MySql, desc, id, patch);
        if q.sql.starts_with("UPDATE") {
            Self::execute(&self.pool, &q).await?;
        }
        Self::fetch_optional(&self.pool, &read).await
    }

    async fn delete(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let q = sql::delete(Dialect::MySql, desc, id);
        let result = Self::execute(&self.pool, &q).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, desc: &EntityDescriptor) -> Result<u64, AppError> {
        let q = sql::count(Dialect::MySql, desc);
        let total = sqlx::query_scalar::<_, i64>(&q.sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }

    async fn exists(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let q = sql::select_exists(Dialect::MySql, desc, id);
        Ok(Self::fetch_optional(&self.pool, &q).await?.is_some())
    }

    async fn exists_matching(
        &self,
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        exclude_id: Option<&Value>,
    ) -> Result<bool, AppError> {
        let q = sql::select_exists_matching(Dialect::MySql, desc, filters, exclude_id);
        Ok(Self::fetch_optional(&self.pool, &q).await?.is_some())
    }
}

fn row_to_json(row: &MySqlRow) -> Value {
    use sqlx::Column;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &MySqlRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<u64>, _>(name) {
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
