//! Convert serde_json::Value into values sqlx can bind.
//!
//! Both engines receive parameters in text form: PostgreSQL statements carry
//! explicit `$n::type` casts (the descriptor requires a sql_type per field),
//! MySQL coerces text per column type server-side.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::mysql::{MySql, MySqlTypeInfo};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A JSON value prepared for binding to a relational query.
#[derive(Clone, Debug)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Json(Value),
}

impl BindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::I64(i)
                } else {
                    BindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => BindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }

    /// Text rendering for PostgreSQL; the statement's `::type` cast converts.
    fn pg_text(&self) -> Option<String> {
        match self {
            BindValue::Null => None,
            BindValue::Bool(b) => Some(if *b { "true".into() } else { "false".into() }),
            BindValue::I64(n) => Some(n.to_string()),
            BindValue::F64(n) => Some(n.to_string()),
            BindValue::Text(s) => Some(s.clone()),
            BindValue::Json(v) => Some(v.to_string()),
        }
    }

    /// Text rendering for MySQL. Booleans become 1/0 (TINYINT columns).
    fn mysql_text(&self) -> Option<String> {
        match self {
            BindValue::Bool(b) => Some(if *b { "1".into() } else { "0".into() }),
            other => other.pg_text(),
        }
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self.pg_text() {
            Some(s) => <String as Encode<Postgres>>::encode_by_ref(&s, buf),
            None => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
        }
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'q> Encode<'q, MySql> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self.mysql_text() {
            Some(s) => <String as Encode<MySql>>::encode_by_ref(&s, buf),
            None => <Option<String> as Encode<MySql>>::encode_by_ref(&None, buf),
        }
    }
}

impl sqlx::Type<MySql> for BindValue {
    fn type_info() -> MySqlTypeInfo {
        <String as sqlx::Type<MySql>>::type_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_classifies_values() {
        assert!(matches!(BindValue::from_json(&Value::Null), BindValue::Null));
        assert!(matches!(
            BindValue::from_json(&serde_json::json!(42)),
            BindValue::I64(42)
        ));
        assert!(matches!(
            BindValue::from_json(&serde_json::json!(1.5)),
            BindValue::F64(_)
        ));
        assert!(matches!(
            BindValue::from_json(&serde_json::json!("x")),
            BindValue::Text(_)
        ));
        assert!(matches!(
            BindValue::from_json(&serde_json::json!({"a": 1})),
            BindValue::Json(_)
        ));
    }

    #[test]
    fn mysql_booleans_render_as_tinyint() {
        assert_eq!(BindValue::Bool(true).mysql_text().as_deref(), Some("1"));
        assert_eq!(BindValue::Bool(false).mysql_text().as_deref(), Some("0"));
        assert_eq!(BindValue::Bool(true).pg_text().as_deref(), Some("true"));
    }
}
