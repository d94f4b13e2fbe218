//! Builds parameterized INSERT, SELECT, UPDATE, DELETE statements from an
//! entity descriptor, for either relational dialect.

use crate::descriptor::EntityDescriptor;
use crate::page::{SortDirection, SortSpec};
use serde_json::{Map, Value};

/// Relational dialect: placeholder style, identifier quoting, casts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    fn placeholder(self, n: usize, cast: Option<&str>) -> String {
        match self {
            Dialect::Postgres => match cast {
                Some(t) => format!("${n}::{t}"),
                None => format!("${n}"),
            },
            Dialect::MySql => "?".to_string(),
        }
    }
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn column_list(dialect: Dialect, desc: &EntityDescriptor) -> String {
    desc.fields
        .iter()
        .map(|f| dialect.quote(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn cast_of<'a>(desc: &'a EntityDescriptor, field: &str) -> Option<&'a str> {
    desc.field(field).and_then(|f| f.sql_type.as_deref())
}

fn order_clause(dialect: Dialect, desc: &EntityDescriptor, sort: Option<&SortSpec>) -> String {
    let (field, dir) = match sort {
        Some(s) => (
            s.field.as_str(),
            match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            },
        ),
        None => (desc.id_field.as_str(), "ASC"),
    };
    format!(" ORDER BY {} {}", dialect.quote(field), dir)
}

/// INSERT from the body map. The identifier column is included only when
/// `explicit_id` is given (sequence strategy pre-allocates it); identity
/// columns are left to the database. Columns with a database default are
/// omitted when the body has no value for them. PostgreSQL returns the
/// stored row via RETURNING; MySQL callers re-select.
pub fn insert(
    dialect: Dialect,
    desc: &EntityDescriptor,
    body: &Map<String, Value>,
    explicit_id: Option<&Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = dialect.quote(&desc.collection);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &desc.fields {
        if f.name == desc.id_field {
            if let Some(id) = explicit_id {
                let n = q.push_param(id.clone());
                cols.push(dialect.quote(&f.name));
                placeholders.push(dialect.placeholder(n, f.sql_type.as_deref()));
            }
            continue;
        }
        let val = body.get(&f.name).cloned();
        if val.is_none() && f.has_default {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(dialect.quote(&f.name));
        placeholders.push(dialect.placeholder(n, f.sql_type.as_deref()));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", ")
    );
    if dialect == Dialect::Postgres {
        q.sql.push_str(&format!(" RETURNING {}", column_list(dialect, desc)));
    }
    q
}

/// SELECT one row by identifier.
pub fn select_by_id(dialect: Dialect, desc: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(dialect, desc),
        dialect.quote(&desc.collection),
        dialect.quote(&desc.id_field),
        dialect.placeholder(n, cast_of(desc, &desc.id_field)),
    );
    q
}

/// SELECT all rows ordered by the requested sort (identifier ascending by
/// default), with optional LIMIT/OFFSET for page queries.
pub fn select_list(
    dialect: Dialect,
    desc: &EntityDescriptor,
    sort: Option<&SortSpec>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {}{}",
        column_list(dialect, desc),
        dialect.quote(&desc.collection),
        order_clause(dialect, desc, sort),
    );
    if let Some(n) = limit {
        q.sql.push_str(&format!(" LIMIT {n}"));
    }
    if let Some(n) = offset {
        q.sql.push_str(&format!(" OFFSET {n}"));
    }
    q
}

/// Existence probe by identifier.
pub fn select_exists(dialect: Dialect, desc: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} = {} LIMIT 1",
        dialect.quote(&desc.collection),
        dialect.quote(&desc.id_field),
        dialect.placeholder(n, cast_of(desc, &desc.id_field)),
    );
    q
}

/// Existence probe for a unique-constraint group: all filter columns must
/// match (NULL via IS NULL), optionally excluding one identifier (updates).
pub fn select_exists_matching(
    dialect: Dialect,
    desc: &EntityDescriptor,
    filters: &[(String, Value)],
    exclude_id: Option<&Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = Vec::with_capacity(filters.len() + 1);
    for (col, val) in filters {
        if val.is_null() {
            parts.push(format!("{} IS NULL", dialect.quote(col)));
        } else {
            let n = q.push_param(val.clone());
            parts.push(format!(
                "{} = {}",
                dialect.quote(col),
                dialect.placeholder(n, cast_of(desc, col))
            ));
        }
    }
    if let Some(id) = exclude_id {
        let n = q.push_param(id.clone());
        parts.push(format!(
            "{} <> {}",
            dialect.quote(&desc.id_field),
            dialect.placeholder(n, cast_of(desc, &desc.id_field))
        ));
    }
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        dialect.quote(&desc.collection),
        parts.join(" AND "),
    );
    q
}

/// UPDATE by identifier: SET only the patch columns that exist on the
/// descriptor, never the identifier itself.
pub fn update(
    dialect: Dialect,
    desc: &EntityDescriptor,
    id: &Value,
    patch: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &desc.fields {
        if f.name == desc.id_field {
            continue;
        }
        let Some(v) = patch.get(&f.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!(
            "{} = {}",
            dialect.quote(&f.name),
            dialect.placeholder(n, f.sql_type.as_deref())
        ));
    }
    if sets.is_empty() {
        // nothing to change; fall back to a plain read
        return select_by_id(dialect, desc, id);
    }
    let n = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        dialect.quote(&desc.collection),
        sets.join(", "),
        dialect.quote(&desc.id_field),
        dialect.placeholder(n, cast_of(desc, &desc.id_field)),
    );
    if dialect == Dialect::Postgres {
        q.sql.push_str(&format!(" RETURNING {}", column_list(dialect, desc)));
    }
    q
}

/// DELETE by identifier.
pub fn delete(dialect: Dialect, desc: &EntityDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        dialect.quote(&desc.collection),
        dialect.quote(&desc.id_field),
        dialect.placeholder(n, cast_of(desc, &desc.id_field)),
    );
    q
}

/// SELECT COUNT(*).
pub fn count(dialect: Dialect, desc: &EntityDescriptor) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", dialect.quote(&desc.collection));
    q
}
