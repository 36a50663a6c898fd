use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Numeric, Text, Timestamptz};
use diesel::QueryableByName;
use std::collections::BTreeSet;

use crate::storage::{is_valid_identifier, Filters, Row, StoreError, Value};

/// Postgres limit on bind parameters per statement
pub const MAX_BIND_PARAMS: usize = 65_535;

/// SQL text plus its positional parameters (`$1`, `$2`, ...)
///
/// NULLs are written as literals so they never need a typed bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn placeholder(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value.clone());
        format!("${}", self.params.len())
    }

    /// Attach the parameters to a raw diesel query
    pub fn into_query(self) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
        bind_all(self.sql, &self.params)
    }
}

/// One JSON-encoded row produced by `row_to_json`
#[derive(Debug, QueryableByName)]
pub struct JsonDoc {
    #[diesel(sql_type = Text)]
    pub doc: String,
}

impl JsonDoc {
    pub fn into_row(self) -> Result<Row, StoreError> {
        let json: serde_json::Value = serde_json::from_str(&self.doc)?;
        Row::from_json(&json).ok_or_else(|| StoreError::Serialization(format!("expected a JSON object, got {}", json)))
    }
}

/// Double-quote a validated identifier
pub fn quote_ident(name: &str) -> Result<String, StoreError> {
    if !is_valid_identifier(name) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Union of the column names of `rows`, sorted
pub fn column_union(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.column_names().map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Rows per multi-row statement that keep it under the bind parameter limit
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

/// `INSERT INTO table (cols) VALUES (...), (...)`
pub fn insert_statement(table: &str, rows: &[Row]) -> Result<Statement, StoreError> {
    values_clause(table, &column_union(rows), rows)
}

/// Insert, or overwrite the row that already has the same `key_columns`
///
/// `INSERT ... ON CONFLICT (keys) DO UPDATE SET col = EXCLUDED.col`; with no
/// non-key columns the conflict is ignored.
pub fn upsert_statement(table: &str, key_columns: &[&str], rows: &[Row]) -> Result<Statement, StoreError> {
    if key_columns.is_empty() {
        return Err(StoreError::Query(format!("upsert into {} needs at least one key column", table)));
    }

    let columns = column_union(rows);
    if let Some(missing) = key_columns.iter().find(|k| !columns.iter().any(|c| c == *k)) {
        return Err(StoreError::Query(format!("upsert key column {} missing from rows", missing)));
    }

    let mut statement = values_clause(table, &columns, rows)?;

    let conflict = key_columns
        .iter()
        .map(|k| quote_ident(k))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let updates = columns
        .iter()
        .filter(|c| !key_columns.contains(&c.as_str()))
        .map(|c| quote_ident(c).map(|q| format!("{q} = EXCLUDED.{q}")))
        .collect::<Result<Vec<_>, _>>()?;

    if updates.is_empty() {
        statement.sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", conflict));
    } else {
        statement
            .sql
            .push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET {}", conflict, updates.join(", ")));
    }

    Ok(statement)
}

/// `SELECT row_to_json(t)::text AS doc FROM table t WHERE ...`
pub fn select_statement(table: &str, filters: &Filters) -> Result<Statement, StoreError> {
    let mut statement = Statement {
        sql: format!("SELECT row_to_json(t)::text AS doc FROM {} t", quote_ident(table)?),
        params: Vec::new(),
    };

    let mut predicates = Vec::with_capacity(filters.len());
    for (column, value) in filters.iter() {
        let column = quote_ident(column)?;
        if value.is_null() {
            predicates.push(format!("t.{} IS NULL", column));
        } else {
            let placeholder = statement.placeholder(value);
            predicates.push(format!("t.{} = {}", column, placeholder));
        }
    }

    if !predicates.is_empty() {
        statement.sql.push_str(" WHERE ");
        statement.sql.push_str(&predicates.join(" AND "));
    }

    Ok(statement)
}

fn values_clause(table: &str, columns: &[String], rows: &[Row]) -> Result<Statement, StoreError> {
    if rows.is_empty() || columns.is_empty() {
        return Err(StoreError::Query(format!("nothing to insert into {}", table)));
    }

    let quoted = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut statement = Statement {
        sql: format!("INSERT INTO {} ({}) VALUES ", quote_ident(table)?, quoted.join(", ")),
        params: Vec::with_capacity(rows.len() * columns.len()),
    };

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| statement.placeholder(row.get(c).unwrap_or(&Value::Null)))
            .collect();
        tuples.push(format!("({})", cells.join(", ")));
    }
    statement.sql.push_str(&tuples.join(", "));

    Ok(statement)
}

/// Bind `params` in order onto a raw query
pub fn bind_all(sql: impl Into<String>, params: &[Value]) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    let mut query = diesel::sql_query(sql.into()).into_boxed::<Pg>();

    for param in params {
        query = match param {
            Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            Value::Bool(b) => query.bind::<Bool, _>(*b),
            Value::Int(i) => query.bind::<BigInt, _>(*i),
            Value::Float(f) => query.bind::<Double, _>(*f),
            Value::Decimal(d) => query.bind::<Numeric, _>(*d),
            Value::Timestamp(ts) => query.bind::<Timestamptz, _>(*ts),
            Value::Text(s) => query.bind::<Text, _>(s.clone()),
        };
    }

    query
}
