use diesel::{Connection, RunQueryDsl};
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::connection::PgPooledConnection;
use crate::database::sql::{column_union, rows_per_statement, select_statement, upsert_statement, JsonDoc};
use crate::pool::PoolError;
use crate::routing::DataCategory;
use crate::storage::{Filters, Frame, Row, RowKey, SchemaCatalog, StoreError, TableSchema, TimeSeriesAccess, Value, VALID_COLUMN};

/// TimescaleDB access for the hypertables described by a `SchemaCatalog`
///
/// Writes are upserts keyed on `(timestamp, tags)`, so replaying a row
/// replaces the stored one instead of duplicating it.
pub struct TimeSeriesRepositoryImpl {
    get_conn: Arc<dyn Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync>,
    catalog: Arc<SchemaCatalog>,
}

impl TimeSeriesRepositoryImpl {
    /// Create new time-series repository with connection provider
    pub fn new<F>(get_conn: F, catalog: Arc<SchemaCatalog>) -> Self
    where
        F: Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync + 'static,
    {
        Self {
            get_conn: Arc::new(get_conn),
            catalog,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }
}

/// Normalise a batch for upsert
///
/// Rows reloaded from the store carry the timestamp as text; it is turned back
/// into a timestamp so it binds as `TIMESTAMPTZ`. Rows without a validity flag
/// get `true`. Within one batch the last row for a key wins, because Postgres
/// refuses to update the same row twice in one `ON CONFLICT` statement.
fn prepare_batch(schema: &TableSchema, rows: &[Row]) -> Result<Vec<Row>, StoreError> {
    let mut positions: HashMap<RowKey, usize> = HashMap::with_capacity(rows.len());
    let mut batch: Vec<Row> = Vec::with_capacity(rows.len());

    for row in rows {
        let key = schema
            .row_key(row)
            .ok_or_else(|| StoreError::Query(format!("row is missing key columns of {}", schema.name)))?;

        let mut row = row.clone();
        if let Some(ts) = row.timestamp(&schema.timestamp_column) {
            row.set(schema.timestamp_column.as_str(), ts);
        }
        if !row.contains(VALID_COLUMN) {
            row.set(VALID_COLUMN, true);
        }

        match positions.get(&key) {
            Some(&index) => batch[index] = row,
            None => {
                positions.insert(key, batch.len());
                batch.push(row);
            }
        }
    }

    Ok(batch)
}

fn restore_timestamp(schema: Option<&TableSchema>, mut row: Row) -> Row {
    if let Some(schema) = schema {
        if let Some(ts) = row.timestamp(&schema.timestamp_column) {
            row.set(schema.timestamp_column.as_str(), Value::Timestamp(ts));
        }
    }
    row
}

impl TimeSeriesAccess for TimeSeriesRepositoryImpl {
    fn save(&self, rows: &[Row], category: DataCategory, table: &str) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let schema = self
            .catalog
            .resolve(table, category)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let batch = prepare_batch(schema, rows)?;
        let keys = schema.key_columns();
        let chunk_size = rows_per_statement(column_union(&batch).len());

        let mut conn = (self.get_conn)()?;

        // All chunks land together or not at all
        conn.transaction::<_, StoreError, _>(|conn| {
            for chunk in batch.chunks(chunk_size) {
                upsert_statement(table, &keys, chunk)?.into_query().execute(conn)?;
            }
            Ok(())
        })?;

        tracing::debug!("Upserted {} rows into {} ({} after dedup)", rows.len(), table, batch.len());
        Ok(rows.len())
    }

    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError> {
        let statement = select_statement(table, filters)?;
        let mut conn = (self.get_conn)()?;

        let docs = statement.into_query().load::<JsonDoc>(&mut *conn)?;
        let schema = self.catalog.get(table);

        docs.into_iter()
            .map(|doc| doc.into_row().map(|row| restore_timestamp(schema, row)))
            .collect()
    }
}
