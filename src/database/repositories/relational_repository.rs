use diesel::{Connection, RunQueryDsl};
use std::sync::Arc;

use crate::database::connection::PgPooledConnection;
use crate::database::sql::{column_union, insert_statement, rows_per_statement, select_statement, JsonDoc};
use crate::database::unit_of_work::PgUnitOfWork;
use crate::pool::PoolError;
use crate::routing::DataCategory;
use crate::storage::{Filters, Frame, RelationalAccess, Row, StoreError, UnitOfWork, UnitOfWorkSource};

/// PostgreSQL access for relational bookkeeping tables
///
/// Also hands out units of work, so a saga's pivot step runs on this store.
pub struct RelationalRepositoryImpl {
    get_conn: Arc<dyn Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync>,
}

impl RelationalRepositoryImpl {
    /// Create new relational repository with connection provider
    pub fn new<F>(get_conn: F) -> Self
    where
        F: Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync + 'static,
    {
        Self {
            get_conn: Arc::new(get_conn),
        }
    }
}

impl RelationalAccess for RelationalRepositoryImpl {
    fn save(&self, rows: &[Row], category: DataCategory, table: &str) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let chunk_size = rows_per_statement(column_union(rows).len());
        let mut conn = (self.get_conn)()?;

        let inserted = conn.transaction::<_, StoreError, _>(|conn| {
            let mut inserted = 0;
            for chunk in rows.chunks(chunk_size) {
                inserted += insert_statement(table, chunk)?.into_query().execute(conn)?;
            }
            Ok(inserted)
        })?;

        tracing::debug!("Inserted {} {} rows into {}", inserted, category, table);
        Ok(inserted)
    }

    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError> {
        let statement = select_statement(table, filters)?;
        let mut conn = (self.get_conn)()?;

        statement
            .into_query()
            .load::<JsonDoc>(&mut *conn)?
            .into_iter()
            .map(JsonDoc::into_row)
            .collect()
    }

    fn health_check(&self) -> bool {
        let result = (self.get_conn)()
            .map_err(StoreError::from)
            .and_then(|mut conn| Ok(diesel::sql_query("SELECT 1").execute(&mut *conn)?));

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Relational health check failed: {}", e);
                false
            }
        }
    }
}

impl UnitOfWorkSource for RelationalRepositoryImpl {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let conn = (self.get_conn)()?;
        Ok(Box::new(PgUnitOfWork::begin(conn)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::{DatabaseConfig, PgConnectionManager, PgPool};
    use crate::pool::{ConnectionPool, PoolConfig};
    use crate::storage::Value;
    use chrono::Utc;

    fn pool() -> Option<Arc<PgPool>> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = PoolConfig {
            enable_health_check: false,
            ..PoolConfig::default()
        };
        ConnectionPool::new(PgConnectionManager::new(DatabaseConfig::from_url(url).dsn().unwrap()), config)
            .ok()
            .map(Arc::new)
    }

    fn repository(pool: &Arc<PgPool>) -> RelationalRepositoryImpl {
        let pool = Arc::clone(pool);
        RelationalRepositoryImpl::new(move || pool.acquire())
    }

    #[test]
    #[ignore] // requires DATABASE_URL with migrations applied
    fn test_health_check() {
        let pool = pool().unwrap();
        assert!(repository(&pool).health_check());

        pool.shutdown();
        assert!(!repository(&pool).health_check());
    }

    #[test]
    #[ignore] // requires DATABASE_URL with migrations applied
    fn test_unit_of_work_commit_and_abandon() {
        let pool = pool().unwrap();
        let repo = repository(&pool);
        let committed = format!("C{}", Utc::now().timestamp_micros());
        let abandoned = format!("A{}", Utc::now().timestamp_micros());

        let watermark = |symbol: &str| {
            Row::new()
                .with("table_name", "tick_data")
                .with("symbol", symbol)
                .with("last_synced_at", Utc::now())
        };

        let mut uow = repo.begin().unwrap();
        uow.upsert("sync_watermarks", &["table_name", "symbol"], &watermark(&committed))
            .unwrap();
        uow.commit().unwrap();

        {
            let mut uow = repo.begin().unwrap();
            uow.upsert("sync_watermarks", &["table_name", "symbol"], &watermark(&abandoned))
                .unwrap();
        }

        let found = |symbol: &str| {
            repo.load("sync_watermarks", &Filters::new().eq("symbol", Value::from(symbol)))
                .unwrap()
                .len()
        };
        assert_eq!(found(&committed), 1);
        assert_eq!(found(&abandoned), 0);
        assert_eq!(pool.metrics().current_active, 0);
    }
}
