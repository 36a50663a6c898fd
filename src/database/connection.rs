use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel::QueryResult;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::pool::{ConnectionPool, PoolConfig, PoolError, PooledConnection, TransactionalConnection};

pub const RELATIONAL_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/relational");
pub const TIMESERIES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/timeseries");

/// Diesel's r2d2 connection manager for PostgreSQL
pub type PgConnectionManager = ConnectionManager<PgConnection>;

/// Type alias for PostgreSQL connection pool
pub type PgPool = ConnectionPool<PgConnectionManager>;

/// Type alias for pooled connection
pub type PgPooledConnection = PooledConnection<PgConnectionManager>;

impl TransactionalConnection for PgConnection {
    type Error = diesel::result::Error;

    fn begin(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::begin_transaction(self)
    }

    fn commit(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::commit_transaction(self)
    }

    fn rollback(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::rollback_transaction(self)
    }
}

/// Database setup errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Connection settings for one PostgreSQL database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    /// Full connection URL; wins over the individual fields
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Read `{PREFIX}_URL`, or `{PREFIX}_HOST/_PORT/_USER/_PASSWORD/_DATABASE`
    pub fn from_env(prefix: &str) -> Result<Self, PoolError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            port: 5432,
            user: String::new(),
            password: None,
            database: String::new(),
            url: Some(url.into()),
        }
    }

    fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, PoolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| lookup(&format!("{}_{}", prefix, field)).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("URL") {
            return Ok(Self::from_url(url));
        }

        let required = |field: &str| {
            get(field).ok_or_else(|| PoolError::Configuration(format!("{}_{} is not set", prefix, field)))
        };

        let port = match get("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| PoolError::Configuration(format!("{}_PORT is not a valid port: {}", prefix, port)))?,
            None => 5432,
        };

        Ok(Self {
            host: required("HOST")?,
            port,
            user: required("USER")?,
            password: get("PASSWORD"),
            database: required("DATABASE")?,
            url: None,
        })
    }

    /// Parsed connection URL with credentials percent-encoded
    pub fn to_url(&self) -> Result<Url, PoolError> {
        if let Some(url) = &self.url {
            return Url::parse(url).map_err(|e| PoolError::Configuration(format!("invalid database URL: {}", e)));
        }

        let bad = |what: &str| PoolError::Configuration(format!("invalid database {}", what));

        let mut url = Url::parse(&format!("postgres://{}:{}/", self.host, self.port))
            .map_err(|e| PoolError::Configuration(format!("invalid database host {}: {}", self.host, e)))?;
        url.set_username(&self.user).map_err(|_| bad("user"))?;
        url.set_password(self.password.as_deref()).map_err(|_| bad("password"))?;
        url.path_segments_mut()
            .map_err(|_| bad("name"))?
            .pop_if_empty()
            .push(&self.database);

        Ok(url)
    }

    /// Connection string handed to the driver
    pub fn dsn(&self) -> Result<String, PoolError> {
        match &self.url {
            // validated, but passed through untouched
            Some(url) => self.to_url().map(|_| url.clone()),
            None => self.to_url().map(String::from),
        }
    }

    /// Connection string safe to log
    pub fn redacted(&self) -> String {
        match self.to_url() {
            Ok(mut url) => {
                if url.password().is_some() {
                    // only fails for URLs without a host, which never carry a password
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<invalid database URL>".to_string(),
        }
    }
}

/// Database pools container holding both PostgreSQL and TimescaleDB pools
#[derive(Clone)]
pub struct DatabasePools {
    /// Connection pool for PostgreSQL (audit trail, bookkeeping, relational categories)
    pub relational_pool: Arc<PgPool>,

    /// Connection pool for TimescaleDB (time-series hypertables)
    pub timeseries_pool: Arc<PgPool>,
}

impl DatabasePools {
    pub fn new(relational_pool: PgPool, timeseries_pool: PgPool) -> Self {
        Self {
            relational_pool: Arc::new(relational_pool),
            timeseries_pool: Arc::new(timeseries_pool),
        }
    }

    /// Get a connection from the relational pool
    pub fn get_relational_conn(&self) -> Result<PgPooledConnection, PoolError> {
        self.relational_pool.acquire()
    }

    /// Get a connection from the timeseries pool
    pub fn get_timeseries_conn(&self) -> Result<PgPooledConnection, PoolError> {
        self.timeseries_pool.acquire()
    }

    /// Apply pending migrations to both databases
    pub fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut conn = self.get_relational_conn()?;
        let applied = conn
            .run_pending_migrations(RELATIONAL_MIGRATIONS)
            .map_err(|e| DatabaseError::Migration(format!("relational: {}", e)))?;
        tracing::info!("Relational migrations applied: {}", applied.len());

        let mut conn = self.get_timeseries_conn()?;
        let applied = conn
            .run_pending_migrations(TIMESERIES_MIGRATIONS)
            .map_err(|e| DatabaseError::Migration(format!("timeseries: {}", e)))?;
        tracing::info!("Timeseries migrations applied: {}", applied.len());

        Ok(())
    }

    pub fn shutdown(&self) {
        self.relational_pool.shutdown();
        self.timeseries_pool.shutdown();
    }
}

/// Establish connection pools for both databases
///
/// Fails fast when either database cannot be reached.
pub fn establish_connection_pools(
    relational: &DatabaseConfig,
    timeseries: &DatabaseConfig,
    pool_config: &PoolConfig,
) -> Result<DatabasePools, DatabaseError> {
    tracing::info!("Establishing database connection pools...");

    let relational_pool = build_pool("relational", relational, pool_config)?;
    let timeseries_pool = build_pool("timeseries", timeseries, pool_config)?;

    Ok(DatabasePools::new(relational_pool, timeseries_pool))
}

fn build_pool(name: &str, config: &DatabaseConfig, pool_config: &PoolConfig) -> Result<PgPool, DatabaseError> {
    let manager = PgConnectionManager::new(config.dsn()?);
    let pool = ConnectionPool::new(manager, pool_config.clone()).map_err(|e| match e {
        PoolError::Configuration(_) => e,
        other => PoolError::Connection(format!("{} database ({}): {}", name, config.redacted(), other)),
    })?;

    tracing::info!(
        "{} database pool created with max size: {}",
        name,
        pool_config.max_connections
    );

    // Test connection
    drop(pool.acquire()?);
    tracing::info!("{} database connection successful", name);

    Ok(pool)
}
