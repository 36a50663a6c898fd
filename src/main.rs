use market_data_consistency::database::{
    establish_connection_pools, AuditRepositoryImpl, DatabaseConfig, RelationalRepositoryImpl,
    TimeSeriesRepositoryImpl,
};
use market_data_consistency::storage::{AuditTrail, RelationalAccess, SchemaCatalog, TimeSeriesAccess, UnitOfWorkSource};
use market_data_consistency::{DataManager, PoolConfig, SagaCoordinator, DATA_OPERATION_COMPLETE};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_data_consistency=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool_config = PoolConfig::from_env()?;
    let relational_config = DatabaseConfig::from_env("POSTGRESQL")?;
    let timeseries_config = DatabaseConfig::from_env("TIMESCALEDB")?;

    tracing::info!("Relational store: {}", relational_config.redacted());
    tracing::info!("Time-series store: {}", timeseries_config.redacted());

    let pools = establish_connection_pools(&relational_config, &timeseries_config, &pool_config)?;
    pools.run_migrations()?;
    tracing::info!("✅ Database pools ready");

    let catalog = Arc::new(SchemaCatalog::market_data());

    let timeseries: Arc<dyn TimeSeriesAccess> = Arc::new(TimeSeriesRepositoryImpl::new(
        {
            let pools = pools.clone();
            move || pools.get_timeseries_conn()
        },
        Arc::clone(&catalog),
    ));

    let relational = Arc::new(RelationalRepositoryImpl::new({
        let pools = pools.clone();
        move || pools.get_relational_conn()
    }));

    let audit: Arc<dyn AuditTrail> = Arc::new(AuditRepositoryImpl::new({
        let pools = pools.clone();
        move || pools.get_relational_conn()
    }));

    let units: Arc<dyn UnitOfWorkSource> = relational.clone();
    let saga = Arc::new(SagaCoordinator::new(Arc::clone(&timeseries), units, audit, catalog));

    let relational: Arc<dyn RelationalAccess> = relational;
    let manager = DataManager::new(timeseries, relational, saga);

    manager.event_bus().subscribe(DATA_OPERATION_COMPLETE, |event| {
        tracing::debug!("📡 {}", event.payload);
        Ok(())
    });

    let health = manager.health_check();
    if health.is_healthy() {
        tracing::info!("✅ Relational store healthy, {} adapters registered", health.adapters.len());
    } else {
        tracing::warn!("⚠️ Relational store health check failed");
    }

    let stats = manager.get_routing_stats();
    tracing::info!(
        "📊 Routing: {} categories ({} time-series, {} relational)",
        stats.total_categories,
        stats.timeseries_categories,
        stats.relational_categories
    );

    for (name, pool) in [("relational", &pools.relational_pool), ("timeseries", &pools.timeseries_pool)] {
        let status = pool.status();
        tracing::info!(
            "{} pool: {} idle, {} active, max {}",
            name,
            status.idle,
            status.active,
            status.max_connections
        );
    }

    pools.shutdown();
    tracing::info!("👋 Pools shut down");

    Ok(())
}
