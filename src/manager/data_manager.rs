use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::adapters::{AdapterError, AdapterRegistry, DataAdapter, FetchRequest};
use crate::events::{EventBus, DATA_OPERATION_COMPLETE};
use crate::routing::{DataCategory, DataRouter, RoutingStats, StoreTarget};
use crate::saga::{DoubleFault, PivotError, SagaCoordinator};
use crate::storage::{Filters, Frame, RelationalAccess, Row, TimeSeriesAccess, UnitOfWork};

/// Boxed pivot step accepted by `DataManager::save`
pub type PivotFn<'a> = Box<dyn FnOnce(&mut dyn UnitOfWork) -> Result<(), PivotError> + 'a>;

/// Box a closure as a pivot step
pub fn pivot_fn<'a, F>(f: F) -> PivotFn<'a>
where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<(), PivotError> + 'a,
{
    Box::new(f)
}

/// Payload of `data_operation_complete`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOperationEvent {
    /// "save" or "load"
    pub operation: String,
    pub category: DataCategory,
    pub target: StoreTarget,
    pub table: String,
    pub rows: usize,
    pub duration_ms: f64,
    pub success: bool,
    pub via_saga: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub relational: bool,
    pub adapters: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.relational
    }
}

/// Entry point for market-data reads and writes
///
/// Routes every category to its store, runs time-series writes through the
/// saga coordinator when cross-store consistency is requested, and reports
/// every operation on the event bus. Routine failures degrade to `false` or an
/// empty frame; only a saga double fault is returned as an error.
pub struct DataManager {
    router: DataRouter,
    adapters: Arc<AdapterRegistry>,
    events: Arc<EventBus>,
    timeseries: Arc<dyn TimeSeriesAccess>,
    relational: Arc<dyn RelationalAccess>,
    saga: Arc<SagaCoordinator>,
}

impl DataManager {
    pub fn new(
        timeseries: Arc<dyn TimeSeriesAccess>,
        relational: Arc<dyn RelationalAccess>,
        saga: Arc<SagaCoordinator>,
    ) -> Self {
        Self {
            router: DataRouter::new(),
            adapters: Arc::new(AdapterRegistry::new()),
            events: Arc::new(EventBus::new()),
            timeseries,
            relational,
            saga,
        }
    }

    /// Share an existing event bus
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Share an existing adapter registry
    pub fn with_adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Write `rows` to the store `category` routes to
    ///
    /// With `use_saga`, a time-series target and a pivot, the write goes through
    /// the saga coordinator; otherwise it is a direct single-store write.
    pub fn save(
        &self,
        category: DataCategory,
        rows: &[Row],
        table: &str,
        use_saga: bool,
        pivot: Option<PivotFn<'_>>,
    ) -> Result<bool, DoubleFault> {
        let started = Instant::now();
        let target = self.router.target_for(category);

        let (result, via_saga) = match (use_saga, target, pivot) {
            (true, StoreTarget::TimeSeries, Some(pivot)) => {
                let business_id = format!("{}:{}", category.as_str(), table);
                (self.saga.execute_sync(&business_id, rows, category, table, pivot), true)
            }
            (use_saga, target, pivot) => {
                if use_saga {
                    debug!(
                        "Saga requested for {} ({} target, pivot supplied: {}); writing directly",
                        category,
                        target,
                        pivot.is_some()
                    );
                }
                (Ok(self.write_direct(target, rows, category, table)), false)
            }
        };

        self.emit_operation(DataOperationEvent {
            operation: "save".to_string(),
            category,
            target,
            table: table.to_string(),
            rows: rows.len(),
            duration_ms: elapsed_ms(started),
            success: matches!(result, Ok(true)),
            via_saga,
        });

        result
    }

    /// Load rows of `table` matching `filters`; empty on failure
    pub fn load(&self, category: DataCategory, table: &str, filters: &Filters) -> Frame {
        let started = Instant::now();
        let target = self.router.target_for(category);

        let result = match target {
            StoreTarget::TimeSeries => self.timeseries.load(table, filters),
            StoreTarget::Relational => self.relational.load(table, filters),
        };

        let (frame, success) = match result {
            Ok(frame) => (frame, true),
            Err(e) => {
                error!("Load from {} ({} store) failed: {}", table, target, e);
                (Vec::new(), false)
            }
        };

        self.emit_operation(DataOperationEvent {
            operation: "load".to_string(),
            category,
            target,
            table: table.to_string(),
            rows: frame.len(),
            duration_ms: elapsed_ms(started),
            success,
            via_saga: false,
        });

        frame
    }

    /// Pull rows from a registered adapter and write them through `save`
    pub fn fetch_and_save(&self, adapter: &str, request: &FetchRequest, table: &str) -> Result<bool, AdapterError> {
        let source = self
            .adapters
            .get(adapter)
            .ok_or_else(|| AdapterError::NotFound(adapter.to_string()))?;

        if !source.supports(request.category) {
            return Err(AdapterError::UnsupportedCategory(request.category, adapter.to_string()));
        }

        let rows = source.fetch(request)?;
        debug!("Adapter {} returned {} rows for {}", adapter, rows.len(), request.category);

        // direct writes never double-fault
        Ok(self.save(request.category, &rows, table, false, None).unwrap_or(false))
    }

    pub fn health_check(&self) -> HealthReport {
        let relational = self.relational.health_check();
        if !relational {
            warn!("Relational store failed its health check");
        }

        HealthReport {
            relational,
            adapters: self.adapters.list_all(),
            checked_at: Utc::now(),
        }
    }

    pub fn get_routing_stats(&self) -> RoutingStats {
        self.router.stats(&self.adapters)
    }

    pub fn register_adapter(&self, name: impl Into<String>, adapter: Arc<dyn DataAdapter>) {
        self.adapters.register(name, adapter);
    }

    pub fn unregister_adapter(&self, name: &str) -> bool {
        self.adapters.unregister(name)
    }

    pub fn list_adapters(&self) -> Vec<String> {
        self.adapters.list_all()
    }

    pub fn get_adapter(&self, name: &str) -> Option<Arc<dyn DataAdapter>> {
        self.adapters.get(name)
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn router(&self) -> &DataRouter {
        &self.router
    }

    fn write_direct(&self, target: StoreTarget, rows: &[Row], category: DataCategory, table: &str) -> bool {
        let result = match target {
            StoreTarget::TimeSeries => self.timeseries.save(rows, category, table),
            StoreTarget::Relational => self.relational.save(rows, category, table),
        };

        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Save of {} rows to {} ({} store) failed: {}", rows.len(), table, target, e);
                false
            }
        }
    }

    fn emit_operation(&self, event: DataOperationEvent) {
        match serde_json::to_value(&event) {
            Ok(payload) => {
                self.events.emit(DATA_OPERATION_COMPLETE, payload);
            }
            Err(e) => warn!("Failed to serialize {} event: {}", DATA_OPERATION_COMPLETE, e),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
