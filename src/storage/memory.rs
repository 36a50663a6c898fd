//! In-memory store implementations
//!
//! Same observable semantics as the Postgres repositories: the time-series store
//! keeps one row per `(timestamp, tags)` key with last-write-wins, the relational
//! store applies unit-of-work writes only on commit. Fault switches let callers
//! simulate store outages.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::errors::StoreError;
use super::table_schema::{RowKey, SchemaCatalog, VALID_COLUMN};
use super::traits::{AuditTrail, RelationalAccess, TimeSeriesAccess, UnitOfWork, UnitOfWorkSource};
use super::value::{Filters, Frame, Row, Value};
use crate::database::models::{AuditRecord, NewAuditRecord};
use crate::routing::DataCategory;

/// Time-series store keyed by `(timestamp, tags)`
pub struct InMemoryTimeSeries {
    catalog: Arc<SchemaCatalog>,
    tables: RwLock<HashMap<String, BTreeMap<RowKey, Row>>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    save_calls: AtomicU64,
}

impl InMemoryTimeSeries {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self {
            catalog,
            tables: RwLock::new(HashMap::new()),
            fail_saves: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            save_calls: AtomicU64::new(0),
        }
    }

    /// Make every subsequent `save` fail
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load` fail
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::Relaxed)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map(BTreeMap::len).unwrap_or(0)
    }

    /// All rows of `table` in key order
    pub fn snapshot(&self, table: &str) -> Frame {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl TimeSeriesAccess for InMemoryTimeSeries {
    fn save(&self, rows: &[Row], category: DataCategory, table: &str) -> Result<usize, StoreError> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("time-series store rejected write".to_string()));
        }

        let schema = self
            .catalog
            .resolve(table, category)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        // Resolve every key before touching the table so a bad row rejects the batch
        let keyed = rows
            .iter()
            .map(|row| {
                let key = schema.row_key(row).ok_or_else(|| {
                    StoreError::Query(format!("row is missing key columns of {}", schema.name))
                })?;
                let mut row = row.clone();
                if !row.contains(VALID_COLUMN) {
                    row.set(VALID_COLUMN, true);
                }
                Ok((key, row))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut tables = self.tables.write();
        let target = tables.entry(table.to_string()).or_default();
        for (key, row) in keyed {
            target.insert(key, row);
        }

        Ok(rows.len())
    }

    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("time-series store rejected read".to_string()));
        }

        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| rows.values().filter(|r| filters.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

enum StagedWrite {
    Execute { sql: String },
    Insert { table: String, rows: Vec<Row> },
    Upsert { table: String, key_columns: Vec<String>, row: Row },
}

#[derive(Default)]
struct RelationalInner {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    statements: Mutex<Vec<String>>,
    unhealthy: AtomicBool,
    fail_commits: AtomicBool,
    open_units: AtomicUsize,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl RelationalInner {
    fn apply(&self, writes: Vec<StagedWrite>) {
        let mut tables = self.tables.write();
        let mut statements = self.statements.lock();

        for write in writes {
            match write {
                StagedWrite::Execute { sql } => statements.push(sql),
                StagedWrite::Insert { table, rows } => {
                    tables.entry(table).or_default().extend(rows);
                }
                StagedWrite::Upsert { table, key_columns, row } => {
                    let target = tables.entry(table).or_default();
                    let existing = target.iter_mut().find(|candidate| {
                        key_columns.iter().all(|k| candidate.get(k) == row.get(k))
                    });
                    match existing {
                        Some(slot) => *slot = row,
                        None => target.push(row),
                    }
                }
            }
        }
    }
}

/// Relational store with commit-time application of unit-of-work writes
#[derive(Clone, Default)]
pub struct InMemoryRelational {
    inner: Arc<RelationalInner>,
}

impl InMemoryRelational {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unhealthy stores fail `health_check` and refuse new units of work
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn rows(&self, table: &str) -> Frame {
        self.inner.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Raw statements applied by committed units of work
    pub fn executed_statements(&self) -> Vec<String> {
        self.inner.statements.lock().clone()
    }

    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }

    pub fn rollback_count(&self) -> u64 {
        self.inner.rollbacks.load(Ordering::Relaxed)
    }

    /// Units of work handed out and not yet dropped
    pub fn open_units(&self) -> usize {
        self.inner.open_units.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.inner.unhealthy.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("relational store is down".to_string()));
        }
        Ok(())
    }
}

impl RelationalAccess for InMemoryRelational {
    fn save(&self, rows: &[Row], _category: DataCategory, table: &str) -> Result<usize, StoreError> {
        self.ensure_available()?;
        self.inner
            .tables
            .write()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len())
    }

    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError> {
        self.ensure_available()?;
        Ok(self
            .inner
            .tables
            .read()
            .get(table)
            .map(|rows| rows.iter().filter(|r| filters.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    fn health_check(&self) -> bool {
        !self.inner.unhealthy.load(Ordering::SeqCst)
    }
}

impl UnitOfWorkSource for InMemoryRelational {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.ensure_available()?;
        self.inner.open_units.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            staged: Vec::new(),
            finished: false,
        }))
    }
}

struct MemoryUnitOfWork {
    inner: Arc<RelationalInner>,
    staged: Vec<StagedWrite>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Query("unit of work already finished".to_string()));
        }
        Ok(())
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<usize, StoreError> {
        self.ensure_open()?;
        self.staged.push(StagedWrite::Execute { sql: sql.to_string() });
        Ok(0)
    }

    fn insert(&mut self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        self.ensure_open()?;
        self.staged.push(StagedWrite::Insert {
            table: table.to_string(),
            rows: rows.to_vec(),
        });
        Ok(rows.len())
    }

    fn upsert(&mut self, table: &str, key_columns: &[&str], row: &Row) -> Result<usize, StoreError> {
        self.ensure_open()?;
        if let Some(missing) = key_columns.iter().find(|k| !row.contains(k)) {
            return Err(StoreError::Query(format!("upsert key column {} missing", missing)));
        }
        self.staged.push(StagedWrite::Upsert {
            table: table.to_string(),
            key_columns: key_columns.iter().map(|k| k.to_string()).collect(),
            row: row.clone(),
        });
        Ok(1)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.finished = true;

        if self.inner.fail_commits.load(Ordering::SeqCst) {
            self.staged.clear();
            self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Query("commit rejected by relational store".to_string()));
        }

        self.inner.apply(std::mem::take(&mut self.staged));
        self.inner.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.finished = true;
        self.staged.clear();
        self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.open_units.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Audit trail kept in a vector
#[derive(Default)]
pub struct InMemoryAuditTrail {
    records: Mutex<Vec<AuditRecord>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn find_by_transaction_id(&self, transaction_id: &str) -> Option<AuditRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.transaction_id == transaction_id)
            .cloned()
    }

    pub fn find_by_business_id(&self, business_id: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.business_id == business_id)
            .cloned()
            .collect()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    fn record(&self, record: &NewAuditRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit store rejected write".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().push(record.clone().into_record(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TXN_ID_COLUMN;
    use chrono::{TimeZone, Utc};

    fn tick(second: u32, symbol: &str, price: f64) -> Row {
        Row::new()
            .with("ts", Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, second).unwrap())
            .with("symbol", symbol)
            .with("price", price)
            .with("volume", 100i64)
            .with("amount", price * 100.0)
    }

    fn timeseries() -> InMemoryTimeSeries {
        InMemoryTimeSeries::new(Arc::new(SchemaCatalog::market_data()))
    }

    #[test]
    fn test_timeseries_last_write_wins() {
        let store = timeseries();

        store.save(&[tick(0, "A", 10.0), tick(1, "A", 11.0)], DataCategory::TickData, "tick_data").unwrap();
        store.save(&[tick(0, "A", 12.0)], DataCategory::TickData, "tick_data").unwrap();

        let rows = store.snapshot("tick_data");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("price"), Some(&Value::Float(12.0)));
    }

    #[test]
    fn test_timeseries_defaults_valid_flag() {
        let store = timeseries();
        store.save(&[tick(0, "A", 10.0)], DataCategory::TickData, "tick_data").unwrap();

        let rows = store.load("tick_data", &Filters::new().eq(VALID_COLUMN, true)).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_timeseries_rejects_batch_with_bad_row() {
        let store = timeseries();
        let mut bad = tick(1, "A", 10.0);
        bad.remove("symbol");

        let result = store.save(&[tick(0, "A", 10.0), bad], DataCategory::TickData, "tick_data");
        assert!(result.is_err());
        assert_eq!(store.row_count("tick_data"), 0);
    }

    #[test]
    fn test_timeseries_filters_by_txn() {
        let store = timeseries();
        let a = tick(0, "A", 10.0).with(TXN_ID_COLUMN, "t1");
        let b = tick(1, "A", 10.0).with(TXN_ID_COLUMN, "t2");
        store.save(&[a, b], DataCategory::TickData, "tick_data").unwrap();

        let rows = store.load("tick_data", &Filters::new().eq(TXN_ID_COLUMN, "t2")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp("ts").unwrap().timestamp() % 60, 1);
    }

    #[test]
    fn test_timeseries_fault_injection() {
        let store = timeseries();
        store.set_fail_saves(true);
        assert!(store.save(&[tick(0, "A", 1.0)], DataCategory::TickData, "tick_data").is_err());

        store.set_fail_loads(true);
        assert!(store.load("tick_data", &Filters::new()).is_err());
    }

    #[test]
    fn test_unit_of_work_applies_on_commit_only() {
        let store = InMemoryRelational::new();
        let row = Row::new().with("symbol", "A").with("table_name", "tick_data").with("seq", 1i64);

        let mut uow = store.begin().unwrap();
        uow.upsert("sync_watermarks", &["symbol", "table_name"], &row).unwrap();
        assert!(store.rows("sync_watermarks").is_empty());

        uow.commit().unwrap();
        assert_eq!(store.rows("sync_watermarks").len(), 1);
        assert_eq!(store.commit_count(), 1);

        let mut uow = store.begin().unwrap();
        uow.upsert("sync_watermarks", &["symbol", "table_name"], &row.clone().with("seq", 2i64))
            .unwrap();
        uow.commit().unwrap();

        let rows = store.rows("sync_watermarks");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("seq"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unit_of_work_drop_rolls_back() {
        let store = InMemoryRelational::new();
        {
            let mut uow = store.begin().unwrap();
            uow.insert("ledger", &[Row::new().with("k", 1i64)]).unwrap();
            assert_eq!(store.open_units(), 1);
        }

        assert_eq!(store.open_units(), 0);
        assert_eq!(store.rollback_count(), 1);
        assert!(store.rows("ledger").is_empty());
    }

    #[test]
    fn test_failed_commit_discards_writes() {
        let store = InMemoryRelational::new();
        store.set_fail_commits(true);

        let mut uow = store.begin().unwrap();
        uow.execute("UPDATE sync_watermarks SET seq = seq + 1", &[]).unwrap();
        assert!(uow.commit().is_err());
        assert!(store.executed_statements().is_empty());
    }

    #[test]
    fn test_unhealthy_store() {
        let store = InMemoryRelational::new();
        assert!(store.health_check());

        store.set_healthy(false);
        assert!(!store.health_check());
        assert!(store.begin().is_err());
        assert!(store.load("x", &Filters::new()).is_err());
    }

    #[test]
    fn test_audit_trail_assigns_ids() {
        use crate::database::models::{FinalStatus, StepStatus};

        let audit = InMemoryAuditTrail::new();
        for i in 0..3 {
            audit
                .record(&NewAuditRecord::new(
                    format!("txn_{}", i),
                    DataCategory::TickData,
                    "biz",
                    StepStatus::Success,
                    StepStatus::Success,
                    FinalStatus::Committed,
                    None,
                ))
                .unwrap();
        }

        let records = audit.records();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(audit.find_by_business_id("biz").len(), 3);
        assert!(audit.find_by_transaction_id("txn_1").is_some());
    }
}
