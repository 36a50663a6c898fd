use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::category::{DataCategory, StoreTarget};
use crate::adapters::AdapterRegistry;

/// Routing statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_categories: usize,
    pub timeseries_categories: usize,
    pub relational_categories: usize,
    pub adapter_count: usize,
    pub adapters: Vec<String>,
}

/// Deterministic category -> store lookup table
///
/// Built once from `DataCategory::all()` and read-only afterwards, so it can be
/// shared freely across threads without locking.
#[derive(Debug, Clone)]
pub struct DataRouter {
    table: HashMap<DataCategory, StoreTarget>,
}

impl DataRouter {
    pub fn new() -> Self {
        let table: HashMap<DataCategory, StoreTarget> = DataCategory::all()
            .into_iter()
            .map(|category| (category, category.default_target()))
            .collect();

        tracing::debug!("Routing table built with {} categories", table.len());

        Self { table }
    }

    /// Store that owns `category`
    pub fn target_for(&self, category: DataCategory) -> StoreTarget {
        // The table is built from the full variant list, so the fallback only
        // guards against a variant added without updating `DataCategory::all`.
        self.table
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_target())
    }

    /// All categories routed to `target`, in declaration order
    pub fn categories_for(&self, target: StoreTarget) -> Vec<DataCategory> {
        DataCategory::all()
            .into_iter()
            .filter(|c| self.target_for(*c) == target)
            .collect()
    }

    /// Category counts per store plus the adapters currently registered
    pub fn stats(&self, adapters: &AdapterRegistry) -> RoutingStats {
        let timeseries_categories = self
            .table
            .values()
            .filter(|t| **t == StoreTarget::TimeSeries)
            .count();
        let names = adapters.list_all();

        RoutingStats {
            total_categories: self.table.len(),
            timeseries_categories,
            relational_categories: self.table.len() - timeseries_categories,
            adapter_count: names.len(),
            adapters: names,
        }
    }
}

impl Default for DataRouter {
    fn default() -> Self {
        Self::new()
    }
}
