//! Read-only, scenario-filtered projections of the data store.

use crate::store::{ResourceType, Site, Target};
use crate::ScenarioId;

/// Snapshot of everything one optimization run needs for one scenario.
///
/// Built by [`DataStore::scenario_view`](crate::store::DataStore::scenario_view),
/// which validates referential integrity first. Cloned out of the store, so a
/// running solve never observes concurrent writes.
///
/// # Invariants
///
/// - `sites` contains only sites participating in this scenario, in id order
/// - `targets` contains exactly the scenario's targets, in id order, each of
///   which existed in the store at snapshot time
#[derive(Debug, Clone)]
pub struct ScenarioView {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    /// Relative likelihood weight, present when the scenario declares one.
    pub probability: Option<f64>,
    /// Active (participating) sites for this scenario.
    pub sites: Vec<Site>,
    /// The full resource-type catalog with stock.
    pub types: Vec<ResourceType>,
    /// Targets in play for this scenario.
    pub targets: Vec<Target>,
}

impl ScenarioView {
    /// Total hosting capacity over the active sites.
    pub fn total_capacity(&self) -> u64 {
        self.sites.iter().map(|s| u64::from(s.capacity)).sum()
    }

    /// Total inventory over all resource types.
    pub fn total_stock(&self) -> u64 {
        self.types.iter().map(|t| u64::from(t.total_stock)).sum()
    }
}
