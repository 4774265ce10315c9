//! Persisted allocation results, keyed by scenario.
//!
//! The store enforces the two write-side rules of the result lifecycle:
//! a rerun *replaces* its key's rows wholesale (never a partial merge), and
//! two runs for the same key never overlap (a slower stale run must not
//! clobber a newer result). Runs for different keys proceed in parallel.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Condvar, Mutex, MutexGuard, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod error;

pub use error::ResultError;

use crate::store::DataStore;
use crate::{ScenarioKey, SiteId, TypeId};

/// One persisted allocation cell: units of one type at one site, under one
/// scenario key. Zero-unit cells are omitted from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AllocationRow {
    pub scenario_key: ScenarioKey,
    pub site_id: SiteId,
    pub type_id: TypeId,
    pub allocated: u32,
}

/// Read-back row joined with human-readable names for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AllocationView {
    pub scenario_key: ScenarioKey,
    pub site_id: SiteId,
    pub site_name: String,
    pub type_id: TypeId,
    pub type_name: String,
    pub allocated: u32,
}

/// Owner of allocation result records.
///
/// Thread-safe; clones of `&ResultStore` may be used from concurrent runs.
///
/// # Examples
///
/// ```
/// use shieldopt::results::{AllocationRow, ResultStore};
///
/// let store = ResultStore::new();
/// store.replace_for_key(1, vec![AllocationRow {
///     scenario_key: 1, site_id: 1, type_id: 1, allocated: 2,
/// }]).unwrap();
///
/// // A rerun replaces the key's rows wholesale.
/// store.replace_for_key(1, vec![]).unwrap();
/// assert!(store.rows_for_key(1).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ResultStore {
    rows: RwLock<HashMap<ScenarioKey, Vec<AllocationRow>>>,
    busy: Mutex<BTreeSet<ScenarioKey>>,
    released: Condvar,
}

/// Exclusive run token for one scenario key, released on drop.
#[must_use = "dropping the guard immediately releases the key"]
pub struct RunGuard<'a> {
    store: &'a ResultStore,
    key: ScenarioKey,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn busy_set(&self) -> MutexGuard<'_, BTreeSet<ScenarioKey>> {
        self.busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquires the exclusive run token for `key`, blocking while another
    /// run holds it. Runs for other keys are unaffected.
    pub fn begin_run(&self, key: ScenarioKey) -> RunGuard<'_> {
        let mut busy = self.busy_set();
        while busy.contains(&key) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        busy.insert(key);
        RunGuard { store: self, key }
    }

    /// Atomically replaces all rows stored under `key`. Rows for every other
    /// key are untouched.
    ///
    /// # Errors
    ///
    /// `KeyMismatch` if any row carries a different scenario key.
    pub fn replace_for_key(
        &self,
        key: ScenarioKey,
        rows: Vec<AllocationRow>,
    ) -> Result<(), ResultError> {
        if let Some(row) = rows.iter().find(|r| r.scenario_key != key) {
            return Err(ResultError::KeyMismatch {
                key,
                row_key: row.scenario_key,
            });
        }
        let mut map = self
            .rows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(key, rows);
        Ok(())
    }

    /// All rows stored under `key`, cloned. Empty if the key has no result.
    pub fn rows_for_key(&self, key: ScenarioKey) -> Vec<AllocationRow> {
        self.rows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Scenario keys that currently hold a result, in ascending order.
    pub fn keys(&self) -> Vec<ScenarioKey> {
        let mut keys: Vec<ScenarioKey> = self
            .rows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Rows under `key` joined with site and type names, ordered by
    /// (site name, type name) for presentation.
    ///
    /// # Errors
    ///
    /// `UnknownSite`/`UnknownType` if a stored row no longer resolves
    /// against the data store.
    pub fn read_back(
        &self,
        key: ScenarioKey,
        data: &DataStore,
    ) -> Result<Vec<AllocationView>, ResultError> {
        let mut views = Vec::new();
        for row in self.rows_for_key(key) {
            let site = data
                .site(row.site_id)
                .ok_or(ResultError::UnknownSite(row.site_id))?;
            let ty = data
                .resource_type(row.type_id)
                .ok_or(ResultError::UnknownType(row.type_id))?;
            views.push(AllocationView {
                scenario_key: row.scenario_key,
                site_id: row.site_id,
                site_name: site.name.clone(),
                type_id: row.type_id,
                type_name: ty.name.clone(),
                allocated: row.allocated,
            });
        }
        views.sort_by(|a, b| {
            (a.site_name.as_str(), a.type_name.as_str())
                .cmp(&(b.site_name.as_str(), b.type_name.as_str()))
        });
        Ok(views)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.store.busy_set().remove(&self.key);
        self.store.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ResourceType, Site};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    fn row(key: ScenarioKey, site: SiteId, ty: TypeId, units: u32) -> AllocationRow {
        AllocationRow {
            scenario_key: key,
            site_id: site,
            type_id: ty,
            allocated: units,
        }
    }

    #[test]
    fn replace_is_scoped_to_one_key() {
        let store = ResultStore::new();
        store.replace_for_key(1, vec![row(1, 1, 1, 2)]).unwrap();
        store.replace_for_key(2, vec![row(2, 1, 1, 5)]).unwrap();

        // Rerunning key 1 replaces its rows and leaves key 2 alone.
        store
            .replace_for_key(1, vec![row(1, 2, 1, 3), row(1, 1, 1, 1)])
            .unwrap();
        assert_eq!(store.rows_for_key(1).len(), 2);
        assert_eq!(store.rows_for_key(2), vec![row(2, 1, 1, 5)]);
        assert_eq!(store.keys(), vec![1, 2]);
    }

    #[test]
    fn replace_rejects_foreign_rows() {
        let store = ResultStore::new();
        let err = store
            .replace_for_key(1, vec![row(1, 1, 1, 2), row(3, 1, 1, 2)])
            .unwrap_err();
        assert_eq!(err, ResultError::KeyMismatch { key: 1, row_key: 3 });
        // The failed replace must not have partially applied.
        assert!(store.rows_for_key(1).is_empty());
    }

    #[test]
    fn missing_key_reads_back_empty() {
        let store = ResultStore::new();
        assert!(store.rows_for_key(9).is_empty());
    }

    #[test]
    fn read_back_joins_and_sorts_by_names() {
        let mut data = DataStore::new();
        data.add_site(Site {
            id: 1,
            name: "Zulu".into(),
            lat: 0.0,
            lon: 0.0,
            capacity: 5,
            priority: 1.0,
        })
        .unwrap();
        data.add_site(Site {
            id: 2,
            name: "Alpha".into(),
            lat: 0.0,
            lon: 0.0,
            capacity: 5,
            priority: 1.0,
        })
        .unwrap();
        data.add_resource_type(ResourceType {
            id: 1,
            name: "SR-1".into(),
            range_km: 100.0,
            warhead_multiplier: 1.0,
            accuracy_multiplier: 1.0,
            total_stock: 10,
        })
        .unwrap();

        let store = ResultStore::new();
        store
            .replace_for_key(1, vec![row(1, 1, 1, 2), row(1, 2, 1, 3)])
            .unwrap();

        let views = store.read_back(1, &data).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].site_name, "Alpha");
        assert_eq!(views[1].site_name, "Zulu");
        assert_eq!(views[0].type_name, "SR-1");
    }

    #[test]
    fn read_back_fails_on_unresolvable_rows() {
        let data = DataStore::new();
        let store = ResultStore::new();
        store.replace_for_key(1, vec![row(1, 7, 1, 2)]).unwrap();
        assert_eq!(
            store.read_back(1, &data).unwrap_err(),
            ResultError::UnknownSite(7)
        );
    }

    #[test]
    fn same_key_runs_are_serialized() {
        let store = Arc::new(ResultStore::new());
        let guard = store.begin_run(1);

        let (tx, rx) = mpsc::channel();
        let store2 = Arc::clone(&store);
        let handle = thread::spawn(move || {
            let _guard = store2.begin_run(1);
            tx.send(()).unwrap();
        });

        // The second run is blocked while the first guard is alive.
        assert!(rx.recv_timeout(std::time::Duration::from_millis(50)).is_err());
        drop(guard);
        assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn distinct_keys_run_concurrently() {
        let store = ResultStore::new();
        let _one = store.begin_run(1);
        // Acquiring a different key must not block.
        let _two = store.begin_run(2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn row_serializes_with_contract_field_names() {
        let json = serde_json::to_value(row(1, 2, 3, 4)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "scenario_key": 1,
                "site_id": 2,
                "type_id": 3,
                "allocated": 4
            })
        );
    }
}
