//! Typed entity tables and scenario-filtered projections.
//!
//! The store owns sites, resource types, scenarios, targets, the
//! scenario↔target relation, and per-(scenario, site) participation flags.
//! Optimizers only ever see read-only [`ScenarioView`] snapshots taken at
//! run start.

use std::collections::{BTreeMap, BTreeSet};

mod entities;
mod error;
mod view;

pub use entities::{ResourceType, Scenario, Site, Target};
pub use error::StoreError;
pub use view::ScenarioView;

use crate::{ScenarioId, SiteId, TargetId, TypeId};

/// Owner of the entity tables.
///
/// Iteration order everywhere is id order (`BTreeMap`-backed), which keeps
/// model construction deterministic for identical inputs.
///
/// # Examples
///
/// ```
/// use shieldopt::store::{DataStore, Scenario, Site, Target};
///
/// let mut store = DataStore::new();
/// store.add_site(Site {
///     id: 1, name: "Alpha".into(), lat: 38.0, lon: 23.7, capacity: 5, priority: 1.0,
/// }).unwrap();
/// store.add_scenario(Scenario {
///     id: 1, name: "Northern".into(), probability: Some(0.4),
/// }).unwrap();
/// store.add_target(Target {
///     id: 10, name: "T-10".into(), lat: 40.0, lon: 26.0, priority: 3.0,
/// }).unwrap();
/// store.add_scenario_target(1, 10).unwrap();
///
/// let view = store.scenario_view(1).unwrap();
/// assert_eq!(view.sites.len(), 1);
/// assert_eq!(view.targets.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    sites: BTreeMap<SiteId, Site>,
    types: BTreeMap<TypeId, ResourceType>,
    scenarios: BTreeMap<ScenarioId, Scenario>,
    targets: BTreeMap<TargetId, Target>,
    memberships: BTreeSet<(ScenarioId, TargetId)>,
    /// Sites marked neutral/non-participating for a given scenario.
    excluded: BTreeSet<(ScenarioId, SiteId)>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a deployment site.
    ///
    /// # Errors
    ///
    /// `DuplicateSite` if the id is already present.
    pub fn add_site(&mut self, site: Site) -> Result<(), StoreError> {
        if self.sites.contains_key(&site.id) {
            return Err(StoreError::DuplicateSite(site.id));
        }
        self.sites.insert(site.id, site);
        Ok(())
    }

    /// Adds a resource type (with its global stock).
    pub fn add_resource_type(&mut self, ty: ResourceType) -> Result<(), StoreError> {
        if self.types.contains_key(&ty.id) {
            return Err(StoreError::DuplicateType(ty.id));
        }
        self.types.insert(ty.id, ty);
        Ok(())
    }

    /// Adds a scenario.
    ///
    /// # Errors
    ///
    /// `ReservedScenarioId` for id 0 (the robust result key), or
    /// `DuplicateScenario` if the id is already present.
    pub fn add_scenario(&mut self, scenario: Scenario) -> Result<(), StoreError> {
        if scenario.id == crate::ROBUST_KEY {
            return Err(StoreError::ReservedScenarioId);
        }
        if self.scenarios.contains_key(&scenario.id) {
            return Err(StoreError::DuplicateScenario(scenario.id));
        }
        self.scenarios.insert(scenario.id, scenario);
        Ok(())
    }

    /// Adds a target.
    pub fn add_target(&mut self, target: Target) -> Result<(), StoreError> {
        if self.targets.contains_key(&target.id) {
            return Err(StoreError::DuplicateTarget(target.id));
        }
        self.targets.insert(target.id, target);
        Ok(())
    }

    /// Puts a target in play for a scenario. Idempotent.
    ///
    /// # Errors
    ///
    /// Both endpoints must already exist; a membership row may never dangle.
    pub fn add_scenario_target(
        &mut self,
        scenario: ScenarioId,
        target: TargetId,
    ) -> Result<(), StoreError> {
        if !self.scenarios.contains_key(&scenario) {
            return Err(StoreError::UnknownScenario(scenario));
        }
        if !self.targets.contains_key(&target) {
            return Err(StoreError::UnknownTarget(target));
        }
        self.memberships.insert((scenario, target));
        Ok(())
    }

    /// Removes a target entity, returning it if it existed.
    ///
    /// Membership rows pointing at the removed target are left in place, as
    /// an ingest refresh would leave them; they surface as
    /// `DanglingScenarioTarget` when a view is next built, blocking the run.
    pub fn remove_target(&mut self, id: TargetId) -> Option<Target> {
        self.targets.remove(&id)
    }

    /// Marks a site as participating (default) or neutral for one scenario.
    ///
    /// Which sites sit out which conflict pairing is configuration supplied
    /// by the ingest layer; the store only records the fact.
    pub fn set_participation(
        &mut self,
        scenario: ScenarioId,
        site: SiteId,
        participates: bool,
    ) -> Result<(), StoreError> {
        if !self.scenarios.contains_key(&scenario) {
            return Err(StoreError::UnknownScenario(scenario));
        }
        if !self.sites.contains_key(&site) {
            return Err(StoreError::UnknownSite(site));
        }
        if participates {
            self.excluded.remove(&(scenario, site));
        } else {
            self.excluded.insert((scenario, site));
        }
        Ok(())
    }

    /// Whether a site participates in a scenario (true unless excluded).
    pub fn participates(&self, scenario: ScenarioId, site: SiteId) -> bool {
        !self.excluded.contains(&(scenario, site))
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(&id)
    }

    pub fn resource_type(&self, id: TypeId) -> Option<&ResourceType> {
        self.types.get(&id)
    }

    pub fn scenario(&self, id: ScenarioId) -> Option<&Scenario> {
        self.scenarios.get(&id)
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// All sites in id order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    /// All resource types in id order.
    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    /// All scenarios in id order.
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    /// All targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// The full site catalog, cloned. Used by the robust model, whose shared
    /// allocation spans every site regardless of per-scenario participation.
    pub fn site_catalog(&self) -> Vec<Site> {
        self.sites.values().cloned().collect()
    }

    /// The full resource-type catalog, cloned.
    pub fn type_catalog(&self) -> Vec<ResourceType> {
        self.types.values().cloned().collect()
    }

    /// Builds the read-only snapshot for one scenario run.
    ///
    /// Validates that the scenario exists and that every membership row
    /// resolves to a stored target; inconsistency blocks the run instead of
    /// silently dropping rows.
    pub fn scenario_view(&self, id: ScenarioId) -> Result<ScenarioView, StoreError> {
        let scenario = self
            .scenarios
            .get(&id)
            .ok_or(StoreError::UnknownScenario(id))?;

        let mut targets = Vec::new();
        for &(s, t) in self.memberships.range((id, TargetId::MIN)..=(id, TargetId::MAX)) {
            debug_assert_eq!(s, id);
            let target = self
                .targets
                .get(&t)
                .ok_or(StoreError::DanglingScenarioTarget {
                    scenario: id,
                    target: t,
                })?;
            targets.push(target.clone());
        }

        let sites = self
            .sites
            .values()
            .filter(|s| self.participates(id, s.id))
            .cloned()
            .collect();

        Ok(ScenarioView {
            scenario_id: id,
            scenario_name: scenario.name.clone(),
            probability: scenario.probability,
            sites,
            types: self.types.values().cloned().collect(),
            targets,
        })
    }

    /// Builds one view per scenario for a robust run.
    ///
    /// # Errors
    ///
    /// `NoScenarios` when the scenario table is empty, and
    /// `MissingProbability` for any scenario without a declared weight;
    /// defaulting one would silently skew the robust objective.
    pub fn robust_views(&self) -> Result<Vec<ScenarioView>, StoreError> {
        if self.scenarios.is_empty() {
            return Err(StoreError::NoScenarios);
        }
        let mut views = Vec::with_capacity(self.scenarios.len());
        for scenario in self.scenarios.values() {
            if scenario.probability.is_none() {
                return Err(StoreError::MissingProbability {
                    scenario: scenario.id,
                    name: scenario.name.clone(),
                });
            }
            views.push(self.scenario_view(scenario.id)?);
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_basics() -> DataStore {
        let mut store = DataStore::new();
        store
            .add_site(Site {
                id: 1,
                name: "Alpha".into(),
                lat: 38.0,
                lon: 23.7,
                capacity: 5,
                priority: 1.0,
            })
            .unwrap();
        store
            .add_site(Site {
                id: 2,
                name: "Bravo".into(),
                lat: 41.0,
                lon: 28.9,
                capacity: 3,
                priority: 2.0,
            })
            .unwrap();
        store
            .add_resource_type(ResourceType {
                id: 1,
                name: "SR-1".into(),
                range_km: 1000.0,
                warhead_multiplier: 1.0,
                accuracy_multiplier: 1.0,
                total_stock: 6,
            })
            .unwrap();
        store
            .add_scenario(Scenario {
                id: 1,
                name: "Northern".into(),
                probability: Some(0.4),
            })
            .unwrap();
        store
            .add_target(Target {
                id: 10,
                name: "T-10".into(),
                lat: 40.0,
                lon: 26.0,
                priority: 3.0,
            })
            .unwrap();
        store
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = store_with_basics();
        let err = store
            .add_site(Site {
                id: 1,
                name: "Copy".into(),
                lat: 0.0,
                lon: 0.0,
                capacity: 1,
                priority: 0.0,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateSite(1));
    }

    #[test]
    fn scenario_id_zero_is_reserved() {
        let mut store = DataStore::new();
        let err = store
            .add_scenario(Scenario {
                id: 0,
                name: "robust".into(),
                probability: None,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::ReservedScenarioId);
    }

    #[test]
    fn membership_requires_both_endpoints() {
        let mut store = store_with_basics();
        assert_eq!(
            store.add_scenario_target(9, 10),
            Err(StoreError::UnknownScenario(9))
        );
        assert_eq!(
            store.add_scenario_target(1, 99),
            Err(StoreError::UnknownTarget(99))
        );
        assert!(store.add_scenario_target(1, 10).is_ok());
        // Idempotent.
        assert!(store.add_scenario_target(1, 10).is_ok());
    }

    #[test]
    fn view_filters_targets_by_scenario() {
        let mut store = store_with_basics();
        store
            .add_scenario(Scenario {
                id: 2,
                name: "Southern".into(),
                probability: None,
            })
            .unwrap();
        store
            .add_target(Target {
                id: 11,
                name: "T-11".into(),
                lat: 35.0,
                lon: 25.0,
                priority: 1.0,
            })
            .unwrap();
        store.add_scenario_target(1, 10).unwrap();
        store.add_scenario_target(2, 11).unwrap();

        let view = store.scenario_view(1).unwrap();
        assert_eq!(view.scenario_name, "Northern");
        assert_eq!(view.targets.len(), 1);
        assert_eq!(view.targets[0].id, 10);
        assert_eq!(view.sites.len(), 2);
        assert_eq!(view.types.len(), 1);
    }

    #[test]
    fn view_of_unknown_scenario_fails() {
        let store = store_with_basics();
        assert_eq!(
            store.scenario_view(77).unwrap_err(),
            StoreError::UnknownScenario(77)
        );
    }

    #[test]
    fn excluded_site_leaves_the_view() {
        let mut store = store_with_basics();
        store.set_participation(1, 2, false).unwrap();

        let view = store.scenario_view(1).unwrap();
        assert_eq!(view.sites.len(), 1);
        assert_eq!(view.sites[0].id, 1);

        // Re-enabling restores it.
        store.set_participation(1, 2, true).unwrap();
        assert_eq!(store.scenario_view(1).unwrap().sites.len(), 2);
    }

    #[test]
    fn dangling_membership_blocks_the_view() {
        let mut store = store_with_basics();
        store.add_scenario_target(1, 10).unwrap();
        store.remove_target(10).unwrap();

        let err = store.scenario_view(1).unwrap_err();
        assert_eq!(
            err,
            StoreError::DanglingScenarioTarget {
                scenario: 1,
                target: 10
            }
        );
    }

    #[test]
    fn robust_views_require_probabilities() {
        let mut store = store_with_basics();
        store
            .add_scenario(Scenario {
                id: 2,
                name: "Southern".into(),
                probability: None,
            })
            .unwrap();

        let err = store.robust_views().unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingProbability {
                scenario: 2,
                name: "Southern".into()
            }
        );
    }

    #[test]
    fn robust_views_on_empty_store_fail() {
        let store = DataStore::new();
        assert_eq!(store.robust_views().unwrap_err(), StoreError::NoScenarios);
    }

    #[test]
    fn capacity_and_stock_totals() {
        let mut store = store_with_basics();
        store.add_scenario_target(1, 10).unwrap();
        let view = store.scenario_view(1).unwrap();
        assert_eq!(view.total_capacity(), 8);
        assert_eq!(view.total_stock(), 6);
    }
}
