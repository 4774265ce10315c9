//! Entity records held by the data store.
//!
//! All records are immutable within an optimization run; they are created and
//! updated by an external ingest collaborator, not by the optimizers. Field
//! names are the stable contract consumed by other components, so the serde
//! derives (behind the `serde` feature) must not rename them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ScenarioId, SiteId, TargetId, TypeId};

/// A fixed deployment site able to host resource units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Maximum total units of all types that can be hosted here.
    pub capacity: u32,
    /// Non-negative defensive value multiplier.
    pub priority: f64,
}

/// A resource (missile) type, joined with its global inventory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceType {
    pub id: TypeId,
    pub name: String,
    /// Maximum effective distance in kilometers.
    pub range_km: f64,
    pub warhead_multiplier: f64,
    pub accuracy_multiplier: f64,
    /// Global inventory cap across all sites.
    pub total_stock: u32,
}

/// A named adversarial configuration with its own target set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    /// Relative likelihood weight, used only by the robust model. Weights
    /// across the active scenario set need not sum to 1.
    pub probability: Option<f64>,
}

/// A geographically located target. Targets exist independently of any
/// scenario and may belong to zero or several of them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Non-negative attack value multiplier.
    pub priority: f64,
}
