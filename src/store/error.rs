use thiserror::Error;

use crate::{ScenarioId, SiteId, TargetId, TypeId};

/// Errors that can occur while mutating or projecting the data store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("scenario {0} does not exist")]
    UnknownScenario(ScenarioId),

    #[error("site {0} does not exist")]
    UnknownSite(SiteId),

    #[error("target {0} does not exist")]
    UnknownTarget(TargetId),

    #[error("site id {0} already exists")]
    DuplicateSite(SiteId),

    #[error("resource type id {0} already exists")]
    DuplicateType(TypeId),

    #[error("scenario id {0} already exists")]
    DuplicateScenario(ScenarioId),

    #[error("target id {0} already exists")]
    DuplicateTarget(TargetId),

    #[error("scenario id 0 is reserved for the robust allocation result")]
    ReservedScenarioId,

    #[error("scenario {scenario} references missing target {target}")]
    DanglingScenarioTarget {
        scenario: ScenarioId,
        target: TargetId,
    },

    #[error("scenario {scenario} ({name}) has no probability; robust runs require one per scenario")]
    MissingProbability { scenario: ScenarioId, name: String },

    #[error("no scenarios are defined; a robust run needs at least one")]
    NoScenarios,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scenario_display() {
        assert_eq!(
            StoreError::UnknownScenario(42).to_string(),
            "scenario 42 does not exist"
        );
    }

    #[test]
    fn dangling_membership_display() {
        let e = StoreError::DanglingScenarioTarget {
            scenario: 2,
            target: 17,
        };
        assert_eq!(e.to_string(), "scenario 2 references missing target 17");
    }
}
