use thiserror::Error;

use crate::{ScenarioKey, SiteId, TypeId};

/// Errors that can occur while writing or reading back allocation results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("row keyed {row_key} passed to a replace of scenario key {key}")]
    KeyMismatch { key: ScenarioKey, row_key: ScenarioKey },

    #[error("allocation row references unknown site {0}")]
    UnknownSite(SiteId),

    #[error("allocation row references unknown resource type {0}")]
    UnknownType(TypeId),
}
