//! Great-circle geometry between sites and targets.
//!
//! Distances are derived data: the [`DistanceMatrix`] is recomputed from the
//! current site/target positions at the start of every optimization run and
//! never persisted. This module is also the gate that rejects invalid
//! coordinates before any model is built.

use std::collections::HashMap;

use thiserror::Error;

use crate::store::{Site, Target};
use crate::{SiteId, TargetId};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors raised while validating positions or building a distance matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeodesyError {
    #[error("site {id} ({name}) has an invalid position: lat {lat}, lon {lon}")]
    InvalidSitePosition {
        id: SiteId,
        name: String,
        lat: f64,
        lon: f64,
    },

    #[error("target {id} ({name}) has an invalid position: lat {lat}, lon {lon}")]
    InvalidTargetPosition {
        id: TargetId,
        name: String,
        lat: f64,
        lon: f64,
    },
}

/// Haversine great-circle distance between two points, in kilometers.
///
/// Uses the `atan2` formulation, which stays well-conditioned for nearly
/// antipodal and nearly coincident pairs. Identical coordinates yield exactly
/// 0. NaN coordinates propagate to a NaN distance; callers are expected to
/// reject NaN before feeding distances into constraints (see
/// [`DistanceMatrix::compute`]).
///
/// # Examples
///
/// ```
/// use shieldopt::geodesy::haversine_km;
///
/// // New York to London is roughly 5,570 km.
/// let d = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
/// assert!((d - 5570.0).abs() < 50.0);
/// ```
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` marginally outside [0, 1] for antipodal pairs,
    // which would make the square roots below produce NaN.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

fn valid_position(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Dense site × target distance grid in kilometers.
///
/// Deterministic given positions: recomputing from the same sites and targets
/// yields identical values. Construction fails (rather than silently dropping
/// rows) if any position is non-finite or outside latitude/longitude bounds.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    site_index: HashMap<SiteId, usize>,
    target_index: HashMap<TargetId, usize>,
    values: Vec<f64>,
    n_targets: usize,
}

impl DistanceMatrix {
    /// Computes all pairwise site→target distances.
    ///
    /// # Errors
    ///
    /// Returns [`GeodesyError`] naming the first site or target whose
    /// position is NaN, infinite, or out of coordinate range.
    pub fn compute(sites: &[Site], targets: &[Target]) -> Result<Self, GeodesyError> {
        for site in sites {
            if !valid_position(site.lat, site.lon) {
                return Err(GeodesyError::InvalidSitePosition {
                    id: site.id,
                    name: site.name.clone(),
                    lat: site.lat,
                    lon: site.lon,
                });
            }
        }
        for target in targets {
            if !valid_position(target.lat, target.lon) {
                return Err(GeodesyError::InvalidTargetPosition {
                    id: target.id,
                    name: target.name.clone(),
                    lat: target.lat,
                    lon: target.lon,
                });
            }
        }

        let n_targets = targets.len();
        let mut values = Vec::with_capacity(sites.len() * n_targets);
        for site in sites {
            for target in targets {
                values.push(haversine_km(site.lat, site.lon, target.lat, target.lon));
            }
        }

        let site_index = sites.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let target_index = targets.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

        Ok(Self {
            site_index,
            target_index,
            values,
            n_targets,
        })
    }

    /// Distance in kilometers between a site and a target, if both are known
    /// to this matrix.
    pub fn km(&self, site: SiteId, target: TargetId) -> Option<f64> {
        let row = *self.site_index.get(&site)?;
        let col = *self.target_index.get(&target)?;
        Some(self.values[row * self.n_targets + col])
    }

    /// Number of (site, target) pairs covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
