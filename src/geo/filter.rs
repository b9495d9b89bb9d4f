// src/geo/filter.rs
//! Plausibility filter for incoming fixes

use super::{distance::segment_km, Position};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ACCURACY_M: f64 = 25.0;
pub const DEFAULT_MAX_JUMP_KM: f64 = 0.2;

/// Outcome of running a fix through [`GeoFilter::accept`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterVerdict {
    Accepted,
    /// Non-finite or out-of-range coordinates.
    RejectedInvalidPosition,
    RejectedLowAccuracy,
    /// Too far from the previous accepted position to be real movement.
    RejectedJump { jump_km: f64 },
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterVerdict::Accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub max_accuracy_m: f64,
    pub max_jump_km: f64,
}

impl Default for GeoFilter {
    fn default() -> Self {
        Self {
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            max_jump_km: DEFAULT_MAX_JUMP_KM,
        }
    }
}

impl GeoFilter {
    pub fn new(max_accuracy_m: f64, max_jump_km: f64) -> Self {
        Self {
            max_accuracy_m,
            max_jump_km,
        }
    }

    /// Judge a candidate against its own validity, the accuracy cap and,
    /// when there is a previous accepted position, the jump cap.
    pub fn accept(
        &self,
        candidate: Position,
        accuracy_m: f64,
        previous: Option<Position>,
    ) -> FilterVerdict {
        if !candidate.is_valid() {
            return FilterVerdict::RejectedInvalidPosition;
        }

        if accuracy_m.is_nan() || accuracy_m > self.max_accuracy_m {
            return FilterVerdict::RejectedLowAccuracy;
        }

        if let Some(previous) = previous {
            let jump_km = segment_km(previous, candidate);
            if jump_km > self.max_jump_km {
                return FilterVerdict::RejectedJump { jump_km };
            }
        }

        FilterVerdict::Accepted
    }
}
