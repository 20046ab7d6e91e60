use serde::{Deserialize, Serialize};

use crate::vector::Vec4;

/// Inputs handed to an external intervention gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReignitionRequest {
    pub fatigue: Vec4,
    pub trauma_intensity: f64,
    pub relational_trust: f64,
    pub proposed_magnitude: f64,
    /// Current anomaly score, filled in by the arbiter.
    pub anomaly_score: f64,
}

/// Decision case reported by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReignitionCase {
    /// Vulnerability too high; no intervention.
    Blocked,
    /// Anomaly score too high; listen instead of intervening.
    AnomalyHold,
    /// Deep intervention on high trust.
    HighTrust,
    Standard,
    NoIntervention,
}

impl ReignitionCase {
    #[inline]
    pub fn permits(self) -> bool {
        matches!(self, ReignitionCase::HighTrust | ReignitionCase::Standard)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReignitionDecision {
    pub magnitude: f64,
    pub case: ReignitionCase,
}

/// Intervention-bounding policy living outside this crate.
///
/// Implementations decide how far a proposed intervention may go given
/// fatigue, trauma, trust and the anomaly score. The arbiter only supplies
/// the score and holds the returned decision to its bounds.
pub trait ReignitionGate {
    fn decide(&self, req: &ReignitionRequest) -> ReignitionDecision;
}

impl<F> ReignitionGate for F
where
    F: Fn(&ReignitionRequest) -> ReignitionDecision,
{
    fn decide(&self, req: &ReignitionRequest) -> ReignitionDecision {
        self(req)
    }
}

/// Clamp a gate's answer to `[0, max(proposed, 0)]`; non-permitting cases carry 0.
pub(crate) fn enforce_bounds(req: &ReignitionRequest, raw: ReignitionDecision) -> ReignitionDecision {
    let ceiling = if req.proposed_magnitude.is_finite() {
        req.proposed_magnitude.max(0.0)
    } else {
        0.0
    };
    let magnitude = if !raw.case.permits() || !raw.magnitude.is_finite() {
        0.0
    } else {
        raw.magnitude.clamp(0.0, ceiling)
    };
    if magnitude != raw.magnitude {
        tracing::warn!(
            returned = raw.magnitude,
            bounded = magnitude,
            case = ?raw.case,
            "reignition gate answer out of bounds"
        );
    }
    ReignitionDecision {
        magnitude,
        case: raw.case,
    }
}
