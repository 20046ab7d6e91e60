use serde::{Deserialize, Serialize};

use crate::state::Phase;
use crate::vector::Vec4;

/// One audit record. `seq` is assigned by the manager and strictly increases
/// over its lifetime, across resets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayEvent {
    pub seq: u64,
    pub kind: DecayEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DecayEventKind {
    /// Attempt passed admission; the window starts.
    Admitted {
        evidence: f64,
        trust_threshold: f64,
        consistency: f64,
        baseline: Vec4,
    },
    /// A stable tick inside the window. `projected` is telemetry only and never applied.
    Monitoring {
        turn: u32,
        rate: f64,
        decay_factor: f64,
        projected: Vec4,
    },
    /// Rate crossed `theta_cancel`; the attempt is void and integrals were not touched.
    Recurrence {
        turn: u32,
        rate: f64,
        theta_cancel: f64,
        outcome: Phase,
        hijack_suspected: bool,
        integrals_unchanged: bool,
    },
    /// Window completed without recurrence.
    Confirmed {
        turn: u32,
        before: Vec4,
        after: Vec4,
        rho: f64,
    },
    /// Explicit reset out of a non-idle phase.
    Reset { from: Phase },
}

impl DecayEvent {
    pub fn name(&self) -> &'static str {
        match self.kind {
            DecayEventKind::Admitted { .. } => "admitted",
            DecayEventKind::Monitoring { .. } => "tick",
            DecayEventKind::Recurrence { .. } => "cancelled",
            DecayEventKind::Confirmed { .. } => "confirmed",
            DecayEventKind::Reset { .. } => "reset",
        }
    }
}
