use serde::{Deserialize, Serialize};

use crate::vector::Vec4;

/// Payload-free view of the decay state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Pending,
    Confirmed,
    Cancelled,
    HijackSuspected,
}

impl Phase {
    /// Confirmed, Cancelled and HijackSuspected end a cycle; only `reset()` leaves them.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Confirmed | Phase::Cancelled | Phase::HijackSuspected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Pending => "pending",
            Phase::Confirmed => "confirmed",
            Phase::Cancelled => "cancelled",
            Phase::HijackSuspected => "hijack_suspected",
        }
    }
}

/// Decay state machine. The window counter and baseline only exist while a
/// recovery is pending, so no terminal phase can carry a stale baseline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DecayState {
    #[default]
    Idle,
    Pending {
        turns_elapsed: u32,
        baseline: Vec4,
    },
    Confirmed,
    Cancelled,
    HijackSuspected,
}

impl DecayState {
    #[inline]
    pub fn phase(&self) -> Phase {
        match self {
            DecayState::Idle => Phase::Idle,
            DecayState::Pending { .. } => Phase::Pending,
            DecayState::Confirmed => Phase::Confirmed,
            DecayState::Cancelled => Phase::Cancelled,
            DecayState::HijackSuspected => Phase::HijackSuspected,
        }
    }
}
