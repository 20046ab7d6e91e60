pub mod vector;
pub mod error;
pub mod cfg;

pub mod anomaly;
pub mod state;
pub mod events;
pub mod decay;

pub mod reignition;
pub mod snapshot;
pub mod arbiter;

pub use vector::{Vec4, AXES};
pub use error::{ArbiterError, ArbiterResult, ConfigError};
pub use cfg::{ArbiterCfg, CONSISTENCY_FLOOR};

pub use anomaly::{AnomalyRoute, AnomalyTracker, RouteThresholds};
pub use state::{DecayState, Phase};
pub use events::{DecayEvent, DecayEventKind};
pub use decay::{Admission, RecoveryDecayManager, TickOutcome};

pub use reignition::{ReignitionCase, ReignitionDecision, ReignitionGate, ReignitionRequest};
pub use snapshot::{ArbiterSnapshot, SNAPSHOT_VERSION};
pub use arbiter::{GateInputs, RecoveryArbiter};
