use serde::{Deserialize, Serialize};

use crate::cfg::ArbiterCfg;
use crate::error::{ArbiterError, ArbiterResult};
use crate::events::DecayEvent;
use crate::state::DecayState;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything one subject's arbiter needs to resume, captured as a single value.
///
/// This is pure data: callers decide how and where to store it. Writing it as
/// one unit is what keeps a pending window and its baseline together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArbiterSnapshot {
    pub version: u32,
    pub cfg: ArbiterCfg,
    pub a_anom: f64,
    pub state: DecayState,
    pub cycle_log: Vec<DecayEvent>,
    pub history: Vec<DecayEvent>,
}

impl ArbiterSnapshot {
    pub fn to_json(&self) -> ArbiterResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ArbiterError::corrupt(format!("encode: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> ArbiterResult<Self> {
        let snap: ArbiterSnapshot =
            serde_json::from_slice(bytes).map_err(|e| ArbiterError::corrupt(format!("decode: {e}")))?;
        snap.check_version()?;
        Ok(snap)
    }

    pub(crate) fn check_version(&self) -> ArbiterResult<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ArbiterError::corrupt(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        Ok(())
    }
}
