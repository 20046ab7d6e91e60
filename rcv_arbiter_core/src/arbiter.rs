//! Per-subject facade: one anomaly tracker feeding one decay manager.
//!
//! The tracker's dynamic threshold is the trust bar an attempt's evidence
//! must clear, so a subject with a recent history of deviation has to bring
//! stronger evidence before a recovery window even opens.

use crate::anomaly::{AnomalyRoute, AnomalyTracker};
use crate::cfg::ArbiterCfg;
use crate::decay::{Admission, RecoveryDecayManager, TickOutcome};
use crate::error::ArbiterResult;
use crate::events::DecayEvent;
use crate::reignition::{enforce_bounds, ReignitionDecision, ReignitionGate, ReignitionRequest};
use crate::snapshot::{ArbiterSnapshot, SNAPSHOT_VERSION};
use crate::state::Phase;
use crate::vector::Vec4;

/// Caller-side inputs for `gate_intervention`; the anomaly score is added by the arbiter.
#[derive(Clone, Debug, PartialEq)]
pub struct GateInputs {
    pub fatigue: Vec4,
    pub trauma_intensity: f64,
    pub relational_trust: f64,
    pub proposed_magnitude: f64,
}

/// Tracks exactly one subject's timeline. Hold one per subject; calls for a
/// subject must arrive in time order.
#[derive(Clone, Debug)]
pub struct RecoveryArbiter {
    tracker: AnomalyTracker,
    decay: RecoveryDecayManager,
}

impl RecoveryArbiter {
    pub fn new(cfg: ArbiterCfg) -> ArbiterResult<Self> {
        let tracker = AnomalyTracker::new(&cfg)?;
        let decay = RecoveryDecayManager::new(cfg)?;
        Ok(Self { tracker, decay })
    }

    pub fn cfg(&self) -> &ArbiterCfg {
        self.decay.cfg()
    }

    pub fn tracker(&self) -> &AnomalyTracker {
        &self.tracker
    }

    pub fn decay(&self) -> &RecoveryDecayManager {
        &self.decay
    }

    pub fn update_anomaly(&mut self, observed: &[f64], predicted: &[f64]) -> ArbiterResult<f64> {
        self.tracker.update(observed, predicted)
    }

    pub fn anomaly_score(&self) -> f64 {
        self.tracker.score()
    }

    pub fn dynamic_threshold(&self) -> f64 {
        self.tracker.dynamic_threshold()
    }

    pub fn classify(&self, d: f64) -> AnomalyRoute {
        self.tracker.classify(d)
    }

    /// Explicitly forget accumulated anomaly. The decay cycle is unaffected.
    pub fn clear_anomaly(&mut self) {
        self.tracker.clear_score();
    }

    /// Attempt admission against the tracker's current dynamic threshold.
    pub fn attempt_recovery(
        &mut self,
        snapshot: Vec4,
        evidence: f64,
        consistency: f64,
    ) -> ArbiterResult<Admission> {
        let g_min = self.tracker.dynamic_threshold();
        self.decay.attempt_recovery(snapshot, evidence, g_min, consistency)
    }

    pub fn tick(&mut self, current: Vec4, rate: f64) -> ArbiterResult<TickOutcome> {
        self.decay.tick(current, rate)
    }

    pub fn reset(&mut self) {
        self.decay.reset();
    }

    pub fn phase(&self) -> Phase {
        self.decay.phase()
    }

    pub fn history(&self) -> &[DecayEvent] {
        self.decay.history()
    }

    /// Consult an external intervention gate with the current anomaly score.
    /// The answer is held to `[0, proposed]`, and to 0 for non-permitting cases.
    pub fn gate_intervention<G: ReignitionGate + ?Sized>(
        &self,
        gate: &G,
        inputs: GateInputs,
    ) -> ReignitionDecision {
        let req = ReignitionRequest {
            fatigue: inputs.fatigue,
            trauma_intensity: inputs.trauma_intensity,
            relational_trust: inputs.relational_trust,
            proposed_magnitude: inputs.proposed_magnitude,
            anomaly_score: self.tracker.score(),
        };
        let raw = gate.decide(&req);
        enforce_bounds(&req, raw)
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            version: SNAPSHOT_VERSION,
            cfg: self.decay.cfg().clone(),
            a_anom: self.tracker.score(),
            state: self.decay.state().clone(),
            cycle_log: self.decay.cycle_log().to_vec(),
            history: self.decay.history().to_vec(),
        }
    }

    /// Rebuild an arbiter from a snapshot. Either every part is accepted or none is.
    pub fn restore(snap: ArbiterSnapshot) -> ArbiterResult<Self> {
        snap.check_version()?;
        let tracker = AnomalyTracker::with_score(&snap.cfg, snap.a_anom)?;
        let decay = RecoveryDecayManager::from_parts(snap.cfg, snap.state, snap.cycle_log, snap.history)?;
        tracing::debug!(phase = decay.phase().as_str(), a_anom = tracker.score(), "arbiter restored");
        Ok(Self { tracker, decay })
    }
}
