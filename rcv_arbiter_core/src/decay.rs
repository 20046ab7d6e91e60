//! Time-locked recovery decay.
//!
//! A recovery claim is a phase, not an event: passing admission only opens a
//! `k_max`-tick window. Every tick inside the window must stay at or below
//! `theta_cancel`; one regression anywhere voids the attempt with no partial
//! credit. The reduction `baseline * (1 - rho)` is handed back to the caller
//! only when the window completes, so a voided attempt needs no rollback:
//! nothing was ever applied.
//!
//! ```text
//! Idle --admit--> Pending --k_max stable ticks--> Confirmed
//!                    |
//!                    +--rate > theta_cancel, turn <= k_max/2--> HijackSuspected
//!                    +--rate > theta_cancel, turn >  k_max/2--> Cancelled
//! ```

use serde::{Deserialize, Serialize};

use crate::cfg::{ArbiterCfg, CONSISTENCY_FLOOR};
use crate::error::{ArbiterError, ArbiterResult};
use crate::events::{DecayEvent, DecayEventKind};
use crate::state::{DecayState, Phase};
use crate::vector::{ensure_finite, ensure_finite_scalar, scale, Vec4};

/// Result of `attempt_recovery`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Admission {
    /// Admitted; the window of `k_max` ticks starts now.
    Pending { k_max: u32 },
    /// Conditions unmet. Carries the compared values for diagnostics.
    Rejected {
        evidence: f64,
        trust_threshold: f64,
        consistency: f64,
    },
    /// A window is already open. Nothing changed.
    AlreadyPending { turns_remaining: u32 },
    /// The previous cycle ended in `phase`; `reset()` is required first.
    AwaitingReset { phase: Phase },
}

/// Result of `tick`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// Not pending; nothing happened.
    NoOp { phase: Phase },
    Monitoring {
        turns_left: u32,
        decay_factor: f64,
        projected: Vec4,
    },
    /// Window complete. The caller applies `new_integrals`.
    Confirmed { before: Vec4, new_integrals: Vec4 },
    /// Late recurrence. `integrals` is the caller's vector, unmodified.
    Cancelled { integrals: Vec4 },
    /// Early recurrence. `integrals` is the caller's vector, unmodified.
    HijackSuspected { integrals: Vec4 },
}

impl TickOutcome {
    /// Integrals the caller should hold after this tick, given what it passed in.
    pub fn resulting_integrals(&self, current: Vec4) -> Vec4 {
        match self {
            TickOutcome::Confirmed { new_integrals, .. } => *new_integrals,
            _ => current,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecoveryDecayManager {
    cfg: ArbiterCfg,
    state: DecayState,
    cycle_log: Vec<DecayEvent>,
    history: Vec<DecayEvent>,
    next_seq: u64,
}

impl RecoveryDecayManager {
    pub fn new(cfg: ArbiterCfg) -> ArbiterResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            state: DecayState::Idle,
            cycle_log: Vec::new(),
            history: Vec::new(),
            next_seq: 0,
        })
    }

    /// Rebuild a manager from persisted parts, refusing anything inconsistent.
    pub(crate) fn from_parts(
        cfg: ArbiterCfg,
        state: DecayState,
        cycle_log: Vec<DecayEvent>,
        history: Vec<DecayEvent>,
    ) -> ArbiterResult<Self> {
        cfg.validate()?;
        if let DecayState::Pending { turns_elapsed, baseline } = &state {
            if *turns_elapsed >= cfg.k_max {
                return Err(ArbiterError::corrupt(format!(
                    "pending with turns_elapsed {} >= k_max {}",
                    turns_elapsed, cfg.k_max
                )));
            }
            if ensure_finite(baseline, "baseline").is_err() {
                return Err(ArbiterError::corrupt("pending baseline is not finite"));
            }
        }
        if history.windows(2).any(|w| w[0].seq >= w[1].seq) {
            return Err(ArbiterError::corrupt("history sequence numbers are not increasing"));
        }
        let next_seq = history.last().map(|e| e.seq + 1).unwrap_or(0);
        if cycle_log.iter().any(|e| e.seq >= next_seq) {
            return Err(ArbiterError::corrupt("cycle log is ahead of history"));
        }
        Ok(Self {
            cfg,
            state,
            cycle_log,
            history,
            next_seq,
        })
    }

    pub fn cfg(&self) -> &ArbiterCfg {
        &self.cfg
    }

    pub fn state(&self) -> &DecayState {
        &self.state
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Ticks consumed by the open window, if any.
    pub fn turns_elapsed(&self) -> Option<u32> {
        match self.state {
            DecayState::Pending { turns_elapsed, .. } => Some(turns_elapsed),
            _ => None,
        }
    }

    /// Baseline captured at admission, if a window is open.
    pub fn baseline(&self) -> Option<&Vec4> {
        match &self.state {
            DecayState::Pending { baseline, .. } => Some(baseline),
            _ => None,
        }
    }

    /// Cumulative audit trail, oldest first. Survives `reset()`.
    pub fn history(&self) -> &[DecayEvent] {
        &self.history
    }

    /// Records of the current (or most recent) cycle only.
    pub fn cycle_log(&self) -> &[DecayEvent] {
        &self.cycle_log
    }

    fn record(&mut self, kind: DecayEventKind) {
        let ev = DecayEvent { seq: self.next_seq, kind };
        self.next_seq += 1;
        self.cycle_log.push(ev.clone());
        self.history.push(ev);
    }

    /// Ask to open a recovery window.
    ///
    /// Admission requires `evidence > trust_threshold` and `consistency > 0.7`.
    /// Passing does not change any integrals; it only starts the window.
    pub fn attempt_recovery(
        &mut self,
        baseline: Vec4,
        evidence: f64,
        trust_threshold: f64,
        consistency: f64,
    ) -> ArbiterResult<Admission> {
        match self.state {
            DecayState::Idle => {}
            DecayState::Pending { turns_elapsed, .. } => {
                let turns_remaining = self.cfg.k_max - turns_elapsed;
                tracing::debug!(turns_remaining, "recovery attempt while pending");
                return Ok(Admission::AlreadyPending { turns_remaining });
            }
            _ => {
                let phase = self.phase();
                tracing::debug!(phase = phase.as_str(), "recovery attempt before reset");
                return Ok(Admission::AwaitingReset { phase });
            }
        }

        ensure_finite(&baseline, "baseline")?;
        ensure_finite_scalar(evidence, "evidence")?;
        ensure_finite_scalar(trust_threshold, "trust_threshold")?;
        ensure_finite_scalar(consistency, "consistency")?;

        if !(evidence > trust_threshold && consistency > CONSISTENCY_FLOOR) {
            tracing::debug!(evidence, trust_threshold, consistency, "recovery attempt rejected");
            return Ok(Admission::Rejected {
                evidence,
                trust_threshold,
                consistency,
            });
        }

        self.state = DecayState::Pending {
            turns_elapsed: 0,
            baseline,
        };
        self.cycle_log.clear();
        self.record(DecayEventKind::Admitted {
            evidence,
            trust_threshold,
            consistency,
            baseline,
        });
        tracing::info!(evidence, trust_threshold, consistency, k_max = self.cfg.k_max, "recovery pending");
        Ok(Admission::Pending { k_max: self.cfg.k_max })
    }

    /// Advance an open window by one observation.
    ///
    /// `current` is the caller's integrals as of this step. It is never
    /// modified; on recurrence it is handed straight back.
    pub fn tick(&mut self, current: Vec4, rate: f64) -> ArbiterResult<TickOutcome> {
        let phase = self.phase();
        if phase != Phase::Pending {
            return Ok(TickOutcome::NoOp { phase });
        }
        ensure_finite_scalar(rate, "rate")?;

        let (turn, baseline) = match &mut self.state {
            DecayState::Pending { turns_elapsed, baseline } => {
                *turns_elapsed += 1;
                (*turns_elapsed, *baseline)
            }
            _ => return Ok(TickOutcome::NoOp { phase }),
        };

        if rate > self.cfg.theta_cancel {
            let hijack_suspected = turn <= self.cfg.hijack_horizon();
            let (state, outcome) = if hijack_suspected {
                (DecayState::HijackSuspected, TickOutcome::HijackSuspected { integrals: current })
            } else {
                (DecayState::Cancelled, TickOutcome::Cancelled { integrals: current })
            };
            self.state = state;
            let phase = self.phase();
            self.record(DecayEventKind::Recurrence {
                turn,
                rate,
                theta_cancel: self.cfg.theta_cancel,
                outcome: phase,
                hijack_suspected,
                integrals_unchanged: true,
            });
            tracing::warn!(
                turn,
                rate,
                theta_cancel = self.cfg.theta_cancel,
                outcome = phase.as_str(),
                "recurrence during recovery window; integrals unchanged"
            );
            return Ok(outcome);
        }

        let decay_factor = (-self.cfg.kappa * f64::from(turn)).exp();
        let projected = scale(&baseline, decay_factor);
        self.record(DecayEventKind::Monitoring {
            turn,
            rate,
            decay_factor,
            projected,
        });

        if turn < self.cfg.k_max {
            let turns_left = self.cfg.k_max - turn;
            tracing::debug!(turn, turns_left, decay_factor, "recovery window holding");
            return Ok(TickOutcome::Monitoring {
                turns_left,
                decay_factor,
                projected,
            });
        }

        let new_integrals = scale(&baseline, 1.0 - self.cfg.rho);
        self.state = DecayState::Confirmed;
        self.record(DecayEventKind::Confirmed {
            turn,
            before: baseline,
            after: new_integrals,
            rho: self.cfg.rho,
        });
        tracing::info!(turn, rho = self.cfg.rho, "recovery confirmed");
        Ok(TickOutcome::Confirmed {
            before: baseline,
            new_integrals,
        })
    }

    /// Return to `Idle`. The open window, if any, is discarded; history is kept.
    pub fn reset(&mut self) {
        let from = self.phase();
        if from == Phase::Idle {
            return;
        }
        self.state = DecayState::Idle;
        self.record(DecayEventKind::Reset { from });
        tracing::info!(from = from.as_str(), "decay manager reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(k_max: u32) -> RecoveryDecayManager {
        RecoveryDecayManager::new(ArbiterCfg { k_max, ..ArbiterCfg::default() }).unwrap()
    }

    #[test]
    fn nan_rate_is_refused_without_consuming_a_turn() {
        let mut m = manager(5);
        m.attempt_recovery([1.0; 4], 0.9, 0.4, 0.9).unwrap();
        assert!(m.tick([1.0; 4], f64::NAN).is_err());
        assert_eq!(m.turns_elapsed(), Some(0));
    }

    #[test]
    fn tick_outside_pending_ignores_rate() {
        let mut m = manager(5);
        assert_eq!(m.tick([1.0; 4], f64::NAN), Ok(TickOutcome::NoOp { phase: Phase::Idle }));
        assert!(m.history().is_empty());
    }

    #[test]
    fn k_max_one_confirms_on_first_stable_tick() {
        let mut m = manager(1);
        m.attempt_recovery([10.0; 4], 0.9, 0.4, 0.9).unwrap();
        let out = m.tick([10.0; 4], 0.0).unwrap();
        assert!(matches!(out, TickOutcome::Confirmed { .. }));
    }

    #[test]
    fn k_max_one_recurrence_is_late() {
        // floor(1/2) == 0, so even the first tick is past the hijack horizon.
        let mut m = manager(1);
        m.attempt_recovery([10.0; 4], 0.9, 0.4, 0.9).unwrap();
        let out = m.tick([10.0; 4], 1.0).unwrap();
        assert_eq!(out, TickOutcome::Cancelled { integrals: [10.0; 4] });
    }

    #[test]
    fn pending_at_window_end_is_corrupt() {
        let cfg = ArbiterCfg::default();
        let state = DecayState::Pending { turns_elapsed: cfg.k_max, baseline: [1.0; 4] };
        assert!(matches!(
            RecoveryDecayManager::from_parts(cfg, state, vec![], vec![]),
            Err(ArbiterError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn reset_from_idle_records_nothing() {
        let mut m = manager(5);
        m.reset();
        assert!(m.history().is_empty());
    }
}
