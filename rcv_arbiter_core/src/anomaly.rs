//! Leaky-integrator anomaly score and the dynamic trust threshold derived from it.
//!
//! The score remembers deviation but forgets it geometrically, so a subject
//! who stops deviating drifts back towards the baseline threshold `g0`
//! instead of being locked out forever.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::cfg::ArbiterCfg;
use crate::error::{ArbiterError, ArbiterResult, ConfigError};
use crate::vector::{ensure_finite, euclidean, norm, vec4_from_slice, AXES};

/// Largest `f64` below 1.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// Route taken by a single deviation through the dual-route detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyRoute {
    Normal,
    /// Above `theta_slow`: accumulated subtle deviation.
    SlowPathAnomaly,
    /// Above `theta_fast`: sudden severe deviation.
    FastPathAnomaly,
}

/// The two classification thresholds, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteThresholds {
    pub theta_slow: f64,
    pub theta_fast: f64,
}

#[derive(Clone, Debug)]
pub struct AnomalyTracker {
    tau: f64,
    g0: f64,
    alpha: f64,
    a_anom: f64,
    thresholds: RouteThresholds,
}

/// `sqrt` of the chi-square quantile over the tracked axes.
fn fast_threshold(quantile: f64) -> Result<f64, ConfigError> {
    let dist = ChiSquared::new(AXES as f64).map_err(|e| ConfigError::Quantile {
        message: e.to_string(),
    })?;
    let q = dist.inverse_cdf(quantile);
    if !q.is_finite() || q <= 0.0 {
        return Err(ConfigError::Quantile {
            message: format!("chi-square quantile {quantile} gave {q}"),
        });
    }
    Ok(q.sqrt())
}

impl AnomalyTracker {
    pub fn new(cfg: &ArbiterCfg) -> ArbiterResult<Self> {
        cfg.validate()?;
        let theta_fast = fast_threshold(cfg.fast_quantile)?;
        if theta_fast <= cfg.theta_slow {
            return Err(ConfigError::ValidationFailed {
                field: "theta_slow".to_string(),
                message: format!("must be below the fast-path threshold {theta_fast:.4}"),
            }
            .into());
        }
        Ok(Self {
            tau: cfg.tau,
            g0: cfg.g0,
            alpha: cfg.alpha,
            a_anom: 0.0,
            thresholds: RouteThresholds {
                theta_slow: cfg.theta_slow,
                theta_fast,
            },
        })
    }

    /// Build a tracker resuming from a previously captured score.
    pub fn with_score(cfg: &ArbiterCfg, a_anom: f64) -> ArbiterResult<Self> {
        if !(a_anom >= 0.0 && a_anom.is_finite()) {
            return Err(ArbiterError::corrupt(format!("anomaly score {a_anom} out of range")));
        }
        let mut tracker = Self::new(cfg)?;
        tracker.a_anom = a_anom;
        Ok(tracker)
    }

    /// Fold one observation into the score and return the new value.
    ///
    /// `a_anom <- (1 - tau) * a_anom + tau * |observed - predicted|`
    pub fn update(&mut self, observed: &[f64], predicted: &[f64]) -> ArbiterResult<f64> {
        let obs = vec4_from_slice(observed)?;
        let pred = vec4_from_slice(predicted)?;
        ensure_finite(&obs, "observed")?;
        ensure_finite(&pred, "predicted")?;

        let d = euclidean(&obs, &pred);
        let next = (1.0 - self.tau) * self.a_anom + self.tau * d;
        if !next.is_finite() {
            tracing::warn!(distance = d, a_anom = self.a_anom, "deviation out of range; score kept");
            return Err(ArbiterError::non_finite("observed - predicted distance"));
        }
        self.a_anom = next;
        tracing::debug!(distance = d, a_anom = self.a_anom, "anomaly score updated");
        Ok(self.a_anom)
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.a_anom
    }

    /// `g_min = g0 + (1 - g0) * a / (a + alpha)`; in `[g0, 1)` for any finite score.
    ///
    /// Once `a` dwarfs `alpha` the fraction rounds to 1, so the result is capped
    /// just below 1.
    pub fn dynamic_threshold(&self) -> f64 {
        let fraction = self.a_anom / (self.a_anom + self.alpha);
        (self.g0 + (1.0 - self.g0) * fraction).min(BELOW_ONE)
    }

    pub fn thresholds(&self) -> RouteThresholds {
        self.thresholds
    }

    /// Classify a single deviation magnitude. Fast path wins when both thresholds are exceeded.
    pub fn classify(&self, d: f64) -> AnomalyRoute {
        if d.is_nan() || d > self.thresholds.theta_fast {
            AnomalyRoute::FastPathAnomaly
        } else if d > self.thresholds.theta_slow {
            AnomalyRoute::SlowPathAnomaly
        } else {
            AnomalyRoute::Normal
        }
    }

    /// Norm a residual vector and classify it, logging any anomaly.
    pub fn classify_residual(&self, residual: &[f64]) -> ArbiterResult<AnomalyRoute> {
        let r = vec4_from_slice(residual)?;
        let d = norm(&r);
        let route = self.classify(d);
        match route {
            AnomalyRoute::FastPathAnomaly => {
                tracing::warn!(distance = d, theta_fast = self.thresholds.theta_fast, "fast path anomaly");
            }
            AnomalyRoute::SlowPathAnomaly => {
                tracing::info!(distance = d, theta_slow = self.thresholds.theta_slow, "slow path anomaly");
            }
            AnomalyRoute::Normal => {}
        }
        Ok(route)
    }

    /// Drop the accumulated score back to zero. Only on explicit caller instruction.
    pub fn clear_score(&mut self) {
        tracing::info!(a_anom = self.a_anom, "anomaly score cleared");
        self.a_anom = 0.0;
    }
}
