use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Consistency score an attempt must exceed to be admitted. Fixed policy, not tunable.
pub const CONSISTENCY_FLOOR: f64 = 0.7;

/// Arbiter configuration. Immutable once an arbiter has been built from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterCfg {
    /// Forgetting rate of the anomaly integrator, in (0, 1).
    pub tau: f64,
    /// Baseline trust threshold, in [0, 1).
    pub g0: f64,
    /// Tolerance half-scale: at `a_anom == alpha` the threshold sits halfway between g0 and 1.
    pub alpha: f64,
    /// Length of the recovery window in ticks.
    pub k_max: u32,
    /// Pain rate of change above which a pending recovery is voided.
    pub theta_cancel: f64,
    /// Fraction removed from the baseline on confirmation, in [0, 1].
    pub rho: f64,
    /// Telemetry-only decay speed for projected integrals.
    pub kappa: f64,
    /// Slow-path anomaly threshold on a single deviation.
    pub theta_slow: f64,
    /// Chi-square quantile (4 dof) the fast-path threshold is derived from.
    pub fast_quantile: f64,
}

impl Default for ArbiterCfg {
    fn default() -> Self {
        Self {
            tau: 0.2,
            g0: 0.4,
            alpha: 1.0,
            k_max: 5,
            theta_cancel: 0.05,
            rho: 0.3,
            kappa: 0.5,
            theta_slow: 2.0,
            fast_quantile: 0.999,
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}

impl ArbiterCfg {
    /// Parse a config from TOML. Missing keys fall back to defaults.
    /// The result is validated before it is returned.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: ArbiterCfg = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every parameter against its admissible range.
    ///
    /// Written as negated range checks so NaN fails every one of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tau > 0.0 && self.tau < 1.0) {
            return Err(invalid("tau", "must be in (0, 1)"));
        }
        if !(self.g0 >= 0.0 && self.g0 < 1.0) {
            return Err(invalid("g0", "must be in [0, 1)"));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(invalid("alpha", "must be finite and > 0"));
        }
        if self.k_max < 1 {
            return Err(invalid("k_max", "must be >= 1"));
        }
        if !(self.theta_cancel > 0.0 && self.theta_cancel.is_finite()) {
            return Err(invalid("theta_cancel", "must be finite and > 0"));
        }
        if !(0.0..=1.0).contains(&self.rho) {
            return Err(invalid("rho", "must be in [0, 1]"));
        }
        if !(self.kappa >= 0.0 && self.kappa.is_finite()) {
            return Err(invalid("kappa", "must be finite and >= 0"));
        }
        if !(self.theta_slow > 0.0 && self.theta_slow.is_finite()) {
            return Err(invalid("theta_slow", "must be finite and > 0"));
        }
        if !(self.fast_quantile > 0.0 && self.fast_quantile < 1.0) {
            return Err(invalid("fast_quantile", "must be in (0, 1)"));
        }
        Ok(())
    }

    /// Last tick (inclusive) on which a recurrence counts as suspected hijack.
    #[inline]
    pub fn hijack_horizon(&self) -> u32 {
        self.k_max / 2
    }
}
