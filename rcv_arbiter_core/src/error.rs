/// Configuration errors, raised when an `ArbiterCfg` is parsed or validated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config validation failed for `{field}`: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("config parse error: {message}")]
    ParseError { message: String },

    #[error("fast-path quantile could not be derived: {message}")]
    Quantile { message: String },
}

/// Errors returned by tracker, decay manager and snapshot operations.
///
/// Every variant leaves the receiving state untouched. Policy outcomes
/// (rejected admissions, recurrences) are never errors; they come back as
/// `Admission` / `TickOutcome` values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArbiterError {
    #[error("invalid dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("non-finite input: {what}")]
    NonFinite { what: String },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("corrupt snapshot: {details}")]
    CorruptSnapshot { details: String },
}

pub type ArbiterResult<T> = Result<T, ArbiterError>;

impl ArbiterError {
    pub(crate) fn non_finite(what: impl Into<String>) -> Self {
        ArbiterError::NonFinite { what: what.into() }
    }

    pub(crate) fn corrupt(details: impl Into<String>) -> Self {
        ArbiterError::CorruptSnapshot { details: details.into() }
    }
}
