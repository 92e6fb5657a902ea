//! Error types for merton-lib

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MertonError {
    /// Non-finite or domain-invalid input (S <= 0, K <= 0, negative vol, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every calibration restart failed numerically.
    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type MertonResult<T> = Result<T, MertonError>;

impl MertonError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn calibration(msg: impl Into<String>) -> Self {
        Self::Calibration(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Fails with [`MertonError::Validation`] unless `value` is finite.
pub(crate) fn ensure_finite(name: &str, value: f64) -> MertonResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MertonError::validation(format!(
            "{} must be finite (got {})",
            name, value
        )))
    }
}

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> MertonResult<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(MertonError::validation(format!(
            "{} must be > 0 (got {})",
            name, value
        )))
    }
}

/// Fails unless `value` is finite and non-negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> MertonResult<()> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(MertonError::validation(format!(
            "{} must be >= 0 (got {})",
            name, value
        )))
    }
}
