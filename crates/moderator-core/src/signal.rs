//! Outcome of a single signal check.
//!
//! Every check reports one of three states instead of silently substituting a
//! default. The processor resolves each outcome against the check's
//! fail-closed value, so an unusable signal can only push a photo toward
//! rejection.

/// Result of running one check on one image.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome<T> {
    /// The check ran and produced a measurement.
    Ok(T),
    /// The check ran but had to fall back to a safe value.
    Degraded { value: T, cause: String },
    /// The check could not run at all.
    Unavailable { cause: String },
}

impl<T> SignalOutcome<T> {
    pub fn degraded(value: T, cause: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            cause: cause.into(),
        }
    }

    pub fn unavailable(cause: impl Into<String>) -> Self {
        Self::Unavailable {
            cause: cause.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Why the check did not produce a clean measurement, if it didn't.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { cause, .. } | Self::Unavailable { cause } => Some(cause),
        }
    }

    /// Concrete value, using `safe_default` when the check was unavailable.
    pub fn resolve(self, safe_default: T) -> T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
            Self::Unavailable { .. } => safe_default,
        }
    }
}
