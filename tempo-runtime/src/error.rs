use thiserror::Error;

use crate::handle::OwnerId;

/// Convenience alias used across the runtime.
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;

/// Errors reported synchronously by the scheduler surface.
///
/// Cancelling or stopping an unknown handle is not an error: those calls
/// return `false` instead, so a handle that already fired can be cancelled
/// safely.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A delay or interval was outside its allowed range.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: String,
    },

    /// Work was registered against an owner that was never bound.
    #[error("owner {0} is not bound to this scheduler")]
    UnknownOwner(OwnerId),

    /// Work was registered against an owner that has been destroyed.
    #[error("owner {0} has been destroyed")]
    OwnerDestroyed(OwnerId),

    /// The host asked the scheduler to tick backwards in time.
    #[error("tick time went backwards: last tick at {last}s, requested {requested}s")]
    NonMonotonicTime { last: f64, requested: f64 },

    /// The settings file or environment could not be read.
    #[error("failed to load scheduler configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value was present but could not be interpreted.
    #[error("invalid setting `{key}`: {value:?}")]
    InvalidSetting { key: &'static str, value: String },
}

impl SchedulerError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure raised by a coroutine body.
///
/// The failing coroutine is cancelled and the error is delivered to its
/// owner's [`Behaviour::on_routine_error`](crate::Behaviour::on_routine_error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RoutineError {
    message: String,
}

impl RoutineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for RoutineError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RoutineError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Validate a delay in seconds: finite and not negative.
pub(crate) fn check_delay(delay: f64) -> Result<()> {
    if !delay.is_finite() {
        return Err(SchedulerError::invalid("delay", format!("{delay} is not finite")));
    }
    if delay < 0.0 {
        return Err(SchedulerError::invalid("delay", format!("{delay} is negative")));
    }
    Ok(())
}

/// Validate a repeat interval in seconds: finite and strictly positive.
pub(crate) fn check_interval(interval: f64) -> Result<()> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(SchedulerError::invalid(
            "interval",
            format!("{interval} must be a finite value greater than zero"),
        ));
    }
    Ok(())
}
