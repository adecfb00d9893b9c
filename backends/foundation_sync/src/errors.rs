use derive_more::From;

use crate::config::ConfigError;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Failure reported by a synchronization operation.
///
/// A timed operation that runs out of time is not a failure: timed lock
/// acquisition yields `Ok(None)` and timed waits yield
/// [`WaitOutcome::TimedOut`](crate::WaitOutcome::TimedOut).
#[derive(From, Debug)]
pub enum SyncError {
    /// A runtime service was requested before `SyncRuntime::init`.
    NotInitialized,

    /// The caller passed a value the operation cannot accept. Nothing was
    /// created or changed.
    #[from(ignore)]
    InvalidArgument {
        operation: &'static str,
        parameter: &'static str,
        reason: &'static str,
    },

    /// The native call reported an OS-level error (`errno` / `GetLastError`).
    #[from(ignore)]
    Native { operation: &'static str, code: i32 },

    #[from(ignore)]
    Config(ConfigError),
}

impl SyncError {
    /// Builds an [`SyncError::InvalidArgument`] and emits the matching
    /// diagnostic in debug builds.
    pub(crate) fn invalid_argument(
        operation: &'static str,
        parameter: &'static str,
        reason: &'static str,
    ) -> Self {
        ewe_logs::diagnostic!(
            "[sync] invalid argument `{}` in call to `{}`: {}",
            parameter,
            operation,
            reason
        );
        Self::InvalidArgument {
            operation,
            parameter,
            reason,
        }
    }

    pub(crate) fn native(operation: &'static str, code: i32) -> Self {
        Self::Native { operation, code }
    }

    /// Raw OS error code for [`SyncError::Native`] failures.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "sync runtime used before init"),
            Self::InvalidArgument {
                operation,
                parameter,
                reason,
            } => write!(
                f,
                "invalid argument `{parameter}` in call to `{operation}`: {reason}"
            ),
            Self::Native { operation, code } => write!(
                f,
                "`{operation}` failed: {}",
                std::io::Error::from_raw_os_error(*code)
            ),
            Self::Config(err) => write!(f, "configuration error: {err}"),
        }
    }
}
