//! Error types for the command dispatch layer.
//!
//! All fallible operations in this crate return [`CamResult`]. The error type
//! is deliberately `Clone`: a command's outcome is stored once in its result
//! slot and re-raised to every waiter, so the stored failure must be cheap to
//! hand out repeatedly.
//!
//! ## Error taxonomy
//!
//! - **`Device`**: the underlying SDK call failed. [`DeviceErrorKind`]
//!   distinguishes transient conditions (a busy device, which retry policies
//!   may act on) from terminal ones (disconnected, unsupported operation).
//! - **`Timeout`**: the command did not complete within its configured
//!   timeout. The underlying device call is not interruptible, so a timed-out
//!   command may still have mutated device state; treat the outcome as
//!   unknown.
//! - **`SessionClosed`**: the command targeted a session that is no longer
//!   open. Queued commands drain with this error instead of executing.
//! - **`UnsupportedCapability`**: a symbolic capability name was not found in
//!   the catalog. Lookups never fall back to a default code.
//! - **`Composition`**: a decorator step was misconfigured (conflicting
//!   timeout steps, a zero-attempt retry, duplicated steps).

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type CamResult<T> = std::result::Result<T, CamError>;

/// Classifies a failure reported by the device SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// The device rejected the call because it is busy; retrying may succeed.
    Busy,
    /// The physical connection to the device was lost.
    Disconnected,
    /// The device does not support the requested operation.
    Unsupported,
    /// Any other failure inside the SDK binding.
    Internal,
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors produced while building, dispatching, or executing commands.
#[derive(Clone, Debug, Error)]
pub enum CamError {
    /// The underlying device call failed.
    #[error("device error ({kind}): {message}")]
    Device {
        /// Failure classification, used by retry policies.
        kind: DeviceErrorKind,
        /// Message reported by the SDK binding.
        message: String,
    },

    /// The command did not complete within its timeout.
    ///
    /// The device call keeps running on the session's execution context; its
    /// eventual result is discarded. Device state may have changed.
    #[error("command timed out after {elapsed:?}")]
    Timeout {
        /// The configured timeout that elapsed.
        elapsed: Duration,
    },

    /// The command targeted a session that is no longer open.
    #[error("session is closed")]
    SessionClosed,

    /// A symbolic capability name is not present in the catalog.
    #[error("unsupported capability '{symbol}'")]
    UnsupportedCapability {
        /// The symbol that failed to resolve.
        symbol: String,
    },

    /// A decorator chain or step was misconfigured.
    #[error("decorator composition error: {0}")]
    Composition(String),

    /// A typed handle decoded an output that does not match its decoder.
    #[error("unexpected command output: expected {expected}, got {actual}")]
    UnexpectedOutput {
        /// The output variant the decoder expected.
        expected: &'static str,
        /// The variant actually produced by the device call.
        actual: &'static str,
    },

    /// The dispatcher's execution runtime could not be built or has stopped.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CamError {
    /// Builds a device error from a kind and message.
    pub fn device(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self::Device {
            kind,
            message: message.into(),
        }
    }

    /// Whether a retry policy is allowed to re-invoke the device call.
    ///
    /// Only a busy device is transient; every other failure propagates on
    /// first occurrence so a genuine device error is never masked.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Device {
                kind: DeviceErrorKind::Busy,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CamError::device(DeviceErrorKind::Busy, "shutter engaged");
        assert_eq!(err.to_string(), "device error (busy): shutter engaged");

        let err = CamError::UnsupportedCapability {
            symbol: "flux-capacitor".into(),
        };
        assert_eq!(err.to_string(), "unsupported capability 'flux-capacitor'");
    }

    #[test]
    fn test_only_busy_is_transient() {
        assert!(CamError::device(DeviceErrorKind::Busy, "").is_transient());
        assert!(!CamError::device(DeviceErrorKind::Disconnected, "").is_transient());
        assert!(!CamError::device(DeviceErrorKind::Unsupported, "").is_transient());
        assert!(!CamError::SessionClosed.is_transient());
        assert!(!CamError::Timeout {
            elapsed: Duration::from_millis(100)
        }
        .is_transient());
    }
}
