//! The device SDK boundary.
//!
//! Vendor camera SDKs expose a synchronous C call surface: open a session,
//! invoke operations against it, close it. This module pins that boundary
//! down as the [`DeviceSdk`] trait so the dispatch core never links against
//! a vendor binding directly. Every call may block the calling thread and
//! may fail; the dispatcher accounts for both by running all invocations on
//! a session's serialized execution context.
//!
//! [`MockSdk`](mock::MockSdk) is the in-memory implementation used by the
//! test suite and the demo binary.

pub mod mock;

use crate::command::{CommandOutput, OperationDescriptor};
use crate::error::CamResult;
use std::fmt;
use uuid::Uuid;

/// Opaque handle to one open device session.
///
/// Exactly one exists per physical device connection. The dispatcher and the
/// session facade hold it by value; commands carry a copy, never ownership.
/// A handle is invalid once its session is closed: commands dispatched
/// against it resolve to [`CamError::SessionClosed`](crate::CamError).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocates a fresh handle. Called by SDK implementations when a
    /// session opens.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to tell sessions apart in logs.
        let text = self.0.simple().to_string();
        write!(f, "session-{}", &text[..8])
    }
}

/// Synchronous call surface of the native camera SDK.
///
/// Implementations wrap the vendor binding. The core treats every method as
/// potentially slow and blocking, and as the sole source of device-level
/// errors; it never interprets an invocation's output beyond decoding it
/// into the caller's requested type.
pub trait DeviceSdk: Send + Sync {
    /// Opens a session with the connected device.
    fn open_session(&self) -> CamResult<SessionId>;

    /// Closes a previously opened session.
    fn close_session(&self, session: SessionId) -> CamResult<()>;

    /// Executes one operation against an open session.
    ///
    /// Called only from the session's serialized execution context, so
    /// implementations never see concurrent invocations for the same
    /// session.
    fn invoke(&self, session: SessionId, op: &OperationDescriptor) -> CamResult<CommandOutput>;
}
