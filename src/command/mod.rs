//! Commands: the unit of asynchronous work against a device session.
//!
//! A [`Command`] captures a target session, an [`OperationDescriptor`], an
//! optional timeout, optional cross-cutting behavior (retry, audit logging),
//! and a write-once result slot. The session facade constructs commands, the
//! dispatcher executes them on the session's serialized execution context,
//! and callers observe the outcome through a typed [`CommandHandle`].
//!
//! Per command the lifecycle is `Pending → Dispatched → Executing →
//! {Completed | Failed | TimedOut}`; there is no transition out of a
//! terminal state. The write-once slot enforces the terminal-state rule: a
//! timed-out command's slot is never overwritten by the late result of its
//! device call.

pub mod decorator;
pub(crate) mod slot;

use crate::catalog::{CameraControl, PropertyCode, StatusInquiry};
use crate::error::{CamError, CamResult};
use crate::sdk::{DeviceSdk, SessionId};
use decorator::RetryPolicy;
use serde::{Deserialize, Serialize};
use slot::ResultSlot;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Signature of a generic passthrough operation.
///
/// The closure receives the SDK and the target session and runs on the
/// session's serialized execution context, exactly like a built-in
/// operation. `Fn` (not `FnOnce`) so retry policies can re-invoke it.
pub type CustomCall = Arc<dyn Fn(&dyn DeviceSdk, SessionId) -> CamResult<CommandOutput> + Send + Sync>;

/// Where the device stores captured images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveTarget {
    /// Keep images on the device's own storage.
    Camera,
    /// Transfer images to the host and delete them from the device.
    #[default]
    Host,
    /// Store on the device and transfer a copy to the host.
    Both,
}

/// Options controlling a shoot command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShootOptions {
    /// Number of exposures to take. Must be at least 1.
    pub frame_count: u32,
    /// Run autofocus before releasing the shutter.
    pub autofocus: bool,
    /// Where the captured images end up.
    pub save_to: SaveTarget,
    /// Optional file name prefix for host-side images.
    pub filename_prefix: Option<String>,
}

impl Default for ShootOptions {
    fn default() -> Self {
        Self {
            frame_count: 1,
            autofocus: true,
            save_to: SaveTarget::Host,
            filename_prefix: None,
        }
    }
}

/// Live-view sub-operations.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveViewOp {
    /// Start the live-view stream.
    Begin,
    /// Stop the live-view stream.
    End,
    /// Download the current frame into a file at `dest`.
    DownloadFrame {
        /// Destination path for the frame image.
        dest: PathBuf,
    },
    /// Download the current frame into memory.
    DownloadFrameBuffer,
    /// Whether live view is enabled on the device.
    IsEnabled,
    /// Whether the live-view stream is currently active.
    IsActive,
}

impl LiveViewOp {
    fn label(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::End => "end",
            Self::DownloadFrame { .. } => "download-frame",
            Self::DownloadFrameBuffer => "download-frame-buffer",
            Self::IsEnabled => "is-enabled",
            Self::IsActive => "is-active",
        }
    }
}

/// Value written to a device property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Numeric property value (native enum codes, kelvin, EV steps...).
    Integer(i64),
    /// Text property value.
    Text(String),
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// The operation a command performs, as a closed tagged enum.
///
/// One descriptor type with payload per variant replaces a family of
/// near-identical per-property command types; typed result decoding happens
/// on the [`CommandHandle`] instead.
#[derive(Clone)]
pub enum OperationDescriptor {
    /// Camera-level control code with an optional numeric parameter.
    Control {
        /// The control to execute.
        code: CameraControl,
        /// Optional parameter (button depth, lens drive amount...).
        param: Option<i64>,
    },
    /// Status inquiry / UI lock transition.
    Status(StatusInquiry),
    /// Release the shutter and collect the produced image files.
    Shoot(ShootOptions),
    /// Live-view sub-operation.
    LiveView(LiveViewOp),
    /// Read a property's current value.
    GetProperty(PropertyCode),
    /// List the values the device currently allows for a property.
    DescribeProperty(PropertyCode),
    /// Write a property value.
    SetProperty {
        /// The property to write.
        code: PropertyCode,
        /// The value to write.
        value: PropertyValue,
    },
    /// Generic passthrough executed on the session's execution context.
    Custom {
        /// Label used in logs and the audit trail.
        label: String,
        /// The operation body.
        call: CustomCall,
    },
}

impl OperationDescriptor {
    /// Stable label for logs, audit records, and mock journals.
    pub fn label(&self) -> String {
        match self {
            Self::Control { code, .. } => format!("control:{}", code.symbol()),
            Self::Status(inquiry) => format!("status:{}", inquiry.symbol()),
            Self::Shoot(_) => "shoot".to_string(),
            Self::LiveView(op) => format!("live-view:{}", op.label()),
            Self::GetProperty(code) => format!("get:{}", code.symbol()),
            Self::DescribeProperty(code) => format!("describe:{}", code.symbol()),
            Self::SetProperty { code, .. } => format!("set:{}", code.symbol()),
            Self::Custom { label, .. } => format!("custom:{label}"),
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Raw value produced by executing an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutput {
    /// The operation produced no value.
    Unit,
    /// Boolean answer (live-view enabled/active).
    Bool(bool),
    /// Numeric property value.
    Integer(i64),
    /// Text value (product name).
    Text(String),
    /// List of native codes (property value descriptions).
    Values(Vec<i64>),
    /// In-memory image data (live-view frame buffer).
    Bytes(Vec<u8>),
    /// Files written on the host (shoot, frame download).
    Files(Vec<PathBuf>),
}

impl CommandOutput {
    /// Variant name for decode-mismatch errors.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Values(_) => "values",
            Self::Bytes(_) => "bytes",
            Self::Files(_) => "files",
        }
    }
}

/// Decodes a raw [`CommandOutput`] into a typed result.
///
/// Implemented for the handful of result shapes device operations produce;
/// a mismatch surfaces as [`CamError::UnexpectedOutput`], never a panic.
pub trait FromOutput: Sized {
    /// Decodes the output, or reports which variant was expected.
    fn from_output(output: CommandOutput) -> CamResult<Self>;
}

macro_rules! from_output {
    ($ty:ty, $expected:literal, $pattern:pat => $value:expr) => {
        impl FromOutput for $ty {
            fn from_output(output: CommandOutput) -> CamResult<Self> {
                match output {
                    $pattern => Ok($value),
                    other => Err(CamError::UnexpectedOutput {
                        expected: $expected,
                        actual: other.variant_name(),
                    }),
                }
            }
        }
    };
}

from_output!((), "unit", CommandOutput::Unit => ());
from_output!(bool, "bool", CommandOutput::Bool(value) => value);
from_output!(i64, "integer", CommandOutput::Integer(value) => value);
from_output!(String, "text", CommandOutput::Text(value) => value);
from_output!(Vec<i64>, "values", CommandOutput::Values(values) => values);
from_output!(Vec<u8>, "bytes", CommandOutput::Bytes(bytes) => bytes);
from_output!(Vec<PathBuf>, "files", CommandOutput::Files(files) => files);

impl FromOutput for CommandOutput {
    fn from_output(output: CommandOutput) -> CamResult<Self> {
        Ok(output)
    }
}

/// A unit of work targeting a device session.
///
/// Commands are created per call, mutated only before dispatch (target and
/// timeout injection, decorator application), and dispatched exactly once.
/// After dispatch only the session's executor completes the result slot.
pub struct Command {
    target: Option<SessionId>,
    op: OperationDescriptor,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    audit: Option<String>,
    slot: Arc<ResultSlot>,
}

impl Command {
    /// Creates a command for the given operation with no target, timeout,
    /// or decoration.
    pub fn new(op: OperationDescriptor) -> Self {
        Self {
            target: None,
            op,
            timeout: None,
            retry: None,
            audit: None,
            slot: Arc::new(ResultSlot::new()),
        }
    }

    /// Camera-level control command.
    pub fn control(code: CameraControl) -> Self {
        Self::new(OperationDescriptor::Control { code, param: None })
    }

    /// Camera-level control command with a numeric parameter.
    pub fn control_with(code: CameraControl, param: i64) -> Self {
        Self::new(OperationDescriptor::Control {
            code,
            param: Some(param),
        })
    }

    /// Status inquiry command.
    pub fn status(inquiry: StatusInquiry) -> Self {
        Self::new(OperationDescriptor::Status(inquiry))
    }

    /// Shoot command.
    pub fn shoot(options: ShootOptions) -> Self {
        Self::new(OperationDescriptor::Shoot(options))
    }

    /// Live-view sub-command.
    pub fn live_view(op: LiveViewOp) -> Self {
        Self::new(OperationDescriptor::LiveView(op))
    }

    /// Property read command.
    pub fn get_property(code: PropertyCode) -> Self {
        Self::new(OperationDescriptor::GetProperty(code))
    }

    /// Property description command (available values).
    pub fn describe_property(code: PropertyCode) -> Self {
        Self::new(OperationDescriptor::DescribeProperty(code))
    }

    /// Property write command.
    pub fn set_property(code: PropertyCode, value: impl Into<PropertyValue>) -> Self {
        Self::new(OperationDescriptor::SetProperty {
            code,
            value: value.into(),
        })
    }

    /// Generic passthrough command.
    pub fn custom<F>(label: impl Into<String>, call: F) -> Self
    where
        F: Fn(&dyn DeviceSdk, SessionId) -> CamResult<CommandOutput> + Send + Sync + 'static,
    {
        Self::new(OperationDescriptor::Custom {
            label: label.into(),
            call: Arc::new(call),
        })
    }

    /// The session this command targets, if bound.
    pub fn target(&self) -> Option<SessionId> {
        self.target
    }

    /// Binds the command to a session. The facade injects its own session
    /// here when the command carries none.
    pub fn set_target(&mut self, session: SessionId) {
        self.target = Some(session);
    }

    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// The configured retry policy, if any.
    pub fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    /// The audit label, if audit logging was requested.
    pub fn audit_label(&self) -> Option<&str> {
        self.audit.as_deref()
    }

    /// The operation's stable label.
    pub fn operation_label(&self) -> String {
        self.op.label()
    }

    /// One-shot timeout decoration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// One-shot retry decoration.
    ///
    /// # Errors
    ///
    /// `Composition` when a retry policy is already configured; stacking
    /// retry loops would multiply attempts in a way no caller intends.
    pub fn with_retry(mut self, policy: RetryPolicy) -> CamResult<Self> {
        if self.retry.is_some() {
            return Err(CamError::Composition(
                "retry policy already configured".into(),
            ));
        }
        self.retry = Some(policy);
        Ok(self)
    }

    /// One-shot audit decoration: execution start/finish are logged under
    /// the given label.
    pub fn with_audit(mut self, label: impl Into<String>) -> Self {
        self.audit = Some(label.into());
        self
    }

    /// A typed handle observing this command's result slot.
    ///
    /// May be called any number of times, before or after dispatch; every
    /// handle observes the same resolved outcome.
    pub fn handle<T: FromOutput>(&self) -> CommandHandle<T> {
        CommandHandle {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }

    pub(crate) fn slot(&self) -> Arc<ResultSlot> {
        Arc::clone(&self.slot)
    }

    /// Resolves the command with a failure without executing it. Used for
    /// fail-fast paths (closed session, composition errors).
    pub(crate) fn fail(self, error: CamError) {
        let _ = self.slot.complete(Err(error));
    }

    pub(crate) fn into_operation(self) -> OperationDescriptor {
        self.op
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("target", &self.target)
            .field("op", &self.op)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("audit", &self.audit)
            .field("resolved", &self.slot.is_resolved())
            .finish()
    }
}

/// Typed, cloneable view over a dispatched command's outcome.
///
/// Handles support synchronous ([`wait`](Self::wait)) and asynchronous
/// ([`join`](Self::join)) observation from any thread. All observers of one
/// command see the same resolved value; waiting repeatedly is an idempotent
/// read of the resolved slot.
pub struct CommandHandle<T> {
    slot: Arc<ResultSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CommandHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T: FromOutput> CommandHandle<T> {
    /// Blocks the calling thread until the command resolves, re-raising a
    /// stored failure.
    pub fn wait(&self) -> CamResult<T> {
        self.slot.wait().and_then(T::from_output)
    }

    /// Awaits the command's resolution without blocking the thread.
    pub async fn join(&self) -> CamResult<T> {
        self.slot.resolved().await.and_then(T::from_output)
    }

    /// The resolved outcome, if the command has completed.
    pub fn try_result(&self) -> Option<CamResult<T>> {
        self.slot.peek().map(|r| r.and_then(T::from_output))
    }

    /// Whether the command has reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }
}

impl<T> fmt::Debug for CommandHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("resolved", &self.slot.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_decoding() {
        assert_eq!(i64::from_output(CommandOutput::Integer(7)).unwrap(), 7);
        assert_eq!(
            String::from_output(CommandOutput::Text("EOS".into())).unwrap(),
            "EOS"
        );
        assert!(bool::from_output(CommandOutput::Bool(true)).unwrap());
        <()>::from_output(CommandOutput::Unit).unwrap();
    }

    #[test]
    fn decode_mismatch_is_an_error_not_a_panic() {
        let err = String::from_output(CommandOutput::Integer(400)).unwrap_err();
        match err {
            CamError::UnexpectedOutput { expected, actual } => {
                assert_eq!(expected, "text");
                assert_eq!(actual, "integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn command_mutators_apply_before_dispatch() {
        let session = SessionId::new();
        let mut cmd = Command::control(CameraControl::TakePicture);
        assert!(cmd.target().is_none());
        cmd.set_target(session);
        cmd.set_timeout(Duration::from_millis(250));
        assert_eq!(cmd.target(), Some(session));
        assert_eq!(cmd.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cmd.operation_label(), "control:take-picture");
    }

    #[test]
    fn stacking_retry_is_a_composition_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1)).unwrap();
        let cmd = Command::status(StatusInquiry::UiLock)
            .with_retry(policy)
            .unwrap();
        assert!(matches!(
            cmd.with_retry(policy),
            Err(CamError::Composition(_))
        ));
    }

    #[test]
    fn failed_command_resolves_its_handles() {
        let cmd = Command::status(StatusInquiry::UiLock);
        let handle = cmd.handle::<()>();
        cmd.fail(CamError::SessionClosed);
        assert!(matches!(handle.wait(), Err(CamError::SessionClosed)));
    }

    #[test]
    fn operation_labels() {
        assert_eq!(
            Command::get_property(PropertyCode::ProductName).operation_label(),
            "get:product-name"
        );
        assert_eq!(
            Command::live_view(LiveViewOp::DownloadFrameBuffer).operation_label(),
            "live-view:download-frame-buffer"
        );
        assert_eq!(
            Command::custom("noop", |_, _| Ok(CommandOutput::Unit)).operation_label(),
            "custom:noop"
        );
    }
}
