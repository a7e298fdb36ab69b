//! An in-memory device used by the test suite and the demo binary.
//!
//! `MockSdk` behaves like a tethered camera without hardware: shoots write
//! placeholder image files, live view is a small state machine, properties
//! live in a seeded store. Tests script it with per-operation latency and
//! injected failures, and read back an invocation journal to assert
//! ordering and concurrency.

use crate::command::{CommandOutput, LiveViewOp, OperationDescriptor, PropertyValue};
use crate::error::{CamError, CamResult, DeviceErrorKind};
use crate::sdk::{DeviceSdk, SessionId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Minimal JPEG-framed payload for downloaded frames and shots.
const FRAME_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0xFF, 0xD9,
];

/// One entry of the mock's invocation journal.
#[derive(Clone, Debug)]
pub enum MockEvent {
    /// An invocation entered the device.
    Started {
        /// Session the invocation ran against.
        session: SessionId,
        /// Operation label (see `OperationDescriptor::label`).
        label: String,
        /// When the invocation started.
        at: Instant,
    },
    /// An invocation left the device.
    Finished {
        /// Session the invocation ran against.
        session: SessionId,
        /// Operation label.
        label: String,
        /// When the invocation finished.
        at: Instant,
    },
}

impl MockEvent {
    /// The session this event belongs to.
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. } | Self::Finished { session, .. } => *session,
        }
    }

    /// The operation label.
    pub fn label(&self) -> &str {
        match self {
            Self::Started { label, .. } | Self::Finished { label, .. } => label,
        }
    }

    /// Event timestamp.
    pub fn at(&self) -> Instant {
        match self {
            Self::Started { at, .. } | Self::Finished { at, .. } => *at,
        }
    }

    /// Whether this is a start event.
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

struct FailurePlan {
    remaining: u32,
    kind: DeviceErrorKind,
}

struct MockSession {
    live_view_enabled: bool,
    live_view_active: bool,
    properties: HashMap<u32, PropertyValue>,
}

impl MockSession {
    fn new() -> Self {
        use crate::catalog::PropertyCode;
        let mut properties = HashMap::new();
        properties.insert(
            PropertyCode::ProductName.native_code(),
            PropertyValue::Text("MockCam Mark II".into()),
        );
        properties.insert(PropertyCode::IsoSpeed.native_code(), PropertyValue::Integer(400));
        properties.insert(PropertyCode::Aperture.native_code(), PropertyValue::Integer(56));
        properties.insert(
            PropertyCode::ShutterSpeed.native_code(),
            PropertyValue::Integer(125),
        );
        properties.insert(
            PropertyCode::ColorTemperature.native_code(),
            PropertyValue::Integer(5200),
        );
        Self {
            live_view_enabled: false,
            live_view_active: false,
            properties,
        }
    }
}

struct MockState {
    shot_dir: PathBuf,
    sessions: HashMap<SessionId, MockSession>,
    latencies: HashMap<String, Duration>,
    failures: HashMap<String, FailurePlan>,
    journal: Vec<MockEvent>,
    shot_seq: u32,
}

/// In-memory [`DeviceSdk`] implementation.
pub struct MockSdk {
    state: Mutex<MockState>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    /// Creates a mock device writing shots to the system temp directory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                shot_dir: std::env::temp_dir(),
                sessions: HashMap::new(),
                latencies: HashMap::new(),
                failures: HashMap::new(),
                journal: Vec::new(),
                shot_seq: 0,
            }),
        }
    }

    /// Creates a mock device writing shots under `dir`.
    pub fn with_shot_dir(dir: impl Into<PathBuf>) -> Self {
        let sdk = Self::new();
        sdk.lock().shot_dir = dir.into();
        sdk
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds artificial latency to every invocation with the given label.
    pub fn set_latency(&self, label: &str, latency: Duration) {
        self.lock().latencies.insert(label.to_string(), latency);
    }

    /// Makes the next `times` invocations with the given label fail with
    /// `kind`; later invocations succeed again.
    pub fn fail_next(&self, label: &str, times: u32, kind: DeviceErrorKind) {
        self.lock().failures.insert(
            label.to_string(),
            FailurePlan {
                remaining: times,
                kind,
            },
        );
    }

    /// Snapshot of the invocation journal.
    pub fn journal(&self) -> Vec<MockEvent> {
        self.lock().journal.clone()
    }

    /// Labels of started invocations for one session, in device order.
    pub fn started_labels(&self, session: SessionId) -> Vec<String> {
        self.lock()
            .journal
            .iter()
            .filter(|e| e.is_started() && e.session() == session)
            .map(|e| e.label().to_string())
            .collect()
    }

    /// Number of started invocations with the given label, all sessions.
    pub fn invocation_count(&self, label: &str) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|e| e.is_started() && e.label() == label)
            .count()
    }

    fn perform(&self, session: SessionId, op: &OperationDescriptor) -> CamResult<CommandOutput> {
        let mut state = self.lock();
        if !state.sessions.contains_key(&session) {
            return Err(CamError::device(
                DeviceErrorKind::Disconnected,
                format!("{session} is not open"),
            ));
        }
        match op {
            OperationDescriptor::Control { .. } | OperationDescriptor::Status(_) => {
                Ok(CommandOutput::Unit)
            }
            OperationDescriptor::Shoot(options) => {
                let frame_count = options.frame_count.max(1);
                let prefix = options.filename_prefix.as_deref().unwrap_or("img");
                let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
                let dir = state.shot_dir.clone();
                let mut files = Vec::new();
                for _ in 0..frame_count {
                    state.shot_seq += 1;
                    let path = dir.join(format!("{prefix}-{stamp}-{:04}.jpg", state.shot_seq));
                    std::fs::write(&path, FRAME_BYTES).map_err(|err| {
                        CamError::device(
                            DeviceErrorKind::Internal,
                            format!("failed to store image {}: {err}", path.display()),
                        )
                    })?;
                    files.push(path);
                }
                if matches!(options.save_to, crate::command::SaveTarget::Camera) {
                    // Images stay on the device; nothing lands on the host.
                    for path in &files {
                        let _ = std::fs::remove_file(path);
                    }
                    return Ok(CommandOutput::Files(Vec::new()));
                }
                Ok(CommandOutput::Files(files))
            }
            OperationDescriptor::LiveView(op) => {
                let mock = state
                    .sessions
                    .get_mut(&session)
                    .ok_or(CamError::SessionClosed)?;
                match op {
                    LiveViewOp::Begin => {
                        mock.live_view_enabled = true;
                        mock.live_view_active = true;
                        Ok(CommandOutput::Unit)
                    }
                    LiveViewOp::End => {
                        mock.live_view_enabled = false;
                        mock.live_view_active = false;
                        Ok(CommandOutput::Unit)
                    }
                    LiveViewOp::IsEnabled => Ok(CommandOutput::Bool(mock.live_view_enabled)),
                    LiveViewOp::IsActive => Ok(CommandOutput::Bool(mock.live_view_active)),
                    LiveViewOp::DownloadFrame { dest } => {
                        if !mock.live_view_active {
                            return Err(CamError::device(
                                DeviceErrorKind::Busy,
                                "live view is not active",
                            ));
                        }
                        std::fs::write(dest, FRAME_BYTES).map_err(|err| {
                            CamError::device(
                                DeviceErrorKind::Internal,
                                format!("failed to store frame {}: {err}", dest.display()),
                            )
                        })?;
                        Ok(CommandOutput::Files(vec![dest.clone()]))
                    }
                    LiveViewOp::DownloadFrameBuffer => {
                        if !mock.live_view_active {
                            return Err(CamError::device(
                                DeviceErrorKind::Busy,
                                "live view is not active",
                            ));
                        }
                        Ok(CommandOutput::Bytes(FRAME_BYTES.to_vec()))
                    }
                }
            }
            OperationDescriptor::GetProperty(code) => {
                let mock = state
                    .sessions
                    .get(&session)
                    .ok_or(CamError::SessionClosed)?;
                match mock.properties.get(&code.native_code()) {
                    Some(PropertyValue::Integer(value)) => Ok(CommandOutput::Integer(*value)),
                    Some(PropertyValue::Text(value)) => Ok(CommandOutput::Text(value.clone())),
                    None => Err(CamError::device(
                        DeviceErrorKind::Unsupported,
                        format!("property {} is not available", code.symbol()),
                    )),
                }
            }
            OperationDescriptor::DescribeProperty(code) => {
                Ok(CommandOutput::Values(describe_values(*code)))
            }
            OperationDescriptor::SetProperty { code, value } => {
                let mock = state
                    .sessions
                    .get_mut(&session)
                    .ok_or(CamError::SessionClosed)?;
                mock.properties.insert(code.native_code(), value.clone());
                Ok(CommandOutput::Unit)
            }
            OperationDescriptor::Custom { label, .. } => Err(CamError::device(
                DeviceErrorKind::Unsupported,
                format!("custom operation '{label}' executes in the dispatcher"),
            )),
        }
    }
}

fn describe_values(code: crate::catalog::PropertyCode) -> Vec<i64> {
    use crate::catalog::PropertyCode::*;
    match code {
        IsoSpeed => vec![100, 200, 400, 800, 1600, 3200, 6400],
        Aperture => vec![28, 40, 56, 80, 110, 160, 220],
        ShutterSpeed => vec![30, 60, 125, 250, 500, 1000, 2000],
        ColorTemperature | LiveViewColorTemperature => {
            vec![2800, 3200, 4000, 5200, 6000, 7000, 10000]
        }
        ExposureCompensation => vec![-9, -6, -3, 0, 3, 6, 9],
        DriveMode => vec![0, 1, 2],
        MeteringMode => vec![1, 3, 5],
        ImageQuality => vec![0x0010, 0x0013, 0x0063],
        PictureStyle => vec![0x81, 0x82, 0x83, 0x84],
        LiveViewAfMode => vec![0, 1, 2],
        LiveViewWhiteBalance => vec![0, 1, 2, 3, 4, 5],
        ProductName => Vec::new(),
    }
}

impl DeviceSdk for MockSdk {
    fn open_session(&self) -> CamResult<SessionId> {
        let session = SessionId::new();
        self.lock().sessions.insert(session, MockSession::new());
        Ok(session)
    }

    fn close_session(&self, session: SessionId) -> CamResult<()> {
        match self.lock().sessions.remove(&session) {
            Some(_) => Ok(()),
            None => Err(CamError::device(
                DeviceErrorKind::Internal,
                format!("{session} is not open"),
            )),
        }
    }

    fn invoke(&self, session: SessionId, op: &OperationDescriptor) -> CamResult<CommandOutput> {
        let label = op.label();
        let latency = {
            let mut state = self.lock();
            if !state.sessions.contains_key(&session) {
                return Err(CamError::device(
                    DeviceErrorKind::Disconnected,
                    format!("{session} is not open"),
                ));
            }
            state.journal.push(MockEvent::Started {
                session,
                label: label.clone(),
                at: Instant::now(),
            });
            if let Some(plan) = state.failures.get_mut(&label) {
                if plan.remaining > 0 {
                    plan.remaining -= 1;
                    let kind = plan.kind;
                    state.journal.push(MockEvent::Finished {
                        session,
                        label: label.clone(),
                        at: Instant::now(),
                    });
                    return Err(CamError::device(
                        kind,
                        format!("injected {kind} failure for {label}"),
                    ));
                }
            }
            state.latencies.get(&label).copied()
        };
        // Sleep outside the lock so sessions stay concurrent with each
        // other while one of them simulates a slow device call.
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        let result = self.perform(session, op);
        self.lock().journal.push(MockEvent::Finished {
            session,
            label,
            at: Instant::now(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CameraControl, PropertyCode};
    use crate::command::{Command, ShootOptions};

    #[test]
    fn journal_records_invocations_in_order() {
        let sdk = MockSdk::new();
        let session = sdk.open_session().unwrap();
        sdk.invoke(session, &Command::control(CameraControl::TakePicture).into_operation())
            .unwrap();
        sdk.invoke(
            session,
            &Command::get_property(PropertyCode::ProductName).into_operation(),
        )
        .unwrap();
        assert_eq!(
            sdk.started_labels(session),
            vec!["control:take-picture", "get:product-name"]
        );
    }

    #[test]
    fn shoot_writes_one_file_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let sdk = MockSdk::with_shot_dir(dir.path());
        let session = sdk.open_session().unwrap();
        let options = ShootOptions {
            frame_count: 3,
            ..ShootOptions::default()
        };
        let output = sdk
            .invoke(session, &Command::shoot(options).into_operation())
            .unwrap();
        match output {
            CommandOutput::Files(files) => {
                assert_eq!(files.len(), 3);
                for file in files {
                    assert!(file.exists());
                }
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn frame_download_requires_active_live_view() {
        let sdk = MockSdk::new();
        let session = sdk.open_session().unwrap();
        let err = sdk
            .invoke(
                session,
                &Command::live_view(LiveViewOp::DownloadFrameBuffer).into_operation(),
            )
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn injected_failures_are_consumed() {
        let sdk = MockSdk::new();
        let session = sdk.open_session().unwrap();
        let op = Command::control(CameraControl::TakePicture).into_operation();
        sdk.fail_next("control:take-picture", 1, DeviceErrorKind::Busy);
        assert!(sdk.invoke(session, &op).is_err());
        assert!(sdk.invoke(session, &op).is_ok());
    }

    #[test]
    fn unknown_session_is_disconnected() {
        let sdk = MockSdk::new();
        let err = sdk
            .invoke(
                SessionId::new(),
                &Command::status(crate::catalog::StatusInquiry::UiLock).into_operation(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CamError::Device {
                kind: DeviceErrorKind::Disconnected,
                ..
            }
        ));
    }
}
