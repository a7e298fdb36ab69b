//! Serialized per-session command execution.
//!
//! [`CommandDispatcher`] owns the device SDK handle and a small dedicated
//! runtime. Each open session gets exactly one worker (its serialized
//! execution context) fed by an unbounded FIFO queue. Device sessions are
//! not safely reentrant, so commands for one session never interleave;
//! workers for different sessions run independently and may execute in
//! parallel.
//!
//! ## Guarantees
//!
//! - **Ordering**: per session, commands execute and resolve in the order
//!   [`schedule`](CommandDispatcher::schedule) was called, regardless of
//!   which thread called it. The outcome is written to the command's result
//!   slot before the next command is dequeued.
//! - **Non-blocking submission**: `schedule` returns immediately.
//! - **Timeouts**: a command's slot resolves to
//!   [`CamError::Timeout`] at the deadline even if the device call is still
//!   running. The call itself is not interruptible: the worker waits for it
//!   to finish, discarding the late result, before dequeuing the next
//!   command, so serialization is preserved. Callers must treat a timeout
//!   as "outcome unknown; device state may have changed."
//! - **Lifecycle**: closing a session fails every still-queued command with
//!   [`CamError::SessionClosed`] without touching the device, then closes
//!   the SDK session and terminates the worker.

use crate::command::{Command, CommandOutput, OperationDescriptor};
use crate::error::{CamError, CamResult, DeviceErrorKind};
use crate::sdk::{DeviceSdk, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError};
use tracing::{debug, info, warn};

/// Grace period for draining workers on a blocking shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct SessionEntry {
    tx: mpsc::UnboundedSender<Command>,
    closed: Arc<AtomicBool>,
}

/// Routes commands onto per-session serialized execution contexts.
///
/// The dispatcher owns its runtime, so it can be driven from plain threads
/// as well as from async code. It is usually shared behind an `Arc` by one
/// or more [`Camera`](crate::Camera) facades.
pub struct CommandDispatcher {
    sdk: Arc<dyn DeviceSdk>,
    runtime: Mutex<Option<Runtime>>,
    handle: tokio::runtime::Handle,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher over the given SDK binding.
    ///
    /// # Errors
    ///
    /// `Runtime` when the dedicated execution runtime cannot be built.
    pub fn new(sdk: Arc<dyn DeviceSdk>) -> CamResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("camkit-dispatch")
            .enable_all()
            .build()
            .map_err(|err| CamError::Runtime(format!("failed to build dispatch runtime: {err}")))?;
        let handle = runtime.handle().clone();
        Ok(Self {
            sdk,
            runtime: Mutex::new(Some(runtime)),
            handle,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a device session and spawns its execution context.
    ///
    /// # Errors
    ///
    /// `Runtime` after [`shutdown`](Self::shutdown); any SDK failure
    /// otherwise.
    pub fn open_session(&self) -> CamResult<SessionId> {
        if self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return Err(CamError::Runtime("dispatcher is shut down".into()));
        }
        let session = self.sdk.open_session()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        self.write_sessions().insert(
            session,
            SessionEntry {
                tx,
                closed: Arc::clone(&closed),
            },
        );
        self.handle
            .spawn(run_worker(Arc::clone(&self.sdk), session, rx, closed));
        info!(%session, "session opened");
        Ok(session)
    }

    /// Whether the session is currently open.
    pub fn is_open(&self, session: SessionId) -> bool {
        self.read_sessions()
            .get(&session)
            .map(|entry| !entry.closed.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Enqueues a command on the session's execution context.
    ///
    /// Never blocks. If the command carries no target the session is bound
    /// here. A command aimed at an unknown or closed session resolves
    /// immediately to [`CamError::SessionClosed`] without ever reaching the
    /// device.
    pub fn schedule(&self, session: SessionId, mut command: Command) {
        if command.target().is_none() {
            command.set_target(session);
        }
        let tx = {
            let sessions = self.read_sessions();
            match sessions.get(&session) {
                Some(entry) if !entry.closed.load(Ordering::Acquire) => Some(entry.tx.clone()),
                _ => None,
            }
        };
        match tx {
            Some(tx) => {
                if let Err(mpsc::error::SendError(command)) = tx.send(command) {
                    // The worker already exited; fail fast.
                    command.fail(CamError::SessionClosed);
                }
            }
            None => command.fail(CamError::SessionClosed),
        }
    }

    /// Closes a session.
    ///
    /// Already-queued commands resolve to [`CamError::SessionClosed`]
    /// without any device call; the command executing at close time, if
    /// any, runs to completion first. The worker then closes the SDK
    /// session and exits.
    ///
    /// # Errors
    ///
    /// `SessionClosed` when the session is not open.
    pub fn close_session(&self, session: SessionId) -> CamResult<()> {
        match self.write_sessions().remove(&session) {
            Some(entry) => {
                entry.closed.store(true, Ordering::Release);
                // Dropping the sender closes the queue; the worker drains
                // what is left and exits.
                drop(entry.tx);
                info!(%session, "session closing");
                Ok(())
            }
            None => Err(CamError::SessionClosed),
        }
    }

    /// Closes every open session and stops the execution runtime.
    ///
    /// From a plain thread the call blocks briefly to let workers drain;
    /// from inside another runtime workers are torn down in the background
    /// instead, since blocking there would stall the caller's runtime.
    pub fn shutdown(&self) {
        let sessions: Vec<SessionId> = self.read_sessions().keys().copied().collect();
        for session in sessions {
            let _ = self.close_session(session);
        }
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            if tokio::runtime::Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(SHUTDOWN_GRACE);
            }
        }
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One session's serialized execution context.
async fn run_worker(
    sdk: Arc<dyn DeviceSdk>,
    session: SessionId,
    mut rx: mpsc::UnboundedReceiver<Command>,
    closed: Arc<AtomicBool>,
) {
    debug!(%session, "execution context started");
    while let Some(command) = rx.recv().await {
        if closed.load(Ordering::Acquire) {
            command.fail(CamError::SessionClosed);
            continue;
        }
        execute_one(Arc::clone(&sdk), session, command).await;
    }
    if let Err(err) = sdk.close_session(session) {
        warn!(%session, error = %err, "SDK session close failed");
    }
    debug!(%session, "execution context stopped");
}

/// Runs one command to a terminal state, timeout included.
async fn execute_one(sdk: Arc<dyn DeviceSdk>, session: SessionId, command: Command) {
    let slot = command.slot();
    let limit = command.timeout();
    let audit = command.audit_label().map(str::to_owned);
    let op_label = command.operation_label();
    let started = Instant::now();

    if let Some(label) = &audit {
        info!(target: "camkit::audit", %session, label = %label, op = %op_label, "command started");
    }

    let mut call = task::spawn_blocking(move || execute_blocking(sdk, session, command));

    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut call).await {
            Ok(joined) => flatten_join(joined),
            Err(_) => {
                // Deadline reached with the device call still in flight.
                // The slot resolves now; the call is not interruptible, so
                // wait for it before the next dequeue and discard whatever
                // it eventually returns.
                let _ = slot.complete(Err(CamError::Timeout { elapsed: limit }));
                warn!(
                    %session,
                    op = %op_label,
                    timeout = ?limit,
                    "command timed out; draining in-flight device call"
                );
                match flatten_join(call.await) {
                    Ok(_) => debug!(%session, op = %op_label, "late result discarded"),
                    Err(err) => {
                        debug!(%session, op = %op_label, error = %err, "late failure discarded");
                    }
                }
                if let Some(label) = &audit {
                    info!(
                        target: "camkit::audit",
                        %session,
                        label = %label,
                        op = %op_label,
                        elapsed = ?started.elapsed(),
                        outcome = "timeout",
                        "command finished"
                    );
                }
                return;
            }
        },
        None => flatten_join(call.await),
    };

    if let Some(label) = &audit {
        let verdict = if outcome.is_ok() { "ok" } else { "error" };
        info!(
            target: "camkit::audit",
            %session,
            label = %label,
            op = %op_label,
            elapsed = ?started.elapsed(),
            outcome = verdict,
            "command finished"
        );
    }
    let _ = slot.complete(outcome);
}

/// Invokes the device, applying the command's retry policy.
///
/// Runs on the blocking pool; the session's worker awaits it, so at most
/// one invocation per session is in flight at any time.
fn execute_blocking(
    sdk: Arc<dyn DeviceSdk>,
    session: SessionId,
    command: Command,
) -> CamResult<CommandOutput> {
    let total = command.retry().map_or(1, |p| p.attempts());
    let delay = command.retry().map_or(Duration::ZERO, |p| p.delay());
    let op = command.into_operation();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match invoke_once(sdk.as_ref(), session, &op) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < total => {
                warn!(
                    %session,
                    op = %op.label(),
                    attempt,
                    total,
                    error = %err,
                    "transient device failure, retrying"
                );
                if delay > Duration::ZERO {
                    std::thread::sleep(delay);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn invoke_once(
    sdk: &dyn DeviceSdk,
    session: SessionId,
    op: &OperationDescriptor,
) -> CamResult<CommandOutput> {
    match op {
        OperationDescriptor::Custom { call, .. } => (call.as_ref())(sdk, session),
        other => sdk.invoke(session, other),
    }
}

fn flatten_join(joined: Result<CamResult<CommandOutput>, JoinError>) -> CamResult<CommandOutput> {
    joined.unwrap_or_else(|err| {
        Err(CamError::device(
            DeviceErrorKind::Internal,
            format!("device call aborted: {err}"),
        ))
    })
}
