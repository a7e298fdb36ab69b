//! Write-once result slot shared between a command and its waiters.

use crate::command::CommandOutput;
use crate::error::CamResult;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Write-once cell holding a command's outcome.
///
/// The slot transitions at most once from pending to resolved; the first
/// `complete` wins and later completions are discarded, which is what keeps
/// a timed-out command's slot from being overwritten when the underlying
/// device call eventually returns.
///
/// Waiters may block ([`wait`](Self::wait)), await
/// ([`resolved`](Self::resolved)), or poll ([`peek`](Self::peek)); all of
/// them observe the same resolved value, and reading it repeatedly has no
/// side effect.
pub(crate) struct ResultSlot {
    cell: Mutex<Option<CamResult<CommandOutput>>>,
    cvar: Condvar,
    notify: Notify,
}

impl ResultSlot {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(None),
            cvar: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CamResult<CommandOutput>>> {
        // A waiter panicking while holding the guard cannot corrupt an
        // Option, so poisoning is ignored.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the outcome if the slot is still pending.
    ///
    /// Returns `true` when this call resolved the slot, `false` when a
    /// previous completion already did.
    pub(crate) fn complete(&self, outcome: CamResult<CommandOutput>) -> bool {
        {
            let mut cell = self.lock();
            if cell.is_some() {
                return false;
            }
            *cell = Some(outcome);
        }
        self.cvar.notify_all();
        self.notify.notify_waiters();
        true
    }

    /// Returns the resolved outcome without blocking, if any.
    pub(crate) fn peek(&self) -> Option<CamResult<CommandOutput>> {
        self.lock().clone()
    }

    /// Whether the slot has resolved.
    pub(crate) fn is_resolved(&self) -> bool {
        self.lock().is_some()
    }

    /// Blocks the calling thread until the slot resolves.
    pub(crate) fn wait(&self) -> CamResult<CommandOutput> {
        let mut cell = self.lock();
        loop {
            if let Some(outcome) = cell.as_ref() {
                return outcome.clone();
            }
            cell = self
                .cvar
                .wait(cell)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Waits for the slot to resolve without blocking the thread.
    pub(crate) async fn resolved(&self) -> CamResult<CommandOutput> {
        loop {
            // Register interest before checking, so a completion landing
            // between the check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(outcome) = self.peek() {
                return outcome;
            }
            notified.await;
        }
    }
}
