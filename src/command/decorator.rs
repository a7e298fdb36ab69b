//! Cross-cutting command decoration.
//!
//! Two flavors, mirroring how callers use them:
//!
//! - **One-shot**: builder-style methods on [`Command`] (`with_timeout`,
//!   `with_retry`, `with_audit`) decorate a single command before dispatch.
//! - **Reusable**: a [`ReusableChain`] holds an ordered, validated list of
//!   [`DecoratorStep`]s. A session facade configured with a chain applies
//!   it to every command dispatched through it, in registration order.
//!
//! Decorators only add behavior around a command's execution. They never
//! mask an underlying device failure as success: retry re-invokes on
//! transient failures only, and a genuine device error propagates on first
//! occurrence.

use crate::command::Command;
use crate::error::{CamError, CamResult};
use std::time::Duration;

/// Retry policy for transient device failures.
///
/// `attempts` counts total tries, including the first one; only failures
/// with [`is_transient`](CamError::is_transient) set (a busy device) are
/// retried, with `delay` between tries. The command's timeout, if any,
/// covers all attempts together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy making up to `attempts` tries with `delay` between
    /// them.
    ///
    /// # Errors
    ///
    /// `Composition` when `attempts` is zero: a command that may never run
    /// is a configuration mistake, not a request.
    pub fn new(attempts: u32, delay: Duration) -> CamResult<Self> {
        if attempts == 0 {
            return Err(CamError::Composition(
                "retry policy needs at least one attempt".into(),
            ));
        }
        Ok(Self { attempts, delay })
    }

    /// Total tries, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause between tries.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// One step of a reusable decorator chain.
#[derive(Clone, Debug, PartialEq)]
pub enum DecoratorStep {
    /// Set the command timeout. Overrides a previously injected default.
    Timeout(Duration),
    /// Attach a retry policy.
    Retry(RetryPolicy),
    /// Log execution start and finish under the given label.
    Audit(String),
}

impl DecoratorStep {
    fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Retry(_) => "retry",
            Self::Audit(_) => "audit",
        }
    }
}

/// Ordered, validated decorator configuration bound to a session facade.
///
/// Applying the same chain to two structurally identical commands yields
/// behaviorally identical commands: application is a pure function of the
/// chain's steps and the command's prior configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ReusableChain {
    steps: Vec<DecoratorStep>,
}

impl ReusableChain {
    /// Starts an empty chain builder.
    pub fn builder() -> ReusableChainBuilder {
        ReusableChainBuilder { steps: Vec::new() }
    }

    /// The configured steps, in application order.
    pub fn steps(&self) -> &[DecoratorStep] {
        &self.steps
    }

    /// Applies every step to the command, in registration order.
    ///
    /// # Errors
    ///
    /// `Composition` when a retry step meets a command that already carries
    /// a retry policy; stacked retry loops multiply attempts in a way no
    /// caller intends. A timeout step, by contrast, overrides: the chain is
    /// the facade's policy and wins over an injected default.
    pub fn apply(&self, mut command: Command) -> CamResult<Command> {
        for step in &self.steps {
            command = match step {
                DecoratorStep::Timeout(timeout) => command.with_timeout(*timeout),
                DecoratorStep::Retry(policy) => command.with_retry(*policy)?,
                DecoratorStep::Audit(label) => command.with_audit(label.clone()),
            };
        }
        Ok(command)
    }
}

/// Builder collecting decorator steps before validation.
#[derive(Clone, Debug, Default)]
pub struct ReusableChainBuilder {
    steps: Vec<DecoratorStep>,
}

impl ReusableChainBuilder {
    /// Adds a timeout step.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.steps.push(DecoratorStep::Timeout(timeout));
        self
    }

    /// Adds a retry step.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.steps.push(DecoratorStep::Retry(policy));
        self
    }

    /// Adds an audit step.
    pub fn audit(mut self, label: impl Into<String>) -> Self {
        self.steps.push(DecoratorStep::Audit(label.into()));
        self
    }

    /// Validates and finishes the chain.
    ///
    /// # Errors
    ///
    /// `Composition` when a step kind appears more than once: two timeout
    /// steps are conflicting settings, not a refinement.
    pub fn build(self) -> CamResult<ReusableChain> {
        let mut seen: Vec<&'static str> = Vec::new();
        for step in &self.steps {
            let kind = step.kind();
            if seen.contains(&kind) {
                return Err(CamError::Composition(format!(
                    "duplicate {kind} step in decorator chain"
                )));
            }
            seen.push(kind);
        }
        Ok(ReusableChain { steps: self.steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CameraControl;

    #[test]
    fn zero_attempt_retry_is_rejected() {
        assert!(matches!(
            RetryPolicy::new(0, Duration::ZERO),
            Err(CamError::Composition(_))
        ));
    }

    #[test]
    fn duplicate_steps_are_rejected_at_build_time() {
        let err = ReusableChain::builder()
            .timeout(Duration::from_millis(100))
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap_err();
        assert!(matches!(err, CamError::Composition(_)));
    }

    #[test]
    fn apply_is_deterministic_for_identical_commands() {
        let chain = ReusableChain::builder()
            .timeout(Duration::from_millis(750))
            .retry(RetryPolicy::new(3, Duration::from_millis(5)).unwrap())
            .audit("session-default")
            .build()
            .unwrap();

        let first = chain
            .apply(Command::control(CameraControl::TakePicture))
            .unwrap();
        let second = chain
            .apply(Command::control(CameraControl::TakePicture))
            .unwrap();

        assert_eq!(first.timeout(), second.timeout());
        assert_eq!(first.retry(), second.retry());
        assert_eq!(first.audit_label(), second.audit_label());
        assert_eq!(first.timeout(), Some(Duration::from_millis(750)));
        assert_eq!(first.retry().map(|p| p.attempts()), Some(3));
        assert_eq!(first.audit_label(), Some("session-default"));
    }

    #[test]
    fn chain_timeout_overrides_injected_default() {
        let chain = ReusableChain::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let command =
            Command::control(CameraControl::TakePicture).with_timeout(Duration::from_millis(100));
        let decorated = chain.apply(command).unwrap();
        assert_eq!(decorated.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn chain_retry_conflicts_with_existing_policy() {
        let policy = RetryPolicy::new(2, Duration::ZERO).unwrap();
        let chain = ReusableChain::builder().retry(policy).build().unwrap();
        let command = Command::control(CameraControl::TakePicture)
            .with_retry(policy)
            .unwrap();
        assert!(matches!(
            chain.apply(command),
            Err(CamError::Composition(_))
        ));
    }
}
