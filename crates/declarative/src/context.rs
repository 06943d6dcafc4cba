//! Apply context, cancellation and callback traits
//!
//! These traits allow the declarative crate to be driven without
//! depending on a specific UI, prompt library or signal handler.

use crate::types::ApplyResult;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Error returned when a cancellation checkpoint observes a canceled token
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Canceled {
    /// Someone called [`CancelToken::cancel`]
    #[error("operation canceled")]
    Requested,
    /// The token's deadline passed
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// Cooperative cancellation token shared between the orchestrator and
/// long-running operations.
///
/// Clones share the same flag. Operations call [`CancelToken::check`] at
/// their checkpoints and stop with [`Canceled`] once the token is canceled
/// or its deadline has passed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is only canceled explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Request cancellation for every clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the token is canceled or expired
    pub fn is_canceled(&self) -> bool {
        self.check().is_err()
    }

    /// Cancellation checkpoint
    pub fn check(&self) -> Result<(), Canceled> {
        if self.flag.load(Ordering::SeqCst) {
            return Err(Canceled::Requested);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Canceled::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Time left before the deadline, if one is set
    ///
    /// Network calls use this as their timeout so they never outlive the
    /// caller's budget.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch of instance operations
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to work on a single instance
    fn on_resource_start(&mut self, address: &str);

    /// Called when an instance operation completes
    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _address: &str) {}
    fn on_resource_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to every lifecycle operation
#[derive(Debug, Clone, Default)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    /// Cancellation token observed at checkpoints
    pub cancel: CancelToken,
}

impl ApplyContext {
    /// Create a new apply context with a fresh token
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self {
            dry_run,
            verbose,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_live() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        assert!(!token.is_canceled());
        assert!(token.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert_eq!(token.check(), Err(Canceled::Requested));
    }

    #[test]
    fn test_zero_timeout_is_expired() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert_eq!(token.check(), Err(Canceled::DeadlineExceeded));
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_long_timeout_is_live() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(token.check().is_ok());
        assert!(token.remaining().is_some_and(|d| d > Duration::from_secs(3500)));
    }

    #[test]
    fn test_context_with_cancel() {
        let token = CancelToken::new();
        let ctx = ApplyContext::new(false, false).with_cancel(token.clone());
        token.cancel();
        assert!(ctx.cancel.is_canceled());
    }
}
