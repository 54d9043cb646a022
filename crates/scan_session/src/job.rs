//! Single-flight guard and cooperative cancellation for background jobs.
//!
//! At most one enhancement job may be active system-wide, independent of
//! which stage it runs. The guard only knows about exclusivity; ordering and
//! chaining live in the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::{JobError, ScanError};

/// Shared cancellation flag observed by workers at progress checkpoints.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
  inner: Arc<AtomicBool>,
}

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cooperative cancellation.
  pub fn cancel(&self) {
    self.inner.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.load(Ordering::Relaxed)
  }
}

/// Gate through which every background job must start.
///
/// `try_start` hands out a [`CancelFlag`] iff no job is active; the caller
/// is responsible for eventually calling [`JobGuard::clear`] once the job
/// reports completion, failure, or cancellation.
#[derive(Debug, Default)]
pub struct JobGuard {
  active: Option<CancelFlag>,
}

impl JobGuard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Accept a new job iff none is active.
  pub fn try_start(&mut self) -> Result<CancelFlag, ScanError> {
    if self.active.is_some() {
      return Err(ScanError::GuardRejected);
    }
    let flag = CancelFlag::new();
    self.active = Some(flag.clone());
    Ok(flag)
  }

  /// Request cancellation of the active job, if any. Idempotent; calling
  /// with no active job is a no-op.
  ///
  /// The busy bit stays set until the worker observes the flag and the
  /// caller reports the terminal outcome via [`JobGuard::clear`].
  pub fn cancel_active(&mut self) {
    if let Some(flag) = &self.active {
      flag.cancel();
    }
  }

  /// Clear the busy bit after the active job reported a terminal outcome.
  pub fn clear(&mut self) {
    self.active = None;
  }

  pub fn is_busy(&self) -> bool {
    self.active.is_some()
  }
}

/// Per-job context handed to a stage worker.
///
/// Bundles the cancel flag with the progress channel so services have a
/// single cooperative checkpoint: [`JobContext::report`] both publishes
/// progress and observes cancellation.
pub struct JobContext {
  cancel: CancelFlag,
  progress: Sender<f32>,
}

impl JobContext {
  pub fn new(cancel: CancelFlag, progress: Sender<f32>) -> Self {
    Self { cancel, progress }
  }

  /// Observe cancellation without reporting progress.
  pub fn checkpoint(&self) -> Result<(), JobError> {
    if self.cancel.is_cancelled() {
      return Err(JobError::Cancelled);
    }
    Ok(())
  }

  /// Report stage-local progress in [0, 1] and observe cancellation.
  ///
  /// A disconnected receiver is ignored: the controller may already have
  /// dropped a cancelled run.
  pub fn report(&self, progress: f32) -> Result<(), JobError> {
    self.checkpoint()?;
    let _ = self.progress.send(progress.clamp(0.0, 1.0));
    Ok(())
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod job_test;
