//! Error taxonomy for the session core.
//!
//! Nothing here is fatal to the process; every condition is recoverable via
//! reset or retry.

use thiserror::Error;

use crate::pipeline::StageKind;

/// Errors surfaced by the session and the enhancement pipeline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScanError {
  /// Another enhancement job is already active; the guard rejected the
  /// start request.
  #[error("another enhancement job is already running")]
  GuardRejected,

  /// Scanning cannot start because the pose initializer has no valid pose
  /// yet.
  #[error("initial pose is not valid, not entering the scanning state")]
  InvalidPoseAtScanStart,

  /// An enhancement stage reported failure; the chain halts at this stage.
  #[error("{stage} stage failed: {reason}")]
  StageFailed { stage: StageKind, reason: String },

  /// The operation was cancelled cooperatively.
  #[error("cancelled")]
  Cancelled,

  /// A cancelled job is still winding down after a reset or dismissal; a
  /// new job cannot start until its worker observes the cancellation.
  #[error("previous job is still winding down after a reset")]
  ResetInProgress,

  /// Enhancement was requested outside the viewing state.
  #[error("enhancement requires the viewing state")]
  NotViewing,
}

/// Terminal result of one background stage, as seen by its worker.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JobError {
  /// The cancel flag was observed at a progress checkpoint.
  #[error("job was cancelled")]
  Cancelled,

  /// The underlying service failed.
  #[error("{0}")]
  Failed(String),
}
