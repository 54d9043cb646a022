//! scan_session - Engine/UI independent capture session core for
//! interactive 3D scanning
//!
//! This crate sequences sensor capture, live tracking/mapping, and
//! post-capture mesh enhancement: a three-state session lifecycle (cube
//! placement -> scanning -> viewing) coordinating a small set of
//! long-running, cancellable background jobs that never run concurrently
//! with each other and are safely abortable mid-flight (low memory, view
//! dismissal, user reset).
//!
//! # Features
//!
//! - **Session state machine**: guarded transitions, sensor-needs
//!   predicate, full resets that preserve the user-chosen volume size
//! - **Enhancement pipeline**: hole-fill -> naive colorize -> enhanced
//!   colorize, chained strictly one stage at a time with a single combined
//!   progress scale
//! - **Job guard**: at most one background job active system-wide, with
//!   cooperative cancellation observed at progress checkpoints
//! - **Option reconciliation**: capture-option changes rebuild the SLAM
//!   context atomically and re-apply the held volume size
//!
//! Tracking, mapping, reconstruction, rendering, and export are external
//! collaborators behind the narrow traits in [`slam`] and [`sensor`].
//!
//! # Example
//!
//! ```ignore
//! use scan_session::{EntryStage, ScanSession, SessionConfig};
//!
//! let mut session = ScanSession::new(
//!     Box::new(slam_factory),
//!     Box::new(sensor),
//!     Some(Box::new(color_camera)),
//!     hole_filler,
//!     colorizer,
//!     SessionConfig::default(),
//! );
//!
//! session.enter_scanning()?;
//! // ... frames accumulate ...
//! session.enter_viewing()?;
//!
//! session.request_enhancement(EntryStage::Colorize, mesh)?;
//! loop {
//!     for event in session.poll_enhancement() {
//!         // progress, preview, completed, ...
//!     }
//! }
//! ```

pub mod types;

// Re-export commonly used items
pub use types::{
  clamp_volume_size, keep_in_range, KeyFrame, MotionSample, Pose, ScanMesh, SessionState,
  VolumeScale, MAX_VOLUME_SIZE_M, MIN_VOLUME_SIZE_M,
};

pub mod options;
pub use options::{
  CaptureOption, CaptureOptions, ColorizeMode, ColorizeParams, ColorizerQuality, SessionConfig,
};

pub mod error;
pub use error::{JobError, ScanError};

// Single-flight guard and cooperative cancellation
pub mod job;
pub use job::{CancelFlag, JobContext, JobGuard};

// External collaborator interfaces
pub mod sensor;
pub mod slam;
pub use sensor::{ColorCamera, SensorStatus, SensorStream};
pub use slam::{
  Colorizer, HoleFiller, KeyFrameManager, KeyFrameStore, Mapper, PoseInitializer, Scene,
  SlamContext, SlamFactory, Tracker,
};

// Mesh enhancement pipeline
pub mod pipeline;
pub use pipeline::{EnhancementPipeline, EntryStage, PipelineEvent, StageKind};

// Display-mode dispatch
pub mod display;
pub use display::{DisplayMode, RenderingMode};

// Capture session state machine
pub mod session;
pub use session::{PressureAction, ScanSession, SessionEvent};

// Shared mock collaborators for tests
#[cfg(test)]
pub mod test_utils;
