//! SLAM collaborator interfaces.
//!
//! The tracking/mapping/reconstruction algorithms are external services; the
//! session core only decides when they run and when they are torn down.
//! Everything here is a narrow trait so integrations (and tests) can supply
//! their own implementations.

use std::sync::Arc;

use glam::Vec3;

use crate::error::JobError;
use crate::job::JobContext;
use crate::options::{CaptureOptions, ColorizeParams, SessionConfig};
use crate::types::{KeyFrame, MotionSample, Pose, ScanMesh};

/// Estimates the initial camera pose relative to the scanning volume while
/// the cube is being placed.
pub trait PoseInitializer {
  /// Whether a usable initial pose exists. Gates the transition into
  /// scanning.
  fn has_valid_pose(&self) -> bool;

  /// The current initial pose estimate. Only meaningful when
  /// [`PoseInitializer::has_valid_pose`] is true.
  fn camera_pose(&self) -> Pose;

  /// Propagate a volume-size change so the pose estimate stays consistent
  /// with the cube being placed.
  fn set_volume_size(&mut self, size: Vec3);
}

/// Camera tracker fed with IMU samples while placing or scanning.
pub trait Tracker {
  /// Seed the tracker with the initial pose when scanning starts.
  fn set_initial_pose(&mut self, pose: Pose);

  /// Feed one motion sample. The tracker is more robust to fast moves when
  /// it sees IMU data.
  fn update_camera_pose(&mut self, sample: &MotionSample);
}

/// Incremental mapper that accumulates depth into the scene.
pub trait Mapper {
  /// Prepare internal state for a fresh scan.
  fn prepare_for_scan(&mut self);

  /// Finalize the accumulated triangle mesh. Called exactly once on the
  /// transition out of scanning.
  fn finalize_triangle_mesh(&mut self);
}

/// Reconstruction scene holding the mapper's output mesh.
///
/// Mesh retrieval is a scoped acquisition: `lock_and_get_mesh` must be
/// paired with `unlock_mesh`. Shared with enhancement workers, hence
/// `Send + Sync`.
pub trait Scene: Send + Sync {
  fn lock_and_get_mesh(&self) -> ScanMesh;
  fn unlock_mesh(&self);
}

/// Source of retained keyframes for colorizing.
pub trait KeyFrameManager {
  /// Retained keyframes in capture order, capped at the configured maximum.
  fn get_key_frames(&self) -> Vec<KeyFrame>;
}

/// Patches holes in a mesh. Runs on a worker thread; must observe the
/// [`JobContext`] checkpoints.
pub trait HoleFiller: Send + Sync {
  fn fill_holes(&self, mesh: &ScanMesh, ctx: &JobContext) -> Result<ScanMesh, JobError>;
}

/// Projects keyframe color onto a mesh. One service covers both the naive
/// per-vertex pass and the enhanced texture-mapping pass; `params.mode`
/// selects the algorithm.
pub trait Colorizer: Send + Sync {
  fn colorize(
    &self,
    mesh: &ScanMesh,
    scene: &Arc<dyn Scene>,
    keyframes: &[KeyFrame],
    params: &ColorizeParams,
    ctx: &JobContext,
  ) -> Result<ScanMesh, JobError>;
}

/// The rebuildable set of SLAM resources owned by a session.
///
/// Dropped and rebuilt as a unit on every full reset; option reconciliation
/// swaps the whole context rather than mutating members in place.
pub struct SlamContext {
  pub pose_initializer: Box<dyn PoseInitializer>,
  pub tracker: Box<dyn Tracker>,
  pub mapper: Box<dyn Mapper>,
  pub scene: Arc<dyn Scene>,
  pub key_frames: Box<dyn KeyFrameManager>,
}

/// Builds a fresh [`SlamContext`] from the current capture options.
///
/// This is the seam option reconciliation goes through: a changed option
/// means a new tracker/mapper/scene, never a mutated one.
pub trait SlamFactory {
  fn build(&self, options: &CaptureOptions, config: &SessionConfig) -> SlamContext;
}

// =============================================================================
// KeyFrameStore - bounded, motion-filtered keyframe retention
// =============================================================================

/// Default [`KeyFrameManager`] implementation.
///
/// Accepts a frame only when the camera moved enough since the last kept
/// frame (rotation or translation threshold) and is currently moving slowly
/// enough to avoid motion blur. The store is capped; the oldest frame is
/// evicted first.
pub struct KeyFrameStore {
  frames: Vec<KeyFrame>,
  max_frames: usize,
  max_rotation_rad: f32,
  max_translation_m: f32,
  max_rotation_speed_rad_s: f32,
}

impl KeyFrameStore {
  pub fn new(config: &SessionConfig) -> Self {
    Self {
      frames: Vec::new(),
      max_frames: config.max_key_frames,
      max_rotation_rad: config.max_key_frame_rotation_rad,
      max_translation_m: config.max_key_frame_translation_m,
      max_rotation_speed_rad_s: config.max_key_frame_rotation_speed_rad_s,
    }
  }

  /// Offer a frame; returns whether it was kept.
  pub fn consider(&mut self, frame: KeyFrame, rotation_speed_rad_s: f32) -> bool {
    if rotation_speed_rad_s > self.max_rotation_speed_rad_s {
      return false;
    }
    let moved_enough = match self.frames.last() {
      None => true,
      Some(prev) => {
        prev.rotation_to(&frame) > self.max_rotation_rad
          || prev.translation_to(&frame) > self.max_translation_m
      }
    };
    if !moved_enough {
      return false;
    }
    if self.frames.len() >= self.max_frames {
      self.frames.remove(0);
    }
    self.frames.push(frame);
    true
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn clear(&mut self) {
    self.frames.clear();
  }
}

impl KeyFrameManager for KeyFrameStore {
  fn get_key_frames(&self) -> Vec<KeyFrame> {
    self.frames.clone()
  }
}
