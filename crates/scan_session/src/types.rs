//! Core data types for the capture session.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

/// Camera pose as a rigid transform in world space.
pub type Pose = Mat4;

/// Smallest accepted scanning volume edge, in meters.
pub const MIN_VOLUME_SIZE_M: f32 = 0.1;

/// Largest accepted scanning volume edge, in meters.
pub const MAX_VOLUME_SIZE_M: f32 = 3.0;

/// Lifecycle state of a capture session.
///
/// Exactly one state is active at a time; the session's transition methods
/// are the only way to change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
  /// Placing the scanning volume cube; waiting for a valid initial pose.
  CubePlacement,

  /// Actively scanning; sensor frames feed the tracker and mapper.
  Scanning,

  /// Scan finished; the finalized mesh is being viewed and may be enhanced.
  Viewing,
}

impl SessionState {
  /// True exactly when the sensor stream should be connected.
  pub fn needs_sensor(self) -> bool {
    matches!(self, SessionState::CubePlacement | SessionState::Scanning)
  }
}

/// Clamp a single volume axis into the accepted range.
///
/// NaN clamps to the minimum rather than propagating.
pub fn keep_in_range(value: f32, min_value: f32, max_value: f32) -> f32 {
  if value.is_nan() {
    return min_value;
  }
  value.clamp(min_value, max_value)
}

/// Clamp a volume size so every axis lies in
/// [`MIN_VOLUME_SIZE_M`, `MAX_VOLUME_SIZE_M`].
pub fn clamp_volume_size(size: Vec3) -> Vec3 {
  Vec3::new(
    keep_in_range(size.x, MIN_VOLUME_SIZE_M, MAX_VOLUME_SIZE_M),
    keep_in_range(size.y, MIN_VOLUME_SIZE_M, MAX_VOLUME_SIZE_M),
    keep_in_range(size.z, MIN_VOLUME_SIZE_M, MAX_VOLUME_SIZE_M),
  )
}

/// Gesture-driven scale applied to the initial volume size.
///
/// The multiplier is clamped so a runaway pinch cannot produce an absurd
/// volume before the per-axis clamp even runs.
#[derive(Clone, Copy, Debug)]
pub struct VolumeScale {
  current: f32,
  initial_pinch: f32,
}

impl Default for VolumeScale {
  fn default() -> Self {
    Self {
      current: 1.0,
      initial_pinch: 1.0,
    }
  }
}

impl VolumeScale {
  const MIN_SCALE: f32 = 0.01;
  const MAX_SCALE: f32 = 1000.0;

  /// Record the gesture baseline at pinch start.
  pub fn begin(&mut self, gesture_scale: f32) {
    self.initial_pinch = self.current / gesture_scale;
  }

  /// Update the multiplier from the current gesture scale.
  ///
  /// A zero or NaN baseline is ignored (some gesture sources report a zero
  /// initial scale).
  pub fn update(&mut self, gesture_scale: f32) {
    if self.initial_pinch.is_nan() {
      return;
    }
    self.current = keep_in_range(
      gesture_scale * self.initial_pinch,
      Self::MIN_SCALE,
      Self::MAX_SCALE,
    );
  }

  /// Current multiplier over the initial volume size.
  pub fn factor(&self) -> f32 {
    self.current
  }
}

/// One IMU motion sample fed to the tracker.
#[derive(Clone, Copy, Debug)]
pub struct MotionSample {
  /// Gravity direction in device coordinates.
  pub gravity: Vec3,

  /// Angular velocity in radians per second.
  pub rotation_rate: Vec3,

  /// Sample timestamp in seconds.
  pub timestamp: f64,
}

/// A retained color frame plus the camera pose it was captured at.
///
/// Keyframes are what the colorizer projects onto the mesh; the session
/// keeps a bounded, motion-filtered set of them (see
/// [`crate::slam::KeyFrameStore`]).
#[derive(Clone, Debug)]
pub struct KeyFrame {
  /// Camera pose at capture time.
  pub pose: Pose,

  /// Capture timestamp in seconds.
  pub timestamp: f64,

  /// Encoded color image payload. Opaque to the session core.
  pub color_frame: std::sync::Arc<[u8]>,
}

impl KeyFrame {
  /// Rotation difference to another keyframe's pose, in radians.
  pub fn rotation_to(&self, other: &KeyFrame) -> f32 {
    let a = Quat::from_mat3(&Mat3::from_mat4(self.pose));
    let b = Quat::from_mat3(&Mat3::from_mat4(other.pose));
    a.angle_between(b)
  }

  /// Translation difference to another keyframe's pose, in meters.
  pub fn translation_to(&self, other: &KeyFrame) -> f32 {
    let a = self.pose.w_axis.truncate();
    let b = other.pose.w_axis.truncate();
    a.distance(b)
  }
}

/// Triangle mesh produced by the mapper and refined by the enhancement
/// pipeline.
///
/// Color information is optional: a freshly finalized scan carries geometry
/// only, the naive colorize stage adds per-vertex colors, and the enhanced
/// stage adds UV texture coordinates.
#[derive(Clone, Debug, Default)]
pub struct ScanMesh {
  /// Vertex positions in meters.
  pub positions: Vec<Vec3>,

  /// Per-vertex unit normals.
  pub normals: Vec<Vec3>,

  /// Triangle indices, three per face.
  pub indices: Vec<u32>,

  /// Per-vertex RGB colors, if colorized.
  pub colors: Option<Vec<Vec3>>,

  /// Per-vertex UV texture coordinates, if texture-mapped.
  pub uvs: Option<Vec<Vec2>>,
}

impl ScanMesh {
  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  pub fn has_per_vertex_colors(&self) -> bool {
    self.colors.as_ref().is_some_and(|c| !c.is_empty())
  }

  pub fn has_per_vertex_uvs(&self) -> bool {
    self.uvs.as_ref().is_some_and(|uv| !uv.is_empty())
  }

  /// Whether the mesh already carries any color information.
  ///
  /// A hole-filled mesh that reports true here terminates the enhancement
  /// chain without re-colorizing.
  pub fn is_colorized(&self) -> bool {
    self.has_per_vertex_colors() || self.has_per_vertex_uvs()
  }

  /// Estimate the mesh center by sampling roughly `budget` vertices.
  ///
  /// Falls back to `fallback` for an empty mesh.
  pub fn estimate_center(&self, budget: usize, fallback: Vec3) -> Vec3 {
    if self.positions.is_empty() || budget == 0 {
      return fallback;
    }
    let step = (self.positions.len() / budget).max(1);
    let mut sum = Vec3::ZERO;
    let mut count = 0u32;
    for p in self.positions.iter().step_by(step) {
      sum += *p;
      count += 1;
    }
    sum / count as f32
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
