//! Capture options and static session configuration.

use glam::Vec3;

/// Per-session capture configuration snapshot.
///
/// Changing any field invalidates the current tracker/mapper and forces a
/// full session reset (see [`crate::session::ScanSession::set_option`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
  /// Use the newer depth-based tracker instead of the legacy one.
  pub use_new_tracker: bool,

  /// Stream high-resolution color frames.
  pub high_res_color: bool,

  /// Use the newer mapper implementation.
  pub use_new_mapper: bool,

  /// Map at high voxel resolution.
  pub high_res_mapping: bool,
}

impl Default for CaptureOptions {
  fn default() -> Self {
    Self {
      use_new_tracker: true,
      high_res_color: false,
      use_new_mapper: true,
      high_res_mapping: true,
    }
  }
}

/// A single capture-option change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOption {
  UseNewTracker(bool),
  HighResColor(bool),
  UseNewMapper(bool),
  HighResMapping(bool),
}

impl CaptureOptions {
  /// Apply one option change, returning whether any field actually changed.
  pub fn apply(&mut self, option: CaptureOption) -> bool {
    let before = *self;
    match option {
      CaptureOption::UseNewTracker(v) => self.use_new_tracker = v,
      CaptureOption::HighResColor(v) => self.high_res_color = v,
      CaptureOption::UseNewMapper(v) => self.use_new_mapper = v,
      CaptureOption::HighResMapping(v) => self.high_res_mapping = v,
    }
    *self != before
  }
}

/// Colorizer fidelity setting for the enhanced stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorizerQuality {
  Low,
  Normal,
  High,
}

/// Static tunables for a scanning session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
  /// Initial scanning volume size in meters
  /// (X is left-right, Y is up-down, Z is forward-back).
  pub init_volume_size_m: Vec3,

  /// Maximum number of keyframes retained for colorizing.
  pub max_key_frames: usize,

  /// Colorizer quality for the enhanced stage.
  pub colorizer_quality: ColorizerQuality,

  /// Target face count of the final textured mesh.
  pub colorizer_target_faces: usize,

  /// Take a new keyframe if the rotation difference exceeds this, in radians.
  pub max_key_frame_rotation_rad: f32,

  /// Take a new keyframe if the translation difference exceeds this, in
  /// meters.
  pub max_key_frame_translation_m: f32,

  /// Rotation speed above which a frame is rejected as a keyframe, in
  /// radians per second. Avoids keyframes with strong motion blur or
  /// rolling shutter.
  pub max_key_frame_rotation_speed_rad_s: f32,

  /// Whether the colorizer should try harder to preserve the appearance of
  /// the first keyframe. Recommended for face scans.
  pub prioritize_first_frame_color: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      init_volume_size_m: Vec3::splat(0.5),
      max_key_frames: 48,
      colorizer_quality: ColorizerQuality::High,
      colorizer_target_faces: 30_000,
      max_key_frame_rotation_rad: 20.0_f32.to_radians(),
      max_key_frame_translation_m: 0.3,
      max_key_frame_rotation_speed_rad_s: 1.0_f32.to_radians(),
      prioritize_first_frame_color: true,
    }
  }
}

/// How a colorize stage should paint the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorizeMode {
  /// Fast per-vertex colors; good enough for an immediate preview.
  PerVertex,

  /// Texture-mapped output with mesh decimation to a target face count.
  TextureMapForObject,
}

/// Parameter snapshot handed to a colorize stage.
///
/// Captured once when an enhancement run starts; a stage in flight is never
/// affected by a later option or config change.
#[derive(Clone, Debug)]
pub struct ColorizeParams {
  pub mode: ColorizeMode,
  pub quality: ColorizerQuality,
  pub target_faces: usize,
  pub prioritize_first_frame_color: bool,
}

impl ColorizeParams {
  /// Parameters for the naive (preview) stage.
  pub fn naive(config: &SessionConfig) -> Self {
    Self {
      mode: ColorizeMode::PerVertex,
      quality: config.colorizer_quality,
      target_faces: config.colorizer_target_faces,
      prioritize_first_frame_color: config.prioritize_first_frame_color,
    }
  }

  /// Parameters for the enhanced (final) stage.
  pub fn enhanced(config: &SessionConfig) -> Self {
    Self {
      mode: ColorizeMode::TextureMapForObject,
      ..Self::naive(config)
    }
  }
}
