//! Shared mock collaborators for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec2, Vec3};

use crate::error::JobError;
use crate::job::JobContext;
use crate::options::{CaptureOptions, ColorizeMode, ColorizeParams, SessionConfig};
use crate::sensor::{ColorCamera, SensorStatus, SensorStream};
use crate::slam::{
  Colorizer, HoleFiller, KeyFrameManager, Mapper, PoseInitializer, Scene, SlamContext, SlamFactory,
  Tracker,
};
use crate::types::{KeyFrame, MotionSample, Pose, ScanMesh};

/// A plain geometry-only mesh.
pub fn gray_mesh() -> ScanMesh {
  ScanMesh {
    positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
    normals: vec![Vec3::Z; 4],
    indices: vec![0, 1, 2, 0, 2, 3],
    ..ScanMesh::default()
  }
}

/// Attach per-vertex colors to a mesh.
pub fn with_colors(mut mesh: ScanMesh) -> ScanMesh {
  mesh.colors = Some(vec![Vec3::ONE; mesh.positions.len()]);
  mesh
}

/// Attach UV coordinates to a mesh.
pub fn with_uvs(mut mesh: ScanMesh) -> ScanMesh {
  mesh.uvs = Some(vec![Vec2::ZERO; mesh.positions.len()]);
  mesh
}

pub fn key_frame(timestamp: f64) -> KeyFrame {
  KeyFrame {
    pose: Mat4::IDENTITY,
    timestamp,
    color_frame: Arc::from(Vec::<u8>::new()),
  }
}

/// Poll `done` with a short sleep until it returns true, bounded.
pub fn poll_until<F: FnMut() -> bool>(mut done: F) -> bool {
  for _ in 0..15000 {
    if done() {
      return true;
    }
    std::thread::sleep(std::time::Duration::from_millis(1));
  }
  false
}

// =============================================================================
// SLAM mocks - shared probe so tests can steer and observe a rebuilt context
// =============================================================================

/// Observation point shared by every mock a [`MockSlamFactory`] builds.
#[derive(Debug)]
pub struct SlamProbe {
  pub pose_valid: AtomicBool,
  pub builds: AtomicUsize,
  pub volume_sizes: Mutex<Vec<Vec3>>,
  pub initial_poses_set: AtomicUsize,
  pub scans_prepared: AtomicUsize,
  pub meshes_finalized: AtomicUsize,
  pub mesh_locks: AtomicUsize,
  pub mesh_unlocks: AtomicUsize,
  pub motion_samples: AtomicUsize,
  pub scan_mesh: Mutex<ScanMesh>,
  pub key_frames: Mutex<Vec<KeyFrame>>,
  pub last_options: Mutex<Option<CaptureOptions>>,
}

impl Default for SlamProbe {
  fn default() -> Self {
    Self {
      pose_valid: AtomicBool::new(true),
      builds: AtomicUsize::new(0),
      volume_sizes: Mutex::new(Vec::new()),
      initial_poses_set: AtomicUsize::new(0),
      scans_prepared: AtomicUsize::new(0),
      meshes_finalized: AtomicUsize::new(0),
      mesh_locks: AtomicUsize::new(0),
      mesh_unlocks: AtomicUsize::new(0),
      motion_samples: AtomicUsize::new(0),
      scan_mesh: Mutex::new(gray_mesh()),
      key_frames: Mutex::new(vec![key_frame(0.0)]),
      last_options: Mutex::new(None),
    }
  }
}

impl SlamProbe {
  pub fn last_volume_size(&self) -> Option<Vec3> {
    self.volume_sizes.lock().unwrap().last().copied()
  }
}

pub struct MockPoseInitializer(pub Arc<SlamProbe>);

impl PoseInitializer for MockPoseInitializer {
  fn has_valid_pose(&self) -> bool {
    self.0.pose_valid.load(Ordering::Relaxed)
  }

  fn camera_pose(&self) -> Pose {
    Mat4::IDENTITY
  }

  fn set_volume_size(&mut self, size: Vec3) {
    self.0.volume_sizes.lock().unwrap().push(size);
  }
}

pub struct MockTracker(pub Arc<SlamProbe>);

impl Tracker for MockTracker {
  fn set_initial_pose(&mut self, _pose: Pose) {
    self.0.initial_poses_set.fetch_add(1, Ordering::Relaxed);
  }

  fn update_camera_pose(&mut self, _sample: &MotionSample) {
    self.0.motion_samples.fetch_add(1, Ordering::Relaxed);
  }
}

pub struct MockMapper(pub Arc<SlamProbe>);

impl Mapper for MockMapper {
  fn prepare_for_scan(&mut self) {
    self.0.scans_prepared.fetch_add(1, Ordering::Relaxed);
  }

  fn finalize_triangle_mesh(&mut self) {
    self.0.meshes_finalized.fetch_add(1, Ordering::Relaxed);
  }
}

pub struct MockScene(pub Arc<SlamProbe>);

impl Scene for MockScene {
  fn lock_and_get_mesh(&self) -> ScanMesh {
    self.0.mesh_locks.fetch_add(1, Ordering::Relaxed);
    self.0.scan_mesh.lock().unwrap().clone()
  }

  fn unlock_mesh(&self) {
    self.0.mesh_unlocks.fetch_add(1, Ordering::Relaxed);
  }
}

pub struct MockKeyFrames(pub Arc<SlamProbe>);

impl KeyFrameManager for MockKeyFrames {
  fn get_key_frames(&self) -> Vec<KeyFrame> {
    self.0.key_frames.lock().unwrap().clone()
  }
}

pub struct MockSlamFactory(pub Arc<SlamProbe>);

impl SlamFactory for MockSlamFactory {
  fn build(&self, options: &CaptureOptions, _config: &SessionConfig) -> SlamContext {
    self.0.builds.fetch_add(1, Ordering::Relaxed);
    *self.0.last_options.lock().unwrap() = Some(*options);
    SlamContext {
      pose_initializer: Box::new(MockPoseInitializer(Arc::clone(&self.0))),
      tracker: Box::new(MockTracker(Arc::clone(&self.0))),
      mapper: Box::new(MockMapper(Arc::clone(&self.0))),
      scene: Arc::new(MockScene(Arc::clone(&self.0))),
      key_frames: Box::new(MockKeyFrames(Arc::clone(&self.0))),
    }
  }
}

// =============================================================================
// Sensor mocks
// =============================================================================

#[derive(Debug)]
pub struct SensorProbe {
  pub streaming: AtomicBool,
  pub connected_and_charged: AtomicBool,
  pub status: Mutex<SensorStatus>,
  pub starts: AtomicUsize,
  pub stops: AtomicUsize,
}

impl Default for SensorProbe {
  fn default() -> Self {
    Self {
      streaming: AtomicBool::new(false),
      connected_and_charged: AtomicBool::new(true),
      status: Mutex::new(SensorStatus::Ok),
      starts: AtomicUsize::new(0),
      stops: AtomicUsize::new(0),
    }
  }
}

pub struct MockSensor(pub Arc<SensorProbe>);

impl SensorStream for MockSensor {
  fn start_streaming(&mut self) {
    self.0.streaming.store(true, Ordering::Relaxed);
    self.0.starts.fetch_add(1, Ordering::Relaxed);
  }

  fn stop_streaming(&mut self) {
    self.0.streaming.store(false, Ordering::Relaxed);
    self.0.stops.fetch_add(1, Ordering::Relaxed);
  }

  fn is_connected_and_charged(&self) -> bool {
    self.0.connected_and_charged.load(Ordering::Relaxed)
  }

  fn status(&self) -> SensorStatus {
    *self.0.status.lock().unwrap()
  }
}

#[derive(Debug, Default)]
pub struct CameraProbe {
  pub running: AtomicBool,
  pub high_res: AtomicBool,
  pub scanning_params: AtomicBool,
  pub starts: AtomicUsize,
  pub stops: AtomicUsize,
}

pub struct MockCamera(pub Arc<CameraProbe>);

impl ColorCamera for MockCamera {
  fn start(&mut self, high_res: bool) {
    self.0.running.store(true, Ordering::Relaxed);
    self.0.high_res.store(high_res, Ordering::Relaxed);
    self.0.starts.fetch_add(1, Ordering::Relaxed);
  }

  fn stop(&mut self) {
    self.0.running.store(false, Ordering::Relaxed);
    self.0.stops.fetch_add(1, Ordering::Relaxed);
  }

  fn set_params_for_init(&mut self) {
    self.0.scanning_params.store(false, Ordering::Relaxed);
  }

  fn set_params_for_scanning(&mut self) {
    self.0.scanning_params.store(true, Ordering::Relaxed);
  }
}

// =============================================================================
// Enhancement service mocks
// =============================================================================

/// How a mock service behaves when invoked.
#[derive(Clone, Debug)]
pub enum ServiceBehavior {
  /// Report progress twice, then succeed.
  Succeed,

  /// Fail with the given reason.
  Fail(String),

  /// Spin at the cancellation checkpoint until cancelled (bounded so a
  /// broken test cannot hang forever).
  BlockUntilCancelled,
}

fn run_behavior(behavior: &ServiceBehavior, ctx: &JobContext) -> Result<(), JobError> {
  match behavior {
    ServiceBehavior::Succeed => {
      ctx.report(0.5)?;
      ctx.report(1.0)?;
      Ok(())
    }
    ServiceBehavior::Fail(reason) => Err(JobError::Failed(reason.clone())),
    ServiceBehavior::BlockUntilCancelled => {
      for _ in 0..10_000 {
        ctx.checkpoint()?;
        std::thread::sleep(std::time::Duration::from_millis(1));
      }
      Err(JobError::Failed("mock was never cancelled".into()))
    }
  }
}

pub struct MockHoleFiller {
  pub behavior: ServiceBehavior,
  /// Whether the filled mesh should come back already colorized.
  pub colorized_output: bool,
  pub calls: AtomicUsize,
}

impl MockHoleFiller {
  pub fn new(behavior: ServiceBehavior) -> Self {
    Self {
      behavior,
      colorized_output: false,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn colorized(behavior: ServiceBehavior) -> Self {
    Self {
      colorized_output: true,
      ..Self::new(behavior)
    }
  }
}

impl HoleFiller for MockHoleFiller {
  fn fill_holes(&self, mesh: &ScanMesh, ctx: &JobContext) -> Result<ScanMesh, JobError> {
    self.calls.fetch_add(1, Ordering::Relaxed);
    run_behavior(&self.behavior, ctx)?;
    let filled = mesh.clone();
    Ok(if self.colorized_output {
      with_colors(filled)
    } else {
      filled
    })
  }
}

pub struct MockColorizer {
  pub naive_behavior: ServiceBehavior,
  pub enhanced_behavior: ServiceBehavior,
  pub naive_calls: AtomicUsize,
  pub enhanced_calls: AtomicUsize,
}

impl MockColorizer {
  pub fn new(naive: ServiceBehavior, enhanced: ServiceBehavior) -> Self {
    Self {
      naive_behavior: naive,
      enhanced_behavior: enhanced,
      naive_calls: AtomicUsize::new(0),
      enhanced_calls: AtomicUsize::new(0),
    }
  }

  pub fn succeeding() -> Self {
    Self::new(ServiceBehavior::Succeed, ServiceBehavior::Succeed)
  }
}

impl Colorizer for MockColorizer {
  fn colorize(
    &self,
    mesh: &ScanMesh,
    _scene: &Arc<dyn Scene>,
    _keyframes: &[KeyFrame],
    params: &ColorizeParams,
    ctx: &JobContext,
  ) -> Result<ScanMesh, JobError> {
    let behavior = match params.mode {
      ColorizeMode::PerVertex => {
        self.naive_calls.fetch_add(1, Ordering::Relaxed);
        &self.naive_behavior
      }
      ColorizeMode::TextureMapForObject => {
        self.enhanced_calls.fetch_add(1, Ordering::Relaxed);
        &self.enhanced_behavior
      }
    };
    run_behavior(behavior, ctx)?;
    Ok(match params.mode {
      ColorizeMode::PerVertex => with_colors(mesh.clone()),
      ColorizeMode::TextureMapForObject => with_uvs(mesh.clone()),
    })
  }
}
