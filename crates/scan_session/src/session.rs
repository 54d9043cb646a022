//! Capture session state machine.
//!
//! Owns the SLAM collaborators, the enhancement pipeline, and every piece
//! of cross-cutting session state (volume size, capture options, the
//! memory-pressure latch). All methods run on the foreground control flow;
//! transitions are synchronous and never interleave.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::options::{CaptureOption, CaptureOptions, SessionConfig};
use crate::pipeline::{EnhancementPipeline, EntryStage, PipelineEvent, StageKind};
use crate::sensor::{ColorCamera, SensorStatus, SensorStream};
use crate::slam::{Colorizer, HoleFiller, SlamContext, SlamFactory};
use crate::types::{clamp_volume_size, MotionSample, ScanMesh, SessionState, VolumeScale};

/// Corrective action tied to a memory-pressure alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressureAction {
  /// The enhanced colorize job was cancelled to free memory.
  ColorizeCancelled,

  /// Acknowledging will finish the scan early (implicit "done").
  ForceFinishScan,
}

/// Notifications drained by the presentation collaborator.
#[derive(Debug)]
pub enum SessionEvent {
  StateChanged {
    from: SessionState,
    to: SessionState,
  },

  /// The finalized mesh from the scan, produced on entry into viewing.
  MeshReady(ScanMesh),

  /// One-shot low-memory alert; further pressure signals are suppressed
  /// until acknowledged.
  MemoryPressure(PressureAction),

  SensorStatusChanged(SensorStatus),
}

/// The capture session core.
pub struct ScanSession {
  state: SessionState,
  config: SessionConfig,
  options: CaptureOptions,

  /// Current scanning volume size in meters, every axis clamped. Survives
  /// full resets: it is explicitly re-applied after each SLAM rebuild.
  volume: Vec3,
  volume_scale: VolumeScale,

  slam: SlamContext,
  factory: Box<dyn SlamFactory>,
  sensor: Box<dyn SensorStream>,
  color_camera: Option<Box<dyn ColorCamera>>,
  pipeline: EnhancementPipeline,

  /// Memory-pressure latch; true while an alert awaits acknowledgment.
  pressure_latched: bool,
  pending_pressure: Option<PressureAction>,

  last_gravity: Vec3,
  last_sensor_status: SensorStatus,
  events: VecDeque<SessionEvent>,
}

impl ScanSession {
  pub fn new(
    factory: Box<dyn SlamFactory>,
    sensor: Box<dyn SensorStream>,
    color_camera: Option<Box<dyn ColorCamera>>,
    hole_filler: Arc<dyn HoleFiller>,
    colorizer: Arc<dyn Colorizer>,
    config: SessionConfig,
  ) -> Self {
    let options = CaptureOptions::default();
    let slam = factory.build(&options, &config);
    let volume = clamp_volume_size(config.init_volume_size_m);
    let last_sensor_status = sensor.status();

    let mut session = Self {
      state: SessionState::CubePlacement,
      config,
      options,
      volume,
      volume_scale: VolumeScale::default(),
      slam,
      factory,
      sensor,
      color_camera,
      pipeline: EnhancementPipeline::new(hole_filler, colorizer),
      pressure_latched: false,
      pending_pressure: None,
      last_gravity: Vec3::ZERO,
      last_sensor_status,
      events: VecDeque::new(),
    };
    session.slam.pose_initializer.set_volume_size(volume);
    session
  }

  // ---------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn options(&self) -> CaptureOptions {
    self.options
  }

  pub fn volume_size(&self) -> Vec3 {
    self.volume
  }

  pub fn last_gravity(&self) -> Vec3 {
    self.last_gravity
  }

  /// Whether the sensor stream should currently be connected.
  pub fn needs_sensor(&self) -> bool {
    self.state.needs_sensor()
  }

  /// Whether the device may idle-sleep: only when the sensor data is not
  /// being consumed.
  pub fn idle_sleep_allowed(&self) -> bool {
    !(self.needs_sensor() && self.sensor.is_connected_and_charged())
  }

  /// Option toggles are locked while scanning.
  pub fn option_toggles_enabled(&self) -> bool {
    self.state != SessionState::Scanning
  }

  pub fn memory_pressure_latched(&self) -> bool {
    self.pressure_latched
  }

  /// Drain pending session notifications.
  pub fn drain_events(&mut self) -> Vec<SessionEvent> {
    self.events.drain(..).collect()
  }

  // ---------------------------------------------------------------------
  // State transitions
  // ---------------------------------------------------------------------

  /// Cube placement -> scanning.
  ///
  /// Rejected as a recoverable no-op when no valid initial pose exists
  /// yet.
  pub fn enter_scanning(&mut self) -> Result<(), ScanError> {
    if self.state != SessionState::CubePlacement {
      warn!(state = ?self.state, "ignoring enter_scanning outside cube placement");
      return Ok(());
    }
    if !self.slam.pose_initializer.has_valid_pose() {
      warn!("not entering the scanning state, initial pose is not valid");
      return Err(ScanError::InvalidPoseAtScanStart);
    }

    self.slam.mapper.prepare_for_scan();
    let pose = self.slam.pose_initializer.camera_pose();
    self.slam.tracker.set_initial_pose(pose);
    // Lock exposure during scanning to keep coloring consistent.
    if let Some(camera) = &mut self.color_camera {
      camera.set_params_for_scanning();
    }
    self.set_state(SessionState::Scanning);
    Ok(())
  }

  /// Scanning -> viewing: finalize the mesh and hand it out via
  /// [`SessionEvent::MeshReady`]. Enhancement is not auto-started.
  pub fn enter_viewing(&mut self) -> Result<(), ScanError> {
    if self.state != SessionState::Scanning {
      warn!(state = ?self.state, "ignoring enter_viewing outside scanning");
      return Ok(());
    }

    self.sensor.stop_streaming();
    if let Some(camera) = &mut self.color_camera {
      camera.stop();
    }
    self.slam.mapper.finalize_triangle_mesh();
    let mesh = self.slam.scene.lock_and_get_mesh();
    self.slam.scene.unlock_mesh();
    info!(
      vertices = mesh.vertex_count(),
      triangles = mesh.triangle_count(),
      "scan finalized"
    );

    self.set_state(SessionState::Viewing);
    self.events.push_back(SessionEvent::MeshReady(mesh));
    Ok(())
  }

  /// Full reset back to cube placement.
  ///
  /// Cancels any in-flight enhancement job, tears down and rebuilds the
  /// SLAM context, and re-applies the user-chosen volume size (the rebuild
  /// would otherwise reset it to defaults).
  pub fn reset_session(&mut self) {
    debug!(state = ?self.state, "resetting session");
    self.pipeline.cancel();
    self.slam = self.factory.build(&self.options, &self.config);
    self.enter_cube_placement();
    self.apply_volume_size(self.volume);
  }

  /// The viewing surface was dismissed: cancel enhancement work, resume
  /// the sensor stream, and reset back to cube placement.
  pub fn handle_viewer_dismissed(&mut self) {
    self.pipeline.cancel();
    self.resume_sensor();
    self.reset_session();
  }

  /// The process came back to the foreground.
  ///
  /// Reconnects the sensor when the current state needs it, and aborts a
  /// scan that was interrupted by backgrounding — tracking is unlikely to
  /// recover well.
  pub fn handle_app_became_active(&mut self) {
    if self.needs_sensor() {
      self.resume_sensor();
    }
    if self.state == SessionState::Scanning {
      self.reset_session();
    }
  }

  fn enter_cube_placement(&mut self) {
    if let Some(camera) = &mut self.color_camera {
      camera.set_params_for_init();
    }
    self.set_state(SessionState::CubePlacement);
  }

  fn resume_sensor(&mut self) {
    self.sensor.start_streaming();
    if let Some(camera) = &mut self.color_camera {
      camera.start(self.options.high_res_color);
    }
  }

  fn set_state(&mut self, to: SessionState) {
    if self.state != to {
      debug!(from = ?self.state, to = ?to, "session state changed");
      self.events.push_back(SessionEvent::StateChanged {
        from: self.state,
        to,
      });
      self.state = to;
    }
  }

  // ---------------------------------------------------------------------
  // Options & volume
  // ---------------------------------------------------------------------

  /// Change one capture option.
  ///
  /// Synchronously performs the full reconciliation: reset the session,
  /// rebuild the SLAM context with the new options, and re-apply the held
  /// volume size. No intermediate state is observable.
  pub fn set_option(&mut self, option: CaptureOption) {
    // Changing color resolution mid-stream is not supported; restart the
    // camera before the SLAM rebuild.
    if let CaptureOption::HighResColor(enabled) = option {
      if let Some(camera) = &mut self.color_camera {
        camera.stop();
        camera.start(enabled);
      }
    }
    self.options.apply(option);
    info!(options = ?self.options, "capture options changed, forcing full reset");
    self.reset_session();
  }

  /// Set the scanning volume size, clamping every axis into the accepted
  /// range. Returns the clamped value actually applied.
  pub fn set_volume_size(&mut self, size: Vec3) -> Vec3 {
    self.apply_volume_size(size)
  }

  fn apply_volume_size(&mut self, size: Vec3) -> Vec3 {
    let clamped = clamp_volume_size(size);
    self.volume = clamped;
    self.slam.pose_initializer.set_volume_size(clamped);
    clamped
  }

  /// Begin a pinch-to-scale gesture over the volume cube. Only meaningful
  /// during cube placement.
  pub fn begin_volume_scale(&mut self, gesture_scale: f32) {
    if self.state == SessionState::CubePlacement {
      self.volume_scale.begin(gesture_scale);
    }
  }

  /// Update an in-progress pinch gesture, rescaling the volume from its
  /// initial size.
  pub fn update_volume_scale(&mut self, gesture_scale: f32) {
    if self.state != SessionState::CubePlacement {
      return;
    }
    self.volume_scale.update(gesture_scale);
    let scaled = self.config.init_volume_size_m * self.volume_scale.factor();
    self.apply_volume_size(scaled);
  }

  // ---------------------------------------------------------------------
  // Sensor & motion
  // ---------------------------------------------------------------------

  /// Feed one IMU sample. Updates the gravity estimate during cube
  /// placement and forwards to the tracker while the sensor is in use.
  pub fn feed_motion(&mut self, sample: MotionSample) {
    if self.state == SessionState::CubePlacement {
      self.last_gravity = sample.gravity;
    }
    if self.needs_sensor() {
      self.slam.tracker.update_camera_pose(&sample);
    }
  }

  /// Re-read the sensor status and emit an event when it changed.
  pub fn refresh_sensor_status(&mut self) {
    let status = self.sensor.status();
    if status != self.last_sensor_status {
      self.last_sensor_status = status;
      self
        .events
        .push_back(SessionEvent::SensorStatusChanged(status));
    }
  }

  // ---------------------------------------------------------------------
  // Enhancement
  // ---------------------------------------------------------------------

  /// Start an enhancement run on the given mesh.
  ///
  /// Requires the viewing state; the keyframe set and colorize parameters
  /// are snapshotted at this point.
  pub fn request_enhancement(&mut self, entry: EntryStage, mesh: ScanMesh) -> Result<(), ScanError> {
    if self.state != SessionState::Viewing {
      return Err(ScanError::NotViewing);
    }
    let keyframes = self.slam.key_frames.get_key_frames();
    self.pipeline.request(
      entry,
      mesh,
      Arc::clone(&self.slam.scene),
      keyframes,
      &self.config,
    )
  }

  /// Cancel the active enhancement job, if any. No-op otherwise.
  pub fn cancel_active_job(&mut self) {
    self.pipeline.cancel();
  }

  /// Drain pipeline progress and results; drives stage chaining.
  pub fn poll_enhancement(&mut self) -> Vec<PipelineEvent> {
    self.pipeline.poll()
  }

  pub fn enhancement_busy(&self) -> bool {
    self.pipeline.is_busy()
  }

  // ---------------------------------------------------------------------
  // Memory pressure
  // ---------------------------------------------------------------------

  /// React to a low-memory signal.
  ///
  /// State-dependent: while viewing with an enhanced colorize in flight
  /// the job is cancelled; while scanning, acknowledgment will force the
  /// scan to finish. The latch suppresses duplicate alerts for the same
  /// unacknowledged event.
  pub fn handle_memory_pressure(&mut self) {
    if self.pressure_latched {
      return;
    }
    match self.state {
      SessionState::Viewing => {
        if self.pipeline.active_stage() == Some(StageKind::ColorizeEnhanced) {
          warn!("low memory while colorizing, cancelling the job");
          self.pipeline.cancel();
          self.latch_pressure(PressureAction::ColorizeCancelled);
        }
      }
      SessionState::Scanning => {
        warn!("low memory while scanning, scan will be stopped to avoid loss");
        self.latch_pressure(PressureAction::ForceFinishScan);
      }
      SessionState::CubePlacement => {}
    }
  }

  /// Acknowledge the pending memory-pressure alert, performing its
  /// corrective action. The latch only clears through this call.
  pub fn acknowledge_memory_pressure(&mut self) {
    if !self.pressure_latched {
      return;
    }
    self.pressure_latched = false;
    let pending = self.pending_pressure.take();
    if pending == Some(PressureAction::ForceFinishScan) && self.state == SessionState::Scanning {
      // Treated as an implicit "done".
      let _ = self.enter_viewing();
    }
  }

  fn latch_pressure(&mut self, action: PressureAction) {
    self.pressure_latched = true;
    self.pending_pressure = Some(action);
    self.events.push_back(SessionEvent::MemoryPressure(action));
  }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
