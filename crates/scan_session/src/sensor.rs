//! Depth sensor and color camera collaborator interfaces.

/// Connection/charge status of the depth sensor, surfaced through session
/// events so a presentation layer can prompt the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorStatus {
  Ok,
  NeedsUserToConnect,
  NeedsUserToCharge,
}

/// The depth sensor stream.
///
/// Connected and streaming exactly while the session needs it (cube
/// placement and scanning).
pub trait SensorStream {
  fn start_streaming(&mut self);
  fn stop_streaming(&mut self);

  /// Whether the sensor is present and has charge. Feeds the idle-sleep
  /// decision.
  fn is_connected_and_charged(&self) -> bool;

  fn status(&self) -> SensorStatus;
}

/// The color camera used for keyframe capture.
///
/// Exposure is locked during scanning to keep coloring consistent across
/// keyframes.
pub trait ColorCamera {
  /// (Re)start capture. `high_res` follows the current capture options.
  fn start(&mut self, high_res: bool);

  fn stop(&mut self);

  /// Auto-exposure parameters suitable for cube placement.
  fn set_params_for_init(&mut self);

  /// Locked-exposure parameters for scanning.
  fn set_params_for_scanning(&mut self);
}
