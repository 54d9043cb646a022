//! Pipeline I/O types and the external progress scale.

use std::fmt;

use crate::types::ScanMesh;

/// Where an enhancement run enters the stage chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStage {
  /// Patch holes first; chains into colorizing when the filled mesh has no
  /// color of its own.
  HoleFill,

  /// Go straight to colorizing.
  Colorize,
}

/// One background stage of the enhancement chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
  HoleFill,
  ColorizeNaive,
  ColorizeEnhanced,
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      StageKind::HoleFill => "hole-fill",
      StageKind::ColorizeNaive => "naive-colorize",
      StageKind::ColorizeEnhanced => "enhanced-colorize",
    };
    f.write_str(name)
  }
}

/// Events drained from the pipeline by the foreground control flow.
#[derive(Debug)]
pub enum PipelineEvent {
  /// Combined progress across all stages of the run, in [0, 1], monotonic.
  Progress(f32),

  /// Hole filling finished; the patched mesh is available. Emitted before
  /// any chained colorize stage starts.
  HoleFilled(ScanMesh),

  /// The naive colorize stage finished; this mesh is good enough to
  /// display while the enhanced stage runs.
  Preview(ScanMesh),

  /// The run finished; this is the final mesh.
  Completed(ScanMesh),

  /// A stage failed and the chain halted. Any earlier preview result
  /// stands; it is not retracted.
  Failed { stage: StageKind, reason: String },

  /// The run was cancelled; no further events follow.
  Cancelled,
}

// =============================================================================
// Progress remapping
// =============================================================================

/// End of the hole-fill band on the external progress scale.
pub const HOLE_FILL_BAND_END: f32 = 0.1;

/// End of the naive-colorize band; the remainder belongs to the enhanced
/// stage. Policy constants, not structural: the splits only shape how the
/// run presents as one continuous progress indication.
pub const NAIVE_BAND_END: f32 = 0.2;

/// Band of the external scale a stage occupies, given the run's entry point.
fn band(entry: EntryStage, stage: StageKind) -> (f32, f32) {
  match (entry, stage) {
    (EntryStage::HoleFill, StageKind::HoleFill) => (0.0, HOLE_FILL_BAND_END),
    (EntryStage::HoleFill, StageKind::ColorizeNaive) => (HOLE_FILL_BAND_END, NAIVE_BAND_END),
    (EntryStage::Colorize, StageKind::ColorizeNaive) => (0.0, NAIVE_BAND_END),
    (_, StageKind::ColorizeEnhanced) => (NAIVE_BAND_END, 1.0),
    // A colorize entry never runs the hole-fill stage.
    (EntryStage::Colorize, StageKind::HoleFill) => (0.0, 0.0),
  }
}

/// Map stage-local progress in [0, 1] onto the external scale.
pub fn external_progress(entry: EntryStage, stage: StageKind, local: f32) -> f32 {
  let (start, end) = band(entry, stage);
  start + (end - start) * local.clamp(0.0, 1.0)
}
