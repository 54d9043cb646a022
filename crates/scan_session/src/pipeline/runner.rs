//! Enhancement run controller.
//!
//! Non-blocking: stages run on rayon's thread pool, results and progress
//! come back over channels, and the foreground drives chaining by calling
//! [`EnhancementPipeline::poll`] each tick. Chain transitions happen
//! strictly on the foreground — the job guard is released by the finished
//! stage and re-acquired for the next one, never held across stages.

use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};
use tracing::{debug, warn};
use web_time::Instant;

use super::types::{external_progress, EntryStage, PipelineEvent, StageKind};
use crate::error::{JobError, ScanError};
use crate::job::{CancelFlag, JobContext, JobGuard};
use crate::options::{ColorizeParams, SessionConfig};
use crate::slam::{Colorizer, HoleFiller, Scene};
use crate::types::{KeyFrame, ScanMesh};

/// Terminal message from a stage worker.
struct StageResult {
  stage: StageKind,
  outcome: Result<ScanMesh, JobError>,
  elapsed_us: u64,
}

/// Work captured for one background stage. Owns everything the worker
/// needs; the mesh moves in and the result mesh moves back out.
enum StageJob {
  HoleFill {
    service: Arc<dyn HoleFiller>,
    mesh: ScanMesh,
  },
  Colorize {
    service: Arc<dyn Colorizer>,
    mesh: ScanMesh,
    scene: Arc<dyn Scene>,
    keyframes: Arc<[KeyFrame]>,
    params: ColorizeParams,
  },
}

impl StageJob {
  fn run(self, ctx: &JobContext) -> Result<ScanMesh, JobError> {
    match self {
      StageJob::HoleFill { service, mesh } => service.fill_holes(&mesh, ctx),
      StageJob::Colorize {
        service,
        mesh,
        scene,
        keyframes,
        params,
      } => service.colorize(&mesh, &scene, &keyframes, &params, ctx),
    }
  }
}

/// Inputs shared by every stage of one run, snapshotted at request time.
/// A stage in flight is never affected by a later option change.
struct RunShared {
  scene: Arc<dyn Scene>,
  keyframes: Arc<[KeyFrame]>,
  naive_params: ColorizeParams,
  enhanced_params: ColorizeParams,
}

/// State of the in-flight enhancement run.
struct ActiveRun {
  entry: EntryStage,
  stage: StageKind,
  progress_rx: Receiver<f32>,
  result_rx: Receiver<StageResult>,
  shared: RunShared,

  /// The mesh the enhanced stage re-colorizes from. For a colorize entry
  /// this is the request input; a hole-fill entry replaces it with the
  /// filled mesh when chaining.
  original: ScanMesh,

  /// Set by `cancel`; discards any later outcome and blocks chaining.
  cancelled: bool,

  /// Highest external progress emitted so far; keeps the combined scale
  /// monotonic across stage boundaries.
  last_progress: f32,
}

/// Single-flight mesh enhancement pipeline.
///
/// Runs up to three chained stages — hole-fill, naive colorize, enhanced
/// colorize — with at most one stage in flight at any time, enforced via
/// the [`JobGuard`]. Stage ordering is total: a stage starts only after the
/// previous one reported success through `poll`.
pub struct EnhancementPipeline {
  guard: JobGuard,
  hole_filler: Arc<dyn HoleFiller>,
  colorizer: Arc<dyn Colorizer>,
  run: Option<ActiveRun>,
}

impl EnhancementPipeline {
  pub fn new(hole_filler: Arc<dyn HoleFiller>, colorizer: Arc<dyn Colorizer>) -> Self {
    Self {
      guard: JobGuard::new(),
      hole_filler,
      colorizer,
      run: None,
    }
  }

  /// Whether a run is active (including one winding down after `cancel`).
  pub fn is_busy(&self) -> bool {
    self.run.is_some()
  }

  /// The stage currently in flight, if the run has not been cancelled.
  pub fn active_stage(&self) -> Option<StageKind> {
    self
      .run
      .as_ref()
      .filter(|run| !run.cancelled)
      .map(|run| run.stage)
  }

  /// Start an enhancement run (non-blocking).
  ///
  /// The mesh moves into the run; keyframes and colorize parameters are
  /// snapshotted here and never re-read.
  pub fn request(
    &mut self,
    entry: EntryStage,
    mesh: ScanMesh,
    scene: Arc<dyn Scene>,
    keyframes: Vec<KeyFrame>,
    config: &SessionConfig,
  ) -> Result<(), ScanError> {
    if let Some(run) = &self.run {
      return Err(if run.cancelled {
        ScanError::ResetInProgress
      } else {
        ScanError::GuardRejected
      });
    }

    let first_stage = match entry {
      EntryStage::HoleFill => StageKind::HoleFill,
      EntryStage::Colorize => StageKind::ColorizeNaive,
    };
    let shared = RunShared {
      scene,
      keyframes: keyframes.into(),
      naive_params: ColorizeParams::naive(config),
      enhanced_params: ColorizeParams::enhanced(config),
    };

    let flag = self.guard.try_start()?;
    let job = self.make_job(first_stage, mesh.clone(), &shared);
    let (progress_rx, result_rx) = spawn_stage(first_stage, job, flag);
    debug!(stage = %first_stage, "enhancement run started");

    self.run = Some(ActiveRun {
      entry,
      stage: first_stage,
      progress_rx,
      result_rx,
      shared,
      original: mesh,
      cancelled: false,
      last_progress: 0.0,
    });
    Ok(())
  }

  /// Cancel the active run, if any. Idempotent.
  ///
  /// The worker observes the flag at its next checkpoint; any outcome it
  /// still delivers — including a success that raced the cancel — is
  /// discarded, and no chained stage starts. The only event the caller
  /// sees afterwards is a single [`PipelineEvent::Cancelled`].
  pub fn cancel(&mut self) {
    if let Some(run) = self.run.as_mut() {
      if !run.cancelled {
        debug!(stage = %run.stage, "cancelling enhancement run");
        run.cancelled = true;
        self.guard.cancel_active();
      }
    }
  }

  /// Drain progress and stage outcomes, performing chain transitions.
  ///
  /// Call from the foreground control flow each tick.
  pub fn poll(&mut self) -> Vec<PipelineEvent> {
    let mut events = Vec::new();

    let Some(run) = self.run.as_mut() else {
      return events;
    };

    if !run.cancelled {
      while let Ok(local) = run.progress_rx.try_recv() {
        let mapped = external_progress(run.entry, run.stage, local);
        if mapped > run.last_progress {
          run.last_progress = mapped;
          events.push(PipelineEvent::Progress(mapped));
        }
      }
    }

    let result = match run.result_rx.try_recv() {
      Ok(result) => result,
      Err(TryRecvError::Empty) => return events,
      Err(TryRecvError::Disconnected) => StageResult {
        stage: run.stage,
        outcome: Err(JobError::Failed("stage worker disconnected".into())),
        elapsed_us: 0,
      },
    };

    // The stage is terminal either way; free the guard before deciding
    // whether a chained stage re-acquires it.
    self.guard.clear();
    self.handle_stage_result(result, &mut events);
    events
  }

  fn handle_stage_result(&mut self, result: StageResult, events: &mut Vec<PipelineEvent>) {
    let Some(mut run) = self.run.take() else {
      return;
    };

    if run.cancelled {
      debug!(stage = %result.stage, "discarding outcome of cancelled run");
      events.push(PipelineEvent::Cancelled);
      return;
    }

    let mesh = match result.outcome {
      Ok(mesh) => {
        debug!(stage = %result.stage, elapsed_us = result.elapsed_us, "stage succeeded");
        mesh
      }
      Err(JobError::Cancelled) => {
        events.push(PipelineEvent::Cancelled);
        return;
      }
      Err(JobError::Failed(reason)) => {
        warn!(stage = %result.stage, reason = %reason, "stage failed, halting chain");
        events.push(PipelineEvent::Failed {
          stage: result.stage,
          reason,
        });
        return;
      }
    };

    match result.stage {
      StageKind::HoleFill => {
        events.push(PipelineEvent::HoleFilled(mesh.clone()));
        if mesh.is_colorized() {
          // The filled mesh already carries color; nothing to colorize.
          events.push(PipelineEvent::Completed(mesh));
        } else {
          // Policy: an uncolored hole-fill result always chains into
          // colorizing; there is no hole-fill-only path.
          run.original = mesh.clone();
          self.chain_into(run, StageKind::ColorizeNaive, mesh, events);
        }
      }
      StageKind::ColorizeNaive => {
        events.push(PipelineEvent::Preview(mesh));
        let original = run.original.clone();
        self.chain_into(run, StageKind::ColorizeEnhanced, original, events);
      }
      StageKind::ColorizeEnhanced => {
        events.push(PipelineEvent::Completed(mesh));
      }
    }
  }

  fn chain_into(
    &mut self,
    mut run: ActiveRun,
    stage: StageKind,
    mesh: ScanMesh,
    events: &mut Vec<PipelineEvent>,
  ) {
    let flag = match self.guard.try_start() {
      Ok(flag) => flag,
      Err(_) => {
        // Unreachable in practice: the guard was cleared just above.
        events.push(PipelineEvent::Failed {
          stage,
          reason: "job guard rejected chained stage".into(),
        });
        return;
      }
    };

    let job = self.make_job(stage, mesh, &run.shared);
    let (progress_rx, result_rx) = spawn_stage(stage, job, flag);
    debug!(stage = %stage, "chained into next stage");

    run.stage = stage;
    run.progress_rx = progress_rx;
    run.result_rx = result_rx;
    self.run = Some(run);
  }

  fn make_job(&self, stage: StageKind, mesh: ScanMesh, shared: &RunShared) -> StageJob {
    match stage {
      StageKind::HoleFill => StageJob::HoleFill {
        service: Arc::clone(&self.hole_filler),
        mesh,
      },
      StageKind::ColorizeNaive => StageJob::Colorize {
        service: Arc::clone(&self.colorizer),
        mesh,
        scene: Arc::clone(&shared.scene),
        keyframes: Arc::clone(&shared.keyframes),
        params: shared.naive_params.clone(),
      },
      StageKind::ColorizeEnhanced => StageJob::Colorize {
        service: Arc::clone(&self.colorizer),
        mesh,
        scene: Arc::clone(&shared.scene),
        keyframes: Arc::clone(&shared.keyframes),
        params: shared.enhanced_params.clone(),
      },
    }
  }
}

/// Spawn one stage on rayon's thread pool, returning its channels.
fn spawn_stage(
  stage: StageKind,
  job: StageJob,
  flag: CancelFlag,
) -> (Receiver<f32>, Receiver<StageResult>) {
  let (progress_tx, progress_rx) = channel::unbounded();
  let (result_tx, result_rx) = channel::bounded(1);
  let ctx = JobContext::new(flag, progress_tx);

  rayon::spawn(move || {
    let start = Instant::now();
    let outcome = job.run(&ctx);
    let elapsed_us = start.elapsed().as_micros() as u64;
    // Ignore send error (receiver dropped = run discarded).
    let _ = result_tx.send(StageResult {
      stage,
      outcome,
      elapsed_us,
    });
  });

  (progress_rx, result_rx)
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod runner_test;
