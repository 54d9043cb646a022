//! Mesh Enhancement Pipeline
//!
//! A mesh flows through up to three chained background stages:
//!
//! ```text
//! ┌───────────┐      ┌────────────────┐      ┌───────────────────┐
//! │ Hole-fill ├─────►│ Naive colorize ├─────►│ Enhanced colorize │
//! └───────────┘      └────────────────┘      └───────────────────┘
//!   (optional          per-vertex color,       texture-mapped,
//!    entry point)      preview fires here      final result
//! ```
//!
//! - A hole-fill entry terminates early when the filled mesh already
//!   carries color; otherwise it chains into colorizing.
//! - Naive colorize success fires the preview immediately and chains into
//!   the enhanced stage using the original (pre-naive) mesh plus the
//!   retained keyframes.
//! - A stage failure halts the chain; the last successful result stands.
//!
//! Only one stage is ever in flight, enforced through the
//! [`crate::job::JobGuard`]. Stage-local progress is remapped onto one
//! external scale so the whole run presents as a single progress
//! indication.

pub mod runner;
pub mod types;

// Re-exports
pub use runner::EnhancementPipeline;
pub use types::{
  external_progress, EntryStage, PipelineEvent, StageKind, HOLE_FILL_BAND_END, NAIVE_BAND_END,
};
