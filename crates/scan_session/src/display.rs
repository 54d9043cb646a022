//! Display-mode dispatch.
//!
//! Maps the viewer's display mode to the rendering mode the mesh can
//! satisfy right now and, when it cannot, to the pipeline entry stage that
//! would produce the missing data.

use crate::pipeline::EntryStage;
use crate::types::ScanMesh;

/// What the viewer asked to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
  XRay,
  LightedGray,
  Color,
  HoleFill,
}

/// How the renderer should draw the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderingMode {
  XRay,
  LightedGray,
  PerVertexColor,
  Textured,
}

/// Best color rendering mode the mesh supports, falling back to lighted
/// gray.
pub fn best_color_mode(mesh: &ScanMesh) -> RenderingMode {
  if mesh.has_per_vertex_uvs() {
    RenderingMode::Textured
  } else if mesh.has_per_vertex_colors() {
    RenderingMode::PerVertexColor
  } else {
    RenderingMode::LightedGray
  }
}

/// Rendering mode for a display mode given the current mesh.
pub fn rendering_mode_for(mode: DisplayMode, mesh: &ScanMesh) -> RenderingMode {
  match mode {
    DisplayMode::XRay => RenderingMode::XRay,
    DisplayMode::LightedGray => RenderingMode::LightedGray,
    DisplayMode::Color | DisplayMode::HoleFill => best_color_mode(mesh),
  }
}

/// Pipeline entry stage required to satisfy a display mode, if any.
///
/// `have_hole_filled` is whether a hole-filled mesh is already held from an
/// earlier run.
pub fn required_entry_stage(
  mode: DisplayMode,
  mesh: &ScanMesh,
  have_hole_filled: bool,
) -> Option<EntryStage> {
  match mode {
    DisplayMode::Color if !mesh.is_colorized() => Some(EntryStage::Colorize),
    DisplayMode::HoleFill if !have_hole_filled => Some(EntryStage::HoleFill),
    _ => None,
  }
}
