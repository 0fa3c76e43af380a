use std::time::Duration;

use overlay::{GeometryRefresh, IndexRange, RasterGeometry};
use view::Viewport;

use crate::{BackendDiagnostic, CapacityError, SceneCapacity, ScenePayload};

/// One accumulation pass: trace `samples_per_frame` samples starting at `sample_index` and
/// blend their mean into the accumulation buffer with weight `blend_alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub frame_id: u64,
    pub sample_index: u32,
    pub samples_per_frame: u32,
    pub blend_alpha: f32,
    pub view_center: [f32; 2],
    pub view_size: [f32; 2],
}

/// Outline overlay drawn over the presented image with the current view as camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayDraw {
    pub viewport: Viewport,
    pub view_center: [f32; 2],
    pub view_size: [f32; 2],
    pub circles: IndexRange,
    pub lines: IndexRange,
    pub arcs: IndexRange,
}

/// Compute time of an earlier frame's dispatch and the number of samples it traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeTiming {
    pub frame_id: u64,
    pub sample_count: u32,
    pub elapsed: Duration,
}

/// Display image read back as tightly packed RGBA8 rows, bottom row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendInitError {
    #[error("failed to build {program} program:\n{log}")]
    ProgramBuild { program: String, log: String },
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("unsupported backend configuration: {reason}")]
    Unsupported { reason: String },
}

pub trait RenderBackend {
    fn renderer_name(&self) -> &str;

    /// Size of the traced image in pixels.
    fn image_size(&self) -> (u32, u32);

    fn scene_capacity(&self) -> SceneCapacity;

    fn upload_scene(&mut self, payload: &ScenePayload) -> Result<(), CapacityError>;

    fn upload_overlay(&mut self, geometry: &RasterGeometry, refresh: GeometryRefresh);

    fn render(&mut self, request: &RenderRequest);

    fn present(&mut self, viewport: Viewport, overlay: Option<&OverlayDraw>);

    /// Timing of a previous dispatch, if its measurement has become available.
    fn take_compute_timing(&mut self) -> Option<ComputeTiming>;

    fn drain_diagnostics(&mut self) -> Vec<BackendDiagnostic>;

    fn read_display_image(&mut self) -> DisplayImage;
}
