//! Frame loop state: one [`Session`] owns the scene, the accumulation schedule and the
//! overlay geometry, and drives a [`RenderBackend`] once per frame.
//!
//! Every frame runs the same stages in order: input, state mutation, overlay rebuild,
//! sample dispatch, present, and finally timing readback for the next frame's workload.

use std::path::Path;
use std::time::Instant;

use frame_scheduler::{
    AccumulationController, MeasuredDispatch, ResetReason, SampleBatch, ThroughputMeter,
    ThroughputReport, WorkloadEstimator, estimator_for,
};
use overlay::{
    GeometryRefresh, OverlayError, OverlayRefresh, RasterGeometry, build_raster_geometry,
    overlay_refresh_for,
};
use render_protocol::{
    CapacityError, ComputeTiming, OverlayDraw, RenderBackend, RenderRequest, ScenePayload,
    log_backend_diagnostic,
};
use scene::{
    Arc, Circle, Line, Material, Scene, SceneError, SceneValidationError, load_scene, save_scene,
};
use view::{ViewChange, ViewWindow, Viewport, centered_viewport};

use crate::config::{ConfigError, SessionConfig};
use crate::input::{ActionKeys, InputFrame};
use crate::interaction::InteractionController;
use crate::screenshot::{ScreenshotError, write_png};

/// Errors that prevent the frame loop from starting.
#[derive(Debug, thiserror::Error)]
pub enum SessionInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("initial scene is invalid: {0}")]
    Scene(#[from] SceneValidationError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("overlay geometry cannot be built: {0}")]
    Overlay(#[from] OverlayError),
    #[error("backend renders {actual:?} images, config asks for {expected:?}")]
    ImageSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Screenshot(#[from] ScreenshotError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("edit would make the scene invalid: {0}")]
    InvalidEdit(#[from] SceneValidationError),
    #[error("{primitive} {index} does not exist, scene has {len}")]
    EditOutOfRange {
        primitive: &'static str,
        index: usize,
        len: usize,
    },
}

/// Replacement of a single scene element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEdit {
    Material { material_id: u32, material: Material },
    Circle { index: usize, circle: Circle },
    Line { index: usize, line: Line },
    Arc { index: usize, arc: Arc },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneLoadOutcome {
    /// The loaded scene replaced the running one. `refresh` is the overlay upload it needed.
    Applied { refresh: GeometryRefresh },
    /// The loaded scene needs larger scene buffers. It is kept as the pending scene and the
    /// running scene is unchanged.
    RestartRequired,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    pub viewport: Viewport,
    pub view_change: ViewChange,
    pub actions: ActionKeys,
    pub failed_actions: ActionKeys,
    pub load_outcome: Option<SceneLoadOutcome>,
    pub geometry_refresh: Option<GeometryRefresh>,
    pub batch: Option<SampleBatch>,
    pub sample_index: u32,
    pub samples_per_frame: u32,
    pub compute_timing: Option<ComputeTiming>,
    pub throughput: Option<ThroughputReport>,
}

pub struct Session<B: RenderBackend> {
    config: SessionConfig,
    backend: B,
    scene: Scene,
    view: ViewWindow,
    geometry: RasterGeometry,
    accumulation: AccumulationController,
    workload: Box<dyn WorkloadEstimator>,
    throughput: ThroughputMeter,
    interaction: InteractionController,
    draw_overlay: bool,
    pending_scene: Option<Scene>,
    frame_id: u64,
}

impl<B: RenderBackend> Session<B> {
    /// Checks everything that would otherwise fail mid-loop, then uploads the scene and
    /// overlay.
    pub fn new(
        config: SessionConfig,
        mut backend: B,
        scene: Scene,
    ) -> Result<Self, SessionInitError> {
        config.validate()?;
        scene.validate()?;
        let view = scene.view_window().map_err(SceneValidationError::from)?;

        let expected = (config.texture_width, config.texture_height);
        let actual = backend.image_size();
        if actual != expected {
            return Err(SessionInitError::ImageSize { expected, actual });
        }

        let payload = ScenePayload::from_scene(&scene, &config.uniform_limits)?;
        let capacity = backend.scene_capacity();
        let requested = payload.counts();
        if !capacity.accepts(&requested) {
            return Err(CapacityError::ExceedsAllocation {
                requested,
                capacity,
            }
            .into());
        }
        let geometry = build_raster_geometry(&scene, config.outline_thickness)?;

        backend.upload_scene(&payload)?;
        backend.upload_overlay(&geometry, GeometryRefresh::Full);

        let workload = estimator_for(
            config.workload_mode,
            backend.renderer_name(),
            config.workload_config(),
        );
        log::info!(
            "[session] started on '{}' with {:?}, {}x{} image",
            backend.renderer_name(),
            requested,
            expected.0,
            expected.1
        );

        Ok(Self {
            accumulation: AccumulationController::new(config.accumulation),
            interaction: InteractionController::new(config.zoom_factor),
            draw_overlay: config.draw_overlay,
            config,
            backend,
            scene,
            view,
            geometry,
            workload,
            throughput: ThroughputMeter::new(),
            pending_scene: None,
            frame_id: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn view(&self) -> ViewWindow {
        self.view
    }

    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    pub fn accumulation(&self) -> &AccumulationController {
        &self.accumulation
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_workload_adaptive(&self) -> bool {
        self.workload.is_adaptive()
    }

    pub fn draw_overlay(&self) -> bool {
        self.draw_overlay
    }

    pub fn set_draw_overlay(&mut self, draw_overlay: bool) {
        self.draw_overlay = draw_overlay;
    }

    pub fn pending_scene(&self) -> Option<&Scene> {
        self.pending_scene.as_ref()
    }

    pub fn take_pending_scene(&mut self) -> Option<Scene> {
        self.pending_scene.take()
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn reset(&mut self, reason: ResetReason) {
        self.accumulation.reset(reason);
    }

    pub fn run_frame(&mut self, input: &InputFrame, now: Instant) -> FrameReport {
        let frame_id = self.frame_id;
        self.frame_id += 1;

        let [framebuffer_width, framebuffer_height] = input.framebuffer_size;
        let viewport = centered_viewport(
            self.config.texture_width as i32,
            self.config.texture_height as i32,
            framebuffer_width,
            framebuffer_height,
        );
        let interaction = self.interaction.update(input, viewport, self.view);
        let mut report = FrameReport {
            frame_id,
            viewport,
            view_change: interaction.view_change,
            actions: interaction.actions,
            ..FrameReport::default()
        };

        let view_reset = match interaction.view_change {
            ViewChange::Unchanged => None,
            ViewChange::Pan => Some(ResetReason::Pan),
            ViewChange::Zoom => Some(ResetReason::Zoom),
        };
        if let Some(reason) = view_reset {
            self.view = interaction.view;
            self.scene.set_view_window(self.view);
            self.accumulation.reset(reason);
        }
        self.apply_actions(interaction.actions, &mut report);

        if overlay_refresh_for(interaction.view_change, false) == OverlayRefresh::Rebuild
            && self.geometry.is_stale_for(self.scene.view_height)
        {
            report.geometry_refresh = self.rebuild_overlay();
        }

        let mut samples_this_frame = 0;
        if let Some(batch) = self.accumulation.plan_frame() {
            self.backend.render(&RenderRequest {
                frame_id,
                sample_index: batch.first_sample_index,
                samples_per_frame: batch.sample_count,
                blend_alpha: batch.blend_alpha,
                view_center: self.view.center(),
                view_size: self.view.size(),
            });
            self.accumulation.commit(batch);
            samples_this_frame = batch.sample_count;
            report.batch = Some(batch);
        }

        let overlay = self.draw_overlay.then(|| OverlayDraw {
            viewport,
            view_center: self.view.center(),
            view_size: self.view.size(),
            circles: self.geometry.circles(),
            lines: self.geometry.lines(),
            arcs: self.geometry.arcs(),
        });
        self.backend.present(viewport, overlay.as_ref());

        if interaction.actions.contains(ActionKeys::SAVE_SCREENSHOT) {
            let path = self.config.screenshot_path.clone();
            if let Err(error) = self.save_screenshot_to(&path) {
                log::warn!("[session] screenshot failed: {error}");
                report.failed_actions |= ActionKeys::SAVE_SCREENSHOT;
            }
        }

        let timing = self.backend.take_compute_timing();
        report.compute_timing = timing;
        if !self.accumulation.is_converged() {
            let current = self.accumulation.samples_per_frame();
            let measured = timing.map(|timing| MeasuredDispatch {
                sample_count: timing.sample_count,
                elapsed: timing.elapsed,
            });
            let next = self.workload.next_samples_per_frame(current, measured);
            self.accumulation.set_samples_per_frame(next);
        }
        for diagnostic in self.backend.drain_diagnostics() {
            log_backend_diagnostic(&diagnostic);
        }

        report.sample_index = self.accumulation.sample_index();
        report.samples_per_frame = self.accumulation.samples_per_frame();
        report.throughput = self.throughput.record_frame(
            now,
            samples_this_frame,
            report.samples_per_frame,
            report.sample_index,
        );
        if let Some(throughput) = report.throughput {
            log::info!(
                "[session] {:.1} fps, {} samples/frame, {:.0} samples/s, {} samples",
                throughput.frames_per_second,
                throughput.samples_per_frame,
                throughput.samples_per_second,
                throughput.sample_index
            );
        }
        report
    }

    /// Replaces one element. The scene, backend and accumulation stay untouched on error.
    pub fn apply_edit(&mut self, edit: SceneEdit) -> Result<(), SessionError> {
        let mut candidate = self.scene.clone();
        match edit {
            SceneEdit::Material {
                material_id,
                material,
            } => replace_at(
                &mut candidate.materials,
                material_id as usize,
                material,
                "material",
            )?,
            SceneEdit::Circle { index, circle } => {
                replace_at(&mut candidate.circles, index, circle, "circle")?
            }
            SceneEdit::Line { index, line } => {
                replace_at(&mut candidate.lines, index, line, "line")?
            }
            SceneEdit::Arc { index, arc } => replace_at(&mut candidate.arcs, index, arc, "arc")?,
        }
        candidate.validate()?;
        self.install_scene(candidate, ResetReason::SceneEdit)?;
        Ok(())
    }

    pub fn save_scene_to(&self, path: &Path) -> Result<(), SessionError> {
        save_scene(&self.scene, path)?;
        Ok(())
    }

    /// Loads a scene file. Nothing changes on error, and a scene that does not fit the
    /// backend's scene buffers is parked as the pending scene.
    pub fn load_scene_from(&mut self, path: &Path) -> Result<SceneLoadOutcome, SessionError> {
        let loaded = load_scene(path)?;
        let counts = loaded.counts();
        let capacity = self.backend.scene_capacity();
        if !capacity.accepts(&counts) {
            log::warn!(
                "[session] loaded scene {counts:?} does not fit scene buffers {capacity:?}; restart the renderer to apply it"
            );
            self.pending_scene = Some(loaded);
            return Ok(SceneLoadOutcome::RestartRequired);
        }

        let refresh = self.install_scene(loaded, ResetReason::SceneLoad)?;
        self.pending_scene = None;
        self.interaction.cancel_drag();
        log::info!("[session] applied scene from '{}'", path.display());
        Ok(SceneLoadOutcome::Applied { refresh })
    }

    pub fn save_screenshot_to(&mut self, path: &Path) -> Result<(), SessionError> {
        let image = self.backend.read_display_image();
        write_png(path, image.width, image.height, &image.rgba)?;
        Ok(())
    }

    fn apply_actions(&mut self, actions: ActionKeys, report: &mut FrameReport) {
        if actions.contains(ActionKeys::RESET_SAMPLES) {
            self.accumulation.reset(ResetReason::ResetKey);
        }
        if actions.contains(ActionKeys::TOGGLE_OVERLAY) {
            self.draw_overlay = !self.draw_overlay;
        }
        if actions.contains(ActionKeys::SAVE_SCENE) {
            if let Err(error) = self.save_scene_to(&self.config.scene_path) {
                log::warn!("[session] scene save failed: {error}");
                report.failed_actions |= ActionKeys::SAVE_SCENE;
            }
        }
        if actions.contains(ActionKeys::LOAD_SCENE) {
            let path = self.config.scene_path.clone();
            match self.load_scene_from(&path) {
                Ok(outcome) => {
                    report.load_outcome = Some(outcome);
                    if let SceneLoadOutcome::Applied { refresh } = outcome {
                        report.geometry_refresh = Some(refresh);
                    }
                }
                Err(error) => {
                    log::warn!("[session] scene load failed, keeping current scene: {error}");
                    report.failed_actions |= ActionKeys::LOAD_SCENE;
                }
            }
        }
    }

    fn rebuild_overlay(&mut self) -> Option<GeometryRefresh> {
        match self
            .geometry
            .rebuild(&self.scene, self.config.outline_thickness)
        {
            Ok(refresh) => {
                self.backend.upload_overlay(&self.geometry, refresh);
                Some(refresh)
            }
            Err(error) => {
                log::error!("[session] overlay rebuild failed, keeping previous geometry: {error}");
                None
            }
        }
    }

    /// Uploads a validated scene and makes it current. All fallible work happens before
    /// anything is replaced.
    fn install_scene(
        &mut self,
        candidate: Scene,
        reason: ResetReason,
    ) -> Result<GeometryRefresh, SessionError> {
        let payload = ScenePayload::from_scene(&candidate, &self.config.uniform_limits)?;
        let view = candidate
            .view_window()
            .map_err(SceneValidationError::from)?;
        let mut geometry = self.geometry.clone();
        let refresh = geometry.rebuild(&candidate, self.config.outline_thickness)?;

        self.backend.upload_scene(&payload)?;
        self.backend.upload_overlay(&geometry, refresh);
        self.scene = candidate;
        self.view = view;
        self.geometry = geometry;
        self.accumulation.reset(reason);
        Ok(refresh)
    }
}

fn replace_at<T>(
    items: &mut [T],
    index: usize,
    value: T,
    primitive: &'static str,
) -> Result<(), SessionError> {
    let len = items.len();
    let slot = items.get_mut(index).ok_or(SessionError::EditOutOfRange {
        primitive,
        index,
        len,
    })?;
    *slot = value;
    Ok(())
}
