//! Reference [`RenderBackend`] that traces the scene on the CPU.
//!
//! It follows the same contract a GPU backend does: images are allocated once at startup,
//! each `render` blends one batch into the accumulation image and refreshes the display
//! image, and compute timings become available one frame after the dispatch they measure.

mod rng;
mod trace;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use overlay::{GeometryRefresh, OverlayVertex, RasterGeometry};
use render_protocol::{
    BackendDiagnostic, BackendInitError, CapacityError, ComputeTiming, DiagnosticKind,
    DiagnosticSeverity, DisplayImage, OverlayDraw, RenderBackend, RenderRequest, ResourceGuard,
    SceneCapacity, ScenePayload, acquire,
};
use view::Viewport;

use self::rng::Pcg32;
use self::trace::{MissingMaterial, trace_sample};

const RENDERER_NAME: &str = "caustics CPU reference tracer";
const DISPLAY_GAMMA: f32 = 2.2;

/// Counts images that are allocated and not yet released.
#[derive(Debug, Clone, Default)]
pub struct CpuDevice {
    live_images: Rc<Cell<usize>>,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_images(&self) -> usize {
        self.live_images.get()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage<T> {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<T>,
}

type ImageRelease<T> = Box<dyn FnOnce(CpuImage<T>)>;
type ImageGuard<T> = ResourceGuard<CpuImage<T>, ImageRelease<T>>;

fn allocate_image<T: Copy + 'static>(
    device: &CpuDevice,
    label: &'static str,
    width: u32,
    height: u32,
    fill: T,
) -> ImageGuard<T> {
    let allocated = device.live_images.clone();
    let released = device.live_images.clone();
    let release: ImageRelease<T> = Box::new(move |image: CpuImage<T>| {
        released.set(released.get() - 1);
        log::debug!(
            "[cpu_backend] released {label} image {}x{}",
            image.width,
            image.height
        );
    });
    acquire(
        move || {
            allocated.set(allocated.get() + 1);
            CpuImage {
                width,
                height,
                texels: vec![fill; width as usize * height as usize],
            }
        },
        release,
    )
}

/// What the last `present` call showed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    pub viewport: Viewport,
    pub overlay: Option<OverlayDraw>,
}

pub struct CpuBackend {
    device: CpuDevice,
    capacity: SceneCapacity,
    scene: ScenePayload,
    accumulation: ImageGuard<[f32; 3]>,
    display: ImageGuard<[u8; 4]>,
    overlay_vertices: Vec<OverlayVertex>,
    overlay_indices: Vec<u32>,
    last_presentation: Option<Presentation>,
    presented_frames: u64,
    in_flight_timing: Option<ComputeTiming>,
    ready_timing: Option<ComputeTiming>,
    diagnostics: Vec<BackendDiagnostic>,
}

impl CpuBackend {
    /// Allocates images for `width` x `height` and scene storage sized for `scene`.
    pub fn new(
        device: &CpuDevice,
        width: u32,
        height: u32,
        scene: &ScenePayload,
    ) -> Result<Self, BackendInitError> {
        if width == 0 || height == 0 {
            return Err(BackendInitError::Unsupported {
                reason: format!("image size {width}x{height} is empty"),
            });
        }
        let accumulation = allocate_image(device, "accumulation", width, height, [0.0; 3]);
        let display = allocate_image(device, "display", width, height, [0, 0, 0, 255]);
        log::info!(
            "[cpu_backend] allocated {width}x{height} images for {:?}",
            scene.counts()
        );
        Ok(Self {
            device: device.clone(),
            capacity: SceneCapacity::from_counts(scene.counts()),
            scene: scene.clone(),
            accumulation,
            display,
            overlay_vertices: Vec::new(),
            overlay_indices: Vec::new(),
            last_presentation: None,
            presented_frames: 0,
            in_flight_timing: None,
            ready_timing: None,
            diagnostics: Vec::new(),
        })
    }

    pub fn device(&self) -> &CpuDevice {
        &self.device
    }

    pub fn accumulation(&self) -> &CpuImage<[f32; 3]> {
        self.accumulation.get()
    }

    pub fn overlay_vertices(&self) -> &[OverlayVertex] {
        &self.overlay_vertices
    }

    pub fn overlay_indices(&self) -> &[u32] {
        &self.overlay_indices
    }

    pub fn last_presentation(&self) -> Option<&Presentation> {
        self.last_presentation.as_ref()
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    fn report(&mut self, severity: DiagnosticSeverity, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(BackendDiagnostic {
            severity,
            kind,
            message,
        });
    }
}

impl RenderBackend for CpuBackend {
    fn renderer_name(&self) -> &str {
        RENDERER_NAME
    }

    fn image_size(&self) -> (u32, u32) {
        let image = self.accumulation.get();
        (image.width, image.height)
    }

    fn scene_capacity(&self) -> SceneCapacity {
        self.capacity
    }

    fn upload_scene(&mut self, payload: &ScenePayload) -> Result<(), CapacityError> {
        let requested = payload.counts();
        if !self.capacity.accepts(&requested) {
            return Err(CapacityError::ExceedsAllocation {
                requested,
                capacity: self.capacity,
            });
        }
        self.scene = payload.clone();
        Ok(())
    }

    fn upload_overlay(&mut self, geometry: &RasterGeometry, refresh: GeometryRefresh) {
        match refresh {
            GeometryRefresh::VerticesOnly => {
                if self.overlay_vertices.len() != geometry.vertices().len() {
                    self.report(
                        DiagnosticSeverity::High,
                        DiagnosticKind::Error,
                        format!(
                            "vertex-only overlay update of {} vertices into a buffer of {}",
                            geometry.vertices().len(),
                            self.overlay_vertices.len()
                        ),
                    );
                }
                self.overlay_vertices.clear();
                self.overlay_vertices.extend_from_slice(geometry.vertices());
            }
            GeometryRefresh::Full => {
                self.overlay_vertices = geometry.vertices().to_vec();
                self.overlay_indices = geometry.indices().to_vec();
            }
        }
    }

    fn render(&mut self, request: &RenderRequest) {
        let started = Instant::now();
        let (width, height) = self.image_size();
        let alpha = request.blend_alpha;
        let mut missing_material = None;

        let accumulation = self.accumulation.get_mut();
        for y in 0..height {
            for x in 0..width {
                let pixel = (y * width + x) as usize;
                let mut rng = Pcg32::new(pixel as u64, u64::from(request.sample_index));
                let mut sum = [0.0_f32; 3];
                for _ in 0..request.samples_per_frame {
                    let u = (x as f32 + rng.next_f32()) / width as f32;
                    let v = (y as f32 + rng.next_f32()) / height as f32;
                    let start = [
                        request.view_center[0] + (u - 0.5) * request.view_size[0],
                        request.view_center[1] + (v - 0.5) * request.view_size[1],
                    ];
                    match trace_sample(&self.scene, start, &mut rng) {
                        Ok(radiance) => {
                            for (total, channel) in sum.iter_mut().zip(radiance) {
                                *total += channel;
                            }
                        }
                        Err(MissingMaterial(material_id)) => missing_material = Some(material_id),
                    }
                }

                let batch_scale = 1.0 / request.samples_per_frame.max(1) as f32;
                let texel = &mut accumulation.texels[pixel];
                for (value, total) in texel.iter_mut().zip(sum) {
                    *value = alpha * total * batch_scale + (1.0 - alpha) * *value;
                }
            }
        }

        let display = self.display.get_mut();
        for (target, source) in display.texels.iter_mut().zip(&accumulation.texels) {
            *target = display_texel(*source);
        }

        if let Some(material_id) = missing_material {
            self.report(
                DiagnosticSeverity::High,
                DiagnosticKind::UndefinedBehavior,
                format!("primitive references missing material {material_id}"),
            );
        }

        self.ready_timing = self.in_flight_timing.replace(ComputeTiming {
            frame_id: request.frame_id,
            sample_count: request.samples_per_frame,
            elapsed: started.elapsed(),
        });
    }

    fn present(&mut self, viewport: Viewport, overlay: Option<&OverlayDraw>) {
        if let Some(draw) = overlay {
            let drawn = draw.circles.count + draw.lines.count + draw.arcs.count;
            if drawn > self.overlay_indices.len() {
                self.report(
                    DiagnosticSeverity::Medium,
                    DiagnosticKind::Error,
                    format!(
                        "overlay draw of {drawn} indices exceeds the {} uploaded",
                        self.overlay_indices.len()
                    ),
                );
            }
        }
        self.last_presentation = Some(Presentation {
            viewport,
            overlay: overlay.copied(),
        });
        self.presented_frames += 1;
    }

    fn take_compute_timing(&mut self) -> Option<ComputeTiming> {
        self.ready_timing.take()
    }

    fn drain_diagnostics(&mut self) -> Vec<BackendDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn read_display_image(&mut self) -> DisplayImage {
        let display = self.display.get();
        DisplayImage {
            width: display.width,
            height: display.height,
            rgba: display.texels.iter().flatten().copied().collect(),
        }
    }
}

fn display_texel(radiance: [f32; 3]) -> [u8; 4] {
    let encode = |channel: f32| {
        let value = channel.clamp(0.0, 1.0).powf(1.0 / DISPLAY_GAMMA);
        (value * 255.0 + 0.5) as u8
    };
    [
        encode(radiance[0]),
        encode(radiance[1]),
        encode(radiance[2]),
        255,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay::build_raster_geometry;
    use render_protocol::UniformLimits;
    use scene::default_scene;

    fn payload() -> ScenePayload {
        ScenePayload::from_scene(&default_scene(32, 24), &UniformLimits::default())
            .expect("default payload")
    }

    fn request(frame_id: u64, sample_index: u32, samples: u32) -> RenderRequest {
        RenderRequest {
            frame_id,
            sample_index,
            samples_per_frame: samples,
            blend_alpha: samples as f32 / (sample_index + samples) as f32,
            view_center: [0.5, 0.375],
            view_size: [1.0, 0.75],
        }
    }

    #[test]
    fn images_are_released_with_the_backend() {
        let device = CpuDevice::new();
        let backend = CpuBackend::new(&device, 32, 24, &payload()).expect("create backend");
        assert_eq!(device.live_images(), 2);
        drop(backend);
        assert_eq!(device.live_images(), 0);
    }

    #[test]
    fn empty_image_size_is_unsupported() {
        let device = CpuDevice::new();
        let error = CpuBackend::new(&device, 0, 24, &payload()).err();
        assert!(matches!(error, Some(BackendInitError::Unsupported { .. })));
        assert_eq!(device.live_images(), 0);
    }

    #[test]
    fn rendering_is_deterministic_for_identical_requests() {
        let device = CpuDevice::new();
        let mut first = CpuBackend::new(&device, 32, 24, &payload()).expect("first backend");
        let mut second = CpuBackend::new(&device, 32, 24, &payload()).expect("second backend");

        first.render(&request(0, 0, 2));
        second.render(&request(0, 0, 2));
        assert_eq!(first.accumulation(), second.accumulation());
        assert_eq!(first.read_display_image(), second.read_display_image());
    }

    #[test]
    fn light_source_pixels_are_bright() {
        let device = CpuDevice::new();
        let mut backend = CpuBackend::new(&device, 160, 120, &payload()).expect("create backend");
        backend.render(&request(0, 0, 1));

        // The pixel starting at world (0.8, 0.5) lies inside the emissive circle.
        let (x, y) = (128_u32, 80_u32);
        let texel = backend.accumulation().texels[(y * 160 + x) as usize];
        assert_eq!(texel, [6.0, 6.0, 6.0]);

        let image = backend.read_display_image();
        let offset = ((y * 160 + x) * 4) as usize;
        assert_eq!(&image.rgba[offset..offset + 4], &[255, 255, 255, 255]);
    }

    #[test]
    fn timings_arrive_one_frame_late() {
        let device = CpuDevice::new();
        let mut backend = CpuBackend::new(&device, 8, 6, &payload()).expect("create backend");

        backend.render(&request(10, 0, 3));
        assert_eq!(backend.take_compute_timing(), None);

        backend.render(&request(11, 3, 1));
        let timing = backend.take_compute_timing().expect("first frame timing");
        assert_eq!(timing.frame_id, 10);
        assert_eq!(timing.sample_count, 3);
        assert_eq!(backend.take_compute_timing(), None);
    }

    #[test]
    fn scene_upload_respects_allocated_capacity() {
        let device = CpuDevice::new();
        let mut backend = CpuBackend::new(&device, 8, 6, &payload()).expect("create backend");

        let mut smaller = payload();
        smaller.arcs.clear();
        backend.upload_scene(&smaller).expect("smaller scene fits");

        let mut larger = payload();
        larger.lines.push(larger.lines[0]);
        assert!(matches!(
            backend.upload_scene(&larger),
            Err(CapacityError::ExceedsAllocation { .. })
        ));
    }

    #[test]
    fn vertex_only_overlay_update_with_new_size_is_diagnosed() {
        let device = CpuDevice::new();
        let mut backend = CpuBackend::new(&device, 8, 6, &payload()).expect("create backend");
        let mut scene = default_scene(32, 24);
        let geometry = build_raster_geometry(&scene, 0.0075).expect("geometry");
        backend.upload_overlay(&geometry, GeometryRefresh::Full);
        assert_eq!(backend.overlay_indices().len(), 48);
        assert!(backend.drain_diagnostics().is_empty());

        scene.arcs.clear();
        let smaller = build_raster_geometry(&scene, 0.0075).expect("geometry");
        backend.upload_overlay(&smaller, GeometryRefresh::VerticesOnly);
        let diagnostics = backend.drain_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_reportable());
    }
}
