//! Overlay geometry for the editable primitive outlines.
//!
//! Every primitive becomes one quad in world space. The per-vertex `local` coordinates are
//! interpolated across the quad so the fragment stage can evaluate a signed distance to the
//! primitive outline and anti-alias it. Outline thickness is given as a fraction of the
//! view height, so the geometry depends on the zoom level but not on the view center.

use scene::{Arc, Circle, Line, Scene};
use view::ViewChange;

const QUAD_INDEX_PATTERN: [u32; 6] = [0, 1, 2, 0, 2, 3];
const VERTICES_PER_QUAD: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OverlayVertex {
    pub position: [f32; 2],
    pub local: [f32; 4],
    pub color: [f32; 3],
}

/// Contiguous run of the index buffer drawn by one shading program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexRange {
    pub offset: usize,
    pub count: usize,
}

impl IndexRange {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_offset(&self) -> usize {
        self.offset * std::mem::size_of::<u32>()
    }
}

/// What the GPU copy of the geometry needs after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryRefresh {
    /// Index layout unchanged; only vertex data must be re-uploaded in place.
    VerticesOnly,
    /// Vertex and index buffers must be recreated with new sizes.
    Full,
}

/// Geometry work implied by one frame's changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayRefresh {
    Keep,
    Rebuild,
}

/// Outline thickness follows the view height, so a zoom needs new vertices while a pan only
/// moves the camera the overlay is drawn with.
pub fn overlay_refresh_for(view_change: ViewChange, scene_edited: bool) -> OverlayRefresh {
    if scene_edited || view_change == ViewChange::Zoom {
        OverlayRefresh::Rebuild
    } else {
        OverlayRefresh::Keep
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("outline thickness fraction {fraction} must be positive and finite")]
    InvalidThickness { fraction: f32 },
    #[error("line {index} has zero length")]
    DegenerateLine { index: usize },
    #[error("{vertex_count} overlay vertices exceed the 32-bit index range")]
    IndexOverflow { vertex_count: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterGeometry {
    vertices: Vec<OverlayVertex>,
    indices: Vec<u32>,
    circles: IndexRange,
    lines: IndexRange,
    arcs: IndexRange,
    thickness: f32,
    view_height: f32,
}

pub fn build_raster_geometry(
    scene: &Scene,
    thickness_fraction: f32,
) -> Result<RasterGeometry, OverlayError> {
    let mut geometry = RasterGeometry::default();
    geometry.rebuild(scene, thickness_fraction)?;
    Ok(geometry)
}

impl RasterGeometry {
    pub fn world_thickness(view_height: f32, thickness_fraction: f32) -> f32 {
        thickness_fraction * view_height
    }

    pub fn vertices(&self) -> &[OverlayVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn circles(&self) -> IndexRange {
        self.circles
    }

    pub fn lines(&self) -> IndexRange {
        self.lines
    }

    pub fn arcs(&self) -> IndexRange {
        self.arcs
    }

    /// Outline thickness in world units the geometry was built with.
    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// True when the outline thickness no longer matches the given view height.
    /// A pure pan keeps the view height and therefore never makes the geometry stale.
    pub fn is_stale_for(&self, view_height: f32) -> bool {
        self.view_height != view_height
    }

    /// Rebuilds all quads in place. On error the previous geometry is kept unchanged.
    pub fn rebuild(
        &mut self,
        scene: &Scene,
        thickness_fraction: f32,
    ) -> Result<GeometryRefresh, OverlayError> {
        if !thickness_fraction.is_finite() || thickness_fraction <= 0.0 {
            return Err(OverlayError::InvalidThickness {
                fraction: thickness_fraction,
            });
        }
        let counts = scene.counts();
        let vertex_count = counts
            .primitives()
            .checked_mul(VERTICES_PER_QUAD)
            .ok_or(OverlayError::IndexOverflow {
                vertex_count: usize::MAX,
            })?;
        if u32::try_from(vertex_count).is_err() {
            return Err(OverlayError::IndexOverflow { vertex_count });
        }
        if let Some(index) = scene.lines.iter().position(|line| line.a == line.b) {
            return Err(OverlayError::DegenerateLine { index });
        }

        let previous_layout = (self.circles, self.lines, self.arcs);
        let thickness = Self::world_thickness(scene.view_height, thickness_fraction);

        self.vertices.clear();
        self.indices.clear();
        self.vertices.reserve(vertex_count);
        self.indices
            .reserve(counts.primitives() * QUAD_INDEX_PATTERN.len());

        let circles_offset = self.indices.len();
        for circle in &scene.circles {
            let color = scene.material_for(circle.material_id).color;
            self.push_quad(circle_quad(circle, thickness, color));
        }
        self.circles = IndexRange {
            offset: circles_offset,
            count: self.indices.len() - circles_offset,
        };

        let lines_offset = self.indices.len();
        for line in &scene.lines {
            let color = scene.material_for(line.material_id).color;
            self.push_quad(line_quad(line, thickness, color));
        }
        self.lines = IndexRange {
            offset: lines_offset,
            count: self.indices.len() - lines_offset,
        };

        let arcs_offset = self.indices.len();
        for arc in &scene.arcs {
            let color = scene.material_for(arc.material_id).color;
            self.push_quad(arc_quad(arc, thickness, color));
        }
        self.arcs = IndexRange {
            offset: arcs_offset,
            count: self.indices.len() - arcs_offset,
        };

        self.thickness = thickness;
        self.view_height = scene.view_height;

        if previous_layout == (self.circles, self.lines, self.arcs) {
            Ok(GeometryRefresh::VerticesOnly)
        } else {
            Ok(GeometryRefresh::Full)
        }
    }

    fn push_quad(&mut self, quad: [OverlayVertex; VERTICES_PER_QUAD]) {
        let first_index =
            u32::try_from(self.vertices.len()).expect("overlay vertex count checked before build");
        self.vertices.extend_from_slice(&quad);
        self.indices
            .extend(QUAD_INDEX_PATTERN.iter().map(|index| first_index + index));
    }
}

fn circle_quad(circle: &Circle, thickness: f32, color: [f32; 3]) -> [OverlayVertex; 4] {
    let half_side = circle.radius + 0.5 * thickness;
    let rel_thickness = thickness / half_side;
    let corner = |sign_x: f32, sign_y: f32| OverlayVertex {
        position: add(circle.center, [sign_x * half_side, sign_y * half_side]),
        local: [sign_x, sign_y, rel_thickness, 0.0],
        color,
    };
    [
        corner(-1.0, -1.0),
        corner(1.0, -1.0),
        corner(1.0, 1.0),
        corner(-1.0, 1.0),
    ]
}

/// Segment quad capped half a thickness beyond each endpoint. `local.x` runs across the
/// segment in thickness units; `local.y`/`local.z` run along it from each end.
fn line_quad(line: &Line, thickness: f32, color: [f32; 3]) -> [OverlayVertex; 4] {
    let line_vec = sub(line.b, line.a);
    let line_length = line_vec[0].hypot(line_vec[1]);
    let line_dir = scale(line_vec, 1.0 / line_length);
    let delta_left = scale(perpendicular(line_dir), 0.5 * thickness);
    let delta_up = scale(line_dir, 0.5 * thickness);
    let aspect_ratio = line_length / thickness;
    let far = -aspect_ratio - 0.5;

    [
        OverlayVertex {
            position: sub(add(line.a, delta_left), delta_up),
            local: [-0.5, 0.5, far, 0.0],
            color,
        },
        OverlayVertex {
            position: sub(sub(line.a, delta_left), delta_up),
            local: [0.5, 0.5, far, 0.0],
            color,
        },
        OverlayVertex {
            position: add(sub(line.b, delta_left), delta_up),
            local: [0.5, far, 0.5, 0.0],
            color,
        },
        OverlayVertex {
            position: add(add(line.b, delta_left), delta_up),
            local: [-0.5, far, 0.5, 0.0],
            color,
        },
    ]
}

/// Ring quad cut at the chord. `local.y` at the bottom edge marks the chord line and
/// `local.w` is the chord height the ring is clipped against, both relative to the
/// half extent.
fn arc_quad(arc: &Arc, thickness: f32, color: [f32; 3]) -> [OverlayVertex; 4] {
    let half_side = arc.radius + 0.5 * thickness;
    let bottom_y = arc.b - 0.5 * thickness;
    let dir = arc.a;
    let left = perpendicular(dir);
    let rel_thickness = thickness / half_side;
    let cutoff = arc.b / half_side;
    let bottom_coord = bottom_y / half_side;
    let bottom_center = add(arc.center, scale(dir, bottom_y));

    [
        OverlayVertex {
            position: add(bottom_center, scale(left, half_side)),
            local: [-1.0, bottom_coord, rel_thickness, cutoff],
            color,
        },
        OverlayVertex {
            position: sub(bottom_center, scale(left, half_side)),
            local: [1.0, bottom_coord, rel_thickness, cutoff],
            color,
        },
        OverlayVertex {
            position: add(arc.center, scale(sub(dir, left), half_side)),
            local: [1.0, 1.0, rel_thickness, cutoff],
            color,
        },
        OverlayVertex {
            position: add(arc.center, scale(add(dir, left), half_side)),
            local: [-1.0, 1.0, rel_thickness, cutoff],
            color,
        },
    ]
}

fn add(left: [f32; 2], right: [f32; 2]) -> [f32; 2] {
    [left[0] + right[0], left[1] + right[1]]
}

fn sub(left: [f32; 2], right: [f32; 2]) -> [f32; 2] {
    [left[0] - right[0], left[1] - right[1]]
}

fn scale(value: [f32; 2], factor: f32) -> [f32; 2] {
    [value[0] * factor, value[1] * factor]
}

fn perpendicular(value: [f32; 2]) -> [f32; 2] {
    [-value[1], value[0]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::{Material, MaterialKind, default_scene};

    fn empty_scene(view_height: f32) -> Scene {
        Scene {
            view_x: 0.5,
            view_y: 0.5 * view_height,
            view_width: 1.0,
            view_height,
            materials: vec![Material {
                color: [0.2, 0.4, 0.6],
                emissivity: [0.0; 3],
                kind: MaterialKind::Diffuse,
            }],
            circles: Vec::new(),
            lines: Vec::new(),
            arcs: Vec::new(),
        }
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn pan_needs_no_geometry_work() {
        assert_eq!(
            overlay_refresh_for(ViewChange::Pan, false),
            OverlayRefresh::Keep
        );
        assert_eq!(
            overlay_refresh_for(ViewChange::Unchanged, false),
            OverlayRefresh::Keep
        );
        assert_eq!(
            overlay_refresh_for(ViewChange::Zoom, false),
            OverlayRefresh::Rebuild
        );
        assert_eq!(
            overlay_refresh_for(ViewChange::Pan, true),
            OverlayRefresh::Rebuild
        );
    }

    #[test]
    fn circle_quad_encodes_relative_thickness() {
        let mut scene = empty_scene(1.0);
        scene.circles.push(Circle {
            center: [0.5, 0.5],
            radius: 0.1,
            material_id: 0,
        });

        let geometry = build_raster_geometry(&scene, 0.01).expect("build geometry");

        assert_eq!(geometry.vertices().len(), 4);
        assert_eq!(geometry.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(geometry.circles(), IndexRange { offset: 0, count: 6 });
        assert!(geometry.lines().is_empty());
        assert!(geometry.arcs().is_empty());

        let half_side = 0.105_f32;
        let bottom_left = geometry.vertices()[0];
        assert_close(bottom_left.position[0], 0.5 - half_side);
        assert_close(bottom_left.position[1], 0.5 - half_side);
        assert_eq!(&bottom_left.local[..2], &[-1.0, -1.0]);
        assert_close(bottom_left.local[2], 0.01 / half_side);
        assert!((bottom_left.local[2] - 0.0952).abs() < 1e-4);

        let top_right = geometry.vertices()[2];
        assert_close(top_right.position[0], 0.5 + half_side);
        assert_close(top_right.position[1], 0.5 + half_side);
        assert_eq!(top_right.color, [0.2, 0.4, 0.6]);
    }

    #[test]
    fn line_quad_is_capped_beyond_endpoints() {
        let mut scene = empty_scene(1.0);
        scene.lines.push(Line {
            a: [0.0, 0.0],
            b: [1.0, 0.0],
            material_id: 0,
        });

        let geometry = build_raster_geometry(&scene, 0.1).expect("build geometry");
        let vertices = geometry.vertices();

        assert_close(vertices[0].position[0], -0.05);
        assert_close(vertices[0].position[1], 0.05);
        assert_close(vertices[1].position[0], -0.05);
        assert_close(vertices[1].position[1], -0.05);
        assert_close(vertices[2].position[0], 1.05);
        assert_close(vertices[2].position[1], -0.05);
        assert_close(vertices[3].position[0], 1.05);
        assert_close(vertices[3].position[1], 0.05);

        let far = -10.0 - 0.5;
        assert_eq!(vertices[0].local[0], -0.5);
        assert_eq!(vertices[0].local[1], 0.5);
        assert_close(vertices[0].local[2], far);
        assert_close(vertices[2].local[1], far);
        assert_eq!(vertices[2].local[2], 0.5);
        assert_eq!(geometry.lines(), IndexRange { offset: 0, count: 6 });
    }

    #[test]
    fn arc_quad_marks_chord_and_cutoff() {
        let mut scene = empty_scene(1.0);
        scene.arcs.push(Arc {
            center: [0.0, 0.0],
            radius: 0.1,
            a: [0.0, 1.0],
            b: 0.05,
            material_id: 0,
        });

        let geometry = build_raster_geometry(&scene, 0.02).expect("build geometry");
        let vertices = geometry.vertices();
        let half_side = 0.11_f32;
        let bottom_y = 0.04_f32;

        assert_close(vertices[0].position[0], -half_side);
        assert_close(vertices[0].position[1], bottom_y);
        assert_close(vertices[1].position[0], half_side);
        assert_close(vertices[1].position[1], bottom_y);
        assert_close(vertices[2].position[0], half_side);
        assert_close(vertices[2].position[1], half_side);
        assert_close(vertices[3].position[0], -half_side);
        assert_close(vertices[3].position[1], half_side);

        for vertex in vertices {
            assert_close(vertex.local[2], 0.02 / half_side);
            assert_close(vertex.local[3], 0.05 / half_side);
        }
        assert_close(vertices[0].local[1], bottom_y / half_side);
        assert_eq!(vertices[2].local[1], 1.0);
    }

    #[test]
    fn ranges_partition_indices_by_primitive_kind() {
        let scene = default_scene(320, 240);
        let geometry = build_raster_geometry(&scene, 0.0075).expect("build geometry");

        assert_eq!(geometry.vertices().len(), 8 * 4);
        assert_eq!(geometry.indices().len(), 8 * 6);
        assert_eq!(geometry.circles(), IndexRange { offset: 0, count: 18 });
        assert_eq!(geometry.lines(), IndexRange { offset: 18, count: 12 });
        assert_eq!(geometry.arcs(), IndexRange { offset: 30, count: 18 });
        assert_eq!(geometry.arcs().byte_offset(), 120);
        assert_close(geometry.thickness(), 0.0075 * 0.75);
        assert_eq!(
            geometry.vertex_bytes().len(),
            geometry.vertices().len() * std::mem::size_of::<OverlayVertex>()
        );

        let line_color = scene.materials[3].color;
        let first_line_vertex = geometry.indices()[geometry.lines().offset] as usize;
        assert_eq!(geometry.vertices()[first_line_vertex].color, line_color);
    }

    #[test]
    fn rebuild_after_zoom_only_refreshes_vertices() {
        let mut scene = default_scene(320, 240);
        let mut geometry = build_raster_geometry(&scene, 0.0075).expect("build geometry");
        let indices_before = geometry.indices().to_vec();

        scene.view_x += 0.2;
        assert!(!geometry.is_stale_for(scene.view_height));

        scene.view_height /= 1.2;
        scene.view_width /= 1.2;
        assert!(geometry.is_stale_for(scene.view_height));

        let refresh = geometry.rebuild(&scene, 0.0075).expect("rebuild geometry");
        assert_eq!(refresh, GeometryRefresh::VerticesOnly);
        assert_eq!(geometry.indices(), indices_before.as_slice());
        assert_close(geometry.thickness(), 0.0075 * 0.75 / 1.2);
        assert!(!geometry.is_stale_for(scene.view_height));
    }

    #[test]
    fn rebuild_with_new_primitive_list_requires_full_refresh() {
        let mut scene = default_scene(320, 240);
        let mut geometry = build_raster_geometry(&scene, 0.0075).expect("build geometry");

        scene.arcs.pop();
        let refresh = geometry.rebuild(&scene, 0.0075).expect("rebuild geometry");
        assert_eq!(refresh, GeometryRefresh::Full);
        assert_eq!(geometry.arcs().count, 12);
    }

    #[test]
    fn rebuild_rejects_degenerate_line_and_keeps_previous_geometry() {
        let mut scene = default_scene(320, 240);
        let mut geometry = build_raster_geometry(&scene, 0.0075).expect("build geometry");
        let before = geometry.clone();

        scene.lines[1].b = scene.lines[1].a;
        assert_eq!(
            geometry.rebuild(&scene, 0.0075),
            Err(OverlayError::DegenerateLine { index: 1 })
        );
        assert_eq!(geometry, before);

        assert_eq!(
            geometry.rebuild(&scene, 0.0),
            Err(OverlayError::InvalidThickness { fraction: 0.0 })
        );
    }
}
