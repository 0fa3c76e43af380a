//! Scene model: materials, optical primitives and the view window.
//!
//! Primitives reference materials by index. A scene is replaced or serialized as a
//! whole; individual primitives are never mutated in place.

mod persistence;

use serde::{Deserialize, Serialize};
use view::{ViewError, ViewWindow};

pub use persistence::{SceneError, load_scene, save_scene};

const ARC_DIRECTION_UNIT_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Diffuse,
    Specular,
    Dielectric,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: [f32; 3],
    pub emissivity: [f32; 3],
    pub kind: MaterialKind,
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        self.emissivity.iter().any(|channel| *channel > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: [f32; 2],
    pub radius: f32,
    pub material_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub a: [f32; 2],
    pub b: [f32; 2],
    pub material_id: u32,
}

/// Circular arc: the part of the circle lying beyond the chord at signed height `b`
/// along the unit direction `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: [f32; 2],
    pub radius: f32,
    pub a: [f32; 2],
    pub b: f32,
    pub material_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub view_x: f32,
    pub view_y: f32,
    pub view_width: f32,
    pub view_height: f32,
    pub materials: Vec<Material>,
    pub circles: Vec<Circle>,
    pub lines: Vec<Line>,
    pub arcs: Vec<Arc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimitiveCounts {
    pub materials: usize,
    pub circles: usize,
    pub lines: usize,
    pub arcs: usize,
}

impl PrimitiveCounts {
    pub fn primitives(&self) -> usize {
        self.circles + self.lines + self.arcs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SceneValidationError {
    #[error("invalid view window: {0}")]
    View(#[from] ViewError),
    #[error("material {index} has a non-finite or negative channel")]
    InvalidMaterial { index: usize },
    #[error("circle {index} has a non-finite coordinate")]
    NonFiniteCircle { index: usize },
    #[error("circle {index} has non-positive radius {radius}")]
    InvalidCircleRadius { index: usize, radius: f32 },
    #[error("line {index} has a non-finite coordinate")]
    NonFiniteLine { index: usize },
    #[error("line {index} has coincident endpoints")]
    DegenerateLine { index: usize },
    #[error("arc {index} has a non-finite coordinate")]
    NonFiniteArc { index: usize },
    #[error("arc {index} has non-positive radius {radius}")]
    InvalidArcRadius { index: usize, radius: f32 },
    #[error("arc {index} direction is not a unit vector (length {length})")]
    ArcDirectionNotUnit { index: usize, length: f32 },
    #[error("arc {index} chord height {b} exceeds radius {radius}")]
    ArcChordOutOfRange { index: usize, b: f32, radius: f32 },
    #[error("{primitive} {index} references material {material_id} but only {material_count} exist")]
    MaterialOutOfRange {
        primitive: &'static str,
        index: usize,
        material_id: u32,
        material_count: usize,
    },
}

impl Scene {
    pub fn view_window(&self) -> Result<ViewWindow, ViewError> {
        ViewWindow::new(self.view_x, self.view_y, self.view_width, self.view_height)
    }

    pub fn set_view_window(&mut self, view: ViewWindow) {
        self.view_x = view.center_x();
        self.view_y = view.center_y();
        self.view_width = view.width();
        self.view_height = view.height();
    }

    pub fn counts(&self) -> PrimitiveCounts {
        PrimitiveCounts {
            materials: self.materials.len(),
            circles: self.circles.len(),
            lines: self.lines.len(),
            arcs: self.arcs.len(),
        }
    }

    /// Material referenced by a primitive. Panics on an id outside the material list,
    /// which `validate` rules out.
    pub fn material_for(&self, material_id: u32) -> &Material {
        self.materials
            .get(material_id as usize)
            .unwrap_or_else(|| {
                panic!(
                    "material id {material_id} out of range for {} materials",
                    self.materials.len()
                )
            })
    }

    pub fn validate(&self) -> Result<(), SceneValidationError> {
        self.view_window()?;

        for (index, material) in self.materials.iter().enumerate() {
            let mut channels = material.color.iter().chain(material.emissivity.iter());
            if channels.any(|channel| !channel.is_finite() || *channel < 0.0) {
                return Err(SceneValidationError::InvalidMaterial { index });
            }
        }

        let material_count = self.materials.len();
        let check_material = |primitive: &'static str, index: usize, material_id: u32| {
            if (material_id as usize) < material_count {
                Ok(())
            } else {
                Err(SceneValidationError::MaterialOutOfRange {
                    primitive,
                    index,
                    material_id,
                    material_count,
                })
            }
        };

        for (index, circle) in self.circles.iter().enumerate() {
            if !all_finite(&circle.center) || !circle.radius.is_finite() {
                return Err(SceneValidationError::NonFiniteCircle { index });
            }
            if circle.radius <= 0.0 {
                return Err(SceneValidationError::InvalidCircleRadius {
                    index,
                    radius: circle.radius,
                });
            }
            check_material("circle", index, circle.material_id)?;
        }

        for (index, line) in self.lines.iter().enumerate() {
            if !all_finite(&line.a) || !all_finite(&line.b) {
                return Err(SceneValidationError::NonFiniteLine { index });
            }
            if line.a == line.b {
                return Err(SceneValidationError::DegenerateLine { index });
            }
            check_material("line", index, line.material_id)?;
        }

        for (index, arc) in self.arcs.iter().enumerate() {
            if !all_finite(&arc.center)
                || !all_finite(&arc.a)
                || !arc.radius.is_finite()
                || !arc.b.is_finite()
            {
                return Err(SceneValidationError::NonFiniteArc { index });
            }
            if arc.radius <= 0.0 {
                return Err(SceneValidationError::InvalidArcRadius {
                    index,
                    radius: arc.radius,
                });
            }
            let length = arc.a[0].hypot(arc.a[1]);
            if (length - 1.0).abs() > ARC_DIRECTION_UNIT_TOLERANCE {
                return Err(SceneValidationError::ArcDirectionNotUnit { index, length });
            }
            if arc.b.abs() > arc.radius {
                return Err(SceneValidationError::ArcChordOutOfRange {
                    index,
                    b: arc.b,
                    radius: arc.radius,
                });
            }
            check_material("arc", index, arc.material_id)?;
        }

        Ok(())
    }
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|value| value.is_finite())
}

/// Built-in demonstration scene framed for a `texture_width` x `texture_height` image.
pub fn default_scene(texture_width: u32, texture_height: u32) -> Scene {
    assert!(
        texture_width > 0 && texture_height > 0,
        "texture size must be positive"
    );
    let aspect = texture_height as f32 / texture_width as f32;
    let half_sqrt3 = 3.0_f32.sqrt() * 0.5;

    let material = |color: [f32; 3], emissivity: [f32; 3], kind: MaterialKind| Material {
        color,
        emissivity,
        kind,
    };

    Scene {
        view_x: 0.5,
        view_y: 0.5 * aspect,
        view_width: 1.0,
        view_height: aspect,
        materials: vec![
            material([0.75, 0.75, 0.75], [6.0, 6.0, 6.0], MaterialKind::Diffuse),
            material([0.75, 0.55, 0.25], [0.0; 3], MaterialKind::Dielectric),
            material([0.25, 0.75, 0.75], [0.0; 3], MaterialKind::Dielectric),
            material([1.0, 0.0, 1.0], [0.0; 3], MaterialKind::Specular),
            material([0.75, 0.75, 0.75], [0.0; 3], MaterialKind::Diffuse),
            material([1.0, 1.0, 1.0], [0.0; 3], MaterialKind::Dielectric),
        ],
        circles: vec![
            Circle {
                center: [0.8, 0.5],
                radius: 0.03,
                material_id: 0,
            },
            Circle {
                center: [0.5, 0.3],
                radius: 0.15,
                material_id: 1,
            },
            Circle {
                center: [0.8, 0.2],
                radius: 0.05,
                material_id: 2,
            },
        ],
        lines: vec![
            Line {
                a: [0.35, 0.05],
                b: [0.1, 0.2],
                material_id: 3,
            },
            Line {
                a: [0.1, 0.4],
                b: [0.4, 0.6],
                material_id: 4,
            },
        ],
        arcs: vec![
            Arc {
                center: [0.6, 0.6],
                radius: 0.1,
                a: [-0.5, half_sqrt3],
                b: -0.04,
                material_id: 3,
            },
            Arc {
                center: [0.25, 0.32 - 0.075],
                radius: 0.1,
                a: [0.0, 1.0],
                b: 0.075,
                material_id: 5,
            },
            Arc {
                center: [0.25, 0.32 + 0.075],
                radius: 0.1,
                a: [0.0, -1.0],
                b: 0.075,
                material_id: 5,
            },
        ],
    }
}
