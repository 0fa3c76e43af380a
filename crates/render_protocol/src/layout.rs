use scene::{MaterialKind, PrimitiveCounts, Scene};

/// std140 array element layouts of the four scene uniform blocks.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialGpu {
    pub color: [f32; 3],
    pub _color_padding: u32,
    pub emissivity: [f32; 3],
    pub kind: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CircleGpu {
    pub center: [f32; 2],
    pub radius: f32,
    pub material_id: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineGpu {
    pub a: [f32; 2],
    pub b: [f32; 2],
    pub material_id: u32,
    pub _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ArcGpu {
    pub center: [f32; 2],
    pub radius: f32,
    pub _radius_padding: u32,
    pub a: [f32; 2],
    pub b: f32,
    pub material_id: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<MaterialGpu>(), 32);
static_assertions::const_assert_eq!(std::mem::size_of::<CircleGpu>(), 16);
static_assertions::const_assert_eq!(std::mem::size_of::<LineGpu>(), 32);
static_assertions::const_assert_eq!(std::mem::size_of::<ArcGpu>(), 32);

impl MaterialGpu {
    pub fn kind_code(kind: MaterialKind) -> u32 {
        match kind {
            MaterialKind::Diffuse => 0,
            MaterialKind::Specular => 1,
            MaterialKind::Dielectric => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UniformLimits {
    pub max_block_bytes: usize,
}

impl Default for UniformLimits {
    fn default() -> Self {
        Self {
            max_block_bytes: 16_384,
        }
    }
}

/// Primitive counts the backend's scene buffers were allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneCapacity {
    pub materials: usize,
    pub circles: usize,
    pub lines: usize,
    pub arcs: usize,
}

impl SceneCapacity {
    pub fn from_counts(counts: PrimitiveCounts) -> Self {
        Self {
            materials: counts.materials,
            circles: counts.circles,
            lines: counts.lines,
            arcs: counts.arcs,
        }
    }

    /// Whether a scene with these counts can be uploaded without reallocating buffers.
    pub fn accepts(&self, counts: &PrimitiveCounts) -> bool {
        counts.materials <= self.materials
            && counts.circles <= self.circles
            && counts.lines <= self.lines
            && counts.arcs <= self.arcs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("{block} uniform block needs {bytes} bytes, limit is {limit}")]
    BlockTooLarge {
        block: &'static str,
        bytes: usize,
        limit: usize,
    },
    #[error("scene with {requested:?} does not fit buffers allocated for {capacity:?}")]
    ExceedsAllocation {
        requested: PrimitiveCounts,
        capacity: SceneCapacity,
    },
}

/// Scene converted to the four uniform blocks the tracer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePayload {
    pub materials: Vec<MaterialGpu>,
    pub circles: Vec<CircleGpu>,
    pub lines: Vec<LineGpu>,
    pub arcs: Vec<ArcGpu>,
}

impl ScenePayload {
    pub fn from_scene(scene: &Scene, limits: &UniformLimits) -> Result<Self, CapacityError> {
        let payload = Self {
            materials: scene
                .materials
                .iter()
                .map(|material| MaterialGpu {
                    color: material.color,
                    _color_padding: 0,
                    emissivity: material.emissivity,
                    kind: MaterialGpu::kind_code(material.kind),
                })
                .collect(),
            circles: scene
                .circles
                .iter()
                .map(|circle| CircleGpu {
                    center: circle.center,
                    radius: circle.radius,
                    material_id: circle.material_id,
                })
                .collect(),
            lines: scene
                .lines
                .iter()
                .map(|line| LineGpu {
                    a: line.a,
                    b: line.b,
                    material_id: line.material_id,
                    _padding: [0; 3],
                })
                .collect(),
            arcs: scene
                .arcs
                .iter()
                .map(|arc| ArcGpu {
                    center: arc.center,
                    radius: arc.radius,
                    _radius_padding: 0,
                    a: arc.a,
                    b: arc.b,
                    material_id: arc.material_id,
                })
                .collect(),
        };

        for (block, bytes) in payload.blocks() {
            if bytes.len() > limits.max_block_bytes {
                return Err(CapacityError::BlockTooLarge {
                    block,
                    bytes: bytes.len(),
                    limit: limits.max_block_bytes,
                });
            }
        }
        Ok(payload)
    }

    pub fn counts(&self) -> PrimitiveCounts {
        PrimitiveCounts {
            materials: self.materials.len(),
            circles: self.circles.len(),
            lines: self.lines.len(),
            arcs: self.arcs.len(),
        }
    }

    /// Named byte views of the uniform blocks in binding order.
    pub fn blocks(&self) -> [(&'static str, &[u8]); 4] {
        [
            ("materials", bytemuck::cast_slice(&self.materials)),
            ("circles", bytemuck::cast_slice(&self.circles)),
            ("lines", bytemuck::cast_slice(&self.lines)),
            ("arcs", bytemuck::cast_slice(&self.arcs)),
        ]
    }
}
