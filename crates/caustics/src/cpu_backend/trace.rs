//! 2D light transport: rays start at the pixel's world position in a uniformly random
//! direction and bounce until they reach an emitter, leave the scene, or run out of bounces.

use std::f32::consts::TAU;

use render_protocol::ScenePayload;

use super::rng::Pcg32;

const MAX_BOUNCES: u32 = 8;
const RAY_EPSILON: f32 = 1e-4;
const DIELECTRIC_IOR: f32 = 1.5;

const DIFFUSE: u32 = 0;
const SPECULAR: u32 = 1;
const DIELECTRIC: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Hit {
    pub distance: f32,
    /// Unit normal pointing away from the primitive's inside.
    pub normal: [f32; 2],
    pub material_id: u32,
}

/// Material id that does not exist in the uploaded scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MissingMaterial(pub u32);

pub(crate) fn trace_sample(
    scene: &ScenePayload,
    start: [f32; 2],
    rng: &mut Pcg32,
) -> Result<[f32; 3], MissingMaterial> {
    let angle = TAU * rng.next_f32();
    let mut origin = start;
    let mut direction = [angle.cos(), angle.sin()];
    let mut throughput = [1.0_f32; 3];

    for _ in 0..MAX_BOUNCES {
        let Some(hit) = closest_hit(scene, origin, direction) else {
            break;
        };
        let material = scene
            .materials
            .get(hit.material_id as usize)
            .ok_or(MissingMaterial(hit.material_id))?;
        if material.emissivity.iter().any(|channel| *channel > 0.0) {
            return Ok(multiply(throughput, material.emissivity));
        }

        let point = add(origin, scale(direction, hit.distance));
        let entering = dot(direction, hit.normal) < 0.0;
        let facing = if entering {
            hit.normal
        } else {
            scale(hit.normal, -1.0)
        };

        direction = match material.kind {
            DIFFUSE => {
                throughput = multiply(throughput, material.color);
                cosine_direction(facing, rng)
            }
            SPECULAR => {
                throughput = multiply(throughput, material.color);
                reflect(direction, facing)
            }
            DIELECTRIC => {
                let (next, transmitted) = dielectric_direction(direction, facing, entering, rng);
                if transmitted {
                    throughput = multiply(throughput, material.color);
                }
                next
            }
            _ => break,
        };
        origin = point;
    }
    Ok([0.0; 3])
}

pub(crate) fn closest_hit(
    scene: &ScenePayload,
    origin: [f32; 2],
    direction: [f32; 2],
) -> Option<Hit> {
    let mut closest: Option<Hit> = None;
    let mut consider = |distance: f32, normal: [f32; 2], material_id: u32| {
        if closest.is_none_or(|hit| distance < hit.distance) {
            closest = Some(Hit {
                distance,
                normal,
                material_id,
            });
        }
    };

    for circle in &scene.circles {
        let nearest = circle_roots(origin, direction, circle.center, circle.radius).next();
        if let Some(distance) = nearest {
            let point = add(origin, scale(direction, distance));
            let normal = scale(sub(point, circle.center), 1.0 / circle.radius);
            consider(distance, normal, circle.material_id);
        }
    }
    for line in &scene.lines {
        if let Some((distance, normal)) = segment_hit(origin, direction, line.a, line.b) {
            consider(distance, normal, line.material_id);
        }
    }
    for arc in &scene.arcs {
        let offset_at = |distance: f32| sub(add(origin, scale(direction, distance)), arc.center);
        let on_arc = circle_roots(origin, direction, arc.center, arc.radius)
            .find(|distance| dot(offset_at(*distance), arc.a) >= arc.b);
        if let Some(distance) = on_arc {
            consider(distance, scale(offset_at(distance), 1.0 / arc.radius), arc.material_id);
        }
    }
    closest
}

/// Ray parameters beyond the epsilon where the ray crosses the circle, nearest first.
fn circle_roots(
    origin: [f32; 2],
    direction: [f32; 2],
    center: [f32; 2],
    radius: f32,
) -> impl Iterator<Item = f32> {
    let offset = sub(origin, center);
    let half_b = dot(offset, direction);
    let c = dot(offset, offset) - radius * radius;
    let discriminant = half_b * half_b - c;
    let roots = if discriminant < 0.0 {
        [f32::NAN; 2]
    } else {
        let root = discriminant.sqrt();
        [-half_b - root, -half_b + root]
    };
    roots
        .into_iter()
        .filter(|distance| *distance > RAY_EPSILON)
}

fn segment_hit(
    origin: [f32; 2],
    direction: [f32; 2],
    a: [f32; 2],
    b: [f32; 2],
) -> Option<(f32, [f32; 2])> {
    let edge = sub(b, a);
    let denominator = cross(direction, edge);
    if denominator.abs() < 1e-12 {
        return None;
    }
    let to_start = sub(a, origin);
    let distance = cross(to_start, edge) / denominator;
    let along = cross(to_start, direction) / denominator;
    if distance <= RAY_EPSILON || !(0.0..=1.0).contains(&along) {
        return None;
    }
    let length = edge[0].hypot(edge[1]);
    Some((distance, [-edge[1] / length, edge[0] / length]))
}

fn cosine_direction(normal: [f32; 2], rng: &mut Pcg32) -> [f32; 2] {
    let sin_theta = 2.0 * rng.next_f32() - 1.0;
    let cos_theta = (1.0 - sin_theta * sin_theta).max(0.0).sqrt();
    let tangent = [-normal[1], normal[0]];
    add(scale(normal, cos_theta), scale(tangent, sin_theta))
}

fn reflect(direction: [f32; 2], normal: [f32; 2]) -> [f32; 2] {
    sub(direction, scale(normal, 2.0 * dot(direction, normal)))
}

/// Returns the scattered direction and whether it was transmitted.
fn dielectric_direction(
    direction: [f32; 2],
    normal: [f32; 2],
    entering: bool,
    rng: &mut Pcg32,
) -> ([f32; 2], bool) {
    let eta = if entering {
        1.0 / DIELECTRIC_IOR
    } else {
        DIELECTRIC_IOR
    };
    let cos_incident = -dot(direction, normal);
    let sin2_transmitted = eta * eta * (1.0 - cos_incident * cos_incident);
    if sin2_transmitted >= 1.0 {
        return (reflect(direction, normal), false);
    }
    let cos_transmitted = (1.0 - sin2_transmitted).sqrt();

    let r0 = ((1.0 - DIELECTRIC_IOR) / (1.0 + DIELECTRIC_IOR)).powi(2);
    let cos = if entering {
        cos_incident
    } else {
        cos_transmitted
    };
    let reflectance = r0 + (1.0 - r0) * (1.0 - cos).powi(5);
    if rng.next_f32() < reflectance {
        return (reflect(direction, normal), false);
    }
    let refracted = add(
        scale(direction, eta),
        scale(normal, eta * cos_incident - cos_transmitted),
    );
    (refracted, true)
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

fn dot(left: [f32; 2], right: [f32; 2]) -> f32 {
    left[0] * right[0] + left[1] * right[1]
}

fn cross(left: [f32; 2], right: [f32; 2]) -> f32 {
    left[0] * right[1] - left[1] * right[0]
}

fn multiply(left: [f32; 3], right: [f32; 3]) -> [f32; 3] {
    [left[0] * right[0], left[1] * right[1], left[2] * right[2]]
}
