//! Analytic scene made of planes and oriented boxes.
//!
//! Used for headless simulation (server-side characters, tests). Sphere casts
//! against boxes treat the box as inflated by the sphere radius, which is exact
//! on faces and slightly generous on edges and corners.

use std::collections::HashSet;

use bevy::prelude::*;

use super::{BodyHandle, BodyPose, Environment, EnvironmentHit};

/// Shape of a scene body, expressed in the body's local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneShape {
    /// One-sided infinite plane through the local origin, facing `normal`
    Plane { normal: Vec3 },
    /// Box centred on the local origin
    Cuboid { half_extents: Vec3 },
}

#[derive(Debug, Clone)]
struct SceneBody {
    handle: BodyHandle,
    shape: SceneShape,
    pose: BodyPose,
    is_trigger: bool,
}

#[derive(Debug, Default, Clone)]
pub struct SimpleScene {
    bodies: Vec<SceneBody>,
    ignored: HashSet<BodyHandle>,
    next_handle: u64,
}

impl SimpleScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, shape: SceneShape, pose: BodyPose, is_trigger: bool) -> BodyHandle {
        self.next_handle += 1;
        let handle = BodyHandle(self.next_handle);
        self.bodies.push(SceneBody {
            handle,
            shape,
            pose,
            is_trigger,
        });
        handle
    }

    /// Flat ground at `height`
    pub fn add_ground(&mut self, height: f32) -> BodyHandle {
        self.add_plane(Vec3::new(0.0, height, 0.0), Vec3::Y)
    }

    /// Plane through `point` facing `normal`
    pub fn add_plane(&mut self, point: Vec3, normal: Vec3) -> BodyHandle {
        let normal = normal.normalize_or(Vec3::Y);
        let rotation = Quat::from_rotation_arc(Vec3::Y, normal);
        self.insert(
            SceneShape::Plane { normal: Vec3::Y },
            BodyPose::new(point, rotation),
            false,
        )
    }

    /// Ground plane tilted by `angle_degrees` about the X axis, so it slopes
    /// down towards +Z
    pub fn add_slope(&mut self, point: Vec3, angle_degrees: f32) -> BodyHandle {
        let rotation = Quat::from_rotation_x(angle_degrees.to_radians());
        let normal = rotation * Vec3::Y;
        self.add_plane(point, normal)
    }

    pub fn add_cuboid(&mut self, center: Vec3, half_extents: Vec3, rotation: Quat) -> BodyHandle {
        self.insert(
            SceneShape::Cuboid { half_extents },
            BodyPose::new(center, rotation),
            false,
        )
    }

    pub fn add_trigger(&mut self, center: Vec3, half_extents: Vec3) -> BodyHandle {
        self.insert(
            SceneShape::Cuboid { half_extents },
            BodyPose::new(center, Quat::IDENTITY),
            true,
        )
    }

    /// Teleport a body, e.g. to drive a moving platform
    pub fn set_body_pose(&mut self, handle: BodyHandle, pose: BodyPose) {
        if let Some(body) = self.bodies.iter_mut().find(|b| b.handle == handle) {
            body.pose = pose;
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &SceneBody> {
        self.bodies
            .iter()
            .filter(|b| !b.is_trigger && !self.ignored.contains(&b.handle))
    }

    fn cast(&self, origin: Vec3, radius: f32, direction: Vec3, max_distance: f32) -> Vec<EnvironmentHit> {
        let Some(direction) = direction.try_normalize() else {
            return Vec::new();
        };
        let mut hits: Vec<EnvironmentHit> = self
            .candidates()
            .filter_map(|body| cast_body(body, origin, radius, direction, max_distance))
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

fn cast_body(
    body: &SceneBody,
    origin: Vec3,
    radius: f32,
    direction: Vec3,
    max_distance: f32,
) -> Option<EnvironmentHit> {
    let local_origin = body.pose.inverse_transform_point(origin);
    let local_direction = body.pose.rotation.inverse() * direction;

    let (distance, local_normal) = match body.shape {
        SceneShape::Plane { normal } => {
            ray_plane(local_origin, local_direction, normal, radius, max_distance)?
        }
        SceneShape::Cuboid { half_extents } => ray_box(
            local_origin,
            local_direction,
            half_extents + Vec3::splat(radius),
            max_distance,
        )?,
    };

    let normal = (body.pose.rotation * local_normal).normalize_or(Vec3::Y);
    Some(EnvironmentHit {
        point: origin + direction * distance - normal * radius,
        normal,
        distance,
        body: Some(body.handle),
        is_trigger: body.is_trigger,
    })
}

fn ray_plane(
    origin: Vec3,
    direction: Vec3,
    normal: Vec3,
    offset: f32,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let height = origin.dot(normal) - offset;
    if height < 0.0 {
        // Behind the plane, or already overlapping the swept sphere
        return if height > -offset.max(0.0) - 1e-4 && offset > 0.0 {
            Some((0.0, normal))
        } else {
            None
        };
    }
    let denom = direction.dot(normal);
    if denom >= -1e-6 {
        return None;
    }
    let t = height / -denom;
    (t <= max_distance).then_some((t, normal))
}

fn ray_box(
    origin: Vec3,
    direction: Vec3,
    half_extents: Vec3,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let inside = origin.abs().cmple(half_extents).all();
    if inside {
        return Some((0.0, -direction));
    }

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let h = half_extents[axis];
        if d.abs() < 1e-8 {
            if o < -h || o > h {
                return None;
            }
            continue;
        }
        let mut t0 = (-h - o) / d;
        let mut t1 = (h - o) / d;
        let mut sign = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            sign = 1.0;
        }
        if t0 > t_enter {
            t_enter = t0;
            enter_normal = Vec3::ZERO;
            enter_normal[axis] = sign;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    (t_enter >= 0.0 && t_enter <= max_distance).then_some((t_enter, enter_normal))
}

impl Environment for SimpleScene {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<EnvironmentHit> {
        self.cast(origin, 0.0, direction, max_distance).into_iter().next()
    }

    fn cast_sphere(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<EnvironmentHit> {
        self.cast(origin, radius, direction, max_distance)
            .into_iter()
            .next()
    }

    fn cast_sphere_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Vec<EnvironmentHit> {
        self.cast(origin, radius, direction, max_distance)
    }

    fn body_transform(&self, body: BodyHandle) -> Option<BodyPose> {
        self.bodies
            .iter()
            .find(|b| b.handle == body)
            .map(|b| b.pose)
    }

    fn set_collision_ignored(&mut self, body: BodyHandle, ignored: bool) {
        if ignored {
            self.ignored.insert(body);
        } else {
            self.ignored.remove(&body);
        }
    }

    fn is_collision_ignored(&self, body: BodyHandle) -> bool {
        self.ignored.contains(&body)
    }
}
