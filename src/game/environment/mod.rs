//! Environment queries used by the ground check, the ledge tests and the camera.
//!
//! The motion controller never talks to the physics engine directly. Everything
//! goes through the [`Environment`] trait so the same code runs against avian's
//! `SpatialQuery` in the game and against a [`SimpleScene`] in headless runs.

mod avian;
mod scene;

use bevy::prelude::*;

pub use avian::{AvianEnvironment, BodyQuery, IgnoredCollisions};
pub use scene::{SceneShape, SimpleScene};

/// Non-owning reference to a body in the environment.
///
/// The controller only ever remembers *which* body it stands on or hangs from,
/// it never keeps the body alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct BodyHandle(pub u64);

impl From<Entity> for BodyHandle {
    fn from(entity: Entity) -> Self {
        Self(entity.to_bits())
    }
}

/// World position and rotation of a body.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct BodyPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for BodyPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BodyPose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Local-space point to world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// World-space point to local space
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }
}

/// Result of a ray or shape cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentHit {
    /// World-space contact point
    pub point: Vec3,
    /// Surface normal at the contact point
    pub normal: Vec3,
    /// Distance travelled along the cast direction
    pub distance: f32,
    /// Body that was hit, if the environment tracks bodies
    pub body: Option<BodyHandle>,
    /// Whether the hit collider is a trigger volume
    pub is_trigger: bool,
}

/// Queries the character needs from the world it moves through.
///
/// Implementations exclude the character's own collider and any body whose
/// collision was switched off with [`Environment::set_collision_ignored`].
/// Trigger volumes are never returned as blocking hits.
pub trait Environment {
    /// Cast a ray and return the closest hit within `max_distance`.
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32)
    -> Option<EnvironmentHit>;

    /// Sweep a sphere and return the closest hit within `max_distance`.
    fn cast_sphere(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<EnvironmentHit>;

    /// Sweep a sphere and return every body hit, sorted by distance.
    fn cast_sphere_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Vec<EnvironmentHit>;

    /// Latest pose of a body, `None` when the body no longer exists.
    fn body_transform(&self, body: BodyHandle) -> Option<BodyPose>;

    /// Toggle collision between the character and `body`.
    fn set_collision_ignored(&mut self, body: BodyHandle, ignored: bool);

    fn is_collision_ignored(&self, body: BodyHandle) -> bool;
}

/// Angle in degrees between a surface normal and world up
pub fn surface_angle(normal: Vec3) -> f32 {
    if normal.length_squared() < f32::EPSILON {
        return 0.0;
    }
    normal.angle_between(Vec3::Y).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_round_trip_point() {
        let pose = BodyPose::new(
            Vec3::new(2.0, 1.0, -3.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let local = Vec3::new(0.5, 0.25, 1.0);
        let world = pose.transform_point(local);

        assert!((pose.inverse_transform_point(world) - local).length() < 1e-5);
    }

    #[test]
    fn test_surface_angle() {
        assert!(surface_angle(Vec3::Y).abs() < 1e-4);
        assert!((surface_angle(Vec3::X) - 90.0).abs() < 1e-3);
        assert_eq!(surface_angle(Vec3::ZERO), 0.0);
    }
}
