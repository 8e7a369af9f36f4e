//! Ground and support detection.

use bevy::prelude::*;

use super::{CharacterBody, ControllerState};
use crate::game::{
    configs::GroundProbeSettings,
    environment::{Environment, surface_angle},
};

/// Classifies what the character stands on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundProbe {
    pub settings: GroundProbeSettings,
}

impl GroundProbe {
    pub fn new(settings: GroundProbeSettings) -> Self {
        Self { settings }
    }

    /// Fill the ground and support fields of `state`.
    ///
    /// `expect_grounded` allows the seam test, which only runs when the
    /// down ray fails while the character should still be on the ground.
    pub fn probe(
        &self,
        env: &dyn Environment,
        body: &CharacterBody,
        max_slope_angle: f32,
        expect_grounded: bool,
        state: &mut ControllerState,
        previous: &ControllerState,
    ) {
        let half_height = body.height * 0.5;
        let origin = body.center();
        let max_distance = half_height + self.settings.ray_extension;

        state.clear_ground();

        let ray_hit = env.cast_ray(origin, Vec3::NEG_Y, max_distance);
        if let Some(hit) = &ray_hit {
            let distance = hit.distance - half_height;
            let angle = surface_angle(hit.normal);
            state.ground_distance = distance;
            state.ground_normal = hit.normal;
            state.ground_angle = angle;
            state.ground_point = hit.point;
            state.support = hit.body;
            state.is_grounded = distance <= self.settings.grounded_distance;

            // Ramps push the ray hit further away than the feet really are
            if !state.is_grounded
                && distance <= self.settings.steep_slope_distance
                && angle > max_slope_angle * 0.5
            {
                state.is_grounded = true;
            }
        }

        // A ray that found ground too far below is trusted
        if ray_hit.is_none() && expect_grounded && previous.is_grounded {
            let radius = body.radius * self.settings.seam_radius_factor;
            let reach = (half_height - radius).max(0.0) + self.settings.grounded_distance;
            let hits = env.cast_sphere_all(origin, radius, Vec3::NEG_Y, reach);
            if hits.len() > 1 {
                trace!("Ground probe wedged between {} bodies", hits.len());
                Self::keep_previous_support(state, previous);
            }
        }

        self.resolve_support(env, state, previous);
    }

    fn keep_previous_support(state: &mut ControllerState, previous: &ControllerState) {
        state.is_grounded = previous.is_grounded;
        state.ground_normal = previous.ground_normal;
        state.ground_angle = previous.ground_angle;
        state.ground_distance = previous.ground_distance;
        state.ground_point = previous.ground_point;
        state.support = previous.support;
    }

    fn resolve_support(&self, env: &dyn Environment, state: &mut ControllerState, previous: &ControllerState) {
        let Some(support) = state.support else {
            state.support_contact_local = Vec3::ZERO;
            return;
        };
        let Some(pose) = env.body_transform(support) else {
            state.support = None;
            return;
        };

        state.support_pose = pose;
        state.support_contact_local = if previous.support == Some(support) {
            previous.support_contact_local
        } else {
            pose.inverse_transform_point(state.ground_point)
        };
    }

    /// Flag a wall ahead of the input direction
    pub fn probe_forward(
        &self,
        env: &dyn Environment,
        body: &CharacterBody,
        max_slope_angle: f32,
        state: &mut ControllerState,
    ) {
        state.is_forward_blocked = false;
        state.block_normal = Vec3::ZERO;
        state.forward_scale = 1.0;

        let direction = state.input_direction_world;
        if direction.length_squared() <= f32::EPSILON {
            return;
        }

        let origin = body.position + Vec3::Y * self.settings.bumper_height;
        let reach = body.radius + self.settings.bumper_distance;
        if let Some(hit) = env.cast_ray(origin, direction, reach)
            && surface_angle(hit.normal) > max_slope_angle
        {
            state.is_forward_blocked = true;
            state.block_normal = hit.normal;
            state.forward_scale = self.blocked_scale(state);
        }
    }

    /// Movement scale in [0, 1] for input pushing into a blocking wall.
    ///
    /// Head-on input stops, input parallel to the wall keeps full speed and
    /// everything in between fades linearly over the blend angle.
    pub fn blocked_scale(&self, state: &ControllerState) -> f32 {
        if !state.is_forward_blocked {
            return 1.0;
        }
        let wall = Vec3::new(state.block_normal.x, 0.0, state.block_normal.z);
        let direction = state.input_direction_world;
        if wall.length_squared() <= f32::EPSILON || direction.length_squared() <= f32::EPSILON {
            return 1.0;
        }

        // 0 when running straight into the wall, 90 when running along it
        let into_wall = (-wall.normalize()).angle_between(direction.normalize()).to_degrees();
        let blend = self.settings.bumper_blend_angle.max(f32::EPSILON);
        ((into_wall - (90.0 - blend)) / blend).clamp(0.0, 1.0)
    }
}
