use bevy::prelude::*;

use super::{CameraMode, RigFrame, ViewAngles};
use crate::game::{configs::CameraSettings, motion::step_angle};

/// Rig for every camera mode.
///
/// The player orbits freely with view input or while aiming. In
/// [`CameraMode::ThirdPersonFollow`] the view swings back behind the
/// character once the player lets go for `recenter_delay` seconds.
#[derive(Debug, Clone, Reflect)]
pub struct AdventureRig {
    pub recenter_delay: f32,
    /// Seconds since the last view input
    idle_time: f32,
}

impl Default for AdventureRig {
    fn default() -> Self {
        Self {
            recenter_delay: 1.5,
            idle_time: 0.0,
        }
    }
}

impl AdventureRig {
    pub fn update_view(
        &mut self,
        view: &mut ViewAngles,
        settings: &CameraSettings,
        mode: CameraMode,
        body_yaw: f32,
        frame: &RigFrame,
    ) {
        let has_view_input = frame.view_input != Vec2::ZERO;
        view.is_orbiting = frame.aiming || has_view_input;
        if has_view_input {
            self.idle_time = 0.0;
        } else {
            self.idle_time += frame.dt;
        }

        view.apply_input(settings, frame.view_input, body_yaw);

        if mode == CameraMode::ThirdPersonFollow && !view.is_orbiting && self.idle_time >= self.recenter_delay {
            view.yaw = step_angle(view.yaw, body_yaw, settings.follow_yaw_speed * frame.dt);
        }
    }
}
