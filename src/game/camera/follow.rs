use bevy::prelude::*;

use super::{RigFrame, ViewAngles};
use crate::game::{configs::CameraSettings, motion::step_angle};

/// Fixed third-person rig that always swings back behind the character.
/// View input only tilts it.
#[derive(Debug, Clone, Reflect)]
pub struct FollowRig {
    pub allow_pitch: bool,
}

impl Default for FollowRig {
    fn default() -> Self {
        Self { allow_pitch: true }
    }
}

impl FollowRig {
    pub fn update_view(&mut self, view: &mut ViewAngles, settings: &CameraSettings, body_yaw: f32, frame: &RigFrame) {
        view.is_orbiting = false;
        if self.allow_pitch {
            view.apply_input(settings, Vec2::new(0.0, frame.view_input.y), body_yaw);
        }
        view.yaw = step_angle(view.yaw, body_yaw, settings.follow_yaw_speed * frame.dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{camera::CameraRig, environment::SimpleScene};

    #[test]
    fn test_chases_body_yaw_at_limited_rate() {
        let scene = SimpleScene::new();
        let settings = CameraSettings::default();
        let mut rig = FollowRig::default();
        let mut view = ViewAngles::default();
        let frame = RigFrame {
            dt: 0.25,
            anchor: Vec3::Y,
            body_position: Vec3::ZERO,
            body_rotation: Quat::from_rotation_y(90_f32.to_radians()),
            body_radius: 0.4,
            motion_offset: Vec3::ZERO,
            view_input: Vec2::new(50.0, 0.0),
            aiming: true,
            env: &scene,
        };

        rig.update_view(&mut view, &settings, frame.body_yaw(), &frame);
        assert!(!view.is_orbiting);
        assert!((view.yaw - settings.follow_yaw_speed * 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_follow_rig_rejects_other_modes() {
        let mut rig = CameraRig::follow(Entity::PLACEHOLDER, CameraSettings::default());
        assert_eq!(rig.mode(), crate::game::camera::CameraMode::ThirdPersonFollow);
        rig.transition_to_mode(crate::game::camera::CameraMode::FirstPerson);
        assert_eq!(rig.mode(), crate::game::camera::CameraMode::ThirdPersonFollow);
    }
}
