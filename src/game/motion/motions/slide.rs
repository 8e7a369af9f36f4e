use bevy::prelude::*;

use super::{move_towards, yaw_rate_toward};
use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, SlideSettings},
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind, signed_yaw_between},
};

/// Sliding down ground too steep to stand on while the player lets go
pub struct Slide {
    core: MotionCore,
    pub settings: SlideSettings,
    speed: f32,
}

impl Default for Slide {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Slide", 20.0),
            settings: SlideSettings::default(),
            speed: 0.0,
        }
    }
}

impl Slide {
    fn wants_to_slide(&self, state: &ControllerState) -> bool {
        state.is_grounded && !state.has_input() && state.ground_angle > self.settings.min_slide_angle
    }
}

/// Gravity projected onto the ground plane
fn downhill(gravity: Vec3, normal: Vec3) -> Vec3 {
    gravity - normal * gravity.dot(normal)
}

impl Motion for Slide {
    fn kind(&self) -> MotionKind {
        MotionKind::Slide
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.slide.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        self.wants_to_slide(ctx.state)
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        self.wants_to_slide(ctx.state)
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        let slope = downhill(ctx.settings.gravity, ctx.state.ground_normal).normalize_or_zero();
        self.speed = ctx.previous.velocity.dot(slope).max(0.0);
        ctx.set_motion_phase(phase::SLIDE, true);
        true
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        let pull = downhill(ctx.settings.gravity, ctx.state.ground_normal);
        let direction = pull.normalize_or_zero();
        self.speed = move_towards(self.speed, self.settings.max_speed, pull.length() * ctx.dt);
        self.core.velocity = direction * self.speed;

        let angle = signed_yaw_between(ctx.body.forward(), direction);
        self.core.angular_velocity = Vec3::Y * yaw_rate_toward(angle, self.settings.rotation_speed, ctx.dt);
    }

    fn clean_root_motion(&self, _state: &ControllerState, translation: &mut Vec3, rotation: &mut Quat) {
        *translation = Vec3::ZERO;
        *rotation = Quat::IDENTITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        configs::CharacterConfig,
        environment::SimpleScene,
        input::InputSnapshot,
        motion::test_support::Simulation,
    };

    fn on_slope(angle: f32) -> Simulation {
        let mut scene = SimpleScene::new();
        scene.add_slope(Vec3::ZERO, angle);
        Simulation::new(scene, &CharacterConfig::default(), Vec3::ZERO)
    }

    #[test]
    fn test_slides_down_steep_ground() {
        let mut sim = on_slope(31.0);
        sim.run(60);
        assert_eq!(sim.active(), Some(MotionKind::Slide));

        let position = sim.controller.body.position;
        assert!(position.z > 0.1, "position {position}");
        assert!(position.y < 0.0);
        // Turned to face down the slope, which is +Z
        assert!(sim.controller.body.forward().z > 0.9);
    }

    #[test]
    fn test_stands_on_gentle_ground() {
        let mut sim = on_slope(29.0);
        sim.run(30);
        assert_eq!(sim.active(), Some(MotionKind::Idle));
        assert!(sim.controller.body.position.length() < 0.05);
    }

    #[test]
    fn test_input_cancels_slide() {
        let mut sim = on_slope(31.0);
        sim.run(10);
        sim.input = InputSnapshot::default().with_movement(Vec2::Y);
        sim.step();
        assert_ne!(sim.active(), Some(MotionKind::Slide));
    }
}
