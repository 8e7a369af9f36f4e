use bevy::prelude::*;

use super::yaw_rate_toward;
use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, SneakSettings},
    input::Action,
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind, Stance},
};

/// Crouched stance, toggled with the change-stance action
pub struct Sneak {
    core: MotionCore,
    pub settings: SneakSettings,
    moving: bool,
}

impl Default for Sneak {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Sneak", 10.0),
            settings: SneakSettings::default(),
            moving: false,
        }
    }
}

impl Motion for Sneak {
    fn kind(&self) -> MotionKind {
        MotionKind::Sneak
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.sneak.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        ctx.state.is_grounded
            && ctx.input.just_pressed(Action::ChangeStance)
            && ctx.previous.stance == Stance::Normal
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        let on_ground = ctx.state.is_grounded || ctx.state.ground_distance < 0.5;
        on_ground && !ctx.input.just_pressed(Action::ChangeStance)
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        ctx.state.stance = Stance::Sneak;
        ctx.body.height = self.settings.collider_height;
        self.moving = false;
        ctx.set_motion_phase(phase::SNEAK, true);
        true
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        ctx.state.stance = Stance::Normal;
        ctx.body.height = ctx.body.base_height;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        // Activation may come from a queued request rather than the toggle
        ctx.state.stance = Stance::Sneak;

        let moving = ctx.state.has_input();
        if moving != self.moving {
            self.moving = moving;
            let next = if moving { phase::SNEAK_MOVE } else { phase::SNEAK };
            ctx.set_motion_phase(next, true);
        }

        let state = &ctx.state;
        let speed = self.settings.speed * state.input_magnitude.min(1.0) * state.forward_scale;
        self.core.velocity = state.input_direction_world * speed;
        self.core.angular_velocity = if moving {
            Vec3::Y * yaw_rate_toward(state.input_angle_from_avatar, self.settings.rotation_speed, ctx.dt)
        } else {
            Vec3::ZERO
        };
    }

    fn clean_root_motion(&self, _state: &ControllerState, _translation: &mut Vec3, rotation: &mut Quat) {
        *rotation = Quat::IDENTITY;
    }
}
