use bevy::prelude::*;

use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, IdleSettings},
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind},
};

/// Standing still. The fallback while grounded with nothing else to do.
pub struct Idle {
    core: MotionCore,
    pub settings: IdleSettings,
    /// Seconds since the last idle variation
    idle_timer: f32,
}

impl Default for Idle {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Idle", 0.0),
            settings: IdleSettings::default(),
            idle_timer: 0.0,
        }
    }
}

impl Motion for Idle {
    fn kind(&self) -> MotionKind {
        MotionKind::Idle
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.idle.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        ctx.state.is_grounded
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        // Short drops are not worth a fall
        ctx.state.is_grounded || ctx.state.ground_distance < 0.5
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        self.idle_timer = 0.0;
        ctx.state.idle_variation = 0;
        ctx.set_motion_phase(phase::IDLE, true);
        true
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        self.core.velocity = Vec3::ZERO;
        self.core.angular_velocity = Vec3::ZERO;

        if self.settings.variation_count <= 0 || self.settings.variation_interval <= 0.0 {
            return;
        }
        self.idle_timer += ctx.dt;
        if self.idle_timer >= self.settings.variation_interval {
            self.idle_timer = 0.0;
            ctx.state.idle_variation = rand::random_range(1..=self.settings.variation_count);
            ctx.set_motion_phase(phase::IDLE_VARIATION, true);
        }
    }

    fn clean_root_motion(&self, _state: &ControllerState, _translation: &mut Vec3, rotation: &mut Quat) {
        *rotation = Quat::IDENTITY;
    }
}
