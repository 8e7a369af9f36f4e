use bevy::prelude::*;

use super::{AirPhase, AirborneCycle};
use crate::game::{
    animation::AnimationStateRegistry,
    configs::{CharacterConfig, FallSettings},
    motion::{Motion, MotionContext, MotionCore, MotionKind},
};

/// Dropping off a ledge without jumping
pub struct Fall {
    core: MotionCore,
    pub settings: FallSettings,
    cycle: AirborneCycle,
}

impl Default for Fall {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Fall", 25.0),
            settings: FallSettings::default(),
            cycle: AirborneCycle::default(),
        }
    }
}

impl Fall {
    pub fn phase(&self) -> AirPhase {
        self.cycle.phase
    }
}

impl Motion for Fall {
    fn kind(&self) -> MotionKind {
        MotionKind::Fall
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn bind(&mut self, registry: &AnimationStateRegistry) {
        self.cycle.bind(registry);
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.fall.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        !ctx.state.is_grounded
            && ctx.state.ground_distance > self.settings.min_fall_height
            && ctx.active != Some(MotionKind::Jump)
    }

    fn test_update(&self, _ctx: &MotionContext) -> bool {
        self.cycle.phase != AirPhase::Done
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        self.core.expects_grounded = false;
        self.cycle.start(AirPhase::TopToFall, ctx);
        true
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        ctx.body.height = ctx.body.base_height;
        self.core.expects_grounded = true;
        self.cycle.phase = AirPhase::Done;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        self.cycle.update(&self.settings.airborne, 0.0, &mut self.core, ctx);
    }
}
