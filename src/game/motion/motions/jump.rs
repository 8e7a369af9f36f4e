use bevy::prelude::*;

use super::{AirPhase, AirborneCycle};
use crate::game::{
    animation::AnimationStateRegistry,
    configs::{CharacterConfig, JumpSettings},
    input::Action,
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind, Stance},
};

/// Player-triggered jump: an upward impulse followed by the airborne cycle.
pub struct Jump {
    core: MotionCore,
    pub settings: JumpSettings,
    cycle: AirborneCycle,
}

impl Default for Jump {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Jump", 30.0),
            settings: JumpSettings::default(),
            cycle: AirborneCycle::default(),
        }
    }
}

impl Jump {
    pub fn phase(&self) -> AirPhase {
        self.cycle.phase
    }
}

impl Motion for Jump {
    fn kind(&self) -> MotionKind {
        MotionKind::Jump
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
        self.settings = config.jump.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        ctx.state.is_grounded
            && ctx.input.just_pressed(Action::Jump)
            && ctx.active != Some(MotionKind::Jump)
            && ctx.state.stance != Stance::Climb
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        if self.cycle.phase == AirPhase::Done {
            return false;
        }
        // A fresh press while recovering hands over to a new jump
        let recovering = matches!(self.cycle.phase, AirPhase::Land | AirPhase::Recover);
        !(recovering && ctx.input.just_pressed(Action::Jump))
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        ctx.forces.add_impulse(Vec3::Y * self.settings.impulse);
        self.core.expects_grounded = false;
        self.cycle.start(AirPhase::Launch, ctx);
        true
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        ctx.body.height = ctx.body.base_height;
        self.core.expects_grounded = true;
        self.cycle.phase = AirPhase::Done;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        let settings = &self.settings;
        self.cycle
            .update(&settings.airborne, settings.launch_time, &mut self.core, ctx);
    }

    fn determine_grounding(&self, state: &ControllerState) -> bool {
        !self.core.is_active || (!self.cycle.phase.ignores_ground() && state.is_grounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        environment::SimpleScene,
        input::InputSnapshot,
        motion::test_support::{Harness, Simulation},
    };

    #[test]
    fn test_needs_ground_and_press() {
        let mut harness = Harness::flat_ground();
        let jump = Jump::default();
        harness.with_context(|ctx| assert!(!jump.test_activate(ctx)));

        harness.input = InputSnapshot::default().press(Action::Jump);
        harness.with_context(|ctx| assert!(jump.test_activate(ctx)));

        harness.state.stance = Stance::Climb;
        harness.with_context(|ctx| assert!(!jump.test_activate(ctx)));
    }

    #[test]
    fn test_impulse_sets_launch_velocity() {
        let mut harness = Harness::flat_ground();
        let mut jump = Jump::default();
        harness.with_context(|ctx| assert!(jump.activate(None, ctx)));
        // 31 / 5
        assert!((harness.forces.accumulated_velocity.y - 6.2).abs() < 1e-4);
        assert!(!jump.core().expects_grounded);
    }

    #[test]
    fn test_vetoes_ground_while_rising() {
        let mut jump = Jump::default();
        jump.core.is_active = true;
        let mut state = ControllerState::default();
        state.is_grounded = true;
        assert!(!jump.determine_grounding(&state));

        jump.cycle.phase = AirPhase::FallPose;
        assert!(jump.determine_grounding(&state));
    }

    #[test]
    fn test_jump_peak_height() {
        let mut scene = SimpleScene::new();
        scene.add_ground(0.0);
        let mut config = CharacterConfig::default();
        config.controller.gravity = Vec3::new(0.0, -11.81, 0.0);
        let mut sim = Simulation::new(scene, &config, Vec3::ZERO);
        sim.run(10);

        sim.input = InputSnapshot::default().press(Action::Jump);
        sim.step();
        assert_eq!(sim.active(), Some(MotionKind::Jump));
        sim.input = InputSnapshot::default();

        let mut peak: f32 = 0.0;
        for _ in 0..120 {
            sim.step();
            peak = peak.max(sim.controller.body.position.y);
        }
        // v^2 / 2g with v = 31 / 5
        assert!((peak - 1.6275).abs() < 0.1, "peak {peak}");
        assert!(sim.controller.is_grounded());
        assert_ne!(sim.active(), Some(MotionKind::Jump));
    }

    #[test]
    fn test_lands_and_recovers_to_idle() {
        let mut sim = Simulation::on_flat_ground();
        sim.run(5);
        sim.input = InputSnapshot::default().press(Action::Jump);
        sim.step();
        sim.input = InputSnapshot::default();

        let landed = sim.run_until(120, |sim| {
            sim.controller
                .motion_as::<Jump>()
                .is_some_and(|jump| jump.phase() == AirPhase::Land)
        });
        assert!(landed);
        let recovered = sim.run_until(60, |sim| sim.active() == Some(MotionKind::Idle));
        assert!(recovered);
        assert_eq!(sim.controller.body.height, sim.controller.body.base_height);
    }
}
