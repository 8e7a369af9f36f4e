use bevy::prelude::*;

use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, PunchSettings},
    input::Action,
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind, Stance},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum PunchStage {
    #[default]
    WindUp,
    Strike,
    Recover,
    Done,
}

/// Single strike on the primary attack. Only the recovery can be cut short.
pub struct Punch {
    core: MotionCore,
    pub settings: PunchSettings,
    pub stage: PunchStage,
    stage_time: f32,
}

impl Default for Punch {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Punch", 12.0).interruptible(false),
            settings: PunchSettings::default(),
            stage: PunchStage::Done,
            stage_time: 0.0,
        }
    }
}

impl Punch {
    fn enter(&mut self, stage: PunchStage, ctx: &mut MotionContext) {
        self.stage = stage;
        self.stage_time = 0.0;
        match stage {
            PunchStage::WindUp => ctx.set_motion_phase(phase::PUNCH, true),
            PunchStage::Strike => ctx.set_motion_phase(phase::PUNCH_STRIKE, true),
            PunchStage::Recover => {
                self.core.is_interruptible = true;
                ctx.set_motion_phase(phase::PUNCH_RECOVER, true);
            }
            PunchStage::Done => {}
        }
    }
}

impl Motion for Punch {
    fn kind(&self) -> MotionKind {
        MotionKind::Punch
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.punch.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        ctx.state.is_grounded
            && ctx.input.just_pressed(Action::PrimaryAttack)
            && ctx.state.stance == Stance::Normal
    }

    fn test_update(&self, _ctx: &MotionContext) -> bool {
        self.stage != PunchStage::Done
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        self.core.is_interruptible = false;
        self.enter(PunchStage::WindUp, ctx);
        true
    }

    fn on_deactivate(&mut self, _ctx: &mut MotionContext) {
        self.stage = PunchStage::Done;
        self.core.is_interruptible = false;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        self.core.velocity = Vec3::ZERO;
        self.core.angular_velocity = Vec3::ZERO;

        self.stage_time += ctx.dt;
        let next = match self.stage {
            PunchStage::WindUp if self.stage_time >= self.settings.wind_up_time => Some(PunchStage::Strike),
            PunchStage::Strike if self.stage_time >= self.settings.strike_time => Some(PunchStage::Recover),
            PunchStage::Recover if self.stage_time >= self.settings.recover_time => Some(PunchStage::Done),
            _ => None,
        };
        if let Some(next) = next {
            trace!("Punch {:?} -> {next:?}", self.stage);
            self.enter(next, ctx);
        }
    }

    /// The strike clip lunges forward, the motion keeps the heading fixed
    fn clean_root_motion(&self, _state: &ControllerState, _translation: &mut Vec3, rotation: &mut Quat) {
        *rotation = Quat::IDENTITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{input::InputSnapshot, motion::test_support::Simulation};

    #[test]
    fn test_stages_and_lunge() {
        let mut sim = Simulation::on_flat_ground();
        sim.run(5);
        sim.input = InputSnapshot::default().press(Action::PrimaryAttack);
        sim.step();
        sim.input = InputSnapshot::default();
        assert_eq!(sim.active(), Some(MotionKind::Punch));

        let striking = sim.run_until(30, |sim| {
            sim.controller
                .motion_as::<Punch>()
                .is_some_and(|punch| punch.stage == PunchStage::Strike)
        });
        assert!(striking);

        let done = sim.run_until(60, |sim| sim.active() != Some(MotionKind::Punch));
        assert!(done);
        // Root motion from the strike clip carries the character forward
        assert!(sim.controller.body.position.z < -0.05);
    }

    #[test]
    fn test_wind_up_cannot_be_interrupted() {
        let mut sim = Simulation::on_flat_ground();
        sim.run(5);
        sim.input = InputSnapshot::default().press(Action::PrimaryAttack);
        sim.step();

        sim.input = InputSnapshot::default().press(Action::Jump);
        sim.step();
        assert_eq!(sim.active(), Some(MotionKind::Punch));
    }

    #[test]
    fn test_recovery_can_be_interrupted() {
        let mut sim = Simulation::on_flat_ground();
        sim.run(5);
        sim.input = InputSnapshot::default().press(Action::PrimaryAttack);
        sim.step();
        sim.input = InputSnapshot::default();
        let recovering = sim.run_until(60, |sim| {
            sim.controller
                .motion_as::<Punch>()
                .is_some_and(|punch| punch.stage == PunchStage::Recover)
        });
        assert!(recovering);

        sim.input = InputSnapshot::default().press(Action::Jump);
        sim.step();
        assert_eq!(sim.active(), Some(MotionKind::Jump));
    }
}
