//! The rise, top, fall and land cycle shared by [`super::Jump`] and
//! [`super::Fall`].

use bevy::prelude::*;

use super::{move_towards, yaw_rate_toward};
use crate::game::{
    animation::{AnimationStateRegistry, StateId, states, states::phase},
    configs::AirborneSettings,
    motion::{MotionContext, MotionCore},
};

/// Seconds the top pose holds before the fall starts anyway
const TOP_HOLD: f32 = 0.3;
/// Seconds the top-to-fall blend plays before the looping fall pose
const TOP_TO_FALL_TIME: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum AirPhase {
    #[default]
    Launch,
    Rise,
    RisePose,
    RiseToTop,
    Top,
    TopToFall,
    FallPose,
    Land,
    Recover,
    Done,
}

impl AirPhase {
    /// Still off the ground
    pub fn is_airborne(self) -> bool {
        !matches!(self, Self::Land | Self::Recover | Self::Done)
    }

    /// Ground contact is ignored while the character is still going up
    pub fn ignores_ground(self) -> bool {
        matches!(
            self,
            Self::Launch | Self::Rise | Self::RisePose | Self::RiseToTop | Self::Top
        )
    }

    fn motion_phase(self) -> i32 {
        match self {
            Self::Launch => phase::JUMP_LAUNCH,
            Self::Rise => phase::JUMP_RISE,
            Self::RisePose => phase::JUMP_RISE_POSE,
            Self::RiseToTop => phase::JUMP_RISE_TO_TOP,
            Self::Top => phase::JUMP_TOP,
            Self::TopToFall => phase::JUMP_TOP_TO_FALL,
            Self::FallPose => phase::JUMP_FALL_POSE,
            Self::Land => phase::JUMP_LAND,
            Self::Recover | Self::Done => phase::NONE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AirborneCycle {
    pub phase: AirPhase,
    phase_time: f32,
    /// Horizontal velocity carried from the ground
    launch_velocity: Vec3,
    recover_idle: StateId,
    recover_run: StateId,
}

impl AirborneCycle {
    pub fn bind(&mut self, registry: &AnimationStateRegistry) {
        self.recover_idle = registry.resolve(states::JUMP_RECOVER_IDLE);
        self.recover_run = registry.resolve(states::JUMP_RECOVER_RUN);
    }

    /// Begin the cycle at `phase`, keeping the current ground momentum
    pub fn start(&mut self, phase: AirPhase, ctx: &mut MotionContext) {
        let velocity = ctx.previous.velocity;
        self.launch_velocity = Vec3::new(velocity.x, 0.0, velocity.z);
        self.enter(phase, ctx);
    }

    pub fn phase_time(&self) -> f32 {
        self.phase_time
    }

    fn enter(&mut self, phase: AirPhase, ctx: &mut MotionContext) {
        trace!("Airborne phase {:?} -> {phase:?}", self.phase);
        self.phase = phase;
        self.phase_time = 0.0;
        let motion_phase = phase.motion_phase();
        if motion_phase != phase::NONE {
            ctx.set_motion_phase(motion_phase, true);
        }
    }

    /// Advance one frame. `launch_time` is how long the launch pose holds
    /// before the rise begins.
    pub fn update(
        &mut self,
        settings: &AirborneSettings,
        launch_time: f32,
        core: &mut MotionCore,
        ctx: &mut MotionContext,
    ) {
        self.phase_time += ctx.dt;
        let vertical = ctx.forces.accumulated_velocity.y;

        if self.phase.is_airborne() {
            let landing = ctx.state.is_grounded
                && (matches!(self.phase, AirPhase::TopToFall | AirPhase::FallPose) || vertical <= 0.0);
            if landing {
                self.land(core, ctx);
            } else {
                self.step_air_phase(settings, launch_time, vertical, ctx);
            }
        } else {
            self.step_ground_phase(settings, ctx);
        }

        self.steer(settings, core, ctx);
    }

    fn step_air_phase(&mut self, settings: &AirborneSettings, launch_time: f32, vertical: f32, ctx: &mut MotionContext) {
        let next = match self.phase {
            AirPhase::Launch if self.phase_time >= launch_time => Some(AirPhase::Rise),
            AirPhase::Rise if vertical < settings.rise_pose_speed => Some(AirPhase::RisePose),
            AirPhase::RisePose if vertical < settings.rise_to_top_speed => Some(AirPhase::RiseToTop),
            AirPhase::RiseToTop if vertical <= 0.0 => Some(AirPhase::Top),
            AirPhase::Top if vertical < settings.top_to_fall_speed || self.phase_time >= TOP_HOLD => {
                Some(AirPhase::TopToFall)
            }
            AirPhase::TopToFall if self.phase_time >= TOP_TO_FALL_TIME => Some(AirPhase::FallPose),
            _ => None,
        };
        if let Some(next) = next {
            self.enter(next, ctx);
        }
    }

    fn step_ground_phase(&mut self, settings: &AirborneSettings, ctx: &mut MotionContext) {
        match self.phase {
            AirPhase::Land if self.phase_time >= settings.land_time => {
                self.enter(AirPhase::Recover, ctx);
                let recover = if ctx.state.has_input() {
                    phase::JUMP_RECOVER_RUN
                } else {
                    phase::JUMP_RECOVER_IDLE
                };
                ctx.set_motion_phase(recover, true);
            }
            AirPhase::Recover => {
                let state = ctx.animator_state();
                let in_recover = !state.is_none() && (state == self.recover_idle || state == self.recover_run);
                let finished = in_recover && ctx.animator_time() >= settings.recover_threshold;
                if finished || self.phase_time >= settings.recover_time {
                    self.enter(AirPhase::Done, ctx);
                }
            }
            _ => {}
        }
    }

    fn land(&mut self, core: &mut MotionCore, ctx: &mut MotionContext) {
        debug!("Landed after {:.2}s in {:?}", self.phase_time, self.phase);
        ctx.body.height = ctx.body.base_height;
        core.expects_grounded = true;
        self.enter(AirPhase::Land, ctx);
    }

    /// Air control, facing and the tucked collider
    fn steer(&mut self, settings: &AirborneSettings, core: &mut MotionCore, ctx: &mut MotionContext) {
        let state = &ctx.state;
        let wanted = state.input_direction_world * state.input_magnitude * settings.max_air_speed;

        core.velocity = match self.phase {
            AirPhase::Land => Vec3::ZERO,
            AirPhase::Recover | AirPhase::Done => wanted,
            _ => {
                let velocity = if state.has_input() {
                    self.launch_velocity.lerp(wanted, settings.air_control)
                } else {
                    self.launch_velocity
                };
                velocity.clamp_length_max(settings.max_air_speed)
            }
        };

        core.angular_velocity = if state.has_input() && self.phase != AirPhase::Land {
            Vec3::Y * yaw_rate_toward(state.input_angle_from_avatar, settings.air_rotation_speed, ctx.dt)
        } else {
            Vec3::ZERO
        };

        if self.phase.is_airborne() {
            let tucked = ctx.body.base_height * settings.collider_shrink;
            ctx.body.height = move_towards(ctx.body.height, tucked, settings.collider_shrink_speed * ctx.dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::motion::test_support::Harness;

    #[test]
    fn test_rise_phases_follow_vertical_speed() {
        let mut harness = Harness::flat_ground();
        harness.state.is_grounded = false;
        let settings = AirborneSettings::default();
        let mut core = MotionCore::new("Air", 1.0);
        let mut cycle = AirborneCycle::default();

        harness.forces.accumulated_velocity.y = 6.0;
        harness.with_context(|ctx| {
            cycle.start(AirPhase::Launch, ctx);
            cycle.update(&settings, 0.0, &mut core, ctx);
        });
        assert_eq!(cycle.phase, AirPhase::Rise);

        harness.forces.accumulated_velocity.y = 3.0;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        assert_eq!(cycle.phase, AirPhase::RisePose);

        harness.forces.accumulated_velocity.y = 1.0;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        assert_eq!(cycle.phase, AirPhase::RiseToTop);

        harness.forces.accumulated_velocity.y = -0.1;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        assert_eq!(cycle.phase, AirPhase::Top);

        harness.forces.accumulated_velocity.y = -2.0;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        assert_eq!(cycle.phase, AirPhase::TopToFall);
        assert_eq!(harness.state.layers[0].motion_phase, phase::JUMP_TOP_TO_FALL);
    }

    #[test]
    fn test_lands_when_grounded_while_falling() {
        let mut harness = Harness::flat_ground();
        harness.state.is_grounded = false;
        harness.body.height = 1.2;
        let settings = AirborneSettings::default();
        let mut core = MotionCore::new("Air", 1.0);
        let mut cycle = AirborneCycle::default();

        harness.forces.accumulated_velocity.y = -3.0;
        harness.with_context(|ctx| cycle.start(AirPhase::FallPose, ctx));
        harness.state.is_grounded = true;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));

        assert_eq!(cycle.phase, AirPhase::Land);
        assert_eq!(harness.body.height, harness.body.base_height);
        assert_eq!(core.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_recover_finishes_after_timeout() {
        let mut harness = Harness::flat_ground();
        let settings = AirborneSettings::default();
        let mut core = MotionCore::new("Air", 1.0);
        let mut cycle = AirborneCycle::default();
        harness.with_context(|ctx| cycle.start(AirPhase::Land, ctx));

        for _ in 0..60 {
            harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        }
        assert_eq!(cycle.phase, AirPhase::Done);
    }

    #[test]
    fn test_air_control_blends_with_momentum() {
        let mut harness = Harness::flat_ground();
        harness.state.is_grounded = false;
        harness.previous.velocity = Vec3::new(4.0, 0.0, 0.0);
        harness.forces.accumulated_velocity.y = 5.0;
        let settings = AirborneSettings::default();
        let mut core = MotionCore::new("Air", 1.0);
        let mut cycle = AirborneCycle::default();

        harness.with_context(|ctx| {
            cycle.start(AirPhase::Rise, ctx);
            cycle.update(&settings, 0.0, &mut core, ctx);
        });
        assert_eq!(core.velocity, Vec3::new(4.0, 0.0, 0.0));

        harness.state.input_magnitude = 1.0;
        harness.state.input_direction_world = Vec3::NEG_Z;
        harness.with_context(|ctx| cycle.update(&settings, 0.0, &mut core, ctx));
        // Half launch momentum, half stick at max air speed
        assert!((core.velocity - Vec3::new(2.0, 0.0, -3.0)).length() < 1e-4);
        assert!(harness.body.height < harness.body.base_height);
    }
}
