use bevy::prelude::*;

use super::yaw_rate_toward;
use crate::game::{
    animation::{AnimationStateRegistry, StateId, states, states::phase},
    configs::{CharacterConfig, WalkRunSettings},
    input::Action,
    motion::{ControllerState, Motion, MotionContext, MotionCore, MotionKind, Stance},
};

/// Forward locomotion that turns toward the input and pivots on sharp reversals.
pub struct WalkRunPivot {
    core: MotionCore,
    pub settings: WalkRunSettings,
    pivot_left: StateId,
    pivot_right: StateId,
    is_pivoting: bool,
    is_stopping: bool,
}

impl Default for WalkRunPivot {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Walk Run Pivot", 5.0),
            settings: WalkRunSettings::default(),
            pivot_left: StateId::NONE,
            pivot_right: StateId::NONE,
            is_pivoting: false,
            is_stopping: false,
        }
    }
}

impl WalkRunPivot {
    fn in_pivot_state(&self, state: StateId) -> bool {
        !state.is_none() && (state == self.pivot_left || state == self.pivot_right)
    }

    /// Ground speed for a normalized input magnitude
    pub fn speed_for(&self, magnitude: f32, sprinting: bool) -> f32 {
        let magnitude = magnitude.clamp(0.0, 1.0);
        let speed = if magnitude <= 0.5 {
            self.settings.walk_speed * magnitude * 2.0
        } else {
            let run_blend = (magnitude - 0.5) * 2.0;
            self.settings.walk_speed + (self.settings.run_speed - self.settings.walk_speed) * run_blend
        };
        if sprinting {
            speed * self.settings.sprint_multiplier
        } else {
            speed
        }
    }

    fn wants_to_move(&self, state: &ControllerState) -> bool {
        state.has_input() || state.input_trend.average() >= self.settings.min_input
    }
}

impl Motion for WalkRunPivot {
    fn kind(&self) -> MotionKind {
        MotionKind::WalkRunPivot
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn bind(&mut self, registry: &AnimationStateRegistry) {
        self.pivot_left = registry.resolve(states::RUN_PIVOT_LEFT);
        self.pivot_right = registry.resolve(states::RUN_PIVOT_RIGHT);
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.walk_run.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        let state = &ctx.state;
        state.is_grounded
            && state.stance == Stance::Normal
            && state.has_input()
            && state.input_trend.average() >= self.settings.min_input
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        let state = &ctx.state;
        let on_ground = state.is_grounded || state.ground_distance < 0.5;
        on_ground && state.stance == Stance::Normal && self.wants_to_move(state)
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        self.is_pivoting = false;
        self.is_stopping = false;
        ctx.set_motion_phase(phase::WALK_RUN, true);
        true
    }

    fn on_deactivate(&mut self, _ctx: &mut MotionContext) {
        self.is_pivoting = false;
        self.is_stopping = false;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        // Taper the trending magnitude near walls instead of stopping dead
        let forward_scale = ctx.state.forward_scale;
        ctx.state.input_trend.scale_latest(forward_scale);

        let angle = ctx.state.input_angle_from_avatar;
        let animator_state = ctx.animator_state();

        if ctx.state.has_input() {
            if self.is_stopping {
                self.is_stopping = false;
                ctx.set_motion_phase(phase::WALK_RUN, true);
            }

            let moving = ctx.previous.velocity.length() > self.settings.walk_speed * 0.5;
            if !self.is_pivoting && moving && angle.abs() >= self.settings.pivot_angle {
                self.is_pivoting = true;
                let pivot = if angle < 0.0 {
                    phase::WALK_RUN_PIVOT_LEFT
                } else {
                    phase::WALK_RUN_PIVOT_RIGHT
                };
                ctx.set_motion_phase(pivot, true);
            } else if self.is_pivoting {
                let finished = self.in_pivot_state(animator_state) && ctx.animator_time() >= 0.95;
                if angle.abs() < 20.0 || finished {
                    self.is_pivoting = false;
                    ctx.set_motion_phase(phase::WALK_RUN, true);
                }
            }
        } else if !self.is_stopping && ctx.previous.has_input() {
            self.is_stopping = true;
            self.is_pivoting = false;
            ctx.set_motion_phase(phase::WALK_RUN_STOP, true);
        }

        let rotation_speed = if self.is_pivoting {
            self.settings.pivot_rotation_speed
        } else {
            self.settings.rotation_speed
        };
        self.core.angular_velocity = if ctx.state.has_input() {
            Vec3::Y * yaw_rate_toward(angle, rotation_speed, ctx.dt)
        } else {
            Vec3::ZERO
        };

        let magnitude = ctx.state.input_magnitude * forward_scale;
        let sprinting = ctx.input.is_pressed(Action::Sprint);
        let mut speed = self.speed_for(magnitude, sprinting);
        if self.is_pivoting {
            speed *= 0.25;
        }
        self.core.velocity = ctx.state.input_direction_world * speed;
    }

    /// The motion drives yaw itself except while a pivot clip plays, and
    /// never lets the clip pull the character backwards
    fn clean_root_motion(&self, state: &ControllerState, translation: &mut Vec3, rotation: &mut Quat) {
        let animator_state = state
            .layer(self.core.layer_index)
            .map(|l| l.snapshot.state_id)
            .unwrap_or_default();
        if !self.in_pivot_state(animator_state) {
            *rotation = Quat::IDENTITY;
        }
        translation.z = translation.z.min(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        animation::AnimatorDriver,
        input::InputSnapshot,
        motion::test_support::{Harness, Simulation},
    };

    #[test]
    fn test_speed_curve() {
        let motion = WalkRunPivot::default();
        assert_eq!(motion.speed_for(0.0, false), 0.0);
        assert_eq!(motion.speed_for(0.5, false), 2.0);
        assert_eq!(motion.speed_for(1.0, false), 5.5);
        assert!((motion.speed_for(1.0, true) - 7.7).abs() < 1e-4);
    }

    #[test]
    fn test_requires_trending_input() {
        let mut harness = Harness::flat_ground();
        let motion = WalkRunPivot::default();
        harness.state.input_magnitude = 1.0;
        harness.with_context(|ctx| assert!(!motion.test_activate(ctx)));

        harness.state.input_trend.add(1.0);
        harness.with_context(|ctx| assert!(motion.test_activate(ctx)));

        harness.state.is_grounded = false;
        harness.with_context(|ctx| assert!(!motion.test_activate(ctx)));
    }

    #[test]
    fn test_blocked_path_tapers_trend_sample() {
        let mut harness = Harness::flat_ground();
        let mut motion = WalkRunPivot::default();
        harness.state.input_magnitude = 1.0;
        harness.state.input_direction_world = Vec3::NEG_Z;
        harness.state.input_trend.add(1.0);
        harness.state.forward_scale = 0.5;

        harness.with_context(|ctx| motion.update_motion(ctx));
        assert_eq!(harness.state.input_trend.latest(), 0.5);
        assert!((motion.core().velocity.z + 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_keeps_root_yaw_only_while_pivoting() {
        let registry = AnimationStateRegistry::with_builtin_states();
        let mut motion = WalkRunPivot::default();
        motion.bind(&registry);

        let mut state = ControllerState::default();
        let mut translation = Vec3::new(0.0, 0.0, 0.3);
        let mut rotation = Quat::from_rotation_y(0.2);
        motion.clean_root_motion(&state, &mut translation, &mut rotation);
        assert_eq!(rotation, Quat::IDENTITY);
        assert_eq!(translation.z, 0.0);

        state.layers[0].snapshot.state_id = registry.resolve(states::RUN_PIVOT_LEFT);
        let mut rotation = Quat::from_rotation_y(0.2);
        motion.clean_root_motion(&state, &mut translation, &mut rotation);
        assert_eq!(rotation, Quat::from_rotation_y(0.2));
    }

    #[test]
    fn test_sharp_reversal_pivots() {
        let mut sim = Simulation::on_flat_ground();
        sim.input = InputSnapshot::default().with_movement(Vec2::Y);
        sim.run(40);
        assert_eq!(sim.active(), Some(MotionKind::WalkRunPivot));

        sim.input = InputSnapshot::default().with_movement(Vec2::NEG_Y);
        sim.step();
        sim.step();
        let pivot = sim.registry.resolve(states::RUN_PIVOT_LEFT);
        let pivot_right = sim.registry.resolve(states::RUN_PIVOT_RIGHT);
        let state = sim.animator.layer_state(0).state_id;
        assert!(state == pivot || state == pivot_right);

        sim.run(60);
        // Facing the new direction, which is +Z
        assert!((sim.controller.body.forward() - Vec3::Z).length() < 0.05);
    }

    #[test]
    fn test_release_returns_to_idle() {
        let mut sim = Simulation::on_flat_ground();
        sim.input = InputSnapshot::default().with_movement(Vec2::Y);
        sim.run(30);
        sim.input = InputSnapshot::default();
        sim.run(40);
        assert_eq!(sim.active(), Some(MotionKind::Idle));
    }
}
