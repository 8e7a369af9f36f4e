use bevy::prelude::*;

use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, ClimbMidSettings},
    environment::{BodyHandle, Environment},
    motion::{CharacterBody, ControllerState, Motion, MotionContext, MotionCore, MotionKind},
};

/// Most stick-to-avatar angle that still counts as heading for the obstacle
const MAX_APPROACH_ANGLE: f32 = 30.0;
/// Share of the vault spent in the start clip
const START_SHARE: f32 = 0.3;
/// Share of the vault by which the feet reach the top height
const RISE_SHARE: f32 = 0.6;
const RECOVER_TIME: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VaultStage {
    Start,
    ToTop,
    Recover,
    Done,
}

/// Where a vault would end up
#[derive(Debug, Clone, Copy, PartialEq)]
struct VaultTarget {
    position: Vec3,
    body: Option<BodyHandle>,
}

/// Vaulting onto a waist-high obstacle blocking the way
pub struct ClimbMid {
    core: MotionCore,
    pub settings: ClimbMidSettings,
    stage: VaultStage,
    elapsed: f32,
    start: Vec3,
    target: Vec3,
    ignored: Option<BodyHandle>,
}

impl Default for ClimbMid {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Climb Mid", 35.0).interruptible(false),
            settings: ClimbMidSettings::default(),
            stage: VaultStage::Done,
            elapsed: 0.0,
            start: Vec3::ZERO,
            target: Vec3::ZERO,
            ignored: None,
        }
    }
}

impl ClimbMid {
    fn find_target(&self, env: &dyn Environment, body: &CharacterBody) -> Option<VaultTarget> {
        let settings = &self.settings;
        let forward = body.forward();

        let face_origin = body.position + Vec3::Y * (settings.min_height * 0.5);
        let face = env.cast_ray(face_origin, forward, body.radius + settings.reach)?;

        let probe = body.position
            + forward * (body.radius + settings.reach)
            + Vec3::Y * (settings.max_height + 0.1);
        let top = env.cast_ray(probe, Vec3::NEG_Y, settings.max_height + 0.1)?;
        if top.distance <= f32::EPSILON {
            return None;
        }

        let height = top.point.y - body.position.y;
        if !(settings.min_height..=settings.max_height).contains(&height) {
            return None;
        }

        let mut position = body.position + forward * (face.distance + settings.forward_distance);
        position.y = top.point.y;
        Some(VaultTarget {
            position,
            body: face.body,
        })
    }

    fn enter(&mut self, stage: VaultStage, ctx: &mut MotionContext) {
        self.stage = stage;
        let motion_phase = match stage {
            VaultStage::Start => phase::CLIMB_MID,
            VaultStage::ToTop => phase::CLIMB_MID_TO_TOP,
            VaultStage::Recover => phase::CLIMB_MID_RECOVER,
            VaultStage::Done => phase::NONE,
        };
        if motion_phase != phase::NONE {
            ctx.set_motion_phase(motion_phase, true);
        }
    }

    fn restore_collision(&mut self, env: &mut dyn Environment) {
        if let Some(handle) = self.ignored.take() {
            env.set_collision_ignored(handle, false);
        }
    }
}

impl Motion for ClimbMid {
    fn kind(&self) -> MotionKind {
        MotionKind::ClimbMid
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.climb_mid.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        let state = &ctx.state;
        state.is_grounded
            && state.is_forward_blocked
            && state.input_magnitude >= self.settings.min_input
            && state.input_angle_from_avatar.abs() < MAX_APPROACH_ANGLE
            && self.find_target(&*ctx.env, ctx.body).is_some()
    }

    fn test_update(&self, _ctx: &MotionContext) -> bool {
        self.stage != VaultStage::Done
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        let Some(target) = self.find_target(&*ctx.env, ctx.body) else {
            return false;
        };
        debug!("Vaulting onto obstacle at {}", target.position);

        if let Some(handle) = target.body {
            ctx.env.set_collision_ignored(handle, true);
            self.ignored = Some(handle);
        }
        self.start = ctx.body.position;
        self.target = target.position;
        self.elapsed = 0.0;
        self.core.gravity_enabled = false;
        self.core.expects_grounded = false;
        ctx.forces.accumulated_velocity = Vec3::ZERO;
        self.enter(VaultStage::Start, ctx);
        true
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        self.restore_collision(ctx.env);
        self.core.gravity_enabled = true;
        self.core.expects_grounded = true;
        self.stage = VaultStage::Done;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        self.core.velocity = Vec3::ZERO;
        self.core.angular_velocity = Vec3::ZERO;
        self.elapsed += ctx.dt;

        let duration = self.settings.duration.max(f32::EPSILON);
        let t = (self.elapsed / duration).min(1.0);
        match self.stage {
            VaultStage::Start | VaultStage::ToTop => {
                // Up first, then over
                let rise = (t / RISE_SHARE).min(1.0);
                let mut position = self.start.lerp(self.target, t * t);
                position.y = self.start.y + (self.target.y - self.start.y) * rise;
                ctx.body.position = position;

                if self.stage == VaultStage::Start && t >= START_SHARE {
                    self.enter(VaultStage::ToTop, ctx);
                }
                if t >= 1.0 {
                    self.restore_collision(ctx.env);
                    self.core.gravity_enabled = true;
                    self.core.expects_grounded = true;
                    self.elapsed = 0.0;
                    self.enter(VaultStage::Recover, ctx);
                }
            }
            VaultStage::Recover => {
                if self.elapsed >= RECOVER_TIME {
                    self.enter(VaultStage::Done, ctx);
                }
            }
            VaultStage::Done => {}
        }
    }

    fn determine_grounding(&self, state: &ControllerState) -> bool {
        let vaulting = matches!(self.stage, VaultStage::Start | VaultStage::ToTop);
        if self.core.is_active && vaulting {
            false
        } else {
            state.is_grounded
        }
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
        environment::SimpleScene,
        input::InputSnapshot,
        motion::test_support::{Harness, Simulation},
    };

    fn obstacle_scene(height: f32) -> SimpleScene {
        let mut scene = SimpleScene::new();
        scene.add_ground(0.0);
        // Near face at z = -1
        scene.add_cuboid(
            Vec3::new(0.0, height * 0.5, -3.0),
            Vec3::new(2.0, height * 0.5, 2.0),
            Quat::IDENTITY,
        );
        scene
    }

    #[test]
    fn test_height_window() {
        let climb = ClimbMid::default();
        let body = CharacterBody::new(Vec3::new(0.0, 0.0, -0.3), 0.4, 1.8);

        let target = climb.find_target(&obstacle_scene(1.0), &body);
        let Some(target) = target else {
            panic!("no vault target");
        };
        assert!((target.position.y - 1.0).abs() < 1e-4);
        assert!(target.position.z < -1.0);

        assert!(climb.find_target(&obstacle_scene(0.3), &body).is_none());
        assert!(climb.find_target(&obstacle_scene(2.0), &body).is_none());
    }

    #[test]
    fn test_needs_blocked_path_and_push() {
        let mut harness = Harness::flat_ground();
        harness.scene = obstacle_scene(1.0);
        harness.body.position = Vec3::new(0.0, 0.0, -0.3);
        harness.state.input_magnitude = 1.0;
        harness.state.input_direction_world = Vec3::NEG_Z;
        let climb = ClimbMid::default();
        harness.with_context(|ctx| assert!(!climb.test_activate(ctx)));

        harness.state.is_forward_blocked = true;
        harness.with_context(|ctx| assert!(climb.test_activate(ctx)));

        harness.state.input_angle_from_avatar = 45.0;
        harness.with_context(|ctx| assert!(!climb.test_activate(ctx)));
    }

    #[test]
    fn test_vaults_onto_obstacle() {
        let mut sim = Simulation::new(obstacle_scene(1.0), &CharacterConfig::default(), Vec3::ZERO);
        sim.run(5);
        sim.input = InputSnapshot::default().with_movement(Vec2::Y);
        let started = sim.run_until(60, |sim| sim.active() == Some(MotionKind::ClimbMid));
        assert!(started);
        sim.input = InputSnapshot::default();

        let finished = sim.run_until(120, |sim| sim.active() != Some(MotionKind::ClimbMid));
        assert!(finished);
        sim.run(5);

        let position = sim.controller.body.position;
        assert!((position.y - 1.0).abs() < 0.08, "position {position}");
        assert!(position.z < -1.2);
        assert!(sim.controller.is_grounded());
    }
}
