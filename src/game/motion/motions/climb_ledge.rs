//! Grabbing a ledge while airborne, hanging, shimmying and pulling up.

use bevy::prelude::*;

use super::yaw_facing;
use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, ClimbLedgeSettings},
    environment::{BodyHandle, Environment, surface_angle},
    input::Action,
    motion::{CharacterBody, ControllerState, Motion, MotionContext, MotionCore, MotionKind, Stance},
};

/// Share of the pull-up spent rising before moving onto the top
const RISE_SHARE: f32 = 0.6;
/// Seconds standing up on the top before the motion lets go
const RECOVER_TIME: f32 = 0.3;
/// Stick deflection that starts a shimmy
const SHIMMY_INPUT: f32 = 0.3;
/// Forward stick that starts the pull-up
const CLIMB_INPUT: f32 = 0.5;

/// A grabbable edge found in front of the character
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgeEdge {
    /// Point on the lip of the edge
    pub point: Vec3,
    /// Horizontal wall normal, pointing at the character
    pub normal: Vec3,
    pub body: Option<BodyHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum ClimbStage {
    Grab,
    Hang,
    ClimbToTop,
    Recover,
    #[default]
    Done,
}

pub struct ClimbLedge {
    core: MotionCore,
    pub settings: ClimbLedgeSettings,
    pub stage: ClimbStage,
    stage_time: f32,
    /// Grab point and normal in the support's local space
    grab_local: Vec3,
    normal_local: Vec3,
    support: Option<BodyHandle>,
    /// World position of the last grab, blocks grabbing the same spot again
    last_grab: Option<Vec3>,
    /// Body whose collision is switched off during the pull-up
    ignored: Option<BodyHandle>,
    start_position: Vec3,
    shimmy: i8,
}

impl Default for ClimbLedge {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Climb Ledge", 40.0).interruptible(false),
            settings: ClimbLedgeSettings::default(),
            stage: ClimbStage::Done,
            stage_time: 0.0,
            grab_local: Vec3::ZERO,
            normal_local: Vec3::Z,
            support: None,
            last_grab: None,
            ignored: None,
            start_position: Vec3::ZERO,
            shimmy: 0,
        }
    }
}

impl ClimbLedge {
    /// Run the edge rays in front of `body`, shifted sideways by
    /// `lateral_offset` along the body's right.
    pub fn find_edge(&self, env: &dyn Environment, body: &CharacterBody, lateral_offset: f32) -> Option<LedgeEdge> {
        let settings = &self.settings;
        let forward = body.forward();
        let right = body.right();
        let base = body.position + right * lateral_offset;
        let reach = body.radius + settings.reach;

        // Something solid and steep below the hands
        let below_origin = base + Vec3::Y * (settings.grab_height - settings.search_below);
        let below = env.cast_ray(below_origin, forward, reach)?;
        if surface_angle(below.normal) < settings.min_wall_angle {
            return None;
        }

        // Nothing above it
        let above_origin = base + Vec3::Y * (settings.grab_height + settings.open_clearance);
        if env
            .cast_ray(above_origin, forward, below.distance + settings.edge_inset + 0.05)
            .is_some()
        {
            return None;
        }

        // The top of the lip
        let drop = settings.search_below + settings.open_clearance;
        let locate_origin = below.point + forward * settings.edge_inset + Vec3::Y * drop;
        let top = env.cast_ray(locate_origin, Vec3::NEG_Y, drop + settings.search_below)?;
        if top.distance <= f32::EPSILON || surface_angle(top.normal) >= settings.min_wall_angle {
            return None;
        }
        let edge_height = top.point.y;

        // The face just under the lip gives the real normal
        let face_origin = Vec3::new(base.x, edge_height - 0.05, base.z);
        let face = env.cast_ray(face_origin, forward, reach + 0.1)?;
        let normal = Vec3::new(face.normal.x, 0.0, face.normal.z).normalize_or_zero();
        if normal == Vec3::ZERO {
            return None;
        }
        let point = Vec3::new(face.point.x, edge_height, face.point.z);

        // Room for the shoulders to either side
        let chest = point + normal * (body.radius + settings.hang_offset) - Vec3::Y * 0.3;
        for side in [right, -right] {
            if env.cast_ray(chest, side, settings.shoulder_width).is_some() {
                return None;
            }
        }

        // Room for the hands on top
        let hands = point - normal * settings.edge_inset + Vec3::Y * 0.01;
        if env.cast_ray(hands, Vec3::Y, settings.hand_clearance).is_some() {
            return None;
        }

        Some(LedgeEdge {
            point,
            normal,
            body: face.body,
        })
    }

    /// Where the last ledge was grabbed, until the character touches ground again
    pub fn last_grab(&self) -> Option<Vec3> {
        self.last_grab
    }

    /// Where the feet go while hanging from `edge`
    pub fn hang_position(&self, point: Vec3, normal: Vec3, radius: f32) -> Vec3 {
        point + normal * (radius + self.settings.hang_offset) - Vec3::Y * self.settings.grab_height
    }

    fn store_grab(&mut self, env: &dyn Environment, point: Vec3, normal: Vec3) {
        match self.support.and_then(|handle| env.body_transform(handle)) {
            Some(pose) => {
                self.grab_local = pose.inverse_transform_point(point);
                self.normal_local = pose.rotation.inverse() * normal;
            }
            None => {
                self.grab_local = point;
                self.normal_local = normal;
            }
        }
    }

    /// Grab point and normal in world space, following the support
    fn current_grab(&self, env: &dyn Environment) -> (Vec3, Vec3) {
        match self.support.and_then(|handle| env.body_transform(handle)) {
            Some(pose) => (
                pose.transform_point(self.grab_local),
                pose.rotation * self.normal_local,
            ),
            None => (self.grab_local, self.normal_local),
        }
    }

    fn enter(&mut self, stage: ClimbStage, ctx: &mut MotionContext) {
        trace!("Climb ledge {:?} -> {stage:?}", self.stage);
        self.stage = stage;
        self.stage_time = 0.0;
        self.start_position = ctx.body.position;
        let motion_phase = match stage {
            ClimbStage::Grab => phase::CLIMB_CROUCH_GRAB,
            ClimbStage::Hang => phase::CLIMB_CROUCH_HANG,
            ClimbStage::ClimbToTop => phase::CLIMB_CROUCH_TO_TOP,
            ClimbStage::Recover => phase::CLIMB_CROUCH_RECOVER,
            ClimbStage::Done => phase::NONE,
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

    fn hang(&mut self, ctx: &mut MotionContext) {
        if ctx.input.just_pressed(Action::Release) {
            debug!("Let go of ledge");
            // Shimmying may have carried the hands far from the first grab
            self.last_grab = Some(self.current_grab(&*ctx.env).0);
            self.enter(ClimbStage::Done, ctx);
            return;
        }
        if ctx.state.input_y > CLIMB_INPUT || ctx.input.just_pressed(Action::Jump) {
            if let Some(handle) = self.support {
                ctx.env.set_collision_ignored(handle, true);
                self.ignored = Some(handle);
            }
            self.enter(ClimbStage::ClimbToTop, ctx);
            return;
        }

        let direction = if ctx.state.input_x > SHIMMY_INPUT {
            1
        } else if ctx.state.input_x < -SHIMMY_INPUT {
            -1
        } else {
            0
        };
        let can_move = direction != 0
            && self
                .find_edge(&*ctx.env, ctx.body, f32::from(direction) * self.settings.shimmy_lookahead)
                .is_some_and(|edge| edge.body == self.support);
        let direction = if can_move { direction } else { 0 };

        if direction != self.shimmy {
            self.shimmy = direction;
            let motion_phase = match direction {
                1 => phase::CLIMB_CROUCH_SHIMMY_RIGHT,
                -1 => phase::CLIMB_CROUCH_SHIMMY_LEFT,
                _ => phase::CLIMB_CROUCH_HANG,
            };
            ctx.set_motion_phase(motion_phase, true);
        }

        let (point, normal) = self.current_grab(&*ctx.env);
        let point = if direction != 0 {
            let step = ctx.body.right() * (f32::from(direction) * self.settings.shimmy_speed * ctx.dt);
            let moved = point + step;
            self.store_grab(&*ctx.env, moved, normal);
            self.last_grab = Some(moved);
            moved
        } else {
            point
        };
        self.snap_to(point, normal, ctx);
    }

    /// Put the body on the hang pose for the grab point
    fn snap_to(&self, point: Vec3, normal: Vec3, ctx: &mut MotionContext) {
        ctx.body.position = self.hang_position(point, normal, ctx.body.radius);
        ctx.body.set_yaw(yaw_facing(-normal));
    }

    fn climb_to_top(&mut self, ctx: &mut MotionContext) {
        let (point, normal) = self.current_grab(&*ctx.env);
        let top = point - normal * self.settings.climb_forward;
        let lifted = Vec3::new(self.start_position.x, top.y, self.start_position.z);

        let t = (self.stage_time / self.settings.climb_duration.max(f32::EPSILON)).min(1.0);
        ctx.body.position = if t < RISE_SHARE {
            self.start_position.lerp(lifted, t / RISE_SHARE)
        } else {
            lifted.lerp(top, (t - RISE_SHARE) / (1.0 - RISE_SHARE))
        };

        if t >= 1.0 {
            self.restore_collision(ctx.env);
            self.core.gravity_enabled = true;
            self.core.expects_grounded = true;
            ctx.state.stance = Stance::Normal;
            self.enter(ClimbStage::Recover, ctx);
        }
    }
}

impl Motion for ClimbLedge {
    fn kind(&self) -> MotionKind {
        MotionKind::ClimbLedge
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.climb_ledge.clone();
    }

    fn refresh(&mut self, ctx: &MotionContext) {
        if ctx.state.is_grounded {
            self.last_grab = None;
        }
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        if ctx.state.is_grounded || ctx.state.stance == Stance::Climb {
            return false;
        }
        let Some(edge) = self.find_edge(&*ctx.env, ctx.body, 0.0) else {
            return false;
        };
        match self.last_grab {
            Some(last) => last.distance(edge.point) > self.settings.min_regrab_distance,
            None => true,
        }
    }

    fn test_update(&self, _ctx: &MotionContext) -> bool {
        self.stage != ClimbStage::Done
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        let Some(edge) = self.find_edge(&*ctx.env, ctx.body, 0.0) else {
            return false;
        };
        debug!("Grabbed ledge at {}", edge.point);

        self.support = edge.body;
        self.store_grab(&*ctx.env, edge.point, edge.normal);
        self.last_grab = Some(edge.point);
        self.shimmy = 0;
        self.core.gravity_enabled = false;
        self.core.expects_grounded = false;
        ctx.state.stance = Stance::Climb;
        ctx.forces.accumulated_velocity = Vec3::ZERO;
        self.enter(ClimbStage::Grab, ctx);
        true
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        self.restore_collision(ctx.env);
        if ctx.state.stance == Stance::Climb {
            ctx.state.stance = Stance::Normal;
        }
        self.core.gravity_enabled = true;
        self.core.expects_grounded = true;
        self.stage = ClimbStage::Done;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        self.core.velocity = Vec3::ZERO;
        self.core.angular_velocity = Vec3::ZERO;
        self.stage_time += ctx.dt;

        match self.stage {
            ClimbStage::Grab => {
                let (point, normal) = self.current_grab(&*ctx.env);
                let hang = self.hang_position(point, normal, ctx.body.radius);
                let t = (self.stage_time / self.settings.grab_time.max(f32::EPSILON)).min(1.0);
                ctx.body.position = self.start_position.lerp(hang, t);
                ctx.body.set_yaw(yaw_facing(-normal));
                if t >= 1.0 {
                    self.enter(ClimbStage::Hang, ctx);
                }
            }
            ClimbStage::Hang => self.hang(ctx),
            ClimbStage::ClimbToTop => self.climb_to_top(ctx),
            ClimbStage::Recover => {
                if self.stage_time >= RECOVER_TIME {
                    self.enter(ClimbStage::Done, ctx);
                }
            }
            ClimbStage::Done => {}
        }
    }

    fn determine_grounding(&self, state: &ControllerState) -> bool {
        let attached = matches!(
            self.stage,
            ClimbStage::Grab | ClimbStage::Hang | ClimbStage::ClimbToTop
        );
        if self.core.is_active && attached {
            false
        } else {
            state.is_grounded
        }
    }

    fn clean_root_motion(&self, _state: &ControllerState, translation: &mut Vec3, rotation: &mut Quat) {
        *translation = Vec3::ZERO;
        *rotation = Quat::IDENTITY;
    }

    fn camera_offset(&self) -> Vec3 {
        if matches!(self.stage, ClimbStage::Grab | ClimbStage::Hang) {
            self.settings.camera_offset
        } else {
            Vec3::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        environment::SimpleScene,
        input::InputSnapshot,
        motion::{
            MotionLayer,
            motions::Sneak,
            test_support::{Harness, Simulation},
        },
    };

    fn wall_scene() -> (SimpleScene, BodyHandle) {
        let mut scene = SimpleScene::new();
        // Front face at z = -0.5, top at y = 2
        let wall = scene.add_cuboid(Vec3::new(0.0, 1.0, -1.0), Vec3::new(2.0, 1.0, 0.5), Quat::IDENTITY);
        scene.add_ground(-10.0);
        (scene, wall)
    }

    fn hanging() -> Simulation {
        let (scene, _) = wall_scene();
        let mut sim = Simulation::new(scene, &CharacterConfig::default(), Vec3::new(0.0, 0.2, 0.0));
        sim.step();
        assert_eq!(sim.active(), Some(MotionKind::ClimbLedge));
        let hung = sim.run_until(60, |sim| {
            sim.controller
                .motion_as::<ClimbLedge>()
                .is_some_and(|climb| climb.stage == ClimbStage::Hang)
        });
        assert!(hung);
        sim
    }

    #[test]
    fn test_finds_edge_in_front() {
        let climb = ClimbLedge::default();
        let (scene, wall) = wall_scene();
        let body = CharacterBody::new(Vec3::new(0.0, 0.2, 0.0), 0.4, 1.8);

        let edge = climb.find_edge(&scene, &body, 0.0);
        let Some(edge) = edge else {
            panic!("no edge found");
        };
        assert!((edge.point - Vec3::new(0.0, 2.0, -0.5)).length() < 1e-3);
        assert!((edge.normal - Vec3::Z).length() < 1e-3);
        assert_eq!(edge.body, Some(wall));

        // Too low to reach
        let low = CharacterBody::new(Vec3::new(0.0, -1.0, 0.0), 0.4, 1.8);
        assert!(climb.find_edge(&scene, &low, 0.0).is_none());
        // Facing away
        let mut away = body;
        away.set_yaw(180.0);
        assert!(climb.find_edge(&scene, &away, 0.0).is_none());
    }

    #[test]
    fn test_grabs_and_hangs_below_edge() {
        let sim = hanging();
        let position = sim.controller.body.position;
        assert!((position - Vec3::new(0.0, 0.1, -0.05)).length() < 0.02, "position {position}");
        assert_eq!(sim.controller.state().stance, Stance::Climb);
        assert!(!sim.controller.is_grounded());
        assert_eq!(sim.controller.camera_offset(), Vec3::new(0.0, 0.3, 0.0));
    }

    #[test]
    fn test_no_regrab_near_last_grab() {
        let mut harness = Harness::flat_ground();
        harness.scene = wall_scene().0;
        harness.state.is_grounded = false;
        harness.body.position = Vec3::new(0.0, 0.2, 0.0);
        let mut climb = ClimbLedge::default();

        harness.with_context(|ctx| {
            assert!(climb.test_activate(ctx));
            assert!(climb.activate(None, ctx));
            climb.core_mut().mark_active(ctx.time);
            climb.deactivate(ctx);

            assert!(climb.find_edge(&*ctx.env, ctx.body, 0.0).is_some());
            assert!(!climb.test_activate(ctx));

            ctx.body.position.x += 1.0;
            assert!(climb.test_activate(ctx));
        });
    }

    #[test]
    fn test_release_drops_and_falls() {
        let mut sim = hanging();
        sim.input = InputSnapshot::default().press(Action::Release);
        sim.step();
        sim.input = InputSnapshot::default();
        sim.step();
        assert_ne!(sim.active(), Some(MotionKind::ClimbLedge));

        sim.run(20);
        assert_eq!(sim.active(), Some(MotionKind::Fall));
        assert_eq!(sim.controller.state().stance, Stance::Normal);
        assert!(sim.controller.body.position.y < 0.0);
    }

    #[test]
    fn test_release_after_shimmy_does_not_regrab() {
        let mut sim = hanging();
        sim.input = InputSnapshot::default().with_movement(Vec2::X);
        sim.run(60);
        assert_eq!(sim.active(), Some(MotionKind::ClimbLedge));
        assert!(sim.controller.body.position.x > 0.8);
        let held = sim.controller.motion_as::<ClimbLedge>().and_then(ClimbLedge::last_grab);
        assert!(held.is_some_and(|grab| grab.x > 0.8), "last grab {held:?}");

        sim.input = InputSnapshot::default().press(Action::Release);
        sim.step();
        sim.input = InputSnapshot::default();
        for _ in 0..20 {
            sim.step();
            assert_ne!(sim.active(), Some(MotionKind::ClimbLedge));
        }
        assert!(sim.controller.body.position.y < 0.0);
    }

    #[test]
    fn test_grab_from_sneak_keeps_climb_stance() {
        let mut harness = Harness::flat_ground();
        harness.scene = wall_scene().0;
        harness.body.position = Vec3::new(0.0, 0.2, 0.0);
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(Sneak::default())
            .with_motion(ClimbLedge::default());

        assert!(layer.queue(MotionKind::Sneak));
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Sneak));
        assert_eq!(harness.state.stance, Stance::Sneak);
        assert_eq!(harness.body.height, 1.2);

        // Stepped off, still close enough to the ground for sneaking to hold on
        harness.state.is_grounded = false;
        harness.state.ground_distance = 0.2;
        harness.time += 0.1;
        harness.with_context(|ctx| layer.update(ctx));

        assert_eq!(layer.active_kind(), Some(MotionKind::ClimbLedge));
        assert_eq!(harness.state.stance, Stance::Climb);
        assert_eq!(harness.body.height, harness.body.base_height);
        assert!(layer.motion(MotionKind::Sneak).is_some_and(|sneak| !sneak.is_active()));
    }

    #[test]
    fn test_shimmy_moves_along_edge() {
        let mut sim = hanging();
        sim.input = InputSnapshot::default().with_movement(Vec2::X);
        sim.run(30);
        assert_eq!(sim.active(), Some(MotionKind::ClimbLedge));
        let position = sim.controller.body.position;
        assert!(position.x > 0.3 && position.x < 0.7, "position {position}");
        assert!((position.y - 0.1).abs() < 0.02);
    }

    #[test]
    fn test_climbs_onto_top() {
        let mut sim = hanging();
        let wall = sim.controller.motion_as::<ClimbLedge>().and_then(|climb| climb.support);
        assert!(wall.is_some());
        sim.input = InputSnapshot::default().with_movement(Vec2::Y);
        sim.step();
        sim.input = InputSnapshot::default();

        let finished = sim.run_until(180, |sim| sim.active() != Some(MotionKind::ClimbLedge));
        assert!(finished);
        sim.run(5);

        let position = sim.controller.body.position;
        assert!((position.y - 2.0).abs() < 0.1, "position {position}");
        assert!(position.z < -0.5);
        assert!(sim.controller.is_grounded());
        assert!(wall.is_some_and(|wall| !sim.scene.is_collision_ignored(wall)));
    }
}
