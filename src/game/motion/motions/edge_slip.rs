use bevy::prelude::*;

use crate::game::{
    animation::states::phase,
    configs::{CharacterConfig, EdgeSlipSettings},
    environment::Environment,
    motion::{CharacterBody, ControllerState, Motion, MotionContext, MotionCore, MotionKind},
};

/// Which side of the body has nothing under it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenSide {
    Left,
    Right,
}

/// Standing still with one foot over a drop: slip off sideways.
pub struct EdgeSlip {
    core: MotionCore,
    pub settings: EdgeSlipSettings,
    side: Option<OpenSide>,
}

impl Default for EdgeSlip {
    fn default() -> Self {
        Self {
            core: MotionCore::new("Edge Slip", 15.0),
            settings: EdgeSlipSettings::default(),
            side: None,
        }
    }
}

impl EdgeSlip {
    /// Side with no support, `None` when both or neither foot is supported
    fn open_side(&self, env: &dyn Environment, body: &CharacterBody) -> Option<OpenSide> {
        let right = body.right();
        let supported = |offset: f32| {
            let origin = body.position + right * offset + Vec3::Y * self.settings.foot_ray_height;
            let reach = self.settings.foot_ray_height + self.settings.foot_ray_distance;
            env.cast_ray(origin, Vec3::NEG_Y, reach).is_some()
        };

        match (supported(-self.settings.foot_spread), supported(self.settings.foot_spread)) {
            (true, false) => Some(OpenSide::Right),
            (false, true) => Some(OpenSide::Left),
            _ => None,
        }
    }
}

impl Motion for EdgeSlip {
    fn kind(&self) -> MotionKind {
        MotionKind::EdgeSlip
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.edge_slip.clone();
    }

    fn test_activate(&self, ctx: &MotionContext) -> bool {
        if !ctx.state.is_grounded || ctx.state.has_input() {
            return false;
        }
        if !matches!(ctx.active, None | Some(MotionKind::Idle)) {
            return false;
        }
        self.open_side(&*ctx.env, ctx.body).is_some()
    }

    fn test_update(&self, ctx: &MotionContext) -> bool {
        if self.core.age(ctx.time) >= self.settings.max_time {
            return false;
        }
        self.open_side(&*ctx.env, ctx.body).is_some()
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        self.side = self.open_side(&*ctx.env, ctx.body);
        if self.side.is_none() {
            return false;
        }
        ctx.set_motion_phase(phase::EDGE_SLIP, true);
        true
    }

    fn on_deactivate(&mut self, _ctx: &mut MotionContext) {
        self.side = None;
    }

    fn update_motion(&mut self, ctx: &mut MotionContext) {
        // The open side can flip as the body shifts
        if let Some(side) = self.open_side(&*ctx.env, ctx.body) {
            self.side = Some(side);
        }
        let lateral = match self.side {
            Some(OpenSide::Right) => ctx.body.right(),
            Some(OpenSide::Left) => -ctx.body.right(),
            None => Vec3::ZERO,
        };
        self.core.velocity = lateral * self.settings.lateral_speed + Vec3::NEG_Y * self.settings.down_speed;
        self.core.angular_velocity = Vec3::ZERO;
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
        motion::test_support::{Harness, Simulation},
    };

    fn ledge_scene() -> SimpleScene {
        let mut scene = SimpleScene::new();
        // Top face at y = 0, right edge at x = 0.1
        scene.add_cuboid(Vec3::new(-0.9, -0.5, 0.0), Vec3::new(1.0, 0.5, 2.0), Quat::IDENTITY);
        scene.add_ground(-2.0);
        scene
    }

    #[test]
    fn test_detects_single_open_foot() {
        let slip = EdgeSlip::default();
        let scene = ledge_scene();
        let body = CharacterBody::default();
        assert_eq!(slip.open_side(&scene, &body), Some(OpenSide::Right));

        let mut turned = body;
        turned.set_yaw(180.0);
        assert_eq!(slip.open_side(&scene, &turned), Some(OpenSide::Left));

        let mut centered = body;
        centered.position.x = -1.0;
        assert_eq!(slip.open_side(&scene, &centered), None);
    }

    #[test]
    fn test_only_from_idle_without_input() {
        let mut harness = Harness::flat_ground();
        harness.scene = ledge_scene();
        let slip = EdgeSlip::default();
        harness.with_context(|ctx| assert!(slip.test_activate(ctx)));

        harness.with_context(|ctx| {
            ctx.active = Some(MotionKind::WalkRunPivot);
            assert!(!slip.test_activate(ctx));
        });

        harness.state.input_magnitude = 1.0;
        harness.with_context(|ctx| assert!(!slip.test_activate(ctx)));
    }

    #[test]
    fn test_slips_off_and_falls() {
        let mut sim = Simulation::new(ledge_scene(), &Default::default(), Vec3::ZERO);
        sim.step();
        assert_eq!(sim.active(), Some(MotionKind::EdgeSlip));

        let fell = sim.run_until(90, |sim| sim.active() == Some(MotionKind::Fall));
        assert!(fell);
        assert!(sim.controller.body.position.x > 0.1);
    }
}
