//! Fixtures shared by the motion tests.

use bevy::prelude::*;

use super::{
    CameraRequests, CharacterBody, ControllerState, ForceAccumulator, FrameInput, Motion,
    MotionContext, MotionController, MotionCore, MotionKind, Stance,
};
use crate::game::{
    animation::{AnimationStateMachine, AnimationStateRegistry},
    configs::{CharacterConfig, ControllerSettings},
    environment::SimpleScene,
    input::InputSnapshot,
};

pub const DT: f32 = 1.0 / 60.0;

/// Everything a [`MotionContext`] borrows, owned in one place
pub struct Harness {
    pub scene: SimpleScene,
    pub state: ControllerState,
    pub previous: ControllerState,
    pub input: InputSnapshot,
    pub body: CharacterBody,
    pub forces: ForceAccumulator,
    pub settings: ControllerSettings,
    pub camera: CameraRequests,
    pub time: f32,
}

impl Harness {
    pub fn flat_ground() -> Self {
        let mut scene = SimpleScene::new();
        scene.add_ground(0.0);
        let mut state = ControllerState::default();
        state.is_grounded = true;
        state.ground_distance = 0.0;
        Self {
            scene,
            previous: state.clone(),
            state,
            input: InputSnapshot::default(),
            body: CharacterBody::default(),
            forces: ForceAccumulator::new(5.0, DT),
            settings: ControllerSettings::default(),
            camera: CameraRequests::default(),
            time: 1.0,
        }
    }

    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut MotionContext) -> R) -> R {
        let mut ctx = MotionContext {
            time: self.time,
            dt: DT,
            state: &mut self.state,
            previous: &self.previous,
            input: &self.input,
            env: &mut self.scene,
            body: &mut self.body,
            forces: &mut self.forces,
            settings: &self.settings,
            camera: &mut self.camera,
            layer: 0,
            active: None,
        };
        f(&mut ctx)
    }
}

/// Motion whose answers are set by the test
pub struct ScriptedMotion {
    pub core: MotionCore,
    pub id: u32,
    pub wants_activate: bool,
    pub wants_continue: bool,
    pub accepts: bool,
    pub update_velocity: Vec3,
    pub gravity: bool,
    pub grounding: Option<bool>,
    /// Stance written on activation and on deactivation
    pub enter_stance: Option<Stance>,
    pub exit_stance: Option<Stance>,
}

impl ScriptedMotion {
    pub fn new(id: u32, priority: f32) -> Self {
        Self {
            core: MotionCore::new(&format!("Scripted{id}"), priority),
            id,
            wants_activate: false,
            wants_continue: true,
            accepts: true,
            update_velocity: Vec3::ZERO,
            gravity: true,
            grounding: None,
            enter_stance: None,
            exit_stance: None,
        }
    }

    pub fn wanting(mut self, wants_activate: bool) -> Self {
        self.wants_activate = wants_activate;
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.core.is_interruptible = interruptible;
        self
    }
}

impl Motion for ScriptedMotion {
    fn kind(&self) -> MotionKind {
        MotionKind::Custom(self.id)
    }

    fn core(&self) -> &MotionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MotionCore {
        &mut self.core
    }

    fn test_activate(&self, _ctx: &MotionContext) -> bool {
        self.wants_activate
    }

    fn test_update(&self, _ctx: &MotionContext) -> bool {
        self.wants_continue
    }

    fn activate(&mut self, _previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool {
        if self.accepts
            && let Some(stance) = self.enter_stance
        {
            ctx.state.stance = stance;
        }
        self.accepts
    }

    fn on_deactivate(&mut self, ctx: &mut MotionContext) {
        if let Some(stance) = self.exit_stance {
            ctx.state.stance = stance;
        }
    }

    fn update_motion(&mut self, _ctx: &mut MotionContext) {
        self.core.velocity = self.update_velocity;
        self.core.gravity_enabled = self.gravity;
    }

    fn determine_grounding(&self, state: &ControllerState) -> bool {
        self.grounding.unwrap_or(state.is_grounded)
    }
}

/// A controller with every built-in motion, its animator and a scene
pub struct Simulation {
    pub controller: MotionController,
    pub animator: AnimationStateMachine,
    pub registry: AnimationStateRegistry,
    pub scene: SimpleScene,
    pub input: InputSnapshot,
    pub camera_forward: Vec3,
}

impl Simulation {
    pub fn new(scene: SimpleScene, config: &CharacterConfig, position: Vec3) -> Self {
        let mut registry = AnimationStateRegistry::with_builtin_states();
        let animator = AnimationStateMachine::builtin(&mut registry);
        let mut controller = MotionController::with_builtin_motions(config, &registry);
        controller.body.position = position;
        Self {
            controller,
            animator,
            registry,
            scene,
            input: InputSnapshot::default(),
            camera_forward: Vec3::NEG_Z,
        }
    }

    pub fn on_flat_ground() -> Self {
        let mut scene = SimpleScene::new();
        scene.add_ground(0.0);
        Self::new(scene, &CharacterConfig::default(), Vec3::ZERO)
    }

    /// Update, animate and run the late pass for one frame
    pub fn step(&mut self) {
        self.controller.update(FrameInput {
            dt: DT,
            input: &self.input,
            camera_forward: self.camera_forward,
            env: &mut self.scene,
            animator: &mut self.animator,
        });
        self.animator.advance(DT);
        self.controller.late_update(&self.scene);
    }

    pub fn run(&mut self, frames: usize) {
        for _ in 0..frames {
            self.step();
        }
    }

    /// Step until `done` holds, at most `max_frames` times
    pub fn run_until(&mut self, max_frames: usize, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..max_frames {
            self.step();
            if done(self) {
                return true;
            }
        }
        false
    }

    pub fn active(&self) -> Option<MotionKind> {
        self.controller.active_kind(0)
    }
}
