//! Motion arbitration.
//!
//! A [`MotionController`] owns one or more [`MotionLayer`]s. Each layer holds a
//! prioritised list of [`Motion`]s and lets exactly one of them drive the
//! character (and its animation layer) at a time.

mod controller;
pub mod forces;
pub mod ground;
mod layer;
pub mod motions;
pub mod state;
mod systems;

use std::any::Any;

use bevy::prelude::*;

use crate::game::{
    animation::{AnimationStateRegistry, StateId},
    camera::CameraMode,
    configs::{CharacterConfig, ControllerSettings},
    environment::Environment,
    input::ActionProvider,
};

pub use controller::{AiTarget, FrameInput, MotionController};
pub use forces::ForceAccumulator;
pub use ground::GroundProbe;
pub use layer::MotionLayer;
pub use state::{ControllerState, InputDirection, Stance};
pub use systems::{CharacterEnvironment, PlayerCharacter, SpawnCharacter};

pub(super) fn plugin(app: &mut App) {
    systems::plugin(app);
}

/// Tag used to look motions up without reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum MotionKind {
    Idle,
    WalkRunPivot,
    Sneak,
    Jump,
    Fall,
    Slide,
    ClimbLedge,
    ClimbMid,
    EdgeSlip,
    Punch,
    /// Game-defined motions
    Custom(u32),
}

/// The character's collision body as the controller sees it
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct CharacterBody {
    /// Position of the feet
    pub position: Vec3,
    pub rotation: Quat,
    pub radius: f32,
    pub height: f32,
    /// Height the collider returns to when motions stop resizing it
    pub base_height: f32,
}

impl Default for CharacterBody {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.4, 1.8)
    }
}

impl CharacterBody {
    pub fn new(position: Vec3, radius: f32, height: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            radius,
            height,
            base_height: height,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * (self.height * 0.5)
    }

    /// Facing direction on the ground plane, -Z is forward
    pub fn forward(&self) -> Vec3 {
        let forward = self.rotation * Vec3::NEG_Z;
        Vec3::new(forward.x, 0.0, forward.z).normalize_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        let forward = self.forward();
        Vec3::new(-forward.z, 0.0, forward.x)
    }

    /// Heading in degrees around world up
    pub fn yaw(&self) -> f32 {
        let forward = self.forward();
        (-forward.x).atan2(-forward.z).to_degrees()
    }

    pub fn set_yaw(&mut self, degrees: f32) {
        self.rotation = Quat::from_rotation_y(degrees.to_radians());
    }
}

/// Requests motions make of the camera this frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraRequests {
    pub mode: Option<CameraMode>,
}

/// State shared by every motion
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct MotionCore {
    pub name: String,
    pub enabled: bool,
    /// Higher wins, ties go to the motion registered first
    pub priority: f32,
    /// Seconds after deactivating before the motion may start again
    pub reactivation_delay: f32,
    /// Cleared by motions that must not restart until something resets them
    pub is_startable: bool,
    pub is_active: bool,
    pub activated_this_frame: bool,
    pub is_interruptible: bool,
    /// Performance hint for the ground check
    pub expects_grounded: bool,
    pub gravity_enabled: bool,
    /// World-space velocity contributed this frame
    pub velocity: Vec3,
    /// Degrees per second around each world axis
    pub angular_velocity: Vec3,
    pub phase: i32,
    pub activation_time: f32,
    pub deactivation_time: Option<f32>,
    /// Motion layer the motion belongs to
    pub layer_index: usize,
}

impl MotionCore {
    pub fn new(name: &str, priority: f32) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            priority,
            reactivation_delay: 0.0,
            is_startable: true,
            is_active: false,
            activated_this_frame: false,
            is_interruptible: true,
            expects_grounded: true,
            gravity_enabled: true,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            phase: 0,
            activation_time: 0.0,
            deactivation_time: None,
            layer_index: 0,
        }
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.is_interruptible = interruptible;
        self
    }

    pub fn expecting_ground(mut self, expects_grounded: bool) -> Self {
        self.expects_grounded = expects_grounded;
        self
    }

    /// Whether the layer may try to start the motion at `time`
    pub fn can_start(&self, time: f32) -> bool {
        if !self.enabled || !self.is_startable || self.is_active {
            return false;
        }
        match self.deactivation_time {
            Some(deactivated) => time - deactivated >= self.reactivation_delay,
            None => true,
        }
    }

    pub fn mark_active(&mut self, time: f32) {
        self.is_active = true;
        self.activated_this_frame = true;
        self.activation_time = time;
    }

    /// Seconds since the motion started
    pub fn age(&self, time: f32) -> f32 {
        time - self.activation_time
    }

    /// Safe to call repeatedly
    pub fn deactivate(&mut self, time: f32) {
        if self.is_active {
            self.deactivation_time = Some(time);
        }
        self.is_active = false;
        self.activated_this_frame = false;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.phase = 0;
    }
}

/// Everything a motion may read or touch while the controller runs it
pub struct MotionContext<'a> {
    pub time: f32,
    pub dt: f32,
    pub state: &'a mut ControllerState,
    pub previous: &'a ControllerState,
    pub input: &'a dyn ActionProvider,
    pub env: &'a mut dyn Environment,
    pub body: &'a mut CharacterBody,
    pub forces: &'a mut ForceAccumulator,
    pub settings: &'a ControllerSettings,
    pub camera: &'a mut CameraRequests,
    /// Animation layer driven by the running motion's layer
    pub layer: usize,
    /// Motion active on the running layer before this step
    pub active: Option<MotionKind>,
}

impl MotionContext<'_> {
    /// Hand the animation layer a new motion phase
    pub fn set_motion_phase(&mut self, phase: i32, auto_clear: bool) {
        if let Some(layer) = self.state.layers.get_mut(self.layer) {
            layer.motion_phase = phase;
            layer.auto_clear_phase = auto_clear;
        }
    }

    /// Current animation state on the running layer
    pub fn animator_state(&self) -> StateId {
        self.state
            .layer(self.layer)
            .map(|l| l.snapshot.state_id)
            .unwrap_or_default()
    }

    /// Normalized time of the current animation state
    pub fn animator_time(&self) -> f32 {
        self.state
            .layer(self.layer)
            .map(|l| l.snapshot.normalized_time)
            .unwrap_or_default()
    }

    /// Whether the running layer is mid-transition
    pub fn in_transition(&self) -> bool {
        self.state
            .layer(self.layer)
            .is_some_and(|l| !l.snapshot.transition_id.is_none())
    }
}

/// Downcasting support for concrete motion access
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A behaviour that can own the character's movement and animation layer.
pub trait Motion: AsAny + Send + Sync {
    fn kind(&self) -> MotionKind;

    fn core(&self) -> &MotionCore;

    fn core_mut(&mut self) -> &mut MotionCore;

    /// Resolve the animation state names the motion compares against
    fn bind(&mut self, _registry: &AnimationStateRegistry) {}

    /// Pick up new tuning values
    fn configure(&mut self, _config: &CharacterConfig) {}

    /// Called every frame before arbitration, active or not
    fn refresh(&mut self, _ctx: &MotionContext) {}

    /// Whether the motion wants to start. Must not change anything.
    fn test_activate(&self, ctx: &MotionContext) -> bool;

    /// Whether the active motion keeps running this frame
    fn test_update(&self, _ctx: &MotionContext) -> bool {
        true
    }

    /// Enter the motion. Returning `false` aborts the start.
    fn activate(&mut self, previous: Option<MotionKind>, ctx: &mut MotionContext) -> bool;

    /// Motion-specific cleanup run before the shared deactivation
    fn on_deactivate(&mut self, _ctx: &mut MotionContext) {}

    fn update_motion(&mut self, ctx: &mut MotionContext);

    /// May veto grounding. Returning `true` never grounds an airborne character.
    fn determine_grounding(&self, state: &ControllerState) -> bool {
        state.is_grounded
    }

    /// Adjust this frame's root motion before it reaches the body
    fn clean_root_motion(&self, _state: &ControllerState, _translation: &mut Vec3, _rotation: &mut Quat) {}

    fn on_animator_state_change(&mut self, _layer: usize, _old: StateId, _new: StateId) {}

    /// Offset added to the first-person camera anchor while active
    fn camera_offset(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn name(&self) -> &str {
        &self.core().name
    }

    fn is_active(&self) -> bool {
        self.core().is_active
    }

    /// Leave the motion. Velocities always end up zero.
    fn deactivate(&mut self, ctx: &mut MotionContext) {
        if self.core().is_active {
            self.on_deactivate(ctx);
            debug!("Motion '{}' deactivated", self.core().name);
        }
        self.core_mut().deactivate(ctx.time);
    }
}

/// Turn `current` toward `target` (degrees) by at most `max_step`
pub(crate) fn step_angle(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = wrap_degrees(target - current);
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

/// Wrap an angle into (-180, 180]
pub(crate) fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Signed yaw (degrees) from `from` to `to`, both on the ground plane
pub(crate) fn signed_yaw_between(from: Vec3, to: Vec3) -> f32 {
    let from = Vec3::new(from.x, 0.0, from.z);
    let to = Vec3::new(to.x, 0.0, to.z);
    if from.length_squared() <= f32::EPSILON || to.length_squared() <= f32::EPSILON {
        return 0.0;
    }
    // Positive turns right (clockwise seen from above)
    let cross = from.cross(to).y;
    let dot = from.dot(to);
    (-cross).atan2(dot).to_degrees()
}

#[cfg(test)]
pub(crate) mod test_support;
