//! Headless stand-in for an animation graph.
//!
//! Each motion phase maps to a clip with a known duration. The machine jumps to
//! that clip's state when the phase is pushed, blends for a short while (the
//! "transition"), and advances normalized time. Skeletal playback mirrors it,
//! see [`super::sync_animation_players`].

use std::collections::HashMap;

use bevy::prelude::*;

use super::{
    AnimationStateRegistry, AnimatorDriver, AnimatorParam, LayerSnapshot, StateId,
    states::{self, phase},
};

/// Clip played for a motion phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseClip {
    pub state: StateId,
    /// Clip length in seconds
    pub duration: f32,
    pub looping: bool,
    /// Blend time into the clip
    pub blend: f32,
    /// Root displacement per second authored into the clip (local space)
    pub root_velocity: Vec3,
}

impl PhaseClip {
    pub fn new(state: StateId, duration: f32, looping: bool) -> Self {
        Self {
            state,
            duration,
            looping,
            blend: 0.15,
            root_velocity: Vec3::ZERO,
        }
    }

    pub fn with_root_velocity(mut self, root_velocity: Vec3) -> Self {
        self.root_velocity = root_velocity;
        self
    }

    pub fn with_blend(mut self, blend: f32) -> Self {
        self.blend = blend;
        self
    }
}

/// Motion phase to clip lookup, per layer
#[derive(Debug, Clone, Default)]
pub struct PhaseTable {
    clips: HashMap<(usize, i32), PhaseClip>,
    default_states: Vec<StateId>,
}

impl PhaseTable {
    /// Phase table matching the built-in motions, all on layer 0
    pub fn builtin(registry: &mut AnimationStateRegistry) -> Self {
        let mut table = Self::default();
        let mut clip = |name: &str, duration: f32, looping: bool| {
            PhaseClip::new(registry.register(name), duration, looping)
        };

        let idle = clip(states::IDLE_POSE, 2.0, true);
        let entries = [
            (phase::IDLE, idle),
            (phase::IDLE_VARIATION, clip(states::IDLE_VARIATION, 3.0, false)),
            (phase::WALK_RUN, clip(states::WALK_RUN, 1.0, true)),
            (phase::WALK_RUN_PIVOT_LEFT, clip(states::RUN_PIVOT_LEFT, 0.5, false)),
            (phase::WALK_RUN_PIVOT_RIGHT, clip(states::RUN_PIVOT_RIGHT, 0.5, false)),
            (phase::WALK_RUN_STOP, clip(states::RUN_STOP, 0.4, false)),
            (phase::SNEAK, clip(states::SNEAK_IDLE, 2.0, true)),
            (phase::SNEAK_MOVE, clip(states::SNEAK_MOVE, 1.2, true)),
            (phase::JUMP_LAUNCH, clip(states::JUMP_LAUNCH, 0.2, false).with_blend(0.05)),
            (phase::JUMP_RISE, clip(states::JUMP_RISE, 0.3, false)),
            (phase::JUMP_RISE_POSE, clip(states::JUMP_RISE_POSE, 1.0, true)),
            (phase::JUMP_RISE_TO_TOP, clip(states::JUMP_RISE_TO_TOP, 0.2, false)),
            (phase::JUMP_TOP, clip(states::JUMP_TOP, 0.2, false)),
            (phase::JUMP_TOP_TO_FALL, clip(states::JUMP_TOP_TO_FALL, 0.2, false)),
            (phase::JUMP_FALL_POSE, clip(states::JUMP_FALL_POSE, 1.0, true)),
            (phase::JUMP_LAND, clip(states::JUMP_LAND, 0.2, false).with_blend(0.05)),
            (phase::JUMP_RECOVER_IDLE, clip(states::JUMP_RECOVER_IDLE, 0.4, false)),
            (phase::JUMP_RECOVER_RUN, clip(states::JUMP_RECOVER_RUN, 0.3, false)),
            (phase::SLIDE, clip(states::SLIDE, 1.0, true)),
            (phase::EDGE_SLIP, clip(states::EDGE_SLIP, 0.6, false)),
            (phase::PUNCH, clip(states::PUNCH_WIND_UP, 0.2, false)),
            (
                phase::PUNCH_STRIKE,
                clip(states::PUNCH_STRIKE, 0.25, false)
                    .with_root_velocity(Vec3::new(0.0, 0.0, -0.6)),
            ),
            (phase::PUNCH_RECOVER, clip(states::PUNCH_RECOVER, 0.35, false)),
            (phase::CLIMB_CROUCH_GRAB, clip(states::CLIMB_CROUCH_GRAB, 0.3, false)),
            (phase::CLIMB_CROUCH_HANG, clip(states::CLIMB_CROUCH_POSE, 2.0, true)),
            (
                phase::CLIMB_CROUCH_SHIMMY_LEFT,
                clip(states::CLIMB_CROUCH_SHIMMY_LEFT, 0.8, true),
            ),
            (
                phase::CLIMB_CROUCH_SHIMMY_RIGHT,
                clip(states::CLIMB_CROUCH_SHIMMY_RIGHT, 0.8, true),
            ),
            (phase::CLIMB_CROUCH_TO_TOP, clip(states::CLIMB_CROUCH_TO_TOP, 1.2, false)),
            (phase::CLIMB_CROUCH_RECOVER, clip(states::CLIMB_CROUCH_RECOVER, 0.4, false)),
            (phase::CLIMB_MID, clip(states::CLIMB_MID_START, 0.3, false)),
            (phase::CLIMB_MID_TO_TOP, clip(states::CLIMB_MID_TO_TOP, 0.7, false)),
            (phase::CLIMB_MID_RECOVER, clip(states::CLIMB_MID_RECOVER, 0.3, false)),
        ];
        for (motion_phase, clip) in entries {
            table.insert(0, motion_phase, clip);
        }
        table.default_states = vec![idle.state];
        table
    }

    pub fn insert(&mut self, layer: usize, motion_phase: i32, clip: PhaseClip) {
        self.clips.insert((layer, motion_phase), clip);
        if self.default_states.len() <= layer {
            self.default_states.resize(layer + 1, StateId::NONE);
        }
    }

    pub fn get(&self, layer: usize, motion_phase: i32) -> Option<&PhaseClip> {
        self.clips.get(&(layer, motion_phase))
    }

    pub fn find_state(&self, state: StateId) -> Option<&PhaseClip> {
        self.clips.values().find(|clip| clip.state == state)
    }

    pub fn layer_count(&self) -> usize {
        self.default_states.len().max(1)
    }
}

#[derive(Debug, Clone, Default)]
struct MachineLayer {
    snapshot: LayerSnapshot,
    clip: Option<PhaseClip>,
    phase: i32,
    auto_clear: bool,
    pending: Option<i32>,
    blend_remaining: f32,
}

/// Animation graph that runs without skeletal assets
#[derive(Component, Debug, Clone)]
pub struct AnimationStateMachine {
    table: PhaseTable,
    layers: Vec<MachineLayer>,
    floats: HashMap<AnimatorParam, f32>,
    integers: HashMap<AnimatorParam, i32>,
    root_translation: Vec3,
    root_rotation: Quat,
}

impl AnimationStateMachine {
    pub fn new(table: PhaseTable) -> Self {
        let layers = (0..table.layer_count())
            .map(|layer| {
                let state = table.default_states.get(layer).copied().unwrap_or_default();
                MachineLayer {
                    snapshot: LayerSnapshot {
                        state_id: state,
                        ..default()
                    },
                    clip: table.find_state(state).copied(),
                    ..default()
                }
            })
            .collect();
        Self {
            table,
            layers,
            floats: HashMap::new(),
            integers: HashMap::new(),
            root_translation: Vec3::ZERO,
            root_rotation: Quat::IDENTITY,
        }
    }

    pub fn builtin(registry: &mut AnimationStateRegistry) -> Self {
        Self::new(PhaseTable::builtin(registry))
    }

    /// Step every layer by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        self.root_translation = Vec3::ZERO;
        self.root_rotation = Quat::IDENTITY;
        if dt <= 0.0 {
            return;
        }

        for (index, layer) in self.layers.iter_mut().enumerate() {
            if let Some(motion_phase) = layer.pending.take()
                && let Some(clip) = self.table.get(index, motion_phase).copied()
            {
                let same_loop = layer.snapshot.state_id == clip.state && clip.looping;
                if !same_loop {
                    layer.snapshot = LayerSnapshot {
                        state_id: clip.state,
                        transition_id: clip.state,
                        normalized_time: 0.0,
                    };
                    layer.clip = Some(clip);
                    layer.blend_remaining = clip.blend;
                    continue;
                }
            }

            if let Some(clip) = layer.clip {
                let step = dt / clip.duration.max(f32::EPSILON);
                let time = layer.snapshot.normalized_time + step;
                layer.snapshot.normalized_time = if clip.looping { time.fract() } else { time.min(1.0) };
                if index == 0 {
                    self.root_translation = clip.root_velocity * dt;
                }
            }

            if !layer.snapshot.transition_id.is_none() {
                layer.blend_remaining -= dt;
                if layer.blend_remaining <= 0.0 {
                    layer.snapshot.transition_id = StateId::NONE;
                    if layer.auto_clear {
                        layer.phase = phase::NONE;
                    }
                }
            }
        }
    }

    /// Phase currently held by a layer (0 once auto-cleared)
    pub fn layer_phase(&self, layer: usize) -> i32 {
        self.layers.get(layer).map(|l| l.phase).unwrap_or(phase::NONE)
    }

    pub fn current_clip(&self, layer: usize) -> Option<&PhaseClip> {
        self.layers.get(layer).and_then(|l| l.clip.as_ref())
    }

    pub fn float(&self, param: AnimatorParam) -> f32 {
        self.floats.get(&param).copied().unwrap_or(0.0)
    }

    pub fn integer(&self, param: AnimatorParam) -> i32 {
        self.integers.get(&param).copied().unwrap_or(0)
    }
}

impl AnimatorDriver for AnimationStateMachine {
    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_state(&self, layer: usize) -> LayerSnapshot {
        self.layers
            .get(layer)
            .map(|l| l.snapshot)
            .unwrap_or_default()
    }

    fn root_motion(&self) -> (Vec3, Quat) {
        (self.root_translation, self.root_rotation)
    }

    fn set_float(&mut self, param: AnimatorParam, value: f32) {
        self.floats.insert(param, value);
    }

    fn set_integer(&mut self, param: AnimatorParam, value: i32) {
        self.integers.insert(param, value);
    }

    fn set_motion_phase(&mut self, layer: usize, motion_phase: i32, auto_clear: bool) {
        let Some(layer) = self.layers.get_mut(layer) else {
            return;
        };
        if motion_phase == phase::NONE {
            return;
        }
        layer.phase = motion_phase;
        layer.auto_clear = auto_clear;
        layer.pending = Some(motion_phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (AnimationStateMachine, AnimationStateRegistry) {
        let mut registry = AnimationStateRegistry::with_builtin_states();
        let machine = AnimationStateMachine::builtin(&mut registry);
        (machine, registry)
    }

    #[test]
    fn test_starts_in_idle() {
        let (machine, registry) = machine();
        assert_eq!(
            machine.layer_state(0).state_id,
            registry.resolve(states::IDLE_POSE)
        );
    }

    #[test]
    fn test_phase_enters_clip_and_auto_clears() {
        let (mut machine, registry) = machine();
        machine.set_motion_phase(0, phase::JUMP_LAUNCH, true);
        machine.advance(0.016);

        let snapshot = machine.layer_state(0);
        assert_eq!(snapshot.state_id, registry.resolve(states::JUMP_LAUNCH));
        assert!(!snapshot.transition_id.is_none());
        assert_eq!(machine.layer_phase(0), phase::JUMP_LAUNCH);

        for _ in 0..10 {
            machine.advance(0.016);
        }
        let snapshot = machine.layer_state(0);
        assert!(snapshot.transition_id.is_none());
        assert_eq!(machine.layer_phase(0), phase::NONE);
        assert!(snapshot.normalized_time > 0.5);
    }

    #[test]
    fn test_one_shot_clip_clamps_and_loop_wraps() {
        let (mut machine, _) = machine();
        machine.set_motion_phase(0, phase::JUMP_LAND, true);
        machine.advance(0.01);
        for _ in 0..60 {
            machine.advance(0.02);
        }
        assert_eq!(machine.layer_state(0).normalized_time, 1.0);

        machine.set_motion_phase(0, phase::WALK_RUN, true);
        machine.advance(0.01);
        for _ in 0..60 {
            machine.advance(0.02);
        }
        assert!(machine.layer_state(0).normalized_time < 1.0);
    }

    #[test]
    fn test_root_motion_from_clip() {
        let (mut machine, _) = machine();
        machine.set_motion_phase(0, phase::PUNCH_STRIKE, true);
        machine.advance(0.01);
        machine.advance(0.1);
        let (translation, _) = machine.root_motion();
        assert!((translation.z + 0.06).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_layer_is_ignored() {
        let (mut machine, _) = machine();
        machine.set_motion_phase(7, phase::IDLE, true);
        assert_eq!(machine.layer_state(7), LayerSnapshot::default());
    }
}
