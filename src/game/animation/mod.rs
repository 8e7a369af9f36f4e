//! Interface to the skeletal animation graph.
//!
//! The motion controller treats the animation graph as an opaque collaborator:
//! it reads back the current state, transition and normalized time of every
//! layer and pushes parameters plus a per-layer *motion phase* integer. State
//! names are interned once into [`StateId`]s so motion logic compares integers,
//! never strings.

mod clips;
mod state_machine;
pub mod states;

use std::collections::HashMap;

use bevy::prelude::*;

pub use clips::{
    CharacterAnimationController, ClipBinding, ClipLibrary, attach_animation_players,
    sync_animation_players,
};
pub use state_machine::{AnimationStateMachine, PhaseClip, PhaseTable};

use crate::AppSystems;

pub(super) fn plugin(app: &mut App) {
    app.insert_resource(AnimationStateRegistry::with_builtin_states());
    app.add_systems(
        Update,
        (attach_animation_players, sync_animation_players)
            .chain()
            .in_set(AppSystems::Animate),
    );
}

/// Interned animation state or transition name. `StateId::NONE` means "no state".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub struct StateId(pub u32);

impl StateId {
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Lookup table between friendly state names and ids
#[derive(Debug, Clone, Default, Resource)]
pub struct AnimationStateRegistry {
    names: Vec<String>,
    ids: HashMap<String, StateId>,
}

impl AnimationStateRegistry {
    /// Registry pre-filled with every state the built-in motions use
    pub fn with_builtin_states() -> Self {
        let mut registry = Self::default();
        for name in states::ALL {
            registry.register(name);
        }
        registry
    }

    /// Intern `name`, returning the existing id when it is already known
    pub fn register(&mut self, name: &str) -> StateId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        self.names.push(name.to_string());
        let id = StateId(self.names.len() as u32);
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<StateId> {
        self.ids.get(name).copied()
    }

    /// Resolve a name the caller expects to exist.
    ///
    /// A missing name is a logic bug: it trips a debug assertion in dev builds
    /// and resolves to [`StateId::NONE`] (matches nothing) in release builds.
    pub fn resolve(&self, name: &str) -> StateId {
        match self.lookup(name) {
            Some(id) => id,
            None => {
                warn!("Animation state '{name}' was never registered");
                debug_assert!(false, "unregistered animation state '{name}'");
                StateId::NONE
            }
        }
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        if id.is_none() {
            return None;
        }
        self.names.get(id.0 as usize - 1).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What the animation graph reports for one layer
#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub struct LayerSnapshot {
    pub state_id: StateId,
    /// Non-`NONE` while the layer is blending into `state_id`
    pub transition_id: StateId,
    pub normalized_time: f32,
}

/// Continuous and integer parameters pushed to the graph every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum AnimatorParam {
    IsGrounded,
    Stance,
    InputX,
    InputY,
    InputMagnitude,
    InputMagnitudeAvg,
    InputAngleFromAvatar,
    InputAngleFromCamera,
    /// Idle variation chosen by the idle motion
    IdleVariation,
}

/// Commands and queries the motion controller issues to the animation graph
pub trait AnimatorDriver {
    fn layer_count(&self) -> usize;

    fn layer_state(&self, layer: usize) -> LayerSnapshot;

    /// Root displacement authored in the clips for this frame, in the
    /// character's local space, plus the root rotation delta
    fn root_motion(&self) -> (Vec3, Quat);

    fn set_float(&mut self, param: AnimatorParam, value: f32);

    fn set_integer(&mut self, param: AnimatorParam, value: i32);

    /// Hand the layer a motion phase. With `auto_clear` the phase resets to 0
    /// once the transition it triggered completes.
    fn set_motion_phase(&mut self, layer: usize, phase: i32, auto_clear: bool);
}
