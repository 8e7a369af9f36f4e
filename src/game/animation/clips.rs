use std::{collections::HashMap, time::Duration};

use bevy::prelude::*;

use super::{AnimationStateMachine, StateId};

/// Animation graph node that plays a state's clip
#[derive(Debug, Clone, Copy)]
pub struct ClipBinding {
    pub node: AnimationNodeIndex,
}

/// Skeletal clips for the named animation states.
///
/// Optional: characters without a library still run on their
/// [`AnimationStateMachine`], they just have nothing to show.
#[derive(Resource, Debug, Clone)]
pub struct ClipLibrary {
    pub graph: Handle<AnimationGraph>,
    bindings: HashMap<StateId, ClipBinding>,
}

impl ClipLibrary {
    /// Build an animation graph with one clip node per state
    pub fn build(
        graphs: &mut Assets<AnimationGraph>,
        clips: impl IntoIterator<Item = (StateId, Handle<AnimationClip>)>,
    ) -> Self {
        let mut graph = AnimationGraph::new();
        let root = graph.root;
        let bindings = clips
            .into_iter()
            .map(|(state, clip)| {
                let node = graph.add_clip(clip, 1.0, root);
                (state, ClipBinding { node })
            })
            .collect::<HashMap<_, _>>();

        info!("Clip library built with {} animation states", bindings.len());
        Self {
            graph: graphs.add(graph),
            bindings,
        }
    }

    pub fn get(&self, state: StateId) -> Option<&ClipBinding> {
        self.bindings.get(&state)
    }
}

/// Links a character to the `AnimationPlayer` inside its spawned scene
#[derive(Component, Debug)]
pub struct CharacterAnimationController {
    pub animation_player: Entity,
    /// State whose clip was last handed to the player
    pub played: StateId,
}

/// Find the character owning a freshly spawned `AnimationPlayer` and wire
/// the player to the clip library's graph
pub fn attach_animation_players(
    mut commands: Commands,
    library: Option<Res<ClipLibrary>>,
    players: Query<Entity, Added<AnimationPlayer>>,
    parents: Query<&ChildOf>,
    characters: Query<(), With<AnimationStateMachine>>,
) {
    let Some(library) = library else {
        return;
    };

    for player in &players {
        let mut current = player;
        let character = loop {
            if characters.contains(current) {
                break Some(current);
            }
            match parents.get(current) {
                Ok(child_of) => current = child_of.parent(),
                Err(_) => break None,
            }
        };
        let Some(character) = character else {
            continue;
        };

        commands.entity(player).insert((
            AnimationGraphHandle(library.graph.clone()),
            AnimationTransitions::new(),
        ));
        commands.entity(character).insert(CharacterAnimationController {
            animation_player: player,
            played: StateId::NONE,
        });
        debug!("Attached animation player {player} to character {character}");
    }
}

/// Mirror the state machine's current state onto the skeletal player
pub fn sync_animation_players(
    library: Option<Res<ClipLibrary>>,
    mut characters: Query<(&AnimationStateMachine, &mut CharacterAnimationController)>,
    mut players: Query<(&mut AnimationPlayer, &mut AnimationTransitions)>,
) {
    let Some(library) = library else {
        return;
    };

    for (machine, mut controller) in &mut characters {
        let Some(clip) = machine.current_clip(0) else {
            continue;
        };
        if controller.played == clip.state {
            continue;
        }
        controller.played = clip.state;

        let Some(binding) = library.get(clip.state) else {
            continue;
        };
        let Ok((mut player, mut transitions)) = players.get_mut(controller.animation_player) else {
            continue;
        };

        let active = transitions.play(
            &mut player,
            binding.node,
            Duration::from_secs_f32(clip.blend),
        );
        if clip.looping {
            active.repeat();
        }
    }
}
