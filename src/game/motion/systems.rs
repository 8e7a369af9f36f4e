//! Drives every [`MotionController`] from the ECS.

use avian3d::prelude::*;
use bevy::{ecs::system::SystemParam, prelude::*};

use super::{FrameInput, MotionController};
use crate::{
    AppSystems, LateSystems,
    game::{
        animation::{AnimationStateMachine, AnimationStateRegistry},
        camera::CameraRig,
        configs::{CharacterConfig, CharacterConfigHandle},
        environment::{AvianEnvironment, BodyQuery, IgnoredCollisions},
        input::InputSnapshot,
    },
    screens::Screen,
};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<PlayerCharacter>();
    app.init_resource::<IgnoredCollisions>();

    app.add_systems(Update, apply_character_config);
    app.add_systems(Update, update_characters.in_set(AppSystems::Update));
    app.add_systems(
        PostUpdate,
        (carry_on_supports, sync_character_transforms)
            .chain()
            .in_set(LateSystems::Characters),
    );
}

/// Character read from the player's devices. Characters without it only
/// move through AI targets.
#[derive(Component, Debug, Default, Reflect)]
#[reflect(Component)]
pub struct PlayerCharacter;

/// The physics world as characters see it
#[derive(SystemParam)]
pub struct CharacterEnvironment<'w, 's> {
    spatial_query: SpatialQuery<'w, 's>,
    bodies: BodyQuery<'w, 's>,
    ignored: ResMut<'w, IgnoredCollisions>,
}

impl<'w, 's> CharacterEnvironment<'w, 's> {
    /// Environment that never reports `character` itself
    pub fn for_character(&mut self, character: Entity) -> AvianEnvironment<'_, 'w, 's> {
        AvianEnvironment::new(
            &self.spatial_query,
            &self.bodies,
            character,
            self.ignored.for_character(character),
        )
    }
}

// ========================================================================
// Spawning
// ========================================================================

/// Spawn a character with every built-in motion
pub struct SpawnCharacter {
    pub position: Vec3,
    /// Take input from the player's devices
    pub is_player: bool,
}

impl SpawnCharacter {
    /// Spawn right away, returning the new character. Failures are logged.
    pub fn spawn(self, world: &mut World) -> Option<Entity> {
        let position = self.position;
        world
            .run_system_cached_with(spawn_character, self)
            .inspect_err(|error| warn!("Failed to spawn character at {position}: {error}"))
            .ok()
    }
}

impl Command for SpawnCharacter {
    fn apply(self, world: &mut World) {
        self.spawn(world);
    }
}

fn spawn_character(
    In(spawn): In<SpawnCharacter>,
    mut commands: Commands,
    config: Option<Res<CharacterConfig>>,
    mut registry: ResMut<AnimationStateRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) -> Entity {
    let config = config.map(|config| config.clone()).unwrap_or_default();
    let animator = AnimationStateMachine::builtin(&mut registry);
    let mut controller = MotionController::with_builtin_motions(&config, &registry);
    controller.body.position = spawn.position;

    let radius = controller.body.radius;
    let height = controller.body.height;
    // Capsule length excludes the two caps, and the entity origin sits at the feet
    let length = (height - 2.0 * radius).max(0.0);
    let collider = Collider::compound(vec![(
        Vec3::Y * (height * 0.5),
        Quat::IDENTITY,
        Collider::capsule(radius, length),
    )]);

    let name = if spawn.is_player { "Player" } else { "Character" };
    let mut entity = commands.spawn((
        Name::new(name),
        controller,
        animator,
        DespawnOnExit(Screen::Gameplay),
        Transform::from_translation(spawn.position),
        Visibility::Visible,
        RigidBody::Kinematic,
        collider,
    ));
    entity.with_children(|parent| {
        parent.spawn((
            Name::new("Body Mesh"),
            Mesh3d(meshes.add(Capsule3d::new(radius, length))),
            MeshMaterial3d(materials.add(Color::srgb(0.8, 0.55, 0.3))),
            Transform::from_translation(Vec3::Y * (height * 0.5)),
        ));
    });
    if spawn.is_player {
        entity.insert(PlayerCharacter);
    }
    info!("Spawned {name} at {}", spawn.position);
    entity.id()
}

// ========================================================================
// Frame
// ========================================================================

/// Push new tuning into every controller whenever the config asset (re)loads
fn apply_character_config(
    mut commands: Commands,
    mut events: MessageReader<AssetEvent<CharacterConfig>>,
    handle: Option<Res<CharacterConfigHandle>>,
    configs: Res<Assets<CharacterConfig>>,
    mut controllers: Query<&mut MotionController>,
    mut rigs: Query<&mut CameraRig>,
) {
    let Some(handle) = handle else {
        events.clear();
        return;
    };
    let changed = events
        .read()
        .any(|event| event.is_loaded_with_dependencies(&handle.0) || event.is_modified(&handle.0));
    if !changed {
        return;
    }
    let Some(config) = configs.get(&handle.0) else {
        return;
    };

    info!(
        "Applying character config to {} controllers",
        controllers.iter().count()
    );
    for mut controller in &mut controllers {
        controller.configure(config);
    }
    for mut rig in &mut rigs {
        rig.apply_settings(config.camera.clone());
    }
    commands.insert_resource(config.clone());
}

fn update_characters(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    mut environment: CharacterEnvironment,
    rigs: Query<&CameraRig>,
    mut characters: Query<(
        Entity,
        &mut MotionController,
        &mut AnimationStateMachine,
        Has<PlayerCharacter>,
    )>,
) {
    let dt = time.delta_secs();
    let no_input = InputSnapshot::default();

    for (entity, mut controller, mut animator, is_player) in &mut characters {
        let camera_forward = rigs
            .iter()
            .find(|rig| rig.target == entity)
            .map(CameraRig::flat_forward)
            .unwrap_or(Vec3::NEG_Z);
        let input = if is_player { &*input } else { &no_input };

        let mut env = environment.for_character(entity);
        controller.update(FrameInput {
            dt,
            input,
            camera_forward,
            env: &mut env,
            animator: &mut *animator,
        });
        animator.advance(dt);
    }
}

/// Move characters along with whatever they stand on
fn carry_on_supports(
    mut environment: CharacterEnvironment,
    mut characters: Query<(Entity, &mut MotionController)>,
) {
    for (entity, mut controller) in &mut characters {
        let env = environment.for_character(entity);
        controller.late_update(&env);
    }
}

fn sync_character_transforms(mut characters: Query<(&MotionController, &mut Transform)>) {
    for (controller, mut transform) in &mut characters {
        transform.translation = controller.body.position;
        transform.rotation = controller.body.rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_without_resources_reports_none() {
        // No asset storage or animation registry yet
        let mut world = World::new();
        let spawned = SpawnCharacter {
            position: Vec3::ZERO,
            is_player: true,
        }
        .spawn(&mut world);

        assert!(spawned.is_none());
        let mut players = world.query::<&PlayerCharacter>();
        assert_eq!(players.iter(&world).count(), 0);
    }
}
