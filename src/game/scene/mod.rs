//! Demo level: ground, walls to climb, a slope to slide down and a moving
//! platform to ride.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{
    AppSystems,
    game::motion::{MotionController, SpawnCharacter},
    screens::Screen,
};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<MovingPlatform>();
    app.register_type::<Patrol>();
    app.add_systems(OnEnter(Screen::Gameplay), (spawn_obstacles, spawn_level).chain());
    app.add_systems(
        Update,
        (drive_platforms, drive_patrols)
            .before(AppSystems::Update)
            .run_if(in_state(Screen::Gameplay)),
    );
}

/// Kinematic body swinging back and forth along `travel`
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct MovingPlatform {
    pub origin: Vec3,
    /// Offset from `origin` at the far end of the swing
    pub travel: Vec3,
    pub period: f32,
}

/// AI character walking between waypoints
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Patrol {
    pub waypoints: Vec<Vec3>,
    pub next: usize,
    /// Normalized input speed handed to the controller
    pub speed: f32,
}

const ARRIVE_RADIUS: f32 = 0.5;

pub fn spawn_level(world: &mut World) {
    SpawnCharacter {
        position: Vec3::new(0.0, 0.5, 0.0),
        is_player: true,
    }
    .apply(world);

    let walker = SpawnCharacter {
        position: Vec3::new(6.0, 0.5, 0.0),
        is_player: false,
    }
    .spawn(world);
    if let Some(walker) = walker {
        world.entity_mut(walker).insert(Patrol {
            waypoints: vec![Vec3::new(6.0, 0.0, 4.0), Vec3::new(6.0, 0.0, -6.0)],
            next: 0,
            speed: 0.5,
        });
    }
}

fn spawn_obstacles(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    info!("Spawning demo level");

    let floor = materials.add(StandardMaterial {
        base_color: Color::srgb(0.3, 0.5, 0.3),
        perceptual_roughness: 0.9,
        ..default()
    });
    let wall = materials.add(Color::srgb(0.7, 0.3, 0.3));
    let ramp = materials.add(Color::srgb(0.7, 0.7, 0.3));
    let platform = materials.add(Color::srgb(0.3, 0.3, 0.7));

    let mut spawn_box = |name: &str, position: Vec3, rotation: Quat, size: Vec3, material: &Handle<StandardMaterial>| {
        commands.spawn((
            Name::new(name.to_string()),
            DespawnOnExit(Screen::Gameplay),
            Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(position).with_rotation(rotation),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
        ));
    };

    spawn_box("Ground", Vec3::new(0.0, -0.25, 0.0), Quat::IDENTITY, Vec3::new(50.0, 0.5, 50.0), &floor);

    // Vaultable, between the mid-height limits
    spawn_box("Low Wall", Vec3::new(-6.0, 0.5, -4.0), Quat::IDENTITY, Vec3::new(4.0, 1.0, 0.5), &wall);
    // Too tall to vault, its top edge is grabbable from a jump
    spawn_box("Ledge Wall", Vec3::new(-6.0, 1.25, -10.0), Quat::IDENTITY, Vec3::new(6.0, 2.5, 1.0), &wall);
    // Steeper than the slide threshold
    spawn_box(
        "Steep Ramp",
        Vec3::new(8.0, 1.0, -14.0),
        Quat::from_rotation_x(35f32.to_radians()),
        Vec3::new(4.0, 0.3, 8.0),
        &ramp,
    );
    // A raised block with a sharp edge to slip off
    spawn_box("Step", Vec3::new(0.0, 0.5, 8.0), Quat::IDENTITY, Vec3::new(3.0, 1.0, 3.0), &wall);

    let origin = Vec3::new(-12.0, 0.25, 4.0);
    commands.spawn((
        Name::new("Moving Platform"),
        DespawnOnExit(Screen::Gameplay),
        Mesh3d(meshes.add(Cuboid::new(3.0, 0.5, 3.0))),
        MeshMaterial3d(platform),
        Transform::from_translation(origin),
        RigidBody::Kinematic,
        Collider::cuboid(3.0, 0.5, 3.0),
        LinearVelocity::ZERO,
        MovingPlatform {
            origin,
            travel: Vec3::new(0.0, 0.0, 8.0),
            period: 6.0,
        },
    ));

    commands.spawn((
        Name::new("Sun"),
        DespawnOnExit(Screen::Gameplay),
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Rate at which platforms that fell behind their swing catch up
const PLATFORM_CORRECTION: f32 = 2.0;

/// Velocity that keeps each platform on its swing around `origin`
fn drive_platforms(time: Res<Time>, mut platforms: Query<(&MovingPlatform, &Transform, &mut LinearVelocity)>) {
    let elapsed = time.elapsed_secs();
    for (platform, transform, mut velocity) in &mut platforms {
        if platform.period <= 0.0 {
            continue;
        }
        // Position is origin + travel * (1 - cos(wt)) / 2
        let omega = std::f32::consts::TAU / platform.period;
        let wanted = platform.origin + platform.travel * (0.5 - 0.5 * (elapsed * omega).cos());
        let swing = platform.travel * (0.5 * omega * (elapsed * omega).sin());
        velocity.0 = swing + (wanted - transform.translation) * PLATFORM_CORRECTION;
    }
}

fn drive_patrols(mut walkers: Query<(&mut Patrol, &mut MotionController)>) {
    for (mut patrol, mut controller) in &mut walkers {
        if patrol.waypoints.is_empty() {
            continue;
        }
        let index = patrol.next % patrol.waypoints.len();
        let target = patrol.waypoints[index];
        let offset = target - controller.body.position;
        if Vec2::new(offset.x, offset.z).length() <= ARRIVE_RADIUS {
            patrol.next = (index + 1) % patrol.waypoints.len();
            debug!("Patrol heading to waypoint {}", patrol.next);
            continue;
        }
        controller.set_target_position(target, patrol.speed);
    }
}
