//! Motion arbitration and camera rigs for a third-person character.
//!
//! Add [`MotionRigPlugin`] next to Bevy's `DefaultPlugins`. It brings avian's
//! physics, the character and camera systems and a small demo level.

#[cfg(feature = "dev")]
mod dev_tools;
pub mod game;
pub mod screens;

use avian3d::prelude::*;
use bevy::{prelude::*, transform::TransformSystems};

pub struct MotionRigPlugin;

impl Plugin for MotionRigPlugin {
    fn build(&self, app: &mut App) {
        // Order new `AppSystems` variants by adding them here:
        app.configure_sets(
            Update,
            (
                AppSystems::RecordInput,
                AppSystems::Update,
                AppSystems::Animate,
            )
                .chain(),
        );
        // Characters settle before any camera looks at them, and both land
        // before transforms propagate for rendering
        app.configure_sets(
            PostUpdate,
            (LateSystems::Characters, LateSystems::Camera)
                .chain()
                .before(TransformSystems::Propagate),
        );

        app.add_plugins(PhysicsPlugins::default());
        app.add_plugins((game::plugin, screens::plugin));

        #[cfg(feature = "dev")]
        app.add_plugins(dev_tools::plugin);

        app.add_systems(Startup, spawn_camera);
    }
}

/// High-level groupings of systems for the app in the `Update` schedule.
/// When adding a new variant, make sure to order it in the `configure_sets`
/// call above.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum AppSystems {
    /// Record player input.
    RecordInput,
    /// Run the motion controllers.
    Update,
    /// Mirror animation state onto the skeletal players.
    Animate,
}

/// Late pass in `PostUpdate`, after every character's update.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LateSystems {
    /// Support carry and transform write-back.
    Characters,
    Camera,
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        Transform::from_xyz(0.0, 3.0, 6.0).looking_at(Vec3::Y, Vec3::Y),
    ));
}
