use bevy::{
    prelude::*,
    window::{CursorGrabMode, CursorOptions},
};

use super::{CameraRig, RigFrame};
use crate::{
    LateSystems,
    game::{
        configs::CharacterConfig,
        input::{Action, ActionProvider, InputBindings, InputSnapshot},
        motion::{CharacterEnvironment, MotionController, PlayerCharacter},
    },
    screens::Screen,
};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<CameraRig>();
    app.add_systems(Update, (attach_camera_rig, cycle_camera_mode));
    app.add_systems(
        PostUpdate,
        (apply_camera_mode_requests, update_camera_rigs)
            .chain()
            .in_set(LateSystems::Camera),
    );

    app.add_systems(OnEnter(Screen::Gameplay), lock_cursor);
    app.add_systems(OnExit(Screen::Gameplay), unlock_cursor);
}

/// Give the main camera a rig once the player character exists
fn attach_camera_rig(
    mut commands: Commands,
    config: Option<Res<CharacterConfig>>,
    players: Query<Entity, With<PlayerCharacter>>,
    cameras: Query<Entity, (With<Camera3d>, Without<CameraRig>)>,
) {
    let Ok(player) = players.single() else {
        return;
    };
    let Ok(camera) = cameras.single() else {
        return;
    };
    let settings = config.map(|config| config.camera.clone()).unwrap_or_default();
    info!("Camera {camera} now follows player {player} in {:?}", settings.mode);
    commands
        .entity(camera)
        .insert(CameraRig::adventure(player, settings));
}

fn cycle_camera_mode(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    mut rigs: Query<&mut CameraRig>,
) {
    if !keyboard.just_pressed(bindings.cycle_camera) {
        return;
    }
    for mut rig in &mut rigs {
        let next = rig.mode().next();
        rig.transition_to_mode(next);
    }
}

/// Hand mode changes asked for by motions to the rigs following them
fn apply_camera_mode_requests(
    mut controllers: Query<&mut MotionController>,
    mut rigs: Query<&mut CameraRig>,
) {
    for mut rig in &mut rigs {
        let Ok(mut controller) = controllers.get_mut(rig.target) else {
            continue;
        };
        if let Some(mode) = controller.take_camera_mode_request() {
            rig.transition_to_mode(mode);
        }
    }
}

fn update_camera_rigs(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    mut environment: CharacterEnvironment,
    characters: Query<(&MotionController, Has<PlayerCharacter>)>,
    mut rigs: Query<(&mut CameraRig, &mut Transform)>,
) {
    for (mut rig, mut transform) in &mut rigs {
        let Ok((controller, is_player)) = characters.get(rig.target) else {
            continue;
        };
        let (view_input, aiming) = if is_player {
            (input.view(), input.is_pressed(Action::Aiming))
        } else {
            (Vec2::ZERO, false)
        };

        let env = environment.for_character(rig.target);
        rig.late_update(&RigFrame {
            dt: time.delta_secs(),
            anchor: controller.anchor_position(),
            body_position: controller.body.position,
            body_rotation: controller.body.rotation,
            body_radius: controller.body.radius,
            motion_offset: controller.camera_offset(),
            view_input,
            aiming,
            env: &env,
        });
        *transform = rig.transform();
    }
}

fn lock_cursor(mut cursor_options: Query<&mut CursorOptions, With<Window>>) {
    if let Ok(mut cursor) = cursor_options.single_mut() {
        cursor.grab_mode = CursorGrabMode::Locked;
        cursor.visible = false;
        info!("Cursor locked for gameplay");
    }
}

fn unlock_cursor(mut cursor_options: Query<&mut CursorOptions, With<Window>>) {
    if let Ok(mut cursor) = cursor_options.single_mut() {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
        info!("Cursor released");
    }
}
