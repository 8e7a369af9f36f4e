//! Development tools for the game. This plugin is only enabled in dev builds.

use avian3d::prelude::{PhysicsDebugPlugin, PhysicsGizmos};
use bevy::{
    color::palettes::css::{AQUA, LIME, ORANGE, RED, YELLOW},
    dev_tools::states::log_transitions,
    input::common_conditions::input_just_pressed,
    prelude::*,
};

use crate::{
    LateSystems,
    game::{
        camera::CameraRig,
        motion::{Motion, MotionController, motions::ClimbLedge},
    },
    screens::Screen,
};

const TOGGLE_PHYSICS_KEY: KeyCode = KeyCode::F3;
const TOGGLE_PROBES_KEY: KeyCode = KeyCode::F4;

pub(super) fn plugin(app: &mut App) {
    // Log `Screen` state transitions.
    app.add_systems(Update, log_transitions::<Screen>);
    app.add_plugins(PhysicsDebugPlugin::default());

    app.init_resource::<ProbeGizmos>();
    app.add_systems(
        Update,
        (
            toggle_physics_debug.run_if(input_just_pressed(TOGGLE_PHYSICS_KEY)),
            toggle_probe_gizmos.run_if(input_just_pressed(TOGGLE_PROBES_KEY)),
        ),
    );
    app.add_systems(
        PostUpdate,
        draw_probe_gizmos
            .after(LateSystems::Camera)
            .run_if(|probes: Res<ProbeGizmos>| probes.enabled),
    );
}

#[derive(Resource, Debug)]
struct ProbeGizmos {
    enabled: bool,
}

impl Default for ProbeGizmos {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn toggle_physics_debug(mut store: ResMut<GizmoConfigStore>) {
    let (config, _) = store.config_mut::<PhysicsGizmos>();
    config.enabled = !config.enabled;
    info!("Physics debug rendering: {}", if config.enabled { "ON" } else { "OFF" });
}

fn toggle_probe_gizmos(mut probes: ResMut<ProbeGizmos>) {
    probes.enabled = !probes.enabled;
    info!("Probe gizmos: {}", if probes.enabled { "ON" } else { "OFF" });
}

/// Ground ray, forward bumper, camera anchor and any ledge being held
fn draw_probe_gizmos(mut gizmos: Gizmos, controllers: Query<&MotionController>, rigs: Query<&CameraRig>) {
    for controller in &controllers {
        let state = controller.state();
        let center = controller.body.center();

        let ground_color = if state.is_grounded { LIME } else { RED };
        let reach = center.y - controller.body.position.y
            + state
                .ground_distance
                .min(controller.probe.settings.ray_extension);
        gizmos.line(center, center - Vec3::Y * reach, ground_color);

        let bumper = if state.is_forward_blocked { ORANGE } else { AQUA };
        gizmos.arrow(center, center + controller.body.forward(), bumper);

        gizmos.sphere(controller.anchor_position(), 0.08, YELLOW);

        if let Some(climb) = controller.motion_as::<ClimbLedge>()
            && climb.is_active()
            && let Some(grab) = climb.last_grab()
        {
            gizmos.sphere(grab, 0.1, ORANGE);
        }
    }

    for rig in &rigs {
        let color = if rig.is_frozen() { RED } else { AQUA };
        gizmos.sphere(rig.position(), rig.settings.collision_radius, color);
    }
}
