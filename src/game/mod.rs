//! Character motion, the camera rigs and the demo level.

pub mod animation;
pub mod camera;
pub mod configs;
pub mod environment;
pub mod input;
pub mod motion;
mod scene;

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins((
        configs::plugin,
        input::plugin,
        animation::plugin,
        motion::plugin,
        camera::plugin,
        scene::plugin,
    ));
}
