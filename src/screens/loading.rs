//! Waits for the character config before the level spawns.

use bevy::{asset::LoadState, prelude::*};

use crate::{
    game::configs::{CharacterConfig, CharacterConfigHandle},
    screens::Screen,
};

pub(super) fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        (fall_back_to_default_config, enter_gameplay)
            .chain()
            .run_if(in_state(Screen::Loading)),
    );
}

/// A broken or missing config file should not keep the game on the loading screen
fn fall_back_to_default_config(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    handle: Option<Res<CharacterConfigHandle>>,
    config: Option<Res<CharacterConfig>>,
) {
    let Some(handle) = handle else {
        return;
    };
    if config.is_some() {
        return;
    }
    if let LoadState::Failed(error) = asset_server.load_state(&handle.0) {
        warn!("Character config failed to load ({error}), using defaults");
        commands.insert_resource(CharacterConfig::default());
    }
}

fn enter_gameplay(config: Option<Res<CharacterConfig>>, mut next_screen: ResMut<NextState<Screen>>) {
    if config.is_some() {
        next_screen.set(Screen::Gameplay);
    }
}
