pub mod assets;
pub mod settings;

use bevy::prelude::*;

pub use assets::{CharacterConfig, CharacterConfigLoader};
pub use settings::*;

/// Handle to the character config requested at startup
#[derive(Resource, Debug, Clone)]
pub struct CharacterConfigHandle(pub Handle<CharacterConfig>);

pub(super) fn plugin(app: &mut App) {
    app.init_asset::<CharacterConfig>();
    app.init_asset_loader::<CharacterConfigLoader>();
    app.add_systems(Startup, load_character_config);
}

fn load_character_config(mut commands: Commands, asset_server: Res<AssetServer>) {
    info!("Loading character config from {}", CharacterConfig::PATH);
    commands.insert_resource(CharacterConfigHandle(
        asset_server.load(CharacterConfig::PATH),
    ));
}
