use bevy::{
    asset::{AssetLoader, AsyncReadExt, LoadContext},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use super::settings::*;

/// Character tuning loaded from a RON file
#[derive(Asset, Resource, Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    pub controller: ControllerSettings,
    pub ground_probe: GroundProbeSettings,
    pub idle: IdleSettings,
    pub walk_run: WalkRunSettings,
    pub sneak: SneakSettings,
    pub jump: JumpSettings,
    pub fall: FallSettings,
    pub slide: SlideSettings,
    pub climb_ledge: ClimbLedgeSettings,
    pub climb_mid: ClimbMidSettings,
    pub edge_slip: EdgeSlipSettings,
    pub punch: PunchSettings,
    pub camera: CameraSettings,
}

impl CharacterConfig {
    /// Path to the character configuration file
    pub const PATH: &'static str = "config/character.ron";

    /// Parse a config from RON text
    pub fn from_ron(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(ron::de::from_bytes(bytes)?)
    }
}

/// Asset loader for CharacterConfig RON files
#[derive(Default)]
pub struct CharacterConfigLoader;

impl AssetLoader for CharacterConfigLoader {
    type Asset = CharacterConfig;
    type Settings = ();
    type Error = anyhow::Error;

    async fn load(
        &self,
        reader: &mut dyn bevy::asset::io::Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        CharacterConfig::from_ron(&bytes)
    }

    fn extensions(&self) -> &[&str] {
        &["ron"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_config_parses() {
        let config = CharacterConfig::from_ron(include_bytes!("../../../assets/config/character.ron"))
            .expect("bundled config should parse");
        assert_eq!(config.controller.mass, 5.0);
        assert_eq!(config.jump.impulse, 31.0);
        assert_eq!(config.slide.min_slide_angle, 30.0);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = CharacterConfig::from_ron(b"(jump: (impulse: 40.0))").expect("partial config");
        assert_eq!(config.jump.impulse, 40.0);
        assert_eq!(config.jump.airborne, AirborneSettings::default());
        assert_eq!(config.camera, CameraSettings::default());
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(CharacterConfig::from_ron(b"(controller: (mass: \"heavy\"))").is_err());
    }
}
