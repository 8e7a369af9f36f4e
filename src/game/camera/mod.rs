//! Third- and first-person camera rigs.
//!
//! A [`CameraRig`] follows the anchor a [`MotionController`] exposes, smooths
//! its position through a [`Spring`] and never lets geometry come between the
//! lens and the character. [`AdventureRig`] supports every [`CameraMode`],
//! [`FollowRig`] only trails behind the character.
//!
//! [`MotionController`]: crate::game::motion::MotionController

mod adventure;
mod follow;
mod rig;
mod spring;
mod systems;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub use adventure::AdventureRig;
pub use follow::FollowRig;
pub use rig::{CameraRig, RigFrame, RigStyle, ViewAngles};
pub use spring::Spring;

pub(super) fn plugin(app: &mut App) {
    systems::plugin(app);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum CameraMode {
    FirstPerson,
    /// Free orbit around the anchor
    #[default]
    ThirdPersonFixed,
    /// Trails behind the character's facing
    ThirdPersonFollow,
}

impl CameraMode {
    /// Next mode in the manual cycle
    pub fn next(self) -> Self {
        match self {
            Self::ThirdPersonFixed => Self::ThirdPersonFollow,
            Self::ThirdPersonFollow => Self::FirstPerson,
            Self::FirstPerson => Self::ThirdPersonFixed,
        }
    }
}
