//! Double-buffered per-frame character data.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::{
    animation::LayerSnapshot,
    environment::{BodyHandle, BodyPose},
};

/// Posture reported to the animation graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Normal,
    Sneak,
    Climb,
}

impl Stance {
    pub fn as_int(self) -> i32 {
        match self {
            Stance::Normal => 0,
            Stance::Sneak => 1,
            Stance::Climb => 2,
        }
    }
}

/// Coarse direction of the input relative to the avatar's facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum InputDirection {
    None,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

/// Fixed-size circular buffer of recent samples
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct TrendSample {
    samples: Vec<f32>,
    next: usize,
    count: usize,
}

impl Default for TrendSample {
    fn default() -> Self {
        Self::new(20)
    }
}

impl TrendSample {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            next: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, value: f32) {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % self.samples.len();
        self.count = (self.count + 1).min(self.samples.len());
    }

    /// Most recent sample, 0 when empty
    pub fn latest(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        let index = (self.next + self.samples.len() - 1) % self.samples.len();
        self.samples[index]
    }

    /// Mean of the stored samples, 0 when empty
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        let sum: f32 = if self.count == self.samples.len() {
            self.samples.iter().sum()
        } else {
            self.samples[..self.count].iter().sum()
        };
        sum / self.count as f32
    }

    /// Scale the most recent sample in place
    pub fn scale_latest(&mut self, factor: f32) {
        if self.count == 0 {
            return;
        }
        let index = (self.next + self.samples.len() - 1) % self.samples.len();
        self.samples[index] *= factor;
    }

    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.next = 0;
        self.count = 0;
    }
}

/// Animation layer as seen by the controller this frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub struct AnimatorLayerState {
    pub snapshot: LayerSnapshot,
    /// Phase requested by the active motion this frame, 0 for none
    pub motion_phase: i32,
    pub auto_clear_phase: bool,
}

/// Everything the controller knows about the character for one frame.
///
/// The controller keeps two of these. At the start of a frame `current` is
/// copied into `previous`, which motions then only ever read.
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct ControllerState {
    /// Velocity the body actually moved with last frame
    pub velocity: Vec3,

    // Ground
    pub is_grounded: bool,
    pub ground_normal: Vec3,
    /// Degrees between the ground normal and world up
    pub ground_angle: f32,
    /// Signed distance from the feet to the ground, `f32::MAX` without ground
    pub ground_distance: f32,
    pub ground_point: Vec3,

    // Support
    pub support: Option<BodyHandle>,
    pub support_pose: BodyPose,
    /// Contact point in the support's local space, kept while the support stays the same
    pub support_contact_local: Vec3,

    // Forward path
    pub is_forward_blocked: bool,
    pub block_normal: Vec3,
    /// Movement scale in [0, 1] from the wall ahead, 1 when the path is clear
    pub forward_scale: f32,

    // Input
    pub raw_input: Vec2,
    /// Input in avatar space, x right and y forward
    pub input_x: f32,
    pub input_y: f32,
    pub input_magnitude: f32,
    /// Input direction on the ground plane in world space
    pub input_direction_world: Vec3,
    /// Signed degrees from the avatar's forward to the input direction
    pub input_angle_from_avatar: f32,
    /// Signed degrees from the camera's forward to the input direction
    pub input_angle_from_camera: f32,
    pub input_trend: TrendSample,

    pub stance: Stance,
    pub idle_variation: i32,
    pub layers: Vec<AnimatorLayerState>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

impl ControllerState {
    pub fn new(layer_count: usize, trend_samples: usize) -> Self {
        Self {
            velocity: Vec3::ZERO,
            is_grounded: false,
            ground_normal: Vec3::Y,
            ground_angle: 0.0,
            ground_distance: f32::MAX,
            ground_point: Vec3::ZERO,
            support: None,
            support_pose: BodyPose::IDENTITY,
            support_contact_local: Vec3::ZERO,
            is_forward_blocked: false,
            block_normal: Vec3::ZERO,
            forward_scale: 1.0,
            raw_input: Vec2::ZERO,
            input_x: 0.0,
            input_y: 0.0,
            input_magnitude: 0.0,
            input_direction_world: Vec3::ZERO,
            input_angle_from_avatar: 0.0,
            input_angle_from_camera: 0.0,
            input_trend: TrendSample::new(trend_samples),
            stance: Stance::Normal,
            idle_variation: 0,
            layers: vec![AnimatorLayerState::default(); layer_count.max(1)],
        }
    }

    /// Clear per-frame layer requests and match the animator's layer count
    pub fn reset_layers(&mut self, layer_count: usize) {
        self.layers.resize(layer_count.max(1), AnimatorLayerState::default());
        for layer in &mut self.layers {
            layer.motion_phase = 0;
            layer.auto_clear_phase = false;
        }
    }

    pub fn layer(&self, index: usize) -> Option<&AnimatorLayerState> {
        self.layers.get(index)
    }

    pub fn has_input(&self) -> bool {
        self.input_magnitude > f32::EPSILON
    }

    /// Coarse input direction derived from the avatar-relative input angle
    pub fn input_direction(&self) -> InputDirection {
        if !self.has_input() {
            return InputDirection::None;
        }
        let angle = self.input_angle_from_avatar;
        if angle.abs() <= 45.0 {
            InputDirection::MoveUp
        } else if angle.abs() >= 135.0 {
            InputDirection::MoveDown
        } else if angle > 0.0 {
            InputDirection::MoveRight
        } else {
            InputDirection::MoveLeft
        }
    }

    /// Drop everything learnt about the ground
    pub fn clear_ground(&mut self) {
        self.is_grounded = false;
        self.ground_normal = Vec3::Y;
        self.ground_angle = 0.0;
        self.ground_distance = f32::MAX;
        self.support = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_average_and_wrap() {
        let mut trend = TrendSample::new(4);
        assert_eq!(trend.average(), 0.0);

        trend.add(1.0);
        trend.add(0.0);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend.average(), 0.5);

        for _ in 0..4 {
            trend.add(1.0);
        }
        assert_eq!(trend.len(), 4);
        assert_eq!(trend.average(), 1.0);
        assert_eq!(trend.latest(), 1.0);

        trend.scale_latest(0.0);
        assert_eq!(trend.latest(), 0.0);
        assert_eq!(trend.average(), 0.75);
    }

    #[test]
    fn test_input_direction_from_avatar_angle() {
        let mut state = ControllerState::default();
        assert_eq!(state.input_direction(), InputDirection::None);

        state.input_magnitude = 1.0;
        state.input_angle_from_avatar = 10.0;
        assert_eq!(state.input_direction(), InputDirection::MoveUp);
        state.input_angle_from_avatar = 90.0;
        assert_eq!(state.input_direction(), InputDirection::MoveRight);
        state.input_angle_from_avatar = -90.0;
        assert_eq!(state.input_direction(), InputDirection::MoveLeft);
        state.input_angle_from_avatar = 170.0;
        assert_eq!(state.input_direction(), InputDirection::MoveDown);
    }

    #[test]
    fn test_shift_copies_leave_previous_untouched() {
        let mut current = ControllerState::new(2, 4);
        current.layers[1].motion_phase = 42;
        current.is_grounded = true;

        let previous = current.clone();
        current.reset_layers(2);
        current.is_grounded = false;

        assert_eq!(previous.layers[1].motion_phase, 42);
        assert!(previous.is_grounded);
        assert_eq!(current.layers[1].motion_phase, 0);
    }
}
