//! Tuning values for the controller, every motion and the camera rigs.
//!
//! One plain struct per concern. Every struct is `#[serde(default)]` so a
//! config file only needs to list the values it changes.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::camera::CameraMode;

/// Body and integration settings shared by every motion
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub mass: f32,
    pub gravity: Vec3,
    pub collider_radius: f32,
    pub collider_height: f32,
    /// Steepest ground (degrees) the character can stand on
    pub max_slope_angle: f32,
    /// Turn rate (degrees per second) used when facing an AI target rotation
    pub rotation_speed: f32,
    /// Largest gap under the feet closed by snapping down while grounded
    pub ground_snap_distance: f32,
    /// Decay rate of force-driven horizontal velocity while grounded
    pub ground_drag: f32,
    pub input_trend_samples: usize,
    /// Frames the input trend must hold before the speed parameter follows it
    pub trend_stable_frames: u32,
    /// Height of the camera anchor above the feet
    pub anchor_height: f32,
    /// Impulses are expressed over one step of this length (seconds)
    pub reference_time_step: f32,
    /// Pull the character down steep slopes while grounded
    pub slide_assist: bool,
    /// Horizontal push that frees a collider caught on a ledge edge
    pub edge_release_push: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            mass: 5.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            collider_radius: 0.4,
            collider_height: 1.8,
            max_slope_angle: 45.0,
            rotation_speed: 360.0,
            ground_snap_distance: 0.3,
            ground_drag: 8.0,
            input_trend_samples: 20,
            trend_stable_frames: 4,
            anchor_height: 1.6,
            reference_time_step: 1.0 / 60.0,
            slide_assist: true,
            edge_release_push: 0.05,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundProbeSettings {
    /// Feet-to-ground distance at or below which the character is grounded
    pub grounded_distance: f32,
    /// How far below the feet the ground ray keeps looking
    pub ray_extension: f32,
    /// Below this distance, slopes steeper than half the walkable angle count as ground
    pub steep_slope_distance: f32,
    /// Radius of the seam-bridging sphere cast relative to the collider radius
    pub seam_radius_factor: f32,
    pub bumper_height: f32,
    pub bumper_distance: f32,
    /// Angle (degrees) over which movement fades in beside a blocking wall
    pub bumper_blend_angle: f32,
}

impl Default for GroundProbeSettings {
    fn default() -> Self {
        Self {
            grounded_distance: 0.075,
            ray_extension: 3.0,
            steep_slope_distance: 0.25,
            seam_radius_factor: 0.9,
            bumper_height: 0.5,
            bumper_distance: 0.4,
            bumper_blend_angle: 30.0,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleSettings {
    /// Seconds of standing still before an idle variation plays
    pub variation_interval: f32,
    pub variation_count: i32,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            variation_interval: 8.0,
            variation_count: 3,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkRunSettings {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub sprint_multiplier: f32,
    /// Degrees per second
    pub rotation_speed: f32,
    /// Input angle (degrees) behind the character that triggers a pivot
    pub pivot_angle: f32,
    pub pivot_rotation_speed: f32,
    /// Trending input magnitude needed to start moving
    pub min_input: f32,
}

impl Default for WalkRunSettings {
    fn default() -> Self {
        Self {
            walk_speed: 2.0,
            run_speed: 5.5,
            sprint_multiplier: 1.4,
            rotation_speed: 540.0,
            pivot_angle: 140.0,
            pivot_rotation_speed: 720.0,
            min_input: 0.1,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SneakSettings {
    pub speed: f32,
    pub rotation_speed: f32,
    pub collider_height: f32,
}

impl Default for SneakSettings {
    fn default() -> Self {
        Self {
            speed: 1.2,
            rotation_speed: 360.0,
            collider_height: 1.2,
        }
    }
}

/// Air control and landing shared by jumping and falling
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirborneSettings {
    pub max_air_speed: f32,
    /// 0 keeps the launch momentum, 1 follows the player's input
    pub air_control: f32,
    pub air_rotation_speed: f32,
    /// Collider height multiplier while airborne
    pub collider_shrink: f32,
    pub collider_shrink_speed: f32,
    /// Rising faster than this holds the rise pose
    pub rise_pose_speed: f32,
    /// Below this upward speed the rise blends into the top of the arc
    pub rise_to_top_speed: f32,
    /// Falling faster than this leaves the top pose
    pub top_to_fall_speed: f32,
    pub land_time: f32,
    /// Normalized time in the recover clip after which the motion ends
    pub recover_threshold: f32,
    /// Recover duration used when the animation graph reports no recover state
    pub recover_time: f32,
}

impl Default for AirborneSettings {
    fn default() -> Self {
        Self {
            max_air_speed: 6.0,
            air_control: 0.5,
            air_rotation_speed: 180.0,
            collider_shrink: 0.65,
            collider_shrink_speed: 4.0,
            rise_pose_speed: 4.0,
            rise_to_top_speed: 1.5,
            top_to_fall_speed: -1.0,
            land_time: 0.2,
            recover_threshold: 0.5,
            recover_time: 0.4,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpSettings {
    /// Upward impulse applied at launch
    pub impulse: f32,
    pub launch_time: f32,
    pub airborne: AirborneSettings,
}

impl Default for JumpSettings {
    fn default() -> Self {
        Self {
            impulse: 31.0,
            launch_time: 0.1,
            airborne: AirborneSettings::default(),
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallSettings {
    /// Ground distance that has to open up before the fall starts
    pub min_fall_height: f32,
    pub airborne: AirborneSettings,
}

impl Default for FallSettings {
    fn default() -> Self {
        Self {
            min_fall_height: 0.3,
            airborne: AirborneSettings::default(),
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideSettings {
    /// Ground angle (degrees) above which an idle character slides
    pub min_slide_angle: f32,
    pub rotation_speed: f32,
    pub max_speed: f32,
}

impl Default for SlideSettings {
    fn default() -> Self {
        Self {
            min_slide_angle: 30.0,
            rotation_speed: 180.0,
            max_speed: 6.0,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbLedgeSettings {
    /// Hand height above the feet when hanging
    pub grab_height: f32,
    /// Reach beyond the collider radius
    pub reach: f32,
    pub search_below: f32,
    pub open_clearance: f32,
    pub edge_inset: f32,
    /// Surfaces steeper than this (degrees) count as walls
    pub min_wall_angle: f32,
    pub shoulder_width: f32,
    pub hand_clearance: f32,
    pub hang_offset: f32,
    pub min_regrab_distance: f32,
    pub shimmy_speed: f32,
    pub shimmy_lookahead: f32,
    pub grab_time: f32,
    pub climb_duration: f32,
    /// How far onto the top the climb carries the character
    pub climb_forward: f32,
    pub camera_offset: Vec3,
}

impl Default for ClimbLedgeSettings {
    fn default() -> Self {
        Self {
            grab_height: 1.9,
            reach: 0.5,
            search_below: 0.3,
            open_clearance: 0.3,
            edge_inset: 0.1,
            min_wall_angle: 60.0,
            shoulder_width: 0.25,
            hand_clearance: 0.15,
            hang_offset: 0.05,
            min_regrab_distance: 0.5,
            shimmy_speed: 1.0,
            shimmy_lookahead: 0.3,
            grab_time: 0.3,
            climb_duration: 1.2,
            climb_forward: 0.8,
            camera_offset: Vec3::new(0.0, 0.3, 0.0),
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbMidSettings {
    pub min_height: f32,
    pub max_height: f32,
    pub reach: f32,
    pub min_input: f32,
    pub duration: f32,
    pub forward_distance: f32,
}

impl Default for ClimbMidSettings {
    fn default() -> Self {
        Self {
            min_height: 0.5,
            max_height: 1.4,
            reach: 0.6,
            min_input: 0.5,
            duration: 0.7,
            forward_distance: 0.8,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSlipSettings {
    /// Sideways distance of each foot from the body center
    pub foot_spread: f32,
    pub foot_ray_height: f32,
    pub foot_ray_distance: f32,
    pub lateral_speed: f32,
    pub down_speed: f32,
    pub max_time: f32,
}

impl Default for EdgeSlipSettings {
    fn default() -> Self {
        Self {
            foot_spread: 0.15,
            foot_ray_height: 0.1,
            foot_ray_distance: 0.3,
            lateral_speed: 0.8,
            down_speed: 0.5,
            max_time: 1.0,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunchSettings {
    pub wind_up_time: f32,
    pub strike_time: f32,
    pub recover_time: f32,
}

impl Default for PunchSettings {
    fn default() -> Self {
        Self {
            wind_up_time: 0.2,
            strike_time: 0.25,
            recover_time: 0.35,
        }
    }
}

#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub mode: CameraMode,
    /// Orbit distance in the third-person modes
    pub distance: f32,
    /// Degrees of yaw/pitch per unit of view input
    pub yaw_speed: f32,
    pub pitch_speed: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
    /// Optional yaw clamp relative to the anchor's facing, in degrees
    pub yaw_limit: Option<f32>,
    /// Rotation input fades out over this many degrees before a clamp bound
    pub drag_near_bounds: f32,
    pub use_smooth_movement: bool,
    pub spring_mass: f32,
    pub spring_stiffness: f32,
    /// `None` picks critical damping for the mass and stiffness
    pub spring_damping: Option<f32>,
    /// Plain lerp rate used when spring smoothing is off
    pub position_lerp: f32,
    pub near_clip: f32,
    /// Sweep radius for occlusion tests
    pub collision_radius: f32,
    pub first_person_eye: Vec3,
    pub anchor_rise_lerp: f32,
    pub anchor_fall_lerp: f32,
    pub to_first_person_time: f32,
    pub from_first_person_time: f32,
    /// Fraction of the orbit distance kept when looking straight up or down
    pub vertical_distance_factor: f32,
    /// Look-at point sits this far past the anchor along the view
    pub look_ahead: f32,
    /// Shoulder offset in third person
    pub offset: Vec3,
    /// Yaw rate (degrees per second) of the follow rig chasing the anchor's facing
    pub follow_yaw_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            mode: CameraMode::ThirdPersonFixed,
            distance: 4.0,
            yaw_speed: 0.3,
            pitch_speed: 0.3,
            min_pitch: -60.0,
            max_pitch: 70.0,
            yaw_limit: None,
            drag_near_bounds: 10.0,
            use_smooth_movement: true,
            spring_mass: 1.0,
            spring_stiffness: 120.0,
            spring_damping: None,
            position_lerp: 10.0,
            near_clip: 0.1,
            collision_radius: 0.2,
            first_person_eye: Vec3::new(0.0, 1.65, -0.1),
            anchor_rise_lerp: 4.0,
            anchor_fall_lerp: 12.0,
            to_first_person_time: 0.25,
            from_first_person_time: 0.5,
            vertical_distance_factor: 0.4,
            look_ahead: 2.0,
            offset: Vec3::new(0.5, 0.3, 0.0),
            follow_yaw_speed: 120.0,
        }
    }
}
