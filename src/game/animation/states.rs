//! Named animation states and the motion phases that select them.
//!
//! These names are the contract with the animation assets. Motions resolve the
//! ones they compare against into [`super::StateId`]s when they are bound.

pub const IDLE_POSE: &str = "Idle-SM.IdlePose";
pub const IDLE_VARIATION: &str = "Idle-SM.IdleVariation";

pub const WALK_RUN: &str = "WalkRunPivot-SM.WalkRun";
pub const IDLE_TO_RUN: &str = "WalkRunPivot-SM.IdleToRun";
pub const RUN_PIVOT_LEFT: &str = "WalkRunPivot-SM.PivotLeft";
pub const RUN_PIVOT_RIGHT: &str = "WalkRunPivot-SM.PivotRight";
pub const RUN_STOP: &str = "WalkRunPivot-SM.RunStop";

pub const SNEAK_IDLE: &str = "Sneak-SM.SneakIdle";
pub const SNEAK_MOVE: &str = "Sneak-SM.SneakMove";

pub const JUMP_LAUNCH: &str = "JumpFall-SM.Launch";
pub const JUMP_RISE: &str = "JumpFall-SM.Rise";
pub const JUMP_RISE_POSE: &str = "JumpFall-SM.RisePose";
pub const JUMP_RISE_TO_TOP: &str = "JumpFall-SM.RiseToTop";
pub const JUMP_TOP: &str = "JumpFall-SM.TopPose";
pub const JUMP_TOP_TO_FALL: &str = "JumpFall-SM.TopToFall";
pub const JUMP_FALL_POSE: &str = "JumpFall-SM.FallPose";
pub const JUMP_LAND: &str = "JumpFall-SM.Land";
pub const JUMP_RECOVER_IDLE: &str = "JumpFall-SM.RecoverToIdle";
pub const JUMP_RECOVER_RUN: &str = "JumpFall-SM.RecoverToRun";

pub const SLIDE: &str = "Slide-SM.Slide";

pub const CLIMB_CROUCH_GRAB: &str = "ClimbCrouch-SM.Grab";
pub const CLIMB_CROUCH_POSE: &str = "ClimbCrouch-SM.ClimbCrouchPose";
pub const CLIMB_CROUCH_SHIMMY_LEFT: &str = "ClimbCrouch-SM.ShimmyLeft";
pub const CLIMB_CROUCH_SHIMMY_RIGHT: &str = "ClimbCrouch-SM.ShimmyRight";
pub const CLIMB_CROUCH_TO_TOP: &str = "ClimbCrouch-SM.ClimbToTop";
pub const CLIMB_CROUCH_RECOVER: &str = "ClimbCrouch-SM.RecoverToIdle";

pub const CLIMB_MID_START: &str = "ClimbMid-SM.Start";
pub const CLIMB_MID_TO_TOP: &str = "ClimbMid-SM.ClimbToTop";
pub const CLIMB_MID_RECOVER: &str = "ClimbMid-SM.RecoverToIdle";

pub const EDGE_SLIP: &str = "EdgeSlip-SM.Slip";

pub const PUNCH_WIND_UP: &str = "Punch-SM.WindUp";
pub const PUNCH_STRIKE: &str = "Punch-SM.Strike";
pub const PUNCH_RECOVER: &str = "Punch-SM.Recover";

pub const ALL: &[&str] = &[
    IDLE_POSE,
    IDLE_VARIATION,
    WALK_RUN,
    IDLE_TO_RUN,
    RUN_PIVOT_LEFT,
    RUN_PIVOT_RIGHT,
    RUN_STOP,
    SNEAK_IDLE,
    SNEAK_MOVE,
    JUMP_LAUNCH,
    JUMP_RISE,
    JUMP_RISE_POSE,
    JUMP_RISE_TO_TOP,
    JUMP_TOP,
    JUMP_TOP_TO_FALL,
    JUMP_FALL_POSE,
    JUMP_LAND,
    JUMP_RECOVER_IDLE,
    JUMP_RECOVER_RUN,
    SLIDE,
    CLIMB_CROUCH_GRAB,
    CLIMB_CROUCH_POSE,
    CLIMB_CROUCH_SHIMMY_LEFT,
    CLIMB_CROUCH_SHIMMY_RIGHT,
    CLIMB_CROUCH_TO_TOP,
    CLIMB_CROUCH_RECOVER,
    CLIMB_MID_START,
    CLIMB_MID_TO_TOP,
    CLIMB_MID_RECOVER,
    EDGE_SLIP,
    PUNCH_WIND_UP,
    PUNCH_STRIKE,
    PUNCH_RECOVER,
];

/// Motion phase integers understood by the animation graph
pub mod phase {
    pub const NONE: i32 = 0;

    pub const IDLE: i32 = 100;
    pub const IDLE_VARIATION: i32 = 101;

    pub const WALK_RUN: i32 = 200;
    pub const WALK_RUN_PIVOT_LEFT: i32 = 201;
    pub const WALK_RUN_PIVOT_RIGHT: i32 = 202;
    pub const WALK_RUN_STOP: i32 = 205;

    pub const JUMP_LAUNCH: i32 = 250;
    pub const JUMP_RISE: i32 = 251;
    pub const JUMP_RISE_POSE: i32 = 252;
    pub const JUMP_RISE_TO_TOP: i32 = 253;
    pub const JUMP_TOP: i32 = 254;
    pub const JUMP_TOP_TO_FALL: i32 = 255;
    pub const JUMP_FALL_POSE: i32 = 256;
    pub const JUMP_LAND: i32 = 257;
    pub const JUMP_RECOVER_IDLE: i32 = 258;
    pub const JUMP_RECOVER_RUN: i32 = 259;

    pub const SNEAK: i32 = 300;
    pub const SNEAK_MOVE: i32 = 301;

    pub const SLIDE: i32 = 400;

    pub const EDGE_SLIP: i32 = 500;

    pub const PUNCH: i32 = 600;
    pub const PUNCH_STRIKE: i32 = 601;
    pub const PUNCH_RECOVER: i32 = 602;

    pub const CLIMB_CROUCH_GRAB: i32 = 900;
    pub const CLIMB_CROUCH_HANG: i32 = 901;
    pub const CLIMB_CROUCH_SHIMMY_LEFT: i32 = 902;
    pub const CLIMB_CROUCH_SHIMMY_RIGHT: i32 = 903;
    pub const CLIMB_CROUCH_TO_TOP: i32 = 904;
    pub const CLIMB_CROUCH_RECOVER: i32 = 905;

    pub const CLIMB_MID: i32 = 950;
    pub const CLIMB_MID_TO_TOP: i32 = 951;
    pub const CLIMB_MID_RECOVER: i32 = 952;
}
