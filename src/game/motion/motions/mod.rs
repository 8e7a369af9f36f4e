//! Built-in motions.

mod airborne;
mod climb_ledge;
mod climb_mid;
mod edge_slip;
mod fall;
mod idle;
mod jump;
mod punch;
mod slide;
mod sneak;
mod walk_run;

use bevy::prelude::*;

pub use airborne::{AirPhase, AirborneCycle};
pub use climb_ledge::{ClimbLedge, ClimbStage, LedgeEdge};
pub use climb_mid::ClimbMid;
pub use edge_slip::EdgeSlip;
pub use fall::Fall;
pub use idle::Idle;
pub use jump::Jump;
pub use punch::{Punch, PunchStage};
pub use slide::Slide;
pub use sneak::Sneak;
pub use walk_run::WalkRunPivot;

use super::{Motion, MotionLayer};
use crate::game::{animation::AnimationStateRegistry, configs::CharacterConfig};

/// Base layer with every built-in motion, bound and configured
pub fn builtin_layer(config: &CharacterConfig, registry: &AnimationStateRegistry) -> MotionLayer {
    let motions: Vec<Box<dyn Motion>> = vec![
        Box::new(ClimbLedge::default()),
        Box::new(ClimbMid::default()),
        Box::new(Jump::default()),
        Box::new(Fall::default()),
        Box::new(Slide::default()),
        Box::new(EdgeSlip::default()),
        Box::new(Punch::default()),
        Box::new(Sneak::default()),
        Box::new(WalkRunPivot::default()),
        Box::new(Idle::default()),
    ];

    let mut layer = MotionLayer::new("Base", 0);
    for mut motion in motions {
        motion.configure(config);
        motion.bind(registry);
        layer.add_motion(motion);
    }
    info!("Built base motion layer with {} motions", layer.motions().count());
    layer
}

/// Yaw rate (degrees per second) that turns by `angle` degrees to the right,
/// limited to `max_speed`
pub(crate) fn yaw_rate_toward(angle: f32, max_speed: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    let step = angle.clamp(-max_speed * dt, max_speed * dt);
    // Positive yaw turns left
    -step / dt
}

/// Yaw in degrees that faces `direction` on the ground plane
pub(crate) fn yaw_facing(direction: Vec3) -> f32 {
    (-direction.x).atan2(-direction.z).to_degrees()
}

/// Move `current` toward `target` by at most `max_delta`
pub(crate) fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + max_delta.copysign(target - current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::motion::{CharacterBody, MotionKind};

    #[test]
    fn test_builtin_layer_priority_order() {
        let registry = AnimationStateRegistry::with_builtin_states();
        let layer = builtin_layer(&CharacterConfig::default(), &registry);

        let kinds: Vec<MotionKind> = layer.motions().map(|m| m.kind()).collect();
        assert_eq!(kinds.len(), 10);
        assert!(layer.motion(MotionKind::Idle).is_some());
        assert_eq!(layer.motion_by_name("Climb Ledge").map(|m| m.kind()), Some(MotionKind::ClimbLedge));

        let priority = |kind| layer.motion(kind).map(|m| m.core().priority).unwrap_or_default();
        assert!(priority(MotionKind::ClimbLedge) > priority(MotionKind::Jump));
        assert!(priority(MotionKind::Jump) > priority(MotionKind::Fall));
        assert!(priority(MotionKind::Slide) > priority(MotionKind::Idle));
        assert!(priority(MotionKind::WalkRunPivot) > priority(MotionKind::Idle));
    }

    #[test]
    fn test_yaw_helpers() {
        // Turning right by 90 degrees lowers the yaw
        let mut body = CharacterBody::default();
        let rate = yaw_rate_toward(90.0, 1000.0, 0.5);
        body.set_yaw(body.yaw() + rate * 0.5);
        assert!((body.forward() - Vec3::X).length() < 1e-4);

        assert!((yaw_facing(Vec3::X) + 90.0).abs() < 1e-4);
        assert_eq!(yaw_rate_toward(90.0, 60.0, 0.5), -60.0);
        assert_eq!(move_towards(1.0, 0.0, 0.25), 0.75);
    }
}
