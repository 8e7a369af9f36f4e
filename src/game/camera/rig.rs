use bevy::{math::FloatExt, prelude::*};

use super::{AdventureRig, CameraMode, FollowRig, Spring};
use crate::game::{configs::CameraSettings, environment::Environment, motion::wrap_degrees};

/// Seconds after spawn before the spring takes over from snapping
const SMOOTHING_WARMUP: f32 = 1.0;
/// Camera offsets shorter than this skip the occlusion test
const MIN_CAST_LENGTH: f32 = 1e-4;

/// What one late pass needs to know about the anchored character
pub struct RigFrame<'a> {
    pub dt: f32,
    /// Third-person anchor reported by the controller
    pub anchor: Vec3,
    /// Feet position of the anchored body
    pub body_position: Vec3,
    pub body_rotation: Quat,
    pub body_radius: f32,
    /// First-person offset added by the active motions
    pub motion_offset: Vec3,
    pub view_input: Vec2,
    pub aiming: bool,
    pub env: &'a dyn Environment,
}

impl RigFrame<'_> {
    /// Heading of the anchored body in degrees, same convention as [`ViewAngles::yaw`]
    pub fn body_yaw(&self) -> f32 {
        let forward = self.body_rotation * Vec3::NEG_Z;
        if forward.x.abs() <= f32::EPSILON && forward.z.abs() <= f32::EPSILON {
            return 0.0;
        }
        (-forward.x).atan2(-forward.z).to_degrees()
    }
}

/// Where the camera looks, in degrees. Positive pitch looks down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub struct ViewAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub is_orbiting: bool,
}

impl ViewAngles {
    pub fn rotation(&self) -> Quat {
        Self::rotation_for(self.yaw, self.pitch)
    }

    pub fn rotation_for(yaw: f32, pitch: f32) -> Quat {
        Quat::from_rotation_y(yaw.to_radians()) * Quat::from_rotation_x(-pitch.to_radians())
    }

    /// Turn view input into yaw and pitch, easing off near the clamps
    pub fn apply_input(&mut self, settings: &CameraSettings, input: Vec2, body_yaw: f32) {
        let pitch_delta = input.y * settings.pitch_speed;
        let pitch_delta = pitch_delta
            * drag_near_bound(
                self.pitch,
                pitch_delta,
                settings.min_pitch,
                settings.max_pitch,
                settings.drag_near_bounds,
            );
        self.pitch = (self.pitch + pitch_delta).clamp(settings.min_pitch, settings.max_pitch);

        // Mouse right turns right, which is negative yaw
        let yaw_delta = -input.x * settings.yaw_speed;
        match settings.yaw_limit {
            Some(limit) => {
                let relative = wrap_degrees(self.yaw - body_yaw);
                let yaw_delta =
                    yaw_delta * drag_near_bound(relative, yaw_delta, -limit, limit, settings.drag_near_bounds);
                let relative = (relative + yaw_delta).clamp(-limit, limit);
                self.yaw = wrap_degrees(body_yaw + relative);
            }
            None => self.yaw = wrap_degrees(self.yaw + yaw_delta),
        }
    }
}

/// Scale for `delta` so rotation fades out inside `zone` degrees of a bound
fn drag_near_bound(value: f32, delta: f32, min: f32, max: f32, zone: f32) -> f32 {
    if zone <= 0.0 || delta == 0.0 {
        return 1.0;
    }
    let room = if delta > 0.0 { max - value } else { value - min };
    (room / zone).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Reflect)]
pub enum RigStyle {
    Adventure(AdventureRig),
    Follow(FollowRig),
}

impl RigStyle {
    pub fn supports(&self, mode: CameraMode) -> bool {
        match self {
            Self::Adventure(_) => true,
            Self::Follow(_) => mode == CameraMode::ThirdPersonFollow,
        }
    }
}

/// Blend from the view a mode change started at
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
struct ModeTransition {
    elapsed: f32,
    duration: f32,
    /// Camera position relative to the anchor when the change started
    start_offset: Vec3,
    start_rotation: Quat,
}

/// Camera that follows a character's anchor
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct CameraRig {
    /// Character whose controller provides the anchor
    pub target: Entity,
    pub settings: CameraSettings,
    pub style: RigStyle,
    pub view: ViewAngles,
    mode: CameraMode,
    /// Seconds since the rig started following
    age: f32,
    transition: Option<ModeTransition>,
    transition_percent: f32,
    spring: Spring,
    /// Anchor after the vertical smoothing
    anchor: Option<Vec3>,
    position: Vec3,
    rotation: Quat,
    /// Pitch the lens shows, trailing `view.pitch` while the spring catches up
    shown_pitch: f32,
    is_frozen: bool,
}

impl CameraRig {
    pub fn new(target: Entity, settings: CameraSettings, style: RigStyle) -> Self {
        let mode = if style.supports(settings.mode) {
            settings.mode
        } else {
            CameraMode::ThirdPersonFollow
        };
        let pitch = 15.0_f32.clamp(settings.min_pitch, settings.max_pitch);
        Self {
            target,
            spring: Spring::new(settings.spring_mass, settings.spring_stiffness, settings.spring_damping),
            style,
            view: ViewAngles {
                yaw: 0.0,
                pitch,
                is_orbiting: false,
            },
            mode,
            age: 0.0,
            transition: None,
            transition_percent: 1.0,
            anchor: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shown_pitch: pitch,
            is_frozen: false,
            settings,
        }
    }

    pub fn adventure(target: Entity, settings: CameraSettings) -> Self {
        Self::new(target, settings, RigStyle::Adventure(AdventureRig::default()))
    }

    pub fn follow(target: Entity, settings: CameraSettings) -> Self {
        Self::new(target, settings, RigStyle::Follow(FollowRig::default()))
    }

    /// Swap in new tuning, keeping the spring's momentum
    pub fn apply_settings(&mut self, settings: CameraSettings) {
        let velocity = self.spring.velocity;
        self.spring = Spring::new(settings.spring_mass, settings.spring_stiffness, settings.spring_damping);
        self.spring.velocity = velocity;
        self.view.pitch = self.view.pitch.clamp(settings.min_pitch, settings.max_pitch);
        self.settings = settings;
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(self.rotation)
    }

    /// Horizontal view direction, used to turn stick input into world space
    pub fn flat_forward(&self) -> Vec3 {
        let forward = Quat::from_rotation_y(self.view.yaw.to_radians()) * Vec3::NEG_Z;
        Vec3::new(forward.x, 0.0, forward.z)
    }

    /// 1 when no mode change is blending
    pub fn transition_percent(&self) -> f32 {
        self.transition_percent
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Whether the last pass kept the camera still because the view was blocked too close
    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    /// Start blending toward `mode`.
    ///
    /// The blend is shortened by how close the camera already is to where the
    /// new mode wants it, and starts from the current view so nothing snaps.
    pub fn transition_to_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        if !self.style.supports(mode) {
            trace!("Camera rig ignores unsupported mode {mode:?}");
            return;
        }
        info!("Camera mode {:?} -> {mode:?}", self.mode);

        let previous = self.mode;
        self.mode = mode;
        self.spring.reset();

        let Some(anchor) = self.anchor else {
            self.transition = None;
            self.transition_percent = 1.0;
            return;
        };

        let offset = self.position - anchor;
        let covered = (offset.length() / self.settings.distance.max(f32::EPSILON)).min(1.0);
        let duration = if mode == CameraMode::FirstPerson {
            self.settings.to_first_person_time * covered
        } else if previous == CameraMode::FirstPerson {
            self.settings.from_first_person_time * (1.0 - covered)
        } else {
            self.settings.from_first_person_time
        };

        if duration <= f32::EPSILON {
            self.transition = None;
            self.transition_percent = 1.0;
            return;
        }
        self.transition = Some(ModeTransition {
            elapsed: 0.0,
            duration,
            start_offset: offset,
            start_rotation: self.rotation,
        });
        self.transition_percent = 0.0;
    }

    // ====================================================================
    // Late pass
    // ====================================================================

    /// Place the camera for this frame. Runs after every character has moved.
    pub fn late_update(&mut self, frame: &RigFrame) {
        let dt = frame.dt.max(0.0);
        let is_first = self.anchor.is_none();
        self.age += dt;
        let first_person = self.mode == CameraMode::FirstPerson;

        let raw_anchor = if first_person {
            frame.body_position + frame.body_rotation * self.settings.first_person_eye + frame.motion_offset
        } else {
            frame.anchor
        };
        let anchor = self.follow_anchor(raw_anchor, dt);

        let body_yaw = frame.body_yaw();
        match &mut self.style {
            RigStyle::Adventure(rig) => rig.update_view(&mut self.view, &self.settings, self.mode, body_yaw, frame),
            RigStyle::Follow(rig) => rig.update_view(&mut self.view, &self.settings, body_yaw, frame),
        }

        let view_rotation = self.view.rotation();
        let view_direction = view_rotation * Vec3::NEG_Z;
        let focus = if first_person {
            anchor
        } else {
            anchor + Quat::from_rotation_y(self.view.yaw.to_radians()) * self.settings.offset
        };
        let mut desired = focus - view_direction * self.orbit_distance();

        let eased = self.advance_transition(dt);
        if let (Some(transition), Some(t)) = (self.transition, eased) {
            desired = anchor + transition.start_offset.lerp(desired - anchor, t);
        }

        let smoothing = !is_first
            && !first_person
            && self.transition.is_none()
            && self.age > SMOOTHING_WARMUP;
        let mut next = if !smoothing {
            self.spring.reset();
            desired
        } else if self.settings.use_smooth_movement {
            self.spring.step(self.position, desired, dt)
        } else {
            self.position.lerp(desired, (self.settings.position_lerp * dt).min(1.0))
        };

        self.shown_pitch = if smoothing && self.settings.use_smooth_movement {
            let vertical = desired.y - self.position.y;
            let factor = if vertical.abs() > MIN_CAST_LENGTH {
                (self.spring.velocity.y * dt / vertical).clamp(0.0, 1.0)
            } else {
                1.0
            };
            self.shown_pitch.lerp(self.view.pitch, factor)
        } else {
            self.view.pitch
        };

        self.is_frozen = false;
        if !first_person {
            next = self.resolve_occlusion(focus, next, frame, is_first);
        }
        self.position = next;

        let shown_rotation = ViewAngles::rotation_for(self.view.yaw, self.shown_pitch);
        let mut rotation = if first_person {
            shown_rotation
        } else {
            let look_at = anchor + shown_rotation * Vec3::NEG_Z * self.settings.look_ahead;
            if (look_at - self.position).length_squared() > MIN_CAST_LENGTH {
                Transform::from_translation(self.position)
                    .looking_at(look_at, Vec3::Y)
                    .rotation
            } else {
                shown_rotation
            }
        };
        if let (Some(transition), Some(t)) = (self.transition, eased) {
            rotation = transition.start_rotation.slerp(rotation, t);
        }
        self.rotation = rotation;

        if self.transition_percent >= 1.0 {
            self.transition = None;
        }
    }

    /// Soft rise, crisp fall
    fn follow_anchor(&mut self, raw: Vec3, dt: f32) -> Vec3 {
        let anchor = match self.anchor {
            Some(previous) => {
                let rate = if raw.y > previous.y {
                    self.settings.anchor_rise_lerp
                } else {
                    self.settings.anchor_fall_lerp
                };
                let y = previous.y.lerp(raw.y, (rate * dt).clamp(0.0, 1.0));
                Vec3::new(raw.x, y, raw.z)
            }
            None => raw,
        };
        self.anchor = Some(anchor);
        anchor
    }

    fn orbit_distance(&self) -> f32 {
        match self.mode {
            CameraMode::FirstPerson => 0.0,
            CameraMode::ThirdPersonFollow => self.settings.distance,
            CameraMode::ThirdPersonFixed => {
                // Pull in as the view nears straight up or down
                let extreme = self
                    .settings
                    .min_pitch
                    .abs()
                    .max(self.settings.max_pitch.abs())
                    .max(f32::EPSILON);
                let t = (self.view.pitch.abs() / extreme).min(1.0);
                self.settings.distance * 1.0_f32.lerp(self.settings.vertical_distance_factor, t * t)
            }
        }
    }

    /// Eased blend factor of the running transition
    fn advance_transition(&mut self, dt: f32) -> Option<f32> {
        let transition = self.transition.as_mut()?;
        transition.elapsed += dt;
        let t = (transition.elapsed / transition.duration).min(1.0);
        self.transition_percent = t;
        Some(t * t * (3.0 - 2.0 * t))
    }

    /// Keep the camera on the character's side of anything in between
    fn resolve_occlusion(&mut self, focus: Vec3, wanted: Vec3, frame: &RigFrame, is_first: bool) -> Vec3 {
        let to_camera = wanted - focus;
        let length = to_camera.length();
        if length <= MIN_CAST_LENGTH {
            return wanted;
        }
        let direction = to_camera / length;
        let Some(hit) = frame
            .env
            .cast_sphere(focus, self.settings.collision_radius, direction, length)
        else {
            return wanted;
        };

        if hit.distance < frame.body_radius + self.settings.near_clip && !is_first {
            trace!("Camera blocked {:.2} from the anchor, holding position", hit.distance);
            self.is_frozen = true;
            self.spring.reset();
            return self.position;
        }
        focus + direction * hit.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::environment::SimpleScene;

    const DT: f32 = 1.0 / 60.0;

    fn frame<'a>(env: &'a SimpleScene, body_position: Vec3) -> RigFrame<'a> {
        RigFrame {
            dt: DT,
            anchor: body_position + Vec3::Y * 1.6,
            body_position,
            body_rotation: Quat::IDENTITY,
            body_radius: 0.4,
            motion_offset: Vec3::ZERO,
            view_input: Vec2::ZERO,
            aiming: false,
            env,
        }
    }

    fn open_scene() -> SimpleScene {
        let mut scene = SimpleScene::new();
        scene.add_ground(-50.0);
        scene
    }

    fn rig() -> CameraRig {
        CameraRig::adventure(Entity::PLACEHOLDER, CameraSettings::default())
    }

    #[test]
    fn test_first_pass_snaps_behind_anchor() {
        let scene = open_scene();
        let mut rig = rig();
        rig.late_update(&frame(&scene, Vec3::ZERO));

        let anchor = Vec3::Y * 1.6;
        // Looking down -Z from above and behind
        assert!(rig.position().z > 0.0);
        assert!(rig.position().y > anchor.y);
        let forward = rig.rotation() * Vec3::NEG_Z;
        assert!(forward.z < 0.0 && forward.y < 0.0);
    }

    #[test]
    fn test_freezes_when_blocked_close() {
        let mut scene = open_scene();
        let mut rig = rig();
        rig.late_update(&frame(&scene, Vec3::ZERO));
        let before = rig.position();

        // A wall right behind the character's shoulder
        scene.add_cuboid(Vec3::new(0.0, 1.6, 0.4), Vec3::new(3.0, 3.0, 0.1), Quat::IDENTITY);
        rig.late_update(&frame(&scene, Vec3::new(0.3, 0.0, 0.0)));

        assert!(rig.is_frozen());
        assert_eq!(rig.position(), before);
    }

    #[test]
    fn test_clamps_to_blocking_point() {
        let mut scene = open_scene();
        scene.add_cuboid(Vec3::new(0.0, 2.0, 2.5), Vec3::new(3.0, 3.0, 0.1), Quat::IDENTITY);
        let mut rig = rig();
        rig.late_update(&frame(&scene, Vec3::ZERO));

        assert!(!rig.is_frozen());
        assert!(rig.position().z < 2.4);
        assert!(rig.position().z > 0.5);
    }

    #[test]
    fn test_spring_smoothing_after_warmup() {
        let scene = open_scene();
        let mut rig = rig();
        for _ in 0..70 {
            rig.late_update(&frame(&scene, Vec3::ZERO));
        }
        let settled = rig.position();

        // A sudden jump of the anchor is followed, not copied
        rig.late_update(&frame(&scene, Vec3::new(0.0, 0.0, -5.0)));
        let moved = settled.z - rig.position().z;
        assert!(moved > 0.0 && moved < 5.0);

        for _ in 0..240 {
            rig.late_update(&frame(&scene, Vec3::new(0.0, 0.0, -5.0)));
        }
        assert!((settled.z - 5.0 - rig.position().z).abs() < 0.05);
    }

    #[test]
    fn test_transition_reaches_full_percent() {
        let scene = open_scene();
        let mut rig = rig();
        for _ in 0..5 {
            rig.late_update(&frame(&scene, Vec3::ZERO));
        }

        rig.transition_to_mode(CameraMode::FirstPerson);
        assert_eq!(rig.mode(), CameraMode::FirstPerson);
        assert!(rig.is_transitioning());
        assert_eq!(rig.transition_percent(), 0.0);

        let mut last = 0.0;
        for _ in 0..60 {
            rig.late_update(&frame(&scene, Vec3::ZERO));
            assert!(rig.transition_percent() >= last);
            last = rig.transition_percent();
        }
        assert_eq!(rig.transition_percent(), 1.0);
        assert!(!rig.is_transitioning());

        let eye = CameraSettings::default().first_person_eye;
        assert!((rig.position() - eye).length() < 5e-3);
    }

    #[test]
    fn test_first_person_uses_motion_offset() {
        let scene = open_scene();
        let mut settings = CameraSettings::default();
        settings.mode = CameraMode::FirstPerson;
        let mut rig = CameraRig::adventure(Entity::PLACEHOLDER, settings.clone());

        let mut frame = frame(&scene, Vec3::ZERO);
        frame.motion_offset = Vec3::Y * 0.3;
        rig.late_update(&frame);
        assert!((rig.position() - (settings.first_person_eye + Vec3::Y * 0.3)).length() < 1e-4);
    }

    #[test]
    fn test_anchor_rises_softly_and_falls_fast() {
        let scene = open_scene();
        let mut rig = rig();
        rig.late_update(&frame(&scene, Vec3::ZERO));

        rig.late_update(&frame(&scene, Vec3::Y));
        let risen = rig.anchor.map(|a| a.y).unwrap_or_default() - 1.6;

        let mut rig = self::rig();
        rig.late_update(&frame(&scene, Vec3::Y));
        rig.late_update(&frame(&scene, Vec3::ZERO));
        let fallen = 2.6 - rig.anchor.map(|a| a.y).unwrap_or_default();

        assert!(risen > 0.0 && fallen > risen);
    }

    #[test]
    fn test_pitch_clamped_with_drag() {
        let settings = CameraSettings::default();
        let mut view = ViewAngles::default();
        for _ in 0..500 {
            view.apply_input(&settings, Vec2::new(0.0, 10.0), 0.0);
        }
        assert!(view.pitch <= settings.max_pitch);
        assert!(view.pitch > settings.max_pitch - 1.0);

        // Input inside the drag zone is scaled down
        let mut view = ViewAngles {
            pitch: settings.max_pitch - settings.drag_near_bounds * 0.5,
            ..default()
        };
        let before = view.pitch;
        view.apply_input(&settings, Vec2::new(0.0, 10.0), 0.0);
        assert!(view.pitch - before < 10.0 * settings.pitch_speed);
    }

    #[test]
    fn test_yaw_limit_relative_to_body() {
        let mut settings = CameraSettings::default();
        settings.yaw_limit = Some(45.0);
        let mut view = ViewAngles::default();
        for _ in 0..1000 {
            view.apply_input(&settings, Vec2::new(-10.0, 0.0), 30.0);
        }
        assert!((view.yaw - 75.0).abs() < 1.0);
    }
}
