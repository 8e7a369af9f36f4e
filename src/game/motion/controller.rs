//! The per-frame motion pipeline.

use bevy::prelude::*;

use super::{
    CameraRequests, CharacterBody, ControllerState, ForceAccumulator, GroundProbe, Motion,
    MotionContext, MotionKind, MotionLayer, motions, signed_yaw_between, step_angle,
};
use crate::game::{
    animation::{AnimationStateRegistry, AnimatorDriver, AnimatorParam},
    camera::CameraMode,
    configs::{CharacterConfig, ControllerSettings},
    environment::{BodyHandle, BodyPose, Environment, EnvironmentHit},
    input::ActionProvider,
};

/// Gap kept between the collider and whatever it slides along
const SKIN: f32 = 0.01;
/// Collide-and-slide iterations per frame
const SLIDE_ITERATIONS: usize = 3;
/// AI position targets count as reached inside this radius
const ARRIVE_DISTANCE: f32 = 0.1;
/// Input trend changes smaller than this count as constant
const TREND_EPSILON: f32 = 0.01;

/// Collaborators the controller needs for one frame
pub struct FrameInput<'a> {
    pub dt: f32,
    pub input: &'a dyn ActionProvider,
    /// Camera forward, used to turn stick input into a world direction
    pub camera_forward: Vec3,
    pub env: &'a mut dyn Environment,
    pub animator: &'a mut dyn AnimatorDriver,
}

/// Movement requested by AI or scripts instead of the player's stick
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum AiTarget {
    Velocity(Vec3),
    Position { position: Vec3, speed: f32 },
}

/// Owns the motion layers and the state pair of one character.
#[derive(Component)]
pub struct MotionController {
    pub body: CharacterBody,
    pub settings: ControllerSettings,
    pub probe: GroundProbe,
    layers: Vec<MotionLayer>,
    state: ControllerState,
    previous: ControllerState,
    forces: ForceAccumulator,
    camera: CameraRequests,
    camera_mode_request: Option<CameraMode>,
    target: Option<AiTarget>,
    target_rotation: Option<Quat>,
    time: f32,

    // ====================================================================
    // Input trend
    // ====================================================================
    trend_direction: i8,
    trend_frames: u32,
    pushed_magnitude: f32,

    /// Support seen by the last late pass
    last_support: Option<(BodyHandle, BodyPose)>,
}

impl MotionController {
    pub fn new(config: &CharacterConfig) -> Self {
        let settings = config.controller.clone();
        let state = ControllerState::new(1, settings.input_trend_samples);
        let mut controller = Self {
            body: CharacterBody::new(Vec3::ZERO, settings.collider_radius, settings.collider_height),
            probe: GroundProbe::new(config.ground_probe.clone()),
            layers: Vec::new(),
            previous: state.clone(),
            state,
            forces: ForceAccumulator::new(settings.mass, settings.reference_time_step),
            camera: CameraRequests::default(),
            camera_mode_request: None,
            target: None,
            target_rotation: None,
            time: 0.0,
            trend_direction: 0,
            trend_frames: 0,
            pushed_magnitude: 0.0,
            last_support: None,
            settings,
        };
        controller.configure(config);
        controller
    }

    /// Controller with one base layer holding every built-in motion
    pub fn with_builtin_motions(config: &CharacterConfig, registry: &AnimationStateRegistry) -> Self {
        let mut controller = Self::new(config);
        controller.add_layer(motions::builtin_layer(config, registry));
        controller
    }

    pub fn add_layer(&mut self, layer: MotionLayer) {
        self.layers.push(layer);
    }

    /// Apply new tuning to the controller and every motion
    pub fn configure(&mut self, config: &CharacterConfig) {
        self.settings = config.controller.clone();
        self.probe.settings = config.ground_probe.clone();
        self.forces.set_mass(self.settings.mass);
        self.forces
            .set_reference_time_step(self.settings.reference_time_step);
        self.body.radius = self.settings.collider_radius;
        self.body.height = self.settings.collider_height;
        self.body.base_height = self.settings.collider_height;
        if self.state.input_trend.capacity() != self.settings.input_trend_samples.max(1) {
            self.state.input_trend = super::state::TrendSample::new(self.settings.input_trend_samples);
        }
        for layer in &mut self.layers {
            for motion in layer.motions_mut() {
                motion.configure(config);
            }
        }
    }

    /// Resolve animation state names for every motion
    pub fn bind(&mut self, registry: &AnimationStateRegistry) {
        for layer in &mut self.layers {
            for motion in layer.motions_mut() {
                motion.bind(registry);
            }
        }
    }

    // ====================================================================
    // Frame pipeline
    // ====================================================================

    pub fn update(&mut self, frame: FrameInput) {
        let FrameInput {
            dt,
            input,
            camera_forward,
            env,
            animator,
        } = frame;

        if dt <= 0.0 || !dt.is_finite() {
            trace!("Skipping motion update with dt {dt}");
            return;
        }
        self.time += dt;
        self.forces.begin_frame(self.time);
        self.camera = CameraRequests::default();

        // 1. Shift state
        self.previous.clone_from(&self.state);
        self.state.reset_layers(animator.layer_count());

        // 2. Animation graph snapshot
        self.pull_animator_state(animator);

        // 3. Ground and support
        let expect_grounded = self.layers.iter().all(|layer| layer.expects_grounded());
        self.probe.probe(
            env,
            &self.body,
            self.settings.max_slope_angle,
            expect_grounded,
            &mut self.state,
            &self.previous,
        );
        let allowed = self
            .layers
            .iter()
            .all(|layer| layer.determine_grounding(&self.state));
        self.state.is_grounded &= allowed;

        // 4. Input
        self.process_input(input, camera_forward);
        self.probe
            .probe_forward(env, &self.body, self.settings.max_slope_angle, &mut self.state);

        // 5. Root motion cleanup
        let (mut root_translation, mut root_rotation) = animator.root_motion();
        for layer in &self.layers {
            if let Some(motion) = layer.active_motion() {
                motion.clean_root_motion(&self.state, &mut root_translation, &mut root_rotation);
            }
        }

        // 6. Motion layers
        let mut velocity = Vec3::ZERO;
        let mut angular_velocity = Vec3::ZERO;
        let mut gravity_enabled = true;
        for layer in &mut self.layers {
            let mut ctx = MotionContext {
                time: self.time,
                dt,
                state: &mut self.state,
                previous: &self.previous,
                input,
                env: &mut *env,
                body: &mut self.body,
                forces: &mut self.forces,
                settings: &self.settings,
                camera: &mut self.camera,
                layer: layer.animator_layer,
                active: None,
            };
            layer.update(&mut ctx);
            velocity += layer.velocity;
            angular_velocity += layer.angular_velocity;
            gravity_enabled &= layer.gravity_enabled;
        }

        // 7. Input trend
        self.detect_trend();

        // 8. Rotation
        self.apply_rotation(root_rotation, angular_velocity, dt);

        // 9. Translation
        self.apply_translation(env, root_translation, velocity, gravity_enabled, dt);

        // 10. Edge release
        if gravity_enabled {
            self.free_from_edges(env);
        }

        // 11. Animation parameters
        self.push_animator_parameters(animator);

        if let Some(mode) = self.camera.mode {
            self.camera_mode_request = Some(mode);
        }
    }

    fn pull_animator_state(&mut self, animator: &mut dyn AnimatorDriver) {
        for index in 0..self.state.layers.len() {
            let snapshot = animator.layer_state(index);
            self.state.layers[index].snapshot = snapshot;

            let old = self
                .previous
                .layer(index)
                .map(|l| l.snapshot.state_id)
                .unwrap_or_default();
            if old == snapshot.state_id {
                continue;
            }
            for layer in self.layers.iter_mut().filter(|l| l.animator_layer == index) {
                for motion in layer.motions_mut() {
                    motion.on_animator_state_change(index, old, snapshot.state_id);
                }
            }
        }
    }

    fn process_input(&mut self, input: &dyn ActionProvider, camera_forward: Vec3) {
        let camera_forward = Vec3::new(camera_forward.x, 0.0, camera_forward.z)
            .normalize_or(self.body.forward());
        let camera_right = Vec3::new(-camera_forward.z, 0.0, camera_forward.x);

        let (direction, magnitude) = match self.target {
            Some(AiTarget::Velocity(velocity)) => {
                let flat = Vec3::new(velocity.x, 0.0, velocity.z);
                let magnitude = if flat.length_squared() > f32::EPSILON { 1.0 } else { 0.0 };
                (flat.normalize_or_zero(), magnitude)
            }
            Some(AiTarget::Position { position, speed }) => {
                let to_target = position - self.body.position;
                let flat = Vec3::new(to_target.x, 0.0, to_target.z);
                if flat.length() <= ARRIVE_DISTANCE {
                    debug!("AI target reached");
                    self.target = None;
                    (Vec3::ZERO, 0.0)
                } else {
                    (flat.normalize_or_zero(), speed.clamp(0.0, 1.0))
                }
            }
            None => {
                let movement = input.movement().clamp_length_max(1.0);
                let world = camera_right * movement.x + camera_forward * movement.y;
                (world.normalize_or_zero(), movement.length())
            }
        };

        let state = &mut self.state;
        let world = direction * magnitude;
        state.raw_input = Vec2::new(world.dot(camera_right), world.dot(camera_forward));
        state.input_magnitude = magnitude;
        state.input_direction_world = direction;
        state.input_x = world.dot(self.body.right());
        state.input_y = world.dot(self.body.forward());
        if magnitude > f32::EPSILON {
            state.input_angle_from_camera = signed_yaw_between(camera_forward, direction);
            state.input_angle_from_avatar = signed_yaw_between(self.body.forward(), direction);
        } else {
            state.input_angle_from_camera = 0.0;
            state.input_angle_from_avatar = 0.0;
        }
        state.input_trend.add(magnitude);
    }

    /// Hold the speed parameter until the input trend settles
    fn detect_trend(&mut self) {
        let trend = &self.state.input_trend;
        let latest = trend.latest();
        let average = trend.average();
        let direction = if latest > average + TREND_EPSILON {
            1
        } else if latest < average - TREND_EPSILON {
            -1
        } else {
            0
        };

        if direction == self.trend_direction {
            self.trend_frames = self.trend_frames.saturating_add(1);
        } else {
            self.trend_direction = direction;
            self.trend_frames = 0;
        }

        if self.trend_frames >= self.settings.trend_stable_frames {
            self.pushed_magnitude = self.state.input_magnitude;
        }
    }

    fn apply_rotation(&mut self, root_rotation: Quat, angular_velocity: Vec3, dt: f32) {
        let (root_yaw, _, _) = root_rotation.to_euler(EulerRot::YXZ);
        let mut yaw = self.body.yaw() + root_yaw.to_degrees() + angular_velocity.y * dt;

        if let Some(target) = self.target_rotation {
            let forward = target * Vec3::NEG_Z;
            let target_yaw = (-forward.x).atan2(-forward.z).to_degrees();
            yaw = step_angle(yaw, target_yaw, self.settings.rotation_speed * dt);
            if (yaw - target_yaw).abs() < 0.01 {
                self.target_rotation = None;
            }
        }

        self.body.set_yaw(yaw);
    }

    fn apply_translation(
        &mut self,
        env: &mut dyn Environment,
        root_translation: Vec3,
        motion_velocity: Vec3,
        gravity_enabled: bool,
        dt: f32,
    ) {
        let settings = &self.settings;
        let acceleration = self.forces.resolve();
        let mut accumulated = self.forces.accumulated_velocity;

        if gravity_enabled {
            if self.state.is_grounded {
                accumulated.y = accumulated.y.max(0.0);
                let drag = (1.0 - settings.ground_drag * dt).clamp(0.0, 1.0);
                accumulated.x *= drag;
                accumulated.z *= drag;

                if settings.slide_assist && self.state.ground_angle > settings.max_slope_angle {
                    let normal = self.state.ground_normal;
                    let downhill = settings.gravity - normal * settings.gravity.dot(normal);
                    accumulated += downhill * dt;
                }
            } else {
                accumulated += settings.gravity * dt;
            }
            accumulated += acceleration * dt;
        } else {
            accumulated = Vec3::ZERO;
        }

        let mut motion_velocity = motion_velocity;
        if let Some(AiTarget::Velocity(velocity)) = self.target {
            motion_velocity.x = velocity.x;
            motion_velocity.z = velocity.z;
        }

        let root_world = self.body.rotation * root_translation;
        let displacement = (accumulated + motion_velocity) * dt + root_world;
        self.forces.mark_movement_applied();

        let start = self.body.position;
        let horizontal = Vec3::new(displacement.x, 0.0, displacement.z);
        if horizontal.length_squared() > f32::EPSILON * f32::EPSILON {
            self.body.position = self.slide(env, self.body.position, horizontal);
        }

        let rising = displacement.y > 0.0;
        if rising {
            if self.move_up(env, displacement.y) {
                accumulated.y = accumulated.y.min(0.0);
            }
        } else if self.move_down(env, -displacement.y) && accumulated.y < 0.0 {
            accumulated.y = 0.0;
        }

        if self.state.is_grounded && gravity_enabled && !rising {
            self.snap_to_ground(env);
        }

        self.forces.accumulated_velocity = accumulated;
        self.state.velocity = (self.body.position - start) / dt;
    }

    /// Sweep the collider horizontally, sliding along whatever it hits
    fn slide(&self, env: &dyn Environment, start: Vec3, motion: Vec3) -> Vec3 {
        let mut position = start;
        let mut remaining = motion;

        for _ in 0..SLIDE_ITERATIONS {
            let length = remaining.length();
            if length <= 1e-6 {
                break;
            }
            let direction = remaining / length;
            let Some(hit) = self.sweep(env, position, direction, length + SKIN) else {
                position += remaining;
                break;
            };

            let travel = (hit.distance - SKIN).clamp(0.0, length);
            position += direction * travel;

            let wall = Vec3::new(hit.normal.x, 0.0, hit.normal.z).normalize_or_zero();
            let rest = remaining - direction * travel;
            let into_wall = rest.dot(wall);
            if wall == Vec3::ZERO {
                break;
            }
            remaining = if into_wall < 0.0 { rest - wall * into_wall } else { rest };
        }
        position
    }

    /// Closest hit of the two spheres standing in for the capsule
    fn sweep(&self, env: &dyn Environment, position: Vec3, direction: Vec3, distance: f32) -> Option<EnvironmentHit> {
        let radius = self.body.radius;
        let low = position + Vec3::Y * (radius + self.settings.ground_snap_distance);
        let high = position + Vec3::Y * (self.body.height - radius).max(radius + self.settings.ground_snap_distance);

        let hits = [
            env.cast_sphere(low, radius, direction, distance),
            env.cast_sphere(high, radius, direction, distance),
        ];
        hits.into_iter()
            .flatten()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Returns true when a ceiling stopped the move
    fn move_up(&mut self, env: &dyn Environment, distance: f32) -> bool {
        let half = self.body.height * 0.5;
        match env.cast_ray(self.body.center(), Vec3::Y, half + distance) {
            Some(hit) => {
                let gap = (hit.distance - half - SKIN).max(0.0);
                self.body.position.y += gap.min(distance);
                gap < distance
            }
            None => {
                self.body.position.y += distance;
                false
            }
        }
    }

    /// Returns true when the ground stopped the move
    fn move_down(&mut self, env: &dyn Environment, distance: f32) -> bool {
        if distance <= 0.0 {
            return false;
        }
        let half = self.body.height * 0.5;
        if let Some(hit) = env.cast_ray(self.body.center(), Vec3::NEG_Y, half + distance) {
            let gap = hit.distance - half;
            if gap <= distance {
                self.body.position.y -= gap;
                return true;
            }
        }

        // Nothing under the center, the rim of the collider may still land on an edge
        let radius = self.body.radius;
        let origin = self.body.position + Vec3::Y * radius;
        if let Some(hit) = env.cast_sphere(origin, radius * 0.95, Vec3::NEG_Y, distance) {
            self.body.position.y -= hit.distance;
            return true;
        }

        self.body.position.y -= distance;
        false
    }

    fn snap_to_ground(&mut self, env: &dyn Environment) {
        let half = self.body.height * 0.5;
        let reach = half + self.settings.ground_snap_distance;
        let Some(hit) = env.cast_ray(self.body.center(), Vec3::NEG_Y, reach) else {
            return;
        };
        let gap = hit.distance - half;
        if gap.abs() <= self.settings.ground_snap_distance {
            self.body.position.y -= gap;
        }
    }

    /// Nudge the collider off a mesh edge it is resting on while the
    /// ground ray says there is nothing underneath
    fn free_from_edges(&mut self, env: &dyn Environment) {
        if self.state.is_grounded {
            return;
        }
        let half = self.body.height * 0.5;
        let grounded_distance = self.probe.settings.grounded_distance;
        if let Some(hit) = env.cast_ray(self.body.center(), Vec3::NEG_Y, half + grounded_distance)
            && hit.distance - half <= grounded_distance
        {
            return;
        }

        let radius = self.body.radius;
        let origin = self.body.position + Vec3::Y * radius;
        let Some(hit) = env.cast_sphere(origin, radius * 0.95, Vec3::NEG_Y, grounded_distance) else {
            return;
        };
        let away = self.body.position - hit.point;
        let away = Vec3::new(away.x, 0.0, away.z).normalize_or_zero();
        if away != Vec3::ZERO {
            trace!("Freeing collider from ledge edge");
            self.body.position += away * self.settings.edge_release_push;
        }
    }

    fn push_animator_parameters(&self, animator: &mut dyn AnimatorDriver) {
        let state = &self.state;
        for (index, layer) in state.layers.iter().enumerate() {
            if layer.motion_phase != 0 {
                animator.set_motion_phase(index, layer.motion_phase, layer.auto_clear_phase);
            }
        }

        animator.set_integer(AnimatorParam::IsGrounded, state.is_grounded as i32);
        animator.set_integer(AnimatorParam::Stance, state.stance.as_int());
        animator.set_integer(AnimatorParam::IdleVariation, state.idle_variation);
        animator.set_float(AnimatorParam::InputX, state.input_x);
        animator.set_float(AnimatorParam::InputY, state.input_y);
        animator.set_float(AnimatorParam::InputMagnitude, self.pushed_magnitude);
        animator.set_float(AnimatorParam::InputMagnitudeAvg, state.input_trend.average());
        animator.set_float(AnimatorParam::InputAngleFromAvatar, state.input_angle_from_avatar);
        animator.set_float(AnimatorParam::InputAngleFromCamera, state.input_angle_from_camera);
    }

    /// Carry the character along with the support it stands on.
    ///
    /// Runs after physics has moved the support for this frame.
    pub fn late_update(&mut self, env: &dyn Environment) {
        let support = if self.state.is_grounded {
            self.state.support
        } else {
            None
        };
        let Some(handle) = support else {
            self.last_support = None;
            return;
        };
        let Some(pose) = env.body_transform(handle) else {
            self.last_support = None;
            return;
        };

        if let Some((last_handle, last_pose)) = self.last_support
            && last_handle == handle
            && last_pose != pose
        {
            let local = last_pose.inverse_transform_point(self.body.position);
            self.body.position = pose.transform_point(local);

            let delta = pose.rotation * last_pose.rotation.inverse();
            let (yaw, _, _) = delta.to_euler(EulerRot::YXZ);
            self.body.set_yaw(self.body.yaw() + yaw.to_degrees());
        }
        self.last_support = Some((handle, pose));
    }

    // ====================================================================
    // Queries
    // ====================================================================

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn previous_state(&self) -> &ControllerState {
        &self.previous
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn forces(&self) -> &ForceAccumulator {
        &self.forces
    }

    pub fn forces_mut(&mut self) -> &mut ForceAccumulator {
        &mut self.forces
    }

    /// Point the camera follows
    pub fn anchor_position(&self) -> Vec3 {
        self.body.position + Vec3::Y * self.settings.anchor_height
    }

    /// Sum of the active motions' first-person camera offsets
    pub fn camera_offset(&self) -> Vec3 {
        self.layers
            .iter()
            .filter_map(|layer| layer.active_motion())
            .map(|motion| motion.camera_offset())
            .sum()
    }

    /// Camera mode asked for by a motion since the last call
    pub fn take_camera_mode_request(&mut self) -> Option<CameraMode> {
        self.camera_mode_request.take()
    }

    pub fn layer(&self, index: usize) -> Option<&MotionLayer> {
        self.layers.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn active_kind(&self, layer: usize) -> Option<MotionKind> {
        self.layers.get(layer)?.active_kind()
    }

    pub fn motion(&self, kind: MotionKind) -> Option<&dyn Motion> {
        self.layers.iter().find_map(|layer| layer.motion(kind))
    }

    pub fn motion_mut(&mut self, kind: MotionKind) -> Option<&mut dyn Motion> {
        self.layers
            .iter_mut()
            .find_map(|layer| layer.motion_mut(kind))
    }

    pub fn motion_by_name(&self, name: &str) -> Option<&dyn Motion> {
        self.layers
            .iter()
            .find_map(|layer| layer.motion_by_name(name))
    }

    /// Concrete access to a motion, e.g. to tune it from gameplay code
    pub fn motion_as<T: Motion>(&self) -> Option<&T> {
        self.layers
            .iter()
            .flat_map(|layer| layer.motions())
            .find_map(|motion| motion.as_any().downcast_ref::<T>())
    }

    pub fn motion_as_mut<T: Motion>(&mut self) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.motions_mut())
            .find_map(|motion| motion.as_mut().as_any_mut().downcast_mut::<T>())
    }

    // ====================================================================
    // AI and script control
    // ====================================================================

    /// Activate `kind` on its layer at the next update
    pub fn activate_motion(&mut self, kind: MotionKind) -> bool {
        self.layers.iter_mut().any(|layer| layer.queue(kind))
    }

    pub fn queue_motion(&mut self, layer: usize, kind: MotionKind) -> bool {
        self.layers
            .get_mut(layer)
            .is_some_and(|layer| layer.queue(kind))
    }

    pub fn set_target_velocity(&mut self, velocity: Vec3) {
        self.target = Some(AiTarget::Velocity(velocity));
    }

    /// Walk toward `position` at a normalized input speed in [0, 1]
    pub fn set_target_position(&mut self, position: Vec3, normalized_speed: f32) {
        self.target = Some(AiTarget::Position {
            position,
            speed: normalized_speed,
        });
    }

    pub fn set_target_rotation(&mut self, rotation: Quat) {
        self.target_rotation = Some(rotation);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.target_rotation = None;
    }

    pub fn target(&self) -> Option<AiTarget> {
        self.target
    }
}
