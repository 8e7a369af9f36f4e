//! Per-frame input snapshot.
//!
//! Devices are polled once per frame into an [`InputSnapshot`] which is then
//! threaded through the motion controller and the camera rigs. Motions only
//! ever see the [`ActionProvider`] trait.

use std::collections::HashSet;

use bevy::{input::mouse::AccumulatedMouseMotion, prelude::*};

use crate::AppSystems;

/// Named boolean actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum Action {
    Jump,
    Sprint,
    Aiming,
    ChangeStance,
    PrimaryAttack,
    Release,
}

/// Named analog axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum Axis {
    MovementX,
    MovementY,
    ViewX,
    ViewY,
}

pub trait ActionProvider {
    fn is_pressed(&self, action: Action) -> bool;

    fn just_pressed(&self, action: Action) -> bool;

    fn axis(&self, axis: Axis) -> f32;

    fn movement(&self) -> Vec2 {
        Vec2::new(self.axis(Axis::MovementX), self.axis(Axis::MovementY))
    }

    fn view(&self) -> Vec2 {
        Vec2::new(self.axis(Axis::ViewX), self.axis(Axis::ViewY))
    }
}

/// Input state captured for one frame
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub movement: Vec2,
    pub view: Vec2,
    pub pressed: HashSet<Action>,
    pub just_pressed: HashSet<Action>,
}

impl InputSnapshot {
    pub fn with_movement(mut self, movement: Vec2) -> Self {
        self.movement = movement;
        self
    }

    pub fn with_view(mut self, view: Vec2) -> Self {
        self.view = view;
        self
    }

    /// Mark an action as held
    pub fn hold(mut self, action: Action) -> Self {
        self.pressed.insert(action);
        self
    }

    /// Mark an action as pressed this frame
    pub fn press(mut self, action: Action) -> Self {
        self.pressed.insert(action);
        self.just_pressed.insert(action);
        self
    }
}

impl ActionProvider for InputSnapshot {
    fn is_pressed(&self, action: Action) -> bool {
        self.pressed.contains(&action)
    }

    fn just_pressed(&self, action: Action) -> bool {
        self.just_pressed.contains(&action)
    }

    fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::MovementX => self.movement.x,
            Axis::MovementY => self.movement.y,
            Axis::ViewX => self.view.x,
            Axis::ViewY => self.view.y,
        }
    }
}

/// Keyboard and mouse layout
#[derive(Resource, Debug, Clone)]
pub struct InputBindings {
    pub forward: Vec<KeyCode>,
    pub back: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub jump: KeyCode,
    pub sprint: KeyCode,
    pub change_stance: KeyCode,
    pub release: KeyCode,
    /// Steps the camera through its modes
    pub cycle_camera: KeyCode,
    pub aim: MouseButton,
    pub primary_attack: MouseButton,
    /// Mouse delta to view axis
    pub mouse_sensitivity: Vec2,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            back: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            jump: KeyCode::Space,
            sprint: KeyCode::ShiftLeft,
            change_stance: KeyCode::KeyC,
            release: KeyCode::KeyX,
            cycle_camera: KeyCode::KeyV,
            aim: MouseButton::Right,
            primary_attack: MouseButton::Left,
            mouse_sensitivity: Vec2::new(0.5, 0.4),
        }
    }
}

fn any_pressed(keyboard: &ButtonInput<KeyCode>, keys: &[KeyCode]) -> bool {
    keys.iter().any(|key| keyboard.pressed(*key))
}

/// Poll keyboard and mouse into the frame's [`InputSnapshot`]
pub fn capture_input_snapshot(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    bindings: Res<InputBindings>,
    mut snapshot: ResMut<InputSnapshot>,
) {
    let mut movement = Vec2::ZERO;
    if any_pressed(&keyboard, &bindings.forward) {
        movement.y += 1.0;
    }
    if any_pressed(&keyboard, &bindings.back) {
        movement.y -= 1.0;
    }
    if any_pressed(&keyboard, &bindings.left) {
        movement.x -= 1.0;
    }
    if any_pressed(&keyboard, &bindings.right) {
        movement.x += 1.0;
    }

    let mut next = InputSnapshot {
        // Diagonals stay at unit length
        movement: movement.clamp_length_max(1.0),
        view: mouse_motion.delta * bindings.mouse_sensitivity,
        ..default()
    };

    let keys = [
        (Action::Jump, bindings.jump),
        (Action::Sprint, bindings.sprint),
        (Action::ChangeStance, bindings.change_stance),
        (Action::Release, bindings.release),
    ];
    for (action, key) in keys {
        if keyboard.pressed(key) {
            next.pressed.insert(action);
        }
        if keyboard.just_pressed(key) {
            next.just_pressed.insert(action);
        }
    }

    let buttons = [
        (Action::Aiming, bindings.aim),
        (Action::PrimaryAttack, bindings.primary_attack),
    ];
    for (action, button) in buttons {
        if mouse_buttons.pressed(button) {
            next.pressed.insert(action);
        }
        if mouse_buttons.just_pressed(button) {
            next.just_pressed.insert(action);
        }
    }

    *snapshot = next;
}

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<InputSnapshot>();
    app.init_resource::<InputBindings>();
    app.add_systems(
        Update,
        capture_input_snapshot.in_set(AppSystems::RecordInput),
    );
}
