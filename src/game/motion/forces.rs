//! Timed and instant forces acting on the character.

use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum ForceKind {
    /// Applied once as a velocity change, then dropped
    Impulse,
    /// Applied every frame until it expires or is removed
    Sustained,
}

#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct ForceRecord {
    pub kind: ForceKind,
    pub value: Vec3,
    pub start_time: f32,
    /// Seconds the force lasts, 0 for no limit
    pub duration: f32,
}

impl ForceRecord {
    const EMPTY: Self = Self {
        kind: ForceKind::Sustained,
        value: Vec3::ZERO,
        start_time: 0.0,
        duration: 0.0,
    };

    pub fn is_expired(&self, time: f32) -> bool {
        self.duration > 0.0 && time > self.start_time + self.duration
    }
}

/// Recycles force records so steady-state frames allocate nothing
#[derive(Debug, Clone, Default)]
pub struct ForcePool {
    free: Vec<ForceRecord>,
}

impl ForcePool {
    pub fn acquire(&mut self) -> ForceRecord {
        self.free.pop().unwrap_or(ForceRecord::EMPTY)
    }

    pub fn release(&mut self, mut record: ForceRecord) {
        record.value = Vec3::ZERO;
        self.free.push(record);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// Sums impulses and sustained forces into the velocity the controller
/// integrates on top of motion velocity.
#[derive(Debug, Clone)]
pub struct ForceAccumulator {
    records: Vec<ForceRecord>,
    pool: ForcePool,
    /// Velocity built up from forces and gravity
    pub accumulated_velocity: Vec3,
    mass: f32,
    reference_time_step: f32,
    movement_applied: bool,
    time: f32,
}

impl Default for ForceAccumulator {
    fn default() -> Self {
        Self::new(1.0, 1.0 / 60.0)
    }
}

impl ForceAccumulator {
    pub fn new(mass: f32, reference_time_step: f32) -> Self {
        Self {
            records: Vec::new(),
            pool: ForcePool::default(),
            accumulated_velocity: Vec3::ZERO,
            mass: mass.max(f32::EPSILON),
            reference_time_step: reference_time_step.max(f32::EPSILON),
            movement_applied: false,
            time: 0.0,
        }
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(f32::EPSILON);
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_reference_time_step(&mut self, step: f32) {
        self.reference_time_step = step.max(f32::EPSILON);
    }

    /// Start a new frame at simulation time `time`
    pub fn begin_frame(&mut self, time: f32) {
        self.time = time;
        self.movement_applied = false;
    }

    /// The body has moved for this frame; later impulses wait for the next one
    pub fn mark_movement_applied(&mut self) {
        self.movement_applied = true;
    }

    pub fn movement_applied(&self) -> bool {
        self.movement_applied
    }

    /// Add an instant push. The impulse acts as a force spread over one
    /// reference step, so the resulting velocity change is `impulse / mass`
    /// whatever the frame rate.
    pub fn add_impulse(&mut self, impulse: Vec3) {
        if impulse.length_squared() <= f32::EPSILON {
            return;
        }

        let force = impulse / self.reference_time_step;
        if self.movement_applied {
            let mut record = self.pool.acquire();
            record.kind = ForceKind::Impulse;
            record.value = force;
            record.start_time = self.time;
            record.duration = self.reference_time_step;
            self.records.push(record);
        } else {
            self.accumulated_velocity += (force / self.mass) * self.reference_time_step;
        }
    }

    /// Add a force that lasts `duration` seconds (0 for no limit)
    pub fn add_force(&mut self, force: Vec3, duration: f32) {
        let mut record = self.pool.acquire();
        record.kind = ForceKind::Sustained;
        record.value = force;
        record.start_time = self.time;
        record.duration = duration.max(0.0);
        self.records.push(record);
    }

    /// Remove the first sustained force equal to `force`, or every one with `all`
    pub fn remove_force(&mut self, force: Vec3, all: bool) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.records.len() {
            let record = self.records[index];
            if record.kind == ForceKind::Sustained && record.value == force {
                self.pool.release(self.records.remove(index));
                removed += 1;
                if !all {
                    break;
                }
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Apply pending impulses and return the acceleration of the live
    /// sustained forces. Empty or expired records are dropped here.
    pub fn resolve(&mut self) -> Vec3 {
        let mut acceleration = Vec3::ZERO;
        let mut index = 0;
        while index < self.records.len() {
            let record = self.records[index];
            let expired = record.kind == ForceKind::Sustained && record.is_expired(self.time);
            if record.value.length_squared() <= f32::EPSILON || expired {
                self.pool.release(self.records.swap_remove(index));
                continue;
            }

            match record.kind {
                ForceKind::Impulse => {
                    self.accumulated_velocity +=
                        (record.value / self.mass) * self.reference_time_step;
                    self.pool.release(self.records.swap_remove(index));
                }
                ForceKind::Sustained => {
                    acceleration += record.value / self.mass;
                    index += 1;
                }
            }
        }
        acceleration
    }

    pub fn records(&self) -> &[ForceRecord] {
        &self.records
    }

    pub fn pool(&self) -> &ForcePool {
        &self.pool
    }

    pub fn clear(&mut self) {
        for record in self.records.drain(..) {
            self.pool.release(record);
        }
        self.accumulated_velocity = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_changes_velocity_by_impulse_over_mass() {
        let mut forces = ForceAccumulator::new(5.0, 1.0 / 60.0);
        forces.begin_frame(0.0);
        forces.add_impulse(Vec3::new(0.0, 31.0, 0.0));

        assert!((forces.accumulated_velocity.y - 6.2).abs() < 1e-4);
        assert!(forces.records().is_empty());
    }

    #[test]
    fn test_impulse_after_movement_waits_a_frame() {
        let mut forces = ForceAccumulator::new(2.0, 1.0 / 50.0);
        forces.begin_frame(0.0);
        forces.mark_movement_applied();
        forces.add_impulse(Vec3::X * 4.0);
        assert_eq!(forces.accumulated_velocity, Vec3::ZERO);
        assert_eq!(forces.records().len(), 1);

        forces.begin_frame(0.02);
        let acceleration = forces.resolve();
        assert_eq!(acceleration, Vec3::ZERO);
        assert!((forces.accumulated_velocity.x - 2.0).abs() < 1e-4);
        assert!(forces.records().is_empty());
        assert_eq!(forces.pool().available(), 1);
    }

    #[test]
    fn test_sustained_force_expires_after_duration() {
        let mut forces = ForceAccumulator::new(2.0, 1.0 / 60.0);
        forces.begin_frame(1.0);
        forces.add_force(Vec3::X * 10.0, 0.5);

        forces.begin_frame(1.5);
        assert_eq!(forces.resolve(), Vec3::X * 5.0);

        forces.begin_frame(1.51);
        assert_eq!(forces.resolve(), Vec3::ZERO);
        assert!(forces.records().is_empty());
    }

    #[test]
    fn test_zero_force_dropped_and_pooled() {
        let mut forces = ForceAccumulator::default();
        forces.begin_frame(0.0);
        forces.add_force(Vec3::ZERO, 0.0);
        forces.add_force(Vec3::Y, 0.0);

        assert_eq!(forces.resolve(), Vec3::Y);
        assert_eq!(forces.records().len(), 1);
        assert_eq!(forces.pool().available(), 1);
    }

    #[test]
    fn test_remove_first_or_all() {
        let mut forces = ForceAccumulator::default();
        for _ in 0..3 {
            forces.add_force(Vec3::Z, 0.0);
        }
        assert_eq!(forces.remove_force(Vec3::Z, false), 1);
        assert_eq!(forces.records().len(), 2);
        assert_eq!(forces.remove_force(Vec3::Z, true), 2);
        assert!(forces.records().is_empty());
        assert_eq!(forces.remove_force(Vec3::Z, true), 0);
    }
}
