use bevy::prelude::*;

/// Damping ratios this close to 1 use the closed-form critically damped step
const CRITICAL_TOLERANCE: f32 = 1e-3;

/// Mass-spring-damper pulling a point toward a moving target.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct Spring {
    pub velocity: Vec3,
    pub mass: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Default for Spring {
    fn default() -> Self {
        Self::new(1.0, 120.0, None)
    }
}

impl Spring {
    /// `damping` of `None` means critical damping, `2 * sqrt(k * m)`
    pub fn new(mass: f32, stiffness: f32, damping: Option<f32>) -> Self {
        let mass = mass.max(f32::EPSILON);
        let stiffness = stiffness.max(0.0);
        Self {
            velocity: Vec3::ZERO,
            mass,
            stiffness,
            damping: damping.unwrap_or_else(|| Self::critical_damping(mass, stiffness)),
        }
    }

    pub fn critical_damping(mass: f32, stiffness: f32) -> f32 {
        2.0 * (stiffness * mass).sqrt()
    }

    pub fn is_critically_damped(&self) -> bool {
        let critical = Self::critical_damping(self.mass, self.stiffness);
        critical > 0.0 && (self.damping - critical).abs() <= critical * CRITICAL_TOLERANCE
    }

    pub fn reset(&mut self) {
        self.velocity = Vec3::ZERO;
    }

    /// Advance `current` toward `target` by `dt` and return the new position
    pub fn step(&mut self, current: Vec3, target: Vec3, dt: f32) -> Vec3 {
        if dt <= 0.0 {
            return current;
        }
        if self.is_critically_damped() {
            return self.step_critical(current, target, dt);
        }

        // Semi-implicit Euler
        let displacement = current - target;
        let acceleration = (-self.stiffness * displacement - self.damping * self.velocity) / self.mass;
        self.velocity += acceleration * dt;
        current + self.velocity * dt
    }

    /// Exact solution of x'' + 2w x' + w^2 x = 0, which never overshoots
    /// a resting target
    fn step_critical(&mut self, current: Vec3, target: Vec3, dt: f32) -> Vec3 {
        let omega = (self.stiffness / self.mass).sqrt();
        let offset = current - target;
        let slope = self.velocity + offset * omega;
        let decay = (-omega * dt).exp();

        self.velocity = (self.velocity - slope * (omega * dt)) * decay;
        target + (offset + slope * dt) * decay
    }
}
