use bevy::prelude::*;

use super::{Motion, MotionContext, MotionKind};

/// One animation layer's worth of motions, at most one of them active.
pub struct MotionLayer {
    pub name: String,
    /// Animation layer driven by the active motion
    pub animator_layer: usize,
    motions: Vec<Box<dyn Motion>>,
    /// Motion indices by descending priority, registration order on ties
    order: Vec<usize>,
    active: Option<usize>,
    queued: Option<usize>,

    // ====================================================================
    // Aggregated output of the last update
    // ====================================================================
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub gravity_enabled: bool,
}

impl MotionLayer {
    pub fn new(name: &str, animator_layer: usize) -> Self {
        Self {
            name: name.to_string(),
            animator_layer,
            motions: Vec::new(),
            order: Vec::new(),
            active: None,
            queued: None,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            gravity_enabled: true,
        }
    }

    pub fn with_motion(mut self, motion: impl Motion + 'static) -> Self {
        self.add_motion(Box::new(motion));
        self
    }

    pub fn add_motion(&mut self, mut motion: Box<dyn Motion>) {
        motion.core_mut().layer_index = self.animator_layer;
        self.motions.push(motion);
        self.sort_by_priority();
    }

    /// Rebuild the scan order after priorities change
    pub fn sort_by_priority(&mut self) {
        let mut order: Vec<usize> = (0..self.motions.len()).collect();
        // Stable sort keeps registration order for equal priorities
        order.sort_by(|a, b| {
            self.motions[*b]
                .core()
                .priority
                .total_cmp(&self.motions[*a].core().priority)
        });
        self.order = order;
    }

    pub fn motions(&self) -> impl Iterator<Item = &dyn Motion> {
        self.motions.iter().map(|m| &**m as &dyn Motion)
    }

    pub fn motions_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Motion>> {
        self.motions.iter_mut()
    }

    pub fn motion_index(&self, kind: MotionKind) -> Option<usize> {
        self.motions.iter().position(|m| m.kind() == kind)
    }

    pub fn motion(&self, kind: MotionKind) -> Option<&dyn Motion> {
        let index = self.motion_index(kind)?;
        Some(self.motions[index].as_ref())
    }

    pub fn motion_mut(&mut self, kind: MotionKind) -> Option<&mut dyn Motion> {
        let index = self.motion_index(kind)?;
        Some(self.motions[index].as_mut())
    }

    pub fn motion_by_name(&self, name: &str) -> Option<&dyn Motion> {
        let index = self.motions.iter().position(|m| m.name() == name)?;
        Some(self.motions[index].as_ref())
    }

    pub fn active_motion(&self) -> Option<&dyn Motion> {
        let index = self.active?;
        Some(self.motions[index].as_ref())
    }

    pub fn active_kind(&self) -> Option<MotionKind> {
        self.active_motion().map(|m| m.kind())
    }

    /// Ask for `kind` to be activated on the next update
    pub fn queue(&mut self, kind: MotionKind) -> bool {
        match self.motion_index(kind) {
            Some(index) => {
                self.queued = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn queued_kind(&self) -> Option<MotionKind> {
        self.queued.map(|index| self.motions[index].kind())
    }

    /// Veto from the active motion, if any
    pub fn determine_grounding(&self, state: &super::ControllerState) -> bool {
        self.active_motion()
            .map(|m| m.determine_grounding(state))
            .unwrap_or(state.is_grounded)
    }

    pub fn expects_grounded(&self) -> bool {
        self.active_motion()
            .map(|m| m.core().expects_grounded)
            .unwrap_or(true)
    }

    /// Start the motion at `index`. The active motion is deactivated first,
    /// so a refused start leaves the layer without an active motion.
    fn try_activate(&mut self, index: usize, ctx: &mut MotionContext) -> bool {
        let previous = self.active.filter(|&active| active != index);
        let previous_kind = previous.map(|i| self.motions[i].kind());
        if let Some(previous) = previous {
            self.motions[previous].deactivate(ctx);
            self.active = None;
        }
        ctx.active = previous_kind;

        if !self.motions[index].activate(previous_kind, ctx) {
            ctx.active = None;
            debug!(
                "Layer '{}': motion '{}' refused to start",
                self.name,
                self.motions[index].name()
            );
            return false;
        }

        self.motions[index].core_mut().mark_active(ctx.time);
        self.active = Some(index);
        ctx.active = Some(self.motions[index].kind());
        debug!(
            "Layer '{}' activated motion '{}'",
            self.name,
            self.motions[index].name()
        );
        true
    }

    /// Run one frame of arbitration and let the winner update
    pub fn update(&mut self, ctx: &mut MotionContext) {
        ctx.active = self.active_kind();
        for motion in &mut self.motions {
            motion.core_mut().activated_this_frame = false;
            motion.refresh(ctx);
        }

        if let Some(index) = self.queued.take()
            && self.active != Some(index)
        {
            self.try_activate(index, ctx);
        }

        // A motion that fails its own test always yields
        if let Some(index) = self.active {
            let motion = &self.motions[index];
            let keep = motion.core().enabled && (motion.core().activated_this_frame || motion.test_update(ctx));
            if !keep {
                self.motions[index].deactivate(ctx);
                self.active = None;
                ctx.active = None;
            }
        }

        self.scan(ctx);

        if let Some(index) = self.active {
            ctx.active = Some(self.motions[index].kind());
            self.motions[index].update_motion(ctx);
        }

        self.aggregate();
    }

    fn scan(&mut self, ctx: &mut MotionContext) {
        for position in 0..self.order.len() {
            // Re-read every step: a refused start clears the active motion
            let active_priority = match self.active {
                None => None,
                Some(index) if self.motions[index].core().is_interruptible => {
                    Some(self.motions[index].core().priority)
                }
                Some(_) => return,
            };

            let index = self.order[position];
            if Some(index) == self.active {
                continue;
            }
            let motion = &self.motions[index];
            if let Some(priority) = active_priority
                && motion.core().priority <= priority
            {
                // Order is descending, nothing further can interrupt
                break;
            }
            if !motion.core().can_start(ctx.time) || !motion.test_activate(ctx) {
                continue;
            }
            if self.try_activate(index, ctx) {
                break;
            }
        }
    }

    fn aggregate(&mut self) {
        let (velocity, angular_velocity, gravity_enabled) = match self.active_motion() {
            Some(motion) => {
                let core = motion.core();
                (core.velocity, core.angular_velocity, core.gravity_enabled)
            }
            None => (Vec3::ZERO, Vec3::ZERO, true),
        };
        self.velocity = velocity;
        self.angular_velocity = angular_velocity;
        self.gravity_enabled = gravity_enabled;
    }

    /// Deactivate the active motion outside of the normal arbitration
    pub fn deactivate_active(&mut self, ctx: &mut MotionContext) {
        if let Some(index) = self.active.take() {
            self.motions[index].deactivate(ctx);
        }
        self.aggregate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::motion::{
        MotionCore, Stance,
        test_support::{Harness, ScriptedMotion},
    };

    fn ids(layer: &MotionLayer) -> Vec<bool> {
        layer.motions().map(|m| m.is_active()).collect()
    }

    #[test]
    fn test_higher_priority_wins() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 1.0).wanting(true))
            .with_motion(ScriptedMotion::new(2, 5.0).wanting(true));

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(2)));
        assert_eq!(ids(&layer), vec![false, true]);
    }

    #[test]
    fn test_ties_resolve_to_registration_order() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 3.0).wanting(true))
            .with_motion(ScriptedMotion::new(2, 3.0).wanting(true))
            .with_motion(ScriptedMotion::new(3, 3.0).wanting(true));

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));
    }

    #[test]
    fn test_interruptible_replaced_only_by_higher_priority() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 2.0).wanting(true))
            .with_motion(ScriptedMotion::new(2, 2.0).wanting(false))
            .with_motion(ScriptedMotion::new(3, 9.0).wanting(false));

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));

        // Equal priority does not interrupt
        scripted(&mut layer, 2).wants_activate = true;
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));

        scripted(&mut layer, 3).wants_activate = true;
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(3)));
        assert_eq!(ids(&layer).iter().filter(|a| **a).count(), 1);
        assert_eq!(scripted(&mut layer, 1).core.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_non_interruptible_blocks_until_it_yields() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 1.0).wanting(true).interruptible(false))
            .with_motion(ScriptedMotion::new(2, 9.0).wanting(false));

        harness.with_context(|ctx| layer.update(ctx));
        scripted(&mut layer, 2).wants_activate = true;
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));

        scripted(&mut layer, 1).wants_continue = false;
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(2)));
    }

    #[test]
    fn test_refused_activation_keeps_active_motion() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 1.0).wanting(true))
            .with_motion(ScriptedMotion::new(2, 9.0).wanting(false));

        harness.with_context(|ctx| layer.update(ctx));
        let refusing = scripted(&mut layer, 2);
        refusing.wants_activate = true;
        refusing.accepts = false;
        harness.with_context(|ctx| layer.update(ctx));

        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));
        assert!(!scripted(&mut layer, 2).core.is_active);
    }

    #[test]
    fn test_previous_motion_exits_before_next_enters() {
        let mut harness = Harness::flat_ground();
        let mut crouch = ScriptedMotion::new(1, 1.0).wanting(true);
        crouch.enter_stance = Some(Stance::Sneak);
        crouch.exit_stance = Some(Stance::Normal);
        let mut hang = ScriptedMotion::new(2, 9.0).wanting(false);
        hang.enter_stance = Some(Stance::Climb);
        let mut layer = MotionLayer::new("Base", 0).with_motion(crouch).with_motion(hang);

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(harness.state.stance, Stance::Sneak);

        scripted(&mut layer, 2).wants_activate = true;
        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(2)));
        assert_eq!(harness.state.stance, Stance::Climb);
    }

    #[test]
    fn test_refused_start_falls_through_to_lower_priority() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 1.0).wanting(false))
            .with_motion(ScriptedMotion::new(2, 5.0).wanting(true))
            .with_motion(ScriptedMotion::new(3, 9.0).wanting(false));

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(2)));

        let refusing = scripted(&mut layer, 3);
        refusing.wants_activate = true;
        refusing.accepts = false;
        scripted(&mut layer, 2).wants_activate = false;
        scripted(&mut layer, 1).wants_activate = true;
        harness.with_context(|ctx| layer.update(ctx));

        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(1)));
        assert_eq!(ids(&layer).iter().filter(|a| **a).count(), 1);
    }

    #[test]
    fn test_queued_motion_activates_next_update() {
        let mut harness = Harness::flat_ground();
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 5.0).wanting(true))
            .with_motion(ScriptedMotion::new(2, 1.0).wanting(false));

        harness.with_context(|ctx| layer.update(ctx));
        assert!(layer.queue(MotionKind::Custom(2)));
        assert!(!layer.queue(MotionKind::Jump));
        harness.with_context(|ctx| layer.update(ctx));

        assert_eq!(layer.active_kind(), Some(MotionKind::Custom(2)));
        assert_eq!(layer.queued_kind(), None);
    }

    #[test]
    fn test_aggregates_active_velocity() {
        let mut harness = Harness::flat_ground();
        let mut motion = ScriptedMotion::new(1, 1.0).wanting(true);
        motion.update_velocity = Vec3::new(1.0, 0.0, 2.0);
        motion.gravity = false;
        let mut layer = MotionLayer::new("Base", 0).with_motion(motion);

        harness.with_context(|ctx| layer.update(ctx));
        assert_eq!(layer.velocity, Vec3::new(1.0, 0.0, 2.0));
        assert!(!layer.gravity_enabled);

        harness.with_context(|ctx| layer.deactivate_active(ctx));
        assert_eq!(layer.velocity, Vec3::ZERO);
        assert!(layer.gravity_enabled);
    }

    fn scripted(layer: &mut MotionLayer, id: u32) -> &mut ScriptedMotion {
        layer
            .motion_mut(MotionKind::Custom(id))
            .and_then(|m| m.as_any_mut().downcast_mut::<ScriptedMotion>())
            .expect("scripted motion")
    }

    #[test]
    fn test_sort_by_priority_after_change() {
        let mut layer = MotionLayer::new("Base", 0)
            .with_motion(ScriptedMotion::new(1, 1.0))
            .with_motion(ScriptedMotion::new(2, 2.0));
        scripted(&mut layer, 1).core = MotionCore::new("Raised", 10.0);
        layer.sort_by_priority();
        assert_eq!(layer.order, vec![0, 1]);
    }
}
