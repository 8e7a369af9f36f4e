//! [`Environment`] backed by avian's spatial query pipeline.

use std::collections::{HashMap, HashSet};

use avian3d::prelude::*;
use bevy::prelude::*;

use super::{BodyHandle, BodyPose, Environment, EnvironmentHit};

/// Sensors are skipped by re-casting with the sensor excluded, up to this many times
const MAX_TRIGGER_SKIPS: usize = 8;

/// Colliders the environment can see. `Position` and `Rotation` hold this
/// frame's physics pose, `GlobalTransform` only catches up after propagation.
pub type BodyQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static GlobalTransform,
        Option<&'static Position>,
        Option<&'static Rotation>,
        Has<Sensor>,
    ),
    With<Collider>,
>;

/// Bodies each character currently ignores (e.g. the wall it is climbing over)
#[derive(Resource, Default, Debug)]
pub struct IgnoredCollisions {
    pub by_character: HashMap<Entity, HashSet<Entity>>,
}

impl IgnoredCollisions {
    pub fn for_character(&mut self, character: Entity) -> &mut HashSet<Entity> {
        self.by_character.entry(character).or_default()
    }
}

pub struct AvianEnvironment<'a, 'w, 's> {
    spatial_query: &'a SpatialQuery<'w, 's>,
    bodies: &'a BodyQuery<'w, 's>,
    character: Entity,
    ignored: &'a mut HashSet<Entity>,
}

impl<'a, 'w, 's> AvianEnvironment<'a, 'w, 's> {
    pub fn new(
        spatial_query: &'a SpatialQuery<'w, 's>,
        bodies: &'a BodyQuery<'w, 's>,
        character: Entity,
        ignored: &'a mut HashSet<Entity>,
    ) -> Self {
        Self {
            spatial_query,
            bodies,
            character,
            ignored,
        }
    }

    fn filter(&self) -> SpatialQueryFilter {
        SpatialQueryFilter::from_excluded_entities(
            self.ignored
                .iter()
                .copied()
                .chain(std::iter::once(self.character)),
        )
    }

    fn is_sensor(&self, entity: Entity) -> bool {
        self.bodies
            .get(entity)
            .map(|(_, _, _, sensor)| sensor)
            .unwrap_or(false)
    }

    fn entity_for(&self, body: BodyHandle) -> Option<Entity> {
        Entity::try_from_bits(body.0)
    }
}

/// Latest pose of a body, preferring the physics pose over the propagated one
fn physics_pose(transform: &GlobalTransform, position: Option<&Position>, rotation: Option<&Rotation>) -> BodyPose {
    let translation = position.map_or_else(|| transform.translation(), |position| position.0);
    let rotation = rotation.map_or_else(|| transform.rotation(), |rotation| rotation.0);
    BodyPose::new(translation, rotation)
}

impl Environment for AvianEnvironment<'_, '_, '_> {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<EnvironmentHit> {
        let Ok(dir) = Dir3::new(direction) else {
            return None;
        };
        let mut filter = self.filter();

        for _ in 0..MAX_TRIGGER_SKIPS {
            let hit = self
                .spatial_query
                .cast_ray(origin, dir, max_distance, true, &filter)?;
            if self.is_sensor(hit.entity) {
                filter.excluded_entities.insert(hit.entity);
                continue;
            }
            return Some(EnvironmentHit {
                point: origin + *dir * hit.distance,
                normal: hit.normal,
                distance: hit.distance,
                body: Some(hit.entity.into()),
                is_trigger: false,
            });
        }
        None
    }

    fn cast_sphere(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<EnvironmentHit> {
        let Ok(dir) = Dir3::new(direction) else {
            return None;
        };
        let shape = Collider::sphere(radius);
        let config = ShapeCastConfig::from_max_distance(max_distance);
        let mut filter = self.filter();

        for _ in 0..MAX_TRIGGER_SKIPS {
            let hit = self.spatial_query.cast_shape(
                &shape,
                origin,
                Quat::IDENTITY,
                dir,
                &config,
                &filter,
            )?;
            if self.is_sensor(hit.entity) {
                filter.excluded_entities.insert(hit.entity);
                continue;
            }
            return Some(EnvironmentHit {
                point: hit.point1,
                normal: hit.normal1,
                distance: hit.distance,
                body: Some(hit.entity.into()),
                is_trigger: false,
            });
        }
        None
    }

    fn cast_sphere_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Vec<EnvironmentHit> {
        let Ok(dir) = Dir3::new(direction) else {
            return Vec::new();
        };
        let shape = Collider::sphere(radius);
        let config = ShapeCastConfig::from_max_distance(max_distance);

        let mut hits: Vec<EnvironmentHit> = self
            .spatial_query
            .shape_hits(&shape, origin, Quat::IDENTITY, dir, 8, &config, &self.filter())
            .into_iter()
            .filter(|hit| !self.is_sensor(hit.entity))
            .map(|hit| EnvironmentHit {
                point: hit.point1,
                normal: hit.normal1,
                distance: hit.distance,
                body: Some(hit.entity.into()),
                is_trigger: false,
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn body_transform(&self, body: BodyHandle) -> Option<BodyPose> {
        let entity = self.entity_for(body)?;
        let (transform, position, rotation, _) = self.bodies.get(entity).ok()?;
        Some(physics_pose(transform, position, rotation))
    }

    fn set_collision_ignored(&mut self, body: BodyHandle, ignored: bool) {
        let Some(entity) = self.entity_for(body) else {
            return;
        };
        if ignored {
            self.ignored.insert(entity);
        } else {
            self.ignored.remove(&entity);
        }
    }

    fn is_collision_ignored(&self, body: BodyHandle) -> bool {
        self.entity_for(body)
            .is_some_and(|entity| self.ignored.contains(&entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_prefers_physics_position() {
        // Propagation still holds last frame's pose
        let stale = GlobalTransform::from(Transform::from_xyz(1.0, 0.0, 0.0));
        let position = Position(Vec3::new(1.5, 0.0, 0.0));
        let rotation = Rotation(Quat::from_rotation_y(0.5));

        let pose = physics_pose(&stale, Some(&position), Some(&rotation));
        assert_eq!(pose.position, Vec3::new(1.5, 0.0, 0.0));
        assert!(pose.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-5);

        let fallback = physics_pose(&stale, None, None);
        assert_eq!(fallback.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(fallback.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_body_handle_maps_back_to_entity() {
        let mut world = World::new();
        world.spawn_empty();
        let entity = world.spawn_empty().id();

        let handle = BodyHandle::from(entity);
        assert_eq!(Entity::try_from_bits(handle.0), Some(entity));
    }
}
