//! Per-tick entity movement outside of storyboard actions.
//!
//! Actions set targets (`max_speed`, lane, offset); the movement model is
//! what actually moves entities forward between ticks.

use nalgebra::Vector3;

use crate::entity::EntityStore;
use crate::position::PositionStore;

pub trait MovementModel: std::fmt::Debug {
    /// Move every entity forward by `dt` seconds.
    fn step(&mut self, entities: &mut EntityStore, positions: &mut dyn PositionStore, dt: f64);
}

/// Speed snaps to `max_speed`; entities travel straight along their
/// heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct KinematicMovement;

impl MovementModel for KinematicMovement {
    fn step(&mut self, entities: &mut EntityStore, positions: &mut dyn PositionStore, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let ids = entities.ids().to_vec();
        for id in ids {
            let Some(entity) = entities.get_by_id_mut(id) else {
                continue;
            };
            if !entity.enabled {
                continue;
            }
            entity.speed = entity.max_speed;
            // A trajectory action owns position while it runs.
            if entity.trajectory_active {
                continue;
            }
            let ds = entity.speed * dt;
            entity.s += ds;
            entity.distance_travelled += ds.abs();
            let current = positions.position(entity.name()).unwrap_or_else(Vector3::zeros);
            let heading = Vector3::new(entity.heading.cos(), entity.heading.sin(), 0.0);
            positions.set_position(entity.name(), current + heading * ds);
        }
    }
}

/// Movement model that leaves every entity where it is. Useful when an
/// external controller drives entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMovement;

impl MovementModel for StaticMovement {
    fn step(&mut self, _: &mut EntityStore, _: &mut dyn PositionStore, _: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::position::PositionMap;
    use approx::assert_relative_eq;

    fn store_with(entity: Entity) -> EntityStore {
        let mut store = EntityStore::new();
        store.insert(entity);
        store
    }

    #[test]
    fn moves_along_heading() {
        let mut entity = Entity::new("Ego").with_speed(10.0);
        entity.heading = std::f64::consts::FRAC_PI_2;
        let mut store = store_with(entity);
        let mut positions = PositionMap::new();
        KinematicMovement.step(&mut store, &mut positions, 0.5);

        let ego = store.get("Ego").unwrap();
        assert_relative_eq!(ego.distance_travelled, 5.0);
        assert_relative_eq!(ego.s, 5.0);
        let p = positions.position("Ego").unwrap();
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn speed_follows_max_speed() {
        let mut store = store_with(Entity::new("Ego").with_speed(10.0));
        store.get_mut("Ego").unwrap().max_speed = 4.0;
        let mut positions = PositionMap::new();
        KinematicMovement.step(&mut store, &mut positions, 1.0);
        let ego = store.get("Ego").unwrap();
        assert_eq!(ego.speed, 4.0);
        assert_relative_eq!(ego.distance_travelled, 4.0);
    }

    #[test]
    fn disabled_entities_stay_put() {
        let mut store = store_with(Entity::new("Ego").with_speed(10.0));
        store.get_mut("Ego").unwrap().enabled = false;
        let mut positions = PositionMap::new();
        KinematicMovement.step(&mut store, &mut positions, 1.0);
        assert_eq!(store.get("Ego").unwrap().distance_travelled, 0.0);
        assert!(positions.position("Ego").is_none());
    }

    #[test]
    fn static_movement_does_nothing() {
        let mut store = store_with(Entity::new("Ego").with_speed(10.0));
        let mut positions = PositionMap::new();
        StaticMovement.step(&mut store, &mut positions, 1.0);
        assert_eq!(store.get("Ego").unwrap().distance_travelled, 0.0);
    }
}
