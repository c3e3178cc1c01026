//! Scenario entities and the insertion-ordered store that owns them.
//!
//! An entity's 3D position is not stored here: it belongs to the external
//! [`PositionStore`](crate::position::PositionStore). Everything the engine
//! itself drives (speed, lane, s-coordinate, distance travelled) lives on
//! [`Entity`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::action::Action;
use crate::error::{ScenarioError, ScenarioResult};
use crate::id::EntityId;

/// Broad class of traffic participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityCategory {
    #[default]
    Vehicle,
    Pedestrian,
    MiscObject,
}

/// A simulated traffic participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    name: String,
    pub category: EntityCategory,
    /// Current speed in m/s.
    pub speed: f64,
    /// Speed the movement model drives toward. Speed actions ramp this.
    pub max_speed: f64,
    pub road_id: u32,
    /// OpenDRIVE-style lane id: negative to the right of the centre lane,
    /// positive to the left, never 0 for a drivable lane.
    pub lane_id: i32,
    /// Lateral offset from the lane centre, positive to the left.
    pub lane_offset: f64,
    /// Longitudinal road coordinate.
    pub s: f64,
    /// Heading in radians, world frame.
    pub heading: f64,
    pub distance_travelled: f64,
    pub enabled: bool,
    /// Set while a follow-trajectory action steers this entity; the
    /// movement model leaves position and distance alone meanwhile.
    pub trajectory_active: bool,
    /// One-shot actions run when the simulation starts.
    pub init_actions: Vec<Action>,
    /// Kinematics restored by `reset`.
    baseline: Kinematics,
}

/// The part of an entity's state that a run changes and a reset restores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
struct Kinematics {
    speed: f64,
    max_speed: f64,
    road_id: u32,
    lane_id: i32,
    lane_offset: f64,
    s: f64,
    heading: f64,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: EntityCategory::Vehicle,
            speed: 0.0,
            max_speed: 0.0,
            road_id: 0,
            lane_id: -1,
            lane_offset: 0.0,
            s: 0.0,
            heading: 0.0,
            distance_travelled: 0.0,
            enabled: true,
            trajectory_active: false,
            init_actions: Vec::new(),
            baseline: Kinematics {
                lane_id: -1,
                ..Kinematics::default()
            },
        }
    }

    /// Entity names are immutable after creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self.max_speed = speed;
        self
    }

    pub fn with_lane(mut self, road_id: u32, lane_id: i32, s: f64) -> Self {
        self.road_id = road_id;
        self.lane_id = lane_id;
        self.s = s;
        self
    }

    pub fn with_init_action(mut self, action: Action) -> Self {
        self.init_actions.push(action);
        self
    }

    /// Record the current speed, lane and road coordinates as the state a
    /// reset returns to. Called when the entity is added to a store; call
    /// again after editing those fields by hand before a run.
    pub fn capture_baseline(&mut self) {
        self.baseline = Kinematics {
            speed: self.speed,
            max_speed: self.max_speed,
            road_id: self.road_id,
            lane_id: self.lane_id,
            lane_offset: self.lane_offset,
            s: self.s,
            heading: self.heading,
        };
    }

    /// Restore transient run state: baseline kinematics, re-enable, reset
    /// init actions, zero the distance travelled.
    pub fn reset(&mut self) {
        let b = self.baseline;
        self.speed = b.speed;
        self.max_speed = b.max_speed;
        self.road_id = b.road_id;
        self.lane_id = b.lane_id;
        self.lane_offset = b.lane_offset;
        self.s = b.s;
        self.heading = b.heading;
        self.enabled = true;
        self.trajectory_active = false;
        self.distance_travelled = 0.0;
        for action in &mut self.init_actions {
            action.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Owns all entities. Iteration follows insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    entities: SlotMap<EntityId, Entity>,
    by_name: HashMap<String, EntityId>,
    order: Vec<EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. Name uniqueness is the registry's job; inserting a
    /// duplicate name here replaces the index entry.
    /// Insert `entity`, taking its current kinematics as its reset
    /// baseline.
    pub(crate) fn insert(&mut self, mut entity: Entity) -> EntityId {
        entity.capture_baseline();
        let name = entity.name.clone();
        let id = self.entities.insert(entity);
        self.by_name.insert(name, id);
        self.order.push(id);
        id
    }

    pub fn id(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.id(name).and_then(|id| self.entities.get(id))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        let id = self.id(name)?;
        self.entities.get_mut(id)
    }

    pub fn get_by_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Like [`get`](Self::get) but fails with `EntityNotFound`.
    pub fn require(&self, name: &str) -> ScenarioResult<&Entity> {
        self.get(name)
            .ok_or_else(|| ScenarioError::EntityNotFound(name.to_string()))
    }

    /// Like [`get_mut`](Self::get_mut) but fails with `EntityNotFound`.
    pub fn require_mut(&mut self, name: &str) -> ScenarioResult<&mut Entity> {
        self.get_mut(name)
            .ok_or_else(|| ScenarioError::EntityNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Entity ids in insertion order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(*id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.by_name.clear();
        self.order.clear();
    }

    /// Reset every entity's transient state.
    pub fn reset(&mut self) {
        for (_, entity) in self.entities.iter_mut() {
            entity.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_follows_insertion_order() {
        let mut store = EntityStore::new();
        for name in ["Zed", "Ego", "Lead", "Alpha"] {
            store.insert(Entity::new(name));
        }
        let names: Vec<&str> = store.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Zed", "Ego", "Lead", "Alpha"]);
    }

    #[test]
    fn require_reports_missing_entity() {
        let store = EntityStore::new();
        assert_eq!(
            store.require("Ghost").unwrap_err(),
            ScenarioError::EntityNotFound("Ghost".into())
        );
    }

    #[test]
    fn lookup_by_name_and_id_agree() {
        let mut store = EntityStore::new();
        let id = store.insert(Entity::new("Ego").with_speed(12.0));
        assert_eq!(store.id("Ego"), Some(id));
        assert_eq!(store.get_by_id(id).unwrap().speed, 12.0);
        store.require_mut("Ego").unwrap().speed = 3.0;
        assert_eq!(store.get("Ego").unwrap().speed, 3.0);
    }

    #[test]
    fn reset_restores_transient_state_only() {
        let mut store = EntityStore::new();
        store.insert(Entity::new("Ego").with_speed(10.0));
        {
            let ego = store.get_mut("Ego").unwrap();
            ego.enabled = false;
            ego.distance_travelled = 55.0;
            ego.trajectory_active = true;
        }
        store.reset();
        let ego = store.get("Ego").unwrap();
        assert!(ego.enabled);
        assert!(!ego.trajectory_active);
        assert_eq!(ego.distance_travelled, 0.0);
        assert_eq!(ego.speed, 10.0);
    }

    #[test]
    fn reset_returns_to_captured_kinematics() {
        let mut ego = Entity::new("Ego").with_speed(10.0).with_lane(2, -2, 30.0);
        ego.capture_baseline();
        ego.speed = 19.5;
        ego.max_speed = 20.0;
        ego.lane_id = 1;
        ego.lane_offset = 0.4;
        ego.s = 88.0;
        ego.heading = 1.2;
        ego.reset();
        assert_eq!(ego.speed, 10.0);
        assert_eq!(ego.max_speed, 10.0);
        assert_eq!(ego.road_id, 2);
        assert_eq!(ego.lane_id, -2);
        assert_eq!(ego.lane_offset, 0.0);
        assert_eq!(ego.s, 30.0);
        assert_eq!(ego.heading, 0.0);
    }
}
