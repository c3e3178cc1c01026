//! Entity positions: the external store seam and the [`Position`]
//! variants that actions and conditions refer to.
//!
//! World positions are owned by whatever renders the scene. The engine
//! reads and writes them only through [`PositionStore`].

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::entity::EntityStore;
use crate::error::{ScenarioError, ScenarioResult};

pub trait PositionStore: std::fmt::Debug {
    /// World position of `entity`, if known.
    fn position(&self, entity: &str) -> Option<Vector3<f64>>;

    fn set_position(&mut self, entity: &str, position: Vector3<f64>);
}

/// In-memory position store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionMap {
    positions: BTreeMap<String, Vector3<f64>>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl PositionStore for PositionMap {
    fn position(&self, entity: &str) -> Option<Vector3<f64>> {
        self.positions.get(entity).copied()
    }

    fn set_position(&mut self, entity: &str, position: Vector3<f64>) {
        self.positions.insert(entity.to_string(), position);
    }
}

// ---------------------------------------------------------------------------
// Position variants
// ---------------------------------------------------------------------------

/// A place in the scene, expressed in one of several reference frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Position {
    World {
        x: f64,
        y: f64,
        z: f64,
        heading: Option<f64>,
    },
    Lane {
        road_id: u32,
        lane_id: i32,
        s: f64,
        offset: f64,
    },
    /// World-frame displacement from another entity.
    RelativeObject {
        entity: String,
        dx: f64,
        dy: f64,
        dz: f64,
    },
    /// Lane-frame displacement from another entity.
    RelativeLane {
        entity: String,
        d_lane: i32,
        ds: f64,
        offset: f64,
    },
    Road {
        road_id: u32,
        s: f64,
        t: f64,
    },
    RelativeRoad {
        entity: String,
        ds: f64,
        dt: f64,
    },
    Route {
        route: String,
    },
}

impl Position {
    pub fn world(x: f64, y: f64, z: f64) -> Self {
        Position::World {
            x,
            y,
            z,
            heading: None,
        }
    }

    /// Entity this position is relative to, if any.
    pub fn reference_entity(&self) -> Option<&str> {
        match self {
            Position::RelativeObject { entity, .. }
            | Position::RelativeLane { entity, .. }
            | Position::RelativeRoad { entity, .. } => Some(entity),
            _ => None,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Position::World { .. } => "world position",
            Position::Lane { .. } => "lane position",
            Position::RelativeObject { .. } => "relative object position",
            Position::RelativeLane { .. } => "relative lane position",
            Position::Road { .. } => "road position",
            Position::RelativeRoad { .. } => "relative road position",
            Position::Route { .. } => "route position",
        }
    }

    /// Resolve to world coordinates. Only frames that do not need road
    /// geometry can be resolved.
    pub fn resolve_world(
        &self,
        entities: &EntityStore,
        positions: &dyn PositionStore,
    ) -> ScenarioResult<Vector3<f64>> {
        match self {
            Position::World { x, y, z, .. } => Ok(Vector3::new(*x, *y, *z)),
            Position::RelativeObject { entity, dx, dy, dz } => {
                let base = entity_position(entity, entities, positions)?;
                Ok(base + Vector3::new(*dx, *dy, *dz))
            }
            other => Err(ScenarioError::unsupported(format!(
                "{} in world coordinates",
                other.variant_name()
            ))),
        }
    }
}

/// World position of a known entity. Entities never placed sit at the
/// origin.
pub fn entity_position(
    entity: &str,
    entities: &EntityStore,
    positions: &dyn PositionStore,
) -> ScenarioResult<Vector3<f64>> {
    entities.require(entity)?;
    Ok(positions.position(entity).unwrap_or_else(Vector3::zeros))
}
