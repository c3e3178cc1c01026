//! Road-network query seam.
//!
//! Road geometry lives outside the engine. The only question the engine
//! asks of it is how wide a lane is at a given s-coordinate, which lane
//! changes need to size their lateral move.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{ScenarioError, ScenarioResult};

pub trait RoadNetwork: std::fmt::Debug {
    /// Width in metres of `lane_id` on `road_id` at longitudinal `s`.
    fn lane_width(&self, road_id: u32, lane_id: i32, s: f64) -> ScenarioResult<f64>;

    /// Summed width of the lanes strictly between `from` and `to`.
    fn width_between(&self, road_id: u32, from: i32, to: i32, s: f64) -> ScenarioResult<f64> {
        lanes_between(from, to)
            .map(|lane| self.lane_width(road_id, lane, s))
            .sum()
    }
}

/// Every lane of every road has the same width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRoad {
    pub width: f64,
}

impl UniformRoad {
    pub fn new(width: f64) -> Self {
        Self { width }
    }
}

impl Default for UniformRoad {
    fn default() -> Self {
        Self::new(3.5)
    }
}

impl RoadNetwork for UniformRoad {
    fn lane_width(&self, road_id: u32, lane_id: i32, _s: f64) -> ScenarioResult<f64> {
        if lane_id == 0 {
            return Err(ScenarioError::RoadQuery {
                road: road_id,
                lane: lane_id,
                reason: "centre lane has no width".into(),
            });
        }
        Ok(self.width)
    }

    fn width_between(&self, _road_id: u32, from: i32, to: i32, _s: f64) -> ScenarioResult<f64> {
        Ok(self.width * lanes_strictly_between(from, to) as f64)
    }
}

/// Explicit per-road, per-lane widths, constant along s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneWidthTable {
    widths: BTreeMap<(u32, i32), f64>,
}

impl LaneWidthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lane(mut self, road_id: u32, lane_id: i32, width: f64) -> Self {
        self.widths.insert((road_id, lane_id), width);
        self
    }

    pub fn set(&mut self, road_id: u32, lane_id: i32, width: f64) {
        self.widths.insert((road_id, lane_id), width);
    }
}

impl RoadNetwork for LaneWidthTable {
    fn lane_width(&self, road_id: u32, lane_id: i32, _s: f64) -> ScenarioResult<f64> {
        self.widths
            .get(&(road_id, lane_id))
            .copied()
            .ok_or_else(|| ScenarioError::RoadQuery {
                road: road_id,
                lane: lane_id,
                reason: "lane not in width table".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Lane arithmetic
// ---------------------------------------------------------------------------

/// Offset a lane id by `delta` lanes, stepping over the centre lane 0.
/// Fails with `LaneOutOfRange` when the result does not fit an `i32`.
///
/// `lane_add(-1, 1) == Ok(1)`, `lane_add(2, -2) == Ok(-1)`.
pub fn lane_add(lane: i32, delta: i32) -> ScenarioResult<i32> {
    if delta == 0 {
        return Ok(lane);
    }
    // Close the gap at 0: lanes -2, -1, 1, 2 become -2, -1, 0, 1.
    let index = match lane.cmp(&0) {
        Ordering::Less => i64::from(lane),
        Ordering::Greater => i64::from(lane) - 1,
        // The centre lane sits between -1 and 1.
        Ordering::Equal if delta > 0 => -1,
        Ordering::Equal => 0,
    };
    let moved = index + i64::from(delta);
    let result = if moved < 0 { moved } else { moved + 1 };
    i32::try_from(result).map_err(|_| ScenarioError::LaneOutOfRange { lane, delta })
}

/// Lanes strictly between `from` and `to`, centre lane excluded, in
/// travel order.
pub fn lanes_between(from: i32, to: i32) -> Box<dyn Iterator<Item = i32>> {
    let (lo, hi) = (i64::from(from.min(to)), i64::from(from.max(to)));
    // Every value lies strictly inside [lo, hi], so the cast is lossless.
    let lanes = (lo + 1..hi).filter(|&lane| lane != 0).map(|lane| lane as i32);
    if to >= from {
        Box::new(lanes)
    } else {
        Box::new(lanes.rev())
    }
}

/// How many lanes `lanes_between` yields, without walking them.
pub fn lanes_strictly_between(from: i32, to: i32) -> u64 {
    let (lo, hi) = (i64::from(from.min(to)), i64::from(from.max(to)));
    let span = (hi - lo - 1).max(0);
    let skips_centre = lo < 0 && hi > 0;
    (span - i64::from(skips_centre)) as u64
}
