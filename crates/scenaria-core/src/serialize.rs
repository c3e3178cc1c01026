//! Binary snapshots of a scenario.
//!
//! A snapshot captures the full [`Scenario`] (definition plus run state)
//! with `bitcode`, behind a versioned header. Engine snapshots add a frame
//! holding the clock position, the `advance` accumulator and the entity
//! positions, so restoring one rewinds the run exactly. Road, movement
//! model, command handlers and listeners are never part of it.

use serde::{Deserialize, Serialize};

use crate::clock::{ClockCheckpoint, Fixed64, Ticks};
use crate::engine::ScenarioEngine;
use crate::scenario::Scenario;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a scenario snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5CE7_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("data too short for snapshot header")]
    TooShort,
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Clock tick at the time the snapshot was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Engine state kept outside the scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EngineFrame {
    pub(crate) clock: ClockCheckpoint,
    pub(crate) accumulator: Fixed64,
    pub(crate) positions: Vec<(String, [f64; 3])>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    header: SnapshotHeader,
    scenario: &'a Scenario,
    frame: Option<EngineFrame>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    header: SnapshotHeader,
    scenario: Scenario,
    frame: Option<EngineFrame>,
}

fn decode(data: &[u8]) -> Result<SnapshotOwned, DeserializeError> {
    if data.is_empty() {
        return Err(DeserializeError::TooShort);
    }
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

/// Read the header without validating it. Decodes the full payload, since
/// bitcode has no partial decoding.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    Ok(decode(data)?.header)
}

// ---------------------------------------------------------------------------
// Scenario snapshot
// ---------------------------------------------------------------------------

impl Scenario {
    /// Encode the scenario, tagged with `tick`.
    pub fn snapshot(&self, tick: Ticks) -> Result<Vec<u8>, SerializeError> {
        encode(self, tick, None)
    }

    /// Decode a snapshot, checking magic and version. An engine frame, if
    /// present, is ignored.
    pub fn restore(data: &[u8]) -> Result<(Scenario, SnapshotHeader), DeserializeError> {
        let snapshot = decode(data)?;
        snapshot.header.validate()?;
        Ok((snapshot.scenario, snapshot.header))
    }
}

fn encode(
    scenario: &Scenario,
    tick: Ticks,
    frame: Option<EngineFrame>,
) -> Result<Vec<u8>, SerializeError> {
    let snapshot = SnapshotRef {
        header: SnapshotHeader::new(tick),
        scenario,
        frame,
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

impl ScenarioEngine {
    /// Snapshot the scenario together with the clock position, the
    /// accumulator and entity positions.
    pub fn snapshot(&self) -> Result<Vec<u8>, SerializeError> {
        encode(self.scenario(), self.clock().tick(), Some(self.frame()))
    }

    /// Rewind to a snapshot. Engine snapshots also restore the clock and
    /// entity positions; a bare scenario snapshot replaces the scenario
    /// only.
    pub fn restore_snapshot(&mut self, data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
        let snapshot = decode(data)?;
        snapshot.header.validate()?;
        self.replace_scenario(snapshot.scenario);
        if let Some(frame) = &snapshot.frame {
            self.apply_frame(frame);
        }
        Ok(snapshot.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entity::Entity;
    use crate::test_utils;

    fn sample() -> Scenario {
        let mut scenario = Scenario::new();
        scenario
            .add_entity(Entity::new("Ego").with_speed(10.0))
            .unwrap();
        scenario.declare_parameter("Gap", 25.0);
        scenario
            .add_story(test_utils::one_event_story("Ego", test_utils::step_speed("Go", 20.0)))
            .unwrap();
        scenario
    }

    #[test]
    fn round_trip_keeps_definition_and_run_state() {
        let mut engine = ScenarioEngine::new(sample(), EngineConfig::default());
        engine.tick(0.1).unwrap();
        let bytes = engine.snapshot().unwrap();

        let (restored, header) = Scenario::restore(&bytes).unwrap();
        assert_eq!(header.tick, 1);
        assert_eq!(restored.entity("Ego").unwrap().max_speed, 20.0);
        assert!(restored.storyboard().stories[0].is_completed());
        assert_eq!(restored.parameters().number("Gap").unwrap(), 25.0);
        let actions: Vec<_> = restored.registry().names(crate::id::NameKind::Action).collect();
        assert_eq!(actions, vec!["Go"]);
    }

    #[test]
    fn restored_engine_hashes_the_same() {
        let mut engine = ScenarioEngine::new(sample(), EngineConfig::default());
        engine.tick(0.1).unwrap();
        let bytes = engine.snapshot().unwrap();
        let before = engine.state_hash();
        engine.restore_snapshot(&bytes).unwrap();
        assert_eq!(engine.state_hash(), before);
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new(0).validate().is_ok());
        let mut h = SnapshotHeader::new(0);
        h.magic = 0xDEAD_BEEF;
        assert!(matches!(h.validate(), Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))));
        let mut h = SnapshotHeader::new(0);
        h.version = FORMAT_VERSION + 1;
        assert!(matches!(h.validate(), Err(DeserializeError::FutureVersion(_))));
        let mut h = SnapshotHeader::new(0);
        h.version = 0;
        assert!(matches!(h.validate(), Err(DeserializeError::UnsupportedVersion(0))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(Scenario::restore(&[]), Err(DeserializeError::TooShort)));
        assert!(matches!(
            Scenario::restore(&[1, 2, 3]),
            Err(DeserializeError::Decode(_))
        ));
    }

    #[test]
    fn header_can_be_read_alone() {
        let bytes = sample().snapshot(42).unwrap();
        assert_eq!(read_snapshot_header(&bytes).unwrap().tick, 42);
    }
}
