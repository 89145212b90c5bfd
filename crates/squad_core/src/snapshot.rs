//! Save documents.
//!
//! A [`Snapshot`] is the complete state of a session: every entity with
//! every component, the random cursor, the turn counter, the event log and
//! the rules in force. Restoring a snapshot and continuing produces exactly
//! the events the uninterrupted session would have produced.
//!
//! Two encodings are offered: JSON (the save document) and bincode (compact,
//! used for replays and [`Simulation::reset`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::components::EntityId;
use crate::config::RulesConfig;
use crate::data::ContentRegistry;
use crate::error::{GameError, Result};
use crate::events::{EventBus, EventLog, GameEvent};
use crate::replay::{group_by_turn, ReplayTurn};
use crate::rng::{DeterministicRng, RandomState};
use crate::simulation::{Phase, Roster, Simulation};
use crate::world::{Entity, EntityStorage};

/// Snapshot layout version this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Layout version.
    pub version: u32,
    /// Turn counter.
    pub turn: u32,
    /// Phase at save time.
    pub phase: Phase,
    /// Logical time: the number of events logged so far.
    pub timestamp: u64,
    /// Every entity, keyed by id.
    pub entities: BTreeMap<EntityId, Entity>,
    /// Next id the store will hand out.
    pub next_entity_id: EntityId,
    /// Next command declaration number.
    pub next_sequence: u64,
    /// Random cursor.
    pub random_state: RandomState,
    /// Every event resolved so far, in order.
    pub turn_log: Vec<GameEvent>,
    /// Scenario the session came from.
    #[serde(default)]
    pub scenario_id: Option<String>,
    /// Map dimensions, when pathfinding is enabled.
    #[serde(default)]
    pub map_size: Option<(f64, f64)>,
    /// The log grouped by turn, for viewers that only read saves.
    #[serde(default)]
    pub replay_turns: Vec<ReplayTurn>,
    /// Units per faction. Rebuilt from the entities when absent.
    #[serde(default)]
    pub roster: Option<Roster>,
    /// Rules in force.
    #[serde(default)]
    pub config: RulesConfig,
}

impl Snapshot {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Parse a JSON save. Only the layout is checked here; content is
    /// validated by [`Simulation::restore`].
    pub fn from_json(source: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(source).map_err(|e| GameError::Serialization(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Parse the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| GameError::Serialization(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<()> {
        if self.version == SNAPSHOT_VERSION {
            Ok(())
        } else {
            Err(GameError::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            })
        }
    }
}

impl Simulation {
    /// Capture the full session state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            turn: self.turn,
            phase: self.phase,
            timestamp: self.log.len() as u64,
            entities: self.entities.as_map().clone(),
            next_entity_id: self.entities.next_id(),
            next_sequence: self.next_sequence,
            random_state: self.rng.state(),
            turn_log: self.log.events().to_vec(),
            scenario_id: self.scenario_id.clone(),
            map_size: self.map_size,
            replay_turns: group_by_turn(self.log.events()),
            roster: Some(self.roster()),
            config: self.config.clone(),
        }
    }

    /// Rebuild a session from a snapshot.
    ///
    /// The event log is carried over as stored, not re-executed. When a
    /// registry is given, every unit's template must exist in it.
    ///
    /// # Errors
    ///
    /// Fails on a version mismatch, an entity stored under the wrong id,
    /// health that contradicts its wound state, a unit without a faction,
    /// an unknown template, or invalid rules.
    pub fn restore(snapshot: Snapshot, registry: Option<&ContentRegistry>) -> Result<Self> {
        snapshot.check_version()?;
        snapshot.config.validate()?;

        for (&id, entity) in &snapshot.entities {
            if entity.id != id {
                return Err(GameError::CorruptSnapshot(format!(
                    "entity stored under {id} claims id {}",
                    entity.id
                )));
            }
            if entity.health.is_some_and(|h| !h.is_consistent()) {
                return Err(GameError::CorruptSnapshot(format!(
                    "entity {id} has a wound state that does not match its health"
                )));
            }
            if entity.is_unit() && entity.faction.is_none() {
                return Err(GameError::CorruptSnapshot(format!(
                    "unit {id} has no faction"
                )));
            }
            if let (Some(registry), Some(info)) = (registry, entity.unit.as_ref()) {
                registry.unit(&info.template)?;
            }
        }

        let entities = EntityStorage::from_parts(snapshot.entities, snapshot.next_entity_id);
        let mut sim = Self {
            turn: snapshot.turn,
            phase: snapshot.phase,
            entities,
            rng: DeterministicRng::from_state(snapshot.random_state),
            log: EventLog::from_events(snapshot.turn_log),
            bus: EventBus::new(),
            config: snapshot.config,
            scenario_id: snapshot.scenario_id,
            map_size: snapshot.map_size,
            next_sequence: snapshot.next_sequence,
            exerted: std::collections::BTreeSet::new(),
            initial_state: None,
        };

        let roster = sim.roster();
        match snapshot.roster {
            None => warn!("snapshot has no roster; rebuilt from entities"),
            Some(stored) if stored != roster => {
                warn!("snapshot roster disagrees with entities; rebuilt from entities");
            }
            Some(_) => {}
        }
        // never hand out a declaration number already in a queue
        let highest = sim
            .queued_orders()
            .last()
            .map_or(0, |(_, queued)| queued.sequence + 1);
        sim.next_sequence = sim.next_sequence.max(highest);

        debug!(
            turn = sim.turn,
            phase = %sim.phase,
            entities = sim.entities.len(),
            state_hash = sim.state_hash(),
            "session restored"
        );
        Ok(sim)
    }
}
