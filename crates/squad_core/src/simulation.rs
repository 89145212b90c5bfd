//! Resolution session: phases, command scheduling and turn resolution.
//!
//! A [`Simulation`] owns everything one battle needs: the entity store, the
//! random source, the event log, the rules constants and the turn/phase
//! state. Nothing is global, so independent sessions can run side by side.
//!
//! # Turn structure
//!
//! 1. **Planning**: commands are enqueued into per-unit queues. Enqueue
//!    fixes each command's AP cost, priority and declaration sequence.
//! 2. **Resolution**: every queued command of every unit is gathered and
//!    executed in one global order, priority ascending with declaration
//!    order breaking ties. Preconditions are re-checked just before each
//!    command runs.
//! 3. End of resolution: bleeding, stamina recovery, stance and overwatch
//!    clearing, AP refill, and the turn counter advances.
//!
//! # Example
//!
//! ```
//! use squad_core::prelude::*;
//!
//! let registry = ContentRegistry::builtin();
//! let mut sim = Simulation::new(42);
//! let hero = sim
//!     .spawn_unit(&registry, "swordsman", Faction::Player, Position::new(Vec2::ZERO), 0)
//!     .unwrap();
//!
//! let step = Command::move_to(Vec2::new(1.0, 0.0), MovementMode::Walk);
//! assert!(sim.enqueue(hero, step).unwrap());
//!
//! sim.end_planning_phase().unwrap();
//! sim.resolve_phase().unwrap();
//! assert_eq!(sim.turn(), 2);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::combat::{attack_reach, AttackOrigin};
use crate::commands::{
    Command, CommandKind, CommandQueue, Precondition, QueuedCommand, AIM_AP_COST, DEFEND_AP_COST,
    RELOAD_AP_COST,
};
use crate::components::{
    AimState, BodyLocation, DefensiveStance, Engagement, EntityId, MoraleStatus, MovementMode, Overwatch,
    Position,
};
use crate::config::RulesConfig;
use crate::data::ContentRegistry;
use crate::error::{GameError, Result};
use crate::events::{EventBus, EventLog, GameEvent, GameEventKind, GameEventType, SubscriptionId};
use crate::factions::Faction;
use crate::math::{normalize_angle, Vec2};
use crate::movement::{
    compute_engagements, effective_mode, mode_distance, move_ap_cost, plan_move,
    terrain_multiplier, turn_cost, MoveRequest,
};
use crate::rng::{DeterministicRng, RandomState};
use crate::scenario::Scenario;
use crate::snapshot::Snapshot;
use crate::world::{Entity, EntityStorage};

/// Session phase.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Phase {
    /// Commands may be queued and removed.
    #[default]
    Planning,
    /// Commands execute and dice are rolled.
    Resolution,
}

/// Units per faction, rebuilt from the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Player unit ids, ascending.
    pub player: Vec<EntityId>,
    /// Enemy unit ids, ascending.
    pub enemy: Vec<EntityId>,
}

impl Roster {
    /// Units of `faction`.
    #[must_use]
    pub fn units(&self, faction: Faction) -> &[EntityId] {
        match faction {
            Faction::Player => &self.player,
            Faction::Enemy => &self.enemy,
        }
    }
}

/// One battle: entity store, random source, event log and turn state.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) turn: u32,
    pub(crate) phase: Phase,
    pub(crate) entities: EntityStorage,
    pub(crate) rng: DeterministicRng,
    pub(crate) log: EventLog,
    pub(crate) bus: EventBus,
    pub(crate) config: RulesConfig,
    pub(crate) scenario_id: Option<String>,
    pub(crate) map_size: Option<(f64, f64)>,
    pub(crate) next_sequence: u64,
    /// Units that drained stamina during the current pass.
    pub(crate) exerted: BTreeSet<EntityId>,
    /// Encoded snapshot [`reset`](Self::reset) returns to.
    pub(crate) initial_state: Option<Vec<u8>>,
}

impl Simulation {
    /// Empty session on turn 1, planning, with the standard rules.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, RulesConfig::default())
    }

    /// Empty session with custom rules.
    #[must_use]
    pub fn with_config(seed: u64, config: RulesConfig) -> Self {
        Self {
            turn: 1,
            phase: Phase::Planning,
            entities: EntityStorage::new(),
            rng: DeterministicRng::new(seed),
            log: EventLog::new(),
            bus: EventBus::new(),
            config,
            scenario_id: None,
            map_size: None,
            next_sequence: 0,
            exerted: BTreeSet::new(),
            initial_state: None,
        }
    }

    /// Build a session from a scenario.
    ///
    /// Units are spawned first, in placement order, then obstacles. The
    /// resulting state is remembered for [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Fails on unknown templates or obstacle types and on non-finite
    /// coordinates.
    pub fn from_scenario(scenario: &Scenario, registry: &ContentRegistry) -> Result<Self> {
        let config = scenario.rules.clone().unwrap_or_default();
        config.validate()?;
        let mut sim = Self::with_config(scenario.seed, config);
        sim.scenario_id = Some(scenario.id.clone());
        sim.map_size = Some(scenario.map_size);

        for placement in &scenario.units {
            let at = Vec2::new(placement.x, placement.z);
            if !at.is_finite() {
                return Err(GameError::InvalidState(format!(
                    "unit placement '{}' has non-finite coordinates",
                    placement.template
                )));
            }
            let position = Position {
                value: at,
                facing: placement.facing.unwrap_or(0.0),
                elevation: placement.elevation,
            };
            sim.spawn_unit(
                registry,
                &placement.template,
                placement.faction,
                position,
                placement.experience_bonus,
            )?;
        }
        for placement in &scenario.obstacles {
            sim.spawn_obstacle(
                registry,
                &placement.kind,
                Vec2::new(placement.x, placement.z),
                placement.rotation.unwrap_or(0.0),
                placement.scale.unwrap_or(1.0),
                placement.length,
            )?;
        }

        debug!(
            scenario = %scenario.id,
            units = scenario.units.len(),
            obstacles = scenario.obstacles.len(),
            "scenario loaded"
        );
        sim.mark_initial_state()?;
        Ok(sim)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current turn, starting at 1.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The entity store.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// One entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Rules in force.
    #[must_use]
    pub const fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Random source cursor.
    #[must_use]
    pub const fn random_state(&self) -> RandomState {
        self.rng.state()
    }

    /// Everything resolved so far.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Scenario this session was built from.
    #[must_use]
    pub fn scenario_id(&self) -> Option<&str> {
        self.scenario_id.as_deref()
    }

    /// Map dimensions, when pathfinding is enabled.
    #[must_use]
    pub const fn map_size(&self) -> Option<(f64, f64)> {
        self.map_size
    }

    /// Enable pathfinding on a `width x height` map centred on the origin.
    pub fn set_map_size(&mut self, map_size: Option<(f64, f64)>) {
        self.map_size = map_size;
    }

    /// Units per faction, from the entity store.
    #[must_use]
    pub fn roster(&self) -> Roster {
        let mut roster = Roster::default();
        for (&id, entity) in self.entities.iter().filter(|(_, e)| e.is_unit()) {
            match entity.faction {
                Some(Faction::Player) => roster.player.push(id),
                Some(Faction::Enemy) => roster.enemy.push(id),
                None => {}
            }
        }
        roster
    }

    /// Live units of `faction`.
    #[must_use]
    pub fn live_units(&self, faction: Faction) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.is_alive_unit() && e.faction == Some(faction))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Call `callback` for each future event of `event_type`.
    pub fn subscribe<F>(&mut self, event_type: GameEventType, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.bus.subscribe(event_type, callback)
    }

    /// Call `callback` for every future event.
    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.bus.subscribe_all(callback)
    }

    /// Drop a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Insert a prepared entity and return its id.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.entities.insert(entity)
    }

    /// Spawn a unit from a registry template.
    ///
    /// # Errors
    ///
    /// Fails if the template or its weapon is unknown.
    pub fn spawn_unit(
        &mut self,
        registry: &ContentRegistry,
        template: &str,
        faction: Faction,
        position: Position,
        experience_bonus: u32,
    ) -> Result<EntityId> {
        let entity = registry.unit_entity(template, faction, position, experience_bonus)?;
        let id = self.spawn(entity);
        trace!(id, template, %faction, "unit spawned");
        Ok(id)
    }

    /// Spawn an obstacle from the registry's obstacle table.
    ///
    /// # Errors
    ///
    /// Fails if the obstacle type is unknown.
    pub fn spawn_obstacle(
        &mut self,
        registry: &ContentRegistry,
        kind: &str,
        at: Vec2,
        rotation: f64,
        scale: f64,
        length: Option<f64>,
    ) -> Result<EntityId> {
        let entity = registry.obstacle_entity(kind, at, rotation, scale, length)?;
        Ok(self.spawn(entity))
    }

    /// Remember the current state for [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Fails if the state cannot be encoded.
    pub fn mark_initial_state(&mut self) -> Result<()> {
        self.initial_state = Some(self.snapshot().to_bytes()?);
        Ok(())
    }

    /// Encoded state captured by [`mark_initial_state`](Self::mark_initial_state).
    #[must_use]
    pub fn initial_state(&self) -> Option<&[u8]> {
        self.initial_state.as_deref()
    }

    /// Return to the remembered initial state. Subscriptions are kept.
    ///
    /// # Errors
    ///
    /// Fails if no initial state was recorded.
    pub fn reset(&mut self) -> Result<()> {
        let bytes = self
            .initial_state
            .clone()
            .ok_or_else(|| GameError::InvalidState("no initial state recorded".into()))?;
        let bus = std::mem::take(&mut self.bus);
        let mut restored = Self::restore(Snapshot::from_bytes(&bytes)?, None)?;
        restored.bus = bus;
        restored.initial_state = Some(bytes);
        *self = restored;
        debug!("session reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    /// Queue `command` for `unit`.
    ///
    /// Returns `Ok(false)` when the command is rejected: the unit is down,
    /// its queue is full, the command cannot be costed (no weapon, missing
    /// target, nothing to reload) or the queue would cost more than the
    /// unit's AP max.
    ///
    /// # Errors
    ///
    /// Fails outside planning, or if `unit` is missing or not a unit.
    pub fn enqueue(&mut self, unit: EntityId, command: Command) -> Result<bool> {
        self.require_phase(Phase::Planning)?;
        let entity = self.unit(unit)?;
        if !entity.is_alive_unit() {
            trace!(unit, "enqueue rejected: unit is down");
            return Ok(false);
        }
        let queue = entity.command_queue.clone().unwrap_or_default();
        if queue.len() >= self.config.max_queue_len {
            trace!(unit, "enqueue rejected: queue full");
            return Ok(false);
        }
        let max_ap = entity.action_points.map_or(0, |ap| ap.max);
        let budget = max_ap.saturating_sub(queue.total_ap());
        let Some(ap_cost) = self.estimate_ap_cost(entity, &command.kind, budget) else {
            trace!(unit, command = command.kind.label(), "enqueue rejected: cannot cost");
            return Ok(false);
        };
        if queue.total_ap() + ap_cost > max_ap {
            trace!(unit, ap_cost, budget, "enqueue rejected: over AP budget");
            return Ok(false);
        }

        let priority = command.priority.unwrap_or_else(|| {
            let speed = command
                .kind
                .default_priority(entity.weapon.as_ref().map(|w| w.speed));
            match queue.movement_priority() {
                Some(moving) if command.kind.follows_movement() => speed.max(moving),
                _ => speed,
            }
        });
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let kind = command.kind.clone();
        let queued = QueuedCommand {
            command,
            ap_cost,
            priority,
            sequence,
        };
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.command_queue = Some(queue.with_command(queued));
        }
        self.emit(
            Some(unit),
            kind.target_unit(),
            GameEventKind::CommandQueued {
                command: kind,
                ap_cost,
                priority,
            },
        );
        Ok(true)
    }

    /// Remove the queued command at `index`. Returns `Ok(false)` if there
    /// is no such command.
    ///
    /// # Errors
    ///
    /// Fails outside planning, or if `unit` is missing or not a unit.
    pub fn remove_command(&mut self, unit: EntityId, index: usize) -> Result<bool> {
        self.require_phase(Phase::Planning)?;
        let trimmed = self
            .unit(unit)?
            .command_queue
            .as_ref()
            .and_then(|q| q.without(index));
        match (trimmed, self.entities.get_mut(unit)) {
            (Some(queue), Some(entity)) => {
                entity.command_queue = Some(queue);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drop every queued command of `unit`.
    ///
    /// # Errors
    ///
    /// Fails outside planning, or if `unit` is missing or not a unit.
    pub fn clear_queue(&mut self, unit: EntityId) -> Result<()> {
        self.require_phase(Phase::Planning)?;
        self.unit(unit)?;
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.command_queue = Some(CommandQueue::new());
        }
        Ok(())
    }

    /// Every queued command with its owner, in declaration order.
    #[must_use]
    pub fn queued_orders(&self) -> Vec<(EntityId, QueuedCommand)> {
        let mut orders: Vec<(EntityId, QueuedCommand)> = self
            .entities
            .iter()
            .filter_map(|(&id, e)| Some((id, e.command_queue.as_ref()?)))
            .flat_map(|(id, q)| q.commands.iter().cloned().map(move |c| (id, c)))
            .collect();
        orders.sort_by_key(|(_, c)| c.sequence);
        orders
    }

    /// Put previously costed orders straight into the queues, bypassing
    /// the enqueue checks. Used to re-run recorded turns.
    ///
    /// # Errors
    ///
    /// Fails outside planning or if an owner is missing.
    pub fn load_orders(&mut self, orders: &[(EntityId, QueuedCommand)]) -> Result<()> {
        self.require_phase(Phase::Planning)?;
        for (unit, queued) in orders {
            self.unit(*unit)?;
            if let Some(entity) = self.entities.get_mut(*unit) {
                let queue = entity.command_queue.clone().unwrap_or_default();
                entity.command_queue = Some(queue.with_command(queued.clone()));
            }
            self.next_sequence = self.next_sequence.max(queued.sequence + 1);
            self.emit(
                Some(*unit),
                queued.command.kind.target_unit(),
                GameEventKind::CommandQueued {
                    command: queued.command.kind.clone(),
                    ap_cost: queued.ap_cost,
                    priority: queued.priority,
                },
            );
        }
        Ok(())
    }

    /// True when every live player unit is watching or has an overwatch
    /// order queued, so the driver may advance without waiting for input.
    /// False when the player has no live units.
    #[must_use]
    pub fn are_all_player_units_on_overwatch(&self) -> bool {
        let mut players = self
            .entities
            .iter()
            .filter(|(_, e)| e.is_alive_unit() && e.faction == Some(Faction::Player))
            .peekable();
        if players.peek().is_none() {
            return false;
        }
        players.all(|(_, e)| {
            e.overwatch.is_some_and(|o| !o.triggered)
                || e.command_queue.as_ref().is_some_and(|q| {
                    q.commands
                        .iter()
                        .any(|c| matches!(c.command.kind, CommandKind::Overwatch { .. }))
                })
        })
    }

    // ------------------------------------------------------------------
    // Turn control
    // ------------------------------------------------------------------

    /// Leave planning and enter resolution.
    ///
    /// # Errors
    ///
    /// Fails unless the session is planning.
    pub fn end_planning_phase(&mut self) -> Result<()> {
        self.require_phase(Phase::Planning)?;
        self.set_phase(Phase::Resolution);
        Ok(())
    }

    /// Execute every queued command, finish the turn and return to
    /// planning. Returns the events of this pass.
    ///
    /// # Errors
    ///
    /// Fails unless the session is resolving.
    pub fn resolve_phase(&mut self) -> Result<Vec<GameEvent>> {
        self.require_phase(Phase::Resolution)?;
        let cursor = self.log.cursor();
        self.exerted.clear();

        let schedule = self.take_schedule();
        debug!(turn = self.turn, commands = schedule.len(), "resolving turn");
        self.refresh_engagements();
        for (unit, queued) in &schedule {
            self.execute(*unit, queued);
        }
        self.finish_turn();

        Ok(self.log.since(cursor).to_vec())
    }

    /// End planning and resolve in one step.
    ///
    /// # Errors
    ///
    /// Fails unless the session is planning.
    pub fn advance(&mut self) -> Result<Vec<GameEvent>> {
        self.end_planning_phase()?;
        self.resolve_phase()
    }

    fn require_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                expected: expected.to_string(),
                actual: self.phase.to_string(),
            })
        }
    }

    fn set_phase(&mut self, to: Phase) {
        let from = self.phase;
        self.phase = to;
        debug!(turn = self.turn, %from, %to, "phase changed");
        self.emit(None, None, GameEventKind::PhaseChanged { from, to });
    }

    fn unit(&self, id: EntityId) -> Result<&Entity> {
        let entity = self.entities.get(id).ok_or(GameError::EntityNotFound(id))?;
        if entity.is_unit() {
            Ok(entity)
        } else {
            Err(GameError::NotAUnit(id))
        }
    }

    /// Append an event and hand it to subscribers.
    pub(crate) fn emit(
        &mut self,
        actor: Option<EntityId>,
        target: Option<EntityId>,
        kind: GameEventKind,
    ) {
        let event = self.log.append(self.turn, actor, target, kind);
        self.bus.publish(event);
    }

    // ------------------------------------------------------------------
    // Costing
    // ------------------------------------------------------------------

    fn estimate_ap_cost(&self, entity: &Entity, kind: &CommandKind, budget: u32) -> Option<u32> {
        let from = entity.position?;
        match kind {
            CommandKind::Move { target, mode } => {
                if !target.is_finite() {
                    return None;
                }
                self.estimate_move_cost(entity, from.value, *target, *mode, 0.0, budget)
            }
            CommandKind::MoveAdjacent { target, mode } => {
                if *target == entity.id {
                    return None;
                }
                let goal = self
                    .entities
                    .get(*target)
                    .filter(|e| e.is_alive_unit())?
                    .position?
                    .value;
                let gap = self.config.unit_separation;
                self.estimate_move_cost(entity, from.value, goal, *mode, gap, budget)
            }
            CommandKind::Attack { target, .. } => {
                if *target == entity.id || !self.entities.get(*target)?.is_unit() {
                    return None;
                }
                Some(entity.weapon.as_ref()?.ap_cost)
            }
            CommandKind::Overwatch { direction, arc } => {
                if direction.is_some_and(|d| !d.is_finite())
                    || arc.is_some_and(|a| !(a.is_finite() && a > 0.0))
                {
                    return None;
                }
                Some(entity.weapon.as_ref()?.ap_cost)
            }
            CommandKind::Defend { .. } => Some(DEFEND_AP_COST),
            CommandKind::Aim { .. } => Some(AIM_AP_COST),
            CommandKind::Turn { facing } => facing
                .is_finite()
                .then(|| turn_cost(from.facing, *facing, &self.config)),
            CommandKind::Reload => entity
                .ammo
                .as_ref()
                .filter(|a| !a.slots.is_empty())
                .map(|_| RELOAD_AP_COST),
        }
    }

    /// Straight-line estimate; the actual cost is recomputed at execution.
    fn estimate_move_cost(
        &self,
        entity: &Entity,
        from: Vec2,
        to: Vec2,
        mode: MovementMode,
        stop_short: f64,
        budget: u32,
    ) -> Option<u32> {
        let mode = effective_mode(entity, mode);
        match mode {
            MovementMode::Hold => Some(0),
            MovementMode::Sprint => (budget > 0).then_some(budget),
            _ => {
                let max = mode_distance(entity, mode)
                    * terrain_multiplier(&self.entities, from, to, &self.config);
                let distance = (from.distance(to) - stop_short).max(0.0).min(max);
                Some(move_ap_cost(mode, distance, max, budget))
            }
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Empty every queue into one list in execution order.
    fn take_schedule(&mut self) -> Vec<(EntityId, QueuedCommand)> {
        let mut schedule = Vec::new();
        for id in self.entities.unit_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let queue = entity.command_queue.replace(CommandQueue::new());
            schedule.extend(
                queue
                    .into_iter()
                    .flat_map(|q| q.commands)
                    .map(|c| (id, c)),
            );
        }
        // stable: equal priorities keep declaration order
        schedule.sort_by_key(|(_, c)| (c.priority, c.sequence));
        schedule
    }

    fn execute(&mut self, unit: EntityId, queued: &QueuedCommand) {
        let kind = &queued.command.kind;
        let Some(entity) = self.entities.get(unit).filter(|e| e.is_alive_unit()) else {
            trace!(unit, command = kind.label(), "skipped: unit down or gone");
            return;
        };
        let status = entity.morale.as_ref().map_or(MoraleStatus::Steady, |m| m.status);
        if status == MoraleStatus::Routed && !kind.is_movement() {
            trace!(unit, command = kind.label(), "skipped: routed");
            return;
        }
        if let Some(precondition) = queued.command.precondition {
            if !self.precondition_holds(unit, precondition) {
                trace!(unit, command = kind.label(), ?precondition, "skipped: precondition");
                return;
            }
        }
        trace!(unit, command = kind.label(), priority = queued.priority, "executing");

        match kind {
            CommandKind::Move { target, mode } => self.execute_move(
                unit,
                MoveRequest {
                    target: *target,
                    mode: *mode,
                    approach: None,
                },
            ),
            CommandKind::MoveAdjacent { target, mode } => {
                if self.entities.get(*target).is_some_and(Entity::is_alive_unit) {
                    self.execute_move(
                        unit,
                        MoveRequest {
                            target: Vec2::ZERO,
                            mode: *mode,
                            approach: Some(*target),
                        },
                    );
                }
            }
            CommandKind::Attack {
                target,
                aimed_location,
            } => self.resolve_attack(unit, *target, *aimed_location, AttackOrigin::Command),
            CommandKind::Defend { stance } => self.execute_defend(unit, *stance),
            CommandKind::Aim { location } => self.execute_aim(unit, *location),
            CommandKind::Overwatch { direction, arc } => {
                self.execute_overwatch(unit, *direction, *arc);
            }
            CommandKind::Turn { facing } => self.execute_turn(unit, *facing),
            CommandKind::Reload => self.execute_reload(unit),
        }
    }

    fn precondition_holds(&self, unit: EntityId, precondition: Precondition) -> bool {
        let Some(entity) = self.entities.get(unit) else {
            return false;
        };
        let Some(position) = entity.position else {
            return false;
        };
        match precondition {
            Precondition::InRange { target } => self
                .entities
                .get(target)
                .filter(|t| t.is_alive_unit())
                .and_then(|t| t.position)
                .is_some_and(|t| {
                    position.value.distance(t.value)
                        <= attack_reach(entity.weapon.as_ref(), &self.config) + 1e-9
                }),
            Precondition::TargetDead { target } => {
                !self.entities.get(target).is_some_and(Entity::is_alive_unit)
            }
            Precondition::EnemyApproaches { within } => {
                let Some(faction) = entity.faction else {
                    return false;
                };
                self.entities.iter().any(|(_, other)| {
                    other.is_alive_unit()
                        && other.faction.is_some_and(|f| f.is_hostile_to(faction))
                        && other
                            .position
                            .is_some_and(|p| p.value.distance(position.value) <= within)
                })
            }
            Precondition::HpBelow { percent } => {
                entity.health.is_some_and(|h| h.percent() < percent)
            }
        }
    }

    fn current_ap(&self, unit: EntityId) -> u32 {
        self.entities
            .get(unit)
            .and_then(|e| e.action_points)
            .map_or(0, |ap| ap.current)
    }

    /// Spend `amount` AP, or leave the unit untouched and return `false`.
    pub(crate) fn spend_ap(&mut self, unit: EntityId, amount: u32) -> bool {
        let Some(entity) = self.entities.get_mut(unit) else {
            return false;
        };
        match entity.action_points.and_then(|ap| ap.spent(amount)) {
            Some(next) => {
                entity.action_points = Some(next);
                true
            }
            None => false,
        }
    }

    fn execute_move(&mut self, unit: EntityId, request: MoveRequest) {
        let available = self.current_ap(unit);
        let plan = match plan_move(
            &self.entities,
            unit,
            &request,
            self.map_size,
            available,
            &self.config,
        ) {
            Ok(plan) => plan,
            Err(error) => {
                trace!(unit, %error, "move skipped");
                return;
            }
        };
        if !plan.moves(&self.config) {
            trace!(unit, "move skipped: no room to move");
            return;
        }
        if plan.ap_cost == 0 {
            trace!(unit, "move skipped: no AP left to sprint");
            return;
        }

        let stamina = self.entities.get(unit).and_then(|e| e.stamina);
        if plan.stamina_cost > 0 && stamina.is_some_and(|s| s.current < plan.stamina_cost) {
            trace!(unit, mode = %plan.mode, "move skipped: not enough stamina");
            return;
        }
        if !self.spend_ap(unit, plan.ap_cost) {
            trace!(unit, cost = plan.ap_cost, available, "move skipped: not enough AP");
            return;
        }

        if let Some(entity) = self.entities.get_mut(unit) {
            entity.position = entity.position.map(|p| {
                let moved = p.moved_to(plan.to);
                plan.facing.map_or(moved, |f| moved.facing(f))
            });
        }
        self.emit(
            Some(unit),
            None,
            GameEventKind::UnitMoved {
                from: plan.from,
                to: plan.to,
                path: plan.path.clone(),
                mode: plan.mode,
                distance: plan.distance,
                ap_cost: plan.ap_cost,
            },
        );

        if let Some(before) = stamina.filter(|_| plan.stamina_cost > 0) {
            let after = before.drained(plan.stamina_cost);
            if let Some(entity) = self.entities.get_mut(unit) {
                entity.stamina = Some(after);
            }
            self.exerted.insert(unit);
            self.emit(
                Some(unit),
                None,
                GameEventKind::StaminaDrained {
                    amount: before.current - after.current,
                    remaining: after.current,
                },
            );
            if after.exhausted && !before.exhausted {
                self.emit(Some(unit), None, GameEventKind::Exhausted);
            }
        }

        self.refresh_engagements();
        self.trigger_overwatch(unit, &plan.path);
    }

    fn execute_turn(&mut self, unit: EntityId, facing: f64) {
        let Some(position) = self.entities.get(unit).and_then(|e| e.position) else {
            return;
        };
        let facing = normalize_angle(facing);
        let cost = turn_cost(position.facing, facing, &self.config);
        if !self.spend_ap(unit, cost) {
            trace!(unit, cost, "turn skipped: not enough AP");
            return;
        }
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.position = Some(position.facing(facing));
        }
        self.emit(
            Some(unit),
            None,
            GameEventKind::UnitTurned {
                from: position.facing,
                to: facing,
                ap_cost: cost,
            },
        );
    }

    fn execute_defend(&mut self, unit: EntityId, stance: DefensiveStance) {
        if !self.spend_ap(unit, DEFEND_AP_COST) {
            return;
        }
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.defensive_stance = Some(stance);
        }
        self.emit(Some(unit), None, GameEventKind::DefenseStanceTaken { stance });
    }

    fn execute_aim(&mut self, unit: EntityId, location: Option<BodyLocation>) {
        if !self.spend_ap(unit, AIM_AP_COST) {
            return;
        }
        let max_stacks = self.config.max_aim_stacks;
        let Some(entity) = self.entities.get_mut(unit) else {
            return;
        };
        let previous = entity.aim.unwrap_or_default();
        let aim = AimState {
            location: location.or(previous.location),
            stacks: (previous.stacks + 1).min(max_stacks),
        };
        entity.aim = Some(aim);
        self.emit(
            Some(unit),
            None,
            GameEventKind::UnitAiming {
                location: aim.location,
                stacks: aim.stacks,
            },
        );
    }

    fn execute_overwatch(&mut self, unit: EntityId, direction: Option<f64>, arc: Option<f64>) {
        let Some(weapon) = self.entities.get(unit).and_then(|e| e.weapon.clone()) else {
            return;
        };
        if !self.spend_ap(unit, weapon.ap_cost) {
            trace!(unit, "overwatch skipped: not enough AP");
            return;
        }
        let direction = direction.map(normalize_angle);
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.overwatch = Some(Overwatch {
                attack_type: weapon.attack_type(),
                direction,
                arc,
                reserved_ap: weapon.ap_cost,
                triggered: false,
            });
        }
        self.emit(
            Some(unit),
            None,
            GameEventKind::OverwatchSet {
                direction,
                arc,
                reserved_ap: weapon.ap_cost,
            },
        );
    }

    fn execute_reload(&mut self, unit: EntityId) {
        let Some(reloaded) = self
            .entities
            .get(unit)
            .and_then(|e| e.ammo.as_ref())
            .and_then(|a| a.reloaded())
        else {
            trace!(unit, "reload skipped: nothing to load");
            return;
        };
        if !self.spend_ap(unit, RELOAD_AP_COST) {
            return;
        }
        let slot = reloaded.current_slot;
        let ammo_type = reloaded
            .current()
            .map(|s| s.ammo_type.clone())
            .unwrap_or_default();
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.ammo = Some(reloaded);
        }
        self.emit(Some(unit), None, GameEventKind::Reloaded { slot, ammo_type });
    }

    /// Recompute engagement from live distances and log what changed.
    pub(crate) fn refresh_engagements(&mut self) {
        let engaged = compute_engagements(&self.entities, &self.config);
        let mut started = Vec::new();
        let mut ended = Vec::new();

        for id in self.entities.unit_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let previous = entity
                .engagement
                .as_ref()
                .map(|e| e.engaged_with.clone())
                .unwrap_or_default();
            let current = engaged.get(&id).cloned().unwrap_or_default();
            started.extend(current.difference(&previous).filter(|&&o| id < o).map(|&o| (id, o)));
            ended.extend(previous.difference(&current).filter(|&&o| id < o).map(|&o| (id, o)));
            if entity.engagement.is_none() || previous != current {
                entity.engagement = Some(Engagement {
                    engaged_with: current,
                });
            }
        }

        for (a, b) in ended {
            self.emit(Some(a), Some(b), GameEventKind::EngagementEnded);
        }
        for (a, b) in started {
            self.emit(Some(a), Some(b), GameEventKind::EngagementStarted);
        }
    }

    /// End-of-pass bookkeeping.
    fn finish_turn(&mut self) {
        self.apply_bleeding();
        self.refresh_engagements();

        let recovery = self.config.stamina_recovery;
        for id in self.entities.unit_ids() {
            let rested = !self.exerted.contains(&id);
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            entity.defensive_stance = None;
            entity.overwatch = None;
            entity.action_points = entity.action_points.map(|ap| ap.replenished());
            if rested && entity.is_alive_unit() {
                entity.stamina = entity.stamina.map(|s| s.recovered(recovery));
            }
        }
        self.exerted.clear();

        self.set_phase(Phase::Planning);
        self.turn += 1;
        self.emit(None, None, GameEventKind::TurnStarted);

        let hash = self.state_hash();
        debug!(turn = self.turn, state_hash = hash, "turn resolved");
    }

    // ------------------------------------------------------------------
    // Hashing
    // ------------------------------------------------------------------

    /// Hash of the rules-relevant state: turn, phase, random cursor and
    /// every entity in id order. The event log is not included.
    ///
    /// Two sessions that have resolved the same commands from the same
    /// start hash equal.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.turn.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.rng.state().hash(&mut hasher);
        self.entities.len().hash(&mut hasher);
        // f64 fields are hashed by their exact bits through the encoding
        if let Ok(bytes) = bincode::serialize(self.entities.as_map()) {
            bytes.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Health;
    use crate::events::GameEventType;
    use std::sync::{Arc, Mutex};

    fn registry() -> ContentRegistry {
        ContentRegistry::builtin()
    }

    fn spawn(sim: &mut Simulation, template: &str, faction: Faction, at: Vec2) -> EntityId {
        sim.spawn_unit(&registry(), template, faction, Position::new(at), 0)
            .unwrap()
    }

    fn types(events: &[GameEvent]) -> Vec<GameEventType> {
        events.iter().map(GameEvent::event_type).collect()
    }

    // =========================================================================
    // Phases
    // =========================================================================

    #[test]
    fn test_new_session() {
        let sim = Simulation::new(7);
        assert_eq!(sim.turn(), 1);
        assert_eq!(sim.phase(), Phase::Planning);
        assert!(sim.log().is_empty());
        assert_eq!(sim.random_state().call_count, 0);
    }

    #[test]
    fn test_phase_transitions_are_checked() {
        let mut sim = Simulation::new(7);
        assert!(matches!(
            sim.resolve_phase(),
            Err(GameError::InvalidPhase { .. })
        ));
        sim.end_planning_phase().unwrap();
        assert!(matches!(
            sim.end_planning_phase(),
            Err(GameError::InvalidPhase { .. })
        ));
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        assert!(sim.enqueue(unit, Command::new(CommandKind::Reload)).is_err());
        sim.resolve_phase().unwrap();
        assert_eq!(sim.phase(), Phase::Planning);
        assert_eq!(sim.turn(), 2);
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    #[test]
    fn test_enqueue_rejections() {
        let mut sim = Simulation::new(1);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let foe = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(1.0, 0.0));

        // sword costs 2: three attacks fill a 6 AP budget
        for _ in 0..3 {
            assert!(sim.enqueue(unit, Command::attack(foe)).unwrap());
        }
        assert!(!sim.enqueue(unit, Command::attack(foe)).unwrap());
        assert!(!sim.enqueue(unit, Command::new(CommandKind::Reload)).unwrap());
        assert!(!sim.enqueue(unit, Command::attack(unit)).unwrap());

        assert!(matches!(
            sim.enqueue(99, Command::attack(foe)),
            Err(GameError::EntityNotFound(99))
        ));
    }

    #[test]
    fn test_enqueue_queue_capacity() {
        let config = RulesConfig {
            max_queue_len: 2,
            ..RulesConfig::default()
        };
        let mut sim = Simulation::with_config(1, config);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let turn = |f: f64| Command::new(CommandKind::Turn { facing: f });
        assert!(sim.enqueue(unit, turn(0.1)).unwrap());
        assert!(sim.enqueue(unit, turn(0.2)).unwrap());
        assert!(!sim.enqueue(unit, turn(0.3)).unwrap());
    }

    #[test]
    fn test_down_unit_cannot_enqueue() {
        let mut sim = Simulation::new(1);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        sim.entities.get_mut(unit).unwrap().health = Some(Health::with_values(0, 20));
        assert!(!sim
            .enqueue(unit, Command::new(CommandKind::Turn { facing: 1.0 }))
            .unwrap());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut sim = Simulation::new(1);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let step = Command::move_to(Vec2::new(1.0, 0.0), MovementMode::Walk);
        sim.enqueue(unit, step.clone()).unwrap();
        sim.enqueue(unit, step).unwrap();
        assert!(sim.remove_command(unit, 0).unwrap());
        assert!(!sim.remove_command(unit, 5).unwrap());
        assert_eq!(sim.queued_orders().len(), 1);
        assert_eq!(sim.queued_orders()[0].1.sequence, 1);
        sim.clear_queue(unit).unwrap();
        assert!(sim.queued_orders().is_empty());
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    #[test]
    fn test_global_priority_order() {
        let mut sim = Simulation::new(3);
        let a = spawn(&mut sim, "swordsman", Faction::Player, Vec2::new(-5.0, 0.0));
        let b = spawn(&mut sim, "swordsman", Faction::Player, Vec2::new(5.0, 0.0));

        // declared: a moves, b defends, a turns
        sim.enqueue(a, Command::move_to(Vec2::new(-4.0, 0.0), MovementMode::Walk))
            .unwrap();
        sim.enqueue(
            b,
            Command::new(CommandKind::Defend {
                stance: DefensiveStance::Dodge,
            }),
        )
        .unwrap();
        sim.enqueue(a, Command::new(CommandKind::Turn { facing: 0.5 }))
            .unwrap();

        let events = sim.advance().unwrap();
        let order: Vec<GameEventType> = types(&events)
            .into_iter()
            .filter(|t| {
                matches!(
                    t,
                    GameEventType::UnitMoved
                        | GameEventType::DefenseStanceTaken
                        | GameEventType::UnitTurned
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                GameEventType::DefenseStanceTaken,
                GameEventType::UnitTurned,
                GameEventType::UnitMoved
            ]
        );
    }

    #[test]
    fn test_attack_waits_for_own_move() {
        let mut sim = Simulation::new(3);
        let hero = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let foe = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(4.2, 0.0));
        let rival = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(-1.0, 0.0));

        sim.enqueue(hero, Command::move_to(Vec2::new(3.0, 0.0), MovementMode::Advance))
            .unwrap();
        sim.enqueue(hero, Command::attack(foe)).unwrap();
        // a fresh attack still strikes at sword speed
        sim.enqueue(rival, Command::attack(hero)).unwrap();
        let queued = |unit: EntityId| -> Vec<i32> {
            sim.entity(unit)
                .and_then(|e| e.command_queue.as_ref())
                .map(|q| q.commands.iter().map(|c| c.priority).collect())
                .unwrap_or_default()
        };
        assert_eq!(queued(hero), vec![5, 5]);
        assert_eq!(queued(rival), vec![3]);

        let events = sim.advance().unwrap();
        let steps: Vec<(Option<EntityId>, GameEventType)> = events
            .iter()
            .filter(|e| {
                matches!(
                    e.event_type(),
                    GameEventType::UnitMoved | GameEventType::AttackDeclared
                )
            })
            .map(|e| (e.actor, e.event_type()))
            .collect();
        assert_eq!(
            steps,
            vec![
                (Some(rival), GameEventType::AttackDeclared),
                (Some(hero), GameEventType::UnitMoved),
                (Some(hero), GameEventType::AttackDeclared),
            ]
        );
        assert!(!events
            .iter()
            .any(|e| e.actor == Some(hero) && e.event_type() == GameEventType::AttackOutOfRange));
    }

    #[test]
    fn test_explicit_priority_is_kept_after_move() {
        let mut sim = Simulation::new(3);
        let hero = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let foe = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(1.0, 0.0));
        sim.enqueue(hero, Command::move_to(Vec2::new(-1.0, 0.0), MovementMode::Walk))
            .unwrap();
        sim.enqueue(hero, Command::attack(foe).with_priority(1)).unwrap();
        let queue = sim.entity(hero).unwrap().command_queue.clone().unwrap();
        assert_eq!(queue.commands[1].priority, 1);
    }

    #[test]
    fn test_priority_override_and_ties() {
        let mut sim = Simulation::new(3);
        let a = spawn(&mut sim, "swordsman", Faction::Player, Vec2::new(-5.0, 0.0));
        let b = spawn(&mut sim, "swordsman", Faction::Player, Vec2::new(5.0, 0.0));
        sim.enqueue(b, Command::new(CommandKind::Turn { facing: 0.3 }).with_priority(4))
            .unwrap();
        sim.enqueue(a, Command::new(CommandKind::Turn { facing: 0.3 }).with_priority(4))
            .unwrap();
        let events = sim.advance().unwrap();
        let actors: Vec<EntityId> = events
            .iter()
            .filter(|e| e.event_type() == GameEventType::UnitTurned)
            .filter_map(|e| e.actor)
            .collect();
        assert_eq!(actors, vec![b, a]);
    }

    #[test]
    fn test_failed_precondition_costs_nothing() {
        let mut sim = Simulation::new(3);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let foe = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(8.0, 0.0));
        sim.enqueue(
            unit,
            Command::attack(foe).when(Precondition::InRange { target: foe }),
        )
        .unwrap();
        sim.end_planning_phase().unwrap();
        let events = sim.resolve_phase().unwrap();
        assert!(!types(&events).contains(&GameEventType::AttackDeclared));
        // AP was refilled anyway; check nothing was spent before the refill
        assert!(events
            .iter()
            .all(|e| e.actor != Some(unit) || e.event_type() != GameEventType::AttackRolled));
    }

    #[test]
    fn test_hp_below_precondition() {
        let mut sim = Simulation::new(3);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let guard = Command::new(CommandKind::Defend {
            stance: DefensiveStance::Block,
        });
        sim.enqueue(unit, guard.clone().when(Precondition::HpBelow { percent: 50 }))
            .unwrap();
        let events = sim.advance().unwrap();
        assert!(!types(&events).contains(&GameEventType::DefenseStanceTaken));

        sim.entities.get_mut(unit).unwrap().health = Some(Health::with_values(5, 20));
        sim.enqueue(unit, guard.when(Precondition::HpBelow { percent: 50 }))
            .unwrap();
        let events = sim.advance().unwrap();
        assert!(types(&events).contains(&GameEventType::DefenseStanceTaken));
    }

    // =========================================================================
    // Movement through the session
    // =========================================================================

    #[test]
    fn test_run_drains_stamina_and_exhausts() {
        let mut sim = Simulation::new(3);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let stamina = sim.entity(unit).unwrap().stamina.unwrap();
        sim.entities.get_mut(unit).unwrap().stamina = Some(stamina.drained(stamina.current - 1));

        sim.enqueue(unit, Command::move_to(Vec2::new(3.0, 0.0), MovementMode::Run))
            .unwrap();
        let events = sim.advance().unwrap();
        let kinds = types(&events);
        assert!(kinds.contains(&GameEventType::StaminaDrained));
        assert!(kinds.contains(&GameEventType::Exhausted));
        assert!(sim.entity(unit).unwrap().stamina.unwrap().exhausted);

        // no stamina left: the next run is a no-op
        sim.enqueue(unit, Command::move_to(Vec2::new(6.0, 0.0), MovementMode::Run))
            .unwrap();
        let events = sim.advance().unwrap();
        assert!(!types(&events).contains(&GameEventType::UnitMoved));
    }

    #[test]
    fn test_move_updates_facing_and_engagement() {
        let mut sim = Simulation::new(3);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let foe = spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(0.0, 4.0));
        sim.enqueue(
            unit,
            Command::new(CommandKind::MoveAdjacent {
                target: foe,
                mode: MovementMode::Run,
            }),
        )
        .unwrap();
        let events = sim.advance().unwrap();
        assert!(types(&events).contains(&GameEventType::EngagementStarted));

        let position = sim.entity(unit).unwrap().position.unwrap();
        assert!((position.facing - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let engaged = &sim.entity(foe).unwrap().engagement.as_ref().unwrap().engaged_with;
        assert!(engaged.contains(&unit));
    }

    // =========================================================================
    // End of turn
    // =========================================================================

    #[test]
    fn test_stances_clear_when_resolution_ends() {
        let mut sim = Simulation::new(3);
        let archer = spawn(&mut sim, "archer", Faction::Player, Vec2::ZERO);
        let guard = spawn(&mut sim, "swordsman", Faction::Player, Vec2::new(3.0, 0.0));
        sim.enqueue(
            archer,
            Command::new(CommandKind::Overwatch {
                direction: None,
                arc: None,
            }),
        )
        .unwrap();
        sim.enqueue(
            guard,
            Command::new(CommandKind::Defend {
                stance: DefensiveStance::Parry,
            }),
        )
        .unwrap();
        assert!(!sim.are_all_player_units_on_overwatch());

        let events = sim.advance().unwrap();
        assert!(types(&events).contains(&GameEventType::OverwatchSet));
        assert!(types(&events).contains(&GameEventType::DefenseStanceTaken));
        assert!(sim.entity(archer).unwrap().overwatch.is_none());
        assert!(sim.entity(guard).unwrap().defensive_stance.is_none());
        let ap = sim.entity(archer).unwrap().action_points.unwrap();
        assert_eq!(ap.current, ap.max);
    }

    #[test]
    fn test_all_on_overwatch_predicate() {
        let mut sim = Simulation::new(3);
        assert!(!sim.are_all_player_units_on_overwatch());
        let archer = spawn(&mut sim, "archer", Faction::Player, Vec2::ZERO);
        spawn(&mut sim, "swordsman", Faction::Enemy, Vec2::new(9.0, 0.0));
        assert!(!sim.are_all_player_units_on_overwatch());
        sim.enqueue(
            archer,
            Command::new(CommandKind::Overwatch {
                direction: Some(0.0),
                arc: Some(1.0),
            }),
        )
        .unwrap();
        assert!(sim.are_all_player_units_on_overwatch());
    }

    #[test]
    fn test_turn_started_logged_in_new_turn() {
        let mut sim = Simulation::new(3);
        let events = sim.advance().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type(), GameEventType::TurnStarted);
        assert_eq!(last.turn, 2);
        assert_eq!(events[0].turn, 1);
    }

    #[test]
    fn test_aim_stacks_are_capped() {
        let mut sim = Simulation::new(3);
        let unit = spawn(&mut sim, "archer", Faction::Player, Vec2::ZERO);
        for _ in 0..3 {
            sim.enqueue(
                unit,
                Command::new(CommandKind::Aim {
                    location: Some(BodyLocation::Head),
                }),
            )
            .unwrap();
        }
        sim.advance().unwrap();
        let aim = sim.entity(unit).unwrap().aim.unwrap();
        assert_eq!(aim.stacks, 2);
        assert_eq!(aim.location, Some(BodyLocation::Head));
    }

    // =========================================================================
    // Determinism and subscriptions
    // =========================================================================

    #[test]
    fn test_state_hash_tracks_state() {
        let build = || {
            let mut sim = Simulation::new(11);
            let a = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
            let b = spawn(&mut sim, "brute", Faction::Enemy, Vec2::new(1.0, 0.0));
            sim.enqueue(a, Command::attack(b)).unwrap();
            sim.enqueue(b, Command::attack(a)).unwrap();
            sim.advance().unwrap();
            sim
        };
        let one = build();
        let two = build();
        assert_eq!(one.state_hash(), two.state_hash());
        assert_eq!(one.log(), two.log());
        assert_ne!(one.state_hash(), Simulation::new(11).state_hash());
    }

    #[test]
    fn test_subscribers_see_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sim = Simulation::new(3);
        let sink = Arc::clone(&seen);
        sim.subscribe_all(move |e| sink.lock().unwrap().push(e.timestamp));
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        sim.enqueue(unit, Command::new(CommandKind::Turn { facing: 3.0 }))
            .unwrap();
        sim.advance().unwrap();

        let seen = seen.lock().unwrap();
        let logged: Vec<u64> = sim.log().events().iter().map(|e| e.timestamp).collect();
        assert_eq!(*seen, logged);
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut sim = Simulation::new(5);
        let unit = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        sim.mark_initial_state().unwrap();
        let start = sim.state_hash();

        sim.enqueue(unit, Command::move_to(Vec2::new(2.0, 0.0), MovementMode::Advance))
            .unwrap();
        sim.advance().unwrap();
        assert_ne!(sim.state_hash(), start);

        sim.reset().unwrap();
        assert_eq!(sim.state_hash(), start);
        assert_eq!(sim.turn(), 1);
        assert!(Simulation::new(5).reset().is_err());
    }

    #[test]
    fn test_roster_from_store() {
        let mut sim = Simulation::new(5);
        let a = spawn(&mut sim, "swordsman", Faction::Player, Vec2::ZERO);
        let b = spawn(&mut sim, "archer", Faction::Enemy, Vec2::new(4.0, 0.0));
        let roster = sim.roster();
        assert_eq!(roster.units(Faction::Player), &[a]);
        assert_eq!(roster.units(Faction::Enemy), &[b]);
        assert_eq!(sim.live_units(Faction::Enemy), vec![b]);
    }
}
