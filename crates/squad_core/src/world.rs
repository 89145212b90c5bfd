//! Entity/component store.
//!
//! Entities are structs of optional components: only the `Some` fields are
//! active. The store has no behavior of its own beyond insertion, lookup and
//! attribute-set queries. Iteration is always in ascending id order so every
//! system visits entities the same way on every run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commands::CommandQueue;
use crate::components::{
    AimState, Ammo, Armor, ActionPoints, DefensiveStance, Engagement, EntityId, Health, Morale,
    Obstacle, Overwatch, Position, Skills, Stamina, UnitInfo, Weapon, WoundEffects,
};
use crate::factions::Faction;

/// An entity with optional components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Location and facing.
    pub position: Option<Position>,
    /// Side.
    pub faction: Option<Faction>,
    /// Template data for units.
    pub unit: Option<UnitInfo>,
    /// Hit points.
    pub health: Option<Health>,
    /// Action budget.
    pub action_points: Option<ActionPoints>,
    /// Endurance.
    pub stamina: Option<Stamina>,
    /// Protection.
    pub armor: Option<Armor>,
    /// Wielded weapon.
    pub weapon: Option<Weapon>,
    /// Ammunition for ranged weapons.
    pub ammo: Option<Ammo>,
    /// Morale state.
    pub morale: Option<Morale>,
    /// Skills.
    pub skills: Option<Skills>,
    /// Lasting wounds.
    pub wound_effects: Option<WoundEffects>,
    /// Melee contacts.
    pub engagement: Option<Engagement>,
    /// Reaction fire.
    pub overwatch: Option<Overwatch>,
    /// Defensive stance.
    pub defensive_stance: Option<DefensiveStance>,
    /// Aim bonus for the next attack.
    pub aim: Option<AimState>,
    /// Orders for the coming resolution.
    pub command_queue: Option<CommandQueue>,
    /// Static terrain feature.
    pub obstacle: Option<Obstacle>,
}

impl Entity {
    /// Create a new entity with the given ID and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            position: None,
            faction: None,
            unit: None,
            health: None,
            action_points: None,
            stamina: None,
            armor: None,
            weapon: None,
            ammo: None,
            morale: None,
            skills: None,
            wound_effects: None,
            engagement: None,
            overwatch: None,
            defensive_stance: None,
            aim: None,
            command_queue: None,
            obstacle: None,
        }
    }

    /// True if the entity carries the component `kind`.
    #[must_use]
    pub fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Position => self.position.is_some(),
            ComponentKind::Faction => self.faction.is_some(),
            ComponentKind::Unit => self.unit.is_some(),
            ComponentKind::Health => self.health.is_some(),
            ComponentKind::ActionPoints => self.action_points.is_some(),
            ComponentKind::Stamina => self.stamina.is_some(),
            ComponentKind::Armor => self.armor.is_some(),
            ComponentKind::Weapon => self.weapon.is_some(),
            ComponentKind::Ammo => self.ammo.is_some(),
            ComponentKind::Morale => self.morale.is_some(),
            ComponentKind::Skills => self.skills.is_some(),
            ComponentKind::WoundEffects => self.wound_effects.is_some(),
            ComponentKind::Engagement => self.engagement.is_some(),
            ComponentKind::Overwatch => self.overwatch.is_some(),
            ComponentKind::DefensiveStance => self.defensive_stance.is_some(),
            ComponentKind::Aim => self.aim.is_some(),
            ComponentKind::CommandQueue => self.command_queue.is_some(),
            ComponentKind::Obstacle => self.obstacle.is_some(),
        }
    }

    /// True if the entity is a unit (template, position, health, AP).
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.unit.is_some()
            && self.position.is_some()
            && self.health.is_some()
            && self.action_points.is_some()
    }

    /// True for a unit that is not down.
    #[must_use]
    pub fn is_alive_unit(&self) -> bool {
        self.is_unit() && self.health.is_some_and(|h| !h.is_down())
    }

    /// True for a non-passable obstacle.
    #[must_use]
    pub fn is_blocking_obstacle(&self) -> bool {
        self.position.is_some() && self.obstacle.as_ref().is_some_and(|o| !o.passable)
    }
}

/// Names of the components, for attribute-set queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum ComponentKind {
    Position,
    Faction,
    Unit,
    Health,
    ActionPoints,
    Stamina,
    Armor,
    Weapon,
    Ammo,
    Morale,
    Skills,
    WoundEffects,
    Engagement,
    Overwatch,
    DefensiveStance,
    Aim,
    CommandQueue,
    Obstacle,
}

/// Storage for all entities in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Entities keyed by id.
    entities: BTreeMap<EntityId, Entity>,
    /// Next id to assign.
    next_id: EntityId,
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild storage from a dump, resuming ids at `next_id`.
    ///
    /// Each entity's own `id` must match its key.
    #[must_use]
    pub fn from_parts(entities: BTreeMap<EntityId, Entity>, next_id: EntityId) -> Self {
        let floor = entities.keys().next_back().map_or(1, |max| max + 1);
        Self {
            entities,
            next_id: next_id.max(floor),
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Next id [`insert`](Self::insert) will hand out.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Entity ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Ids of entities carrying every component in `kinds`.
    #[must_use]
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| kinds.iter().all(|&k| e.has(k)))
            .map(|e| e.id)
            .collect()
    }

    /// Ids of all units, down or not.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.is_unit())
            .map(|e| e.id)
            .collect()
    }

    /// Ids of units that are not down.
    #[must_use]
    pub fn live_unit_ids(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.is_alive_unit())
            .map(|e| e.id)
            .collect()
    }

    /// Obstacles with their positions.
    pub fn obstacles(&self) -> impl Iterator<Item = (&Position, &Obstacle)> {
        self.entities
            .values()
            .filter_map(|e| Some((e.position.as_ref()?, e.obstacle.as_ref()?)))
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }
}
