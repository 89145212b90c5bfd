//! Game events, the append-only event log and synchronous subscriptions.
//!
//! The order in which events are appended during resolution is the total
//! order of everything that happened. `timestamp` is a logical sequence
//! number stamped at append time; it is metadata for presentation layers
//! and never feeds back into the rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;

use crate::commands::CommandKind;
use crate::components::{
    AttackType, BodyLocation, DefensiveStance, EntityId, MoraleStatus, MovementMode, WoundEffect,
    WoundState,
};
use crate::math::Vec2;
use crate::movement::AttackArc;
use crate::simulation::Phase;

/// What happened. Exhaustively matched by every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(
    name(GameEventType),
    derive(Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display, strum::EnumString)
)]
pub enum GameEventKind {
    /// A new planning phase began.
    TurnStarted,
    /// The session switched phase.
    PhaseChanged {
        /// Previous phase.
        from: Phase,
        /// New phase.
        to: Phase,
    },
    /// A command was accepted into a unit's queue.
    CommandQueued {
        /// The order.
        command: CommandKind,
        /// Charged AP if executed.
        ap_cost: u32,
        /// Scheduling priority.
        priority: i32,
    },
    /// A unit moved.
    UnitMoved {
        /// Start point.
        from: Vec2,
        /// End point.
        to: Vec2,
        /// Waypoints travelled, start first.
        path: Vec<Vec2>,
        /// Mode used.
        mode: MovementMode,
        /// Distance travelled.
        distance: f64,
        /// Action points spent.
        ap_cost: u32,
    },
    /// A unit turned in place.
    UnitTurned {
        /// Old facing.
        from: f64,
        /// New facing.
        to: f64,
        /// Action points spent.
        ap_cost: u32,
    },
    /// Stamina was spent on hard movement.
    StaminaDrained {
        /// Amount lost.
        amount: u32,
        /// Stamina left.
        remaining: u32,
    },
    /// Stamina hit zero.
    Exhausted,
    /// Two hostile units came into contact. Actor and target are the pair.
    EngagementStarted,
    /// Two units broke contact.
    EngagementEnded,
    /// An attack began.
    AttackDeclared {
        /// Weapon used.
        weapon: String,
        /// Melee or ranged.
        attack_type: AttackType,
        /// Reaction fire from overwatch.
        overwatch: bool,
    },
    /// The defender was beyond reach. The attack is abandoned.
    AttackOutOfRange {
        /// Distance to the defender.
        distance: f64,
        /// Weapon reach.
        range: f64,
    },
    /// The loaded slot was empty. The attack is abandoned.
    OutOfAmmo,
    /// A round was loosed.
    AmmoSpent {
        /// Ammunition type.
        ammo_type: String,
        /// Rounds left in the slot.
        remaining: u32,
    },
    /// The attack roll.
    AttackRolled {
        /// Percentile rolled.
        roll: u32,
        /// Needed to hit (roll at or below).
        target_number: i32,
        /// Side of the defender struck from.
        arc: AttackArc,
        /// Whether the roll hit.
        hit: bool,
    },
    /// The defender's defense roll.
    DefenseRolled {
        /// Stance used.
        stance: DefensiveStance,
        /// Percentile rolled.
        roll: u32,
        /// Needed to defend.
        target_number: i32,
        /// Whether the blow was stopped.
        success: bool,
    },
    /// Where the blow landed.
    HitLocationRolled {
        /// Location struck.
        location: BodyLocation,
        /// Location aimed at, if any.
        aimed: Option<BodyLocation>,
    },
    /// Damage after armor.
    DamageDealt {
        /// Location struck.
        location: BodyLocation,
        /// Dice plus bonuses before armor.
        raw: i32,
        /// Armor that counted.
        armor: i32,
        /// Hit points lost.
        damage: i32,
        /// Hit points left.
        remaining: i32,
    },
    /// A lasting wound was inflicted.
    WoundEffectApplied {
        /// The new effect.
        effect: WoundEffect,
    },
    /// The defender's wound state worsened.
    UnitWounded {
        /// New state.
        wound_state: WoundState,
    },
    /// The unit went down.
    UnitDown,
    /// A morale test.
    MoraleChecked {
        /// Percentile rolled.
        roll: u32,
        /// Needed to pass.
        target_number: i32,
        /// Whether it passed.
        passed: bool,
    },
    /// Morale fell to shaken.
    UnitShaken,
    /// Morale fell to broken.
    UnitBroken,
    /// Morale fell to routed.
    UnitRouted,
    /// Morale recovered one step.
    UnitRallied {
        /// New status.
        status: MoraleStatus,
    },
    /// A defensive stance was taken.
    DefenseStanceTaken {
        /// Stance.
        stance: DefensiveStance,
    },
    /// A unit steadied its aim.
    UnitAiming {
        /// Aimed location.
        location: Option<BodyLocation>,
        /// Aim stacks now held.
        stacks: u32,
    },
    /// A unit went on overwatch.
    OverwatchSet {
        /// Centre of the arc.
        direction: Option<f64>,
        /// Arc width.
        arc: Option<f64>,
        /// AP held back.
        reserved_ap: u32,
    },
    /// Overwatch fired at a moving enemy (the target).
    OverwatchTriggered,
    /// A new ammunition slot was loaded.
    Reloaded {
        /// Slot index.
        slot: usize,
        /// Ammunition type.
        ammo_type: String,
    },
    /// Bleeding wounds cost hit points.
    BleedDamage {
        /// Hit points lost.
        amount: i32,
        /// Hit points left.
        remaining: i32,
    },
}

/// One entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Turn the event happened in.
    pub turn: u32,
    /// Logical sequence number.
    pub timestamp: u64,
    /// Acting unit, if any.
    pub actor: Option<EntityId>,
    /// Affected unit, if any.
    pub target: Option<EntityId>,
    /// Payload.
    pub kind: GameEventKind,
}

impl GameEvent {
    /// Discriminant of the payload.
    #[must_use]
    pub fn event_type(&self) -> GameEventType {
        GameEventType::from(&self.kind)
    }
}

/// Append-only, ordered record of everything resolved so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<GameEvent>,
    next_timestamp: u64,
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored events. Timestamps continue after the
    /// highest stored one.
    #[must_use]
    pub fn from_events(events: Vec<GameEvent>) -> Self {
        let next_timestamp = events.iter().map(|e| e.timestamp + 1).max().unwrap_or(0);
        Self {
            events,
            next_timestamp,
        }
    }

    /// Append an event and return it.
    pub fn append(
        &mut self,
        turn: u32,
        actor: Option<EntityId>,
        target: Option<EntityId>,
        kind: GameEventKind,
    ) -> &GameEvent {
        let event = GameEvent {
            turn,
            timestamp: self.next_timestamp,
            actor,
            target,
            kind,
        };
        self.next_timestamp += 1;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// All events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Cursor a caller can pass to [`since`](Self::since) later.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.events.len()
    }

    /// Events appended after `cursor`.
    #[must_use]
    pub fn since(&self, cursor: usize) -> &[GameEvent] {
        self.events.get(cursor..).unwrap_or(&[])
    }

    /// Events of one turn, in log order.
    pub fn for_turn(&self, turn: u32) -> impl Iterator<Item = &GameEvent> {
        self.events.iter().filter(move |e| e.turn == turn)
    }

    /// Events of one type, in log order.
    pub fn of_type(&self, event_type: GameEventType) -> impl Iterator<Item = &GameEvent> {
        self.events
            .iter()
            .filter(move |e| e.event_type() == event_type)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&GameEvent) + Send>;

/// Synchronous event fan-out for presentation layers.
///
/// Callbacks run in subscription order as each event is appended. They see
/// events but cannot touch the session, so they cannot influence
/// resolution. Subscriptions are not part of saved state and are not
/// carried over by `Clone`.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Option<GameEventType>, Callback)>,
    next_id: u64,
}

impl EventBus {
    /// Bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` for every event of `event_type`.
    pub fn subscribe<F>(&mut self, event_type: GameEventType, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.add(Some(event_type), Box::new(callback))
    }

    /// Call `callback` for every event.
    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.add(None, Box::new(callback))
    }

    fn add(&mut self, filter: Option<GameEventType>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, filter, callback));
        id
    }

    /// Drop a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True with no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `event` to matching subscribers.
    pub fn publish(&mut self, event: &GameEvent) {
        let event_type = event.event_type();
        for (_, filter, callback) in &mut self.subscribers {
            if filter.map_or(true, |f| f == event_type) {
                callback(event);
            }
        }
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
