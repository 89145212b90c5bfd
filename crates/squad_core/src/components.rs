//! Component definitions.
//!
//! Components are plain data with no behavior beyond derived values. The
//! resolver never edits a component field in place: it builds a new value
//! (usually through one of the `with_*`/`spent`/`drained` helpers below) and
//! assigns it over the old one, so snapshots and subscribers only ever see
//! whole records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Weapons with a range above this many units are ranged; everything else
/// is melee. This is the only place the split is decided.
pub const RANGED_THRESHOLD: f64 = 3.0;

// ============================================================================
// Spatial
// ============================================================================

/// Position and orientation on the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// World position.
    pub value: Vec2,
    /// Facing in radians (0 = +x).
    pub facing: f64,
    /// Height above the ground plane, if the scenario gave one.
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl Position {
    /// Position facing +x with no elevation.
    #[must_use]
    pub const fn new(value: Vec2) -> Self {
        Self {
            value,
            facing: 0.0,
            elevation: None,
        }
    }

    /// Same orientation, new location.
    #[must_use]
    pub const fn moved_to(self, value: Vec2) -> Self {
        Self { value, ..self }
    }

    /// Same location, new facing.
    #[must_use]
    pub const fn facing(self, facing: f64) -> Self {
        Self { facing, ..self }
    }
}

// ============================================================================
// Health and wounds
// ============================================================================

/// Coarse condition derived from the health ratio.
///
/// Variants are ordered from best to worst, so `a < b` means `a` is the
/// healthier state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WoundState {
    /// Above 75% health.
    Healthy,
    /// At most 75%.
    Bloodied,
    /// At most 50%.
    Wounded,
    /// At most 25%.
    Critical,
    /// At or below zero. The unit takes no further part in the fight.
    Down,
}

impl WoundState {
    /// Derive the state from current and maximum health.
    #[must_use]
    pub fn derive(current: i32, max: i32) -> Self {
        if current <= 0 || max <= 0 {
            return Self::Down;
        }
        let current = i64::from(current);
        let max = i64::from(max);
        if current * 4 <= max {
            Self::Critical
        } else if current * 2 <= max {
            Self::Wounded
        } else if current * 4 <= max * 3 {
            Self::Bloodied
        } else {
            Self::Healthy
        }
    }

    /// Morale penalty for fighting in this condition.
    #[must_use]
    pub const fn morale_penalty(self) -> i32 {
        match self {
            Self::Healthy => 0,
            Self::Bloodied => 5,
            Self::Wounded => 10,
            Self::Critical => 20,
            Self::Down => 0,
        }
    }
}

/// Hit points. The wound state is always derived, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    current: i32,
    max: i32,
    wound_state: WoundState,
}

impl Health {
    /// Full health.
    #[must_use]
    pub fn new(max: i32) -> Self {
        Self::with_values(max, max)
    }

    /// Arbitrary current/max pair with a freshly derived wound state.
    #[must_use]
    pub fn with_values(current: i32, max: i32) -> Self {
        Self {
            current,
            max,
            wound_state: WoundState::derive(current, max),
        }
    }

    /// Current hit points.
    #[must_use]
    pub const fn current(&self) -> i32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Derived condition.
    #[must_use]
    pub const fn wound_state(&self) -> WoundState {
        self.wound_state
    }

    /// True when at or below zero.
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.wound_state == WoundState::Down
    }

    /// Health as a percentage of max, rounded down.
    #[must_use]
    pub fn percent(&self) -> i32 {
        if self.max <= 0 {
            return 0;
        }
        ((i64::from(self.current.max(0)) * 100) / i64::from(self.max)) as i32
    }

    /// New record after losing `amount` hit points.
    #[must_use]
    pub fn damaged(self, amount: i32) -> Self {
        Self::with_values(self.current.saturating_sub(amount), self.max)
    }

    /// True if the stored wound state matches the derivation.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.wound_state == WoundState::derive(self.current, self.max)
    }
}

/// Body regions that can be armored and hit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BodyLocation {
    /// Head.
    Head,
    /// Torso.
    Torso,
    /// Both arms.
    Arms,
    /// Both legs.
    Legs,
}

impl BodyLocation {
    /// All locations in hit-table order.
    pub const ALL: [Self; 4] = [Self::Head, Self::Torso, Self::Arms, Self::Legs];

    /// Relative chance of being struck by an unaimed blow.
    #[must_use]
    pub const fn base_hit_weight(self) -> u32 {
        match self {
            Self::Head => 10,
            Self::Torso => 45,
            Self::Arms => 25,
            Self::Legs => 20,
        }
    }
}

/// How bad a lasting wound is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WoundSeverity {
    /// Scratches and bruises with a small penalty.
    Minor,
    /// A wound that hampers the unit for the rest of the fight.
    Serious,
    /// Crippling damage.
    Critical,
}

impl WoundSeverity {
    /// Severity for a blow of `damage` points.
    #[must_use]
    pub const fn from_damage(damage: i32) -> Self {
        if damage >= 12 {
            Self::Critical
        } else if damage >= 8 {
            Self::Serious
        } else {
            Self::Minor
        }
    }
}

/// One lasting wound. Effects stack: a unit keeps every effect it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundEffect {
    /// Where the wound is.
    pub location: BodyLocation,
    /// How bad it is.
    pub severity: WoundSeverity,
    /// Subtracted from attack and defense skills.
    pub skill_penalty: i32,
    /// Fraction of movement lost (0.2 = 20% slower).
    pub movement_penalty: f64,
    /// Hit points lost at the end of every resolution pass.
    pub bleed_per_turn: i32,
    /// Two-handed weapons can no longer be used.
    pub disables_two_handed: bool,
    /// Fastest movement mode still available.
    pub restricts_movement_mode: Option<MovementMode>,
    /// Movement distance is halved.
    pub halves_movement: bool,
}

impl WoundEffect {
    /// Effect of a wound at `location` with `severity`.
    #[must_use]
    pub fn for_hit(location: BodyLocation, severity: WoundSeverity) -> Self {
        let tier = match severity {
            WoundSeverity::Minor => 1,
            WoundSeverity::Serious => 2,
            WoundSeverity::Critical => 3,
        };
        let mut effect = Self {
            location,
            severity,
            skill_penalty: 0,
            movement_penalty: 0.0,
            bleed_per_turn: 0,
            disables_two_handed: false,
            restricts_movement_mode: None,
            halves_movement: false,
        };
        match location {
            BodyLocation::Head => {
                effect.skill_penalty = 5 * tier;
                effect.bleed_per_turn = tier - 1;
            }
            BodyLocation::Torso => {
                effect.bleed_per_turn = tier;
            }
            BodyLocation::Arms => {
                effect.skill_penalty = 5 * tier;
                effect.disables_two_handed = severity >= WoundSeverity::Serious;
            }
            BodyLocation::Legs => {
                effect.movement_penalty = 0.1 * f64::from(tier);
                if severity >= WoundSeverity::Serious {
                    effect.restricts_movement_mode = Some(MovementMode::Advance);
                }
                effect.halves_movement = severity == WoundSeverity::Critical;
            }
        }
        effect
    }
}

/// Every lasting wound a unit carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WoundEffects {
    /// Effects in the order they were received.
    pub effects: Vec<WoundEffect>,
}

impl WoundEffects {
    /// New record with `effect` appended.
    #[must_use]
    pub fn with_effect(&self, effect: WoundEffect) -> Self {
        let mut effects = self.effects.clone();
        effects.push(effect);
        Self { effects }
    }

    /// Summed skill penalty.
    #[must_use]
    pub fn skill_penalty(&self) -> i32 {
        self.effects.iter().map(|e| e.skill_penalty).sum()
    }

    /// Summed movement penalty, capped at 90%.
    #[must_use]
    pub fn movement_penalty(&self) -> f64 {
        self.effects
            .iter()
            .map(|e| e.movement_penalty)
            .sum::<f64>()
            .min(0.9)
    }

    /// Summed bleeding.
    #[must_use]
    pub fn bleed_per_turn(&self) -> i32 {
        self.effects.iter().map(|e| e.bleed_per_turn).sum()
    }

    /// True if any wound forbids two-handed weapons.
    #[must_use]
    pub fn disables_two_handed(&self) -> bool {
        self.effects.iter().any(|e| e.disables_two_handed)
    }

    /// True if any wound halves movement.
    #[must_use]
    pub fn halves_movement(&self) -> bool {
        self.effects.iter().any(|e| e.halves_movement)
    }

    /// The most restrictive movement cap, if any.
    #[must_use]
    pub fn movement_cap(&self) -> Option<MovementMode> {
        self.effects
            .iter()
            .filter_map(|e| e.restricts_movement_mode)
            .min()
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Per-turn action budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoints {
    /// Points left this turn.
    pub current: u32,
    /// Points restored at the start of each turn.
    pub max: u32,
    /// Template base before modifiers.
    pub base: u32,
    /// Lost to worn armor.
    pub armor_penalty: u32,
    /// Gained through experience.
    pub experience_bonus: u32,
}

impl ActionPoints {
    /// Full budget with `max = base + experience_bonus - armor_penalty`.
    #[must_use]
    pub fn new(base: u32, armor_penalty: u32, experience_bonus: u32) -> Self {
        let max = (base + experience_bonus).saturating_sub(armor_penalty);
        Self {
            current: max,
            max,
            base,
            armor_penalty,
            experience_bonus,
        }
    }

    /// Budget after spending `amount`, or `None` if there is not enough.
    #[must_use]
    pub fn spent(self, amount: u32) -> Option<Self> {
        self.current.checked_sub(amount).map(|current| Self {
            current,
            ..self
        })
    }

    /// Budget refilled to max.
    #[must_use]
    pub const fn replenished(self) -> Self {
        Self {
            current: self.max,
            ..self
        }
    }
}

/// Endurance drained by running and sprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamina {
    /// Remaining stamina.
    pub current: u32,
    /// Maximum stamina.
    pub max: u32,
    /// Set exactly when `current` is zero.
    pub exhausted: bool,
}

impl Stamina {
    /// Fresh stamina pool.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            exhausted: max == 0,
        }
    }

    /// Pool after draining `amount` (floored at zero).
    #[must_use]
    pub const fn drained(self, amount: u32) -> Self {
        let current = self.current.saturating_sub(amount);
        Self {
            current,
            max: self.max,
            exhausted: current == 0,
        }
    }

    /// Pool after recovering `amount` (capped at max).
    #[must_use]
    pub fn recovered(self, amount: u32) -> Self {
        let current = (self.current + amount).min(self.max);
        Self {
            current,
            max: self.max,
            exhausted: current == 0,
        }
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// Per-location protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Armor {
    /// Head protection.
    pub head: i32,
    /// Torso protection.
    pub torso: i32,
    /// Arm protection.
    pub arms: i32,
    /// Leg protection.
    pub legs: i32,
    /// Action points lost while wearing it.
    pub ap_penalty: u32,
    /// Stamina lost while wearing it.
    pub stamina_penalty: u32,
}

impl Armor {
    /// Protection at `location`.
    #[must_use]
    pub const fn at(&self, location: BodyLocation) -> i32 {
        match location {
            BodyLocation::Head => self.head,
            BodyLocation::Torso => self.torso,
            BodyLocation::Arms => self.arms,
            BodyLocation::Legs => self.legs,
        }
    }
}

/// Melee or ranged, decided by [`RANGED_THRESHOLD`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttackType {
    /// Hand-to-hand.
    Melee,
    /// Missile weapons.
    Ranged,
}

/// `dice`d`sides` + `bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageFormula {
    /// Number of dice.
    pub dice: u32,
    /// Sides per die.
    pub sides: u32,
    /// Flat bonus.
    #[serde(default)]
    pub bonus: i32,
}

/// Wielded weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Display name.
    pub name: String,
    /// Damage roll.
    pub damage: DamageFormula,
    /// Scheduling priority of attacks (lower strikes first).
    pub speed: i32,
    /// Reach in world units.
    pub range: f64,
    /// Action points per attack.
    pub ap_cost: u32,
    /// Needs both hands.
    #[serde(default)]
    pub two_handed: bool,
}

impl Weapon {
    /// True for ranged weapons.
    #[must_use]
    pub fn is_ranged(&self) -> bool {
        self.range > RANGED_THRESHOLD
    }

    /// Melee or ranged.
    #[must_use]
    pub fn attack_type(&self) -> AttackType {
        if self.is_ranged() {
            AttackType::Ranged
        } else {
            AttackType::Melee
        }
    }
}

/// One kind of ammunition carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoSlot {
    /// Ammunition name (e.g. "broadhead").
    pub ammo_type: String,
    /// Rounds left.
    pub quantity: u32,
    /// Rounds when full.
    pub max: u32,
    /// Armor ignored per hit.
    #[serde(default)]
    pub armor_piercing: i32,
    /// Extra damage per hit.
    #[serde(default)]
    pub damage_bonus: i32,
}

/// Ordered ammunition slots and the one currently loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ammo {
    /// Slots in carry order.
    pub slots: Vec<AmmoSlot>,
    /// Index of the loaded slot.
    pub current_slot: usize,
}

impl Ammo {
    /// Loaded slot, if the index is valid.
    #[must_use]
    pub fn current(&self) -> Option<&AmmoSlot> {
        self.slots.get(self.current_slot)
    }

    /// True if the loaded slot has at least one round.
    #[must_use]
    pub fn has_round(&self) -> bool {
        self.current().is_some_and(|slot| slot.quantity > 0)
    }

    /// Record with one round removed from the loaded slot.
    #[must_use]
    pub fn spent_one(&self) -> Option<Self> {
        if !self.has_round() {
            return None;
        }
        let mut next = self.clone();
        next.slots[self.current_slot].quantity -= 1;
        Some(next)
    }

    /// Record with the next non-empty slot (after the current one) loaded.
    #[must_use]
    pub fn reloaded(&self) -> Option<Self> {
        let count = self.slots.len();
        (1..=count)
            .map(|offset| (self.current_slot + offset) % count)
            .find(|&index| self.slots[index].quantity > 0)
            .filter(|&index| index != self.current_slot || !self.has_round())
            .map(|index| Self {
                slots: self.slots.clone(),
                current_slot: index,
            })
    }

    /// Total rounds over every slot.
    #[must_use]
    pub fn total_rounds(&self) -> u32 {
        self.slots.iter().map(|s| s.quantity).sum()
    }
}

// ============================================================================
// Stances and states
// ============================================================================

/// Fighting spirit, from best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoraleStatus {
    /// Normal.
    Steady,
    /// Wavering. Small skill penalty.
    Shaken,
    /// Will not attack.
    Broken,
    /// Fleeing. Only moves.
    Routed,
}

impl MoraleStatus {
    /// One step worse (routed stays routed).
    #[must_use]
    pub const fn worsened(self) -> Self {
        match self {
            Self::Steady => Self::Shaken,
            Self::Shaken => Self::Broken,
            Self::Broken | Self::Routed => Self::Routed,
        }
    }

    /// One step better (steady stays steady).
    #[must_use]
    pub const fn improved(self) -> Self {
        match self {
            Self::Steady | Self::Shaken => Self::Steady,
            Self::Broken => Self::Shaken,
            Self::Routed => Self::Broken,
        }
    }

    /// Penalty applied to attack rolls.
    #[must_use]
    pub const fn skill_penalty(self) -> i32 {
        match self {
            Self::Steady => 0,
            Self::Shaken => 10,
            Self::Broken => 20,
            Self::Routed => 30,
        }
    }
}

/// A named morale adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraleModifier {
    /// What caused it (e.g. "ally_down").
    pub source: String,
    /// Signed adjustment to the check target.
    pub value: i32,
}

/// Morale status plus standing modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morale {
    /// Current status.
    pub status: MoraleStatus,
    /// Standing modifiers, summed on every check.
    pub modifiers: Vec<MoraleModifier>,
}

impl Default for Morale {
    fn default() -> Self {
        Self {
            status: MoraleStatus::Steady,
            modifiers: Vec::new(),
        }
    }
}

impl Morale {
    /// Sum of all modifiers.
    #[must_use]
    pub fn total_modifier(&self) -> i32 {
        self.modifiers.iter().map(|m| m.value).sum()
    }

    /// Record with a new status.
    #[must_use]
    pub fn with_status(&self, status: MoraleStatus) -> Self {
        Self {
            status,
            modifiers: self.modifiers.clone(),
        }
    }

    /// Record with an extra modifier.
    #[must_use]
    pub fn with_modifier(&self, source: &str, value: i32) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.push(MoraleModifier {
            source: source.to_string(),
            value,
        });
        Self {
            status: self.status,
            modifiers,
        }
    }
}

/// Units this unit is currently in melee contact with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    /// Engaged unit ids.
    pub engaged_with: BTreeSet<EntityId>,
}

/// Standing reaction fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overwatch {
    /// Attack made when triggered.
    pub attack_type: AttackType,
    /// Centre of the watched arc; `None` watches all around.
    pub direction: Option<f64>,
    /// Full width of the watched arc in radians.
    pub arc: Option<f64>,
    /// Action points held back for the reaction.
    pub reserved_ap: u32,
    /// Fired this turn.
    pub triggered: bool,
}

/// Defensive stance held until the end of resolution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DefensiveStance {
    /// Catch blows on a shield or weapon.
    Block,
    /// Step out of the way.
    Dodge,
    /// Deflect a melee blow.
    Parry,
}

/// Accumulated aim for the next attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AimState {
    /// Aimed location, if any.
    pub location: Option<BodyLocation>,
    /// Number of aim actions taken.
    pub stacks: u32,
}

/// Percent skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skills {
    /// Melee attack.
    pub melee: i32,
    /// Ranged attack.
    pub ranged: i32,
    /// Block defense.
    pub block: i32,
    /// Dodge defense.
    pub dodge: i32,
    /// Parry defense.
    pub parry: i32,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            melee: 50,
            ranged: 50,
            block: 30,
            dodge: 30,
            parry: 30,
        }
    }
}

impl Skills {
    /// Attack skill for `attack_type`.
    #[must_use]
    pub const fn attack(&self, attack_type: AttackType) -> i32 {
        match attack_type {
            AttackType::Melee => self.melee,
            AttackType::Ranged => self.ranged,
        }
    }

    /// Defense skill for `stance`.
    #[must_use]
    pub const fn defense(&self, stance: DefensiveStance) -> i32 {
        match stance {
            DefensiveStance::Block => self.block,
            DefensiveStance::Dodge => self.dodge,
            DefensiveStance::Parry => self.parry,
        }
    }
}

/// Static unit data copied from the template at spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Template the unit was built from.
    pub template: String,
    /// Display name.
    pub name: String,
    /// Distance covered per turn at full speed.
    pub base_speed: f64,
    /// Collision radius against obstacles.
    pub radius: f64,
}

// ============================================================================
// Movement modes
// ============================================================================

/// How hard a unit pushes itself when moving.
///
/// Ordered from slowest to fastest so wound caps can use `min`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MovementMode {
    /// Stay put.
    Hold,
    /// Careful step.
    Walk,
    /// Steady advance.
    Advance,
    /// Running.
    Run,
    /// Flat-out sprint using every remaining action point.
    Sprint,
}

impl MovementMode {
    /// Action points for the mode. Sprint returns `None`: it takes whatever
    /// is left.
    #[must_use]
    pub const fn ap_cost(self) -> Option<u32> {
        match self {
            Self::Hold => Some(0),
            Self::Walk => Some(1),
            Self::Advance => Some(2),
            Self::Run => Some(4),
            Self::Sprint => None,
        }
    }

    /// Fraction of base speed covered.
    #[must_use]
    pub const fn speed_factor(self) -> f64 {
        match self {
            Self::Hold => 0.0,
            Self::Walk => 0.25,
            Self::Advance => 0.5,
            Self::Run => 0.75,
            Self::Sprint => 1.0,
        }
    }

    /// Stamina drained.
    #[must_use]
    pub const fn stamina_cost(self) -> u32 {
        match self {
            Self::Run => 1,
            Self::Sprint => 3,
            _ => 0,
        }
    }
}

// ============================================================================
// Terrain
// ============================================================================

/// Collision footprint of an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleShape {
    /// Round footprint.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// Rotated rectangle.
    Rect {
        /// Half extent along the local x axis.
        half_width: f64,
        /// Half extent along the local y axis.
        half_depth: f64,
        /// Rotation in radians.
        rotation: f64,
    },
}

/// Static terrain feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Obstacle type from the lookup table.
    pub kind: String,
    /// Footprint.
    pub shape: ObstacleShape,
    /// Units may cross it.
    pub passable: bool,
    /// Speed multiplier while crossing (1.0 = no effect).
    pub speed_multiplier: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wound_state_thresholds() {
        assert_eq!(WoundState::derive(100, 100), WoundState::Healthy);
        assert_eq!(WoundState::derive(76, 100), WoundState::Healthy);
        assert_eq!(WoundState::derive(75, 100), WoundState::Bloodied);
        assert_eq!(WoundState::derive(50, 100), WoundState::Wounded);
        assert_eq!(WoundState::derive(25, 100), WoundState::Critical);
        assert_eq!(WoundState::derive(1, 100), WoundState::Critical);
        assert_eq!(WoundState::derive(0, 100), WoundState::Down);
        assert_eq!(WoundState::derive(-5, 100), WoundState::Down);
    }

    #[test]
    fn test_health_damaged_rederives() {
        let h = Health::new(20).damaged(6);
        assert_eq!(h.current(), 14);
        assert_eq!(h.wound_state(), WoundState::Bloodied);
        assert!(h.is_consistent());
        assert!(h.damaged(14).is_down());
    }

    #[test]
    fn test_action_points_max() {
        let ap = ActionPoints::new(6, 1, 2);
        assert_eq!(ap.max, 7);
        assert_eq!(ap.current, 7);
        assert_eq!(ap.spent(8), None);
        let spent = ap.spent(3).unwrap();
        assert_eq!(spent.current, 4);
        assert_eq!(spent.replenished().current, 7);
    }

    #[test]
    fn test_stamina_exhaustion_flag() {
        let s = Stamina::new(4).drained(3);
        assert!(!s.exhausted);
        let s = s.drained(3);
        assert_eq!(s.current, 0);
        assert!(s.exhausted);
        assert!(!s.recovered(1).exhausted);
    }

    #[test]
    fn test_weapon_classification() {
        let mut weapon = Weapon {
            name: "spear".into(),
            damage: DamageFormula {
                dice: 1,
                sides: 8,
                bonus: 0,
            },
            speed: 4,
            range: 3.0,
            ap_cost: 2,
            two_handed: true,
        };
        assert_eq!(weapon.attack_type(), AttackType::Melee);
        weapon.range = 3.01;
        assert_eq!(weapon.attack_type(), AttackType::Ranged);
    }

    #[test]
    fn test_ammo_spend_and_reload() {
        let ammo = Ammo {
            slots: vec![
                AmmoSlot {
                    ammo_type: "bodkin".into(),
                    quantity: 1,
                    max: 10,
                    armor_piercing: 2,
                    damage_bonus: 0,
                },
                AmmoSlot {
                    ammo_type: "broadhead".into(),
                    quantity: 3,
                    max: 10,
                    armor_piercing: 0,
                    damage_bonus: 1,
                },
            ],
            current_slot: 0,
        };
        let ammo = ammo.spent_one().unwrap();
        assert!(!ammo.has_round());
        assert!(ammo.spent_one().is_none());
        let ammo = ammo.reloaded().unwrap();
        assert_eq!(ammo.current_slot, 1);
        assert_eq!(ammo.total_rounds(), 3);
    }

    #[test]
    fn test_reload_with_nothing_left() {
        let ammo = Ammo {
            slots: vec![AmmoSlot {
                ammo_type: "bolt".into(),
                quantity: 0,
                max: 10,
                armor_piercing: 0,
                damage_bonus: 0,
            }],
            current_slot: 0,
        };
        assert!(ammo.reloaded().is_none());
        assert!(Ammo::default().reloaded().is_none());
    }

    #[test]
    fn test_morale_steps() {
        assert_eq!(MoraleStatus::Steady.worsened(), MoraleStatus::Shaken);
        assert_eq!(MoraleStatus::Routed.worsened(), MoraleStatus::Routed);
        assert_eq!(MoraleStatus::Broken.improved(), MoraleStatus::Shaken);
        assert_eq!(MoraleStatus::Steady.improved(), MoraleStatus::Steady);
    }

    #[test]
    fn test_wound_effects_accumulate() {
        let effects = WoundEffects::default()
            .with_effect(WoundEffect::for_hit(BodyLocation::Legs, WoundSeverity::Serious))
            .with_effect(WoundEffect::for_hit(BodyLocation::Arms, WoundSeverity::Minor));
        assert_eq!(effects.effects.len(), 2);
        assert_eq!(effects.skill_penalty(), 5);
        assert_eq!(effects.movement_cap(), Some(MovementMode::Advance));
        assert!(!effects.disables_two_handed());
        assert!((effects.movement_penalty() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_severity_from_damage() {
        assert_eq!(WoundSeverity::from_damage(4), WoundSeverity::Minor);
        assert_eq!(WoundSeverity::from_damage(8), WoundSeverity::Serious);
        assert_eq!(WoundSeverity::from_damage(15), WoundSeverity::Critical);
    }
}
