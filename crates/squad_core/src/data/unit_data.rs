//! Unit templates.

use serde::{Deserialize, Serialize};

use crate::commands::CommandQueue;
use crate::components::{
    ActionPoints, Ammo, AmmoSlot, Armor, Engagement, Health, Morale, Position, Skills, Stamina,
    UnitInfo, Weapon, WoundEffects,
};
use crate::factions::Faction;
use crate::world::Entity;

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "archer",
///     name: "Archer",
///     health: 16,
///     base_ap: 6,
///     speed: 6.5,
///     stamina: 12,
///     weapon: "shortbow",
///     armor: (torso: 1),
///     skills: (melee: 35, ranged: 65),
///     ammo: [
///         (ammo_type: "broadhead", quantity: 12, max: 12, damage_bonus: 1),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique template id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Maximum health points.
    pub health: i32,

    /// Action points per turn before armor and experience.
    pub base_ap: u32,

    /// Distance covered per turn at a flat sprint.
    pub speed: f64,

    /// Collision radius against obstacles.
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Stamina before armor.
    pub stamina: u32,

    /// Weapon id from the registry.
    pub weapon: String,

    /// Worn armor.
    #[serde(default)]
    pub armor: Armor,

    /// Percent skills.
    #[serde(default)]
    pub skills: Skills,

    /// Ammunition slots, first one loaded.
    #[serde(default)]
    pub ammo: Vec<AmmoSlot>,

    /// Free-form tags (e.g. "infantry", "missile").
    #[serde(default)]
    pub tags: Vec<String>,
}

const fn default_radius() -> f64 {
    0.5
}

impl UnitData {
    /// Check if this unit has the specified tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Fresh unit entity (id 0, assigned on insert) carrying every unit
    /// component.
    #[must_use]
    pub fn to_entity(
        &self,
        weapon: Weapon,
        faction: Faction,
        position: Position,
        experience_bonus: u32,
    ) -> Entity {
        let mut entity = Entity::new(0);
        entity.position = Some(position);
        entity.faction = Some(faction);
        entity.unit = Some(UnitInfo {
            template: self.id.clone(),
            name: self.name.clone(),
            base_speed: self.speed,
            radius: self.radius,
        });
        entity.health = Some(Health::new(self.health));
        entity.action_points = Some(ActionPoints::new(
            self.base_ap,
            self.armor.ap_penalty,
            experience_bonus,
        ));
        entity.stamina = Some(Stamina::new(
            self.stamina.saturating_sub(self.armor.stamina_penalty),
        ));
        entity.armor = Some(self.armor);
        entity.weapon = Some(weapon);
        entity.ammo = (!self.ammo.is_empty()).then(|| Ammo {
            slots: self.ammo.clone(),
            current_slot: 0,
        });
        entity.morale = Some(Morale::default());
        entity.skills = Some(self.skills);
        entity.wound_effects = Some(WoundEffects::default());
        entity.engagement = Some(Engagement::default());
        entity.command_queue = Some(CommandQueue::new());
        entity
    }
}
