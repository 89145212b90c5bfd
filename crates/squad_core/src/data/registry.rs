//! Lookup of templates, weapons and obstacle types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::obstacle_data::{Footprint, ObstacleData};
use super::unit_data::UnitData;
use super::weapon_data::WeaponData;
use crate::components::{AmmoSlot, Armor, DamageFormula, Position, Skills, Weapon};
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::math::Vec2;
use crate::world::Entity;

/// Content as written in RON.
///
/// ```ron
/// ContentData(
///     weapons: [ /* WeaponData */ ],
///     units: [ /* UnitData */ ],
///     obstacles: [ /* ObstacleData */ ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentData {
    /// Weapon definitions.
    #[serde(default)]
    pub weapons: Vec<WeaponData>,
    /// Unit templates.
    #[serde(default)]
    pub units: Vec<UnitData>,
    /// Obstacle types.
    #[serde(default)]
    pub obstacles: Vec<ObstacleData>,
}

/// Validated content, keyed by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentRegistry {
    units: BTreeMap<String, UnitData>,
    weapons: BTreeMap<String, WeaponData>,
    obstacles: BTreeMap<String, ObstacleData>,
}

impl ContentRegistry {
    /// Parse and validate content from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let data: ContentData = super::ron_options()
            .from_str(source)
            .map_err(|e| GameError::DataParseError {
                path: "content".into(),
                message: e.to_string(),
            })?;
        Self::from_data(data)
    }

    /// Validate content. Ids must be unique per table, every template's
    /// weapon must exist, and weapons must roll dice and have reach.
    pub fn from_data(data: ContentData) -> Result<Self> {
        let mut registry = Self::default();
        for weapon in data.weapons {
            if let Some(problem) = weapon.problem() {
                return Err(invalid(problem));
            }
            let id = weapon.id.clone();
            if registry.weapons.insert(id.clone(), weapon).is_some() {
                return Err(invalid(format!("duplicate weapon '{id}'")));
            }
        }
        for unit in data.units {
            if !registry.weapons.contains_key(&unit.weapon) {
                return Err(GameError::UnknownWeapon(unit.weapon));
            }
            if unit.health <= 0 || !(unit.speed.is_finite() && unit.speed >= 0.0) {
                return Err(invalid(format!("unit '{}' has bad health or speed", unit.id)));
            }
            let id = unit.id.clone();
            if registry.units.insert(id.clone(), unit).is_some() {
                return Err(invalid(format!("duplicate unit '{id}'")));
            }
        }
        for obstacle in data.obstacles {
            let id = obstacle.id.clone();
            if registry.obstacles.insert(id.clone(), obstacle).is_some() {
                return Err(invalid(format!("duplicate obstacle '{id}'")));
            }
        }
        Ok(registry)
    }

    /// The standard roster, weapons and obstacle table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_tables(ContentData {
            weapons: builtin_weapons(),
            units: builtin_units(),
            obstacles: builtin_obstacles(),
        })
    }

    fn from_tables(data: ContentData) -> Self {
        Self {
            units: data.units.into_iter().map(|u| (u.id.clone(), u)).collect(),
            weapons: data.weapons.into_iter().map(|w| (w.id.clone(), w)).collect(),
            obstacles: data.obstacles.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    /// Unit template by id.
    pub fn unit(&self, id: &str) -> Result<&UnitData> {
        self.units
            .get(id)
            .ok_or_else(|| GameError::UnknownTemplate(id.to_string()))
    }

    /// Weapon definition by id.
    pub fn weapon_data(&self, id: &str) -> Result<&WeaponData> {
        self.weapons
            .get(id)
            .ok_or_else(|| GameError::UnknownWeapon(id.to_string()))
    }

    /// Weapon component for `id`.
    pub fn weapon(&self, id: &str) -> Result<Weapon> {
        self.weapon_data(id).map(WeaponData::to_weapon)
    }

    /// Obstacle type by id.
    pub fn obstacle(&self, id: &str) -> Result<&ObstacleData> {
        self.obstacles
            .get(id)
            .ok_or_else(|| GameError::UnknownObstacleType(id.to_string()))
    }

    /// Template ids in ascending order.
    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Obstacle type ids in ascending order.
    pub fn obstacle_ids(&self) -> impl Iterator<Item = &str> {
        self.obstacles.keys().map(String::as_str)
    }

    /// Unit entity built from `template`.
    pub fn unit_entity(
        &self,
        template: &str,
        faction: Faction,
        position: Position,
        experience_bonus: u32,
    ) -> Result<Entity> {
        let unit = self.unit(template)?;
        let weapon = self.weapon(&unit.weapon)?;
        Ok(unit.to_entity(weapon, faction, position, experience_bonus))
    }

    /// Obstacle entity of type `kind` placed at `at`.
    pub fn obstacle_entity(
        &self,
        kind: &str,
        at: Vec2,
        rotation: f64,
        scale: f64,
        length: Option<f64>,
    ) -> Result<Entity> {
        let data = self.obstacle(kind)?;
        if !at.is_finite() || !(scale.is_finite() && scale > 0.0) || !rotation.is_finite() {
            return Err(invalid(format!("obstacle '{kind}' has a bad placement")));
        }
        let mut entity = Entity::new(0);
        entity.position = Some(Position::new(at).facing(rotation));
        entity.obstacle = Some(data.to_obstacle(rotation, scale, length));
        Ok(entity)
    }
}

fn invalid(message: String) -> GameError {
    GameError::DataParseError {
        path: "content".into(),
        message,
    }
}

fn weapon(
    id: &str,
    name: &str,
    (dice, sides, bonus): (u32, u32, i32),
    speed: i32,
    range: f64,
    ap_cost: u32,
    two_handed: bool,
) -> WeaponData {
    WeaponData {
        id: id.into(),
        name: name.into(),
        damage: DamageFormula { dice, sides, bonus },
        speed,
        range,
        ap_cost,
        two_handed,
    }
}

fn builtin_weapons() -> Vec<WeaponData> {
    vec![
        weapon("sword", "Sword", (1, 8, 1), 3, 1.25, 2, false),
        weapon("spear", "Spear", (1, 8, 0), 2, 2.0, 2, true),
        weapon("greataxe", "Greataxe", (2, 6, 1), 5, 1.25, 3, true),
        weapon("dagger", "Dagger", (1, 4, 1), 1, 1.0, 1, false),
        weapon("shortbow", "Shortbow", (1, 6, 1), 4, 15.0, 2, true),
        weapon("crossbow", "Crossbow", (1, 10, 1), 6, 20.0, 3, true),
        weapon("javelins", "Javelins", (1, 6, 2), 4, 8.0, 2, false),
    ]
}

fn slot(ammo_type: &str, quantity: u32, armor_piercing: i32, damage_bonus: i32) -> AmmoSlot {
    AmmoSlot {
        ammo_type: ammo_type.into(),
        quantity,
        max: quantity,
        armor_piercing,
        damage_bonus,
    }
}

fn armor(head: i32, torso: i32, arms: i32, legs: i32, ap_penalty: u32) -> Armor {
    Armor {
        head,
        torso,
        arms,
        legs,
        ap_penalty,
        stamina_penalty: ap_penalty,
    }
}

fn skills(melee: i32, ranged: i32, block: i32, dodge: i32, parry: i32) -> Skills {
    Skills {
        melee,
        ranged,
        block,
        dodge,
        parry,
    }
}

#[allow(clippy::too_many_lines)]
fn builtin_units() -> Vec<UnitData> {
    let unit = |id: &str, name: &str, health: i32, base_ap: u32, speed: f64, stamina: u32| {
        UnitData {
            id: id.into(),
            name: name.into(),
            health,
            base_ap,
            speed,
            radius: 0.5,
            stamina,
            weapon: String::new(),
            armor: Armor::default(),
            skills: Skills::default(),
            ammo: Vec::new(),
            tags: Vec::new(),
        }
    };
    vec![
        UnitData {
            weapon: "sword".into(),
            armor: armor(2, 3, 2, 1, 0),
            skills: skills(60, 20, 45, 25, 45),
            tags: vec!["infantry".into()],
            ..unit("swordsman", "Swordsman", 20, 6, 6.0, 10)
        },
        UnitData {
            weapon: "spear".into(),
            armor: armor(1, 2, 1, 1, 0),
            skills: skills(55, 20, 30, 25, 40),
            tags: vec!["infantry".into()],
            ..unit("spearman", "Spearman", 22, 6, 5.5, 10)
        },
        UnitData {
            weapon: "shortbow".into(),
            armor: armor(0, 1, 0, 0, 0),
            skills: skills(35, 65, 15, 35, 20),
            ammo: vec![slot("broadhead", 12, 0, 1), slot("bodkin", 6, 2, 0)],
            tags: vec!["missile".into()],
            ..unit("archer", "Archer", 16, 6, 6.5, 12)
        },
        UnitData {
            weapon: "crossbow".into(),
            armor: armor(2, 2, 1, 1, 0),
            skills: skills(35, 60, 20, 25, 20),
            ammo: vec![slot("bolt", 10, 3, 0)],
            tags: vec!["missile".into()],
            ..unit("crossbowman", "Crossbowman", 18, 6, 5.5, 10)
        },
        UnitData {
            weapon: "javelins".into(),
            armor: armor(0, 1, 0, 0, 0),
            skills: skills(45, 55, 15, 45, 20),
            ammo: vec![slot("javelin", 4, 0, 1)],
            tags: vec!["missile".into(), "light".into()],
            ..unit("skirmisher", "Skirmisher", 16, 7, 7.0, 14)
        },
        UnitData {
            weapon: "greataxe".into(),
            armor: armor(1, 4, 2, 2, 0),
            skills: skills(65, 10, 20, 20, 35),
            tags: vec!["infantry".into(), "heavy".into()],
            ..unit("brute", "Brute", 30, 5, 5.0, 12)
        },
    ]
}

fn builtin_obstacles() -> Vec<ObstacleData> {
    let circle = |id: &str, radius: f64, passable: bool, speed_multiplier: f64| ObstacleData {
        id: id.into(),
        footprint: Footprint::Circle { radius },
        passable,
        speed_multiplier,
    };
    let rect = |id: &str, width: f64, depth: f64, passable: bool, speed_multiplier: f64| {
        ObstacleData {
            id: id.into(),
            footprint: Footprint::Rect { width, depth },
            passable,
            speed_multiplier,
        }
    };
    vec![
        circle("tree", 0.5, false, 1.0),
        circle("rock", 0.75, false, 1.0),
        circle("boulder", 1.5, false, 1.0),
        circle("bush", 1.0, true, 0.75),
        rect("wall", 4.0, 0.5, false, 1.0),
        rect("house", 6.0, 5.0, false, 1.0),
        rect("fence", 3.0, 0.2, false, 1.0),
        rect("brook", 8.0, 1.5, true, 0.5),
        circle("mud", 2.0, true, 0.5),
    ]
}
