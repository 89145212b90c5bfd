//! Tunable rules constants.
//!
//! A session owns one [`RulesConfig`]; nothing here is global. The defaults
//! are the standard rules. Overrides can be loaded from RON, where any field
//! left out keeps its default:
//!
//! ```ron
//! RulesConfig(
//!     engagement_range: 1.75,
//!     morale_radius: 10.0,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Rules constants for movement, combat and scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Minimum distance between two live units.
    pub unit_separation: f64,
    /// Distance at which two live units count as engaged.
    pub engagement_range: f64,
    /// Minimum melee reach. Slightly above the separation so units that
    /// closed to minimum distance can still strike.
    pub melee_attack_range: f64,
    /// Collision radius used when a unit has none of its own.
    pub default_unit_radius: f64,
    /// Side length of a pathfinding cell.
    pub path_cell_size: f64,
    /// Slow terrain within this distance of a straight path slows the move.
    pub terrain_influence: f64,
    /// Step used when backing off from an approach target.
    pub approach_step: f64,
    /// Displacement above which a move turns the unit to face its travel.
    pub facing_threshold: f64,
    /// Turns sharper than this (radians) cost an action point.
    pub free_turn_angle: f64,
    /// Action points charged for a sharp turn.
    pub turn_ap_cost: u32,
    /// Allies within this distance test morale when a unit goes down.
    pub morale_radius: f64,
    /// Allies within this distance steady a morale check.
    pub morale_support_radius: f64,
    /// Base morale check target.
    pub base_morale: i32,
    /// Bonus to the check target per supporting ally.
    pub morale_support_bonus: i32,
    /// Morale modifier recorded when a unit is wounded.
    pub wounded_morale_modifier: i32,
    /// Morale modifier recorded when a nearby ally goes down.
    pub ally_down_morale_modifier: i32,
    /// Hit bonus per aim stack.
    pub aim_bonus: i32,
    /// Aim stacks that count.
    pub max_aim_stacks: u32,
    /// Hit bonus from the side arc.
    pub side_arc_bonus: i32,
    /// Hit bonus from the rear arc.
    pub rear_arc_bonus: i32,
    /// Hit penalty per unit of distance beyond half of a ranged weapon's range.
    pub range_penalty_per_unit: i32,
    /// Hit penalty on reaction fire.
    pub overwatch_penalty: i32,
    /// Hit chance floor.
    pub min_hit_chance: i32,
    /// Hit chance ceiling.
    pub max_hit_chance: i32,
    /// Defense chance floor.
    pub min_defense_chance: i32,
    /// Defense chance ceiling.
    pub max_defense_chance: i32,
    /// Extra hit-location weight for an aimed location.
    pub aimed_location_weight: u32,
    /// Extra hit-location weight for an unarmored location.
    pub unarmored_location_weight: u32,
    /// Damage floor for a connecting hit.
    pub min_damage: i32,
    /// Damage at or above which an under-armored hit leaves a lasting wound.
    pub wound_effect_threshold: i32,
    /// Stamina recovered at the end of each resolution pass.
    pub stamina_recovery: u32,
    /// Maximum commands per unit per turn.
    pub max_queue_len: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            unit_separation: 1.0,
            engagement_range: 1.5,
            melee_attack_range: 1.25,
            default_unit_radius: 0.5,
            path_cell_size: 0.5,
            terrain_influence: 2.0,
            approach_step: 0.25,
            facing_threshold: 0.01,
            free_turn_angle: std::f64::consts::FRAC_PI_2,
            turn_ap_cost: 1,
            morale_radius: 8.0,
            morale_support_radius: 2.0,
            base_morale: 50,
            morale_support_bonus: 5,
            wounded_morale_modifier: -10,
            ally_down_morale_modifier: -10,
            aim_bonus: 15,
            max_aim_stacks: 2,
            side_arc_bonus: 10,
            rear_arc_bonus: 20,
            range_penalty_per_unit: 2,
            overwatch_penalty: 10,
            min_hit_chance: 5,
            max_hit_chance: 95,
            min_defense_chance: 5,
            max_defense_chance: 90,
            aimed_location_weight: 30,
            unarmored_location_weight: 5,
            min_damage: 1,
            wound_effect_threshold: 4,
            stamina_recovery: 1,
            max_queue_len: 8,
        }
    }
}

impl RulesConfig {
    /// Parse a config from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = crate::data::ron_options()
            .from_str(source)
            .map_err(|e| GameError::DataParseError {
                path: "rules".into(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the resolver cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("unit_separation", self.unit_separation),
            ("path_cell_size", self.path_cell_size),
            ("approach_step", self.approach_step),
            ("melee_attack_range", self.melee_attack_range),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GameError::InvalidState(format!(
                    "rules field {name} must be positive, got {value}"
                )));
            }
        }
        if self.min_hit_chance > self.max_hit_chance
            || self.min_defense_chance > self.max_defense_chance
        {
            return Err(GameError::InvalidState(
                "rules chance floor above ceiling".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RulesConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.melee_attack_range > config.unit_separation);
    }

    #[test]
    fn test_partial_ron_override() {
        let config = RulesConfig::from_ron_str("(engagement_range: 2.0, max_queue_len: 4)").unwrap();
        assert!((config.engagement_range - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.max_queue_len, 4);
        assert!((config.unit_separation - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RulesConfig::from_ron_str("(path_cell_size: 0.0)").is_err());
        assert!(RulesConfig::from_ron_str("(min_hit_chance: 99, max_hit_chance: 10)").is_err());
        assert!(RulesConfig::from_ron_str("(no_such_field: 1)").is_err());
    }
}
