//! Weapon definitions.

use serde::{Deserialize, Serialize};

use crate::components::{DamageFormula, Weapon};

/// Data-driven weapon definition.
///
/// ```ron
/// WeaponData(
///     id: "crossbow",
///     name: "Crossbow",
///     damage: (dice: 1, sides: 10, bonus: 1),
///     speed: 6,
///     range: 20.0,
///     ap_cost: 3,
///     two_handed: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    /// Unique weapon id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Damage roll.
    pub damage: DamageFormula,
    /// Attack priority; lower strikes first.
    pub speed: i32,
    /// Reach in world units. Above three counts as ranged.
    pub range: f64,
    /// Action points per attack.
    pub ap_cost: u32,
    /// Needs both hands.
    #[serde(default)]
    pub two_handed: bool,
}

impl WeaponData {
    /// Weapon component for a unit wielding this.
    #[must_use]
    pub fn to_weapon(&self) -> Weapon {
        Weapon {
            name: self.name.clone(),
            damage: self.damage,
            speed: self.speed,
            range: self.range,
            ap_cost: self.ap_cost,
            two_handed: self.two_handed,
        }
    }

    /// Reject definitions the resolver cannot use.
    pub(crate) fn problem(&self) -> Option<String> {
        if self.damage.dice == 0 || self.damage.sides == 0 {
            return Some(format!("weapon '{}' rolls no dice", self.id));
        }
        if !(self.range.is_finite() && self.range > 0.0) {
            return Some(format!("weapon '{}' has no reach", self.id));
        }
        None
    }
}
