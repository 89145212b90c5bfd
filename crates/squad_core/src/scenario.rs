//! Scenario definitions loaded from RON.
//!
//! Maps are centered on the origin: a `(40.0, 30.0)` map spans
//! x in [-20, 20] and z in [-15, 15]. Scenario `z` becomes engine `y`.
//!
//! ```ron
//! Scenario(
//!     id: "ford",
//!     name: "Hold the Ford",
//!     map_size: (40.0, 30.0),
//!     seed: 7,
//!     units: [
//!         (template: "swordsman", faction: player, x: -4.0, z: 0.0),
//!         (template: "archer", faction: enemy, x: 8.0, z: 2.0, facing: 3.14),
//!     ],
//!     obstacles: [
//!         (type: "brook", x: 2.0, z: 0.0, rotation: 1.57, length: 30.0),
//!     ],
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::error::{GameError, Result};
use crate::factions::Faction;

/// One unit to place at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Template id in the content registry.
    pub template: String,
    /// Side.
    pub faction: Faction,
    /// Map x.
    pub x: f64,
    /// Map z (engine y).
    pub z: f64,
    /// Height above ground.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Facing in radians.
    #[serde(default)]
    pub facing: Option<f64>,
    /// Extra action points from experience.
    #[serde(default)]
    pub experience_bonus: u32,
}

/// One obstacle to place at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePlacement {
    /// Obstacle type in the lookup table.
    #[serde(rename = "type")]
    pub kind: String,
    /// Map x.
    pub x: f64,
    /// Map z (engine y).
    pub z: f64,
    /// Rotation in radians.
    #[serde(default)]
    pub rotation: Option<f64>,
    /// Uniform scale.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Long-side length for walls, fences and brooks.
    #[serde(default)]
    pub length: Option<f64>,
}

/// A battle setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable id, recorded in snapshots and replays.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Width and height.
    pub map_size: (f64, f64),
    /// RNG seed.
    pub seed: u64,
    /// Units to spawn.
    pub units: Vec<UnitPlacement>,
    /// Obstacles to spawn.
    #[serde(default)]
    pub obstacles: Vec<ObstaclePlacement>,
    /// Rule overrides. `None` plays by the standard rules.
    #[serde(default)]
    pub rules: Option<RulesConfig>,
}

impl Scenario {
    /// Parse a scenario and check its map.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let scenario: Self = crate::data::ron_options()
            .from_str(source)
            .map_err(|e| GameError::DataParseError {
                path: "scenario".into(),
                message: e.to_string(),
            })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject a map without area and rules the resolver cannot use.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.map_size;
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(GameError::DataParseError {
                path: self.id.clone(),
                message: format!("map size must be positive, got {width} x {height}"),
            });
        }
        if let Some(rules) = &self.rules {
            rules.validate()?;
        }
        Ok(())
    }

    /// True if `(x, z)` lies on the map.
    #[must_use]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        let (half_w, half_h) = (self.map_size.0 / 2.0, self.map_size.1 / 2.0);
        (-half_w..=half_w).contains(&x) && (-half_h..=half_h).contains(&z)
    }

    /// Unit placements that fall off the map.
    pub fn units_off_map(&self) -> impl Iterator<Item = &UnitPlacement> {
        self.units.iter().filter(|u| !self.contains(u.x, u.z))
    }
}
