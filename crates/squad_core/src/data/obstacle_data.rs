//! Obstacle lookup table entries.

use serde::{Deserialize, Serialize};

use crate::components::{Obstacle, ObstacleShape};

/// Unscaled obstacle outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Footprint {
    /// Round, e.g. trees and rocks.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// Rectangular, e.g. walls and houses. `width` runs along local x.
    Rect {
        /// Full extent along local x.
        width: f64,
        /// Full extent along local y.
        depth: f64,
    },
}

/// One obstacle type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleData {
    /// Type name used by scenarios.
    pub id: String,
    /// Outline at scale 1.
    pub footprint: Footprint,
    /// Units may walk through it.
    #[serde(default)]
    pub passable: bool,
    /// Speed multiplier while crossing.
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
}

const fn default_speed_multiplier() -> f64 {
    1.0
}

impl ObstacleData {
    /// Obstacle component for a placement. `scale` multiplies every extent;
    /// `length` replaces the long side of a rectangle before scaling.
    #[must_use]
    pub fn to_obstacle(&self, rotation: f64, scale: f64, length: Option<f64>) -> Obstacle {
        let shape = match self.footprint {
            Footprint::Circle { radius } => ObstacleShape::Circle {
                radius: radius * scale,
            },
            Footprint::Rect { width, depth } => {
                let (width, depth) = match length {
                    Some(length) if width >= depth => (length, depth),
                    Some(length) => (width, length),
                    None => (width, depth),
                };
                ObstacleShape::Rect {
                    half_width: width * scale / 2.0,
                    half_depth: depth * scale / 2.0,
                    rotation,
                }
            }
        };
        Obstacle {
            kind: self.id.clone(),
            shape,
            passable: self.passable,
            speed_multiplier: self.speed_multiplier,
        }
    }
}
