//! Movement resolution, facing and engagement.
//!
//! [`plan_move`] turns a requested destination into the displacement a unit
//! can actually achieve: the mode and wounds set the reach, slow terrain
//! near the route shortens it, the pathfinder (or a straight line) gives the
//! route, and the route is then clamped against other live units and
//! blocking obstacles. Planning is pure; the session applies the result.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{EntityId, MovementMode, ObstacleShape};
use crate::config::RulesConfig;
use crate::error::{GameError, Result};
use crate::geometry::{
    line_circle_intersect_t, line_rect_intersect_t, point_segment_distance, OrientedRect,
    CONTACT_TOLERANCE,
};
use crate::math::{angle_between, facing_towards, Vec2};
use crate::pathfinding::{find_path, path_length, trim_path};
use crate::world::{Entity, EntityStorage};

/// Side of a defender an attack comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttackArc {
    /// Within 90 degrees of the defender's facing (the forward half).
    Front,
    /// Within 180 degrees (the back half).
    Side,
    /// Outside both. The shortest-arc angle never exceeds 180 degrees, so
    /// only a facing that cannot be measured lands here.
    Rear,
}

/// Classify where `attacker` stands relative to a defender at
/// `defender_pos` facing `defender_facing`.
#[must_use]
pub fn attack_arc(defender_pos: Vec2, defender_facing: f64, attacker: Vec2) -> AttackArc {
    let Some(bearing) = facing_towards(defender_pos, attacker) else {
        return AttackArc::Front;
    };
    let off = angle_between(bearing, defender_facing).to_degrees();
    if off <= 90.0 + 1e-9 {
        AttackArc::Front
    } else if off <= 180.0 + 1e-9 {
        AttackArc::Side
    } else {
        AttackArc::Rear
    }
}

/// AP charged for turning from `from` to `to`.
#[must_use]
pub fn turn_cost(from: f64, to: f64, config: &RulesConfig) -> u32 {
    if angle_between(from, to) > config.free_turn_angle + 1e-9 {
        config.turn_ap_cost
    } else {
        0
    }
}

/// What a unit was asked to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    /// Requested destination (ignored with `approach`).
    pub target: Vec2,
    /// Movement mode.
    pub mode: MovementMode,
    /// Unit to end up next to.
    pub approach: Option<EntityId>,
}

/// A resolved move, ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    /// Start point.
    pub from: Vec2,
    /// End point after clamping.
    pub to: Vec2,
    /// Waypoints actually travelled, start first.
    pub path: Vec<Vec2>,
    /// Mode after wound restrictions.
    pub mode: MovementMode,
    /// Distance travelled.
    pub distance: f64,
    /// Longest distance the mode allowed.
    pub max_distance: f64,
    /// AP charged.
    pub ap_cost: u32,
    /// Stamina drained.
    pub stamina_cost: u32,
    /// Facing after the move, if it changed.
    pub facing: Option<f64>,
}

impl MovePlan {
    /// True if the unit actually changes position.
    #[must_use]
    pub fn moves(&self, config: &RulesConfig) -> bool {
        self.distance > config.facing_threshold
    }
}

/// Mode after applying the mover's wound cap.
#[must_use]
pub fn effective_mode(entity: &Entity, mode: MovementMode) -> MovementMode {
    match entity.wound_effects.as_ref().and_then(|w| w.movement_cap()) {
        Some(cap) if cap < mode => cap,
        _ => mode,
    }
}

/// Reach of `mode` before terrain: base speed scaled by the mode and by
/// leg wounds.
#[must_use]
pub fn mode_distance(entity: &Entity, mode: MovementMode) -> f64 {
    let Some(unit) = entity.unit.as_ref() else {
        return 0.0;
    };
    let mut distance = unit.base_speed * mode.speed_factor();
    if let Some(wounds) = entity.wound_effects.as_ref() {
        distance *= 1.0 - wounds.movement_penalty();
        if wounds.halves_movement() {
            distance *= 0.5;
        }
    }
    distance.max(0.0)
}

/// Product of the speed multipliers of slow terrain lying within the
/// influence distance of the straight line `from -> to`.
#[must_use]
pub fn terrain_multiplier(world: &EntityStorage, from: Vec2, to: Vec2, config: &RulesConfig) -> f64 {
    world
        .obstacles()
        .filter(|(_, o)| o.passable && o.speed_multiplier < 1.0)
        .filter(|(p, _)| point_segment_distance(p.value, from, to) <= config.terrain_influence)
        .map(|(_, o)| o.speed_multiplier.max(0.0))
        .product()
}

/// AP for moving `distance` in `mode` when the mode's full reach is
/// `max_distance`. Sprint always costs everything left in `available`.
#[must_use]
pub fn move_ap_cost(mode: MovementMode, distance: f64, max_distance: f64, available: u32) -> u32 {
    let Some(mode_ap) = mode.ap_cost() else {
        return available;
    };
    if mode_ap == 0 {
        return 0;
    }
    if max_distance <= 0.0 {
        return mode_ap;
    }
    let meters_per_ap = max_distance / f64::from(mode_ap);
    let raw = (distance / meters_per_ap - 1e-9).ceil();
    (raw.max(1.0) as u32).clamp(1, mode_ap)
}

/// Resolve a move for `mover`.
///
/// `available_ap` only matters for sprint. `map_size` enables pathfinding;
/// without it, or when no path exists, the route is the straight line.
pub fn plan_move(
    world: &EntityStorage,
    mover: EntityId,
    request: &MoveRequest,
    map_size: Option<(f64, f64)>,
    available_ap: u32,
    config: &RulesConfig,
) -> Result<MovePlan> {
    let entity = world.get(mover).ok_or(GameError::EntityNotFound(mover))?;
    let from = entity
        .position
        .filter(|_| entity.is_unit())
        .ok_or(GameError::NotAUnit(mover))?
        .value;

    let mode = effective_mode(entity, request.mode);
    let goal = match request.approach {
        Some(target) => {
            world
                .get(target)
                .and_then(|e| e.position)
                .ok_or(GameError::EntityNotFound(target))?
                .value
        }
        None => request.target,
    };

    let max_distance = mode_distance(entity, mode) * terrain_multiplier(world, from, goal, config);
    let stationary = MovePlan {
        from,
        to: from,
        path: vec![from],
        mode,
        distance: 0.0,
        max_distance,
        ap_cost: 0,
        stamina_cost: 0,
        facing: None,
    };
    if mode == MovementMode::Hold || max_distance <= 0.0 || !goal.is_finite() {
        return Ok(stationary);
    }

    let route = map_size
        .and_then(|size| find_path(world, mover, from, goal, size, request.approach, config))
        .unwrap_or_else(|| {
            if map_size.is_some() {
                debug!(mover, "no path found, falling back to straight line");
            }
            vec![from, goal]
        });
    let route = trim_path(&route, max_distance);
    let mut path = clamp_route(world, mover, &route, config);

    if let Some(target) = request.approach {
        path = back_off(world, mover, target, &path, config);
    }

    let to = path.last().copied().unwrap_or(from);
    let distance = path_length(&path);
    if distance <= config.facing_threshold {
        return Ok(stationary);
    }

    let facing = path
        .windows(2)
        .rev()
        .find_map(|w| facing_towards(w[0], w[1]));

    Ok(MovePlan {
        from,
        to,
        path,
        mode,
        distance,
        max_distance,
        ap_cost: move_ap_cost(mode, distance, max_distance, available_ap),
        stamina_cost: mode.stamina_cost(),
        facing,
    })
}

/// Earliest blocking parameter along `a -> b` for `mover`.
fn first_block(
    world: &EntityStorage,
    mover: EntityId,
    a: Vec2,
    b: Vec2,
    config: &RulesConfig,
) -> Option<f64> {
    let radius = world
        .get(mover)
        .and_then(|e| e.unit.as_ref())
        .map_or(config.default_unit_radius, |u| u.radius);

    let units = world
        .iter()
        .filter(|(&id, e)| id != mover && e.is_alive_unit())
        .filter_map(|(_, e)| e.position)
        .filter_map(|p| line_circle_intersect_t(a, b, p.value, config.unit_separation));

    let obstacles = world
        .obstacles()
        .filter(|(_, o)| !o.passable)
        .filter_map(|(p, o)| match o.shape {
            ObstacleShape::Circle { radius: r } => line_circle_intersect_t(a, b, p.value, r + radius),
            ObstacleShape::Rect {
                half_width,
                half_depth,
                rotation,
            } => line_rect_intersect_t(
                a,
                b,
                &OrientedRect {
                    center: p.value,
                    half_width,
                    half_depth,
                    rotation,
                },
                radius,
            ),
        });

    units.chain(obstacles).fold(None, |best: Option<f64>, t| {
        Some(best.map_or(t, |b| b.min(t)))
    })
}

/// Walk the route and stop at the first collision.
fn clamp_route(
    world: &EntityStorage,
    mover: EntityId,
    route: &[Vec2],
    config: &RulesConfig,
) -> Vec<Vec2> {
    let Some(&start) = route.first() else {
        return Vec::new();
    };
    let mut path = vec![start];
    for w in route.windows(2) {
        match first_block(world, mover, w[0], w[1], config) {
            Some(t) => {
                if t > 0.0 {
                    path.push(w[0].lerp(w[1], t));
                }
                break;
            }
            None => path.push(w[1]),
        }
    }
    path
}

/// True if `point` keeps the separation from every live unit but `mover`.
fn clear_of_units(world: &EntityStorage, mover: EntityId, point: Vec2, config: &RulesConfig) -> bool {
    world
        .iter()
        .filter(|(&id, e)| id != mover && e.is_alive_unit())
        .filter_map(|(_, e)| e.position)
        .all(|p| p.value.distance(point) >= config.unit_separation - CONTACT_TOLERANCE)
}

/// Step back along `path` from its end until the mover would stand clear of
/// the approach target and every other unit. Falls back to the path start.
fn back_off(
    world: &EntityStorage,
    mover: EntityId,
    target: EntityId,
    path: &[Vec2],
    config: &RulesConfig,
) -> Vec<Vec2> {
    let Some(&start) = path.first() else {
        return Vec::new();
    };
    debug_assert!(world.contains(target));
    let total = path_length(path);
    let mut walked_back = 0.0;
    while walked_back <= total {
        let candidate = trim_path(path, total - walked_back);
        if let Some(&point) = candidate.last() {
            if clear_of_units(world, mover, point, config) {
                return candidate;
            }
        }
        walked_back += config.approach_step;
    }
    vec![start]
}

/// Live units within engagement range of each other, whatever their side.
///
/// The relation is symmetric: `b` is in `a`'s set exactly when `a` is in
/// `b`'s. Every live unit gets an entry, possibly empty.
#[must_use]
pub fn compute_engagements(
    world: &EntityStorage,
    config: &RulesConfig,
) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
    let live: Vec<(EntityId, Vec2)> = world
        .iter()
        .filter(|(_, e)| e.is_alive_unit())
        .filter_map(|(&id, e)| Some((id, e.position?.value)))
        .collect();

    let mut engaged: BTreeMap<EntityId, BTreeSet<EntityId>> =
        live.iter().map(|&(id, _)| (id, BTreeSet::new())).collect();
    for (i, &(a, pa)) in live.iter().enumerate() {
        for &(b, pb) in &live[i + 1..] {
            if pa.distance(pb) <= config.engagement_range + CONTACT_TOLERANCE {
                engaged.entry(a).or_default().insert(b);
                engaged.entry(b).or_default().insert(a);
            }
        }
    }
    engaged
}
