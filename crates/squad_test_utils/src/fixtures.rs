//! Test fixtures and helpers.
//!
//! Pre-built scenarios and an order script for consistent testing.

use squad_core::combat::attack_reach;
use squad_core::commands::{Command, CommandKind};
use squad_core::components::{EntityId, MovementMode};
use squad_core::data::ContentRegistry;
use squad_core::error::Result;
use squad_core::math::Vec2;
use squad_core::scenario::{ObstaclePlacement, Scenario, UnitPlacement};
use squad_core::simulation::Simulation;

/// Builtin content.
#[must_use]
pub fn registry() -> ContentRegistry {
    ContentRegistry::builtin()
}

/// Unit placement with no facing, elevation or experience.
#[must_use]
pub fn place(template: &str, faction: squad_core::factions::Faction, x: f64, z: f64) -> UnitPlacement {
    UnitPlacement {
        template: template.into(),
        faction,
        x,
        z,
        elevation: None,
        facing: None,
        experience_bonus: 0,
    }
}

/// Swordsman against spearman, `gap` apart on the x axis, facing each other.
#[must_use]
pub fn duel_scenario(seed: u64, gap: f64) -> Scenario {
    use squad_core::factions::Faction;
    Scenario {
        id: "duel".into(),
        name: "Duel".into(),
        map_size: (30.0, 30.0),
        seed,
        units: vec![
            place("swordsman", Faction::Player, 0.0, 0.0),
            UnitPlacement {
                facing: Some(std::f64::consts::PI),
                ..place("spearman", Faction::Enemy, gap, 0.0)
            },
        ],
        obstacles: Vec::new(),
        rules: None,
    }
}

/// Three against three across a brook with some cover.
#[must_use]
pub fn skirmish_scenario(seed: u64) -> Scenario {
    use squad_core::factions::Faction;
    let west = |template: &str, z: f64| place(template, Faction::Player, -10.0, z);
    let east = |template: &str, z: f64| UnitPlacement {
        facing: Some(std::f64::consts::PI),
        ..place(template, Faction::Enemy, 10.0, z)
    };
    let obstacle = |kind: &str, x: f64, z: f64| ObstaclePlacement {
        kind: kind.into(),
        x,
        z,
        rotation: None,
        scale: None,
        length: None,
    };
    Scenario {
        id: "skirmish".into(),
        name: "Skirmish at the Brook".into(),
        map_size: (40.0, 30.0),
        seed,
        units: vec![
            west("swordsman", -3.0),
            west("archer", 0.0),
            west("brute", 3.0),
            east("spearman", -3.0),
            east("crossbowman", 0.0),
            east("skirmisher", 3.0),
        ],
        obstacles: vec![
            ObstaclePlacement {
                rotation: Some(std::f64::consts::FRAC_PI_2),
                length: Some(20.0),
                ..obstacle("brook", 0.0, 0.0)
            },
            obstacle("tree", -4.0, 6.0),
            obstacle("rock", 4.0, -6.0),
            obstacle("bush", 2.0, 2.0),
        ],
        rules: None,
    }
}

/// Session built from `scenario` with builtin content.
///
/// # Panics
///
/// Panics if the scenario names content the builtin registry lacks.
#[must_use]
pub fn load(scenario: &Scenario) -> Simulation {
    Simulation::from_scenario(scenario, &registry()).expect("fixture scenario should load")
}

/// Closest live hostile of `unit`, lowest id on ties.
#[must_use]
pub fn nearest_hostile(sim: &Simulation, unit: EntityId) -> Option<EntityId> {
    let entity = sim.entity(unit)?;
    let from = entity.position?.value;
    let faction = entity.faction?;
    sim.live_units(faction.opponent())
        .into_iter()
        .filter_map(|id| Some((id, sim.entity(id)?.position?.value.distance(from))))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}

/// Every live unit closes on its nearest hostile and attacks it.
///
/// Units already within weapon reach attack twice instead of moving.
/// Rejected orders (AP budget, full queue) are dropped silently.
///
/// # Errors
///
/// Propagates enqueue failures, which only happen outside planning.
pub fn charge_orders(sim: &mut Simulation) -> Result<()> {
    let mut units = sim.live_units(squad_core::factions::Faction::Player);
    units.extend(sim.live_units(squad_core::factions::Faction::Enemy));
    units.sort_unstable();
    for unit in units {
        let Some(target) = nearest_hostile(sim, unit) else {
            continue;
        };
        let (Some(me), Some(them)) = (sim.entity(unit), sim.entity(target)) else {
            continue;
        };
        let reach = attack_reach(me.weapon.as_ref(), sim.config());
        let distance = match (me.position, them.position) {
            (Some(a), Some(b)) => a.value.distance(b.value),
            _ => continue,
        };
        if distance > reach {
            let close = Command::new(CommandKind::MoveAdjacent {
                target,
                mode: MovementMode::Advance,
            });
            sim.enqueue(unit, close)?;
        } else {
            sim.enqueue(unit, Command::attack(target))?;
        }
        sim.enqueue(unit, Command::attack(target))?;
    }
    Ok(())
}

/// Orders that only walk every live unit towards the map centre.
///
/// # Errors
///
/// Propagates enqueue failures, which only happen outside planning.
pub fn march_to_centre(sim: &mut Simulation) -> Result<()> {
    let mut units = sim.live_units(squad_core::factions::Faction::Player);
    units.extend(sim.live_units(squad_core::factions::Faction::Enemy));
    for unit in units {
        sim.enqueue(unit, Command::move_to(Vec2::ZERO, MovementMode::Walk))?;
    }
    Ok(())
}
