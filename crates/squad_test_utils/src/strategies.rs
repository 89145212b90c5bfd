//! Proptest strategies for orders and placements.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the rules engine.

use proptest::prelude::*;
use squad_core::commands::{Command, CommandKind, Precondition};
use squad_core::components::{BodyLocation, DefensiveStance, EntityId, MovementMode};
use squad_core::factions::Faction;
use squad_core::math::Vec2;
use squad_core::scenario::{Scenario, UnitPlacement};

/// Templates in the builtin roster.
pub const TEMPLATES: [&str; 6] = [
    "swordsman",
    "spearman",
    "archer",
    "crossbowman",
    "skirmisher",
    "brute",
];

/// Generate a coordinate in `[-half, half]`.
pub fn arb_coordinate(half: f64) -> impl Strategy<Value = f64> {
    -half..=half
}

/// Generate a point on a map of `half` half-extent.
pub fn arb_point(half: f64) -> impl Strategy<Value = Vec2> {
    (arb_coordinate(half), arb_coordinate(half)).prop_map(|(x, y)| Vec2::new(x, y))
}

/// Generate an angle in radians.
pub fn arb_angle() -> impl Strategy<Value = f64> {
    -std::f64::consts::PI..std::f64::consts::PI
}

/// Generate any movement mode.
pub fn arb_movement_mode() -> impl Strategy<Value = MovementMode> {
    prop_oneof![
        Just(MovementMode::Hold),
        Just(MovementMode::Walk),
        Just(MovementMode::Advance),
        Just(MovementMode::Run),
        Just(MovementMode::Sprint),
    ]
}

/// Generate a body location.
pub fn arb_location() -> impl Strategy<Value = BodyLocation> {
    proptest::sample::select(BodyLocation::ALL.to_vec())
}

/// Generate a defensive stance.
pub fn arb_stance() -> impl Strategy<Value = DefensiveStance> {
    prop_oneof![
        Just(DefensiveStance::Block),
        Just(DefensiveStance::Dodge),
        Just(DefensiveStance::Parry),
    ]
}

/// Generate an order that names no other unit.
pub fn arb_self_command_kind(half: f64) -> impl Strategy<Value = CommandKind> {
    prop_oneof![
        3 => (arb_point(half), arb_movement_mode())
            .prop_map(|(target, mode)| CommandKind::Move { target, mode }),
        1 => arb_stance().prop_map(|stance| CommandKind::Defend { stance }),
        1 => proptest::option::of(arb_location()).prop_map(|location| CommandKind::Aim { location }),
        1 => (proptest::option::of(arb_angle()), proptest::option::of(0.5f64..6.0))
            .prop_map(|(direction, arc)| CommandKind::Overwatch { direction, arc }),
        1 => arb_angle().prop_map(|facing| CommandKind::Turn { facing }),
        1 => Just(CommandKind::Reload),
    ]
}

/// Generate any order, drawing unit references from `targets`.
///
/// `targets` must not be empty.
pub fn arb_command_kind(targets: Vec<EntityId>, half: f64) -> impl Strategy<Value = CommandKind> {
    let approach_targets = targets.clone();
    prop_oneof![
        4 => arb_self_command_kind(half),
        2 => (proptest::sample::select(approach_targets), arb_movement_mode())
            .prop_map(|(target, mode)| CommandKind::MoveAdjacent { target, mode }),
        3 => (proptest::sample::select(targets), proptest::option::of(arb_location()))
            .prop_map(|(target, aimed_location)| CommandKind::Attack { target, aimed_location }),
    ]
}

/// Generate a precondition referring to `targets`.
pub fn arb_precondition(targets: Vec<EntityId>) -> impl Strategy<Value = Precondition> {
    let dead_targets = targets.clone();
    prop_oneof![
        proptest::sample::select(targets).prop_map(|target| Precondition::InRange { target }),
        proptest::sample::select(dead_targets)
            .prop_map(|target| Precondition::TargetDead { target }),
        (0.5f64..10.0).prop_map(|within| Precondition::EnemyApproaches { within }),
        (1i32..100).prop_map(|percent| Precondition::HpBelow { percent }),
    ]
}

/// Generate a full command, sometimes conditional or reprioritised.
pub fn arb_command(targets: Vec<EntityId>, half: f64) -> impl Strategy<Value = Command> {
    (
        arb_command_kind(targets.clone(), half),
        proptest::option::of(arb_precondition(targets)),
        proptest::option::of(-2i32..10),
    )
        .prop_map(|(kind, precondition, priority)| Command {
            kind,
            precondition,
            priority,
        })
}

/// Generate up to `max_len` orders for one unit.
pub fn arb_command_sequence(
    targets: Vec<EntityId>,
    half: f64,
    max_len: usize,
) -> impl Strategy<Value = Vec<Command>> {
    proptest::collection::vec(arb_command(targets, half), 0..max_len)
}

/// Generate up to `max_units` unit placements on a lattice with `spacing`
/// between points, so no two placements are closer than `spacing`.
pub fn arb_placements(
    max_units: usize,
    spacing: f64,
    half: f64,
) -> impl Strategy<Value = Vec<UnitPlacement>> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let per_row = ((2.0 * half / spacing).floor() as usize).max(1) + 1;
    let cells: Vec<(usize, usize)> = (0..per_row)
        .flat_map(|i| (0..per_row).map(move |j| (i, j)))
        .collect();
    let count = max_units.min(cells.len()).max(2);
    proptest::sample::subsequence(cells, 2..=count)
        .prop_flat_map(move |cells| {
            let n = cells.len();
            (
                Just(cells),
                proptest::collection::vec(
                    (
                        proptest::sample::select(TEMPLATES.to_vec()),
                        proptest::option::of(arb_angle()),
                        0u32..3,
                    ),
                    n,
                ),
            )
        })
        .prop_map(move |(cells, specs)| {
            cells
                .into_iter()
                .zip(specs)
                .enumerate()
                .map(|(index, ((i, j), (template, facing, experience_bonus)))| {
                    #[allow(clippy::cast_precision_loss)]
                    let (x, z) = (i as f64 * spacing - half, j as f64 * spacing - half);
                    UnitPlacement {
                        template: template.to_string(),
                        faction: if index % 2 == 0 {
                            Faction::Player
                        } else {
                            Faction::Enemy
                        },
                        x,
                        z,
                        elevation: None,
                        facing,
                        experience_bonus,
                    }
                })
                .collect()
        })
}

/// Generate an obstacle-free scenario on a square map with a two-unit
/// margin around the placements.
pub fn arb_scenario(max_units: usize, half: f64) -> impl Strategy<Value = Scenario> {
    (any::<u64>(), arb_placements(max_units, 3.0, half)).prop_map(move |(seed, units)| Scenario {
        id: "generated".into(),
        name: "Generated".into(),
        map_size: (2.0 * half + 4.0, 2.0 * half + 4.0),
        seed,
        units,
        obstacles: Vec::new(),
        rules: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_placements_are_spaced() {
        let mut runner = TestRunner::deterministic();
        for _ in 0..32 {
            let placements = arb_placements(8, 3.0, 9.0)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(placements.len() >= 2);
            for (a, rest) in placements.iter().zip(1..) {
                for b in &placements[rest..] {
                    let d = ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt();
                    assert!(d >= 3.0 - 1e-9);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn test_commands_reference_known_targets(
            command in arb_command(vec![3, 4], 10.0)
        ) {
            if let Some(target) = command.kind.target_unit() {
                prop_assert!(target == 3 || target == 4);
            }
        }
    }
}
