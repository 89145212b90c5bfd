//! Property tests for determinism, persistence and the movement and
//! budget invariants, over generated battles.

use proptest::prelude::*;
use squad_core::geometry::CONTACT_TOLERANCE;
use squad_core::prelude::*;
use squad_core::snapshot::Snapshot;
use squad_test_utils::strategies::{arb_command, arb_scenario};

/// Orders for one turn: (unit index, command).
type TurnOrders = Vec<(usize, Command)>;

fn arb_game() -> impl Strategy<Value = (Scenario, Vec<TurnOrders>)> {
    arb_scenario(6, 6.0).prop_flat_map(|scenario| {
        let n = scenario.units.len();
        let targets: Vec<EntityId> = (1..=n as u64).collect();
        let turn = proptest::collection::vec((0..n, arb_command(targets, 8.0)), 0..10);
        (Just(scenario), proptest::collection::vec(turn, 1..4))
    })
}

fn load(scenario: &Scenario) -> Simulation {
    Simulation::from_scenario(scenario, &ContentRegistry::builtin()).unwrap()
}

fn plan(sim: &mut Simulation, orders: &TurnOrders) {
    for (index, command) in orders {
        // units are spawned first, so ids follow placement order
        let unit = *index as EntityId + 1;
        sim.enqueue(unit, command.clone()).unwrap();
    }
}

fn play(sim: &mut Simulation, turns: &[TurnOrders]) {
    for orders in turns {
        plan(sim, orders);
        sim.advance().unwrap();
    }
}

fn log_json(sim: &Simulation) -> String {
    serde_json::to_string(sim.log().events()).unwrap()
}

fn live_positions(sim: &Simulation) -> Vec<Vec2> {
    sim.entities()
        .iter()
        .filter(|(_, e)| e.is_alive_unit())
        .filter_map(|(_, e)| e.position.map(|p| p.value))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_same_orders_same_log((scenario, turns) in arb_game()) {
        let mut a = load(&scenario);
        let mut b = load(&scenario);
        play(&mut a, &turns);
        play(&mut b, &turns);
        prop_assert_eq!(log_json(&a), log_json(&b));
        prop_assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_snapshot_midgame_continues_identically((scenario, turns) in arb_game()) {
        let split = turns.len() / 2;
        let mut straight = load(&scenario);
        play(&mut straight, &turns);

        let mut first = load(&scenario);
        play(&mut first, &turns[..split]);
        let json = first.snapshot().to_json().unwrap();
        let snapshot = Snapshot::from_json(&json).unwrap();
        let mut resumed = Simulation::restore(snapshot, Some(&ContentRegistry::builtin())).unwrap();
        prop_assert_eq!(resumed.random_state(), first.random_state());
        play(&mut resumed, &turns[split..]);

        prop_assert_eq!(resumed.state_hash(), straight.state_hash());
        prop_assert_eq!(log_json(&resumed), log_json(&straight));
    }

    #[test]
    fn test_moves_keep_separation((scenario, turns) in arb_game()) {
        let mut sim = load(&scenario);
        let separation = sim.config().unit_separation;
        for orders in &turns {
            plan(&mut sim, orders);
            sim.advance().unwrap();
            let positions = live_positions(&sim);
            for (i, a) in positions.iter().enumerate() {
                for b in &positions[i + 1..] {
                    prop_assert!(a.distance(*b) >= separation - CONTACT_TOLERANCE);
                }
            }
        }
    }

    #[test]
    fn test_ap_budget_holds((scenario, turns) in arb_game()) {
        let mut sim = load(&scenario);
        for orders in &turns {
            plan(&mut sim, orders);
            for (id, entity) in sim.entities().iter().filter(|(_, e)| e.is_unit()) {
                let max = entity.action_points.map_or(0, |ap| ap.max);
                let queued = entity.command_queue.as_ref().map_or(0, |q| q.total_ap());
                prop_assert!(queued <= max, "unit {} queued {} of {}", id, queued, max);
            }
            let turn = sim.turn();
            sim.advance().unwrap();

            for (&id, entity) in sim.entities().iter().filter(|(_, e)| e.is_unit()) {
                let max = entity.action_points.map_or(0, |ap| ap.max);
                let spent: u32 = sim
                    .log()
                    .for_turn(turn)
                    .filter(|e| e.actor == Some(id))
                    .map(|e| match e.kind {
                        GameEventKind::UnitMoved { ap_cost, .. }
                        | GameEventKind::UnitTurned { ap_cost, .. } => ap_cost,
                        _ => 0,
                    })
                    .sum();
                prop_assert!(spent <= max);
                // refilled for the next planning phase
                prop_assert_eq!(entity.action_points.map(|ap| ap.current), Some(max));
            }
        }
    }

    #[test]
    fn test_wound_state_derivation(max in 1i32..500, a in -50i32..500, b in -50i32..500) {
        let (low, high) = (a.min(b), a.max(b));
        let worse = Health::with_values(low, max);
        let better = Health::with_values(high, max);
        prop_assert!(worse.wound_state() >= better.wound_state());
        prop_assert!(worse.is_consistent());
        prop_assert_eq!(
            Health::with_values(worse.current(), worse.max()).wound_state(),
            worse.wound_state()
        );
        prop_assert_eq!(worse.is_down(), low <= 0);
    }
}
