//! Resolution and pathfinding benchmarks for squad_core.
//!
//! Run with: `cargo bench -p squad_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use squad_core::commands::{Command, CommandKind};
use squad_core::components::{MovementMode, Position};
use squad_core::config::RulesConfig;
use squad_core::data::ContentRegistry;
use squad_core::factions::Faction;
use squad_core::math::Vec2;
use squad_core::pathfinding::find_path;
use squad_core::simulation::Simulation;

/// Two lines of `per_side` units facing each other across a field of trees,
/// every player unit ordered to close and strike its opposite number.
fn battle(per_side: usize) -> Simulation {
    let registry = ContentRegistry::builtin();
    let mut sim = Simulation::new(1234);
    sim.set_map_size(Some((60.0, 60.0)));
    let mut pairs = Vec::with_capacity(per_side);
    for i in 0..per_side {
        #[allow(clippy::cast_precision_loss)]
        let y = i as f64 * 2.5 - 20.0;
        let ours = sim
            .spawn_unit(
                &registry,
                "swordsman",
                Faction::Player,
                Position::new(Vec2::new(-12.0, y)),
                0,
            )
            .unwrap();
        let theirs = sim
            .spawn_unit(
                &registry,
                "spearman",
                Faction::Enemy,
                Position::new(Vec2::new(12.0, y)).facing(std::f64::consts::PI),
                0,
            )
            .unwrap();
        pairs.push((ours, theirs));
    }
    for i in 0..6 {
        let y = f64::from(i) * 6.0 - 15.0;
        sim.spawn_obstacle(&registry, "tree", Vec2::new(0.0, y), 0.0, 1.0, None)
            .unwrap();
    }
    for (ours, theirs) in pairs {
        let close = Command::new(CommandKind::MoveAdjacent {
            target: theirs,
            mode: MovementMode::Advance,
        });
        sim.enqueue(ours, close).unwrap();
        sim.enqueue(ours, Command::attack(theirs)).unwrap();
    }
    sim
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for per_side in [2usize, 8, 16] {
        let sim = battle(per_side);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{per_side}_per_side")),
            &per_side,
            |b, _| {
                b.iter(|| {
                    let mut sim = sim.clone();
                    sim.end_planning_phase().unwrap();
                    black_box(sim.resolve_phase().unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_pathfinding(c: &mut Criterion) {
    let sim = battle(8);
    let config = RulesConfig::default();
    let mover = sim.roster().player[0];
    let from = sim.entity(mover).unwrap().position.unwrap().value;

    c.bench_function("find_path_across_trees", |b| {
        b.iter(|| {
            black_box(find_path(
                sim.entities(),
                mover,
                black_box(from),
                Vec2::new(20.0, 18.0),
                (60.0, 60.0),
                None,
                &config,
            ))
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let sim = battle(16);
    c.bench_function("snapshot_to_bytes", |b| {
        b.iter(|| black_box(sim.snapshot().to_bytes().unwrap()));
    });
}

criterion_group!(benches, bench_resolution, bench_pathfinding, bench_snapshot);
criterion_main!(benches);
