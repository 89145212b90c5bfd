//! Headless runner: one session driven by protocol commands.

use std::io::{BufRead, Write};
use std::path::Path;

use squad_core::data::ContentRegistry;
use squad_core::replay::Replay;
use squad_core::scenario::Scenario;
use squad_core::simulation::Simulation;
use squad_core::snapshot::Snapshot;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{Command, Response, UnitState, PROTOCOL_VERSION};

/// Runner options.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output the full state after every resolved turn.
    pub auto_state_output: bool,
}

/// A session plus the content it was built from and an optional recording.
pub struct HeadlessRunner {
    sim: Simulation,
    registry: ContentRegistry,
    config: HeadlessConfig,
    recording: Option<Replay>,
}

impl HeadlessRunner {
    /// Wrap an existing session. Its current state becomes the reset point
    /// unless one was already recorded.
    ///
    /// # Errors
    ///
    /// Fails if the reset point cannot be encoded.
    pub fn new(
        mut sim: Simulation,
        registry: ContentRegistry,
        config: HeadlessConfig,
    ) -> Result<Self> {
        if sim.initial_state().is_none() {
            sim.mark_initial_state()?;
        }
        Ok(Self {
            sim,
            registry,
            config,
            recording: None,
        })
    }

    /// Session built from `scenario`.
    ///
    /// # Errors
    ///
    /// Fails if the scenario names content `registry` lacks.
    pub fn from_scenario(
        scenario: &Scenario,
        registry: ContentRegistry,
        config: HeadlessConfig,
    ) -> Result<Self> {
        let sim = Simulation::from_scenario(scenario, &registry)?;
        info!(
            scenario = %scenario.id,
            seed = scenario.seed,
            units = scenario.units.len(),
            "session created"
        );
        Self::new(sim, registry, config)
    }

    /// The session.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Start recording orders from the current state.
    ///
    /// # Errors
    ///
    /// Fails if the state cannot be encoded.
    pub fn start_recording(&mut self) -> Result<()> {
        let scenario = self.sim.scenario_id().unwrap_or("sandbox").to_string();
        let seed = self.sim.random_state().seed;
        self.recording = Some(Replay::new(scenario, seed, &self.sim)?);
        debug!(turn = self.sim.turn(), "recording started");
        Ok(())
    }

    /// Stop recording and return the finished replay.
    pub fn take_recording(&mut self) -> Option<Replay> {
        let mut replay = self.recording.take()?;
        replay.finalize(self.sim.turn(), self.sim.state_hash());
        Some(replay)
    }

    /// Greeting sent before the first command.
    #[must_use]
    pub fn ready(&self) -> Response {
        Response::Ready {
            version: PROTOCOL_VERSION.to_string(),
            turn: self.sim.turn(),
            scenario: self.sim.scenario_id().map(str::to_string),
        }
    }

    /// Current state summary.
    #[must_use]
    pub fn state(&self) -> Response {
        Response::State {
            turn: self.sim.turn(),
            phase: self.sim.phase(),
            units: self
                .sim
                .entities()
                .iter()
                .filter_map(|(_, entity)| UnitState::from_entity(entity))
                .collect(),
            hash: self.sim.state_hash(),
        }
    }

    /// Apply one command. Failures become an `error` response.
    pub fn handle(&mut self, cmd: &Command) -> Vec<Response> {
        match self.apply(cmd) {
            Ok(responses) => responses,
            Err(e) => {
                warn!(cmd = cmd.name(), error = %e, "command failed");
                vec![Response::error(e.to_string(), Some(cmd.name()))]
            }
        }
    }

    fn apply(&mut self, cmd: &Command) -> Result<Vec<Response>> {
        let ack = || {
            vec![Response::Ack {
                cmd: cmd.name().to_string(),
            }]
        };
        match cmd {
            Command::Enqueue { unit, order } => {
                let accepted = self.sim.enqueue(*unit, order.clone())?;
                let ap_queued = self
                    .sim
                    .entity(*unit)
                    .and_then(|e| e.command_queue.as_ref())
                    .map_or(0, squad_core::commands::CommandQueue::total_ap);
                Ok(vec![Response::Queued {
                    unit: *unit,
                    accepted,
                    ap_queued,
                }])
            }
            Command::Remove { unit, index } => {
                if self.sim.remove_command(*unit, *index)? {
                    Ok(ack())
                } else {
                    Ok(vec![Response::error(
                        format!("unit {unit} has no order at index {index}"),
                        Some(cmd.name()),
                    )])
                }
            }
            Command::Clear { unit } => {
                self.sim.clear_queue(*unit)?;
                Ok(ack())
            }
            Command::EndTurn { count } => self.end_turns(*count),
            Command::Query => Ok(vec![self.state()]),
            Command::Log { turn } => Ok(self.logged(*turn)),
            Command::Hash => Ok(vec![Response::StateHash {
                turn: self.sim.turn(),
                hash: self.sim.state_hash(),
            }]),
            Command::Save { path } => {
                std::fs::write(path, self.sim.snapshot().to_json()?)?;
                info!(path = %path, turn = self.sim.turn(), "snapshot saved");
                Ok(ack())
            }
            Command::Load { path } => {
                self.load(Path::new(path))?;
                Ok(vec![self.state()])
            }
            Command::Reset => {
                self.sim.reset()?;
                self.restart_recording()?;
                Ok(vec![self.state()])
            }
            Command::Quit => Ok(vec![Response::Bye]),
        }
    }

    fn end_turns(&mut self, count: u32) -> Result<Vec<Response>> {
        let mut responses = Vec::new();
        for _ in 0..count.max(1) {
            let turn = self.sim.turn();
            if let Some(replay) = self.recording.as_mut() {
                replay.record_turn(turn, self.sim.queued_orders());
            }
            let events = self.sim.advance()?;
            debug!(turn, events = events.len(), "turn resolved");
            responses.push(Response::Events { turn, events });
            if self.config.auto_state_output {
                responses.push(self.state());
            }
        }
        Ok(responses)
    }

    /// One turn's events, or every turn that logged anything.
    fn logged(&self, turn: Option<u32>) -> Vec<Response> {
        let events_for = |turn: u32| -> Vec<_> { self.sim.log().for_turn(turn).cloned().collect() };
        match turn {
            Some(turn) => vec![Response::Events {
                turn,
                events: events_for(turn),
            }],
            None => (1..=self.sim.turn())
                .map(|turn| (turn, events_for(turn)))
                .filter(|(_, events)| !events.is_empty())
                .map(|(turn, events)| Response::Events { turn, events })
                .collect(),
        }
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let snapshot = Snapshot::from_json(&json)?;
        let mut sim = Simulation::restore(snapshot, Some(&self.registry))?;
        sim.mark_initial_state()?;
        self.sim = sim;
        info!(path = %path.display(), turn = self.sim.turn(), "snapshot loaded");
        self.restart_recording()
    }

    /// Recorded turns must follow on from each other, so a jump in state
    /// starts a fresh recording.
    fn restart_recording(&mut self) -> Result<()> {
        if self.recording.is_some() {
            warn!("session state replaced, recording restarted");
            self.start_recording()?;
        }
        Ok(())
    }

    /// Apply `script` in order, stopping after `quit`.
    pub fn run_script(&mut self, script: &[Command]) -> Vec<Response> {
        let mut responses = Vec::new();
        for cmd in script {
            responses.extend(self.handle(cmd));
            if matches!(cmd, Command::Quit) {
                break;
            }
        }
        responses
    }

    /// Serve JSON lines from `input` until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Fails only on I/O errors. Bad lines are answered with `error`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        write_response(&mut output, &self.ready())?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let cmd = match Command::from_json(line) {
                Ok(cmd) => cmd,
                Err(e) => {
                    write_response(
                        &mut output,
                        &Response::error(format!("Invalid command: {e}"), None),
                    )?;
                    continue;
                }
            };

            for response in self.handle(&cmd) {
                write_response(&mut output, &response)?;
            }
            if matches!(cmd, Command::Quit) {
                info!(turn = self.sim.turn(), "quit requested");
                break;
            }
        }
        Ok(())
    }
}

/// Write one response line and flush.
///
/// # Errors
///
/// Fails on I/O errors or if the response cannot be encoded.
pub fn write_response<W: Write>(output: &mut W, response: &Response) -> Result<()> {
    output.write_all(response.to_json_line()?.as_bytes())?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use squad_core::commands::Command as Order;
    use squad_core::components::MovementMode;
    use squad_core::math::Vec2;
    use squad_test_utils::fixtures::{duel_scenario, registry};

    use super::*;

    fn duel_runner() -> HeadlessRunner {
        HeadlessRunner::from_scenario(&duel_scenario(3, 6.0), registry(), HeadlessConfig::default())
            .unwrap()
    }

    fn step() -> Command {
        Command::Enqueue {
            unit: 1,
            order: Order::move_to(Vec2::new(2.0, 0.0), MovementMode::Walk),
        }
    }

    #[test]
    fn test_enqueue_reports_queue_cost() {
        let mut runner = duel_runner();
        let responses = runner.handle(&step());
        assert_eq!(
            responses,
            vec![Response::Queued {
                unit: 1,
                accepted: true,
                ap_queued: 1,
            }]
        );
    }

    #[test]
    fn test_end_turn_reports_events() {
        let mut runner = duel_runner();
        runner.handle(&step());
        let responses = runner.handle(&Command::EndTurn { count: 2 });
        assert_eq!(responses.len(), 2);
        let Response::Events { turn, events } = &responses[0] else {
            panic!("expected events");
        };
        assert_eq!(*turn, 1);
        assert!(!events.is_empty());
        assert_eq!(runner.simulation().turn(), 3);
    }

    #[test]
    fn test_errors_become_responses() {
        let mut runner = duel_runner();
        let responses = runner.handle(&Command::Clear { unit: 99 });
        assert!(matches!(
            &responses[0],
            Response::Error { cmd: Some(cmd), .. } if cmd == "clear"
        ));
        let responses = runner.handle(&Command::Remove { unit: 1, index: 0 });
        assert!(matches!(responses[0], Response::Error { .. }));
    }

    #[test]
    fn test_query_lists_units() {
        let runner = duel_runner();
        let Response::State { units, turn, .. } = runner.state() else {
            panic!("expected state");
        };
        assert_eq!(turn, 1);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].template, "swordsman");
        assert_eq!(units[1].x, 6.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json").display().to_string();

        let mut runner = duel_runner();
        runner.handle(&step());
        runner.handle(&Command::EndTurn { count: 1 });
        runner.handle(&Command::Save { path: path.clone() });
        let saved = runner.simulation().state_hash();

        runner.handle(&Command::EndTurn { count: 2 });
        assert_ne!(runner.simulation().turn(), 2);
        runner.handle(&Command::Load { path });
        assert_eq!(runner.simulation().turn(), 2);
        assert_eq!(runner.simulation().state_hash(), saved);
    }

    #[test]
    fn test_reset_returns_to_start() {
        let mut runner = duel_runner();
        let start = runner.simulation().state_hash();
        runner.handle(&step());
        runner.handle(&Command::EndTurn { count: 1 });
        runner.handle(&Command::Reset);
        assert_eq!(runner.simulation().state_hash(), start);
    }

    #[test]
    fn test_recording_replays() {
        let mut runner = duel_runner();
        runner.start_recording().unwrap();
        runner.handle(&step());
        runner.handle(&Command::EndTurn { count: 3 });
        let replay = runner.take_recording().unwrap();
        assert_eq!(replay.duration(), 3);
        assert_eq!(replay.order_count(), 1);
        assert!(replay.verify().unwrap());
    }

    #[test]
    fn test_run_serves_lines() {
        let input = concat!(
            "{\"cmd\":\"hash\"}\n",
            "\n",
            "not json\n",
            "{\"cmd\":\"quit\"}\n",
            "{\"cmd\":\"query\"}\n",
        );
        let mut output = Vec::new();
        duel_runner().run(input.as_bytes(), &mut output).unwrap();

        let lines: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| Response::from_json(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert!(matches!(lines[0], Response::Ready { turn: 1, .. }));
        assert!(matches!(lines[1], Response::StateHash { turn: 1, .. }));
        assert!(matches!(lines[2], Response::Error { cmd: None, .. }));
        assert_eq!(lines[3], Response::Bye);
    }
}
