//! Headless battle runner for scripted play, AI controllers and CI.
//!
//! A session is driven by JSON commands on stdin, with responses and
//! resolved events on stdout. This enables:
//!
//! - **AI testing**: A controller can play battles turn by turn
//! - **CI verification**: Scripts are re-run and must end identically
//! - **Replay verification**: Recorded battles must reproduce their end state
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (enqueue, end_turn, query, etc.)
//! - **stdout**: Responses and events (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"end_turn","count":3}' | cargo run -p squad_headless
//!
//! # Run a scenario with a script
//! cargo run -p squad_headless -- run --scenario scenarios/ford.ron --script scenarios/ford.jsonl
//!
//! # Verify determinism
//! cargo run -p squad_headless -- verify --scenario scenarios/ford.ron --script scenarios/ford.jsonl
//! ```

pub mod error;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod verify;

pub use error::{Result, RunnerError};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{load_content, load_scenario, load_script};
pub use verify::{verify_script, VerifyReport};
