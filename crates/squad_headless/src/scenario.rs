//! Loading scenarios, content tables and order scripts from disk.
//!
//! Scenarios and content are RON; scripts are JSON lines in the same
//! format the interactive protocol reads, with blank lines and `#`
//! comments allowed.

use std::path::Path;

use squad_core::data::{ron_options, ContentData, ContentRegistry};
use squad_core::scenario::Scenario;
use tracing::{debug, warn};

use crate::error::{Result, RunnerError};
use crate::protocol::Command;

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RunnerError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Load and validate a scenario file.
///
/// # Errors
///
/// Fails if the file is missing, is not a scenario, or has no map area.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let scenario: Scenario = ron_options().from_str(&read(path)?)?;
    scenario.validate()?;
    let off_map = scenario.units_off_map().count();
    if off_map > 0 {
        warn!(
            scenario = %scenario.id,
            count = off_map,
            "units placed outside the map"
        );
    }
    debug!(
        path = %path.display(),
        id = %scenario.id,
        units = scenario.units.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

/// Load a content file, or the builtin tables when `path` is `None`.
///
/// # Errors
///
/// Fails if the file is missing, malformed, or has inconsistent entries.
pub fn load_content(path: Option<&Path>) -> Result<ContentRegistry> {
    let Some(path) = path else {
        return Ok(ContentRegistry::builtin());
    };
    let data: ContentData = ron_options().from_str(&read(path)?)?;
    let registry = ContentRegistry::from_data(data)?;
    debug!(
        path = %path.display(),
        units = registry.unit_ids().count(),
        "content loaded"
    );
    Ok(registry)
}

/// Parse a script: one protocol command per line.
///
/// # Errors
///
/// Fails on the first line that is not a valid command.
pub fn parse_script(source: &str) -> Result<Vec<Command>> {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| {
            Command::from_json(text).map_err(|e| RunnerError::Script {
                line,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Read and parse a script file.
///
/// # Errors
///
/// Fails if the file is missing or any line is invalid.
pub fn load_script(path: &Path) -> Result<Vec<Command>> {
    parse_script(&read(path)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SCENARIO: &str = r#"Scenario(
        id: "ford",
        name: "Hold the Ford",
        map_size: (40.0, 30.0),
        seed: 7,
        units: [
            (template: "swordsman", faction: player, x: -4.0, z: 0.0),
            (template: "archer", faction: enemy, x: 8.0, z: 2.0, facing: 3.14),
        ],
    )"#;

    #[test]
    fn test_load_scenario_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();
        let scenario = load_scenario(file.path()).unwrap();
        assert_eq!(scenario.id, "ford");
        assert_eq!(scenario.units.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = load_scenario(Path::new("no/such/scenario.ron")).unwrap_err();
        assert!(matches!(err, RunnerError::FileNotFound(_)));
    }

    #[test]
    fn test_bad_map_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let source = SCENARIO.replace("(40.0, 30.0)", "(0.0, 30.0)");
        file.write_all(source.as_bytes()).unwrap();
        let err = load_scenario(file.path()).unwrap_err();
        assert!(matches!(err, RunnerError::Game(_)));
    }

    #[test]
    fn test_builtin_content_without_path() {
        let registry = load_content(None).unwrap();
        assert!(registry.unit("archer").is_ok());
    }

    #[test]
    fn test_parse_script_skips_comments() {
        let script = r#"
            # opening moves
            {"cmd":"enqueue","unit":1,"order":{"kind":"reload"}}

            {"cmd":"end_turn"}
            {"cmd":"hash"}
        "#;
        let commands = parse_script(script).unwrap();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[1], Command::EndTurn { count: 1 }));
    }

    #[test]
    fn test_parse_script_reports_line() {
        let err = parse_script("{\"cmd\":\"query\"}\n{\"cmd\":\"fly\"}").unwrap_err();
        assert!(matches!(err, RunnerError::Script { line: 2, .. }));
    }
}
