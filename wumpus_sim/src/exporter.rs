//! JSON exporter for replaying a simulated game.
//!
//! Exports the spectator frames of one scenario run together with the
//! final standings.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use wumpus_core::Agent;
use wumpus_env::{EnvError, Frame};

/// One spectator frame, stamped with virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    /// Frame index within the export
    pub seq: usize,

    #[serde(flatten)]
    pub frame: Frame,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Virtual duration in milliseconds
    pub duration_ms: u64,

    /// All frames seen by the spectator
    pub frames: Vec<SimFrame>,

    /// Agent records at the end of the run
    pub standings: Vec<Agent>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_ms: 0,
            frames: Vec::new(),
            standings: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: Frame) {
        let seq = self.frames.len();
        self.frames.push(SimFrame { seq, frame });
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, duration_ms: u64, standings: Vec<Agent>, passed: bool, failure_reason: Option<String>) {
        self.duration_ms = duration_ms;
        self.standings = standings;
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), EnvError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_numbered_and_flattened() {
        let mut export = SimExport::new("random_walk", 42);
        export.add_frame(Frame::new("game-running", serde_json::json!({ "state": "RUNNING" })));
        export.add_frame(Frame::new("turn-start", serde_json::json!({ "index": 0 })));
        export.finalize(400, Vec::new(), true, None);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["frames"][1]["seq"], 1);
        assert_eq!(json["frames"][1]["type"], "turn-start");
        assert_eq!(json["frames"][1]["payload"]["index"], 0);
        assert_eq!(json["duration_ms"], 400);
        assert!(json.get("failure_reason").is_none());
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("wumpus-export-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut export = SimExport::new("early_stop", 7);
        export.add_frame(Frame::new("game-stopped", serde_json::Value::Null));
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: SimExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.frames, export.frames);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let export = SimExport::new("early_stop", 7);
        let err = export.write_to_file("/nonexistent-dir/export.json").unwrap_err();
        assert!(matches!(err, EnvError::Io(_)));
    }
}
