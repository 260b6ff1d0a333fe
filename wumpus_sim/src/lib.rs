//! Deterministic simulation harness for wumpus sessions.
//!
//! Runs a real [`wumpus_core::Session`] on a single-threaded runtime with a
//! virtual clock. Scripted agents connect through the same feeds a remote
//! player would use, and each scenario asserts one lifecycle guarantee:
//! turn timing, stop latency, reset isolation, disconnect handling and
//! subscription cleanup.
//!
//! # Usage
//!
//! ```ignore
//! use wumpus_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 4).with_turns(10).run(ScenarioId::EarlyStop);
//! assert!(result.passed);
//! ```

mod agent;
mod context;
mod exporter;
mod runner;
pub mod scenarios;

pub use agent::{AgentStats, SimulatedAgent, Strategy};
pub use context::SimContext;
pub use exporter::{SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner, SimConfig};
