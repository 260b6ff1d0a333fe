//! Wumpus Arena Core - multiplayer wumpus world runtime
//!
//! Agents wander a hidden grid of pits, monsters and gold, acting whenever
//! they like while a timed turn loop narrates the game to any number of
//! observers.
//!
//! Layers, leaf first:
//! 1. **Rules**: [`GridWorld`] owns cells and agent records; actions and
//!    percepts are plain synchronous functions over it
//! 2. **Runtime**: [`TurnScheduler`] drives the INIT/RUNNING/STOPPING/STOPPED
//!    lifecycle, [`AgentRegistry`] admits and removes agents, [`EventBus`]
//!    announces everything on named channels
//! 3. **Surface**: [`Session`] bundles one of each, and the feeds in [`feed`]
//!    turn bus events into frames for agent and spectator connections

pub mod action;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod grid;
pub mod percept;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod world;

// Re-export key types for convenience
pub use action::Action;
pub use config::{SessionConfig, SettingsUpdate, TurnSettings};
pub use error::{GameError, Result};
pub use events::{Channel, Delivery, Event, EventBus, Subscription};
pub use feed::{pump, AgentFeed, ObserverFeed, PumpEnd, PumpOutcome, ViewerFeed};
pub use grid::{AgentId, Direction, Location, Symbol};
pub use percept::{Percept, Signal};
pub use registry::{AgentRegistry, LeaveOutcome, RemovalPolicy};
pub use scheduler::{GameState, Snapshot, TurnScheduler};
pub use session::Session;
pub use world::{Agent, GridWorld, WorldConfig, WorldMeta};
