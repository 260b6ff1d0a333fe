//! Wumpus Arena Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing a game session
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! The turn scheduler never touches a timer, a task spawner or an entropy
//! source directly:
//! - Time (`now()`, `sleep()`)
//! - Tasks (`spawn()`)
//! - Randomness (`world_rng()`)
//!
//! Observers are reached through [`FrameSink`], so the core never knows
//! whether a frame ends up on an HTTP stream, a channel or a test recorder.
//!
//! # Example
//!
//! ```ignore
//! use wumpus_env::{GameContext, TokioContext};
//!
//! async fn turn_loop<Ctx: GameContext>(ctx: &Ctx) {
//!     for i in 0..5 {
//!         announce_turn(i);
//!         ctx.sleep(Duration::from_millis(400)).await;
//!     }
//! }
//! ```

mod context;
mod sink;
mod types;
mod error;
mod tokio_impl;

pub use context::GameContext;
pub use sink::{ChannelSink, FrameSink, RecordingSink};
pub use types::{Frame, SessionId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
