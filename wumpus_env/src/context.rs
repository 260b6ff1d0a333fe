//! Core environment context trait for Wumpus Arena sessions.

use async_trait::async_trait;
use rand::rngs::StdRng;
use std::future::Future;
use std::time::Duration;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that a game session can run
/// in both production (tokio timers) and simulation (virtual clock).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, seeded RNG
///
/// # Determinism
///
/// Everything that would normally introduce non-determinism into a game
/// (turn timing, world generation) goes through this trait.
#[async_trait]
pub trait GameContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// This is the turn window: while the turn loop is suspended here,
    /// other tasks keep applying actions against the live world.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// The task starts on the next scheduling opportunity, never inline.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the RNG used to lay out the world of a given generation.
    ///
    /// Simulation combines the master seed with `generation` so that every
    /// reset produces a different but reproducible world.
    ///
    /// # Arguments
    /// * `generation` - The game generation the world is built for
    fn world_rng(&self, generation: u64) -> StdRng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
