//! Turn lifecycle and the timed turn loop.
//!
//! ```text
//! INIT --run/step--> RUNNING --(count exhausted | stop)--> STOPPING --> STOPPED --reset--> INIT
//! ```
//!
//! The loop narrates time; it does not gate actions. Agents act against the
//! live world at any moment, and the loop only announces turn boundaries.
//! Whatever makes the loop exit (count exhausted, stop requested, a panic in
//! the loop body, the task being dropped) the scheduler ends up STOPPED with
//! `game-stopped` published, unless a reset has since replaced the game.

use crate::config::{SettingsUpdate, TurnSettings};
use crate::error::{GameError, Result};
use crate::events::{Event, EventBus};
use crate::grid::Symbol;
use crate::world::{Agent, GridWorld, WorldConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use wumpus_env::GameContext;

/// Lifecycle state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Init,
    Running,
    Stopping,
    Stopped,
}

/// Observer view of a whole game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub size: usize,
    pub agents: Vec<Agent>,

    /// Non-empty cells only, keyed by flat cell index
    pub grid: BTreeMap<usize, Vec<Symbol>>,

    pub run_turns: u32,

    /// Milliseconds
    pub turn_time: u64,

    pub state: GameState,
    pub generation: u64,
}

// =============================================================================
// SHARED GAME STATE
// =============================================================================

/// Everything a session mutates, behind one lock.
#[derive(Debug)]
pub(crate) struct Game {
    pub(crate) world: GridWorld,
    pub(crate) state: GameState,
    pub(crate) generation: u64,
    pub(crate) settings: TurnSettings,
}

impl Game {
    /// Publishes `event` along with the state it leaves behind.
    pub(crate) fn announce(&self, events: &EventBus, event: Event) -> usize {
        events.publish_with_state(event, || self.snapshot())
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            size: self.world.size(),
            agents: self.world.agents().to_vec(),
            grid: self.world.occupied_cells(),
            run_turns: self.settings.run_turns,
            turn_time: self.settings.turn_time_ms,
            state: self.state,
            generation: self.generation,
        }
    }
}

pub(crate) type SharedGame = Arc<Mutex<Game>>;

/// Never held across an await point.
pub(crate) fn lock(game: &Mutex<Game>) -> MutexGuard<'_, Game> {
    game.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Owns the current world and drives its turn loop.
pub struct TurnScheduler<Ctx: GameContext> {
    context: Arc<Ctx>,
    game: SharedGame,
    events: EventBus,
    world_config: WorldConfig,
}

impl<Ctx: GameContext> Clone for TurnScheduler<Ctx> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            game: self.game.clone(),
            events: self.events.clone(),
            world_config: self.world_config.clone(),
        }
    }
}

impl<Ctx: GameContext> TurnScheduler<Ctx> {
    /// Creates a scheduler holding a generation-0 world in INIT.
    pub fn new(
        context: Arc<Ctx>,
        events: EventBus,
        world_config: WorldConfig,
        settings: TurnSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let world = GridWorld::generate(world_config.clone(), &mut context.world_rng(0))?;
        let game = Game {
            world,
            state: GameState::Init,
            generation: 0,
            settings,
        };
        Ok(Self {
            context,
            game: Arc::new(Mutex::new(game)),
            events,
            world_config,
        })
    }

    pub(crate) fn shared(&self) -> SharedGame {
        self.game.clone()
    }

    pub(crate) fn lock_game(&self) -> MutexGuard<'_, Game> {
        lock(&self.game)
    }

    pub fn state(&self) -> GameState {
        self.lock_game().state
    }

    pub fn generation(&self) -> u64 {
        self.lock_game().generation
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock_game().snapshot()
    }

    pub fn settings(&self) -> TurnSettings {
        self.lock_game().settings
    }

    /// Adjusts run length and turn time. A running loop picks up the new
    /// turn time at its next turn.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<TurnSettings> {
        let mut game = self.lock_game();
        game.settings = game.settings.merged(update)?;
        info!(run_turns = game.settings.run_turns, turn_time_ms = game.settings.turn_time_ms, "settings updated");
        Ok(game.settings)
    }

    /// Starts the turn loop and returns the snapshot at start.
    ///
    /// The loop itself begins on the next scheduling opportunity.
    pub fn run(&self, turns: Option<u32>) -> Result<Snapshot> {
        let mut game = self.lock_game();
        match game.state {
            GameState::Running => return Err(GameError::logic("Game already running")),
            GameState::Stopping => return Err(GameError::logic("Game is still stopping")),
            GameState::Init | GameState::Stopped => {}
        }
        if game.world.population() == 0 {
            return Err(GameError::logic("Game can't run with no agents"));
        }

        let turns = turns.unwrap_or(game.settings.run_turns);
        let generation = game.generation;
        game.state = GameState::Running;
        let snapshot = game.snapshot();
        drop(game);

        info!(generation, turns, "game run requested");
        let this = self.clone();
        self.context
            .spawn("turn-loop", async move { this.turn_loop(generation, turns).await });
        Ok(snapshot)
    }

    /// Runs exactly one turn.
    pub fn step(&self) -> Result<Snapshot> {
        self.run(Some(1))
    }

    /// Asks a running loop to stop at its next turn boundary.
    pub fn stop(&self) {
        let mut game = self.lock_game();
        if game.state == GameState::Running {
            game.state = GameState::Stopping;
            info!(generation = game.generation, "game stop requested");
        }
    }

    /// Replaces the world with a fresh one and returns to INIT.
    pub fn reset(&self) -> Result<Snapshot> {
        let mut game = self.lock_game();
        let generation = game.generation + 1;
        let world = GridWorld::generate(self.world_config.clone(), &mut self.context.world_rng(generation))?;

        game.world = world;
        game.generation = generation;
        game.state = GameState::Init;
        game.announce(&self.events, Event::NewGame);
        debug!("\n{}", game.world.render());
        info!(generation, "new game");
        Ok(game.snapshot())
    }

    async fn turn_loop(self, generation: u64, turns: u32) {
        let _guard = StopGuard {
            game: self.game.clone(),
            events: self.events.clone(),
            generation,
        };

        {
            let game = self.lock_game();
            if game.generation != generation {
                return;
            }
            game.announce(&self.events, Event::GameRunning);
        }
        info!(generation, turns, "game running");

        for index in 0..turns {
            let turn_time = {
                let game = self.lock_game();
                if game.generation != generation || game.state != GameState::Running {
                    break;
                }
                game.announce(&self.events, Event::TurnStart { index });
                game.settings.turn_time()
            };
            debug!(generation, index, at_ms = self.context.now().as_millis() as u64, "turn start");

            self.context.sleep(turn_time).await;

            let game = self.lock_game();
            if game.generation != generation {
                break;
            }
            game.announce(&self.events, Event::TurnEnd { index });
        }
    }
}

/// Moves the game to STOPPED when the turn loop exits, however it exits.
struct StopGuard {
    game: SharedGame,
    events: EventBus,
    generation: u64,
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        let mut game = lock(&self.game);
        if game.generation != self.generation {
            debug!(generation = self.generation, "stale turn loop exited");
            return;
        }
        if std::thread::panicking() {
            warn!(generation = self.generation, "turn loop aborted");
        }
        game.state = GameState::Stopped;
        game.announce(&self.events, Event::GameStopped);
        info!(generation = self.generation, "game stopped");
    }
}
