//! Agent admission and removal.

use crate::error::{GameError, Result};
use crate::events::{Event, EventBus};
use crate::grid::AgentId;
use crate::percept::Percept;
use crate::scheduler::{lock, Game, GameState, SharedGame};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What happens to an agent that leaves once the game has started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    /// Keep the record (and its grid marker) with `gone` set, so observers
    /// still see its final score
    #[default]
    MarkGone,

    /// Erase the record and its marker
    HardRemove,
}

/// Result of [`AgentRegistry::leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Removed,
    MarkedGone,
    AlreadyGone,
}

/// Joins and leaves for one session.
#[derive(Clone)]
pub struct AgentRegistry {
    game: SharedGame,
    events: EventBus,
    allow_join_after_init: bool,
    removal: RemovalPolicy,
}

impl AgentRegistry {
    pub(crate) fn new(game: SharedGame, events: EventBus, allow_join_after_init: bool, removal: RemovalPolicy) -> Self {
        Self {
            game,
            events,
            allow_join_after_init,
            removal,
        }
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal
    }

    /// Adds an agent at the origin and returns its first percept.
    pub fn join(&self) -> Result<Percept> {
        let mut game = lock(&self.game);
        if !self.allow_join_after_init && game.state != GameState::Init {
            return Err(GameError::logic("Joining is closed once the game has started"));
        }

        let percept = game.world.add_agent()?;
        game.announce(&self.events, Event::NewAgent(percept.agent.clone()));
        info!(agent = percept.agent.id.0, generation = game.generation, "agent joined");
        Ok(percept)
    }

    /// Removes an agent according to the game state and removal policy.
    pub fn leave(&self, id: AgentId) -> Result<LeaveOutcome> {
        let mut game = lock(&self.game);
        self.leave_locked(&mut game, id)
    }

    /// Like [`AgentRegistry::leave`], but only while `generation` is current.
    ///
    /// Returns `None` once a reset has replaced the agent's game.
    pub fn leave_in(&self, id: AgentId, generation: u64) -> Result<Option<LeaveOutcome>> {
        let mut game = lock(&self.game);
        if game.generation != generation {
            return Ok(None);
        }
        self.leave_locked(&mut game, id).map(Some)
    }

    fn leave_locked(&self, game: &mut Game, id: AgentId) -> Result<LeaveOutcome> {
        if game.world.agent(id)?.gone {
            return Ok(LeaveOutcome::AlreadyGone);
        }

        if game.state == GameState::Init || self.removal == RemovalPolicy::HardRemove {
            game.world.remove_agent(id)?;
            game.announce(&self.events, Event::AgentRemoved { agent_id: id });
            info!(agent = id.0, "agent removed");
            Ok(LeaveOutcome::Removed)
        } else {
            let agent = game.world.mark_gone(id)?;
            game.announce(&self.events, Event::NewAgent(agent));
            info!(agent = id.0, "agent marked gone");
            Ok(LeaveOutcome::MarkedGone)
        }
    }
}
