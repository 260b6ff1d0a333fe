//! One game instance: a scheduler, a registry and the bus that joins them.
//!
//! A [`Session`] is the surface the outside world talks to. Each call runs to
//! completion under the session lock, so callers never see half-applied
//! actions, and every event it causes is published before the call returns.

use crate::action::Action;
use crate::config::{SessionConfig, SettingsUpdate, TurnSettings};
use crate::error::{GameError, Result};
use crate::events::{Channel, EventBus, Subscription};
use crate::feed::{pump, AgentFeed, PumpOutcome, ViewerFeed};
use crate::grid::AgentId;
use crate::percept::Percept;
use crate::registry::{AgentRegistry, LeaveOutcome};
use crate::scheduler::{GameState, Snapshot, TurnScheduler};
use crate::world::{Agent, WorldMeta};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use wumpus_env::{FrameSink, GameContext, SessionId};

pub struct Session<Ctx: GameContext> {
    id: SessionId,
    events: EventBus,
    scheduler: TurnScheduler<Ctx>,
    registry: AgentRegistry,
}

impl<Ctx: GameContext> Clone for Session<Ctx> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            events: self.events.clone(),
            scheduler: self.scheduler.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<Ctx: GameContext> Session<Ctx> {
    pub fn new(context: Arc<Ctx>, config: SessionConfig) -> Result<Self> {
        Self::with_id(SessionId::new(), context, config)
    }

    pub fn with_id(id: SessionId, context: Arc<Ctx>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new();
        let scheduler = TurnScheduler::new(context, events.clone(), config.world, config.turns)?;
        let registry = AgentRegistry::new(
            scheduler.shared(),
            events.clone(),
            config.allow_join_after_init,
            config.removal_policy,
        );
        debug!(session = %id, "session opened");
        Ok(Self {
            id,
            events,
            scheduler,
            registry,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scheduler(&self) -> &TurnScheduler<Ctx> {
        &self.scheduler
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn meta(&self) -> WorldMeta {
        self.scheduler.lock_game().world.meta()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.scheduler.snapshot()
    }

    pub fn state(&self) -> GameState {
        self.scheduler.state()
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    pub fn agent(&self, id: AgentId) -> Result<Agent> {
        self.scheduler.lock_game().world.agent(id).cloned()
    }

    /// Current percept of an agent, without acting.
    pub fn percept(&self, id: AgentId) -> Result<Percept> {
        self.scheduler.lock_game().world.percept(id)
    }

    /// Text rendering of the current grid.
    pub fn render(&self) -> String {
        self.scheduler.lock_game().world.render()
    }

    // -------------------------------------------------------------------------
    // Agents
    // -------------------------------------------------------------------------

    pub fn join(&self) -> Result<Percept> {
        self.registry.join()
    }

    pub fn leave(&self, id: AgentId) -> Result<LeaveOutcome> {
        self.registry.leave(id)
    }

    /// Applies an action for an agent and returns its new percept.
    pub fn apply_action(&self, id: AgentId, action: Action) -> Result<Percept> {
        let mut game = self.scheduler.lock_game();
        if game.world.agent(id)?.gone {
            return Err(GameError::logic(format!("{id} has left the game")));
        }
        game.world.action(id, action)
    }

    /// Parses an untyped action request and applies it.
    pub fn apply_request(&self, id: AgentId, kind: &str, args: &Value) -> Result<Percept> {
        let action = Action::parse(kind, args)?;
        self.apply_action(id, action)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn run(&self, turns: Option<u32>) -> Result<Snapshot> {
        self.scheduler.run(turns)
    }

    pub fn step(&self) -> Result<Snapshot> {
        self.scheduler.step()
    }

    pub fn stop(&self) {
        self.scheduler.stop()
    }

    pub fn reset(&self) -> Result<Snapshot> {
        self.scheduler.reset()
    }

    pub fn settings(&self) -> TurnSettings {
        self.scheduler.settings()
    }

    pub fn update_settings(&self, update: SettingsUpdate) -> Result<TurnSettings> {
        self.scheduler.update_settings(update)
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    pub fn subscribe(&self, channels: &[Channel]) -> Subscription {
        self.events.subscribe(channels)
    }

    pub fn subscribe_all(&self) -> Subscription {
        self.events.subscribe_all()
    }

    /// Opens the event feed of one agent.
    pub fn agent_feed(&self, id: AgentId) -> Result<AgentFeed<Ctx>> {
        AgentFeed::open(self, id)
    }

    /// Opens a spectator feed.
    pub fn viewer_feed(&self) -> ViewerFeed<Ctx> {
        ViewerFeed::open(self)
    }

    /// Streams an agent's feed into `sink` until either side ends.
    ///
    /// The agent leaves when this returns.
    pub async fn serve_agent<S: FrameSink + ?Sized>(&self, id: AgentId, sink: &S) -> Result<PumpOutcome> {
        let feed = self.agent_feed(id)?;
        Ok(pump(feed, sink).await)
    }

    /// Streams a viewer feed into `sink` until either side ends.
    pub async fn serve_viewer<S: FrameSink + ?Sized>(&self, sink: &S) -> PumpOutcome {
        pump(self.viewer_feed(), sink).await
    }
}
