//! Scenario runner - plays simulation scenarios against a live session.
//!
//! Every run builds its own single-threaded runtime and a [`SimContext`], so
//! the turn loop, the simulated agents and the spectator all interleave on
//! one thread under a virtual clock. A run passes when the scenario's own
//! assertions hold, the final world is consistent, and teardown leaves no
//! subscription behind.

use crate::agent::{SimulatedAgent, Strategy};
use crate::context::SimContext;
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wumpus_core::grid::cell_index;
use wumpus_core::world::MAX_AGENTS;
use wumpus_core::{
    Action, Agent, AgentId, Channel, Direction, Event, GameState, PumpEnd, PumpOutcome, RemovalPolicy, Session,
    SessionConfig, Snapshot, Subscription, Symbol,
};
use wumpus_env::{GameContext, RecordingSink, SessionId};

/// Real-time bound on waiting for any single game event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Scheduler passes given to spawned tasks before the harness moves on.
const SETTLE_PASSES: usize = 16;

/// Turn count for runs that are expected to be cut short.
const LONG_RUN: u32 = 1_000;

const LIFECYCLE: [Channel; 4] = [Channel::TurnStart, Channel::TurnEnd, Channel::GameStopped, Channel::NewGame];

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of simulated agents to join
    pub num_agents: usize,

    /// Session under test
    pub session: SessionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_agents: 4,
            session: SessionConfig::default(),
        }
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Agent records when the scenario finished
    pub standings: Vec<Agent>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            failure_reason: Some(reason),
            standings: Vec::new(),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub turns_started: u32,
    pub turns_completed: u32,

    /// Actions applied by simulated agents
    pub actions: u64,
    pub gold_picked: u64,
    pub kills: u64,
    pub rejected_actions: u64,

    /// Frames received by the spectator
    pub spectator_frames: usize,

    /// Viewers that disconnected on their own
    pub viewer_disconnects: usize,

    pub best_score: i64,
    pub virtual_time_ms: u64,

    /// Subscriptions still registered after teardown
    pub leaked_subscriptions: usize,
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs simulation scenarios.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self::from_config(SimConfig {
            seed,
            num_agents,
            ..SimConfig::default()
        })
    }

    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets the default turn count of a run.
    pub fn with_turns(mut self, turns: u32) -> Self {
        self.config.session.turns.run_turns = turns;
        self
    }

    /// Sets the turn window.
    pub fn with_turn_time(mut self, turn_time: Duration) -> Self {
        self.config.session.turns.turn_time_ms = turn_time.as_millis() as u64;
        self
    }

    /// Replaces the session configuration under test.
    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario and also returns everything the spectator saw.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build();
        match runtime {
            Ok(runtime) => runtime.block_on(self.execute(scenario)),
            Err(err) => (
                ScenarioResult::failed(scenario, self.config.seed, format!("runtime: {err}")),
                SimExport::new(scenario.name(), self.config.seed),
            ),
        }
    }

    async fn execute(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let seed = self.config.seed;
        let mut harness = match Harness::open(seed, self.session_config(scenario)).await {
            Ok(harness) => harness,
            Err(reason) => {
                return (ScenarioResult::failed(scenario, seed, reason), SimExport::new(scenario.name(), seed));
            }
        };

        let outcome = match scenario {
            ScenarioId::RandomWalk => self.run_random_walk(&mut harness).await,
            ScenarioId::GoldRush => self.run_gold_rush(&mut harness).await,
            ScenarioId::EarlyStop => self.run_early_stop(&mut harness).await,
            ScenarioId::ResetMidGame => self.run_reset_mid_game(&mut harness).await,
            ScenarioId::Disconnect => self.run_disconnect(&mut harness).await,
            ScenarioId::ObserverChurn => self.run_observer_churn(&mut harness).await,
        };
        harness.teardown(scenario, outcome).await
    }

    fn session_config(&self, scenario: ScenarioId) -> SessionConfig {
        let mut config = self.config.session.clone();
        if scenario == ScenarioId::GoldRush {
            // Unvalidated here; a bad size is reported when the session opens
            let free = config.world.size.saturating_mul(config.world.size).saturating_sub(1);
            config.world.pit_probability = config.world.pit_probability.min(0.1);
            config.world.gold_probability = 0.35;
            config.world.monster_count = config.world.monster_count.clamp(1, 3).min(free);
        }
        config
    }

    fn agent_count(&self) -> usize {
        self.config.num_agents.clamp(1, MAX_AGENTS)
    }

    /// SIM-001: every agent acts exactly once per turn window.
    async fn run_random_walk(&self, h: &mut Harness) -> Result<(), String> {
        let turns = h.session.settings().run_turns;
        h.spawn_agents(Strategy::Random, self.agent_count())?;

        h.session.run(None).map_err(|e| e.to_string())?;
        h.until_stopped().await?;

        ensure(h.metrics.turns_started == turns, || {
            format!("{} turns started, expected {turns}", h.metrics.turns_started)
        })?;
        ensure(h.metrics.turns_completed == turns, || {
            format!("{} turns completed, expected {turns}", h.metrics.turns_completed)
        })?;

        let snapshot = h.session.snapshot();
        check_world(&snapshot)?;
        for agent in &snapshot.agents {
            ensure(agent.moves == u64::from(turns), || {
                format!("{} acted {} times in {turns} turns", agent.id, agent.moves)
            })?;
            // Random walkers only move, so nothing can lift them above the action cost
            ensure(agent.score <= -(agent.moves as i64), || {
                format!("{} scored {} without any reward", agent.id, agent.score)
            })?;
        }
        Ok(())
    }

    /// SIM-002: gold and monster counts add up with what agents collected.
    async fn run_gold_rush(&self, h: &mut Harness) -> Result<(), String> {
        h.spawn_agents(Strategy::GoldSeeker, self.agent_count())?;
        let before = h.session.snapshot();

        h.session.run(None).map_err(|e| e.to_string())?;
        h.until_stopped().await?;

        let after = h.session.snapshot();
        check_world(&after)?;

        h.session.reset().map_err(|e| e.to_string())?;
        h.collect_agents().await?;
        let picked: u64 = h.finished.iter().map(|a| a.stats().gold_picked).sum();
        let kills: u64 = h.finished.iter().map(|a| a.stats().kills).sum();

        let (gold_before, gold_after) = (count(&before, Symbol::Gold), count(&after, Symbol::Gold));
        ensure(gold_after + picked == gold_before, || {
            format!("gold {gold_before} -> {gold_after} but {picked} picked")
        })?;
        let (monsters_before, monsters_after) = (count(&before, Symbol::Monster), count(&after, Symbol::Monster));
        ensure(monsters_after + kills == monsters_before, || {
            format!("monsters {monsters_before} -> {monsters_after} but {kills} killed")
        })?;
        Ok(())
    }

    /// SIM-003: stop() halts the loop within one turn window.
    async fn run_early_stop(&self, h: &mut Harness) -> Result<(), String> {
        const STOP_AT: u32 = 2;
        let turn_time = h.session.settings().turn_time();
        h.spawn_agents(Strategy::Random, self.agent_count())?;

        h.session.run(Some(LONG_RUN)).map_err(|e| e.to_string())?;
        h.until_turn_start(STOP_AT).await?;

        let requested = h.context.now();
        h.session.stop();
        ensure(h.session.state() == GameState::Stopping, || "stop() did not move to STOPPING".to_string())?;
        h.until_stopped().await?;

        let latency = h.context.now().saturating_sub(requested);
        ensure(latency <= turn_time, || format!("stop took {latency:?}, turn time {turn_time:?}"))?;
        ensure(h.metrics.turns_started <= STOP_AT + 2, || {
            format!("{} turns started after stop at turn {STOP_AT}", h.metrics.turns_started)
        })?;
        ensure(h.session.state() == GameState::Stopped, || "game not STOPPED".to_string())?;
        check_world(&h.session.snapshot())
    }

    /// SIM-004: reset mid-run starts a clean generation and silences the old loop.
    async fn run_reset_mid_game(&self, h: &mut Harness) -> Result<(), String> {
        let turn_time = h.session.settings().turn_time();
        h.spawn_agents(Strategy::Random, self.agent_count())?;

        h.session.run(Some(LONG_RUN)).map_err(|e| e.to_string())?;
        h.until_turn_start(1).await?;

        let snapshot = h.session.reset().map_err(|e| e.to_string())?;
        ensure(snapshot.state == GameState::Init, || format!("reset left state {:?}", snapshot.state))?;
        ensure(snapshot.generation == 1, || format!("generation {}", snapshot.generation))?;
        ensure(snapshot.agents.is_empty(), || "agents survived reset".to_string())?;
        loop {
            match h.next_event().await? {
                Event::NewGame => break,
                Event::GameStopped => return Err("old loop reported game-stopped".to_string()),
                _ => {}
            }
        }

        // Give the old loop time to reach its next boundary
        for _ in 0..3 {
            h.context.sleep(turn_time).await;
        }
        if let Some(event) = h.lifecycle.as_mut().and_then(Subscription::try_recv) {
            return Err(format!("stale loop published {event:?}"));
        }
        ensure(h.session.state() == GameState::Init, || "stale loop touched the new game".to_string())?;
        h.collect_agents().await?;

        // The new generation plays normally
        h.spawn_agents(Strategy::Random, self.agent_count())?;
        h.session.run(Some(2)).map_err(|e| e.to_string())?;
        h.until_stopped().await?;

        let snapshot = h.session.snapshot();
        ensure(snapshot.generation == 1, || format!("generation {}", snapshot.generation))?;
        check_world(&snapshot)
    }

    /// SIM-005: a dropped agent connection removes the agent per policy.
    async fn run_disconnect(&self, h: &mut Harness) -> Result<(), String> {
        let turns = h.session.settings().run_turns.max(4);
        let policy = h.session.registry().removal_policy();
        h.spawn_agents(Strategy::Random, self.agent_count().max(2))?;

        h.session.run(Some(turns)).map_err(|e| e.to_string())?;
        h.until_turn_start(1).await?;

        let victim = h.agents.first().map(|(id, _)| *id).ok_or_else(|| "no agents joined".to_string())?;
        let registered = h.session.events().registrations();
        h.drop_agent(victim).await;
        ensure(h.session.events().registrations() < registered, || {
            "dropped agent feed kept its subscription".to_string()
        })?;
        let frozen = h.session.agent(victim).ok();

        h.until_stopped().await?;
        let snapshot = h.session.snapshot();
        check_world(&snapshot)?;

        match policy {
            RemovalPolicy::MarkGone => {
                let agent = h.session.agent(victim).map_err(|e| e.to_string())?;
                ensure(agent.gone, || format!("{victim} not marked gone"))?;
                ensure(Some(agent.moves) == frozen.map(|a| a.moves), || {
                    format!("{victim} kept acting after disconnect")
                })?;
                let refused = h.session.apply_action(victim, Action::Move { direction: Direction::E });
                ensure(refused.is_err_and(|e| e.category() == "LogicError"), || {
                    format!("{victim} could still act")
                })?;
            }
            RemovalPolicy::HardRemove => {
                ensure(h.session.agent(victim).is_err(), || format!("{victim} still present"))?;
            }
        }

        for agent in snapshot.agents.iter().filter(|a| a.id != victim) {
            ensure(agent.moves == u64::from(turns), || {
                format!("{} acted {} times in {turns} turns", agent.id, agent.moves)
            })?;
        }
        Ok(())
    }

    /// SIM-006: viewers disconnecting mid-run release their subscriptions.
    async fn run_observer_churn(&self, h: &mut Harness) -> Result<(), String> {
        let turns = h.session.settings().run_turns;
        let turn_time = h.session.settings().turn_time();
        let mut rng = ChaCha8Rng::seed_from_u64(h.seed ^ 0x6f62_7365_7276_6572);
        h.spawn_agents(Strategy::Random, self.agent_count())?;

        let mut viewers: Vec<(usize, JoinHandle<PumpOutcome>)> = Vec::new();
        h.session.run(None).map_err(|e| e.to_string())?;
        loop {
            match h.next_event().await? {
                Event::TurnStart { .. } => {
                    let limit = rng.gen_range(1..=4);
                    let sink = RecordingSink::new(format!("viewer-{}", viewers.len())).closing_after(limit);
                    let session = h.session.clone();
                    viewers.push((limit, tokio::spawn(async move { session.serve_viewer(&sink).await })));
                }
                Event::GameStopped => break,
                _ => {}
            }
        }

        h.session.reset().map_err(|e| e.to_string())?;
        h.context.sleep(turn_time).await;

        for (limit, handle) in viewers {
            handle.abort();
            match handle.await {
                Ok(outcome) => {
                    ensure(outcome == PumpOutcome { delivered: limit, end: PumpEnd::SinkClosed }, || {
                        format!("viewer pump ended with {outcome:?}, limit {limit}")
                    })?;
                    h.metrics.viewer_disconnects += 1;
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => return Err(format!("viewer task failed: {err}")),
            }
        }
        ensure(turns < 2 || h.metrics.viewer_disconnects > 0, || {
            "no viewer ever disconnected".to_string()
        })?;
        h.collect_agents().await
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// One session under test plus everything attached to it.
struct Harness {
    seed: u64,
    context: Arc<SimContext>,
    session: Session<SimContext>,
    lifecycle: Option<Subscription>,
    spectator: RecordingSink,
    spectator_task: Option<JoinHandle<PumpOutcome>>,
    agents: Vec<(AgentId, JoinHandle<SimulatedAgent>)>,
    finished: Vec<SimulatedAgent>,
    metrics: ScenarioMetrics,
}

impl Harness {
    async fn open(seed: u64, config: SessionConfig) -> Result<Self, String> {
        let context = SimContext::shared(seed);
        let session =
            Session::with_id(SessionId::from_seed(seed), context.clone(), config).map_err(|e| e.to_string())?;
        debug!("\n{}", session.render());

        let spectator = RecordingSink::new("spectator");
        let sink = spectator.clone();
        let served = session.clone();
        let spectator_task = tokio::spawn(async move { served.serve_viewer(&sink).await });

        // Let the spectator subscribe before anything is published
        for _ in 0..SETTLE_PASSES {
            if session.events().registrations() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        Ok(Self {
            seed,
            context,
            lifecycle: Some(session.subscribe(&LIFECYCLE)),
            session,
            spectator,
            spectator_task: Some(spectator_task),
            agents: Vec::new(),
            finished: Vec::new(),
            metrics: ScenarioMetrics::default(),
        })
    }

    /// Joins `count` agents and starts their feed-driven tasks.
    fn spawn_agents(&mut self, strategy: Strategy, count: usize) -> Result<(), String> {
        let size = self.session.meta().size;
        for _ in 0..count {
            let percept = self.session.join().map_err(|e| e.to_string())?;
            let id = percept.agent.id;
            let feed = self.session.agent_feed(id).map_err(|e| e.to_string())?;
            let index = (self.agents.len() + self.finished.len()) as u64;
            let agent = SimulatedAgent::new(strategy, percept, size, self.context.agent_rng(index));
            self.agents.push((id, tokio::spawn(agent.drive(self.session.clone(), feed))));
        }
        Ok(())
    }

    /// Kills an agent's task, which drops its feed like a lost connection.
    async fn drop_agent(&mut self, id: AgentId) {
        let Some(pos) = self.agents.iter().position(|(a, _)| *a == id) else {
            return;
        };
        let (_, handle) = self.agents.remove(pos);
        handle.abort();
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                warn!("{id} task failed: {err}");
            }
        }
    }

    async fn next_event(&mut self) -> Result<Event, String> {
        let lifecycle = self
            .lifecycle
            .as_mut()
            .ok_or_else(|| "lifecycle subscription released".to_string())?;
        let event = tokio::time::timeout(EVENT_TIMEOUT, lifecycle.recv())
            .await
            .map_err(|_| "timed out waiting for a game event".to_string())?
            .ok_or_else(|| "event bus closed".to_string())?;

        match event {
            Event::TurnStart { .. } => self.metrics.turns_started += 1,
            Event::TurnEnd { .. } => self.metrics.turns_completed += 1,
            _ => {}
        }
        Ok(event)
    }

    async fn until_turn_start(&mut self, index: u32) -> Result<(), String> {
        loop {
            match self.next_event().await? {
                Event::TurnStart { index: i } if i == index => return Ok(()),
                Event::GameStopped => return Err(format!("game stopped before turn {index}")),
                _ => {}
            }
        }
    }

    async fn until_stopped(&mut self) -> Result<(), String> {
        while self.next_event().await? != Event::GameStopped {}
        Ok(())
    }

    /// Waits for every agent task; their feeds end on `new-game`.
    async fn collect_agents(&mut self) -> Result<(), String> {
        for (id, handle) in self.agents.drain(..) {
            match tokio::time::timeout(EVENT_TIMEOUT, handle).await {
                Ok(Ok(agent)) => self.finished.push(agent),
                Ok(Err(err)) => return Err(format!("{id} task failed: {err}")),
                Err(_) => return Err(format!("{id} never finished")),
            }
        }
        Ok(())
    }

    async fn teardown(mut self, scenario: ScenarioId, outcome: Result<(), String>) -> (ScenarioResult, SimExport) {
        let standings = self.session.snapshot().agents;
        let mut outcome = outcome;

        let ended = match self.session.reset() {
            Ok(_) => self.collect_agents().await,
            Err(err) => Err(err.to_string()),
        };
        if let Err(err) = ended {
            outcome = outcome.and(Err(err));
        }

        if let Some(task) = self.spectator_task.take() {
            // Let the spectator drain the new-game frame first
            for _ in 0..SETTLE_PASSES {
                tokio::task::yield_now().await;
            }
            task.abort();
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!("spectator task failed: {err}");
                }
            }
        }
        if let Some(lifecycle) = self.lifecycle.take() {
            lifecycle.release();
        }

        let leaked = self.session.events().registrations();
        if leaked > 0 {
            outcome = outcome.and(Err(format!("{leaked} subscriptions outlived their owners")));
        }

        let metrics = ScenarioMetrics {
            actions: self.finished.iter().map(|a| a.stats().actions).sum(),
            gold_picked: self.finished.iter().map(|a| a.stats().gold_picked).sum(),
            kills: self.finished.iter().map(|a| a.stats().kills).sum(),
            rejected_actions: self.finished.iter().map(|a| a.stats().rejected).sum(),
            spectator_frames: self.spectator.frames().len(),
            best_score: standings.iter().map(|a| a.score).max().unwrap_or(0),
            virtual_time_ms: self.context.now().as_millis() as u64,
            leaked_subscriptions: leaked,
            ..self.metrics
        };

        let passed = outcome.is_ok();
        let failure_reason = outcome.err();
        debug!(scenario = scenario.name(), ?metrics, "scenario finished");

        let mut export = SimExport::new(scenario.name(), self.seed);
        for frame in self.spectator.frames() {
            export.add_frame(frame);
        }
        export.finalize(metrics.virtual_time_ms, standings.clone(), passed, failure_reason.clone());

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            failure_reason,
            standings,
            metrics,
        };
        (result, export)
    }
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

fn count(snapshot: &Snapshot, symbol: Symbol) -> u64 {
    snapshot.grid.values().flatten().filter(|s| **s == symbol).count() as u64
}

/// Agent markers and records agree, and the origin holds nothing but agents.
fn check_world(snapshot: &Snapshot) -> Result<(), String> {
    let n = snapshot.size;
    for agent in &snapshot.agents {
        let (x, y) = agent.location;
        let i = cell_index(x, y, n).map_err(|e| format!("{} off grid: {e}", agent.id))?;
        let marked = snapshot
            .grid
            .get(&i)
            .is_some_and(|cell| cell.contains(&Symbol::Agent(agent.id)));
        ensure(marked, || format!("{} missing from cell {i}", agent.id))?;
    }

    for (i, cell) in &snapshot.grid {
        for symbol in cell {
            let Symbol::Agent(id) = symbol else {
                continue;
            };
            let agent = snapshot
                .agents
                .iter()
                .find(|a| a.id == *id)
                .ok_or_else(|| format!("cell {i} marks unknown {id}"))?;
            let (x, y) = agent.location;
            ensure(cell_index(x, y, n).ok() == Some(*i), || format!("{id} marked in stale cell {i}"))?;
        }
    }

    if let Some(origin) = snapshot.grid.get(&0) {
        ensure(origin.iter().all(|s| matches!(s, Symbol::Agent(_))), || {
            format!("origin holds {origin:?}")
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wumpus_core::WorldConfig;

    fn runner(seed: u64) -> ScenarioRunner {
        ScenarioRunner::new(seed, 3)
            .with_turns(5)
            .with_turn_time(Duration::from_millis(200))
    }

    #[test]
    fn test_every_scenario_passes() {
        for seed in [1, 42, 1234] {
            let runner = runner(seed);
            for scenario in ScenarioId::all() {
                let result = runner.run(scenario);
                assert!(
                    result.passed,
                    "{scenario} seed={seed}: {}",
                    result.failure_reason.unwrap_or_default()
                );
                assert_eq!(result.metrics.leaked_subscriptions, 0);
            }
        }
    }

    #[test]
    fn test_random_walk_metrics() {
        let result = runner(9).run(ScenarioId::RandomWalk);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.turns_started, 5);
        assert_eq!(result.metrics.actions, 15);
        assert_eq!(result.metrics.virtual_time_ms, 1_000);
        assert_eq!(result.standings.len(), 3);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let a = runner(77).run(ScenarioId::GoldRush);
        let b = runner(77).run(ScenarioId::GoldRush);
        assert_eq!(a.standings, b.standings);
        assert_eq!(a.metrics.gold_picked, b.metrics.gold_picked);
    }

    #[test]
    fn test_disconnect_with_hard_remove() {
        let session = SessionConfig::default()
            .with_turns(5, Duration::from_millis(100))
            .with_removal_policy(RemovalPolicy::HardRemove);
        let result = ScenarioRunner::new(5, 3)
            .with_session_config(session)
            .run(ScenarioId::Disconnect);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.standings.len(), 2);
    }

    #[test]
    fn test_export_contains_spectator_frames() {
        let (result, export) = runner(3).run_with_export(ScenarioId::EarlyStop);
        assert!(result.passed);
        assert!(export.passed);
        assert_eq!(export.frames.len(), result.metrics.spectator_frames);
        assert!(export.frames.iter().any(|f| f.frame.kind == "game-stopped"));
        assert_eq!(export.frames.last().map(|f| f.frame.kind.as_str()), Some("new-game"));
    }

    #[test]
    fn test_invalid_session_config_fails_cleanly() {
        for size in [0, usize::MAX] {
            let session = SessionConfig::default().with_world(WorldConfig::default().with_size(size));
            let runner = ScenarioRunner::new(1, 2).with_session_config(session);
            for scenario in ScenarioId::all() {
                let result = runner.run(scenario);
                assert!(!result.passed, "{scenario} accepted size {size}");
                assert!(result.failure_reason.unwrap().contains("Size"));
            }
        }
    }

    #[test]
    fn test_gold_rush_on_single_cell_grid() {
        let session = SessionConfig::default()
            .with_world(WorldConfig::default().with_size(1).with_monsters(0))
            .with_turns(3, Duration::from_millis(100));
        let config = ScenarioRunner::new(1, 2)
            .with_session_config(session)
            .session_config(ScenarioId::GoldRush);
        assert_eq!(config.world.monster_count, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_world_detects_stale_marker() {
        let mut snapshot = Snapshot {
            size: 2,
            agents: Vec::new(),
            grid: Default::default(),
            run_turns: 1,
            turn_time: 1,
            state: GameState::Init,
            generation: 0,
        };
        snapshot.grid.insert(3, vec![Symbol::Agent(AgentId(0))]);
        assert!(check_world(&snapshot).is_err());

        snapshot.grid.clear();
        snapshot.grid.insert(0, vec![Symbol::Pit]);
        assert!(check_world(&snapshot).is_err());
    }
}
