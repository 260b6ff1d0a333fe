//! Observer feeds.
//!
//! A feed turns bus events into transport [`Frame`]s for one observer. Each
//! feed owns exactly one [`Subscription`] and releases it when closed or
//! dropped, so a feed's lifetime is the connection's lifetime.
//!
//! - [`AgentFeed`]: greets with the agent's own record, then forwards
//!   `turn-start`, `game-stopped` and `new-game`. Ends after `new-game`.
//!   Closing it makes the agent leave, unless a reset already replaced its
//!   game.
//! - [`ViewerFeed`]: forwards every channel. `turn-start` carries the turn
//!   index; everything else carries the snapshot taken when the event was
//!   published, however late the viewer reads it.

use crate::events::{Channel, Delivery, Event, Subscription};
use crate::grid::AgentId;
use crate::session::Session;
use crate::world::Agent;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use wumpus_env::{Frame, FrameSink, GameContext};

const AGENT_CHANNELS: [Channel; 3] = [Channel::TurnStart, Channel::GameStopped, Channel::NewGame];

/// Source of frames for one observer.
#[async_trait]
pub trait ObserverFeed: Send {
    /// Next frame, or `None` once the feed has ended.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Releases the subscription and any per-observer state. Idempotent.
    fn close(&mut self);

    fn label(&self) -> String;
}

// =============================================================================
// AGENT FEED
// =============================================================================

pub struct AgentFeed<Ctx: GameContext> {
    session: Session<Ctx>,
    agent_id: AgentId,
    generation: u64,
    greeting: Option<Agent>,
    subscription: Option<Subscription>,
    ended: bool,
}

impl<Ctx: GameContext> AgentFeed<Ctx> {
    pub(crate) fn open(session: &Session<Ctx>, agent_id: AgentId) -> crate::error::Result<Self> {
        // Subscribe before reading so nothing published in between is missed
        let subscription = session.subscribe(&AGENT_CHANNELS);
        let (agent, generation) = {
            let game = session.scheduler().lock_game();
            (game.world.agent(agent_id)?.clone(), game.generation)
        };

        Ok(Self {
            session: session.clone(),
            agent_id,
            generation,
            greeting: Some(agent),
            subscription: Some(subscription),
            ended: false,
        })
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Generation the agent belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[async_trait]
impl<Ctx: GameContext> ObserverFeed for AgentFeed<Ctx> {
    async fn next_frame(&mut self) -> Option<Frame> {
        if let Some(agent) = self.greeting.take() {
            return Some(Frame::new(Channel::NewAgent.name(), payload(&agent)));
        }
        if self.ended {
            return None;
        }

        let subscription = self.subscription.as_mut()?;
        loop {
            let frame = match subscription.recv().await? {
                Event::TurnStart { index } => Frame::new(Channel::TurnStart.name(), json!({ "index": index })),
                Event::GameStopped => Frame::new(Channel::GameStopped.name(), Value::Null),
                Event::NewGame => {
                    self.ended = true;
                    Frame::new(Channel::NewGame.name(), Value::Null)
                }
                _ => continue,
            };
            return Some(frame);
        }
    }

    fn close(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        subscription.release();

        match self.session.registry().leave_in(self.agent_id, self.generation) {
            Ok(Some(outcome)) => debug!(agent = self.agent_id.0, ?outcome, "agent feed closed"),
            Ok(None) => debug!(agent = self.agent_id.0, "agent feed closed after reset"),
            Err(err) => debug!(agent = self.agent_id.0, %err, "agent feed closed, leave failed"),
        }
    }

    fn label(&self) -> String {
        format!("{} feed", self.agent_id)
    }
}

impl<Ctx: GameContext> Drop for AgentFeed<Ctx> {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// VIEWER FEED
// =============================================================================

pub struct ViewerFeed<Ctx: GameContext> {
    session: Session<Ctx>,
    subscription: Option<Subscription>,
}

impl<Ctx: GameContext> ViewerFeed<Ctx> {
    pub(crate) fn open(session: &Session<Ctx>) -> Self {
        Self {
            session: session.clone(),
            subscription: Some(session.events().subscribe_with_state(&Channel::ALL)),
        }
    }
}

#[async_trait]
impl<Ctx: GameContext> ObserverFeed for ViewerFeed<Ctx> {
    async fn next_frame(&mut self) -> Option<Frame> {
        let Delivery { event, state } = self.subscription.as_mut()?.recv_delivery().await?;
        let frame = match (event, state) {
            (Event::TurnStart { index }, _) => Frame::new(Channel::TurnStart.name(), json!({ "index": index })),
            (other, Some(state)) => Frame::new(other.channel().name(), payload(&*state)),
            // Published without state by an outside caller
            (other, None) => Frame::new(other.channel().name(), payload(&self.session.snapshot())),
        };
        Some(frame)
    }

    fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
            debug!(session = %self.session.id(), "viewer feed closed");
        }
    }

    fn label(&self) -> String {
        format!("viewer of {}", self.session.id())
    }
}

impl<Ctx: GameContext> Drop for ViewerFeed<Ctx> {
    fn drop(&mut self) {
        self.close();
    }
}

fn payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(%err, "frame payload not serializable");
        Value::Null
    })
}

// =============================================================================
// PUMP
// =============================================================================

/// Why a pump returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    FeedEnded,
    SinkClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub delivered: usize,
    pub end: PumpEnd,
}

/// Forwards frames from `feed` to `sink` until one of them ends, then
/// closes the feed.
pub async fn pump<F, S>(mut feed: F, sink: &S) -> PumpOutcome
where
    F: ObserverFeed,
    S: FrameSink + ?Sized,
{
    let mut delivered = 0;
    let end = loop {
        let Some(frame) = feed.next_frame().await else {
            break PumpEnd::FeedEnded;
        };
        if let Err(err) = sink.send(frame).await {
            debug!(feed = %feed.label(), sink = %sink.label(), %err, "sink closed");
            break PumpEnd::SinkClosed;
        }
        delivered += 1;
    };
    feed.close();
    PumpOutcome { delivered, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::registry::LeaveOutcome;
    use crate::scheduler::GameState;
    use crate::world::WorldConfig;
    use std::time::Duration;
    use wumpus_env::{ChannelSink, RecordingSink, TokioContext};

    fn session() -> Session<TokioContext> {
        let config = SessionConfig::default()
            .with_world(WorldConfig::default().with_size(3).with_probabilities(0.0, 0.0).with_monsters(0))
            .with_turns(2, Duration::from_millis(100));
        Session::new(TokioContext::shared(), config).unwrap()
    }

    fn kinds(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.kind.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_feed_sequence() {
        let session = session();
        let id = session.join().unwrap().agent.id;
        let mut feed = session.agent_feed(id).unwrap();

        let greeting = feed.next_frame().await.unwrap();
        assert_eq!(greeting.kind, "new-agent");
        assert_eq!(greeting.payload["tag"], "H0");

        session.run(None).unwrap();
        let mut seen = Vec::new();
        while let Some(frame) = feed.next_frame().await {
            let stop = frame.kind == "game-stopped";
            seen.push(frame);
            if stop {
                break;
            }
        }
        assert_eq!(kinds(&seen), vec!["turn-start", "turn-start", "game-stopped"]);
        assert_eq!(seen[1].payload, json!({ "index": 1 }));

        session.reset().unwrap();
        assert_eq!(feed.next_frame().await.map(|f| f.kind), Some("new-game".to_string()));
        assert_eq!(feed.next_frame().await, None);
    }

    #[tokio::test]
    async fn test_agent_feed_for_unknown_agent() {
        let session = session();
        let err = session.agent_feed(AgentId(3)).err().unwrap();
        assert_eq!(err.status(), 404);
        assert_eq!(session.events().registrations(), 0);
    }

    #[tokio::test]
    async fn test_closing_agent_feed_leaves() {
        let session = session();
        let id = session.join().unwrap().agent.id;

        let mut feed = session.agent_feed(id).unwrap();
        assert_eq!(session.events().registrations(), AGENT_CHANNELS.len());
        feed.close();
        feed.close();

        assert_eq!(session.events().registrations(), 0);
        assert!(session.agent(id).is_err());
    }

    #[tokio::test]
    async fn test_dropped_agent_feed_marks_gone_mid_game() {
        let session = session();
        let id = session.join().unwrap().agent.id;
        let feed = session.agent_feed(id).unwrap();
        session.scheduler().lock_game().state = GameState::Stopped;

        drop(feed);
        assert!(session.agent(id).unwrap().gone);
        assert_eq!(session.leave(id), Ok(LeaveOutcome::AlreadyGone));
    }

    #[tokio::test]
    async fn test_feed_closed_after_reset_does_not_touch_new_game() {
        let session = session();
        let old = session.join().unwrap().agent.id;
        let feed = session.agent_feed(old).unwrap();

        session.reset().unwrap();
        let new = session.join().unwrap().agent.id;
        assert_eq!(old, new);

        drop(feed);
        assert!(!session.agent(new).unwrap().gone);
        assert_eq!(session.meta().player_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_payloads() {
        let session = session();
        let mut feed = session.viewer_feed();

        session.join().unwrap();
        let frame = feed.next_frame().await.unwrap();
        assert_eq!(frame.kind, "new-agent");
        assert_eq!(frame.payload["agents"][0]["id"], 0);
        assert_eq!(frame.payload["state"], "INIT");

        session.step().unwrap();
        let kinds: Vec<String> = {
            let mut out = Vec::new();
            for _ in 0..4 {
                out.push(feed.next_frame().await.unwrap().kind);
            }
            out
        };
        assert_eq!(kinds, vec!["game-running", "turn-start", "turn-end", "game-stopped"]);
    }

    #[tokio::test]
    async fn test_lagging_viewer_sees_state_of_each_event() {
        let session = session();
        let mut feed = session.viewer_feed();

        let id = session.join().unwrap().agent.id;
        session.leave(id).unwrap();

        let joined = feed.next_frame().await.unwrap();
        assert_eq!(joined.kind, "new-agent");
        assert_eq!(joined.payload["agents"].as_array().map(Vec::len), Some(1));

        let removed = feed.next_frame().await.unwrap();
        assert_eq!(removed.kind, "agent-removed");
        assert_eq!(removed.payload["agents"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_stopped_frame_outlives_reset() {
        let session = session();
        let mut feed = session.viewer_feed();
        let mut stopped = session.subscribe(&[Channel::GameStopped]);

        session.join().unwrap();
        session.step().unwrap();
        assert_eq!(stopped.recv().await, Some(Event::GameStopped));
        session.reset().unwrap();

        let mut frames = Vec::new();
        for _ in 0..6 {
            frames.push(feed.next_frame().await.unwrap());
        }
        assert_eq!(
            kinds(&frames),
            vec!["new-agent", "game-running", "turn-start", "turn-end", "game-stopped", "new-game"]
        );
        assert_eq!(frames[3].payload["state"], "RUNNING");
        assert_eq!(frames[4].payload["state"], "STOPPED");
        assert_eq!(frames[4].payload["generation"], 0);
        assert_eq!(frames[4].payload["agents"].as_array().map(Vec::len), Some(1));
        assert_eq!(frames[5].payload["state"], "INIT");
        assert_eq!(frames[5].payload["generation"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serve_agent_until_sink_closes() {
        let session = session();
        let id = session.join().unwrap().agent.id;
        let sink = RecordingSink::new("agent").closing_after(2);

        session.run(Some(10)).unwrap();
        let outcome = session.serve_agent(id, &sink).await.unwrap();

        assert_eq!(outcome, PumpOutcome { delivered: 2, end: PumpEnd::SinkClosed });
        assert_eq!(kinds(&sink.frames()), vec!["new-agent", "turn-start"]);
        assert_eq!(session.events().registrations(), 0);
        assert!(session.agent(id).unwrap().gone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serve_viewer_until_receiver_dropped() {
        let session = session();
        session.join().unwrap();
        let (sink, mut rx) = ChannelSink::new("viewer");

        let served = session.clone();
        let handle = tokio::spawn(async move { served.serve_viewer(&sink).await });
        while session.events().registrations() == 0 {
            tokio::task::yield_now().await;
        }

        session.step().unwrap();
        assert_eq!(rx.recv().await.map(|f| f.kind), Some("game-running".to_string()));
        drop(rx);

        // Next publication hits the closed sink
        session.reset().unwrap();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.end, PumpEnd::SinkClosed);
        assert_eq!(session.events().registrations(), 0);
    }

    #[tokio::test]
    async fn test_observer_churn_leaves_no_registrations() {
        let session = session();
        for _ in 0..200 {
            let mut viewer = session.viewer_feed();
            session.join().unwrap();
            assert!(viewer.next_frame().await.is_some());
            drop(viewer);

            let id = session.snapshot().agents[0].id;
            session.agent_feed(id).unwrap().close();
        }
        assert_eq!(session.events().registrations(), 0);
        assert_eq!(session.meta().player_count, 0);
    }
}
