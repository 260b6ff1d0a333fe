//! Named-channel publish/subscribe.
//!
//! Every subscriber owns a [`Subscription`] with its own FIFO queue, so
//! events on a channel reach each subscriber in publication order no matter
//! how slowly the subscriber drains them. A subscription stays registered
//! until its owner releases it (or drops it); the bus never prunes on its
//! own.
//!
//! Subscribers opened with [`EventBus::subscribe_with_state`] also receive
//! the [`Snapshot`] the event left behind, taken while the publisher still
//! held the game, so a lagging reader never pairs an event with a later
//! state.

use crate::error::{GameError, Result};
use crate::grid::AgentId;
use crate::scheduler::Snapshot;
use crate::world::Agent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

// =============================================================================
// CHANNELS AND EVENTS
// =============================================================================

/// Event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    NewGame,
    GameRunning,
    GameStopped,
    TurnStart,
    TurnEnd,
    NewAgent,
    AgentRemoved,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::NewGame,
        Channel::GameRunning,
        Channel::GameStopped,
        Channel::TurnStart,
        Channel::TurnEnd,
        Channel::NewAgent,
        Channel::AgentRemoved,
    ];

    /// Wire name of the channel.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::NewGame => "new-game",
            Channel::GameRunning => "game-running",
            Channel::GameStopped => "game-stopped",
            Channel::TurnStart => "turn-start",
            Channel::TurnEnd => "turn-end",
            Channel::NewAgent => "new-agent",
            Channel::AgentRemoved => "agent-removed",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| GameError::validation(format!("Unknown event channel ({s})")))
    }
}

/// Something that happened to a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    /// A fresh world replaced the previous generation
    NewGame,

    /// The turn loop started
    GameRunning,

    /// The turn loop exited, for whatever reason
    GameStopped,

    TurnStart { index: u32 },

    TurnEnd { index: u32 },

    /// An agent joined, or its record changed (e.g. marked gone)
    NewAgent(Agent),

    AgentRemoved {
        #[serde(rename = "agentId")]
        agent_id: AgentId,
    },
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::NewGame => Channel::NewGame,
            Event::GameRunning => Channel::GameRunning,
            Event::GameStopped => Channel::GameStopped,
            Event::TurnStart { .. } => Channel::TurnStart,
            Event::TurnEnd { .. } => Channel::TurnEnd,
            Event::NewAgent(_) => Channel::NewAgent,
            Event::AgentRemoved { .. } => Channel::AgentRemoved,
        }
    }
}

/// One event as it sits in a subscriber's queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub event: Event,

    /// Game state right after the event; only for state subscriptions
    pub state: Option<Arc<Snapshot>>,
}

// =============================================================================
// BUS
// =============================================================================

/// Identifier of one subscription on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Route {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<Delivery>,
    with_state: bool,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    routes: HashMap<Channel, Vec<Route>>,
}

/// Publish/subscribe hub shared by a scheduler, a registry and observers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription on the given channels.
    pub fn subscribe(&self, channels: &[Channel]) -> Subscription {
        self.register(channels, false)
    }

    /// Like [`EventBus::subscribe`], but every delivery also carries the
    /// snapshot its publisher attached.
    pub fn subscribe_with_state(&self, channels: &[Channel]) -> Subscription {
        self.register(channels, true)
    }

    fn register(&self, channels: &[Channel], with_state: bool) -> Subscription {
        let channels: BTreeSet<Channel> = channels.iter().copied().collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = lock(&self.inner);
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        for channel in &channels {
            inner.routes.entry(*channel).or_default().push(Route {
                id,
                tx: tx.clone(),
                with_state,
            });
        }
        drop(inner);

        tracing::trace!(subscription = id.0, ?channels, with_state, "subscribed");
        Subscription {
            id,
            channels: channels.into_iter().collect(),
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Registers a subscription on every channel.
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&Channel::ALL)
    }

    /// Registers a subscription by channel names.
    pub fn subscribe_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Subscription> {
        let channels = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<Channel>>>()?;
        Ok(self.subscribe(&channels))
    }

    /// Delivers an event to every subscriber of its channel.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: Event) -> usize {
        self.deliver(event, || None)
    }

    /// Delivers an event together with the game state it produced.
    ///
    /// `state` runs at most once, and only if a state subscription listens
    /// on the event's channel.
    pub fn publish_with_state(&self, event: Event, state: impl FnOnce() -> Snapshot) -> usize {
        self.deliver(event, || Some(state()))
    }

    fn deliver(&self, event: Event, state: impl FnOnce() -> Option<Snapshot>) -> usize {
        let inner = lock(&self.inner);
        let Some(routes) = inner.routes.get(&event.channel()) else {
            return 0;
        };
        let state = if routes.iter().any(|route| route.with_state) {
            state().map(Arc::new)
        } else {
            None
        };

        routes
            .iter()
            .filter(|route| {
                let delivery = Delivery {
                    event: event.clone(),
                    state: if route.with_state { state.clone() } else { None },
                };
                route.tx.send(delivery).is_ok()
            })
            .count()
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        lock(&self.inner).routes.get(&channel).map_or(0, Vec::len)
    }

    /// Total (subscription, channel) registrations across the bus.
    pub fn registrations(&self) -> usize {
        lock(&self.inner).routes.values().map(Vec::len).sum()
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SUBSCRIPTION HANDLE
// =============================================================================

/// Receiving end of a subscription.
///
/// [`Subscription::release`] detaches it from every channel it was
/// registered on. Dropping the handle does the same.
///
/// The queue is unbounded: publishing never blocks the game, so an owner
/// that stops draining keeps every undelivered event (and, for state
/// subscriptions, its snapshot) in memory until it drains or releases.
/// Transports that cannot keep up should release and resubscribe.
pub struct Subscription {
    id: SubscriptionId,
    channels: Vec<Channel>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Waits for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await.map(|delivery| delivery.event)
    }

    /// Waits for the next event along with any attached state.
    pub async fn recv_delivery(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok().map(|delivery| delivery.event)
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Detaches from every channel.
    pub fn release(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.channels.is_empty() {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            let mut inner = lock(&bus);
            for channel in &self.channels {
                if let Some(routes) = inner.routes.get_mut(channel) {
                    routes.retain(|route| route.id != self.id);
                }
            }
        }
        tracing::trace!(subscription = self.id.0, "released");
        self.channels.clear();
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
