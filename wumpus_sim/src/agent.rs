//! SimulatedAgent - scripted players that act once per turn.
//!
//! A simulated agent sits on an [`AgentFeed`] exactly like a remote player
//! would: it waits for `turn-start`, picks an action from its last percept,
//! applies it against the live session and remembers the result.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;
use wumpus_core::grid::adjacent;
use wumpus_core::world::{ACTION_COST, GOLD_REWARD, KILL_REWARD};
use wumpus_core::{
    Action, AgentFeed, AgentId, Channel, Direction, Location, ObserverFeed, Percept, Session, Signal, Symbol,
};
use wumpus_env::GameContext;

/// Decision policy of a simulated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Uniformly random orthogonal moves
    Random,

    /// Picks gold it stands on, shoots into unexplored cells when it smells
    /// a monster, and prefers unvisited cells when nothing is sensed
    GoldSeeker,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Random => "random",
            Strategy::GoldSeeker => "gold_seeker",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Strategy::Random),
            "gold_seeker" | "seeker" => Ok(Strategy::GoldSeeker),
            _ => Err(format!("Unknown strategy: {s}")),
        }
    }
}

/// Counters kept by a simulated agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub actions: u64,
    pub gold_picked: u64,
    pub kills: u64,

    /// Actions the session refused
    pub rejected: u64,
}

/// A scripted player.
pub struct SimulatedAgent {
    id: AgentId,
    strategy: Strategy,
    size: usize,
    rng: ChaCha8Rng,
    visited: HashSet<Location>,
    shots: HashSet<(Location, Direction)>,
    last: Percept,
    stats: AgentStats,
}

impl SimulatedAgent {
    /// Creates an agent from the percept it received on joining.
    pub fn new(strategy: Strategy, percept: Percept, size: usize, rng: ChaCha8Rng) -> Self {
        let mut visited = HashSet::new();
        visited.insert(percept.agent.location);
        Self {
            id: percept.agent.id,
            strategy,
            size,
            rng,
            visited,
            shots: HashSet::new(),
            last: percept,
            stats: AgentStats::default(),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn location(&self) -> Location {
        self.last.agent.location
    }

    /// Cells this agent has stood on.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Chooses the next action from the last percept.
    pub fn decide(&mut self) -> Action {
        match self.strategy {
            Strategy::Random => Action::Move {
                direction: Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())],
            },
            Strategy::GoldSeeker => self.seek_gold(),
        }
    }

    fn seek_gold(&mut self) -> Action {
        if self.last.cell.contains(&Symbol::Gold) {
            return Action::Pick { what: Symbol::Gold };
        }

        let here = self.last.agent.location;
        let neighbours = adjacent(here.0, here.1, self.size);

        if self.last.percept.contains(&Signal::Stench) && self.last.agent.arrows > 0 {
            let target = neighbours
                .iter()
                .map(|(d, loc)| (*d, *loc))
                .find(|(d, loc)| !self.visited.contains(loc) && !self.shots.contains(&(here, *d)));
            if let Some((direction, _)) = target {
                self.shots.insert((here, direction));
                return Action::Shoot { direction };
            }
        }

        let sensed = self
            .last
            .percept
            .iter()
            .any(|s| matches!(s, Signal::Breeze | Signal::Stench));
        let unvisited: Vec<Direction> = neighbours
            .iter()
            .filter(|(_, loc)| !self.visited.contains(loc))
            .map(|(d, _)| *d)
            .collect();
        let revisits: Vec<Direction> = neighbours
            .iter()
            .filter(|(_, loc)| self.visited.contains(loc))
            .map(|(d, _)| *d)
            .collect();

        let choices = if !sensed && !unvisited.is_empty() {
            unvisited
        } else if !revisits.is_empty() {
            revisits
        } else {
            unvisited
        };
        let direction = choices.choose(&mut self.rng).copied().unwrap_or(Direction::E);
        Action::Move { direction }
    }

    /// Records the outcome of an applied action.
    pub fn observe(&mut self, action: Action, percept: Percept) {
        let gained = percept.agent.score - self.last.agent.score;
        match action {
            Action::Pick { .. } if gained == GOLD_REWARD - ACTION_COST => self.stats.gold_picked += 1,
            Action::Shoot { .. } if gained == KILL_REWARD - ACTION_COST => self.stats.kills += 1,
            _ => {}
        }
        self.stats.actions += 1;
        self.visited.insert(percept.agent.location);
        self.last = percept;
    }

    /// Plays one action per `turn-start` until the feed ends or an action
    /// is refused, then closes the feed.
    pub async fn drive<Ctx: GameContext>(mut self, session: Session<Ctx>, mut feed: AgentFeed<Ctx>) -> Self {
        while let Some(frame) = feed.next_frame().await {
            if frame.kind != Channel::TurnStart.name() {
                continue;
            }
            let action = self.decide();
            match session.apply_action(self.id, action) {
                Ok(percept) => self.observe(action, percept),
                Err(err) => {
                    self.stats.rejected += 1;
                    debug!(agent = self.id.0, %err, "action refused");
                    break;
                }
            }
        }
        feed.close();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;
    use wumpus_core::{Event, GridWorld, SessionConfig, WorldConfig};

    fn world(n: usize) -> GridWorld {
        GridWorld::empty(WorldConfig::default().with_size(n).with_monsters(0)).unwrap()
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(5)
    }

    #[test]
    fn test_random_is_reproducible() {
        let mut w = world(5);
        let percept = w.add_agent().unwrap();
        let mut a = SimulatedAgent::new(Strategy::Random, percept.clone(), 5, rng());
        let mut b = SimulatedAgent::new(Strategy::Random, percept, 5, rng());

        let left: Vec<Action> = (0..20).map(|_| a.decide()).collect();
        let right: Vec<Action> = (0..20).map(|_| b.decide()).collect();
        assert_eq!(left, right);
        assert!(left.iter().all(|a| matches!(a, Action::Move { .. })));
    }

    #[test]
    fn test_seeker_picks_gold_and_counts_it() {
        let mut gold_world = GridWorld::generate(
            WorldConfig::default().with_size(3).with_probabilities(0.0, 1.0).with_monsters(0),
            &mut rng(),
        )
        .unwrap();
        let percept = gold_world.add_agent_at((1, 0)).unwrap();
        assert!(percept.cell.contains(&Symbol::Gold));

        let mut agent = SimulatedAgent::new(Strategy::GoldSeeker, percept, 3, rng());
        let action = agent.decide();
        assert_eq!(action, Action::Pick { what: Symbol::Gold });

        let after = gold_world.action(agent.id(), action).unwrap();
        agent.observe(action, after);
        assert_eq!(agent.stats().gold_picked, 1);
        assert_ne!(agent.decide(), Action::Pick { what: Symbol::Gold });
    }

    #[test]
    fn test_seeker_shoots_each_direction_once() {
        let mut w = GridWorld::generate(
            WorldConfig::default().with_size(3).with_probabilities(0.0, 0.0).with_monsters(8),
            &mut rng(),
        )
        .unwrap();
        let percept = w.add_agent().unwrap();
        assert!(percept.percept.contains(&Signal::Stench));

        let mut agent = SimulatedAgent::new(Strategy::GoldSeeker, percept, 3, rng());
        let first = agent.decide();
        let second = agent.decide();
        assert!(matches!(first, Action::Shoot { .. }));
        assert!(matches!(second, Action::Shoot { .. }));
        assert_ne!(first, second);
        // Origin has only two neighbours, so the third choice is a move
        assert!(matches!(agent.decide(), Action::Move { .. }));
    }

    #[test]
    fn test_seeker_prefers_unvisited_when_quiet() {
        let mut w = world(3);
        let percept = w.add_agent_at((1, 1)).unwrap();
        let mut agent = SimulatedAgent::new(Strategy::GoldSeeker, percept, 3, rng());

        let Action::Move { direction } = agent.decide() else {
            panic!("expected a move");
        };
        let after = w.action(agent.id(), Action::Move { direction }).unwrap();
        agent.observe(Action::Move { direction }, after);

        assert_eq!(agent.visited(), 2);
        assert_ne!(agent.location(), (1, 1));
    }

    #[tokio::test]
    async fn test_drive_acts_once_per_turn() {
        let context = SimContext::shared(3);
        let config = SessionConfig::default()
            .with_world(WorldConfig::default().with_size(4).with_monsters(1))
            .with_turns(6, Duration::from_millis(100));
        let session = Session::new(context.clone(), config).unwrap();

        let percept = session.join().unwrap();
        let feed = session.agent_feed(percept.agent.id).unwrap();
        let agent = SimulatedAgent::new(Strategy::GoldSeeker, percept, 4, context.agent_rng(0));
        let handle = tokio::spawn(agent.drive(session.clone(), feed));

        let mut stopped = session.subscribe(&[Channel::GameStopped]);
        session.run(None).unwrap();
        assert_eq!(stopped.recv().await, Some(Event::GameStopped));

        session.reset().unwrap();
        let agent = handle.await.unwrap();
        assert_eq!(agent.stats().actions, 6);
        assert_eq!(agent.stats().rejected, 0);
        assert_eq!(session.events().registrations(), 1);
    }
}
