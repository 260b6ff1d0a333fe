//! Percept derivation.
//!
//! An agent never sees the grid. After every action it receives a
//! [`Percept`]: what its orthogonal neighbourhood smells like, what lies in
//! its own cell, and its own record.

use crate::error::Result;
use crate::grid::{adjacent, AgentId, Symbol};
use crate::world::{Agent, GridWorld};
use serde::{Deserialize, Serialize};

/// A sensed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// A pit is adjacent
    #[serde(rename = "B")]
    Breeze,

    /// A monster is adjacent (also confirms a kill after a shot)
    #[serde(rename = "S")]
    Stench,

    /// Another agent is adjacent
    #[serde(rename = "R")]
    RivalNearby,
}

/// What an agent learns after joining or acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percept {
    /// Neighbour signals followed by action-specific extras
    pub percept: Vec<Signal>,

    /// Raw contents of the agent's own cell
    pub cell: Vec<Symbol>,

    /// The agent's record after the action
    pub agent: Agent,
}

impl GridWorld {
    /// Signals derived from the cells orthogonally adjacent to an agent.
    ///
    /// Always ordered breeze, stench, rival.
    pub fn neighbour_signals(&self, id: AgentId) -> Result<Vec<Signal>> {
        let (x, y) = self.agent(id)?.location;
        let mut pit = false;
        let mut monster = false;
        let mut rival = false;

        for (_, (nx, ny)) in adjacent(x, y, self.size()) {
            for symbol in self.cell(nx, ny)? {
                match symbol {
                    Symbol::Pit => pit = true,
                    Symbol::Monster => monster = true,
                    Symbol::Agent(other) if *other != id => rival = true,
                    _ => {}
                }
            }
        }

        let mut signals = Vec::with_capacity(3);
        if pit {
            signals.push(Signal::Breeze);
        }
        if monster {
            signals.push(Signal::Stench);
        }
        if rival {
            signals.push(Signal::RivalNearby);
        }
        Ok(signals)
    }

    /// Full percept for an agent, with `extra` signals appended.
    pub fn percept_with(&self, id: AgentId, extra: Vec<Signal>) -> Result<Percept> {
        let agent = self.agent(id)?.clone();
        let (x, y) = agent.location;
        let mut percept = self.neighbour_signals(id)?;
        percept.extend(extra);

        Ok(Percept {
            percept,
            cell: self.cell(x, y)?.iter().copied().collect(),
            agent,
        })
    }

    /// Full percept for an agent.
    pub fn percept(&self, id: AgentId) -> Result<Percept> {
        self.percept_with(id, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldConfig;

    fn empty_world(n: usize) -> GridWorld {
        GridWorld::empty(WorldConfig::default().with_size(n).with_monsters(0)).unwrap()
    }

    #[test]
    fn test_quiet_neighbourhood() {
        let mut world = empty_world(4);
        let percept = world.add_agent().unwrap();

        assert!(percept.percept.is_empty());
        assert_eq!(percept.cell, vec![Symbol::Agent(AgentId(0))]);
        assert_eq!(percept.agent.tag, "H0");
    }

    #[test]
    fn test_signal_order_is_fixed() {
        let mut world = empty_world(4);
        let id = world.add_agent_at((1, 1)).unwrap().agent.id;
        // Rival placed first, pit last: output order must not follow placement
        world.add_agent_at((1, 2)).unwrap();
        world.place(Symbol::Monster, (2, 1)).unwrap();
        world.place(Symbol::Pit, (1, 0)).unwrap();

        let signals = world.neighbour_signals(id).unwrap();
        assert_eq!(signals, vec![Signal::Breeze, Signal::Stench, Signal::RivalNearby]);
    }

    #[test]
    fn test_diagonal_cells_are_not_sensed() {
        let mut world = empty_world(4);
        let id = world.add_agent_at((1, 1)).unwrap().agent.id;
        world.place(Symbol::Pit, (2, 2)).unwrap();
        world.place(Symbol::Monster, (0, 0)).unwrap();

        assert!(world.neighbour_signals(id).unwrap().is_empty());
    }

    #[test]
    fn test_percept_wire_shape() {
        let mut world = empty_world(2);
        world.place(Symbol::Pit, (1, 0)).unwrap();
        let percept = world.add_agent().unwrap();

        let json = serde_json::to_value(&percept).unwrap();
        assert_eq!(json["percept"], serde_json::json!(["B"]));
        assert_eq!(json["cell"], serde_json::json!(["H0"]));
        assert_eq!(json["agent"]["location"], serde_json::json!([0, 0]));
        assert!(json["agent"].get("gone").is_none());
    }
}
