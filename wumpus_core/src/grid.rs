//! Grid geometry and cell contents.
//!
//! The grid is a square of `n × n` cells stored row-major: cell `(x, y)`
//! lives at index `x + y * n`, with `y` growing southwards.

use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Largest supported grid side.
pub const MAX_SIZE: usize = 10;

/// A cell coordinate `(x, y)`.
pub type Location = (usize, usize);

/// Contents of one cell.
pub type Cell = BTreeSet<Symbol>;

// =============================================================================
// IDENTITIES
// =============================================================================

/// Identity of an agent within one game generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    /// Grid occupancy marker for this agent (`H<id>`).
    pub fn tag(&self) -> String {
        format!("H{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {}", self.0)
    }
}

// =============================================================================
// SYMBOLS
// =============================================================================

/// Something that can occupy a cell.
///
/// Renders as `P`, `G`, `W` and `H<id>` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Symbol {
    Pit,
    Gold,
    Monster,
    Agent(AgentId),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Pit => write!(f, "P"),
            Symbol::Gold => write!(f, "G"),
            Symbol::Monster => write!(f, "W"),
            Symbol::Agent(id) => write!(f, "{}", id.tag()),
        }
    }
}

impl FromStr for Symbol {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "P" => Ok(Symbol::Pit),
            "G" => Ok(Symbol::Gold),
            "W" => Ok(Symbol::Monster),
            _ => s
                .strip_prefix('H')
                .and_then(|id| id.parse::<u32>().ok())
                .map(|id| Symbol::Agent(AgentId(id)))
                .ok_or_else(|| GameError::validation(format!("Invalid symbol ({s})"))),
        }
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl TryFrom<String> for Symbol {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

// =============================================================================
// DIRECTIONS
// =============================================================================

/// Orthogonal direction. Diagonals are not part of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    E,
    N,
    W,
    S,
}

impl Direction {
    /// All directions in neighbourhood order.
    pub const ALL: [Direction; 4] = [Direction::E, Direction::N, Direction::W, Direction::S];

    /// Grid offset `(dx, dy)`; north is `-y`.
    pub fn offset(&self) -> (isize, isize) {
        match self {
            Direction::E => (1, 0),
            Direction::N => (0, -1),
            Direction::W => (-1, 0),
            Direction::S => (0, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::E => "E",
            Direction::N => "N",
            Direction::W => "W",
            Direction::S => "S",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Direction::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| GameError::validation(format!("Invalid direction ({s})")))
    }
}

// =============================================================================
// INDEXING
// =============================================================================

/// Flat index of cell `(x, y)` in an `n × n` grid.
pub fn cell_index(x: usize, y: usize, n: usize) -> Result<usize> {
    if x >= n {
        return Err(GameError::validation(format!("X must be between [0,{n}) ({x})")));
    }
    if y >= n {
        return Err(GameError::validation(format!("Y must be between [0,{n}) ({y})")));
    }
    Ok(x + y * n)
}

/// Coordinate of flat index `i` in an `n × n` grid.
pub fn grid_index(i: usize, n: usize) -> Location {
    (i % n, i / n)
}

/// The cell one step from `(x, y)` in `direction`, if it is on the grid.
pub fn step(x: usize, y: usize, n: usize, direction: Direction) -> Option<Location> {
    let (dx, dy) = direction.offset();
    let nx = x.checked_add_signed(dx)?;
    let ny = y.checked_add_signed(dy)?;
    (nx < n && ny < n).then_some((nx, ny))
}

/// In-bounds orthogonal neighbours of `(x, y)`, in `E, N, W, S` order.
pub fn adjacent(x: usize, y: usize, n: usize) -> Vec<(Direction, Location)> {
    Direction::ALL
        .into_iter()
        .filter_map(|d| step(x, y, n, d).map(|loc| (d, loc)))
        .collect()
}
