//! GridWorld - cell contents, agent records and the action rules.
//!
//! The world is a plain data container: it has no notion of time, turns or
//! observers. Everything here is synchronous and either fully applies or
//! fails before touching state.

use crate::action::Action;
use crate::error::{GameError, Result};
use crate::grid::{cell_index, grid_index, step, AgentId, Cell, Location, Symbol, MAX_SIZE};
use crate::percept::{Percept, Signal};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of agent records in one world.
pub const MAX_AGENTS: usize = 10;

/// Arrows every agent starts with.
pub const START_ARROWS: u32 = 3;

/// Charged for every action, before its effect.
pub const ACTION_COST: i64 = 1;

/// Charged when ending a move on a pit.
pub const PIT_PENALTY: i64 = 10_000;

/// Charged when ending a move on a monster.
pub const MONSTER_PENALTY: i64 = 100_000;

/// Awarded for picking gold.
pub const GOLD_REWARD: i64 = 10_000;

/// Awarded for shooting a monster.
pub const KILL_REWARD: i64 = 10_000;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Construction parameters for a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    /// Grid side length (grid is `size × size`)
    pub size: usize,

    /// Chance that a non-origin cell holds a pit
    pub pit_probability: f64,

    /// Chance that a non-origin cell holds gold
    pub gold_probability: f64,

    /// Number of monsters, each on a distinct non-origin cell
    pub monster_count: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: 10,
            pit_probability: 0.2,
            gold_probability: 0.2,
            monster_count: 4,
        }
    }
}

impl WorldConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_probabilities(mut self, pit: f64, gold: f64) -> Self {
        self.pit_probability = pit;
        self.gold_probability = gold;
        self
    }

    pub fn with_monsters(mut self, count: usize) -> Self {
        self.monster_count = count;
        self
    }

    /// Checks the construction invariants.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || self.size > MAX_SIZE {
            return Err(GameError::validation(format!(
                "Size must be between [1,{MAX_SIZE}] ({})",
                self.size
            )));
        }
        if !(0.0..=1.0).contains(&self.pit_probability) {
            return Err(GameError::validation(format!(
                "Pit probability must be between [0,1] ({})",
                self.pit_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.gold_probability) {
            return Err(GameError::validation(format!(
                "Gold probability must be between [0,1] ({})",
                self.gold_probability
            )));
        }
        let free_cells = self.size * self.size - 1;
        if self.monster_count > free_cells {
            return Err(GameError::validation(format!(
                "Monster count must be at most {free_cells} ({})",
                self.monster_count
            )));
        }
        Ok(())
    }
}

// =============================================================================
// AGENT RECORD
// =============================================================================

/// An agent's record, as seen by the agent itself and by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,

    /// Grid marker, `H<id>`
    pub tag: String,

    pub location: Location,

    pub arrows: u32,

    /// Unbounded below; the base cost alone can drive it negative
    pub score: i64,

    /// Number of actions taken
    pub moves: u64,

    /// Set once the agent has left mid-game but its record is kept
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub gone: bool,
}

impl Agent {
    fn new(id: AgentId, location: Location) -> Self {
        Self {
            id,
            tag: id.tag(),
            location,
            arrows: START_ARROWS,
            score: 0,
            moves: 0,
            gone: false,
        }
    }
}

/// Summary of a world for lobby-style listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMeta {
    pub size: usize,
    pub pit_probability: f64,
    pub gold_probability: f64,
    pub player_count: usize,
}

// =============================================================================
// GRID WORLD
// =============================================================================

/// The game board plus every agent record on it.
#[derive(Debug, Clone)]
pub struct GridWorld {
    config: WorldConfig,
    cells: Vec<Cell>,
    agents: Vec<Agent>,
    next_id: u32,
}

impl GridWorld {
    /// Creates a world with no hazards, gold or monsters.
    ///
    /// Only the size of `config` is used for layout; the rest is kept for
    /// [`GridWorld::meta`].
    pub fn empty(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let n = config.size;
        Ok(Self {
            config,
            cells: vec![Cell::new(); n * n],
            agents: Vec::new(),
            next_id: 0,
        })
    }

    /// Lays out a new world.
    ///
    /// Pits and gold are rolled independently for every non-origin cell;
    /// monsters are then sampled without replacement from the non-origin
    /// cells.
    pub fn generate<R: Rng + ?Sized>(config: WorldConfig, rng: &mut R) -> Result<Self> {
        let mut world = Self::empty(config)?;
        let total = world.cells.len();
        let (pit, gold) = (world.config.pit_probability, world.config.gold_probability);

        for cell in world.cells.iter_mut().skip(1) {
            if rng.gen_bool(pit) {
                cell.insert(Symbol::Pit);
            }
        }
        for cell in world.cells.iter_mut().skip(1) {
            if rng.gen_bool(gold) {
                cell.insert(Symbol::Gold);
            }
        }
        for i in rand::seq::index::sample(rng, total - 1, world.config.monster_count) {
            world.cells[i + 1].insert(Symbol::Monster);
        }

        Ok(world)
    }

    pub fn size(&self) -> usize {
        self.config.size
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize) -> Result<&Cell> {
        let i = cell_index(x, y, self.size())?;
        Ok(&self.cells[i])
    }

    /// Agent records in join order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| GameError::not_found(id))
    }

    /// Number of agent records, gone ones included.
    pub fn population(&self) -> usize {
        self.agents.len()
    }

    pub fn meta(&self) -> WorldMeta {
        WorldMeta {
            size: self.size(),
            pit_probability: self.config.pit_probability,
            gold_probability: self.config.gold_probability,
            player_count: self.population(),
        }
    }

    /// Non-empty cells keyed by flat index.
    pub fn occupied_cells(&self) -> BTreeMap<usize, Vec<Symbol>> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(i, cell)| (i, cell.iter().copied().collect()))
            .collect()
    }

    /// Number of cells holding `symbol`.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells.iter().filter(|c| c.contains(&symbol)).count()
    }

    // -------------------------------------------------------------------------
    // Agents
    // -------------------------------------------------------------------------

    /// Adds an agent at the origin.
    pub fn add_agent(&mut self) -> Result<Percept> {
        self.add_agent_at((0, 0))
    }

    /// Adds an agent at `location` and returns its first percept.
    pub fn add_agent_at(&mut self, location: Location) -> Result<Percept> {
        if self.agents.len() >= MAX_AGENTS {
            return Err(GameError::limits(format!("Too many agents (max {MAX_AGENTS})")));
        }
        let i = cell_index(location.0, location.1, self.size())?;

        let id = AgentId(self.next_id);
        self.next_id += 1;
        self.agents.push(Agent::new(id, location));
        self.cells[i].insert(Symbol::Agent(id));

        self.percept(id)
    }

    /// Erases an agent record and its grid marker.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Agent> {
        let slot = self.slot(id)?;
        let agent = self.agents.remove(slot);
        let i = self.index(agent.location);
        self.cells[i].remove(&Symbol::Agent(id));
        Ok(agent)
    }

    /// Flags an agent as gone, keeping its record and marker in place.
    pub fn mark_gone(&mut self, id: AgentId) -> Result<Agent> {
        let slot = self.slot(id)?;
        self.agents[slot].gone = true;
        Ok(self.agents[slot].clone())
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Applies one action and returns the resulting percept.
    ///
    /// The base cost is charged before the action's own effect, so a
    /// wasted action still costs a point.
    pub fn action(&mut self, id: AgentId, action: Action) -> Result<Percept> {
        let slot = self.slot(id)?;
        self.agents[slot].moves += 1;
        self.agents[slot].score -= ACTION_COST;

        let extra = match action {
            Action::Move { direction } => {
                let (x, y) = self.agents[slot].location;
                if let Some(dest) = step(x, y, self.size(), direction) {
                    self.relocate(slot, dest);
                }
                self.apply_hazards(slot);
                Vec::new()
            }
            Action::Pick { what } => {
                let i = self.index(self.agents[slot].location);
                if what == Symbol::Gold && self.cells[i].remove(&Symbol::Gold) {
                    self.agents[slot].score += GOLD_REWARD;
                }
                Vec::new()
            }
            Action::Shoot { direction } => self.shoot(slot, direction),
        };

        self.percept_with(id, extra)
    }

    fn shoot(&mut self, slot: usize, direction: crate::grid::Direction) -> Vec<Signal> {
        let agent = &mut self.agents[slot];
        if agent.arrows == 0 {
            return Vec::new();
        }
        agent.arrows -= 1;

        let (x, y) = agent.location;
        let Some(target) = step(x, y, self.config.size, direction) else {
            return Vec::new();
        };
        let i = self.index(target);
        if self.cells[i].remove(&Symbol::Monster) {
            self.agents[slot].score += KILL_REWARD;
            return vec![Signal::Stench];
        }
        Vec::new()
    }

    fn apply_hazards(&mut self, slot: usize) {
        let i = self.index(self.agents[slot].location);
        let cell = &self.cells[i];
        let mut penalty = 0;
        if cell.contains(&Symbol::Pit) {
            penalty += PIT_PENALTY;
        }
        if cell.contains(&Symbol::Monster) {
            penalty += MONSTER_PENALTY;
        }
        self.agents[slot].score -= penalty;
    }

    /// Moves an agent's marker and location together.
    fn relocate(&mut self, slot: usize, dest: Location) {
        let id = self.agents[slot].id;
        let from = self.index(self.agents[slot].location);
        let to = self.index(dest);
        self.cells[from].remove(&Symbol::Agent(id));
        self.cells[to].insert(Symbol::Agent(id));
        self.agents[slot].location = dest;
    }

    fn slot(&self, id: AgentId) -> Result<usize> {
        self.agents
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| GameError::not_found(id))
    }

    fn index(&self, (x, y): Location) -> usize {
        x + y * self.config.size
    }

    /// Text rendering, one grid row per line.
    pub fn render(&self) -> String {
        let n = self.size();
        let mut out = String::new();
        for (i, cell) in self.cells.iter().enumerate() {
            let symbols: String = cell.iter().map(|s| s.to_string()).collect();
            out.push_str(&format!("[{symbols:<5}]"));
            if grid_index(i, n).0 == n - 1 {
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }

    /// Puts a symbol into a cell. Test and scenario setup only.
    #[cfg(test)]
    pub(crate) fn place(&mut self, symbol: Symbol, (x, y): Location) -> Result<()> {
        let i = cell_index(x, y, self.size())?;
        self.cells[i].insert(symbol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Direction;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn empty_world(n: usize) -> GridWorld {
        GridWorld::empty(WorldConfig::default().with_size(n).with_monsters(0)).unwrap()
    }

    fn mv(direction: Direction) -> Action {
        Action::Move { direction }
    }

    #[test]
    fn test_construction_validation() {
        let bad = [
            WorldConfig::default().with_size(0),
            WorldConfig::default().with_size(11),
            WorldConfig::default().with_probabilities(-0.1, 0.2),
            WorldConfig::default().with_probabilities(0.2, 1.5),
            WorldConfig::default().with_probabilities(f64::NAN, 0.2),
            WorldConfig::default().with_size(2).with_monsters(4),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for config in bad {
            let err = GridWorld::generate(config.clone(), &mut rng).unwrap_err();
            assert_eq!(err.category(), "ValidationError", "{config:?}");
        }
    }

    #[test]
    fn test_origin_is_safe() {
        let config = WorldConfig::default().with_probabilities(1.0, 1.0).with_monsters(3);
        let world = GridWorld::generate(config, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();

        assert!(world.cell(0, 0).unwrap().is_empty());
        assert_eq!(world.count(Symbol::Pit), 99);
        assert_eq!(world.count(Symbol::Gold), 99);
        assert_eq!(world.count(Symbol::Monster), 3);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let config = WorldConfig::default();
        let a = GridWorld::generate(config.clone(), &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = GridWorld::generate(config, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn test_agent_ids_are_sequential_and_capped() {
        let mut world = empty_world(3);
        for expected in 0..MAX_AGENTS as u32 {
            assert_eq!(world.add_agent().unwrap().agent.id, AgentId(expected));
        }
        let err = world.add_agent().unwrap_err();
        assert_eq!(err.category(), "LimitsError");
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut world = empty_world(3);
        world.add_agent().unwrap();
        let second = world.add_agent().unwrap().agent.id;
        world.remove_agent(AgentId(0)).unwrap();

        // Remaining agent is still addressable by its own id
        assert_eq!(world.agent(second).unwrap().tag, "H1");
        assert_eq!(world.add_agent().unwrap().agent.id, AgentId(2));
        assert!(!world.cell(0, 0).unwrap().contains(&Symbol::Agent(AgentId(0))));
    }

    #[test]
    fn test_unknown_agent() {
        let mut world = empty_world(3);
        assert_eq!(world.remove_agent(AgentId(4)).unwrap_err().category(), "NotFoundError");
        assert_eq!(world.action(AgentId(4), mv(Direction::E)).unwrap_err().category(), "NotFoundError");
    }

    #[test]
    fn test_move_keeps_markers_in_sync() {
        let mut world = empty_world(3);
        let id = world.add_agent().unwrap().agent.id;

        let percept = world.action(id, mv(Direction::S)).unwrap();
        assert_eq!(percept.agent.location, (0, 1));
        assert_eq!(percept.agent.moves, 1);
        assert_eq!(percept.agent.score, -1);
        assert!(!world.cell(0, 0).unwrap().contains(&Symbol::Agent(id)));
        assert!(world.cell(0, 1).unwrap().contains(&Symbol::Agent(id)));
    }

    #[test]
    fn test_move_off_grid_still_costs() {
        let mut world = empty_world(3);
        let id = world.add_agent().unwrap().agent.id;

        let percept = world.action(id, mv(Direction::N)).unwrap();
        assert_eq!(percept.agent.location, (0, 0));
        assert_eq!(percept.agent.score, -1);
        assert_eq!(percept.agent.moves, 1);
    }

    #[test]
    fn test_pit_penalty_once_per_move() {
        let mut world = empty_world(3);
        world.place(Symbol::Pit, (1, 0)).unwrap();
        let id = world.add_agent().unwrap().agent.id;

        let percept = world.action(id, mv(Direction::E)).unwrap();
        assert_eq!(percept.agent.score, -1 - PIT_PENALTY);

        world.action(id, mv(Direction::W)).unwrap();
        let percept = world.action(id, mv(Direction::E)).unwrap();
        assert_eq!(percept.agent.score, -3 - 2 * PIT_PENALTY);
    }

    #[test]
    fn test_pit_and_monster_both_apply() {
        let mut world = empty_world(3);
        world.place(Symbol::Pit, (0, 1)).unwrap();
        world.place(Symbol::Monster, (0, 1)).unwrap();
        let id = world.add_agent().unwrap().agent.id;

        let percept = world.action(id, mv(Direction::S)).unwrap();
        assert_eq!(percept.agent.score, -1 - PIT_PENALTY - MONSTER_PENALTY);
        assert_eq!(percept.cell, vec![Symbol::Pit, Symbol::Monster, Symbol::Agent(id)]);
    }

    #[test]
    fn test_pick_gold_once() {
        let mut world = empty_world(3);
        world.place(Symbol::Gold, (0, 0)).unwrap();
        let id = world.add_agent().unwrap().agent.id;
        let pick = Action::Pick { what: Symbol::Gold };

        assert_eq!(world.action(id, pick).unwrap().agent.score, GOLD_REWARD - 1);
        assert_eq!(world.action(id, pick).unwrap().agent.score, GOLD_REWARD - 2);
        assert_eq!(world.count(Symbol::Gold), 0);
    }

    #[test]
    fn test_pick_other_symbols_only_costs() {
        let mut world = empty_world(3);
        world.place(Symbol::Pit, (0, 0)).unwrap();
        let id = world.add_agent().unwrap().agent.id;

        world.action(id, Action::Pick { what: Symbol::Pit }).unwrap();
        world.action(id, Action::Pick { what: Symbol::Gold }).unwrap();
        let percept = world.action(id, Action::Pick { what: Symbol::Agent(id) }).unwrap();

        assert_eq!(percept.agent.score, -3);
        assert!(world.cell(0, 0).unwrap().contains(&Symbol::Pit));
        assert!(world.cell(0, 0).unwrap().contains(&Symbol::Agent(id)));
    }

    #[test]
    fn test_shoot_kills_adjacent_monster() {
        let mut world = empty_world(3);
        world.place(Symbol::Monster, (1, 0)).unwrap();
        let id = world.add_agent().unwrap().agent.id;

        let before = world.percept(id).unwrap();
        assert_eq!(before.percept, vec![Signal::Stench]);

        let after = world.action(id, Action::Shoot { direction: Direction::E }).unwrap();
        // Neighbour stench is gone; the trailing stench is the kill signal
        assert_eq!(after.percept, vec![Signal::Stench]);
        assert_eq!(after.agent.score, KILL_REWARD - 1);
        assert_eq!(after.agent.arrows, START_ARROWS - 1);
        assert_eq!(world.count(Symbol::Monster), 0);
    }

    #[test]
    fn test_shoot_miss_and_wall() {
        let mut world = empty_world(3);
        let id = world.add_agent().unwrap().agent.id;

        let miss = world.action(id, Action::Shoot { direction: Direction::S }).unwrap();
        assert!(miss.percept.is_empty());
        let wall = world.action(id, Action::Shoot { direction: Direction::W }).unwrap();
        assert!(wall.percept.is_empty());
        assert_eq!(wall.agent.arrows, START_ARROWS - 2);
        assert_eq!(wall.agent.score, -2);
    }

    #[test]
    fn test_shoot_without_arrows() {
        let mut world = empty_world(3);
        let id = world.add_agent().unwrap().agent.id;
        for _ in 0..START_ARROWS {
            world.action(id, Action::Shoot { direction: Direction::S }).unwrap();
        }
        world.place(Symbol::Monster, (1, 0)).unwrap();

        let percept = world.action(id, Action::Shoot { direction: Direction::E }).unwrap();
        assert_eq!(percept.percept, vec![Signal::Stench]);
        assert_eq!(percept.agent.arrows, 0);
        assert_eq!(percept.agent.score, -(START_ARROWS as i64) - 1);
        assert_eq!(world.count(Symbol::Monster), 1);
    }

    #[test]
    fn test_mark_gone_keeps_record() {
        let mut world = empty_world(3);
        let id = world.add_agent().unwrap().agent.id;

        let agent = world.mark_gone(id).unwrap();
        assert!(agent.gone);
        assert_eq!(world.population(), 1);
        assert!(world.cell(0, 0).unwrap().contains(&Symbol::Agent(id)));
    }

    #[test]
    fn test_snapshot_helpers() {
        let mut world = empty_world(2);
        world.place(Symbol::Gold, (1, 1)).unwrap();
        world.add_agent().unwrap();

        let occupied = world.occupied_cells();
        assert_eq!(occupied.len(), 2);
        assert_eq!(occupied[&3], vec![Symbol::Gold]);
        assert_eq!(world.render(), "[H0   ][     ]\n[     ][G    ]");
        assert_eq!(world.meta().player_count, 1);
    }

    proptest! {
        #[test]
        fn prop_construction_invariants(n in 1usize..=MAX_SIZE, monsters in 0usize..8, seed in any::<u64>()) {
            prop_assume!(monsters < n * n);
            let config = WorldConfig::default().with_size(n).with_monsters(monsters);
            let world = GridWorld::generate(config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();

            prop_assert_eq!(world.cells().len(), n * n);
            prop_assert_eq!(world.count(Symbol::Monster), monsters);
            prop_assert!(world.cell(0, 0).unwrap().is_empty());
        }
    }
}
