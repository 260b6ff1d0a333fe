//! Simulation scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Random walkers for a full run
    RandomWalk,

    /// SIM-002: Gold seekers on a gold-rich grid
    GoldRush,

    /// SIM-003: Stop requested a few turns into a long run
    EarlyStop,

    /// SIM-004: Reset while the turn loop is mid-run
    ResetMidGame,

    /// SIM-005: An agent connection drops mid-game
    Disconnect,

    /// SIM-006: Spectators connect and disconnect during a run
    ObserverChurn,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::RandomWalk,
            ScenarioId::GoldRush,
            ScenarioId::EarlyStop,
            ScenarioId::ResetMidGame,
            ScenarioId::Disconnect,
            ScenarioId::ObserverChurn,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::RandomWalk => "random_walk",
            ScenarioId::GoldRush => "gold_rush",
            ScenarioId::EarlyStop => "early_stop",
            ScenarioId::ResetMidGame => "reset_mid_game",
            ScenarioId::Disconnect => "disconnect",
            ScenarioId::ObserverChurn => "observer_churn",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::RandomWalk => "Random agents play every turn; world invariants hold at the end",
            ScenarioId::GoldRush => "Gold seekers pick and shoot; gold and monster counts add up",
            ScenarioId::EarlyStop => "stop() mid-run halts the loop within one turn time",
            ScenarioId::ResetMidGame => "reset() mid-run silences the old loop and ends agent feeds",
            ScenarioId::Disconnect => "A dropped agent feed marks the agent gone and inert",
            ScenarioId::ObserverChurn => "Viewers come and go; no subscription outlives its feed",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_walk" | "randomwalk" | "sim-001" => Ok(ScenarioId::RandomWalk),
            "gold_rush" | "goldrush" | "sim-002" => Ok(ScenarioId::GoldRush),
            "early_stop" | "earlystop" | "sim-003" => Ok(ScenarioId::EarlyStop),
            "reset_mid_game" | "reset" | "sim-004" => Ok(ScenarioId::ResetMidGame),
            "disconnect" | "sim-005" => Ok(ScenarioId::Disconnect),
            "observer_churn" | "churn" | "sim-006" => Ok(ScenarioId::ObserverChurn),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
