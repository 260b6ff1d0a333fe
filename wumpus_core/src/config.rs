//! Session configuration.

use crate::error::{GameError, Result};
use crate::registry::RemovalPolicy;
use crate::world::WorldConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turn loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TurnSettings {
    /// Turns played by `run()` when no count is given
    pub run_turns: u32,

    /// Length of one turn window in milliseconds
    #[serde(rename = "turnTime")]
    pub turn_time_ms: u64,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            run_turns: 5,
            turn_time_ms: 400,
        }
    }
}

impl TurnSettings {
    pub fn turn_time(&self) -> Duration {
        Duration::from_millis(self.turn_time_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run_turns == 0 {
            return Err(GameError::validation("Run turns must be positive (0)"));
        }
        if self.turn_time_ms == 0 {
            return Err(GameError::validation("Turn time must be positive (0)"));
        }
        Ok(())
    }

    /// Applies a partial update, leaving `self` untouched if the result is invalid.
    pub fn merged(&self, update: SettingsUpdate) -> Result<Self> {
        let merged = Self {
            run_turns: update.run_turns.unwrap_or(self.run_turns),
            turn_time_ms: update.turn_time_ms.unwrap_or(self.turn_time_ms),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial update of [`TurnSettings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub run_turns: Option<u32>,

    #[serde(default, rename = "turnTime")]
    pub turn_time_ms: Option<u64>,
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub world: WorldConfig,
    pub turns: TurnSettings,

    /// Whether agents may join once the first run has started
    pub allow_join_after_init: bool,

    /// What happens to an agent that leaves mid-game
    pub removal_policy: RemovalPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            turns: TurnSettings::default(),
            allow_join_after_init: true,
            removal_policy: RemovalPolicy::MarkGone,
        }
    }
}

impl SessionConfig {
    pub fn with_world(mut self, world: WorldConfig) -> Self {
        self.world = world;
        self
    }

    pub fn with_turns(mut self, run_turns: u32, turn_time: Duration) -> Self {
        self.turns = TurnSettings {
            run_turns,
            turn_time_ms: turn_time.as_millis() as u64,
        };
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_join_after_init(mut self, allow: bool) -> Self {
        self.allow_join_after_init = allow;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;
        self.turns.validate()
    }

    /// Parses and validates a JSON config document. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| GameError::validation(format!("Invalid session config ({e})")))?;
        config.validate()?;
        Ok(config)
    }
}
