//! Error taxonomy shared by the world, the registry and the scheduler.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GameError>;

/// Errors surfaced to callers of a game session.
///
/// Every variant maps to a caller-facing `(status, category)` pair through
/// [`GameError::status`] and [`GameError::category`], so a transport layer
/// can answer without inspecting the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Malformed direction, action kind, symbol or construction parameter
    #[error("{0}")]
    Validation(String),

    /// Reference to an unknown agent
    #[error("{0} not found")]
    NotFound(String),

    /// Illegal state transition (run while running, run without agents, ...)
    #[error("{0}")]
    Logic(String),

    /// Population cap exceeded
    #[error("{0}")]
    Limits(String),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }

    pub fn limits(msg: impl Into<String>) -> Self {
        Self::Limits(msg.into())
    }

    /// HTTP-equivalent status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            GameError::Validation(_) => 400,
            GameError::NotFound(_) => 404,
            GameError::Logic(_) | GameError::Limits(_) => 422,
        }
    }

    /// Stable category name for this error.
    pub fn category(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "ValidationError",
            GameError::NotFound(_) => "NotFoundError",
            GameError::Logic(_) => "LogicError",
            GameError::Limits(_) => "LimitsError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_category_pairs() {
        let cases = [
            (GameError::validation("bad direction"), 400, "ValidationError"),
            (GameError::not_found("agent 3"), 404, "NotFoundError"),
            (GameError::logic("game already running"), 422, "LogicError"),
            (GameError::limits("too many agents"), 422, "LimitsError"),
        ];

        for (err, status, category) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.category(), category);
        }
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(GameError::not_found("agent 3").to_string(), "agent 3 not found");
    }
}
