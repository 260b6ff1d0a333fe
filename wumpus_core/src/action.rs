//! Agent actions.
//!
//! Requests arrive as an action kind plus an untyped argument bag
//! (`{"type": "MOVE", "payload": {"direction": "E"}}`). They are parsed into
//! [`Action`] at the boundary so the world only ever sees well-formed moves.

use crate::error::{GameError, Result};
use crate::grid::{Direction, Symbol};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "UPPERCASE")]
pub enum Action {
    /// Step one cell; bumping into the edge still costs a move
    Move { direction: Direction },

    /// Pick up a symbol from the current cell (only gold is pickable)
    Pick { what: Symbol },

    /// Fire an arrow into the adjacent cell
    Shoot { direction: Direction },
}

impl Action {
    /// Wire name of the action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "MOVE",
            Action::Pick { .. } => "PICK",
            Action::Shoot { .. } => "SHOOT",
        }
    }

    /// Parses an action from its kind and argument bag.
    ///
    /// Unknown kinds, missing arguments, diagonal directions and unknown
    /// symbols all fail with [`GameError::Validation`].
    pub fn parse(kind: &str, args: &Value) -> Result<Self> {
        match kind {
            "MOVE" => Ok(Action::Move {
                direction: string_arg(args, "direction")?.parse()?,
            }),
            "PICK" => Ok(Action::Pick {
                what: string_arg(args, "what")?.parse()?,
            }),
            "SHOOT" => Ok(Action::Shoot {
                direction: string_arg(args, "direction")?.parse()?,
            }),
            other => Err(GameError::validation(format!("Invalid action type ({other})"))),
        }
    }

    /// Parses a whole request body of the form `{"type": ..., "payload": ...}`.
    pub fn from_request(body: &Value) -> Result<Self> {
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GameError::validation("Missing action type"))?;
        Self::parse(kind, body.get("payload").unwrap_or(&Value::Null))
    }
}

fn string_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::validation(format!("Missing required argument '{name}'")))
}
