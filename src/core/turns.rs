//! Turn normalization.
//!
//! Requests describe the conversation turns in several shapes: nothing at all,
//! a single string, or a list of strings (repeated `input` query parameters
//! arrive as a list too). [`normalize_turns`] folds all of them into a
//! [`TurnSequence`], which is never empty.

use serde_json::Value;

/// Turn submitted when the request supplies none.
pub const DEFAULT_TURN: &str = "Hello!";

/// Raw turn input as received from an entry point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnInput {
    /// No input supplied, or a body that failed to parse.
    #[default]
    Absent,
    /// A single prompt.
    Single(String),
    /// An ordered list of prompts.
    Many(Vec<String>),
    /// Input of a shape we do not understand.
    Malformed,
}

impl TurnInput {
    /// Interpret the `input` field of a JSON request body.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => TurnInput::Absent,
            Some(Value::String(s)) => TurnInput::Single(s.clone()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
                .map_or(TurnInput::Malformed, TurnInput::Many),
            Some(_) => TurnInput::Malformed,
        }
    }
}

impl From<Vec<String>> for TurnInput {
    fn from(values: Vec<String>) -> Self {
        TurnInput::Many(values)
    }
}

/// Ordered, non-empty list of user turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSequence(Vec<String>);

impl TurnSequence {
    /// Single-turn sequence.
    pub fn single(turn: impl Into<String>) -> Self {
        Self(vec![turn.into()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a normalized sequence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a TurnSequence {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Fold any request input into a [`TurnSequence`].
///
/// Non-empty lists are kept as-is, a non-empty string becomes a one-element
/// sequence, and everything else falls back to `default_turn`.
pub fn normalize_turns(input: TurnInput, default_turn: &str) -> TurnSequence {
    match input {
        TurnInput::Many(turns) if !turns.is_empty() => TurnSequence(turns),
        TurnInput::Single(turn) if !turn.is_empty() => TurnSequence(vec![turn]),
        _ => TurnSequence::single(default_turn),
    }
}
