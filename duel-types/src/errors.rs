use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Rejection codes delivered through `game:guess:invalid`. Input validation
/// failures never mutate match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum GuessError {
    InvalidGuess,
    NotYourMatch,
    MatchNotActive,
    NoGuessesRemaining,
}

impl std::fmt::Display for GuessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            GuessError::InvalidGuess => "INVALID_GUESS",
            GuessError::NotYourMatch => "NOT_YOUR_MATCH",
            GuessError::MatchNotActive => "MATCH_NOT_ACTIVE",
            GuessError::NoGuessesRemaining => "NO_GUESSES_REMAINING",
        };
        write!(f, "{}", code)
    }
}

/// Connection-level failures surfaced through the generic `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GatewayError {
    NotAuthenticated,
    Internal,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::NotAuthenticated => write!(f, "NOT_AUTHENTICATED"),
            GatewayError::Internal => write!(f, "INTERNAL"),
        }
    }
}
