use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    CellColor, EndReason, GuessError, GuessRecord, MaskedGuess, MatchId, MatchOutcome,
    OpponentInfo, PlayerId,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum ClientMessage {
    #[serde(rename = "register", rename_all = "camelCase")]
    Register {
        id: PlayerId,
        username: String,
        elo: i32,
    },
    #[serde(rename = "matchmaking:start")]
    MatchmakingStart,
    #[serde(rename = "matchmaking:cancel")]
    MatchmakingCancel,
    #[serde(rename = "game:guess", rename_all = "camelCase")]
    Guess { game_id: MatchId, guess: String },
    #[serde(rename = "game:forfeit", rename_all = "camelCase")]
    Forfeit { game_id: MatchId },
    #[serde(rename = "game:rejoin", rename_all = "camelCase")]
    Rejoin { game_id: MatchId },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum ServerMessage {
    #[serde(rename = "matchmaking:searching")]
    MatchmakingSearching,
    #[serde(rename = "matchmaking:cancelled")]
    MatchmakingCancelled,
    #[serde(rename = "game:start", rename_all = "camelCase")]
    GameStart {
        game_id: MatchId,
        opponent: OpponentInfo,
    },
    #[serde(rename = "game:guess:result", rename_all = "camelCase")]
    GuessResult {
        word: String,
        colors: Vec<CellColor>,
        guess_number: u8,
        is_correct: bool,
        remaining_guesses: u8,
    },
    #[serde(rename = "game:guess:invalid")]
    GuessInvalid { error: GuessError },
    #[serde(rename = "game:opponent:guess", rename_all = "camelCase")]
    OpponentGuess {
        colors: Vec<CellColor>,
        guess_number: u8,
    },
    #[serde(rename = "game:rejoined", rename_all = "camelCase")]
    Rejoined {
        game_id: MatchId,
        guesses: Vec<GuessRecord>,
        opponent_progress: Vec<MaskedGuess>,
        opponent: OpponentInfo,
    },
    #[serde(rename = "game:notfound")]
    GameNotFound,
    #[serde(rename = "game:end", rename_all = "camelCase")]
    GameEnd {
        game_id: MatchId,
        result: MatchOutcome,
        reason: EndReason,
        target_word: String,
        opponent: OpponentEndSummary,
        my_guesses: Vec<GuessRecord>,
        elo_change: i32,
        new_elo: i32,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Terminal-event opponent summary. The match is over, so the opponent's
/// full guess history is revealed here.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpponentEndSummary {
    pub username: String,
    pub guesses: Vec<GuessRecord>,
}
