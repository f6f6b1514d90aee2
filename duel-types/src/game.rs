use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{MatchId, PlayerId};

/// Per-position feedback for a guessed letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CellColor {
    Green,
    Yellow,
    Grey,
}

impl CellColor {
    /// Flattened one-character form used for constraint matching.
    pub fn pattern_char(&self) -> char {
        match self {
            CellColor::Green => 'G',
            CellColor::Yellow => 'Y',
            CellColor::Grey => 'X',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MatchStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
    Impossible,
}

impl BotDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotDifficulty::Easy => "easy",
            BotDifficulty::Medium => "medium",
            BotDifficulty::Hard => "hard",
            BotDifficulty::Impossible => "impossible",
        }
    }
}

/// One committed guess with its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GuessRecord {
    pub word: String,
    pub ordinal: u8,
    pub timestamp: i64,
    pub evaluation: Vec<CellColor>,
}

impl GuessRecord {
    pub fn is_winning(&self) -> bool {
        !self.evaluation.is_empty() && self.evaluation.iter().all(|c| *c == CellColor::Green)
    }
}

/// Opponent-facing projection of a guess. The word itself never crosses here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaskedGuess {
    pub colors: Vec<CellColor>,
    pub guess_number: u8,
}

impl From<&GuessRecord> for MaskedGuess {
    fn from(record: &GuessRecord) -> Self {
        MaskedGuess {
            colors: record.evaluation.clone(),
            guess_number: record.ordinal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerSlot {
    pub id: PlayerId,
    pub display_name: String,
    pub rating_at_start: i32,
    pub guesses: Vec<GuessRecord>,
    pub is_synthetic: bool,
    pub synthetic_difficulty: Option<BotDifficulty>,
}

impl PlayerSlot {
    pub fn has_solved(&self) -> bool {
        self.guesses.iter().any(GuessRecord::is_winning)
    }

    pub fn guesses_remaining(&self) -> u8 {
        (crate::MAX_GUESSES - self.guesses.len()) as u8
    }
}

/// Ordered record of everything that happened in a match, kept for history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum ReplayEvent {
    #[serde(rename_all = "camelCase")]
    Guess {
        player_id: PlayerId,
        timestamp: i64,
        word: String,
        evaluation: Vec<CellColor>,
    },
    #[serde(rename_all = "camelCase")]
    Forfeit { player_id: PlayerId, timestamp: i64 },
}

/// Authoritative live state of one match. Holds the target word, so this
/// type is confined to the server and the state store; clients only ever
/// see per-player projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub id: MatchId,
    pub target: String,
    pub status: MatchStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub players: HashMap<PlayerId, PlayerSlot>,
    pub winner_id: Option<PlayerId>,
    pub replay_log: Vec<ReplayEvent>,
}

impl MatchState {
    pub fn slot(&self, player_id: &PlayerId) -> Option<&PlayerSlot> {
        self.players.get(player_id)
    }

    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&PlayerSlot> {
        self.players.values().find(|slot| slot.id != *player_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    /// Color-only history of the given player's opponent, for rejoin views
    /// and spectating one's own match from a fresh connection.
    pub fn masked_opponent_history(&self, viewer: &PlayerId) -> Vec<MaskedGuess> {
        self.opponent_of(viewer)
            .map(|slot| slot.guesses.iter().map(MaskedGuess::from).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

/// Why a match reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EndReason {
    Solved,
    OutOfGuesses,
    Forfeit,
    Timeout,
}
