use std::collections::HashMap;

use duel_types::{
    BotDifficulty, GuessError, GuessRecord, MAX_GUESSES, MatchId, MatchState, MatchStatus,
    PlayerId, PlayerSlot, ReplayEvent,
};

use crate::dictionary::{Dictionary, evaluate, normalize_guess};

/// Epoch milliseconds, the timestamp unit used throughout match state.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Seed data for one side of a new match.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub synthetic_difficulty: Option<BotDifficulty>,
}

impl NewPlayer {
    pub fn human(id: PlayerId, display_name: impl Into<String>, rating: i32) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            rating,
            synthetic_difficulty: None,
        }
    }

    pub fn synthetic(id: PlayerId, display_name: impl Into<String>, difficulty: BotDifficulty) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            rating: crate::bot::bot_rating(difficulty),
            synthetic_difficulty: Some(difficulty),
        }
    }
}

/// Matches are created directly in the Active state; nothing observes them
/// before both sides are notified.
pub fn create_match(
    id: MatchId,
    target: String,
    players: [NewPlayer; 2],
    started_at: i64,
) -> MatchState {
    debug_assert_ne!(players[0].id, players[1].id);

    let mut slots = HashMap::new();
    for player in players {
        slots.insert(
            player.id,
            PlayerSlot {
                id: player.id,
                display_name: player.display_name,
                rating_at_start: player.rating,
                guesses: Vec::new(),
                is_synthetic: player.synthetic_difficulty.is_some(),
                synthetic_difficulty: player.synthetic_difficulty,
            },
        );
    }

    MatchState {
        id,
        target,
        status: MatchStatus::Active,
        started_at,
        ended_at: None,
        players: slots,
        winner_id: None,
        replay_log: Vec::new(),
    }
}

/// Validate a raw guess against the match and dictionary without touching
/// state. Returns the normalized (uppercased) word on success.
pub fn validate_guess(
    state: &MatchState,
    player_id: &PlayerId,
    word: &str,
    dictionary: &Dictionary,
) -> Result<String, GuessError> {
    let slot = state.slot(player_id).ok_or(GuessError::NotYourMatch)?;
    if !state.is_active() {
        return Err(GuessError::MatchNotActive);
    }
    if slot.guesses.len() >= MAX_GUESSES {
        return Err(GuessError::NoGuessesRemaining);
    }
    let normalized = normalize_guess(word).ok_or(GuessError::InvalidGuess)?;
    if !dictionary.is_valid_guess(&normalized) {
        return Err(GuessError::InvalidGuess);
    }
    Ok(normalized)
}

/// Outcome of committing a validated guess.
#[derive(Debug, Clone)]
pub struct AppliedGuess {
    pub record: GuessRecord,
    pub solved: bool,
    pub quota_exhausted: bool,
}

/// Append a validated guess to the player's slot and the replay log. The
/// caller decides what the outcome means for the match (win claim, draw).
pub fn apply_guess(
    state: &mut MatchState,
    player_id: &PlayerId,
    word: String,
    timestamp: i64,
) -> AppliedGuess {
    let evaluation = evaluate(&word, &state.target).to_vec();
    let slot = state
        .players
        .get_mut(player_id)
        .expect("guess was validated against this match");

    // Slot timestamps are strictly increasing even if the clock stalls.
    let timestamp = slot
        .guesses
        .last()
        .map(|g| timestamp.max(g.timestamp + 1))
        .unwrap_or(timestamp);

    let record = GuessRecord {
        word: word.clone(),
        ordinal: (slot.guesses.len() + 1) as u8,
        timestamp,
        evaluation: evaluation.clone(),
    };
    slot.guesses.push(record.clone());

    state.replay_log.push(ReplayEvent::Guess {
        player_id: *player_id,
        timestamp,
        word,
        evaluation,
    });

    let solved = record.is_winning();
    let quota_exhausted = state
        .players
        .values()
        .all(|slot| slot.guesses.len() >= MAX_GUESSES);

    AppliedGuess {
        record,
        solved,
        quota_exhausted,
    }
}

pub fn record_winner(state: &mut MatchState, winner_id: PlayerId, ended_at: i64) {
    debug_assert!(state.players.contains_key(&winner_id));
    state.status = MatchStatus::Finished;
    state.winner_id = Some(winner_id);
    state.ended_at = Some(ended_at.max(state.started_at));
}

pub fn finish_draw(state: &mut MatchState, ended_at: i64) {
    state.status = MatchStatus::Finished;
    state.winner_id = None;
    state.ended_at = Some(ended_at.max(state.started_at));
}

/// Record a forfeit by `player_id`; the opponent wins. Returns the winner id,
/// or None if the forfeiting player is not in the match or it already ended.
pub fn apply_forfeit(
    state: &mut MatchState,
    player_id: &PlayerId,
    timestamp: i64,
) -> Option<PlayerId> {
    if !state.is_active() || !state.players.contains_key(player_id) {
        return None;
    }
    let winner_id = state.opponent_of(player_id)?.id;
    state.replay_log.push(ReplayEvent::Forfeit {
        player_id: *player_id,
        timestamp,
    });
    record_winner(state, winner_id, timestamp);
    Some(winner_id)
}

/// Terminal transition for matches that outlived their state TTL.
pub fn finish_timeout(state: &mut MatchState, ended_at: i64) {
    if state.is_active() {
        finish_draw(state, ended_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_types::CellColor;
    use uuid::Uuid;

    fn two_player_match(target: &str) -> (MatchState, PlayerId, PlayerId) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = create_match(
            Uuid::new_v4(),
            target.to_string(),
            [
                NewPlayer::human(a, "alice", 1200),
                NewPlayer::human(b, "bob", 1250),
            ],
            1_000,
        );
        (state, a, b)
    }

    #[test]
    fn new_match_is_active_with_two_slots() {
        let (state, a, b) = two_player_match("CRANE");
        assert!(state.is_active());
        assert_eq!(state.players.len(), 2);
        assert_ne!(a, b);
        assert!(state.winner_id.is_none());
        assert!(state.replay_log.is_empty());
    }

    #[test]
    fn validate_rejects_out_of_match_players() {
        let dict = Dictionary::with_test_words();
        let (state, _, _) = two_player_match("CRANE");
        let stranger = Uuid::new_v4();
        assert_eq!(
            validate_guess(&state, &stranger, "slate", &dict),
            Err(GuessError::NotYourMatch)
        );
    }

    #[test]
    fn validate_rejects_bad_words_without_state_change() {
        let dict = Dictionary::with_test_words();
        let (state, a, _) = two_player_match("CRANE");
        for word in ["slat", "slates", "zzzzz", "sl4te"] {
            assert_eq!(
                validate_guess(&state, &a, word, &dict),
                Err(GuessError::InvalidGuess)
            );
        }
        assert!(state.slot(&a).unwrap().guesses.is_empty());
    }

    #[test]
    fn validate_enforces_guess_quota() {
        let dict = Dictionary::with_test_words();
        let (mut state, a, _) = two_player_match("CRANE");
        for i in 0..MAX_GUESSES {
            let word = validate_guess(&state, &a, "slate", &dict).unwrap();
            apply_guess(&mut state, &a, word, 2_000 + i as i64);
        }
        assert_eq!(
            validate_guess(&state, &a, "slate", &dict),
            Err(GuessError::NoGuessesRemaining)
        );
    }

    #[test]
    fn validate_rejects_finished_match() {
        let dict = Dictionary::with_test_words();
        let (mut state, a, b) = two_player_match("CRANE");
        record_winner(&mut state, b, 5_000);
        assert_eq!(
            validate_guess(&state, &a, "slate", &dict),
            Err(GuessError::MatchNotActive)
        );
    }

    #[test]
    fn apply_guess_records_evaluation_and_replay() {
        let (mut state, a, _) = two_player_match("CRANE");
        let applied = apply_guess(&mut state, &a, "CRATE".to_string(), 2_000);

        assert_eq!(applied.record.ordinal, 1);
        assert!(!applied.solved);
        assert_eq!(
            applied.record.evaluation,
            vec![
                CellColor::Green,
                CellColor::Green,
                CellColor::Green,
                CellColor::Grey,
                CellColor::Green
            ]
        );
        assert_eq!(state.replay_log.len(), 1);
        assert_eq!(state.slot(&a).unwrap().guesses.len(), 1);
    }

    #[test]
    fn guess_timestamps_are_strictly_increasing() {
        let (mut state, a, _) = two_player_match("CRANE");
        // Same wall-clock instant for both submissions.
        apply_guess(&mut state, &a, "SLATE".to_string(), 2_000);
        apply_guess(&mut state, &a, "TRACE".to_string(), 2_000);

        let guesses = &state.slot(&a).unwrap().guesses;
        assert!(guesses[1].timestamp > guesses[0].timestamp);
    }

    #[test]
    fn solving_guess_is_flagged() {
        let (mut state, a, _) = two_player_match("CRANE");
        let applied = apply_guess(&mut state, &a, "CRANE".to_string(), 2_000);
        assert!(applied.solved);
        assert!(applied.record.is_winning());
    }

    #[test]
    fn quota_exhaustion_requires_both_players() {
        let (mut state, a, b) = two_player_match("CRANE");
        for i in 0..MAX_GUESSES {
            let applied = apply_guess(&mut state, &a, "SLATE".to_string(), 2_000 + i as i64);
            assert!(!applied.quota_exhausted);
        }
        for i in 0..MAX_GUESSES {
            let applied = apply_guess(&mut state, &b, "SLATE".to_string(), 3_000 + i as i64);
            if i == MAX_GUESSES - 1 {
                assert!(applied.quota_exhausted);
            } else {
                assert!(!applied.quota_exhausted);
            }
        }
    }

    #[test]
    fn forfeit_awards_the_opponent() {
        let (mut state, a, b) = two_player_match("CRANE");
        let winner = apply_forfeit(&mut state, &a, 4_000);
        assert_eq!(winner, Some(b));
        assert_eq!(state.status, MatchStatus::Finished);
        assert_eq!(state.winner_id, Some(b));
        assert!(matches!(
            state.replay_log.last(),
            Some(ReplayEvent::Forfeit { player_id, .. }) if *player_id == a
        ));
    }

    #[test]
    fn forfeit_is_idempotent_after_finish() {
        let (mut state, a, b) = two_player_match("CRANE");
        apply_forfeit(&mut state, &a, 4_000).unwrap();
        assert_eq!(apply_forfeit(&mut state, &b, 5_000), None);
        assert_eq!(state.winner_id, Some(b));
    }

    #[test]
    fn ended_at_never_precedes_started_at() {
        let (mut state, _, b) = two_player_match("CRANE");
        record_winner(&mut state, b, 1); // clock skew: earlier than started_at
        assert!(state.ended_at.unwrap() >= state.started_at);
    }

    #[test]
    fn masked_history_hides_words() {
        let (mut state, a, b) = two_player_match("CRANE");
        apply_guess(&mut state, &a, "SLATE".to_string(), 2_000);

        let masked = state.masked_opponent_history(&b);
        assert_eq!(masked.len(), 1);
        assert_eq!(masked[0].guess_number, 1);
        assert_eq!(masked[0].colors.len(), 5);
        let json = serde_json::to_string(&masked).unwrap();
        assert!(!json.contains("SLATE"));
    }
}
