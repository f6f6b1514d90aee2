use duel_core::dictionary::Dictionary;
use duel_core::match_state::{NewPlayer, create_match};
use duel_types::{MatchState, PlayerId};
use uuid::Uuid;

pub fn test_dictionary() -> Dictionary {
    Dictionary::with_test_words()
}

pub fn start_match(target: &str) -> (MatchState, PlayerId, PlayerId) {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let state = create_match(
        Uuid::new_v4(),
        target.to_string(),
        [
            NewPlayer::human(first, "alice", 1200),
            NewPlayer::human(second, "bob", 1200),
        ],
        1_000,
    );
    (state, first, second)
}
