use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use duel_core::dictionary::Dictionary;
use duel_persistence::connection::connect_to_memory_database;
use duel_persistence::repositories::{MatchRepository, UserRepository};
use duel_server::engine::{EngineConfig, MatchCommand, MatchEngine};
use duel_server::session::{ConnectionId, SessionRegistry};
use duel_server::state_store::MemoryStateStore;
use duel_types::{EndReason, GuessError, MatchOutcome, PlayerProfile, ServerMessage};
use migration::{Migrator, MigratorTrait};

struct Harness {
    engine: Arc<MatchEngine>,
    registry: Arc<SessionRegistry>,
    users: UserRepository,
    matches: MatchRepository,
}

async fn harness() -> Harness {
    harness_with_bot_pacing(Duration::from_secs(600)).await
}

/// Engine over a one-answer dictionary (CRANE) so targets are predictable.
async fn harness_with_bot_pacing(bot_pacing: Duration) -> Harness {
    let registry = Arc::new(SessionRegistry::new());
    let dictionary = Arc::new(
        Dictionary::from_lists(
            vec!["crane".to_string()],
            ["slate", "trace", "crate", "salet", "stare", "house"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            vec!["crane".to_string()],
        )
        .unwrap(),
    );
    let store = Arc::new(MemoryStateStore::new(Duration::from_secs(60)));

    let db = connect_to_memory_database().await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let engine = MatchEngine::new(
        store,
        registry.clone(),
        dictionary,
        Arc::new(MatchRepository::new(db.clone())),
        EngineConfig {
            disconnect_grace: Duration::from_millis(100),
            match_ttl: Duration::from_secs(60),
            bot_pacing_override: Some(bot_pacing),
        },
    );

    Harness {
        engine,
        registry,
        users: UserRepository::new(db.clone()),
        matches: MatchRepository::new(db),
    }
}

fn connect(
    harness: &Harness,
    name: &str,
    elo: i32,
) -> (PlayerProfile, mpsc::UnboundedReceiver<ServerMessage>) {
    let profile = PlayerProfile {
        id: Uuid::new_v4(),
        username: name.to_string(),
        elo,
    };
    let conn = ConnectionId::new();
    let rx = harness.registry.open(conn);
    harness.registry.bind(conn, profile.clone());
    (profile, rx)
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a server message")
        .expect("registry channel closed")
}

#[tokio::test]
async fn first_correct_guess_wins_and_commits_ratings() {
    let harness = harness().await;
    let (alice, mut alice_rx) = connect(&harness, "alice", 1200);
    let (bob, mut bob_rx) = connect(&harness, "bob", 1200);

    let match_id = harness
        .engine
        .clone()
        .start_human_match(alice.clone(), bob.clone())
        .await
        .unwrap();

    assert!(matches!(
        next_message(&mut alice_rx).await,
        ServerMessage::GameStart { .. }
    ));
    assert!(matches!(
        next_message(&mut bob_rx).await,
        ServerMessage::GameStart { .. }
    ));
    assert_eq!(harness.engine.match_of(&alice.id), Some(match_id));

    harness.engine.submit(
        &match_id,
        MatchCommand::Guess {
            player_id: alice.id,
            word: "crane".to_string(),
        },
    );

    match next_message(&mut alice_rx).await {
        ServerMessage::GuessResult {
            is_correct, word, ..
        } => {
            assert!(is_correct);
            assert_eq!(word, "CRANE");
        }
        other => panic!("expected guess result, got {:?}", other),
    }
    match next_message(&mut alice_rx).await {
        ServerMessage::GameEnd {
            result,
            reason,
            elo_change,
            new_elo,
            target_word,
            ..
        } => {
            assert_eq!(result, MatchOutcome::Win);
            assert_eq!(reason, EndReason::Solved);
            assert_eq!(elo_change, 16);
            assert_eq!(new_elo, 1216);
            assert_eq!(target_word, "CRANE");
        }
        other => panic!("expected game end, got {:?}", other),
    }

    // Opponent got the masked copy and the loss.
    assert!(matches!(
        next_message(&mut bob_rx).await,
        ServerMessage::OpponentGuess { .. }
    ));
    match next_message(&mut bob_rx).await {
        ServerMessage::GameEnd {
            result, new_elo, ..
        } => {
            assert_eq!(result, MatchOutcome::Loss);
            assert_eq!(new_elo, 1184);
        }
        other => panic!("expected game end, got {:?}", other),
    }

    // The transaction landed: user rows and the history row agree.
    let stored = harness.users.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!((stored.elo, stored.wins, stored.games_played), (1216, 1, 1));
    let stored = harness.users.find_by_id(bob.id).await.unwrap().unwrap();
    assert_eq!((stored.elo, stored.losses, stored.games_played), (1184, 1, 1));

    let row = harness.matches.find_by_id(match_id).await.unwrap().unwrap();
    assert_eq!(row.winner_id, Some(alice.id));
    assert_eq!(row.loser_id, Some(bob.id));
    assert_eq!(row.target_word, "CRANE");
    assert!(!row.is_bot_match);

    // The actor is gone once the match is over.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.engine.live_match_count(), 0);
    assert_eq!(harness.engine.match_of(&alice.id), None);
}

#[tokio::test]
async fn twelve_missed_guesses_end_in_a_draw() {
    let harness = harness().await;
    let (alice, mut alice_rx) = connect(&harness, "alice", 1200);
    let (bob, mut bob_rx) = connect(&harness, "bob", 1200);

    let match_id = harness
        .engine
        .clone()
        .start_human_match(alice.clone(), bob.clone())
        .await
        .unwrap();
    next_message(&mut alice_rx).await;
    next_message(&mut bob_rx).await;

    for player in [&alice, &bob] {
        for _ in 0..6 {
            harness.engine.submit(
                &match_id,
                MatchCommand::Guess {
                    player_id: player.id,
                    word: "slate".to_string(),
                },
            );
        }
    }

    // Each side: six own results, six masked copies, then the draw.
    for rx in [&mut alice_rx, &mut bob_rx] {
        let mut own = 0;
        let mut masked = 0;
        loop {
            match next_message(rx).await {
                ServerMessage::GuessResult { is_correct, .. } => {
                    assert!(!is_correct);
                    own += 1;
                }
                ServerMessage::OpponentGuess { .. } => masked += 1,
                ServerMessage::GameEnd {
                    result,
                    reason,
                    elo_change,
                    new_elo,
                    ..
                } => {
                    assert_eq!(result, MatchOutcome::Draw);
                    assert_eq!(reason, EndReason::OutOfGuesses);
                    assert_eq!(elo_change, 0);
                    assert_eq!(new_elo, 1200);
                    break;
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert_eq!(own, 6);
        assert_eq!(masked, 6);
    }

    // Equal ratings, S = 0.5 both: nothing moves, nobody is a winner.
    for id in [alice.id, bob.id] {
        let stored = harness.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.elo, 1200);
        assert_eq!(stored.wins, 0);
        assert_eq!(stored.losses, 0);
        assert_eq!(stored.games_played, 1);
    }
    let row = harness.matches.find_by_id(match_id).await.unwrap().unwrap();
    assert_eq!(row.winner_id, None);
    assert_eq!(row.loser_id, None);
}

#[tokio::test]
async fn seventh_guess_is_rejected() {
    let harness = harness().await;
    let (alice, mut alice_rx) = connect(&harness, "alice", 1200);
    let (bob, mut bob_rx) = connect(&harness, "bob", 1200);

    let match_id = harness
        .engine
        .clone()
        .start_human_match(alice.clone(), bob.clone())
        .await
        .unwrap();
    next_message(&mut alice_rx).await;
    next_message(&mut bob_rx).await;

    for _ in 0..7 {
        harness.engine.submit(
            &match_id,
            MatchCommand::Guess {
                player_id: alice.id,
                word: "slate".to_string(),
            },
        );
    }

    let mut results = 0;
    loop {
        match next_message(&mut alice_rx).await {
            ServerMessage::GuessResult { .. } => results += 1,
            ServerMessage::GuessInvalid { error } => {
                assert_eq!(error, GuessError::NoGuessesRemaining);
                break;
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
    assert_eq!(results, 6);
}

#[tokio::test]
async fn strangers_cannot_guess_into_a_match() {
    let harness = harness().await;
    let (alice, mut alice_rx) = connect(&harness, "alice", 1200);
    let (bob, mut bob_rx) = connect(&harness, "bob", 1200);
    let (mallory, mut mallory_rx) = connect(&harness, "mallory", 1200);

    let match_id = harness
        .engine
        .clone()
        .start_human_match(alice.clone(), bob.clone())
        .await
        .unwrap();
    next_message(&mut alice_rx).await;
    next_message(&mut bob_rx).await;

    harness.engine.submit(
        &match_id,
        MatchCommand::Guess {
            player_id: mallory.id,
            word: "slate".to_string(),
        },
    );

    match next_message(&mut mallory_rx).await {
        ServerMessage::GuessInvalid { error } => assert_eq!(error, GuessError::NotYourMatch),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn bot_match_moves_only_the_human_rating() {
    // Keep the bot idle; the human solves first.
    let harness = harness_with_bot_pacing(Duration::from_secs(600)).await;
    let (carol, mut carol_rx) = connect(&harness, "carol", 1350);

    let match_id = harness
        .engine
        .clone()
        .start_bot_match(carol.clone(), duel_types::BotDifficulty::Hard)
        .await
        .unwrap();

    match next_message(&mut carol_rx).await {
        ServerMessage::GameStart { opponent, .. } => {
            assert!(opponent.is_bot);
            assert_eq!(opponent.elo, 1400);
        }
        other => panic!("expected game start, got {:?}", other),
    }

    harness.engine.submit(
        &match_id,
        MatchCommand::Guess {
            player_id: carol.id,
            word: "crane".to_string(),
        },
    );

    next_message(&mut carol_rx).await; // own result
    match next_message(&mut carol_rx).await {
        ServerMessage::GameEnd {
            result,
            elo_change,
            new_elo,
            ..
        } => {
            assert_eq!(result, MatchOutcome::Win);
            // K is halved against bots: 16 * (1 - E(1350 vs 1400)) = +9.
            assert_eq!(elo_change, 9);
            assert_eq!(new_elo, 1359);
        }
        other => panic!("expected game end, got {:?}", other),
    }

    let stored = harness.users.find_by_id(carol.id).await.unwrap().unwrap();
    assert_eq!((stored.elo, stored.wins, stored.games_played), (1359, 1, 1));

    let row = harness.matches.find_by_id(match_id).await.unwrap().unwrap();
    assert!(row.is_bot_match);
    assert_eq!(row.bot_difficulty.as_deref(), Some("hard"));
    assert_eq!(row.winner_id, Some(carol.id));
    assert_eq!(row.loser_id, None); // synthetic loser has no account
    assert_eq!(row.loser_elo_before, 1400);
    assert_eq!(row.loser_elo_after, 1400);
}

#[tokio::test]
async fn bot_plays_through_its_pacing_timer() {
    let harness = harness_with_bot_pacing(Duration::from_millis(20)).await;
    let (dave, mut dave_rx) = connect(&harness, "dave", 1000);

    harness
        .engine
        .clone()
        .start_bot_match(dave.clone(), duel_types::BotDifficulty::Impossible)
        .await
        .unwrap();
    next_message(&mut dave_rx).await; // game start

    // One answer in the list: the bot opens, then solves by its second
    // guess at the latest. The human only ever sees masked guesses.
    loop {
        match next_message(&mut dave_rx).await {
            ServerMessage::OpponentGuess { colors, .. } => assert_eq!(colors.len(), 5),
            ServerMessage::GameEnd { result, reason, .. } => {
                assert_eq!(result, MatchOutcome::Loss);
                assert_eq!(reason, EndReason::Solved);
                break;
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}

#[tokio::test]
async fn forfeit_command_awards_the_opponent() {
    let harness = harness().await;
    let (alice, mut alice_rx) = connect(&harness, "alice", 1300);
    let (bob, mut bob_rx) = connect(&harness, "bob", 1300);

    let match_id = harness
        .engine
        .clone()
        .start_human_match(alice.clone(), bob.clone())
        .await
        .unwrap();
    next_message(&mut alice_rx).await;
    next_message(&mut bob_rx).await;

    harness
        .engine
        .submit(&match_id, MatchCommand::Forfeit { player_id: alice.id });

    match next_message(&mut alice_rx).await {
        ServerMessage::GameEnd { result, reason, .. } => {
            assert_eq!(result, MatchOutcome::Loss);
            assert_eq!(reason, EndReason::Forfeit);
        }
        other => panic!("expected game end, got {:?}", other),
    }
    match next_message(&mut bob_rx).await {
        ServerMessage::GameEnd { result, reason, .. } => {
            assert_eq!(result, MatchOutcome::Win);
            assert_eq!(reason, EndReason::Forfeit);
        }
        other => panic!("expected game end, got {:?}", other),
    }

    let row = harness.matches.find_by_id(match_id).await.unwrap().unwrap();
    assert_eq!(row.winner_id, Some(bob.id));
}
