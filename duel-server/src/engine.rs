use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use duel_core::bot::{SyntheticState, bot_display_name, choose_guess, sample_delay};
use duel_core::dictionary::Dictionary;
use duel_core::match_state::{
    NewPlayer, apply_forfeit, apply_guess, create_match, finish_timeout, now_ms, record_winner,
    finish_draw, validate_guess,
};
use duel_core::rating::{BASE_K, BOT_MATCH_K, RatingDelta, rate_match};
use duel_persistence::repositories::{CompletedMatch, MatchRepository, ParticipantOutcome};
use duel_types::{
    BotDifficulty, CellColor, EndReason, GatewayError, MatchId, MatchOutcome, MatchState,
    OpponentEndSummary, OpponentInfo, PlayerId, PlayerProfile, PlayerSlot, ServerMessage,
};

use crate::session::SessionRegistry;
use crate::state_store::GameStateStore;

/// Inbox message for one match actor. Everything that can happen to a match
/// funnels through here, so state transitions are processed strictly one at
/// a time.
#[derive(Debug)]
pub enum MatchCommand {
    Guess { player_id: PlayerId, word: String },
    BotTick,
    Forfeit { player_id: PlayerId },
    Disconnect { player_id: PlayerId },
    Rejoin { player_id: PlayerId },
    Expire,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub disconnect_grace: Duration,
    pub match_ttl: Duration,
    /// Fixed bot delay instead of the per-difficulty pacing window. The
    /// production windows run tens of seconds; tests cannot wait that long.
    pub bot_pacing_override: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disconnect_grace: Duration::from_secs(10),
            match_ttl: Duration::from_secs(3600),
            bot_pacing_override: None,
        }
    }
}

/// Owns every live match. Each match runs as an actor task consuming
/// `MatchCommand`s; the engine only routes and keeps the directory.
pub struct MatchEngine {
    store: Arc<dyn GameStateStore>,
    registry: Arc<SessionRegistry>,
    dictionary: Arc<Dictionary>,
    matches_repo: Arc<MatchRepository>,
    config: EngineConfig,
    actors: DashMap<MatchId, mpsc::UnboundedSender<MatchCommand>>,
    player_matches: DashMap<PlayerId, MatchId>,
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn GameStateStore>,
        registry: Arc<SessionRegistry>,
        dictionary: Arc<Dictionary>,
        matches_repo: Arc<MatchRepository>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            registry,
            dictionary,
            matches_repo,
            config,
            actors: DashMap::new(),
            player_matches: DashMap::new(),
        })
    }

    pub async fn start_human_match(
        self: Arc<Self>,
        first: PlayerProfile,
        second: PlayerProfile,
    ) -> Result<MatchId> {
        let target = self.dictionary.random_answer();
        let state = create_match(
            Uuid::new_v4(),
            target,
            [
                NewPlayer::human(first.id, first.username, first.elo),
                NewPlayer::human(second.id, second.username, second.elo),
            ],
            now_ms(),
        );
        self.spawn_match(state, None).await
    }

    pub async fn start_bot_match(
        self: Arc<Self>,
        human: PlayerProfile,
        difficulty: BotDifficulty,
    ) -> Result<MatchId> {
        let target = self.dictionary.random_answer();
        let bot_id = Uuid::new_v4();
        let synthetic = SyntheticState::new(difficulty, target.clone(), &self.dictionary);
        let state = create_match(
            Uuid::new_v4(),
            target,
            [
                NewPlayer::human(human.id, human.username, human.elo),
                NewPlayer::synthetic(bot_id, bot_display_name(difficulty), difficulty),
            ],
            now_ms(),
        );
        self.spawn_match(state, Some((bot_id, synthetic))).await
    }

    /// Route a command to the match's actor. False means no such live match.
    pub fn submit(&self, match_id: &MatchId, command: MatchCommand) -> bool {
        match self.actors.get(match_id) {
            Some(sender) => sender.send(command).is_ok(),
            None => false,
        }
    }

    pub fn match_of(&self, player_id: &PlayerId) -> Option<MatchId> {
        self.player_matches.get(player_id).map(|entry| *entry)
    }

    pub fn live_match_count(&self) -> usize {
        self.actors.len()
    }

    async fn spawn_match(
        self: Arc<Self>,
        state: MatchState,
        bot: Option<(PlayerId, SyntheticState)>,
    ) -> Result<MatchId> {
        let match_id = state.id;
        self.save(&state).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.actors.insert(match_id, tx.clone());
        for slot in state.players.values().filter(|s| !s.is_synthetic) {
            self.player_matches.insert(slot.id, match_id);
        }

        // Both sides learn about the match before the actor starts ticking.
        for slot in state.players.values().filter(|s| !s.is_synthetic) {
            let opponent = state
                .opponent_of(&slot.id)
                .expect("matches always hold two players");
            self.registry.send_to_player(
                &slot.id,
                ServerMessage::GameStart {
                    game_id: match_id,
                    opponent: OpponentInfo {
                        username: opponent.display_name.clone(),
                        elo: opponent.rating_at_start,
                        is_bot: opponent.is_synthetic,
                    },
                },
            );
        }

        info!(
            "match {} started (bot: {})",
            match_id,
            bot.as_ref().map(|(_, s)| s.difficulty.as_str()).unwrap_or("none")
        );

        let actor = MatchActor {
            engine: self.clone(),
            match_id,
            tx,
            rx,
            bot_player: bot.as_ref().map(|(id, _)| *id),
            bot_state: bot.map(|(_, synthetic)| synthetic),
            bot_timer: None,
            grace_timers: HashMap::new(),
            ttl_timer: None,
        };
        tokio::spawn(actor.run());

        Ok(match_id)
    }

    async fn load(&self, match_id: &MatchId) -> Option<MatchState> {
        for attempt in 0..2 {
            match self.store.get_match(match_id).await {
                Ok(found) => return found,
                Err(e) if attempt == 0 => warn!("state store read failed, retrying: {}", e),
                Err(e) => error!("state store read failed twice: {}", e),
            }
        }
        None
    }

    async fn save(&self, state: &MatchState) -> Result<()> {
        match self.store.put_match(state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("state store write failed, retrying: {}", e);
                self.store.put_match(state).await
            }
        }
    }

    async fn claim_winner(&self, match_id: &MatchId, player_id: &PlayerId) -> bool {
        match self.store.try_claim_winner(match_id, player_id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!("winner claim failed, retrying: {}", e);
                self.store
                    .try_claim_winner(match_id, player_id)
                    .await
                    .unwrap_or(false)
            }
        }
    }
}

struct MatchActor {
    engine: Arc<MatchEngine>,
    match_id: MatchId,
    tx: mpsc::UnboundedSender<MatchCommand>,
    rx: mpsc::UnboundedReceiver<MatchCommand>,
    bot_player: Option<PlayerId>,
    bot_state: Option<SyntheticState>,
    bot_timer: Option<JoinHandle<()>>,
    grace_timers: HashMap<PlayerId, JoinHandle<()>>,
    ttl_timer: Option<JoinHandle<()>>,
}

impl MatchActor {
    async fn run(mut self) {
        self.arm_ttl_timer();
        if self.bot_player.is_some() {
            self.schedule_bot_tick();
        }

        while let Some(command) = self.rx.recv().await {
            let finished = match command {
                MatchCommand::Guess { player_id, word } => {
                    self.handle_guess(player_id, word).await
                }
                MatchCommand::BotTick => self.handle_bot_tick().await,
                MatchCommand::Forfeit { player_id } => self.handle_forfeit(player_id).await,
                MatchCommand::Disconnect { player_id } => {
                    self.handle_disconnect(player_id);
                    false
                }
                MatchCommand::Rejoin { player_id } => {
                    self.handle_rejoin(player_id).await;
                    false
                }
                MatchCommand::Expire => self.handle_expire().await,
            };
            if finished {
                break;
            }
        }

        self.shutdown();
    }

    /// The full guess pipeline: validate, evaluate, arbitrate the win,
    /// persist, fan out. Serial per match by construction.
    async fn handle_guess(&mut self, player_id: PlayerId, word: String) -> bool {
        let is_human = Some(player_id) != self.bot_player;

        let Some(mut state) = self.engine.load(&self.match_id).await else {
            if is_human {
                self.engine
                    .registry
                    .send_to_player(&player_id, ServerMessage::GameNotFound);
            }
            return false;
        };

        let normalized =
            match validate_guess(&state, &player_id, &word, &self.engine.dictionary) {
                Ok(normalized) => normalized,
                Err(rejection) => {
                    if is_human {
                        self.engine.registry.send_to_player(
                            &player_id,
                            ServerMessage::GuessInvalid { error: rejection },
                        );
                    } else {
                        error!("bot produced a rejected guess: {:?}", rejection);
                    }
                    return false;
                }
            };

        let now = now_ms();
        let applied = apply_guess(&mut state, &player_id, normalized, now);

        let mut reason = None;
        if applied.solved {
            // First writer wins; a lost race means another process already
            // recorded a winner and we adopt it.
            let winner = if self.engine.claim_winner(&self.match_id, &player_id).await {
                player_id
            } else {
                match self.engine.store.read_winner(&self.match_id).await {
                    Ok(Some(claim)) => claim.player_id,
                    _ => player_id,
                }
            };
            record_winner(&mut state, winner, now);
            reason = Some(EndReason::Solved);
        } else if applied.quota_exhausted {
            finish_draw(&mut state, now);
            reason = Some(EndReason::OutOfGuesses);
        }

        if let Err(e) = self.engine.save(&state).await {
            error!("persisting guess for match {} failed: {}", self.match_id, e);
            if is_human {
                self.engine.registry.send_to_player(
                    &player_id,
                    ServerMessage::Error {
                        message: GatewayError::Internal.to_string(),
                    },
                );
            }
            return false;
        }

        // Track the bot's own guesses in its knowledge state.
        if !is_human {
            let pattern: String = applied
                .record
                .evaluation
                .iter()
                .map(CellColor::pattern_char)
                .collect();
            self.bot_state = self
                .bot_state
                .as_ref()
                .map(|bot| bot.observe(&applied.record.word, &pattern));
        }

        // Full result to the guesser, colors only to the opponent. Both go
        // out before this command finishes processing.
        if is_human {
            let remaining = state
                .slot(&player_id)
                .map(PlayerSlot::guesses_remaining)
                .unwrap_or(0);
            self.engine.registry.send_to_player(
                &player_id,
                ServerMessage::GuessResult {
                    word: applied.record.word.clone(),
                    colors: applied.record.evaluation.clone(),
                    guess_number: applied.record.ordinal,
                    is_correct: applied.solved,
                    remaining_guesses: remaining,
                },
            );
        }
        if let Some(opponent) = state.opponent_of(&player_id) {
            if !opponent.is_synthetic {
                self.engine.registry.send_to_player(
                    &opponent.id,
                    ServerMessage::OpponentGuess {
                        colors: applied.record.evaluation.clone(),
                        guess_number: applied.record.ordinal,
                    },
                );
            }
        }

        if let Some(reason) = reason {
            self.finalize(state, reason).await;
            return true;
        }

        if is_human && self.bot_player.is_some() {
            self.schedule_bot_tick();
        } else if !is_human && self.bot_guesses_left(&state) {
            self.schedule_bot_tick();
        }
        false
    }

    async fn handle_bot_tick(&mut self) -> bool {
        let Some(bot_id) = self.bot_player else {
            return false;
        };
        let Some(state) = self.engine.load(&self.match_id).await else {
            return false;
        };
        if !state.is_active() || !self.bot_guesses_left(&state) {
            return false;
        }

        let Some(bot) = self.bot_state.as_ref() else {
            return false;
        };
        let guess = {
            let mut rng = rand::thread_rng();
            choose_guess(bot, &self.engine.dictionary, &mut rng)
        };
        self.handle_guess(bot_id, guess).await
    }

    async fn handle_forfeit(&mut self, player_id: PlayerId) -> bool {
        let Some(mut state) = self.engine.load(&self.match_id).await else {
            self.engine
                .registry
                .send_to_player(&player_id, ServerMessage::GameNotFound);
            return false;
        };
        if !state.players.contains_key(&player_id) {
            self.engine
                .registry
                .send_to_player(&player_id, ServerMessage::GameNotFound);
            return false;
        }

        match apply_forfeit(&mut state, &player_id, now_ms()) {
            Some(winner) => {
                if let Err(e) = self.engine.save(&state).await {
                    error!("persisting forfeit for {} failed: {}", self.match_id, e);
                    return false;
                }
                info!(
                    "player {} forfeited match {}; {} wins",
                    player_id, self.match_id, winner
                );
                self.finalize(state, EndReason::Forfeit).await;
                true
            }
            None => false, // already finished; nothing to do
        }
    }

    /// Disconnects only matter against a human opponent: a grace timer is
    /// armed and a forfeit fires if the player does not rejoin in time.
    /// Bot matches keep running so the human can come back.
    fn handle_disconnect(&mut self, player_id: PlayerId) {
        if self.bot_player.is_some() {
            return;
        }
        if let Some(previous) = self.grace_timers.remove(&player_id) {
            previous.abort();
        }

        let grace = self.engine.config.disconnect_grace;
        let tx = self.tx.clone();
        info!(
            "player {} disconnected from match {}; grace window {:?}",
            player_id, self.match_id, grace
        );
        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(MatchCommand::Forfeit { player_id });
        });
        self.grace_timers.insert(player_id, timer);
    }

    async fn handle_rejoin(&mut self, player_id: PlayerId) {
        if let Some(timer) = self.grace_timers.remove(&player_id) {
            timer.abort();
        }

        let Some(state) = self.engine.load(&self.match_id).await else {
            self.engine
                .registry
                .send_to_player(&player_id, ServerMessage::GameNotFound);
            return;
        };
        let Some(slot) = state.slot(&player_id) else {
            self.engine
                .registry
                .send_to_player(&player_id, ServerMessage::GameNotFound);
            return;
        };
        if !state.is_active() {
            self.engine
                .registry
                .send_to_player(&player_id, ServerMessage::GameNotFound);
            return;
        }

        let opponent = state
            .opponent_of(&player_id)
            .expect("matches always hold two players");
        self.engine.registry.send_to_player(
            &player_id,
            ServerMessage::Rejoined {
                game_id: self.match_id,
                guesses: slot.guesses.clone(),
                opponent_progress: state.masked_opponent_history(&player_id),
                opponent: OpponentInfo {
                    username: opponent.display_name.clone(),
                    elo: opponent.rating_at_start,
                    is_bot: opponent.is_synthetic,
                },
            },
        );
        info!("player {} rejoined match {}", player_id, self.match_id);

        // A returning player revives a bot that still has guesses pending.
        if self.bot_player.is_some() && self.bot_guesses_left(&state) {
            self.schedule_bot_tick();
        }
    }

    /// The state TTL doubles as the maximum match duration. No ratings move
    /// for a match nobody finished.
    async fn handle_expire(&mut self) -> bool {
        if let Some(mut state) = self.engine.load(&self.match_id).await {
            if state.is_active() {
                warn!("match {} expired while active", self.match_id);
                finish_timeout(&mut state, now_ms());
                self.emit_game_end(
                    &state,
                    EndReason::Timeout,
                    &unchanged_deltas(&state),
                );
            }
        }
        let _ = self.engine.store.delete_match(&self.match_id).await;
        true
    }

    /// Terminal bookkeeping: cancel timers, commit ratings and history
    /// atomically, then tell both humans how it ended.
    async fn finalize(&mut self, state: MatchState, reason: EndReason) {
        self.cancel_timers();

        let is_bot_match = state.players.values().any(|slot| slot.is_synthetic);
        let draw = state.winner_id.is_none();
        let (winner_slot, loser_slot) = order_slots(&state);

        let k = if is_bot_match { BOT_MATCH_K } else { BASE_K };
        let (mut winner_delta, mut loser_delta) =
            rate_match(winner_slot.rating_at_start, loser_slot.rating_at_start, draw, k);
        // Synthetic ratings are fixed per tier; only the human side moves.
        if winner_slot.is_synthetic {
            winner_delta = RatingDelta::unchanged(winner_slot.rating_at_start);
        }
        if loser_slot.is_synthetic {
            loser_delta = RatingDelta::unchanged(loser_slot.rating_at_start);
        }

        let completed = CompletedMatch {
            match_id: state.id,
            winner_slot: participant(winner_slot, &state, winner_delta),
            loser_slot: participant(loser_slot, &state, loser_delta),
            target_word: state.target.clone(),
            replay_log: serde_json::to_value(&state.replay_log)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            duration_ms: state.ended_at.unwrap_or_else(now_ms) - state.started_at,
            is_bot_match,
            bot_difficulty: state
                .players
                .values()
                .find_map(|slot| slot.synthetic_difficulty),
        };

        let mut deltas = HashMap::new();
        deltas.insert(winner_slot.id, winner_delta);
        deltas.insert(loser_slot.id, loser_delta);

        if let Err(e) = self.engine.matches_repo.record_result(completed).await {
            // The match still ends for the players; their ratings simply
            // do not move this time.
            error!("rating commit for match {} failed: {}", state.id, e);
            deltas = unchanged_deltas(&state);
        }

        self.emit_game_end(&state, reason, &deltas);
        info!(
            "match {} finished ({:?}, winner: {:?})",
            state.id, reason, state.winner_id
        );
    }

    fn emit_game_end(
        &self,
        state: &MatchState,
        reason: EndReason,
        deltas: &HashMap<PlayerId, RatingDelta>,
    ) {
        for slot in state.players.values().filter(|slot| !slot.is_synthetic) {
            let opponent = state
                .opponent_of(&slot.id)
                .expect("matches always hold two players");
            let outcome = match state.winner_id {
                Some(winner) if winner == slot.id => MatchOutcome::Win,
                Some(_) => MatchOutcome::Loss,
                None => MatchOutcome::Draw,
            };
            let delta = deltas
                .get(&slot.id)
                .copied()
                .unwrap_or_else(|| RatingDelta::unchanged(slot.rating_at_start));

            self.engine.registry.send_to_player(
                &slot.id,
                ServerMessage::GameEnd {
                    game_id: state.id,
                    result: outcome,
                    reason,
                    target_word: state.target.clone(),
                    opponent: OpponentEndSummary {
                        username: opponent.display_name.clone(),
                        guesses: opponent.guesses.clone(),
                    },
                    my_guesses: slot.guesses.clone(),
                    elo_change: delta.change(),
                    new_elo: delta.after,
                },
            );
        }
    }

    fn bot_guesses_left(&self, state: &MatchState) -> bool {
        match self.bot_player {
            Some(bot_id) => state
                .slot(&bot_id)
                .map(|slot| slot.guesses.len() < duel_types::MAX_GUESSES)
                .unwrap_or(false),
            None => false,
        }
    }

    /// One pending tick at a time; delay sampled from the difficulty's
    /// pacing window.
    fn schedule_bot_tick(&mut self) {
        if let Some(timer) = &self.bot_timer {
            if !timer.is_finished() {
                return;
            }
        }
        let Some(bot) = self.bot_state.as_ref() else {
            return;
        };
        let delay = self.engine.config.bot_pacing_override.unwrap_or_else(|| {
            let mut rng = rand::thread_rng();
            sample_delay(bot.difficulty, &mut rng)
        });
        let tx = self.tx.clone();
        self.bot_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(MatchCommand::BotTick);
        }));
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.bot_timer.take() {
            timer.abort();
        }
        for (_, timer) in self.grace_timers.drain() {
            timer.abort();
        }
        if let Some(timer) = self.ttl_timer.take() {
            timer.abort();
        }
    }

    fn arm_ttl_timer(&mut self) {
        let ttl = self.engine.config.match_ttl;
        let tx = self.tx.clone();
        self.ttl_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = tx.send(MatchCommand::Expire);
        }));
    }

    fn shutdown(mut self) {
        self.cancel_timers();
        self.engine.actors.remove(&self.match_id);
        let match_id = self.match_id;
        self.engine
            .player_matches
            .retain(|_, mapped| *mapped != match_id);
    }
}

fn order_slots(state: &MatchState) -> (&PlayerSlot, &PlayerSlot) {
    let mut slots: Vec<&PlayerSlot> = state.players.values().collect();
    // Deterministic order for draws; decisive matches put the winner first.
    slots.sort_by_key(|slot| slot.id);
    match state.winner_id {
        Some(winner) if slots[1].id == winner => (slots[1], slots[0]),
        _ => (slots[0], slots[1]),
    }
}

fn participant(slot: &PlayerSlot, state: &MatchState, delta: RatingDelta) -> ParticipantOutcome {
    let outcome = match state.winner_id {
        Some(winner) if winner == slot.id => MatchOutcome::Win,
        Some(_) => MatchOutcome::Loss,
        None => MatchOutcome::Draw,
    };
    ParticipantOutcome {
        user_id: (!slot.is_synthetic).then_some(slot.id),
        username: slot.display_name.clone(),
        outcome,
        elo_before: delta.before,
        elo_after: delta.after,
    }
}

fn unchanged_deltas(state: &MatchState) -> HashMap<PlayerId, RatingDelta> {
    state
        .players
        .values()
        .map(|slot| (slot.id, RatingDelta::unchanged(slot.rating_at_start)))
        .collect()
}
