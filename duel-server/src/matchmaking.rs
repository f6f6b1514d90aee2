use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use duel_core::bot::difficulty_for_rating;
use duel_types::{BotDifficulty, PlayerId, PlayerProfile};

use crate::session::{ConnectionId, SessionRegistry};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub initial_band: i32,
    pub max_band: i32,
    pub wait_budget: Duration,
    pub retry_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_band: 100,
            max_band: 400,
            wait_budget: Duration::from_secs(15),
            retry_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueTicket {
    pub player: PlayerProfile,
    pub connection: ConnectionId,
    pub enqueued_at: Instant,
}

/// What the queue resolved a wait into. Consumed by the pairing loop, which
/// asks the match engine to start the corresponding match.
#[derive(Debug)]
pub enum PairingOutcome {
    Paired {
        first: QueueTicket,
        second: QueueTicket,
    },
    BotMatch {
        ticket: QueueTicket,
        difficulty: BotDifficulty,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("player is already queued")]
    AlreadyQueued,
}

struct Entry {
    ticket: QueueTicket,
    retry: Option<JoinHandle<()>>,
}

/// Rating-indexed matchmaking queue. Pairing starts at a tight rating band
/// and widens linearly with queue time; a player who outlives the wait
/// budget gets a synthetic opponent tiered to their rating.
pub struct MatchmakingQueue {
    config: QueueConfig,
    registry: Arc<SessionRegistry>,
    entries: Mutex<HashMap<PlayerId, Entry>>,
    outcomes: mpsc::UnboundedSender<PairingOutcome>,
}

impl MatchmakingQueue {
    pub fn new(
        registry: Arc<SessionRegistry>,
        config: QueueConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PairingOutcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            config,
            registry,
            entries: Mutex::new(HashMap::new()),
            outcomes,
        });
        (queue, receiver)
    }

    pub async fn enqueue(
        self: Arc<Self>,
        player: PlayerProfile,
        connection: ConnectionId,
    ) -> Result<(), QueueError> {
        let player_id = player.id;
        let ticket = QueueTicket {
            player,
            connection,
            enqueued_at: Instant::now(),
        };

        let mut entries = self.entries.lock().await;
        if entries.contains_key(&player_id) {
            return Err(QueueError::AlreadyQueued);
        }

        // Immediate attempt inside the starting band.
        if let Some(opponent_id) =
            self.find_candidate(&mut entries, &player_id, ticket.player.elo, self.config.initial_band)
        {
            let mut opponent = entries
                .remove(&opponent_id)
                .expect("candidate was just found in the map");
            if let Some(handle) = opponent.retry.take() {
                handle.abort();
            }
            info!(
                "paired {} with {} on enqueue",
                ticket.player.username, opponent.ticket.player.username
            );
            let _ = self.outcomes.send(PairingOutcome::Paired {
                first: ticket,
                second: opponent.ticket,
            });
            return Ok(());
        }

        let retry = tokio::spawn(Self::retry_loop(self.clone(), ticket.clone()));
        entries.insert(
            player_id,
            Entry {
                ticket,
                retry: Some(retry),
            },
        );
        info!("player {} queued ({} waiting)", player_id, entries.len());
        Ok(())
    }

    /// Remove a player and stop their retry schedule. Idempotent.
    pub async fn cancel(&self, player_id: &PlayerId) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(player_id) {
            Some(mut entry) => {
                if let Some(handle) = entry.retry.take() {
                    handle.abort();
                }
                info!("player {} left the queue", player_id);
                true
            }
            None => false,
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Tolerance band after `elapsed` in the queue: linear from the initial
    /// band to the maximum over the wait budget.
    fn band_after(&self, elapsed: Duration) -> i32 {
        let budget = self.config.wait_budget.as_millis().max(1) as f64;
        let progress = (elapsed.as_millis() as f64 / budget).min(1.0);
        let spread = (self.config.max_band - self.config.initial_band) as f64;
        self.config.initial_band + (spread * progress).round() as i32
    }

    async fn retry_loop(queue: Arc<Self>, ticket: QueueTicket) {
        let player_id = ticket.player.id;
        loop {
            tokio::time::sleep(queue.config.retry_interval).await;
            let elapsed = ticket.enqueued_at.elapsed();

            let mut entries = queue.entries.lock().await;
            // Cancelled or already paired while we slept.
            if !entries.contains_key(&player_id) {
                return;
            }
            // Our own connection may have vanished without a cancel.
            if !queue.registry.is_online(&player_id) {
                warn!("reaping abandoned queue entry for {}", player_id);
                entries.remove(&player_id);
                return;
            }

            let band = queue.band_after(elapsed);
            if let Some(opponent_id) =
                queue.find_candidate(&mut entries, &player_id, ticket.player.elo, band)
            {
                let own = entries
                    .remove(&player_id)
                    .expect("own entry checked above");
                drop(own); // this task is the entry's retry handle
                let mut opponent = entries
                    .remove(&opponent_id)
                    .expect("candidate was just found in the map");
                if let Some(handle) = opponent.retry.take() {
                    handle.abort();
                }
                info!(
                    "paired {} with {} after {:?} (band {})",
                    player_id, opponent_id, elapsed, band
                );
                let _ = queue.outcomes.send(PairingOutcome::Paired {
                    first: ticket,
                    second: opponent.ticket,
                });
                return;
            }

            if elapsed >= queue.config.wait_budget {
                entries.remove(&player_id);
                let difficulty = difficulty_for_rating(ticket.player.elo);
                info!(
                    "no opponent for {} within budget; spawning {:?} bot",
                    player_id, difficulty
                );
                let _ = queue.outcomes.send(PairingOutcome::BotMatch { ticket, difficulty });
                return;
            }
        }
    }

    /// Closest-rated live entry within the band. Entries whose connection
    /// has vanished are reaped on the way through and never returned.
    fn find_candidate(
        &self,
        entries: &mut HashMap<PlayerId, Entry>,
        player_id: &PlayerId,
        rating: i32,
        band: i32,
    ) -> Option<PlayerId> {
        let mut stale = Vec::new();
        let mut best: Option<(PlayerId, i32)> = None;

        for (other_id, entry) in entries.iter() {
            if other_id == player_id {
                continue;
            }
            if !self.registry.is_online(other_id) {
                stale.push(*other_id);
                continue;
            }
            let diff = (entry.ticket.player.elo - rating).abs();
            if diff <= band && best.map(|(_, d)| diff < d).unwrap_or(true) {
                best = Some((*other_id, diff));
            }
        }

        for id in stale {
            if let Some(mut entry) = entries.remove(&id) {
                if let Some(handle) = entry.retry.take() {
                    handle.abort();
                }
                warn!("reaped stale queue entry for {}", id);
            }
        }

        best.map(|(id, _)| id)
    }
}
