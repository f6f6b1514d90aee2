use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use duel_core::match_state::now_ms;
use duel_types::{MatchId, MatchState, PlayerId};

/// Result of the first-writer-wins arbitration for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerClaim {
    pub player_id: PlayerId,
    pub claimed_at: i64,
}

/// Keyed storage for live match state. This is the single coordination
/// point between concurrent engine instances: every mutation goes through a
/// read-modify-write here, and simultaneous correct guesses are resolved by
/// `try_claim_winner`.
#[async_trait]
pub trait GameStateStore: Send + Sync {
    async fn put_match(&self, state: &MatchState) -> Result<()>;
    async fn get_match(&self, id: &MatchId) -> Result<Option<MatchState>>;
    async fn delete_match(&self, id: &MatchId) -> Result<()>;

    /// Atomic first-writer-wins: returns true exactly once per match across
    /// all concurrent callers.
    async fn try_claim_winner(&self, id: &MatchId, player_id: &PlayerId) -> Result<bool>;
    async fn read_winner(&self, id: &MatchId) -> Result<Option<WinnerClaim>>;

    /// Drop entries past their time-to-live. Returns how many were removed.
    async fn sweep(&self) -> Result<usize>;
}

/// Pick a backend from the configured URL. `memory:` keeps everything in
/// process; a networked store can slot in behind the same scheme switch.
pub fn open_state_store(url: &str, ttl: Duration) -> Result<std::sync::Arc<dyn GameStateStore>> {
    if url == "memory:" || url.starts_with("memory://") {
        return Ok(std::sync::Arc::new(MemoryStateStore::new(ttl)));
    }
    bail!("unsupported STATE_STORE_URL scheme: {}", url)
}

/// In-process store with per-entry expiry. Winner claims live in their own
/// keyspace with a shorter TTL, mirroring how a networked deployment would
/// use a SET NX with expiry.
pub struct MemoryStateStore {
    ttl: Duration,
    claim_ttl: Duration,
    matches: Mutex<HashMap<MatchId, (MatchState, Instant)>>,
    claims: Mutex<HashMap<MatchId, (WinnerClaim, Instant)>>,
}

impl MemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            claim_ttl: Duration::from_secs(60),
            matches: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl GameStateStore for MemoryStateStore {
    async fn put_match(&self, state: &MatchState) -> Result<()> {
        let mut matches = self.matches.lock().await;
        let deadline = match matches.get(&state.id) {
            // Writes refresh the value but never extend the original TTL.
            Some((_, existing)) => *existing,
            None => Instant::now() + self.ttl,
        };
        matches.insert(state.id, (state.clone(), deadline));
        Ok(())
    }

    async fn get_match(&self, id: &MatchId) -> Result<Option<MatchState>> {
        let mut matches = self.matches.lock().await;
        match matches.get(id) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                matches.remove(id);
                Ok(None)
            }
            Some((state, _)) => Ok(Some(state.clone())),
            None => Ok(None),
        }
    }

    async fn delete_match(&self, id: &MatchId) -> Result<()> {
        self.matches.lock().await.remove(id);
        self.claims.lock().await.remove(id);
        Ok(())
    }

    async fn try_claim_winner(&self, id: &MatchId, player_id: &PlayerId) -> Result<bool> {
        let mut claims = self.claims.lock().await;
        if let Some((_, deadline)) = claims.get(id) {
            if *deadline > Instant::now() {
                return Ok(false);
            }
        }
        claims.insert(
            *id,
            (
                WinnerClaim {
                    player_id: *player_id,
                    claimed_at: now_ms(),
                },
                Instant::now() + self.claim_ttl,
            ),
        );
        Ok(true)
    }

    async fn read_winner(&self, id: &MatchId) -> Result<Option<WinnerClaim>> {
        let claims = self.claims.lock().await;
        Ok(claims
            .get(id)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(claim, _)| *claim))
    }

    async fn sweep(&self) -> Result<usize> {
        let now = Instant::now();
        let mut removed = 0;

        let mut matches = self.matches.lock().await;
        let before = matches.len();
        matches.retain(|_, (_, deadline)| *deadline > now);
        removed += before - matches.len();
        drop(matches);

        let mut claims = self.claims.lock().await;
        let before = claims.len();
        claims.retain(|_, (_, deadline)| *deadline > now);
        removed += before - claims.len();

        Ok(removed)
    }
}
