use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use crate::PersistenceError;
use crate::entities::{matches, prelude::*, users};
use duel_types::{BotDifficulty, MatchOutcome};

/// One side of a finished match, as handed over by the match engine. The
/// synthetic side carries no user id; its pre/post pair still lands in the
/// history row.
#[derive(Debug, Clone)]
pub struct ParticipantOutcome {
    pub user_id: Option<Uuid>,
    pub username: String,
    pub outcome: MatchOutcome,
    pub elo_before: i32,
    pub elo_after: i32,
}

/// Everything the rating commit writes in one transaction.
#[derive(Debug, Clone)]
pub struct CompletedMatch {
    pub match_id: Uuid,
    pub winner_slot: ParticipantOutcome,
    pub loser_slot: ParticipantOutcome,
    pub target_word: String,
    pub replay_log: serde_json::Value,
    pub duration_ms: i64,
    pub is_bot_match: bool,
    pub bot_difficulty: Option<BotDifficulty>,
}

pub struct MatchRepository {
    db: DatabaseConnection,
}

impl MatchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Commit a match result: both user rows (rating, win/loss counter,
    /// games played) and the history row land atomically or not at all.
    pub async fn record_result(&self, completed: CompletedMatch) -> Result<(), PersistenceError> {
        let txn = self.db.begin().await?;

        for slot in [&completed.winner_slot, &completed.loser_slot] {
            if let Some(user_id) = slot.user_id {
                apply_participant(&txn, user_id, slot).await?;
            }
        }

        // Ids mark actual winner and loser; in a draw both stay null and the
        // participants remain recoverable from the replay log.
        let winner_id = completed
            .winner_slot
            .user_id
            .filter(|_| completed.winner_slot.outcome == MatchOutcome::Win);
        let loser_id = completed
            .loser_slot
            .user_id
            .filter(|_| completed.loser_slot.outcome == MatchOutcome::Loss);

        let row = matches::ActiveModel {
            id: ActiveValue::Set(completed.match_id),
            winner_id: ActiveValue::Set(winner_id),
            loser_id: ActiveValue::Set(loser_id),
            winner_elo_before: ActiveValue::Set(completed.winner_slot.elo_before),
            winner_elo_after: ActiveValue::Set(completed.winner_slot.elo_after),
            loser_elo_before: ActiveValue::Set(completed.loser_slot.elo_before),
            loser_elo_after: ActiveValue::Set(completed.loser_slot.elo_after),
            target_word: ActiveValue::Set(completed.target_word),
            replay_log: ActiveValue::Set(completed.replay_log),
            duration_ms: ActiveValue::Set(completed.duration_ms),
            is_bot_match: ActiveValue::Set(completed.is_bot_match),
            bot_difficulty: ActiveValue::Set(
                completed.bot_difficulty.map(|d| d.as_str().to_string()),
            ),
            played_at: ActiveValue::Set(chrono::Utc::now().into()),
        };
        Matches::insert(row).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<matches::Model>, PersistenceError> {
        Ok(Matches::find_by_id(id).one(&self.db).await?)
    }

    pub async fn history_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<matches::Model>, PersistenceError> {
        use sea_orm::QuerySelect;
        Ok(Matches::find()
            .filter(
                matches::Column::WinnerId
                    .eq(user_id)
                    .or(matches::Column::LoserId.eq(user_id)),
            )
            .order_by_desc(matches::Column::PlayedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

async fn apply_participant(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    slot: &ParticipantOutcome,
) -> Result<(), PersistenceError> {
    let won = (slot.outcome == MatchOutcome::Win) as i32;
    let lost = (slot.outcome == MatchOutcome::Loss) as i32;
    let now = chrono::Utc::now().into();

    match Users::find_by_id(user_id).one(txn).await? {
        Some(user) => {
            let update = users::ActiveModel {
                id: ActiveValue::Unchanged(user.id),
                username: ActiveValue::Unchanged(user.username),
                elo: ActiveValue::Set(slot.elo_after),
                wins: ActiveValue::Set(user.wins + won),
                losses: ActiveValue::Set(user.losses + lost),
                games_played: ActiveValue::Set(user.games_played + 1),
                created_at: ActiveValue::Unchanged(user.created_at),
                updated_at: ActiveValue::Set(now),
            };
            Users::update(update).exec(txn).await?;
        }
        None => {
            // First result for an account the auth surface has not synced
            // yet; seed the row from the match itself.
            let insert = users::ActiveModel {
                id: ActiveValue::Set(user_id),
                username: ActiveValue::Set(slot.username.clone()),
                elo: ActiveValue::Set(slot.elo_after),
                wins: ActiveValue::Set(won),
                losses: ActiveValue::Set(lost),
                games_played: ActiveValue::Set(1),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };
            Users::insert(insert).exec(txn).await?;
        }
    }

    Ok(())
}
