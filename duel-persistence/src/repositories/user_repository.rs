use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entities::{prelude::*, users};
use duel_types::User;

pub struct UserRepository {
    db: DatabaseConnection,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeaderboardEntry {
    pub user: User,
    pub rank: u32,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_user(model: users::Model) -> User {
        User {
            id: model.id,
            username: model.username,
            elo: model.elo,
            wins: model.wins,
            losses: model.losses,
            games_played: model.games_played,
            created_at: model.created_at.to_rfc3339(),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user_model = Users::find_by_id(id).one(&self.db).await?;
        Ok(user_model.map(Self::model_to_user))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user_model = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        Ok(user_model.map(Self::model_to_user))
    }

    /// Look up an account, creating it with the default rating if this is
    /// the first time the id shows up.
    pub async fn get_or_create(&self, id: Uuid, username: &str, elo: i32) -> Result<User> {
        if let Some(existing) = self.find_by_id(id).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now().into();
        let user_model = users::ActiveModel {
            id: sea_orm::ActiveValue::Set(id),
            username: sea_orm::ActiveValue::Set(username.to_string()),
            elo: sea_orm::ActiveValue::Set(elo),
            wins: sea_orm::ActiveValue::Set(0),
            losses: sea_orm::ActiveValue::Set(0),
            games_played: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
        };

        let saved = Users::insert(user_model).exec(&self.db).await?;
        let created = Users::find_by_id(saved.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to retrieve created user"))?;

        Ok(Self::model_to_user(created))
    }

    pub async fn get_leaderboard(&self, limit: u64) -> Result<Vec<LeaderboardEntry>> {
        let users = Users::find()
            .order_by_desc(users::Column::Elo)
            .limit(limit)
            .all(&self.db)
            .await?;

        let leaderboard = users
            .into_iter()
            .enumerate()
            .map(|(index, model)| LeaderboardEntry {
                user: Self::model_to_user(model),
                rank: (index + 1) as u32,
            })
            .collect();

        Ok(leaderboard)
    }

    pub async fn get_user_rank(&self, user_id: Uuid) -> Result<Option<u32>> {
        let user = Users::find_by_id(user_id).one(&self.db).await?;

        if let Some(user_model) = user {
            let users_above = Users::find()
                .filter(users::Column::Elo.gt(user_model.elo))
                .count(&self.db)
                .await?;

            Ok(Some(users_above as u32 + 1))
        } else {
            Ok(None)
        }
    }
}
