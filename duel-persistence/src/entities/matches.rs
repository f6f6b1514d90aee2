use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "matches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub winner_id: Option<Uuid>,
    pub loser_id: Option<Uuid>,
    pub winner_elo_before: i32,
    pub winner_elo_after: i32,
    pub loser_elo_before: i32,
    pub loser_elo_after: i32,
    pub target_word: String,
    pub replay_log: Json,
    pub duration_ms: i64,
    pub is_bot_match: bool,
    pub bot_difficulty: Option<String>,
    pub played_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
