use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Canonical account record as the rest of the system sees it. Storage
/// adapters map to and from their own column naming at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub elo: i32,
    pub wins: i32,
    pub losses: i32,
    pub games_played: i32,
    pub created_at: String, // ISO 8601 string
}

/// Identity a connection plays under, captured at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerProfile {
    pub id: Uuid,
    pub username: String,
    pub elo: i32,
}

/// What each side learns about the other at match start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpponentInfo {
    pub username: String,
    pub elo: i32,
    pub is_bot: bool,
}
