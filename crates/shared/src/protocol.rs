use serde::{Deserialize, Serialize};

use crate::domain::{MoveId, Role, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub message: String,
    pub session_id: SessionId,
    pub health: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackResponse {
    pub message: String,
    pub remaining_health: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectItemRequest {
    pub session_id: SessionId,
    pub item: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectItemResponse {
    pub message: String,
    #[serde(default)]
    pub inventory: Vec<String>,
    pub health: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMoveRequest {
    pub session_id: SessionId,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMoveResponse {
    pub message: String,
    pub move_id: MoveId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndGameRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndGameResponse {
    pub message: String,
    pub final_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalTimeResponse {
    pub message: String,
    pub survival_time: f64,
    pub health: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_name: String,
    pub best_score: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
