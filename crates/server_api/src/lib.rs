use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use shared::{
    domain::{SessionId, HEALTH_POTION, MAX_ACTION_CHARS},
    error::ApiError,
    protocol::{
        AttackResponse, CollectItemResponse, EndGameResponse, LeaderboardEntry, LogMoveResponse,
        StartGameResponse, SurvivalTimeResponse,
    },
};
use storage::{Storage, StoredSession};
use tracing::{debug, error, info};

pub mod auth;

pub use auth::{AuthConfig, AuthenticatedPlayer};

pub const MIN_ENEMY_DAMAGE: i64 = 5;
pub const MAX_ENEMY_DAMAGE: i64 = 20;
pub const LEADERBOARD_SIZE: u32 = 10;

/// Source of enemy attack damage.
pub trait DamageRoll: Send + Sync {
    fn roll(&self) -> i64;
}

pub struct RandomDamage;

impl DamageRoll for RandomDamage {
    fn roll(&self) -> i64 {
        rand::thread_rng().gen_range(MIN_ENEMY_DAMAGE..=MAX_ENEMY_DAMAGE)
    }
}

pub struct FixedDamage(pub i64);

impl DamageRoll for FixedDamage {
    fn roll(&self) -> i64 {
        self.0
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub auth: AuthConfig,
    pub damage: Arc<dyn DamageRoll>,
}

pub async fn start_game(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
) -> Result<StartGameResponse, ApiError> {
    let session = ctx
        .storage
        .create_session(player.player_id, &SessionId::generate())
        .await
        .map_err(internal)?;
    info!(
        player_id = player.player_id.0,
        session_id = %session.session_id,
        "game session started"
    );
    Ok(StartGameResponse {
        message: "Game started!".to_string(),
        session_id: session.session_id,
        health: session.health,
    })
}

pub async fn enemy_attack(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
) -> Result<AttackResponse, ApiError> {
    let session = load_live_session(ctx, player, session_id).await?;

    let damage = ctx.damage.roll();
    let remaining_health = ctx
        .storage
        .apply_damage(session.row_id, damage)
        .await
        .map_err(internal)?
        .ok_or_else(game_over)?;
    debug!(%session_id, damage, remaining_health, "enemy attack resolved");

    Ok(AttackResponse {
        message: format!("Enemy attacked! You lost {damage} HP."),
        remaining_health,
    })
}

pub async fn collect_item(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
    item: &str,
) -> Result<CollectItemResponse, ApiError> {
    let item = item.trim();
    if item.is_empty() {
        return Err(ApiError::validation("item is required"));
    }
    let session = load_live_session(ctx, player, session_id).await?;

    let (inventory, health) = ctx
        .storage
        .collect_item(session.row_id, item, item == HEALTH_POTION)
        .await
        .map_err(internal)?
        .ok_or_else(game_over)?;
    debug!(%session_id, item, health, "item collected");

    Ok(CollectItemResponse {
        message: format!("You collected a {item}!"),
        inventory,
        health,
    })
}

pub async fn log_move(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
    action: &str,
) -> Result<LogMoveResponse, ApiError> {
    let action = action.trim();
    if action.is_empty() {
        return Err(ApiError::validation("action is required"));
    }
    if action.chars().count() > MAX_ACTION_CHARS {
        return Err(ApiError::validation(format!(
            "action exceeds {MAX_ACTION_CHARS} characters"
        )));
    }
    let session = load_session(ctx, player, session_id).await?;
    let move_id = ctx
        .storage
        .insert_move(session.row_id, action)
        .await
        .map_err(internal)?;
    Ok(LogMoveResponse {
        message: "Move logged!".to_string(),
        move_id,
    })
}

pub async fn end_game(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
    score: i64,
) -> Result<EndGameResponse, ApiError> {
    let session = load_session(ctx, player, session_id).await?;
    ctx.storage
        .finish_session(session.row_id, score)
        .await
        .map_err(internal)?;
    let best = ctx
        .storage
        .record_score(player.player_id, score)
        .await
        .map_err(internal)?;
    info!(%session_id, score, best, "game session ended");

    Ok(EndGameResponse {
        message: "Game ended!".to_string(),
        final_score: score,
    })
}

pub async fn survival_time(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
) -> Result<SurvivalTimeResponse, ApiError> {
    let session = load_session(ctx, player, session_id).await?;
    let until = session.end_time.unwrap_or_else(Utc::now);
    let elapsed = until - session.start_time;
    Ok(SurvivalTimeResponse {
        message: "Survival time fetched successfully!".to_string(),
        survival_time: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
        health: session.health,
    })
}

pub async fn leaderboard(ctx: &ApiContext) -> Result<Vec<LeaderboardEntry>, ApiError> {
    let rows = ctx
        .storage
        .top_scores(LEADERBOARD_SIZE)
        .await
        .map_err(internal)?;
    Ok(rows
        .into_iter()
        .map(|(player_name, best_score)| LeaderboardEntry {
            player_name,
            best_score,
        })
        .collect())
}

async fn load_session(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
) -> Result<StoredSession, ApiError> {
    ctx.storage
        .session_for_player(session_id, player.player_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::validation("Invalid session!"))
}

async fn load_live_session(
    ctx: &ApiContext,
    player: &AuthenticatedPlayer,
    session_id: &SessionId,
) -> Result<StoredSession, ApiError> {
    let session = load_session(ctx, player, session_id).await?;
    if !session.is_alive() {
        return Err(game_over());
    }
    Ok(session)
}

fn game_over() -> ApiError {
    ApiError::validation("Game Over!")
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %format!("{err:#}"), "storage operation failed");
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
