use std::{any::Any, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use server_api::{auth, ApiContext, RandomDamage};
use shared::{
    cookies::{ACCESS_TOKEN_COOKIE, CSRF_COOKIE},
    domain::SessionId,
    error::ApiError,
    protocol::{
        AttackResponse, CollectItemRequest, CollectItemResponse, EndGameRequest, EndGameResponse,
        LeaderboardEntry, LogMoveRequest, LogMoveResponse, LoginRequest, MessageResponse,
        RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse, SessionRequest,
        StartGameResponse, SurvivalTimeResponse,
    },
};
use storage::Storage;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{failure, ApiFailure, CurrentPlayer};
use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct SurvivalTimeQuery {
    session_id: SessionId,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        auth: settings.auth_config(),
        damage: Arc::new(RandomDamage),
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/register/", post(http_register))
        .route("/api/auth/login/", post(http_login))
        .route("/api/auth/token/refresh/", post(http_refresh))
        .route("/api/auth/protected/", get(http_protected))
        .route("/api/auth/admin/", get(http_admin_dashboard))
        .route("/game/start/", post(http_start_game))
        .route("/game/move/", post(http_log_move))
        .route("/game/end/", post(http_end_game))
        .route("/game/enemy-attack/", post(http_enemy_attack))
        .route("/game/collect-item/", post(http_collect_item))
        .route("/game/survival-time/", get(http_survival_time))
        .route("/game/leaderboard/", get(http_leaderboard))
        .with_state(state);
    with_middleware(router)
}

fn with_middleware(router: Router) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    error!(%detail, "request handler panicked");
    failure(ApiError::internal("Internal Server Error")).into_response()
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, ApiFailure> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| failure(ApiError::internal(e.to_string())))?;
    Ok("ok")
}

async fn http_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiFailure> {
    let created = auth::register(&state.api, req).await.map_err(failure)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let response = auth::login(&state.api, req).await.map_err(failure)?;
    let csrf_cookie = format!(
        "{CSRF_COOKIE}={}; Path=/; SameSite=Lax",
        auth::generate_csrf_token()
    );
    let access_cookie = format!(
        "{ACCESS_TOKEN_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        response.tokens.access, state.api.auth.access_ttl_seconds
    );
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, csrf_cookie),
            (header::SET_COOKIE, access_cookie),
        ]),
        Json(response),
    ))
}

async fn http_refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiFailure> {
    let refreshed = auth::refresh(&state.api, &req.refresh)
        .await
        .map_err(failure)?;
    Ok(Json(refreshed))
}

async fn http_protected(CurrentPlayer(player): CurrentPlayer) -> Json<MessageResponse> {
    Json(auth::protected(&player))
}

async fn http_admin_dashboard(
    CurrentPlayer(player): CurrentPlayer,
) -> Result<Json<MessageResponse>, ApiFailure> {
    let dashboard = auth::admin_dashboard(&player).map_err(failure)?;
    Ok(Json(dashboard))
}

async fn http_start_game(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
) -> Result<Json<StartGameResponse>, ApiFailure> {
    let started = server_api::start_game(&state.api, &player)
        .await
        .map_err(failure)?;
    Ok(Json(started))
}

async fn http_log_move(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Json(req): Json<LogMoveRequest>,
) -> Result<(StatusCode, Json<LogMoveResponse>), ApiFailure> {
    let logged = server_api::log_move(&state.api, &player, &req.session_id, &req.action)
        .await
        .map_err(failure)?;
    Ok((StatusCode::CREATED, Json(logged)))
}

async fn http_end_game(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Json(req): Json<EndGameRequest>,
) -> Result<Json<EndGameResponse>, ApiFailure> {
    let ended = server_api::end_game(&state.api, &player, &req.session_id, req.score)
        .await
        .map_err(failure)?;
    Ok(Json(ended))
}

async fn http_enemy_attack(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Json(req): Json<SessionRequest>,
) -> Result<Json<AttackResponse>, ApiFailure> {
    let attack = server_api::enemy_attack(&state.api, &player, &req.session_id)
        .await
        .map_err(failure)?;
    Ok(Json(attack))
}

async fn http_collect_item(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Json(req): Json<CollectItemRequest>,
) -> Result<Json<CollectItemResponse>, ApiFailure> {
    let collected = server_api::collect_item(&state.api, &player, &req.session_id, &req.item)
        .await
        .map_err(failure)?;
    Ok(Json(collected))
}

async fn http_survival_time(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(player): CurrentPlayer,
    Query(q): Query<SurvivalTimeQuery>,
) -> Result<Json<SurvivalTimeResponse>, ApiFailure> {
    let survival = server_api::survival_time(&state.api, &player, &q.session_id)
        .await
        .map_err(failure)?;
    Ok(Json(survival))
}

async fn http_leaderboard(
    State(state): State<Arc<AppState>>,
    CurrentPlayer(_player): CurrentPlayer,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiFailure> {
    let board = server_api::leaderboard(&state.api).await.map_err(failure)?;
    Ok(Json(board))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
