//! Accounts, password hashing and JWT issuance.

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{PlayerId, Role},
    error::ApiError,
    protocol::{
        LoginRequest, LoginResponse, MessageResponse, RefreshResponse, RegisterRequest,
        RegisterResponse, TokenPair,
    },
};
use storage::StoredPlayer;
use tracing::{info, warn};

use crate::{internal, ApiContext};

const CSRF_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    role: Role,
    kind: TokenKind,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPlayer {
    pub player_id: PlayerId,
    pub username: String,
    pub role: Role,
}

impl From<&StoredPlayer> for AuthenticatedPlayer {
    fn from(player: &StoredPlayer) -> Self {
        Self {
            player_id: player.player_id,
            username: player.username.clone(),
            role: player.role,
        }
    }
}

/// Argon2id PHC string for `password` under a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Random value for the double-submit `csrftoken` cookie.
pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn mint_token(
    cfg: &AuthConfig,
    player: &AuthenticatedPlayer,
    kind: TokenKind,
) -> Result<String, ApiError> {
    let ttl = match kind {
        TokenKind::Access => cfg.access_ttl_seconds,
        TokenKind::Refresh => cfg.refresh_ttl_seconds,
    };
    let now = Utc::now();
    let claims = Claims {
        sub: player.player_id.0.to_string(),
        username: player.username.clone(),
        role: player.role,
        kind,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("token mint failed: {e}")))
}

pub fn issue_tokens(cfg: &AuthConfig, player: &AuthenticatedPlayer) -> Result<TokenPair, ApiError> {
    Ok(TokenPair {
        access: mint_token(cfg, player, TokenKind::Access)?,
        refresh: mint_token(cfg, player, TokenKind::Refresh)?,
    })
}

pub fn verify_token(
    cfg: &AuthConfig,
    token: &str,
    expected: TokenKind,
) -> Result<AuthenticatedPlayer, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
    if data.claims.kind != expected {
        return Err(ApiError::unauthorized("Wrong token type"));
    }
    let player_id = data
        .claims
        .sub
        .parse::<i64>()
        .map(PlayerId)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;
    Ok(AuthenticatedPlayer {
        player_id,
        username: data.claims.username,
        role: data.claims.role,
    })
}

pub async fn register(ctx: &ApiContext, req: RegisterRequest) -> Result<RegisterResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }
    let role = match req.role.as_deref() {
        None => Role::Player,
        Some(raw) => Role::parse(raw).ok_or_else(|| ApiError::validation("Invalid role"))?,
    };

    if ctx
        .storage
        .player_by_username(username)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::validation("Username already taken"));
    }

    let password_hash = hash_password(&req.password).map_err(internal)?;
    let player_id = ctx
        .storage
        .create_player(username, &password_hash, role)
        .await
        .map_err(internal)?;
    info!(player_id = player_id.0, %username, role = role.as_str(), "player registered");

    Ok(RegisterResponse {
        message: "User created successfully".to_string(),
        role,
    })
}

pub async fn login(ctx: &ApiContext, req: LoginRequest) -> Result<LoginResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation(
            "Both username and password are required",
        ));
    }

    let player = ctx
        .storage
        .player_by_username(req.username.trim())
        .await
        .map_err(internal)?
        .filter(|player| verify_password(&req.password, &player.password_hash));
    let Some(player) = player else {
        warn!(username = %req.username, "rejected login");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let tokens = issue_tokens(&ctx.auth, &AuthenticatedPlayer::from(&player))?;
    Ok(LoginResponse {
        message: "Login successful".to_string(),
        tokens,
    })
}

pub async fn refresh(ctx: &ApiContext, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
    let claimed = verify_token(&ctx.auth, refresh_token, TokenKind::Refresh)?;
    let player = load_player(ctx, claimed.player_id).await?;
    Ok(RefreshResponse {
        access: mint_token(&ctx.auth, &player, TokenKind::Access)?,
    })
}

/// Resolves an access token to the player it was issued for.
///
/// The player is re-read so that deleted accounts and role changes take
/// effect before the token expires.
pub async fn authenticate(ctx: &ApiContext, access_token: &str) -> Result<AuthenticatedPlayer, ApiError> {
    let claimed = verify_token(&ctx.auth, access_token, TokenKind::Access)?;
    load_player(ctx, claimed.player_id).await
}

async fn load_player(ctx: &ApiContext, player_id: PlayerId) -> Result<AuthenticatedPlayer, ApiError> {
    ctx.storage
        .player_by_id(player_id)
        .await
        .map_err(internal)?
        .map(|player| AuthenticatedPlayer::from(&player))
        .ok_or_else(|| ApiError::unauthorized("User is not authenticated"))
}

pub fn protected(player: &AuthenticatedPlayer) -> MessageResponse {
    MessageResponse {
        message: format!("Hello, {}! JWT is working.", player.username),
    }
}

pub fn admin_dashboard(player: &AuthenticatedPlayer) -> Result<MessageResponse, ApiError> {
    if player.role != Role::Admin {
        return Err(ApiError::forbidden(
            "You do not have permission to access this resource",
        ));
    }
    Ok(MessageResponse {
        message: "Welcome, Admin! Here's your dashboard.".to_string(),
    })
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
