use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{MoveId, PlayerId, Role, SessionId, HEALTH_POTION_RESTORE, MAX_HEALTH};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredPlayer {
    pub player_id: PlayerId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub row_id: i64,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub score: i64,
    pub health: i64,
    pub items: Vec<String>,
}

impl StoredSession {
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

#[derive(Debug, Clone)]
pub struct StoredMove {
    pub move_id: MoveId,
    pub timestamp: DateTime<Utc>,
    pub action: String,
}

const SESSION_COLUMNS: &str =
    "id, public_id, player_id, start_time, end_time, score, health, items";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_player(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<PlayerId> {
        let rec = sqlx::query(
            "INSERT INTO players (username, password_hash, role) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create player '{username}'"))?;
        Ok(PlayerId(rec.get::<i64, _>(0)))
    }

    pub async fn player_by_username(&self, username: &str) -> Result<Option<StoredPlayer>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at FROM players WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| player_from_row(&r)))
    }

    pub async fn player_by_id(&self, player_id: PlayerId) -> Result<Option<StoredPlayer>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at FROM players WHERE id = ?",
        )
        .bind(player_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| player_from_row(&r)))
    }

    pub async fn set_player_role(&self, player_id: PlayerId, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE players SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(player_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_session(
        &self,
        player_id: PlayerId,
        session_id: &SessionId,
    ) -> Result<StoredSession> {
        let row = sqlx::query(&format!(
            "INSERT INTO game_sessions (public_id, player_id, start_time, health)
             VALUES (?, ?, ?, ?)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id.as_str())
        .bind(player_id.0)
        .bind(Utc::now())
        .bind(MAX_HEALTH)
        .fetch_one(&self.pool)
        .await
        .context("failed to create game session")?;
        session_from_row(&row)
    }

    /// Looks a session up by its public id, scoped to the owning player.
    pub async fn session_for_player(
        &self,
        session_id: &SessionId,
        player_id: PlayerId,
    ) -> Result<Option<StoredSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions WHERE public_id = ? AND player_id = ?"
        ))
        .bind(session_id.as_str())
        .bind(player_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    /// Applies damage to a living session, flooring health at zero.
    ///
    /// Returns `None` when the session was already dead, so a concurrent
    /// attack cannot take health below zero or revive it.
    pub async fn apply_damage(&self, row_id: i64, damage: i64) -> Result<Option<i64>> {
        let row = sqlx::query(
            "UPDATE game_sessions SET health = MAX(0, health - ?)
             WHERE id = ? AND health > 0
             RETURNING health",
        )
        .bind(damage)
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<i64, _>(0)))
    }

    /// Adds `item` to a living session's inventory and, when `heals` is set,
    /// restores health capped at full.
    ///
    /// Returns `None` when the session is already dead. Both writes share one
    /// transaction and are guarded on `health > 0`, so a potion can never
    /// revive a session killed by a concurrent attack.
    pub async fn collect_item(
        &self,
        row_id: i64,
        item: &str,
        heals: bool,
    ) -> Result<Option<(Vec<String>, i64)>> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query(
            "UPDATE game_sessions SET items = json_insert(items, '$[#]', ?)
             WHERE id = ? AND health > 0
             RETURNING items, health",
        )
        .bind(item)
        .bind(row_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to append inventory item")?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let items = parse_items(&row.get::<String, _>(0))?;
        let mut health = row.get::<i64, _>(1);

        if heals {
            health = sqlx::query_scalar(
                "UPDATE game_sessions SET health = MIN(?, health + ?)
                 WHERE id = ? AND health > 0
                 RETURNING health",
            )
            .bind(MAX_HEALTH)
            .bind(HEALTH_POTION_RESTORE)
            .bind(row_id)
            .fetch_one(&mut *tx)
            .await
            .context("failed to restore health")?;
        }
        tx.commit().await?;
        Ok(Some((items, health)))
    }

    pub async fn finish_session(&self, row_id: i64, score: i64) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET end_time = ?, score = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(score)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_move(&self, row_id: i64, action: &str) -> Result<MoveId> {
        let rec = sqlx::query(
            "INSERT INTO player_moves (session_id, timestamp, action) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(row_id)
        .bind(Utc::now())
        .bind(action)
        .fetch_one(&self.pool)
        .await?;
        Ok(MoveId(rec.get::<i64, _>(0)))
    }

    /// Moves logged for a session, oldest first, looked up by its public id.
    pub async fn moves_for_session(&self, session_id: &SessionId) -> Result<Vec<StoredMove>> {
        let rows = sqlx::query(
            "SELECT m.id, m.timestamp, m.action
             FROM player_moves m
             INNER JOIN game_sessions s ON s.id = m.session_id
             WHERE s.public_id = ?
             ORDER BY m.id ASC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredMove {
                move_id: MoveId(r.get::<i64, _>(0)),
                timestamp: r.get::<DateTime<Utc>, _>(1),
                action: r.get::<String, _>(2),
            })
            .collect())
    }

    /// Raises the player's best score to `score` if it is higher and returns
    /// the resulting best.
    pub async fn record_score(&self, player_id: PlayerId, score: i64) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO leaderboard (player_id, best_score) VALUES (?, ?)
             ON CONFLICT(player_id) DO UPDATE SET best_score = MAX(best_score, excluded.best_score)
             RETURNING best_score",
        )
        .bind(player_id.0)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    pub async fn top_scores(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT p.username, l.best_score
             FROM leaderboard l
             INNER JOIN players p ON p.id = l.player_id
             ORDER BY l.best_score DESC, lower(p.username) ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<i64, _>(1)))
            .collect())
    }
}

fn player_from_row(r: &SqliteRow) -> StoredPlayer {
    StoredPlayer {
        player_id: PlayerId(r.get::<i64, _>(0)),
        username: r.get::<String, _>(1),
        password_hash: r.get::<String, _>(2),
        role: Role::parse(&r.get::<String, _>(3)).unwrap_or_default(),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn session_from_row(r: &SqliteRow) -> Result<StoredSession> {
    Ok(StoredSession {
        row_id: r.get::<i64, _>(0),
        session_id: SessionId(r.get::<String, _>(1)),
        player_id: PlayerId(r.get::<i64, _>(2)),
        start_time: r.get::<DateTime<Utc>, _>(3),
        end_time: r.get::<Option<DateTime<Utc>>, _>(4),
        score: r.get::<i64, _>(5),
        health: r.get::<i64, _>(6),
        items: parse_items(&r.get::<String, _>(7))?,
    })
}

fn parse_items(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("corrupt inventory json: {raw}"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
