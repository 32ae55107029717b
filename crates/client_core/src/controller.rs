//! Button-driven game loop: each action is one request whose response is
//! written back into local state and the view.

use shared::domain::{SessionId, HEALTH_POTION, MAX_HEALTH};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{error::ClientError, GameApi};

pub const GAME_STARTED_ALERT: &str = "Game Started!";
pub const GAME_OVER_ALERT: &str = "Game Over!";
pub const HEALTH_ELEMENT_ID: &str = "health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    StartGame,
    Attack,
    CollectItem,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::StartGame, Button::Attack, Button::CollectItem];

    pub fn element_id(self) -> &'static str {
        match self {
            Button::StartGame => "start-game-btn",
            Button::Attack => "attack-btn",
            Button::CollectItem => "collect-item-btn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    NotStarted,
    Active,
    GameOver,
}

/// Where the controller renders: alerts, the health readout and buttons.
pub trait GameView: Send + Sync {
    fn alert(&self, message: &str);
    fn set_health_text(&self, text: &str);
    fn set_button_enabled(&self, button: Button, enabled: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub session_id: Option<SessionId>,
    pub health: i64,
    pub score: i64,
    pub phase: GamePhase,
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            health: MAX_HEALTH,
            score: 0,
            phase: GamePhase::NotStarted,
        }
    }
}

pub struct GameController<A, V> {
    api: A,
    view: V,
    state: Mutex<GameSnapshot>,
}

impl<A: GameApi, V: GameView> GameController<A, V> {
    pub fn new(api: A, view: V) -> Self {
        Self {
            api,
            view,
            state: Mutex::new(GameSnapshot::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn score(&self) -> i64 {
        self.state.lock().await.score
    }

    pub async fn start_game(&self) -> Result<(), ClientError> {
        let started = logged("start game", self.api.start_game().await)?;
        {
            let mut state = self.state.lock().await;
            state.session_id = Some(started.session_id.clone());
            state.phase = GamePhase::Active;
        }
        info!(session_id = %started.session_id, "game started");

        self.view.alert(GAME_STARTED_ALERT);
        self.view.set_button_enabled(Button::StartGame, false);
        self.view.set_button_enabled(Button::Attack, true);
        self.view.set_button_enabled(Button::CollectItem, true);
        Ok(())
    }

    pub async fn attack(&self) -> Result<(), ClientError> {
        let session_id = self.session_id("attack").await?;
        let attack = logged("attack", self.api.enemy_attack(&session_id).await)?;
        let game_over = {
            let mut state = self.state.lock().await;
            state.health = attack.remaining_health;
            if state.health <= 0 {
                state.phase = GamePhase::GameOver;
            }
            state.health <= 0
        };

        self.view.alert(&attack.message);
        self.view
            .set_health_text(&attack.remaining_health.to_string());
        if game_over {
            info!(%session_id, "player died");
            self.view.alert(GAME_OVER_ALERT);
            self.view.set_button_enabled(Button::Attack, false);
            self.view.set_button_enabled(Button::CollectItem, false);
        }
        Ok(())
    }

    pub async fn collect_item(&self) -> Result<(), ClientError> {
        let session_id = self.session_id("collect item").await?;
        let collected = logged(
            "collect item",
            self.api.collect_item(&session_id, HEALTH_POTION).await,
        )?;
        self.state.lock().await.health = collected.health;

        self.view.alert(&collected.message);
        self.view.set_health_text(&collected.health.to_string());
        Ok(())
    }

    async fn session_id(&self, action: &'static str) -> Result<SessionId, ClientError> {
        let session_id = self.state.lock().await.session_id.clone();
        session_id.ok_or_else(|| {
            warn!(action, "no game session");
            ClientError::NoSession
        })
    }
}

fn logged<T>(action: &'static str, result: Result<T, ClientError>) -> Result<T, ClientError> {
    if let Err(error) = &result {
        warn!(action, %error, "request failed");
    }
    result
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
