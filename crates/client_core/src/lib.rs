use async_trait::async_trait;
use shared::{
    domain::SessionId,
    protocol::{AttackResponse, CollectItemResponse, StartGameResponse},
};

pub mod controller;
pub mod error;
pub mod http;

pub use controller::{Button, GameController, GamePhase, GameSnapshot, GameView};
pub use error::ClientError;
pub use http::HttpGameApi;

/// The three server calls behind the game buttons.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn start_game(&self) -> Result<StartGameResponse, ClientError>;
    async fn enemy_attack(&self, session_id: &SessionId) -> Result<AttackResponse, ClientError>;
    async fn collect_item(
        &self,
        session_id: &SessionId,
        item: &str,
    ) -> Result<CollectItemResponse, ClientError>;
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod http_tests;
