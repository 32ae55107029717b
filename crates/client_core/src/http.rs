use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    cookie::{CookieStore, Jar},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    cookies::{csrf_token, CSRF_HEADER},
    domain::SessionId,
    error::ApiError,
    protocol::{
        AttackResponse, CollectItemRequest, CollectItemResponse, EndGameRequest, EndGameResponse,
        LeaderboardEntry, LogMoveRequest, LogMoveResponse, LoginRequest, LoginResponse,
        RegisterRequest, RegisterResponse, SessionRequest, StartGameResponse,
        SurvivalTimeResponse, TokenPair,
    },
};
use tracing::{debug, info};
use url::Url;

use crate::{error::ClientError, GameApi};

/// Game server client that keeps cookies the way a browser tab does.
///
/// Every unsafe request echoes the `csrftoken` cookie in `X-CSRFToken`. When
/// the jar holds no such cookie the header is left off and the request still
/// goes out.
pub struct HttpGameApi {
    http: Client,
    base_url: Url,
    jar: Arc<Jar>,
}

impl HttpGameApi {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let jar = Arc::new(Jar::default());
        let http = Client::builder().cookie_provider(jar.clone()).build()?;
        Ok(Self {
            http,
            base_url,
            jar,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Cookies the jar would send to the server, as `"a=b; c=d"`.
    pub fn cookie_header(&self) -> String {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
            .unwrap_or_default()
    }

    pub fn csrf_token(&self) -> Option<String> {
        csrf_token(&self.cookie_header())
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<RegisterResponse, ClientError> {
        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            role: role.map(str::to_string),
        };
        let registered: RegisterResponse =
            send(self.post("api/auth/register/")?.json(&request)).await?;
        info!(%username, role = registered.role.as_str(), "registered");
        Ok(registered)
    }

    /// Logs in and keeps the session cookies the server sets.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ClientError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = send(self.post("api/auth/login/")?.json(&request)).await?;
        info!(%username, csrf = self.csrf_token().is_some(), "logged in");
        Ok(response.tokens)
    }

    pub async fn log_move(
        &self,
        session_id: &SessionId,
        action: &str,
    ) -> Result<LogMoveResponse, ClientError> {
        let request = LogMoveRequest {
            session_id: session_id.clone(),
            action: action.to_string(),
        };
        send(self.post("game/move/")?.json(&request)).await
    }

    pub async fn end_game(
        &self,
        session_id: &SessionId,
        score: i64,
    ) -> Result<EndGameResponse, ClientError> {
        let request = EndGameRequest {
            session_id: session_id.clone(),
            score,
        };
        send(self.post("game/end/")?.json(&request)).await
    }

    pub async fn survival_time(
        &self,
        session_id: &SessionId,
    ) -> Result<SurvivalTimeResponse, ClientError> {
        let request = self
            .http
            .get(self.endpoint("game/survival-time/")?)
            .query(&[("session_id", session_id.as_str())]);
        send(request).await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ClientError> {
        send(self.http.get(self.endpoint("game/leaderboard/")?)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        let request = self.http.post(self.endpoint(path)?);
        Ok(match self.csrf_token() {
            Some(token) => request.header(CSRF_HEADER, token),
            None => {
                debug!(path, "no csrftoken cookie; sending without csrf header");
                request
            }
        })
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn start_game(&self) -> Result<StartGameResponse, ClientError> {
        send(self.post("game/start/")?).await
    }

    async fn enemy_attack(&self, session_id: &SessionId) -> Result<AttackResponse, ClientError> {
        let request = SessionRequest {
            session_id: session_id.clone(),
        };
        send(self.post("game/enemy-attack/")?.json(&request)).await
    }

    async fn collect_item(
        &self,
        session_id: &SessionId,
        item: &str,
    ) -> Result<CollectItemResponse, ClientError> {
        let request = CollectItemRequest {
            session_id: session_id.clone(),
            item: item.to_string(),
        };
        send(self.post("game/collect-item/")?.json(&request)).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    decode(request.send().await?).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await?;
    let error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::internal(if body.is_empty() {
            status.to_string()
        } else {
            body
        })
    });
    Err(ClientError::Api {
        status: status.as_u16(),
        error,
    })
}
