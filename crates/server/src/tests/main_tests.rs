use super::*;
use axum::{
    body::{self, Body},
    http::{HeaderMap, Request},
};
use server_api::{AuthConfig, FixedDamage};
use shared::{
    cookies::{cookie_value, CSRF_HEADER},
    error::ErrorCode,
    protocol::LoginResponse,
};
use tower::ServiceExt;

async fn test_app(damage: i64) -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage,
        auth: AuthConfig {
            jwt_secret: "test-secret".into(),
            access_ttl_seconds: 300,
            refresh_ttl_seconds: 600,
        },
        damage: Arc::new(FixedDamage(damage)),
    };
    build_router(Arc::new(AppState { api }))
}

fn json_post(uri: &str) -> axum::http::request::Builder {
    Request::post(uri).header("content-type", "application/json")
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

struct Session {
    access: String,
    csrf: String,
}

impl Session {
    fn cookie(&self) -> String {
        format!("csrftoken={}; access_token={}", self.csrf, self.access)
    }
}

async fn register_and_login(app: &Router, username: &str, role: Option<&str>) -> Session {
    let mut register = serde_json::json!({ "username": username, "password": "testpass" });
    if let Some(role) = role {
        register["role"] = serde_json::Value::from(role);
    }
    let response = app
        .clone()
        .oneshot(
            json_post("/api/auth/register/")
                .body(Body::from(register.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let login = serde_json::json!({ "username": username, "password": "testpass" });
    let response = app
        .clone()
        .oneshot(
            json_post("/api/auth/login/")
                .body(Body::from(login.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookies = set_cookie_pairs(response.headers());
    let csrf = cookie_value(&set_cookies, "csrftoken").expect("csrf cookie");
    let cookie_access = cookie_value(&set_cookies, "access_token").expect("access cookie");
    let body: LoginResponse = read_json(response).await;
    assert_eq!(body.tokens.access, cookie_access);
    Session {
        access: body.tokens.access,
        csrf,
    }
}

fn set_cookie_pairs(headers: &HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

async fn start_with_cookies(app: &Router, session: &Session) -> StartGameResponse {
    let response = app
        .clone()
        .oneshot(
            Request::post("/game/start/")
                .header(header::COOKIE, session.cookie())
                .header(CSRF_HEADER, &session.csrf)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app(10).await;
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = test_app(10).await;
    register_and_login(&app, "testuser", None).await;

    let login = serde_json::json!({ "username": "testuser", "password": "wrong" });
    let response = app
        .oneshot(
            json_post("/api/auth/login/")
                .body(Body::from(login.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.message, "Invalid credentials");
}

#[tokio::test]
async fn protected_route_requires_credentials() {
    let app = test_app(10).await;
    let response = app
        .clone()
        .oneshot(
            Request::get("/api/auth/protected/")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session = register_and_login(&app, "testuser", None).await;
    let response = app
        .oneshot(
            Request::get("/api/auth/protected/")
                .header(header::AUTHORIZATION, format!("Bearer {}", session.access))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: MessageResponse = read_json(response).await;
    assert_eq!(body.message, "Hello, testuser! JWT is working.");
}

#[tokio::test]
async fn admin_route_rejects_players() {
    let app = test_app(10).await;
    let player = register_and_login(&app, "player1", None).await;
    let admin = register_and_login(&app, "boss", Some("admin")).await;

    for (session, expected) in [(&player, StatusCode::FORBIDDEN), (&admin, StatusCode::OK)] {
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/auth/admin/")
                    .header(header::AUTHORIZATION, format!("Bearer {}", session.access))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn cookie_authenticated_post_requires_matching_csrf_header() {
    let app = test_app(10).await;
    let session = register_and_login(&app, "testuser", None).await;

    let missing = app
        .clone()
        .oneshot(
            Request::post("/game/start/")
                .header(header::COOKIE, session.cookie())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    let error: ApiError = read_json(missing).await;
    assert_eq!(error.code, ErrorCode::Forbidden);

    let mismatched = app
        .clone()
        .oneshot(
            Request::post("/game/start/")
                .header(header::COOKIE, session.cookie())
                .header(CSRF_HEADER, "forged")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(mismatched.status(), StatusCode::FORBIDDEN);

    let started = start_with_cookies(&app, &session).await;
    assert_eq!(started.message, "Game started!");
}

#[tokio::test]
async fn bearer_requests_skip_csrf_check() {
    let app = test_app(10).await;
    let session = register_and_login(&app, "testuser", None).await;
    let response = app
        .oneshot(
            Request::post("/game/start/")
                .header(header::AUTHORIZATION, format!("Bearer {}", session.access))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn attack_and_collect_routes_follow_game_rules() {
    let app = test_app(60).await;
    let session = register_and_login(&app, "testuser", None).await;
    let started = start_with_cookies(&app, &session).await;

    let post_game = |uri: &'static str, body: serde_json::Value| {
        Request::post(uri)
            .header("content-type", "application/json")
            .header(header::COOKIE, session.cookie())
            .header(CSRF_HEADER, &session.csrf)
            .body(Body::from(body.to_string()))
            .expect("request")
    };

    let response = app
        .clone()
        .oneshot(post_game(
            "/game/enemy-attack/",
            serde_json::json!({ "session_id": started.session_id }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let attack: AttackResponse = read_json(response).await;
    assert_eq!(attack.remaining_health, 40);

    let response = app
        .clone()
        .oneshot(post_game(
            "/game/collect-item/",
            serde_json::json!({ "session_id": started.session_id, "item": "Health Potion" }),
        ))
        .await
        .expect("response");
    let collected: CollectItemResponse = read_json(response).await;
    assert_eq!(collected.health, 60);
    assert_eq!(collected.inventory, vec!["Health Potion".to_string()]);

    let response = app
        .clone()
        .oneshot(post_game(
            "/game/enemy-attack/",
            serde_json::json!({ "session_id": started.session_id }),
        ))
        .await
        .expect("response");
    let lethal: AttackResponse = read_json(response).await;
    assert_eq!(lethal.remaining_health, 0);

    let response = app
        .clone()
        .oneshot(post_game(
            "/game/enemy-attack/",
            serde_json::json!({ "session_id": started.session_id }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.message, "Game Over!");

    let response = app
        .oneshot(post_game(
            "/game/enemy-attack/",
            serde_json::json!({ "session_id": "not-a-session" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.message, "Invalid session!");
}

#[tokio::test]
async fn move_end_survival_and_leaderboard_routes() {
    let app = test_app(10).await;
    let session = register_and_login(&app, "testuser", None).await;
    let started = start_with_cookies(&app, &session).await;
    let bearer = format!("Bearer {}", session.access);

    let logged = app
        .clone()
        .oneshot(
            Request::post("/game/move/")
                .header("content-type", "application/json")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::from(
                    serde_json::json!({ "session_id": started.session_id, "action": "clicked" })
                        .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(logged.status(), StatusCode::CREATED);

    let ended = app
        .clone()
        .oneshot(
            Request::post("/game/end/")
                .header("content-type", "application/json")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::from(
                    serde_json::json!({ "session_id": started.session_id, "score": 120 })
                        .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    let ended: EndGameResponse = read_json(ended).await;
    assert_eq!(ended.final_score, 120);

    let survival = app
        .clone()
        .oneshot(
            Request::get(format!(
                "/game/survival-time/?session_id={}",
                started.session_id
            ))
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(survival.status(), StatusCode::OK);
    let survival: SurvivalTimeResponse = read_json(survival).await;
    assert_eq!(survival.health, 100);

    let board = app
        .oneshot(
            Request::get("/game/leaderboard/")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let board: Vec<LeaderboardEntry> = read_json(board).await;
    assert_eq!(
        board,
        vec![LeaderboardEntry {
            player_name: "testuser".into(),
            best_score: 120,
        }]
    );
}

#[tokio::test]
async fn panicking_handler_returns_json_internal_error() {
    async fn boom() -> &'static str {
        panic!("boom")
    }

    let app = with_middleware(Router::new().route("/boom", get(boom)));
    let response = app
        .oneshot(Request::get("/boom").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.message, "Internal Server Error");
}
