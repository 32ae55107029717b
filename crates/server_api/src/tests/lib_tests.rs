use super::*;
use shared::{domain::Role, error::ErrorCode};

async fn setup(damage: i64) -> (ApiContext, AuthenticatedPlayer) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let player_id = storage
        .create_player("testuser", "hash", Role::Player)
        .await
        .expect("player");
    (
        ApiContext {
            storage,
            auth: AuthConfig {
                jwt_secret: "secret".into(),
                access_ttl_seconds: 60,
                refresh_ttl_seconds: 120,
            },
            damage: Arc::new(FixedDamage(damage)),
        },
        AuthenticatedPlayer {
            player_id,
            username: "testuser".into(),
            role: Role::Player,
        },
    )
}

#[test]
fn random_damage_stays_in_range() {
    for _ in 0..200 {
        let damage = RandomDamage.roll();
        assert!((MIN_ENEMY_DAMAGE..=MAX_ENEMY_DAMAGE).contains(&damage));
    }
}

#[tokio::test]
async fn start_game_returns_fresh_session_at_full_health() {
    let (ctx, player) = setup(15).await;
    let started = start_game(&ctx, &player).await.expect("start");
    assert_eq!(started.message, "Game started!");
    assert_eq!(started.health, 100);
    assert!(!started.session_id.as_str().is_empty());

    let again = start_game(&ctx, &player).await.expect("start");
    assert_ne!(again.session_id, started.session_id);
}

#[tokio::test]
async fn enemy_attack_reduces_health_and_reports_damage() {
    let (ctx, player) = setup(15).await;
    let started = start_game(&ctx, &player).await.expect("start");

    let attack = enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect("attack");
    assert_eq!(attack.remaining_health, 85);
    assert_eq!(attack.message, "Enemy attacked! You lost 15 HP.");
}

#[tokio::test]
async fn attack_on_dead_session_is_game_over() {
    let (ctx, player) = setup(60).await;
    let started = start_game(&ctx, &player).await.expect("start");

    enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect("first hit");
    let lethal = enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect("second hit");
    assert_eq!(lethal.remaining_health, 0);

    let err = enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect_err("dead");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.message, "Game Over!");

    let err = collect_item(&ctx, &player, &started.session_id, HEALTH_POTION)
        .await
        .expect_err("dead");
    assert_eq!(err.message, "Game Over!");
}

#[tokio::test]
async fn unknown_or_foreign_session_is_invalid() {
    let (ctx, player) = setup(10).await;
    let err = enemy_attack(&ctx, &player, &SessionId::from("nope"))
        .await
        .expect_err("invalid");
    assert_eq!(err.message, "Invalid session!");

    let started = start_game(&ctx, &player).await.expect("start");
    let intruder_id = ctx
        .storage
        .create_player("intruder", "hash", Role::Player)
        .await
        .expect("player");
    let intruder = AuthenticatedPlayer {
        player_id: intruder_id,
        username: "intruder".into(),
        role: Role::Player,
    };
    let err = collect_item(&ctx, &intruder, &started.session_id, "Sword")
        .await
        .expect_err("foreign");
    assert_eq!(err.message, "Invalid session!");
}

#[tokio::test]
async fn health_potion_restores_twenty_capped_at_full() {
    let (ctx, player) = setup(30).await;
    let started = start_game(&ctx, &player).await.expect("start");

    let full = collect_item(&ctx, &player, &started.session_id, HEALTH_POTION)
        .await
        .expect("collect");
    assert_eq!(full.health, 100);
    assert_eq!(full.message, "You collected a Health Potion!");

    enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect("attack");
    let healed = collect_item(&ctx, &player, &started.session_id, HEALTH_POTION)
        .await
        .expect("collect");
    assert_eq!(healed.health, 90);
    assert_eq!(healed.inventory.len(), 2);
}

#[tokio::test]
async fn other_items_only_extend_inventory() {
    let (ctx, player) = setup(30).await;
    let started = start_game(&ctx, &player).await.expect("start");
    enemy_attack(&ctx, &player, &started.session_id)
        .await
        .expect("attack");

    let collected = collect_item(&ctx, &player, &started.session_id, "Sword")
        .await
        .expect("collect");
    assert_eq!(collected.health, 70);
    assert_eq!(collected.inventory, vec!["Sword".to_string()]);

    let err = collect_item(&ctx, &player, &started.session_id, "  ")
        .await
        .expect_err("blank");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn log_move_validates_action() {
    let (ctx, player) = setup(10).await;
    let started = start_game(&ctx, &player).await.expect("start");

    let logged = log_move(&ctx, &player, &started.session_id, "clicked")
        .await
        .expect("move");
    assert_eq!(logged.message, "Move logged!");

    let too_long = "x".repeat(MAX_ACTION_CHARS + 1);
    let err = log_move(&ctx, &player, &started.session_id, &too_long)
        .await
        .expect_err("long");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn end_game_updates_leaderboard_with_best_score() {
    let (ctx, player) = setup(10).await;
    let first = start_game(&ctx, &player).await.expect("start");
    let ended = end_game(&ctx, &player, &first.session_id, 200)
        .await
        .expect("end");
    assert_eq!(ended.final_score, 200);

    let second = start_game(&ctx, &player).await.expect("start");
    end_game(&ctx, &player, &second.session_id, 50)
        .await
        .expect("end");

    let board = leaderboard(&ctx).await.expect("board");
    assert_eq!(
        board,
        vec![LeaderboardEntry {
            player_name: "testuser".into(),
            best_score: 200,
        }]
    );
}

#[tokio::test]
async fn survival_time_is_frozen_after_end() {
    let (ctx, player) = setup(10).await;
    let started = start_game(&ctx, &player).await.expect("start");
    end_game(&ctx, &player, &started.session_id, 0)
        .await
        .expect("end");

    let first = survival_time(&ctx, &player, &started.session_id)
        .await
        .expect("time");
    let second = survival_time(&ctx, &player, &started.session_id)
        .await
        .expect("time");
    assert!(first.survival_time >= 0.0);
    assert_eq!(first.survival_time, second.survival_time);
    assert_eq!(first.health, 100);
}

#[tokio::test]
async fn leaderboard_is_capped_at_ten_entries() {
    let (ctx, _) = setup(10).await;
    for i in 0..12 {
        let id = ctx
            .storage
            .create_player(&format!("p{i}"), "hash", Role::Player)
            .await
            .expect("player");
        ctx.storage.record_score(id, i).await.expect("score");
    }
    let board = leaderboard(&ctx).await.expect("board");
    assert_eq!(board.len(), LEADERBOARD_SIZE as usize);
    assert_eq!(board[0].best_score, 11);
}
