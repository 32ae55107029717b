use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use server_api::{auth::hash_password, LEADERBOARD_SIZE};
use shared::domain::{Role, SessionId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/game.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreatePlayer {
        username: String,
        password: String,
        #[arg(long, default_value = "player")]
        role: String,
    },
    SetRole {
        username: String,
        role: String,
    },
    Leaderboard {
        #[arg(long, default_value_t = LEADERBOARD_SIZE)]
        limit: u32,
    },
    /// Prints the moves logged for one game session.
    Moves {
        session_id: String,
    },
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::parse(raw).with_context(|| format!("unknown role '{raw}' (expected player or admin)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreatePlayer {
            username,
            password,
            role,
        } => {
            let role = parse_role(&role)?;
            let password_hash = hash_password(&password)?;
            let player_id = storage
                .create_player(&username, &password_hash, role)
                .await?;
            println!("created player_id={} role={}", player_id.0, role.as_str());
        }
        Command::SetRole { username, role } => {
            let role = parse_role(&role)?;
            let Some(player) = storage.player_by_username(&username).await? else {
                bail!("no player named '{username}'");
            };
            storage.set_player_role(player.player_id, role).await?;
            println!("{username} is now {}", role.as_str());
        }
        Command::Leaderboard { limit } => {
            for (rank, (name, best)) in storage.top_scores(limit).await?.into_iter().enumerate() {
                println!("{:>3}. {name:<24} {best}", rank + 1);
            }
        }
        Command::Moves { session_id } => {
            let session_id = SessionId(session_id);
            for logged in storage.moves_for_session(&session_id).await? {
                println!(
                    "{:>6} {} {}",
                    logged.move_id.0,
                    logged.timestamp.to_rfc3339(),
                    logged.action
                );
            }
        }
    }

    Ok(())
}
