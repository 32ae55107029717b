use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use clap::Parser;
use client_core::{
    controller::HEALTH_ELEMENT_ID, Button, ClientError, GameController, GameView, HttpGameApi,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    /// Create the account before logging in.
    #[arg(long)]
    register: bool,
}

/// Prints what a browser page would render and remembers which buttons are
/// clickable.
struct TerminalView {
    enabled: Mutex<HashMap<Button, bool>>,
}

impl TerminalView {
    fn new() -> Self {
        Self {
            enabled: Mutex::new(HashMap::from([
                (Button::StartGame, true),
                (Button::Attack, false),
                (Button::CollectItem, false),
            ])),
        }
    }

    fn is_enabled(&self, button: Button) -> bool {
        self.enabled
            .lock()
            .map(|enabled| enabled.get(&button).copied().unwrap_or(false))
            .unwrap_or(false)
    }
}

impl GameView for TerminalView {
    fn alert(&self, message: &str) {
        println!("[alert] {message}");
    }

    fn set_health_text(&self, text: &str) {
        println!("#{HEALTH_ELEMENT_ID}: {text}");
    }

    fn set_button_enabled(&self, button: Button, enabled: bool) {
        debug!(button = button.element_id(), enabled, "button state");
        if let Ok(mut buttons) = self.enabled.lock() {
            buttons.insert(button, enabled);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Press(Button),
    Survival,
    End(i64),
    Leaderboard,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let input = match words.next()? {
        "start" | "s" => Input::Press(Button::StartGame),
        "attack" | "a" => Input::Press(Button::Attack),
        "collect" | "c" => Input::Press(Button::CollectItem),
        "survival" => Input::Survival,
        "end" => Input::End(words.next().map_or(Some(0), |s| s.parse().ok())?),
        "leaderboard" | "top" => Input::Leaderboard,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

const HELP: &str =
    "commands: start | attack | collect | survival | end [score] | leaderboard | help | quit";

type Controller = GameController<HttpGameApi, TerminalView>;

async fn press(controller: &Controller, button: Button) -> Result<(), ClientError> {
    match button {
        Button::StartGame => controller.start_game().await,
        Button::Attack => controller.attack().await,
        Button::CollectItem => controller.collect_item().await,
    }
}

async fn run_extra(controller: &Controller, input: Input) -> Result<(), ClientError> {
    let session_id = controller.snapshot().await.session_id;
    match (input, session_id) {
        (Input::Leaderboard, _) => {
            for (rank, entry) in controller.api().leaderboard().await?.iter().enumerate() {
                println!("{:>3}. {:<24} {}", rank + 1, entry.player_name, entry.best_score);
            }
        }
        (Input::Survival, Some(session_id)) => {
            let survival = controller.api().survival_time(&session_id).await?;
            println!(
                "survived {:.1}s, health {}",
                survival.survival_time, survival.health
            );
        }
        (Input::End(score), Some(session_id)) => {
            let ended = controller.api().end_game(&session_id, score).await?;
            println!("{} final score {}", ended.message, ended.final_score);
        }
        (Input::Survival | Input::End(_), None) => return Err(ClientError::NoSession),
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    let api = HttpGameApi::new(&args.server_url)?;
    if args.register {
        api.register(&args.username, &args.password, None).await?;
    }
    api.login(&args.username, &args.password).await?;
    info!(server_url = %args.server_url, username = %args.username, "connected");
    println!("Logged in as {}. {HELP}", args.username);

    let controller: Arc<Controller> = Arc::new(GameController::new(api, TerminalView::new()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Some(Input::Press(button)) => {
                if !controller.view().is_enabled(button) {
                    println!("{} is disabled", button.element_id());
                    continue;
                }
                // Clicks do not wait for each other, like buttons on a page.
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(error) = press(&controller, button).await {
                        eprintln!("{}: {error}", button.element_id());
                    }
                });
            }
            Some(Input::Help) => println!("{HELP}"),
            Some(Input::Quit) => break,
            Some(extra) => {
                if let Err(error) = run_extra(&controller, extra).await {
                    eprintln!("{error}");
                }
            }
            None if line.trim().is_empty() => {}
            None => println!("unknown command; {HELP}"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
