use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use server_api::AuthConfig;
use tracing::warn;

pub const DEV_JWT_SECRET: &str = "dev-insecure-jwt-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            database_url: "sqlite://./data/game.db".into(),
            jwt_secret: DEV_JWT_SECRET.into(),
            access_ttl_seconds: 300,
            refresh_ttl_seconds: 86_400,
        }
    }
}

impl Settings {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            access_ttl_seconds: self.access_ttl_seconds,
            refresh_ttl_seconds: self.refresh_ttl_seconds,
        }
    }
}

/// Keys accepted in `server.toml`.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    access_ttl_seconds: Option<i64>,
    refresh_ttl_seconds: Option<i64>,
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    let settings = load_settings_from(file.as_deref(), |key| std::env::var(key).ok());
    if settings.jwt_secret == DEV_JWT_SECRET {
        warn!("using built-in development JWT secret; set APP__JWT_SECRET in production");
    }
    settings
}

/// Defaults, then the TOML file, then environment overrides.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.server_bind = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.jwt_secret {
                    settings.jwt_secret = v;
                }
                if let Some(v) = file_cfg.access_ttl_seconds {
                    settings.access_ttl_seconds = v;
                }
                if let Some(v) = file_cfg.refresh_ttl_seconds {
                    settings.refresh_ttl_seconds = v;
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["JWT_SECRET", "APP__JWT_SECRET"] {
        if let Some(v) = env(key) {
            settings.jwt_secret = v;
        }
    }
    if let Some(parsed) = env("APP__ACCESS_TTL_SECONDS").and_then(|v| v.parse::<i64>().ok()) {
        settings.access_ttl_seconds = parsed;
    }
    if let Some(parsed) = env("APP__REFRESH_TTL_SECONDS").and_then(|v| v.parse::<i64>().ok()) {
        settings.refresh_ttl_seconds = parsed;
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
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
#[path = "tests/config_tests.rs"]
mod tests;
