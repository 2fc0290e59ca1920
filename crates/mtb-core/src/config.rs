use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Empty means the bot is open to everyone (no allowlist configured).
    pub telegram_allowed_users: Vec<i64>,

    pub database_path: PathBuf,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let database_path =
            PathBuf::from(env_str("DATABASE_PATH").unwrap_or("meals.db".to_string()));

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(20);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/meal-bot-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            database_path,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}
