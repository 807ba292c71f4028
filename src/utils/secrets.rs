//! Webhook URL lookup: env var → .env next to the config file.

use log::debug;
use std::path::Path;

use crate::utils::config::SlackConsts;

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `AUTOPKGD_SLACK_WEBHOOK_URL` from the environment, else from `dir/.env`.
/// Keeps the secret out of the config file when preferred.
pub fn webhook_url_from_env(dir: &Path) -> Option<String> {
    if let Some(url) = non_empty_env(SlackConsts::WEBHOOK_ENV) {
        debug!("Webhook URL taken from environment");
        return Some(url);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        if let Some(url) = non_empty_env(SlackConsts::WEBHOOK_ENV) {
            debug!("Webhook URL taken from {}", env_path.display());
            return Some(url);
        }
    }
    None
}
