//! Load the TOML config file and apply it over [`Config::default`].

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Config;
use crate::utils::secrets::webhook_url_from_env;

/// File shape. Every key is optional; absent keys keep the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AutopkgdToml {
    autopkg_path: Option<String>,
    makecatalogs_path: Option<String>,
    recipes_file: Option<String>,
    munki_repo: Option<String>,
    reports_path: Option<String>,
    max_processes: Option<usize>,
    /// Seconds.
    autopkg_exec_timeout: Option<u64>,
    /// Seconds.
    autopkg_check_interval: Option<u64>,
    listen: Option<String>,
    #[serde(default)]
    slack: SlackSection,
}

#[derive(Debug, Default, Deserialize)]
struct SlackSection {
    webhook_url: Option<String>,
    channel: Option<String>,
    username: Option<String>,
    icon_url: Option<String>,
}

pub fn parse_config(s: &str) -> Result<AutopkgdToml> {
    toml::from_str(s).context("parse config")
}

/// Overwrite a path field when present and non-empty.
macro_rules! apply_path {
    ($file:expr, $config:expr, $field:ident) => {
        if let Some(p) = $file.$field.as_deref().filter(|p| !p.is_empty()) {
            $config.$field = PathBuf::from(p);
        }
    };
}

/// Overwrite a string field when present.
macro_rules! apply_string {
    ($file:expr, $config:expr, $field:ident) => {
        if let Some(v) = &$file.$field {
            $config.$field = v.clone();
        }
    };
}

/// Apply file values to `config`. Zero counts and durations keep the defaults.
pub fn apply_file_to_config(file: &AutopkgdToml, config: &mut Config) -> Result<()> {
    apply_path!(file, config, autopkg_path);
    apply_path!(file, config, makecatalogs_path);
    apply_path!(file, config, recipes_file);
    apply_path!(file, config, munki_repo);
    apply_path!(file, config, reports_path);
    if let Some(n) = file.max_processes.filter(|n| *n > 0) {
        config.max_processes = n;
    }
    if let Some(secs) = file.autopkg_exec_timeout.filter(|s| *s > 0) {
        config.exec_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.autopkg_check_interval.filter(|s| *s > 0) {
        config.check_interval = Duration::from_secs(secs);
    }
    if let Some(addr) = file.listen.as_deref().filter(|a| !a.is_empty()) {
        config.listen = Some(
            addr.parse()
                .with_context(|| format!("invalid listen address {addr:?}"))?,
        );
    }
    apply_string!(file.slack, config.slack, webhook_url);
    apply_string!(file.slack, config.slack, channel);
    apply_string!(file.slack, config.slack, username);
    apply_string!(file.slack, config.slack, icon_url);
    Ok(())
}

/// Defaults, then the file at `path`, then the webhook URL from the environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let file = parse_config(&s).with_context(|| path.display().to_string())?;
    let mut config = Config::default();
    apply_file_to_config(&file, &mut config)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    if let Some(url) = webhook_url_from_env(dir) {
        config.slack.webhook_url = url;
    }
    Ok(config)
}

/// Startup checks. Any failure here is fatal to the process, not to a cycle.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.reports_path.as_os_str().is_empty() {
        bail!("You must specify a directory for reports to be saved in your config (reports_path)");
    }
    let meta = std::fs::metadata(&config.reports_path).with_context(|| {
        format!("No such file or directory: {}", config.reports_path.display())
    })?;
    if !meta.is_dir() {
        bail!("{} must be a directory", config.reports_path.display());
    }
    if config.recipes_file.as_os_str().is_empty() {
        bail!("You must specify a recipe list in your config (recipes_file)");
    }
    if config.notify && config.slack.webhook_url.is_empty() {
        log::warn!("Slack notifications requested but no webhook_url configured; disabled");
    }
    Ok(())
}
