//! autopkgd: periodic AutoPkg runner with bounded concurrency, Munki catalog rebuilds and
//! Slack notifications.

pub mod engine;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use std::sync::Arc;

/// Result alias used by public autopkgd API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Run a single cycle with the real tools described by `config` and wait for its
/// notifications to drain.
///
/// - **`Ok`** → the recipe list was read; per-recipe failures show up as empty reports.
/// - **`Err`** → the recipe list could not be opened; nothing was dispatched.
pub fn run_once(config: &Config) -> Result<pipeline::CycleSummary> {
    let notifier = config
        .notifications_enabled()
        .then(|| Arc::new(notify::Notifier::from_config(&config.slack)));
    let coordinator = pipeline::Coordinator::from_config(config, notifier);
    let mut summary = coordinator.run_cycle()?;
    summary.wait_for_notifications();
    Ok(summary)
}
