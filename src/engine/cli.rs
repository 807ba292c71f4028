//! CLI command handler: load config, optionally start the HTTP trigger, run cycles.

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::Config;
use crate::engine::arg_parser::Cli;
use crate::engine::executor::Autopkg;
use crate::notify::Notifier;
use crate::pipeline::Coordinator;
use crate::server::{HttpState, spawn_http_server};
use crate::utils::{load_config, setup_logging, validate_config};

/// Defaults → config file → CLI flags, then startup validation.
fn setup_config(cli: &Cli) -> Result<Config> {
    setup_logging(cli.verbose);
    let mut config = load_config(&cli.config)?;
    config.check_only |= cli.check;
    config.notify |= cli.slack;
    if let Some(addr) = cli.listen {
        config.listen = Some(addr);
    }
    validate_config(&config)?;
    debug!(
        "{} CONFIG: recipes={} reports={} repo={} max_processes={} timeout={:?} interval={:?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        config.recipes_file.display(),
        config.reports_path.display(),
        config.munki_repo.display(),
        config.max_processes,
        config.exec_timeout,
        config.check_interval
    );
    Ok(config)
}

/// Run a single cycle with --once; otherwise serve the HTTP trigger (if configured) and run
/// cycles until Ctrl+C.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let config = setup_config(cli)?;
    if config.check_only {
        warn!("RUNNING IN CHECK MODE. NOTHING WILL BE DOWNLOADED OR IMPORTED.");
    }

    if cli.once {
        let summary = crate::run_once(&config)?;
        info!(
            "Ran {} recipes; catalogs modified: {}",
            summary.dispatched, summary.catalogs_modified
        );
        return Ok(());
    }

    let notifier = config
        .notifications_enabled()
        .then(|| Arc::new(Notifier::from_config(&config.slack)));

    if let Some(addr) = config.listen {
        let state = HttpState {
            tool: Arc::new(Autopkg::from_config(&config)),
            notifier: notifier.clone(),
        };
        spawn_http_server(addr, state)?;
    }

    let coordinator = Coordinator::from_config(&config, notifier);

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("install Ctrl+C handler")?;
    coordinator.run(&shutdown_rx);
    Ok(())
}
