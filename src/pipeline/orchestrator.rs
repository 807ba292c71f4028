//! Cycle coordinator: source → dispatch → aggregate → rebuild decision, repeated on an
//! interval with at most one cycle in flight.

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::Config;
use crate::engine::catalogs::{CatalogRebuilder, MakeCatalogs};
use crate::engine::executor::{Autopkg, RecipeExecutor};
use crate::notify::{Notifier, NotifyStats};
use crate::pipeline::aggregate::spawn_aggregator;
use crate::pipeline::context::create_cycle_channels;
use crate::pipeline::dispatch::dispatch;
use crate::pipeline::recipes::RecipeList;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    RecipeSourceOpen,
    Dispatching,
    Aggregating,
    RebuildCatalog,
    SkipRebuild,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::RecipeSourceOpen => "opening recipe list",
            CyclePhase::Dispatching => "dispatching",
            CyclePhase::Aggregating => "aggregating",
            CyclePhase::RebuildCatalog => "rebuilding catalogs",
            CyclePhase::SkipRebuild => "no catalog changes",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt,
    Failed(String),
    Skipped,
}

/// Outcome of one completed cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub dispatched: usize,
    pub received: usize,
    pub catalogs_modified: bool,
    pub rebuild: RebuildOutcome,
    pub elapsed: Duration,
    /// Still-running notifier for this cycle's reports. Not joined by the coordinator.
    pub notifier: Option<JoinHandle<NotifyStats>>,
}

impl CycleSummary {
    /// Wait for this cycle's notifier, if any, and log what it delivered.
    pub fn wait_for_notifications(&mut self) -> Option<NotifyStats> {
        self.notifier.take().and_then(finish_notifications)
    }
}

fn finish_notifications(handle: JoinHandle<NotifyStats>) -> Option<NotifyStats> {
    if !handle.is_finished() {
        info!("Waiting for notifications from the previous cycle");
    }
    match handle.join() {
        Ok(stats) => {
            info!(
                "Notifications: {} delivered, {} failed, {} rows skipped",
                stats.delivered, stats.failed, stats.skipped_rows
            );
            Some(stats)
        }
        Err(_) => {
            error!("notifier thread panicked");
            None
        }
    }
}

pub struct Coordinator {
    recipes_file: PathBuf,
    max_processes: usize,
    check_interval: Duration,
    executor: Arc<dyn RecipeExecutor>,
    rebuilder: Arc<dyn CatalogRebuilder>,
    notifier: Option<Arc<Notifier>>,
}

impl Coordinator {
    pub fn new(
        config: &Config,
        executor: Arc<dyn RecipeExecutor>,
        rebuilder: Arc<dyn CatalogRebuilder>,
    ) -> Self {
        Self {
            recipes_file: config.recipes_file.clone(),
            max_processes: config.max_processes.max(1),
            check_interval: config.check_interval,
            executor,
            rebuilder,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// autopkg + makecatalogs from `config`, plus `notifier` when notifications are on.
    pub fn from_config(config: &Config, notifier: Option<Arc<Notifier>>) -> Self {
        let coordinator = Self::new(
            config,
            Arc::new(Autopkg::from_config(config)),
            Arc::new(MakeCatalogs::from_config(config)),
        );
        match notifier {
            Some(n) => coordinator.with_notifier(n),
            None => coordinator,
        }
    }

    fn enter(&self, phase: CyclePhase) {
        debug!("cycle: {phase}");
    }

    /// Run one full cycle. Only a recipe list that cannot be opened is an `Err`; per-recipe
    /// and rebuild failures are logged and reflected in the summary.
    pub fn run_cycle(&self) -> Result<CycleSummary> {
        let start = Instant::now();

        self.enter(CyclePhase::RecipeSourceOpen);
        let recipes = RecipeList::open(&self.recipes_file)?;

        let channels = create_cycle_channels(self.max_processes, self.notifier.is_some());
        let aggregator = spawn_aggregator(channels.aggregate_rx);
        let notifier = match (&self.notifier, channels.notify_rx) {
            (Some(n), Some(rx)) => Some(n.spawn(rx)),
            _ => None,
        };

        self.enter(CyclePhase::Dispatching);
        let dispatched = dispatch(recipes, self.max_processes, &self.executor, channels.sink);

        self.enter(CyclePhase::Aggregating);
        let agg = aggregator
            .join()
            .map_err(|_| anyhow!("aggregator thread panicked"))?;
        if agg.received != dispatched {
            warn!(
                "dispatched {} recipes but aggregated {} reports",
                dispatched, agg.received
            );
        }

        let rebuild = if agg.catalogs_modified {
            self.enter(CyclePhase::RebuildCatalog);
            match self.rebuilder.rebuild() {
                Ok(()) => {
                    info!("Catalogs rebuilt");
                    RebuildOutcome::Rebuilt
                }
                Err(e) => {
                    error!("Catalog rebuild failed: {e:#}");
                    RebuildOutcome::Failed(format!("{e:#}"))
                }
            }
        } else {
            self.enter(CyclePhase::SkipRebuild);
            RebuildOutcome::Skipped
        };
        self.enter(CyclePhase::Idle);

        Ok(CycleSummary {
            dispatched,
            received: agg.received,
            catalogs_modified: agg.catalogs_modified,
            rebuild,
            elapsed: start.elapsed(),
            notifier,
        })
    }

    /// Run cycles until `shutdown` fires (or its sender is dropped).
    ///
    /// A cycle starts no sooner than `check_interval` after the previous one started and
    /// never before the previous one finished; late cycles start immediately, ticks are not
    /// queued. A cycle's notifier runs on through the interval wait but is joined before the
    /// next cycle starts, so at most one is ever in flight. Returns the number of cycles run.
    pub fn run(&self, shutdown: &Receiver<()>) -> usize {
        let mut cycles = 0usize;
        let mut pending: Option<JoinHandle<NotifyStats>> = None;
        loop {
            if let Some(handle) = pending.take() {
                finish_notifications(handle);
            }
            let started = Instant::now();
            cycles += 1;
            match self.run_cycle() {
                Ok(mut summary) => {
                    pending = summary.notifier.take();
                    info!(
                        "Cycle {}: {} recipes, catalogs modified: {}, rebuild: {:?}, took {:?}",
                        cycles,
                        summary.dispatched,
                        summary.catalogs_modified,
                        summary.rebuild,
                        summary.elapsed
                    );
                }
                Err(e) => error!("Cycle {cycles} aborted: {e:#}"),
            }

            let wait = self.check_interval.saturating_sub(started.elapsed());
            match shutdown.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown requested; stopping after {cycles} cycles");
                    return cycles;
                }
            }
        }
    }
}
