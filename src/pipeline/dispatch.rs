//! Bounded dispatcher: one thread per recipe, at most `limit` executing at once.

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::Report;
use crate::engine::executor::RecipeExecutor;
use crate::pipeline::context::ReportSink;

/// Counting semaphore backed by a bounded channel: one token in the channel per running task.
pub struct AdmissionGate {
    tokens_tx: Sender<()>,
    tokens_rx: Receiver<()>,
}

/// Held by a running task; returns its slot when dropped.
pub struct Permit {
    tokens_rx: Receiver<()>,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        let (tokens_tx, tokens_rx) = bounded::<()>(limit.max(1));
        Self {
            tokens_tx,
            tokens_rx,
        }
    }

    /// Block until a slot is free.
    pub fn acquire(&self) -> Permit {
        // The gate owns both ends, so the channel never disconnects.
        let _ = self.tokens_tx.send(());
        Permit {
            tokens_rx: self.tokens_rx.clone(),
        }
    }

    /// Slots currently taken.
    pub fn in_use(&self) -> usize {
        self.tokens_rx.len()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.tokens_rx.try_recv();
    }
}

/// Execute one recipe and publish exactly one report for it, even if the executor panics.
fn run_task(executor: &dyn RecipeExecutor, recipe: &str, sink: &ReportSink) {
    let report = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(recipe)))
        .unwrap_or_else(|_| {
            error!("[{recipe}] executor panicked; recording empty report");
            Report::default()
        });
    sink.emit(report);
}

/// Dispatch every recipe onto its own thread, gated to `limit` concurrent executions.
///
/// Blocks the caller while the gate is full and returns once the last recipe has been
/// handed to a thread. Consumes `sink`: the result stream closes when the last task
/// finishes, not before. Returns the number of recipes dispatched.
pub fn dispatch<I>(
    recipes: I,
    limit: usize,
    executor: &Arc<dyn RecipeExecutor>,
    sink: ReportSink,
) -> usize
where
    I: IntoIterator<Item = String>,
{
    let gate = AdmissionGate::new(limit);
    let mut dispatched = 0usize;

    for recipe in recipes {
        let permit = gate.acquire();
        dispatched += 1;
        debug!("[{recipe}] dispatched ({} of {} slots busy)", gate.in_use(), limit.max(1));

        let task_sink = sink.clone();
        let task_executor = Arc::clone(executor);
        let task_recipe = recipe.clone();
        let spawned = thread::Builder::new()
            .name("recipe-worker".to_string())
            .spawn(move || {
                run_task(task_executor.as_ref(), &task_recipe, &task_sink);
                drop(permit);
            });
        if let Err(e) = spawned {
            // The closure (and its permit) was dropped; the recipe still gets its report.
            warn!("[{recipe}] could not spawn worker thread: {e}");
            sink.emit(Report::default());
        }
    }

    // The dispatcher's own producer handle; tasks still running keep the stream open.
    drop(sink);
    dispatched
}
