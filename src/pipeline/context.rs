//! Per-cycle result stream: one producer handle per dispatched task, one queue per consumer.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;

use crate::Report;

/// Reports are immutable once produced; every consumer gets the same allocation.
pub type SharedReport = Arc<Report>;

/// Producer side of the result stream.
///
/// Each clone is one live producer. A consumer's queue closes when the last clone is dropped,
/// so the stream closes exactly when the dispatcher and every task it spawned are done.
#[derive(Clone)]
pub struct ReportSink {
    taps: Vec<Sender<SharedReport>>,
}

impl ReportSink {
    /// Deliver `report` to every consumer. A consumer that already hung up is skipped.
    pub fn emit(&self, report: Report) {
        let report = Arc::new(report);
        for tap in &self.taps {
            let _ = tap.send(Arc::clone(&report));
        }
    }

    pub fn consumers(&self) -> usize {
        self.taps.len()
    }
}

/// Channels for one cycle. The dispatcher gets `sink`; the aggregator and the optional
/// notifier each get their own receiver and see every report.
pub struct CycleChannels {
    pub sink: ReportSink,
    pub aggregate_rx: Receiver<SharedReport>,
    pub notify_rx: Option<Receiver<SharedReport>>,
}

/// Aggregator queue holds up to `concurrency` reports. The notifier queue is unbounded so a
/// slow webhook never holds up executors.
pub fn create_cycle_channels(concurrency: usize, with_notifier: bool) -> CycleChannels {
    let (aggregate_tx, aggregate_rx) = bounded::<SharedReport>(concurrency.max(1));
    let mut taps = vec![aggregate_tx];
    let notify_rx = with_notifier.then(|| {
        let (tx, rx) = unbounded::<SharedReport>();
        taps.push(tx);
        rx
    });
    CycleChannels {
        sink: ReportSink { taps },
        aggregate_rx,
        notify_rx,
    }
}
