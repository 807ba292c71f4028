//! Result aggregation: drain the stream, note whether anything was imported into Munki.

use crossbeam_channel::Receiver;
use log::debug;
use std::thread::{self, JoinHandle};

use crate::Report;
use crate::pipeline::context::SharedReport;
use crate::utils::config::ResultKinds;

/// What the aggregator saw over one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Reports received before the stream closed.
    pub received: usize,
    /// Some report carried `munki_importer_summary_result`. Never reset within a cycle.
    pub catalogs_modified: bool,
}

impl Aggregate {
    pub fn observe(&mut self, report: &Report) {
        self.received += 1;
        if report.has_result(ResultKinds::MUNKI_IMPORTER) && !self.catalogs_modified {
            debug!("munki import observed; catalogs will be rebuilt");
            self.catalogs_modified = true;
        }
    }
}

/// Consume `rx` until every producer is gone.
pub fn aggregate(rx: Receiver<SharedReport>) -> Aggregate {
    let mut agg = Aggregate::default();
    while let Ok(report) = rx.recv() {
        agg.observe(&report);
    }
    debug!("aggregator: stream closed after {} reports", agg.received);
    agg
}

/// Run [`aggregate`] on its own thread. Joining the handle is the point where the final
/// flag becomes visible to the caller.
pub fn spawn_aggregator(rx: Receiver<SharedReport>) -> JoinHandle<Aggregate> {
    thread::spawn(move || aggregate(rx))
}
