//! Notifier: an independent reader of the result stream that posts one message per
//! downloaded or imported item. Best-effort; nothing here can fail a cycle.

use anyhow::Result;
use crossbeam_channel::Receiver;
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::notify::slack::{SlackMsg, Transport, Webhook};
use crate::pipeline::context::SharedReport;
use crate::utils::config::ResultKinds;
use crate::{FieldError, Report, Row, RowExt, SlackConfig};

/// Delivery counters for one notifier run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifyStats {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Rows left out because a field was missing or not a string.
    pub skipped_rows: usize,
}

/// `New download: <file name of download_path>`
pub fn download_message(row: &Row) -> Result<String, FieldError> {
    let path = row.get_str("download_path")?;
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    Ok(format!("New download: {name}"))
}

/// `New munki import: <name> <version>`
pub fn import_message(row: &Row) -> Result<String, FieldError> {
    let name = row.get_str("name")?;
    let version = row.get_str("version")?;
    Ok(format!("New munki import: {name} {version}"))
}

type RowFormatter = fn(&Row) -> Result<String, FieldError>;

/// Result kinds worth a message, in posting order.
const NOTEWORTHY: [(&str, RowFormatter); 2] = [
    (ResultKinds::URL_DOWNLOADER, download_message),
    (ResultKinds::MUNKI_IMPORTER, import_message),
];

/// Messages for every noteworthy row of `report`, plus the count of rows that could not be
/// formatted (each is logged).
pub fn messages_for(report: &Report) -> (Vec<String>, usize) {
    let mut messages = Vec::new();
    let mut skipped = 0;
    for (kind, format_row) in NOTEWORTHY {
        let Some(result) = report.summary_results.get(kind) else {
            continue;
        };
        for row in &result.data_rows {
            match format_row(row) {
                Ok(text) => messages.push(text),
                Err(e) => {
                    warn!("{kind}: skipping row: {e}");
                    skipped += 1;
                }
            }
        }
    }
    (messages, skipped)
}

pub struct Notifier {
    transport: Arc<dyn Transport>,
    template: SlackMsg,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, template: SlackMsg) -> Self {
        Self {
            transport,
            template,
        }
    }

    /// Webhook-backed notifier from the `[slack]` settings.
    pub fn from_config(conf: &SlackConfig) -> Self {
        Self::new(
            Arc::new(Webhook::new(conf.webhook_url.clone())),
            SlackMsg::template(conf),
        )
    }

    /// Post arbitrary text (used by the HTTP routes for raw tool output).
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.transport.post(&self.template.with_text(text))
    }

    /// Post every noteworthy row of `report`. Failed posts are logged and dropped.
    pub fn notify_report(&self, report: &Report, stats: &mut NotifyStats) {
        let (messages, skipped) = messages_for(report);
        stats.skipped_rows += skipped;
        for text in messages {
            stats.attempted += 1;
            match self.send_text(&text) {
                Ok(()) => {
                    debug!("notified: {text}");
                    stats.delivered += 1;
                }
                Err(e) => {
                    warn!("notification dropped ({text}): {e:#}");
                    stats.failed += 1;
                }
            }
        }
    }

    /// Read `rx` until the stream closes.
    pub fn consume(&self, rx: Receiver<SharedReport>) -> NotifyStats {
        let mut stats = NotifyStats::default();
        while let Ok(report) = rx.recv() {
            self.notify_report(&report, &mut stats);
        }
        stats
    }

    pub fn spawn(self: &Arc<Self>, rx: Receiver<SharedReport>) -> JoinHandle<NotifyStats> {
        let notifier = Arc::clone(self);
        thread::spawn(move || notifier.consume(rx))
    }
}
