//! Public types: runtime configuration and the per-recipe report model.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::utils::config::Defaults;

/// Runtime configuration. Built once at startup (defaults → config file → CLI) and passed
/// by reference into every component; nothing mutates it afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    /// `autopkg` binary.
    pub autopkg_path: PathBuf,
    /// `makecatalogs` binary.
    pub makecatalogs_path: PathBuf,
    /// Line-oriented recipe list, re-read every cycle.
    pub recipes_file: PathBuf,
    /// Munki repository handed to `makecatalogs`.
    pub munki_repo: PathBuf,
    /// Directory receiving one report plist per recipe.
    pub reports_path: PathBuf,
    /// Max recipes executing at once (≥ 1).
    pub max_processes: usize,
    /// Kill a tool invocation after this long.
    pub exec_timeout: Duration,
    /// Minimum spacing between cycle starts.
    pub check_interval: Duration,
    /// Pass `--check` to `autopkg run`.
    pub check_only: bool,
    /// Post notifications (still needs `slack.webhook_url`).
    pub notify: bool,
    /// Address for the on-demand HTTP trigger. None = no listener.
    pub listen: Option<SocketAddr>,
    pub slack: SlackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autopkg_path: PathBuf::from(Defaults::AUTOPKG_PATH),
            makecatalogs_path: PathBuf::from(Defaults::MAKECATALOGS_PATH),
            recipes_file: PathBuf::new(),
            munki_repo: PathBuf::new(),
            reports_path: PathBuf::new(),
            max_processes: Defaults::MAX_PROCESSES,
            exec_timeout: Duration::from_secs(Defaults::EXEC_TIMEOUT_SECS),
            check_interval: Duration::from_secs(Defaults::CHECK_INTERVAL_SECS),
            check_only: false,
            notify: false,
            listen: None,
            slack: SlackConfig::default(),
        }
    }
}

impl Config {
    /// Notifications are on and have somewhere to go.
    pub fn notifications_enabled(&self) -> bool {
        self.notify && !self.slack.webhook_url.is_empty()
    }
}

/// Slack incoming-webhook settings (`[slack]` table).
#[derive(Clone, Debug, Default)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: String,
    pub username: String,
    pub icon_url: String,
}

/// One field value in a report row. Mirrors the property-list value kinds.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    /// XML plist date string (RFC 3339).
    Date(String),
    Data(Vec<u8>),
    Array(Vec<RowValue>),
    Dict(BTreeMap<String, RowValue>),
}

impl RowValue {
    fn kind(&self) -> &'static str {
        match self {
            RowValue::Null => "null",
            RowValue::Bool(_) => "bool",
            RowValue::Integer(_) => "integer",
            RowValue::Real(_) => "real",
            RowValue::String(_) => "string",
            RowValue::Date(_) => "date",
            RowValue::Data(_) => "data",
            RowValue::Array(_) => "array",
            RowValue::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RowValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Field extraction failure for a report row.
#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("row has no field `{0}`")]
    Missing(String),
    #[error("field `{field}` is {found}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// One data row of a processor result: field name → value.
pub type Row = BTreeMap<String, RowValue>;

/// Typed access to row fields.
pub trait RowExt {
    fn get_str(&self, field: &str) -> Result<&str, FieldError>;
}

impl RowExt for Row {
    fn get_str(&self, field: &str) -> Result<&str, FieldError> {
        let value = self
            .get(field)
            .ok_or_else(|| FieldError::Missing(field.to_string()))?;
        value.as_str().ok_or_else(|| FieldError::WrongType {
            field: field.to_string(),
            expected: "string",
            found: value.kind(),
        })
    }
}

/// Output of one autopkg processor (`summary_results.<kind>` in the report).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessorResult {
    pub data_rows: Vec<Row>,
    pub header: Vec<String>,
    pub summary_text: String,
}

/// Execution result for one recipe. A failed run is the empty default, never an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    pub failures: Vec<RowValue>,
    /// Result kind (e.g. `munki_importer_summary_result`) → processor output.
    pub summary_results: BTreeMap<String, ProcessorResult>,
}

impl Report {
    pub fn has_result(&self, kind: &str) -> bool {
        self.summary_results.contains_key(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && self.summary_results.is_empty()
    }
}
