//! Report plist decoding: `autopkg run --report-plist` output → [`Report`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{ProcessorResult, Report, Row, RowValue};

/// On-disk shape. Every key is optional; absent keys decode to empty values.
#[derive(Debug, Default, Deserialize)]
struct RawReport {
    #[serde(default)]
    failures: Vec<plist::Value>,
    #[serde(default)]
    summary_results: BTreeMap<String, RawProcessor>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProcessor {
    #[serde(default)]
    data_rows: Vec<BTreeMap<String, plist::Value>>,
    #[serde(default)]
    header: Vec<String>,
    #[serde(default)]
    summary_text: String,
}

impl From<plist::Value> for RowValue {
    fn from(v: plist::Value) -> Self {
        match v {
            plist::Value::Boolean(b) => RowValue::Bool(b),
            plist::Value::Integer(i) => match i.as_signed() {
                Some(n) => RowValue::Integer(n),
                None => RowValue::Real(i.as_unsigned().unwrap_or_default() as f64),
            },
            plist::Value::Real(f) => RowValue::Real(f),
            plist::Value::String(s) => RowValue::String(s),
            plist::Value::Date(d) => RowValue::Date(d.to_xml_format()),
            plist::Value::Data(bytes) => RowValue::Data(bytes),
            plist::Value::Array(items) => {
                RowValue::Array(items.into_iter().map(RowValue::from).collect())
            }
            plist::Value::Dictionary(dict) => RowValue::Dict(
                dict.into_iter()
                    .map(|(k, v)| (k, RowValue::from(v)))
                    .collect(),
            ),
            _ => RowValue::Null,
        }
    }
}

fn convert_row(raw: BTreeMap<String, plist::Value>) -> Row {
    raw.into_iter().map(|(k, v)| (k, RowValue::from(v))).collect()
}

impl From<RawReport> for Report {
    fn from(raw: RawReport) -> Self {
        let summary_results = raw
            .summary_results
            .into_iter()
            .map(|(kind, p)| {
                let result = ProcessorResult {
                    data_rows: p.data_rows.into_iter().map(convert_row).collect(),
                    header: p.header,
                    summary_text: p.summary_text,
                };
                (kind, result)
            })
            .collect();
        Report {
            failures: raw.failures.into_iter().map(RowValue::from).collect(),
            summary_results,
        }
    }
}

/// Decode an XML or binary report plist.
pub fn parse_report(bytes: &[u8]) -> Result<Report> {
    let raw: RawReport = plist::from_bytes(bytes).context("decode report plist")?;
    Ok(raw.into())
}

/// Read and decode the report at `path`.
pub fn read_report(path: &Path) -> Result<Report> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read report {}", path.display()))?;
    parse_report(&bytes).with_context(|| format!("report {}", path.display()))
}

/// Where the report for `recipe` is written: `<reports_dir>/<recipe>`.
pub fn report_path_for(reports_dir: &Path, recipe: &str) -> PathBuf {
    reports_dir.join(recipe)
}
