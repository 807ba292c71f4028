use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

use crate::utils::config::TOOL_OUTPUT_TARGET;

/// One rendered log line.
///
/// Lines echoed from autopkg or makecatalogs already carry their `[recipe]` prefix and are
/// printed dimmed without the crate tag so they read as tool output. Warnings and errors
/// name the module they came from, relative to the crate.
pub fn format_line(ts: &str, level: Level, target: &str, msg: &str) -> String {
    let name = env!("CARGO_PKG_NAME");
    if target == TOOL_OUTPUT_TARGET {
        return format!("{ts} {}", msg.dimmed());
    }
    match level {
        Level::Error | Level::Warn => {
            let level_str = if level == Level::Warn {
                "WARN".yellow()
            } else {
                "ERROR".red()
            };
            let module = target
                .strip_prefix(name)
                .map(|m| m.trim_start_matches("::"))
                .filter(|m| !m.is_empty())
                .unwrap_or(target);
            format!("{ts} [{} {} {}] {msg}", name.cyan(), level_str, module.white())
        }
        Level::Info => format!("{ts} [{}] {msg}", name.cyan()),
        Level::Debug | Level::Trace => format!("{ts} [{}] {}", name.cyan(), msg.dimmed()),
    }
}

/// Install the global logger. `RUST_LOG` still applies on top of these filters.
/// Safe to call more than once; later calls are ignored.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let ts = buf.timestamp_seconds().to_string();
            let msg = record.args().to_string();
            writeln!(
                buf,
                "{}",
                format_line(&ts, record.level(), record.target(), &msg)
            )
        })
        .try_init();
}
