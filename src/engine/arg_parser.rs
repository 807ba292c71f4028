use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Run AutoPkg recipes on an interval; rebuild Munki catalogs when something was imported.
#[derive(Clone, Parser)]
#[command(name = "autopkgd", version = concat!("- version ", env!("CARGO_PKG_VERSION")))]
#[command(about = "Run AutoPkg recipes on an interval and rebuild Munki catalogs on import.")]
pub struct Cli {
    /// Configuration file to load (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: PathBuf,

    /// Send download/import notifications to Slack.
    #[arg(long)]
    pub slack: bool,

    /// Pass --check to autopkg: look for new versions without downloading or importing.
    #[arg(long)]
    pub check: bool,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,

    /// Serve the on-demand HTTP trigger on this address (overrides `listen` in the config).
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}
