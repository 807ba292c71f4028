//! Application configuration constants.
//! Defaults, reserved names and timing knobs in one place.

use std::time::Duration;

// ---- Config defaults (applied when the config file leaves a key unset or zero) ----

/// Defaults filled in by [`crate::Config::default`] and the TOML loader.
pub struct Defaults;

impl Defaults {
    pub const AUTOPKG_PATH: &'static str = "/usr/local/bin/autopkg";
    pub const MAKECATALOGS_PATH: &'static str = "/usr/local/munki/makecatalogs";
    pub const MAX_PROCESSES: usize = 1;
    /// Per-execution timeout in seconds (autopkg and makecatalogs).
    pub const EXEC_TIMEOUT_SECS: u64 = 600;
    /// Minimum spacing between cycle starts, in seconds.
    pub const CHECK_INTERVAL_SECS: u64 = 1;
}

// ---- Recipe list ----

/// Line filtering for the recipe list file.
pub struct RecipeListConsts;

impl RecipeListConsts {
    /// Lines starting with this are comments.
    pub const COMMENT_MARKER: char = '#';
    /// Reserved name that is never dispatched.
    pub const MAKECATALOGS_SENTINEL: &'static str = "MakeCatalogs.munki";
}

// ---- Report result kinds ----

/// Names of `summary_results` entries the pipeline looks at.
pub struct ResultKinds;

impl ResultKinds {
    /// Presence means something was imported into the Munki repo; catalogs must be rebuilt.
    pub const MUNKI_IMPORTER: &'static str = "munki_importer_summary_result";
    pub const URL_DOWNLOADER: &'static str = "url_downloader_summary_result";
}

// ---- Process supervision ----

/// How long to wait for stdout/stderr readers after the child exited or was killed.
/// Grandchildren holding the pipes open must not hang the executor.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Log target for lines echoed from autopkg and makecatalogs.
pub const TOOL_OUTPUT_TARGET: &str = "autopkgd::tool";

// ---- Notifications ----

pub struct SlackConsts;

impl SlackConsts {
    /// Form field carrying the JSON message.
    pub const PAYLOAD_FIELD: &'static str = "payload";
    pub const PARSE_MODE: &'static str = "full";
    /// Environment variable that overrides `slack.webhook_url`.
    pub const WEBHOOK_ENV: &'static str = "AUTOPKGD_SLACK_WEBHOOK_URL";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}
