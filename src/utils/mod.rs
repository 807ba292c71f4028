pub mod autopkgd_toml;
pub mod config;
pub mod logger;
pub mod secrets;

pub use autopkgd_toml::{apply_file_to_config, load_config, parse_config, validate_config};
pub use config::*;
pub use logger::{format_line, setup_logging};
pub use secrets::webhook_url_from_env;
