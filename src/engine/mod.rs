//! Engine: CLI surface and the external tool invocations (autopkg, makecatalogs).

pub mod arg_parser;
pub mod catalogs;
pub mod cli;
pub mod executor;
pub mod process;
pub mod report;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use catalogs::{CatalogRebuilder, MakeCatalogs};
pub use cli::handle_run;
pub use executor::{Autopkg, Execution, RecipeExecutor, RecipeTool};
pub use process::{CommandOutput, run_with_timeout};
pub use report::{parse_report, read_report, report_path_for};
