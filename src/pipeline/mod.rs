//! Pipeline components: recipe source, result stream, dispatcher, aggregator, coordinator.

pub mod aggregate;
pub mod context;
pub mod dispatch;
pub mod orchestrator;
pub mod recipes;

pub use aggregate::{Aggregate, aggregate, spawn_aggregator};
pub use context::{CycleChannels, ReportSink, SharedReport, create_cycle_channels};
pub use dispatch::{AdmissionGate, Permit, dispatch};
pub use orchestrator::{Coordinator, CyclePhase, CycleSummary, RebuildOutcome};
pub use recipes::{RecipeList, is_recipe_line};
