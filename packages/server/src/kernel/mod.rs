//! Kernel module - server infrastructure wired around the core.

pub mod scheduled_tasks;
pub mod sources;

pub use scheduled_tasks::{run_saved_search_pass, start_scheduler};
pub use sources::{apply_disabled_sources, build_registry};
