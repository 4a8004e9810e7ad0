pub mod commands;
pub mod handlers;

pub use commands::command_argument_builder;
pub use handlers::{config_from_matches, handle_scan, tracing_level_for};
