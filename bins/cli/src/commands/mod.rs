//! Command handlers.

pub mod clone;
pub mod config;
pub mod status;
pub mod watermark;

pub use clone::{CloneArgs, run_clone_command};
pub use config::{run_config_check, run_config_schema, run_config_show};
pub use status::run_status;
pub use watermark::run_watermark;
