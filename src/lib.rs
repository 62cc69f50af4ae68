pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod workers;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Virtual Nurse Lab";
