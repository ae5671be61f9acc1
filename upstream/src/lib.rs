pub mod client;
pub mod config;
pub mod content;
pub mod interactions;
pub mod metrics_defs;
pub mod types;
pub mod users;
