pub mod health;
pub mod webhook;

pub use health::{health_live_handler, health_ready_handler, index_handler, metrics_handler};
pub use webhook::webhook_handler;
