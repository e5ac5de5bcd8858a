pub mod api;
pub mod cli;
pub mod telemetry;

pub use api::router;
pub use telemetry::init_tracing;
