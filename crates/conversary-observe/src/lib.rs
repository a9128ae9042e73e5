//! Observability for Conversary: the global tracing subscriber and the
//! optional OpenTelemetry span export.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
