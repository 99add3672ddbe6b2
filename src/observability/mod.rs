//! # Observability Infrastructure
//!
//! Structured logging for the broker. Metrics and distributed-tracing
//! exporters are intentionally absent; everything the broker reports goes
//! through `tracing` with structured fields, and secret material never
//! appears in any of them.

pub mod logging;

pub use logging::{init_logging, log_config_info};
