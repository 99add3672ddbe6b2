//! # Configuration Management
//!
//! Startup configuration for the broker: the backend replica set, the
//! credential refresh interval, and request plumbing knobs. Loaded once at
//! process start; the backend list is immutable afterwards.

pub mod settings;

pub use settings::{AppConfig, BackendSettings, ObservabilityConfig};
