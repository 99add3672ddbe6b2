//! Request and payload validation.
//!
//! Everything here runs before any backend is touched: a payload that fails
//! validation is rejected without mutating any replica.

pub mod payload;

pub use payload::{normalize_keys, validate, FRESHNESS_WINDOW_SECS, MAX_RSA_MATERIAL_BYTES};
