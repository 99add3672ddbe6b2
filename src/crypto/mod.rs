//! Key material generation.
//!
//! Pure, stateless generators for the key types a payload can carry. No
//! network I/O happens here; generation is CPU-bound and callers run it on
//! a blocking worker so it never stalls the I/O scheduler.

pub mod keygen;

pub use keygen::{generate, validate_request, KeyRequest};
