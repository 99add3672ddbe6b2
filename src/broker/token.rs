//! Bearer-token generation.
//!
//! Caller-visible credentials are 80-character opaque strings drawn from an
//! alphanumeric+`*-_` alphabet with a cryptographically secure source.
//! Uniqueness is not guaranteed here; the credential manager probes every
//! backend before issuing a candidate.

use rand::rngs::OsRng;
use rand::RngCore;

/// Length of every issued bearer token.
pub const TOKEN_LENGTH: usize = 80;

/// Alphabet bearer tokens are drawn from.
pub const TOKEN_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890*-_";

/// Generate a fresh candidate bearer token.
///
/// Sampling is modulo the alphabet size; the tiny bias this introduces is
/// irrelevant at 80 characters over a 65-symbol alphabet, and collision
/// probability is negligible, but candidates are still probed against every
/// backend before use.
pub fn generate_token() -> String {
    let mut rng = OsRng;
    let mut token = String::with_capacity(TOKEN_LENGTH);

    for _ in 0..TOKEN_LENGTH {
        let idx = (rng.next_u32() as usize) % TOKEN_ALPHABET.len();
        token.push(TOKEN_ALPHABET[idx] as char);
    }

    token
}
