//! One-time codes and reset tokens.

use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Five-digit verification code with its deadline.
pub fn generate_otp(now: OffsetDateTime, ttl_minutes: i64) -> (i32, OffsetDateTime) {
    let code = OsRng.gen_range(10_000..=99_999);
    (code, now + Duration::minutes(ttl_minutes))
}

/// Parses a submitted code. Surrounding whitespace is ignored; anything
/// non-numeric yields `None`.
pub fn parse_otp(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok()
}

/// Returns the raw token to mail and its sha256 hex digest to store.
pub fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hashed = hash_reset_token(&raw);
    (raw, hashed)
}

pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
