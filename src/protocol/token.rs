// src/protocol/token.rs
//! Anti-leech token: a time-bounded capability checked on download.
//!
//! `token = MD5(file_id ‖ secret_key ‖ decimal_timestamp)`, rendered as 32
//! lowercase hex characters. The hashing primitive itself is an external
//! collaborator — hash primitives live outside this core — but the
//! TTL/constant-time-compare logic lives here.

use md5::{Digest, Md5};

/// Generates the 32-character lowercase hex token for `file_id` under
/// `secret_key`, timestamped at `timestamp` (decimal unix seconds).
pub fn generate(secret_key: &str, file_id: &str, timestamp: u64) -> String {
    let mut hasher = Md5::new();
    hasher.update(file_id.as_bytes());
    hasher.update(secret_key.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time byte comparison — never short-circuits on the first
/// mismatching byte, so a timing side channel can't be used to guess the
/// token one byte at a time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Checks `token` against the token this core would have generated for
/// `file_id`/`secret_key`/`timestamp`, and that `timestamp` is within
/// `ttl_secs` of `now` (in either direction, matching the source's
/// "decimal timestamp" check, which tolerates modest clock skew between
/// the token issuer and this server).
pub fn check(token: &str, secret_key: &str, file_id: &str, timestamp: u64, now: u64, ttl_secs: u64) -> bool {
    let age = now.abs_diff(timestamp);
    if age > ttl_secs {
        return false;
    }
    let expected = generate(secret_key, file_id, timestamp);
    constant_time_eq(token.as_bytes(), expected.as_bytes())
}
