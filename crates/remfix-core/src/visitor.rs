use sha2::{Digest, Sha256};

/// Anonymize a client session identifier before it touches Redis.
///
/// Formula: sha256(salt + session_id)[0..8] encoded as 16 hex chars.
///
/// Deterministic for a given salt, so repeated PFADDs of the same visitor do
/// not inflate the HyperLogLog estimate. The salt rotates daily at midnight
/// UTC, scoping uniqueness to a calendar day; the raw cookie value is never
/// stored or sent anywhere.
pub fn visitor_key(salt: &str, session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(session_id.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..8])
}
